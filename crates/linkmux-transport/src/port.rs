use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use crate::error::Result;
use crate::mem::MemPort;

/// One end of the physical full-duplex link.
///
/// This is the fundamental I/O type the pump tasks operate on. On Unix it
/// wraps a Unix domain socket standing in for a serial device; the in-memory
/// variant backs loopback pairs for tests and embedding without hardware.
pub struct LinkPort {
    inner: LinkPortInner,
}

enum LinkPortInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
    Mem(MemPort),
}

impl LinkPort {
    #[cfg(unix)]
    pub(crate) fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: LinkPortInner::Unix(stream),
        }
    }

    pub(crate) fn from_mem(port: MemPort) -> Self {
        Self {
            inner: LinkPortInner::Mem(port),
        }
    }

    /// Read whatever bytes are available, waiting at most `timeout`.
    ///
    /// Returns `Ok(0)` when the timeout expired with nothing to read, and
    /// `ErrorKind::UnexpectedEof` when the peer end is gone.
    pub fn read_link(&mut self, buf: &mut [u8], timeout: Duration) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkPortInner::Unix(stream) => {
                stream.set_read_timeout(Some(timeout))?;
                match stream.read(buf) {
                    Ok(0) => Err(std::io::Error::from(ErrorKind::UnexpectedEof)),
                    Ok(n) => Ok(n),
                    Err(err)
                        if err.kind() == ErrorKind::WouldBlock
                            || err.kind() == ErrorKind::TimedOut =>
                    {
                        Ok(0)
                    }
                    Err(err) => Err(err),
                }
            }
            LinkPortInner::Mem(port) => port.read_timeout(buf, timeout),
        }
    }

    /// Write the whole buffer to the link, retrying short writes.
    pub fn write_link(&mut self, buf: &[u8]) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkPortInner::Unix(stream) => {
                let mut offset = 0usize;
                while offset < buf.len() {
                    match stream.write(&buf[offset..]) {
                        Ok(0) => return Err(std::io::Error::from(ErrorKind::UnexpectedEof)),
                        Ok(n) => offset += n,
                        Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                        Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                        Err(err) => return Err(err),
                    }
                }
                stream.flush()
            }
            LinkPortInner::Mem(port) => port.write_all(buf),
        }
    }

    /// Number of received bytes currently sitting in the hardware receive
    /// buffer, not yet consumed by [`read_link`](Self::read_link).
    pub fn rx_buffered(&self) -> usize {
        match &self.inner {
            #[cfg(unix)]
            LinkPortInner::Unix(stream) => unix_rx_buffered(stream),
            LinkPortInner::Mem(port) => port.rx_buffered(),
        }
    }

    /// Total capacity of the receive buffer.
    pub fn rx_capacity(&self) -> usize {
        match &self.inner {
            #[cfg(unix)]
            LinkPortInner::Unix(stream) => unix_rx_capacity(stream),
            LinkPortInner::Mem(port) => port.rx_capacity(),
        }
    }

    /// Free space remaining in the receive buffer.
    pub fn rx_free(&self) -> usize {
        self.rx_capacity().saturating_sub(self.rx_buffered())
    }

    /// Second handle to the same link, so the sink and source pumps can
    /// each own one side of the stream.
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            #[cfg(unix)]
            LinkPortInner::Unix(stream) => {
                let cloned = stream.try_clone()?;
                Ok(Self::from_unix(cloned))
            }
            LinkPortInner::Mem(port) => Ok(Self::from_mem(port.clone())),
        }
    }
}

/// Occupancy of a Unix socket's receive queue via `FIONREAD`.
#[cfg(unix)]
fn unix_rx_buffered(stream: &std::os::unix::net::UnixStream) -> usize {
    use std::os::fd::AsRawFd;

    let mut pending: libc::c_int = 0;
    // SAFETY: `pending` is a valid writable int and the fd is owned by
    // `stream` for the duration of the call.
    let rc = unsafe { libc::ioctl(stream.as_raw_fd(), libc::FIONREAD, &mut pending) };
    if rc == 0 && pending >= 0 {
        pending as usize
    } else {
        0
    }
}

/// Capacity of a Unix socket's receive queue via `SO_RCVBUF`.
#[cfg(unix)]
fn unix_rx_capacity(stream: &std::os::unix::net::UnixStream) -> usize {
    use std::os::fd::AsRawFd;

    let mut size: libc::c_int = 0;
    let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;
    // SAFETY: `size` and `len` are valid writable pointers for the provided
    // sizes, and the fd is an open socket descriptor owned by this process.
    let rc = unsafe {
        libc::getsockopt(
            stream.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_RCVBUF,
            (&mut size as *mut libc::c_int).cast::<libc::c_void>(),
            &mut len,
        )
    };
    if rc == 0 && size > 0 {
        size as usize
    } else {
        0
    }
}

impl std::fmt::Debug for LinkPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            #[cfg(unix)]
            LinkPortInner::Unix(_) => f.debug_struct("LinkPort").field("type", &"unix").finish(),
            LinkPortInner::Mem(_) => f.debug_struct("LinkPort").field("type", &"mem").finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::loopback;

    #[test]
    fn loopback_write_then_read() {
        let (mut a, mut b) = loopback(64);
        a.write_link(b"hello").unwrap();

        let mut buf = [0u8; 16];
        let n = b.read_link(&mut buf, Duration::from_secs(1)).unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[test]
    fn read_times_out_when_idle() {
        let (_a, mut b) = loopback(64);
        let mut buf = [0u8; 16];
        let n = b.read_link(&mut buf, Duration::from_millis(10)).unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn rx_occupancy_tracks_unconsumed_bytes() {
        let (mut a, mut b) = loopback(64);
        assert_eq!(b.rx_buffered(), 0);
        assert_eq!(b.rx_capacity(), 64);
        assert_eq!(b.rx_free(), 64);

        a.write_link(&[0u8; 10]).unwrap();
        assert_eq!(b.rx_buffered(), 10);
        assert_eq!(b.rx_free(), 54);

        let mut buf = [0u8; 10];
        b.read_link(&mut buf, Duration::from_secs(1)).unwrap();
        assert_eq!(b.rx_buffered(), 0);
    }

    #[test]
    fn cloned_handles_share_the_stream() {
        let (mut a, mut b) = loopback(64);
        let mut a2 = a.try_clone().unwrap();

        a.write_link(b"one").unwrap();
        a2.write_link(b"two").unwrap();

        let mut buf = [0u8; 16];
        let n = b.read_link(&mut buf, Duration::from_secs(1)).unwrap();
        assert_eq!(&buf[..n], b"onetwo");
    }

    #[test]
    #[cfg(unix)]
    fn unix_port_reports_occupancy() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut tx = LinkPort::from_unix(left);
        let rx = LinkPort::from_unix(right);

        assert!(rx.rx_capacity() > 0);
        tx.write_link(b"abcdef").unwrap();
        // Give the kernel a moment to account the bytes.
        std::thread::sleep(Duration::from_millis(20));
        assert!(rx.rx_buffered() >= 6);
    }
}
