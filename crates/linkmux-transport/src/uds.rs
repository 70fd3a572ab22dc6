//! Unix domain socket stand-in for the serial link.
//!
//! Development and diagnostics run linkmux against a filesystem-path socket
//! instead of a UART: one side binds ([`UnixLink::bind`]) and accepts a
//! single connection, the other connects ([`UnixLink::connect`]). Both ends
//! get a [`LinkPort`] whose receive-buffer occupancy is read from the kernel
//! socket queue.

use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::port::LinkPort;

/// A listening link endpoint on a filesystem Unix socket path.
pub struct UnixLink {
    listener: UnixListener,
    path: PathBuf,
    cleanup_on_drop: bool,
}

impl UnixLink {
    /// Default permission mode for created socket paths.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;
    /// Maximum socket path length (`sockaddr_un.sun_path` is 108 bytes on
    /// Linux, 104 on macOS).
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind and listen on a filesystem-path Unix socket.
    ///
    /// An existing file at `path` is removed first if it is a stale socket;
    /// anything else refuses the bind.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        Self::bind_with_mode(path, Self::DEFAULT_SOCKET_MODE)
    }

    /// Bind with an explicit permission mode on the socket file.
    pub fn bind_with_mode(path: impl AsRef<Path>, mode: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let path_bytes = path.as_os_str().len();
        if path_bytes >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len: path_bytes,
                max: Self::MAX_PATH_LEN,
            });
        }

        if path.exists() {
            let metadata = std::fs::symlink_metadata(&path).map_err(|e| TransportError::Bind {
                path: path.clone(),
                source: e,
            })?;
            if metadata.file_type().is_socket() {
                debug!(?path, "removing stale socket");
                std::fs::remove_file(&path).map_err(|e| TransportError::Bind {
                    path: path.clone(),
                    source: e,
                })?;
            } else {
                return Err(TransportError::Bind {
                    path: path.clone(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::AlreadyExists,
                        "existing path is not a unix socket",
                    ),
                });
            }
        }

        let listener = UnixListener::bind(&path).map_err(|e| TransportError::Bind {
            path: path.clone(),
            source: e,
        })?;

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).map_err(|e| {
            TransportError::Bind {
                path: path.clone(),
                source: e,
            }
        })?;

        info!(?path, "listening for a link peer");

        Ok(Self {
            listener,
            path,
            cleanup_on_drop: true,
        })
    }

    /// Accept the peer's connection (blocking).
    pub fn accept(&self) -> Result<LinkPort> {
        let (stream, _addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!("link peer connected");
        Ok(LinkPort::from_unix(stream))
    }

    /// Connect to a listening link endpoint (blocking).
    pub fn connect(path: impl AsRef<Path>) -> Result<LinkPort> {
        let path = path.as_ref();
        let stream =
            std::os::unix::net::UnixStream::connect(path).map_err(|e| TransportError::Connect {
                path: path.to_path_buf(),
                source: e,
            })?;
        debug!(?path, "connected to link peer");
        Ok(LinkPort::from_unix(stream))
    }

    /// The path this endpoint is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UnixLink {
    fn drop(&mut self) {
        if self.cleanup_on_drop {
            if let Ok(metadata) = std::fs::symlink_metadata(&self.path) {
                if metadata.file_type().is_socket() {
                    debug!(path = ?self.path, "cleaning up socket file");
                    let _ = std::fs::remove_file(&self.path);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn bind_accept_connect() {
        let dir = std::env::temp_dir().join(format!("linkmux-uds-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let sock_path = dir.join("link.sock");

        let listener = UnixLink::bind(&sock_path).unwrap();
        assert!(sock_path.exists());

        let path_clone = sock_path.clone();
        let handle = std::thread::spawn(move || {
            let mut client = UnixLink::connect(&path_clone).unwrap();
            client.write_link(b"hello").unwrap();
        });

        let mut server = listener.accept().unwrap();
        let mut buf = [0u8; 5];
        let mut got = 0usize;
        while got < 5 {
            got += server
                .read_link(&mut buf[got..], Duration::from_secs(2))
                .unwrap();
        }
        assert_eq!(&buf, b"hello");
        handle.join().unwrap();

        drop(listener);
        assert!(!sock_path.exists(), "socket file removed on drop");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn path_too_long() {
        let long_path = "/tmp/".to_string() + &"a".repeat(200) + ".sock";
        let result = UnixLink::bind(&long_path);
        assert!(matches!(result, Err(TransportError::PathTooLong { .. })));
    }

    #[test]
    fn bind_rejects_existing_non_socket_file() {
        let dir = std::env::temp_dir().join(format!("linkmux-uds-file-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let sock_path = dir.join("not-a-socket.sock");
        std::fs::write(&sock_path, b"regular-file").unwrap();

        let result = UnixLink::bind(&sock_path);
        assert!(matches!(result, Err(TransportError::Bind { .. })));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn read_reports_eof_when_peer_hangs_up() {
        let dir = std::env::temp_dir().join(format!("linkmux-uds-eof-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let sock_path = dir.join("eof.sock");

        let listener = UnixLink::bind(&sock_path).unwrap();
        let client = UnixLink::connect(&sock_path).unwrap();
        let mut server = listener.accept().unwrap();
        drop(client);

        let mut buf = [0u8; 8];
        let err = server
            .read_link(&mut buf, Duration::from_secs(2))
            .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
