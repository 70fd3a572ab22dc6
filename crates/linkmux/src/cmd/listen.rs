use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use linkmux_mux::{ChannelId, LinkMux, SourceHandle};
use linkmux_transport::UnixLink;

use crate::cmd::ListenArgs;
use crate::exit::{mux_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_chunk, OutputFormat};

const POLL: Duration = Duration::from_millis(200);
const READ_CHUNK: usize = 4096;

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let link = UnixLink::bind(&args.path).map_err(|err| transport_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let port = link
        .accept()
        .map_err(|err| transport_error("accept failed", err))?;

    let ids = requested_channels(&args)?;
    let mut builder = LinkMux::builder(port);
    let mut sources = Vec::with_capacity(ids.len());
    for id in ids {
        let source = builder
            .source_channel(id, args.capacity)
            .map_err(|err| mux_error("channel setup failed", err))?;
        sources.push(source);
    }
    let mux = builder
        .start()
        .map_err(|err| mux_error("start failed", err))?;

    // One reader per channel, funnelled into a single printing loop so
    // chunks never interleave mid-line on stdout.
    let (tx, rx) = mpsc::channel::<(u8, Vec<u8>)>();
    for source in sources {
        spawn_reader(source, tx.clone(), running.clone());
    }
    drop(tx);

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        match rx.recv_timeout(POLL) {
            Ok((channel, data)) => {
                print_chunk(channel, &data, format);
                printed = printed.saturating_add(1);
                if let Some(count) = args.count {
                    if printed >= count {
                        return Ok(SUCCESS);
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                // Peer hung up and the pumps exited; nothing more will come.
                if !mux.is_running() {
                    break;
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    Ok(SUCCESS)
}

fn requested_channels(args: &ListenArgs) -> CliResult<Vec<ChannelId>> {
    let raw: Vec<u8> = match &args.channels {
        Some(list) => list.clone(),
        None => (1..=ChannelId::MAX).collect(),
    };
    raw.into_iter()
        .map(|id| ChannelId::new(id).map_err(|err| mux_error("invalid --channels", err)))
        .collect()
}

fn spawn_reader(source: SourceHandle, tx: mpsc::Sender<(u8, Vec<u8>)>, running: Arc<AtomicBool>) {
    thread::spawn(move || {
        let mut buf = [0u8; READ_CHUNK];
        while running.load(Ordering::SeqCst) {
            let n = source.read(&mut buf, Some(POLL));
            if n > 0 && tx.send((source.id().raw(), buf[..n].to_vec())).is_err() {
                break;
            }
        }
    });
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args_with(channels: Option<Vec<u8>>) -> ListenArgs {
        ListenArgs {
            path: PathBuf::from("/tmp/x.sock"),
            channels,
            count: None,
            capacity: 4096,
        }
    }

    #[test]
    fn default_subscribes_every_application_channel() {
        let ids = requested_channels(&args_with(None)).unwrap();
        assert_eq!(ids.len(), 22);
        assert_eq!(ids.first().unwrap().raw(), 1);
        assert_eq!(ids.last().unwrap().raw(), 22);
    }

    #[test]
    fn out_of_range_channel_is_rejected() {
        let err = requested_channels(&args_with(Some(vec![2, 23]))).unwrap_err();
        assert_eq!(err.code, crate::exit::USAGE);
    }
}
