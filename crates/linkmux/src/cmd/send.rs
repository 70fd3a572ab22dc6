use std::fs;
use std::io::Read;
use std::time::Duration;

use linkmux_mux::{ChannelId, LinkMux};
use linkmux_transport::UnixLink;

use crate::cmd::SendArgs;
use crate::exit::{io_error, mux_error, transport_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::OutputFormat;

const SINK_CAPACITY: usize = 4096;

pub fn run(args: SendArgs, _format: OutputFormat) -> CliResult<i32> {
    let flush_timeout = parse_duration(&args.flush_timeout)?;
    let channel = ChannelId::new(args.channel)
        .map_err(|err| mux_error("invalid --channel", err))?;

    let payload = resolve_payload(&args)?;

    let port = UnixLink::connect(&args.path)
        .map_err(|err| transport_error("connect failed", err))?;

    let mut builder = LinkMux::builder(port);
    let sink = builder
        .sink_channel(channel, SINK_CAPACITY)
        .map_err(|err| mux_error("channel setup failed", err))?;
    let _mux = builder
        .start()
        .map_err(|err| mux_error("start failed", err))?;

    sink.write(&payload, Some(flush_timeout))
        .map_err(|err| mux_error("send failed", err))?;

    if !sink.flush(Some(flush_timeout)) {
        return Err(CliError::new(TIMEOUT, "link did not drain in time"));
    }
    // Queue-empty precedes the last frame hitting the wire; give the pump a
    // beat to finish its in-flight transmit before tearing the process down.
    std::thread::sleep(Duration::from_millis(50));

    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    let mut buf = Vec::new();
    std::io::stdin()
        .read_to_end(&mut buf)
        .map_err(|err| io_error("failed reading stdin", err))?;
    Ok(buf)
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn inline_data_wins_as_payload() {
        let args = SendArgs {
            path: PathBuf::from("/tmp/x.sock"),
            channel: 1,
            data: Some("hello".into()),
            file: None,
            flush_timeout: "5s".into(),
        };
        assert_eq!(resolve_payload(&args).unwrap(), b"hello");
    }
}
