use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use eqwire_node::Message;
use eqwire_transport::MacAddress;

use crate::cmd::{
    open_node, parse_command, parse_duration, parse_hex, IdentityArgs, LinkArgs, SendArgs,
};
use crate::exit::{node_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_frame, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Owned copy of a reply, kept until the main loop prints it.
#[derive(Debug, Clone)]
struct Reply {
    source: MacAddress,
    command: u8,
    flag: u8,
    request_id: u16,
    payload: Vec<u8>,
}

impl Reply {
    fn from_message(message: &Message<'_>) -> Self {
        Self {
            source: message.source,
            command: message.command,
            flag: message.flag,
            request_id: message.request_id,
            payload: message.payload.to_vec(),
        }
    }

    fn as_message(&self) -> Message<'_> {
        Message {
            source: self.source,
            command: self.command,
            flag: self.flag,
            request_id: self.request_id,
            payload: &self.payload,
        }
    }
}

pub fn run(args: SendArgs, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let payload = resolve_payload(&args)?;

    let identity = IdentityArgs {
        name: "eqwire-send".to_string(),
        device_type: Default::default(),
        device_version: Default::default(),
    };
    let mut node = open_node(link, &identity)?;
    let command = parse_command(node.command_table(), &args.command)?;

    if !args.wait {
        node.send(&args.dest, command, args.flag, &payload, 0)
            .map_err(|err| node_error("send failed", err))?;
        return Ok(SUCCESS);
    }

    let slot: Arc<Mutex<Option<Reply>>> = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&slot);
    node.set_reply_timeout(wait_timeout);
    node.request(&args.dest, command, args.flag, &payload, move |message, _| {
        if let Ok(mut slot) = sink.lock() {
            *slot = Some(Reply::from_message(message));
        }
    })
    .map_err(|err| node_error("send failed", err))?;

    let deadline = Instant::now() + wait_timeout;
    while Instant::now() < deadline {
        if node.process() == 0 {
            std::thread::sleep(POLL_INTERVAL);
        }
        let reply = slot.lock().ok().and_then(|mut slot| slot.take());
        if let Some(reply) = reply {
            print_frame(&reply.as_message(), node.command_table(), format);
            return Ok(SUCCESS);
        }
    }

    Err(CliError::new(
        TIMEOUT,
        format!("no reply from {} within {wait_timeout:?}", args.dest),
    ))
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(hex) = &args.hex {
        return parse_hex(hex);
    }
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(data: Option<&str>, hex: Option<&str>) -> SendArgs {
        SendArgs {
            dest: eqwire_transport::BROADCAST,
            command: "Power".to_string(),
            flag: 0,
            data: data.map(str::to_string),
            hex: hex.map(str::to_string),
            wait: false,
            wait_timeout: "5s".to_string(),
        }
    }

    #[test]
    fn payload_from_data_hex_or_empty() {
        assert_eq!(resolve_payload(&args(Some("on"), None)).expect("data"), b"on".to_vec());
        assert_eq!(resolve_payload(&args(None, Some("0102"))).expect("hex"), vec![1, 2]);
        assert!(resolve_payload(&args(None, None)).expect("empty").is_empty());
        assert!(resolve_payload(&args(None, Some("xyz"))).is_err());
    }

    #[test]
    fn reply_copy_preserves_fields() {
        let payload = [0x38, 0x37];
        let message = Message {
            source: MacAddress([0x02, 0, 0, 0, 0, 1]),
            command: 0x06,
            flag: 1,
            request_id: 9,
            payload: &payload,
        };
        let reply = Reply::from_message(&message);
        assert_eq!(reply.as_message(), message);
    }
}
