use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use eqwire_frame::{CommandTable, BUILTIN_COMMANDS, SYSTEM_COMMAND};
use eqwire_transport::BROADCAST;
use tracing::{debug, info};

use crate::cmd::{open_node, parse_command, LinkArgs, ListenArgs};
use crate::exit::{node_error, CliError, CliResult, SUCCESS};
use crate::output::{print_frame, print_peers, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub fn run(args: ListenArgs, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let mut node = open_node(link, &args.identity)?;
    let table = node.command_table().clone();

    let received = Arc::new(AtomicUsize::new(0));
    for command in bound_commands(&table, args.bind.as_deref())? {
        let received = Arc::clone(&received);
        let table = table.clone();
        let ack = args.ack;
        node.on(command, move |message, outbox| {
            print_frame(message, &table, format);
            received.fetch_add(1, Ordering::SeqCst);
            if ack && message.request_id != 0 {
                if let Err(err) = outbox.reply(message, message.flag, b"") {
                    debug!(%err, "ack failed");
                }
            }
        });
    }

    let peer_table = table.clone();
    node.on_discovery(move |peer, _| {
        print_peers(std::slice::from_ref(peer), &peer_table, format);
    });

    if args.announce {
        node.announce(&BROADCAST)
            .map_err(|err| node_error("announce failed", err))?;
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;
    info!(address = %node.local_address(), "listening");

    while running.load(Ordering::SeqCst) {
        if node.process() == 0 {
            std::thread::sleep(POLL_INTERVAL);
        }
        if let Some(count) = args.count {
            if received.load(Ordering::SeqCst) >= count {
                break;
            }
        }
    }

    Ok(SUCCESS)
}

fn bound_commands(table: &CommandTable, requested: Option<&[String]>) -> CliResult<Vec<u8>> {
    match requested {
        Some(names) => names.iter().map(|name| parse_command(table, name)).collect(),
        None => Ok(BUILTIN_COMMANDS
            .iter()
            .map(|(_, id)| *id)
            .filter(|id| *id != SYSTEM_COMMAND)
            .collect()),
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binding_skips_system_command() {
        let table = CommandTable::new();
        let ids = bound_commands(&table, None).expect("default binding");
        assert_eq!(ids.len(), BUILTIN_COMMANDS.len() - 1);
        assert!(!ids.contains(&SYSTEM_COMMAND));
        assert!(ids.contains(&0xC8));
    }

    #[test]
    fn explicit_binding_resolves_names_and_ids() {
        let table = CommandTable::new();
        let requested = vec!["Power".to_string(), "0x70".to_string()];
        assert_eq!(
            bound_commands(&table, Some(requested.as_slice())).expect("explicit binding"),
            vec![0x01, 0x70]
        );
        let bad = vec!["Nope".to_string()];
        assert!(bound_commands(&table, Some(bad.as_slice())).is_err());
    }
}
