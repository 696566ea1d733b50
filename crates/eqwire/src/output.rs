use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use eqwire_frame::CommandTable;
use eqwire_node::{Message, PeerRecord};
use serde::Serialize;

const FRAME_SCHEMA_ID: &str = "https://schemas.eqwire.dev/cli/v1/frame-received.schema.json";
const PEERS_SCHEMA_ID: &str = "https://schemas.eqwire.dev/cli/v1/peers.schema.json";

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    schema_id: &'a str,
    source: String,
    command: u8,
    command_name: &'a str,
    flag: u8,
    request_id: u16,
    payload_size: usize,
    payload: String,
    timestamp: String,
}

pub fn print_frame(message: &Message<'_>, commands: &CommandTable, format: OutputFormat) {
    let command_name = commands.name_for_id(message.command).unwrap_or("UNKNOWN");
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                schema_id: FRAME_SCHEMA_ID,
                source: message.source.to_string(),
                command: message.command,
                command_name,
                flag: message.flag,
                request_id: message.request_id,
                payload_size: message.payload.len(),
                payload: payload_preview(message.payload),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SOURCE", "COMMAND", "FLAG", "REQ", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    message.source.to_string(),
                    format!("{command_name} (0x{:02x})", message.command),
                    message.flag.to_string(),
                    message.request_id.to_string(),
                    message.payload.len().to_string(),
                    payload_preview(message.payload),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "from={} command=0x{:02x} ({}) flag={} req={} size={} payload={}",
                message.source,
                message.command,
                command_name,
                message.flag,
                message.request_id,
                message.payload.len(),
                payload_preview(message.payload)
            );
        }
        OutputFormat::Raw => print_raw(message.payload),
    }
}

#[derive(Serialize)]
struct PeerOutput {
    address: String,
    name: String,
    device_type: String,
    version: String,
    commands: Vec<u8>,
}

impl From<&PeerRecord> for PeerOutput {
    fn from(peer: &PeerRecord) -> Self {
        Self {
            address: peer.address.to_string(),
            name: peer.info.name_lossy().into_owned(),
            device_type: peer.info.device_type.to_string(),
            version: peer.info.version.to_string(),
            commands: peer.commands.clone(),
        }
    }
}

#[derive(Serialize)]
struct PeersOutput<'a> {
    schema_id: &'a str,
    count: usize,
    peers: Vec<PeerOutput>,
}

pub fn print_peers(peers: &[PeerRecord], commands: &CommandTable, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = PeersOutput {
                schema_id: PEERS_SCHEMA_ID,
                count: peers.len(),
                peers: peers.iter().map(PeerOutput::from).collect(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ADDRESS", "NAME", "TYPE", "VERSION", "COMMANDS"]);
            for peer in peers {
                table.add_row(vec![
                    peer.address.to_string(),
                    peer.info.name_lossy().into_owned(),
                    peer.info.device_type.to_string(),
                    peer.info.version.to_string(),
                    command_list(&peer.commands, commands),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for peer in peers {
                println!(
                    "{} name={} type={} version={} commands=[{}]",
                    peer.address,
                    peer.info.name_lossy(),
                    peer.info.device_type,
                    peer.info.version,
                    command_list(&peer.commands, commands)
                );
            }
        }
    }
}

#[derive(Serialize)]
struct CommandOutput<'a> {
    name: &'a str,
    id: u8,
}

#[derive(Serialize)]
struct CommandsOutput<'a> {
    schema_id: &'a str,
    commands: Vec<CommandOutput<'a>>,
}

pub fn print_commands(commands: &CommandTable, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = CommandsOutput {
                schema_id: "https://schemas.eqwire.dev/cli/v1/commands.schema.json",
                commands: commands
                    .iter()
                    .map(|(name, id)| CommandOutput { name, id })
                    .collect(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ID", "NAME"]);
            for (name, id) in commands.iter() {
                table.add_row(vec![format!("0x{id:02x}"), name.to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for (name, id) in commands.iter() {
                println!("0x{id:02x} {name}");
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn command_list(ids: &[u8], commands: &CommandTable) -> String {
    ids.iter()
        .map(|id| match commands.name_for_id(*id) {
            Some(name) => name.to_string(),
            None => format!("0x{id:02x}"),
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
