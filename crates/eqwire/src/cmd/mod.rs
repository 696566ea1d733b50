use std::time::Duration;

use clap::{Args, Subcommand};
use eqwire_frame::CommandTable;
use eqwire_node::{DeviceType, Node, Version};
use eqwire_transport::{MacAddress, UdpConfig, UdpTransport, BROADCAST, DEFAULT_PORT};

use crate::exit::{node_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod commands;
pub mod listen;
pub mod query;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a node: answer discovery and print received frames.
    Listen(ListenArgs),
    /// Discover devices on the link.
    Query(QueryArgs),
    /// Send a single frame.
    Send(SendArgs),
    /// Print the command-name table.
    Commands(CommandsArgs),
    /// Show version information.
    Version(VersionArgs),
}

/// Link settings shared by every subcommand that opens a node.
#[derive(Args, Debug, Clone)]
pub struct LinkArgs {
    /// UDP port shared by all stations.
    #[arg(long, env = "EQWIRE_PORT", default_value_t = DEFAULT_PORT, global = true)]
    pub port: u16,

    /// Hardware address of this station. Default: random locally administered.
    #[arg(long, env = "EQWIRE_MAC", value_name = "MAC", global = true)]
    pub mac: Option<MacAddress>,
}

pub fn run(command: Command, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => listen::run(args, link, format),
        Command::Query(args) => query::run(args, link, format),
        Command::Send(args) => send::run(args, link, format),
        Command::Commands(args) => commands::run(args, format),
        Command::Version(args) => version::run(args, format),
    }
}

#[derive(Args, Debug, Clone)]
pub struct IdentityArgs {
    /// Device name advertised in self-reports (max 32 bytes).
    #[arg(long, default_value = "eqwire-cli")]
    pub name: String,
    /// Device type as four hex digits (A then B), e.g. 0102.
    #[arg(long, value_name = "AABB", default_value = "0000", value_parser = parse_device_type)]
    pub device_type: DeviceType,
    /// Firmware version advertised in self-reports.
    #[arg(long, value_name = "X.Y.Z", default_value = "0.1.0", value_parser = parse_version)]
    pub device_version: Version,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub identity: IdentityArgs,
    /// Commands to bind (names or ids, comma-separated). Default: every built-in
    /// command except SystemCommand.
    #[arg(long, value_delimiter = ',')]
    pub bind: Option<Vec<String>>,
    /// Reply with an empty frame to every request carrying a request id.
    #[arg(long)]
    pub ack: bool,
    /// Broadcast a self-report on start.
    #[arg(long)]
    pub announce: bool,
    /// Exit after receiving N frames.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    #[command(flatten)]
    pub identity: IdentityArgs,
    /// Station to query. Default: broadcast.
    #[arg(long, value_name = "MAC", default_value_t = BROADCAST)]
    pub to: MacAddress,
    /// Only devices of these types answer (comma-separated AABB).
    #[arg(long = "type", value_name = "AABB", value_delimiter = ',', value_parser = parse_device_type)]
    pub device_types: Vec<DeviceType>,
    /// Only devices with these addresses answer (comma-separated).
    #[arg(long = "address", value_name = "MAC", value_delimiter = ',')]
    pub addresses: Vec<MacAddress>,
    /// How long to collect replies (e.g. 2s, 500ms).
    #[arg(long, default_value = "2s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Destination address, or "broadcast".
    pub dest: MacAddress,
    /// Command name or id (decimal or 0x-prefixed hex).
    #[arg(long, short = 'c')]
    pub command: String,
    /// Flag byte.
    #[arg(long, default_value_t = 0)]
    pub flag: u8,
    /// Raw string payload.
    #[arg(long, conflicts_with = "hex")]
    pub data: Option<String>,
    /// Hex-encoded payload, e.g. ff0080.
    #[arg(long, conflicts_with = "data")]
    pub hex: Option<String>,
    /// Wait for the correlated reply and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug, Default)]
pub struct CommandsArgs {
    /// Application command names to allocate ids for (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub define: Vec<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Open a UDP-backed node with the given identity.
pub(crate) fn open_node(
    link: &LinkArgs,
    identity: &IdentityArgs,
) -> CliResult<Node<UdpTransport>> {
    let mut config = UdpConfig {
        port: link.port,
        ..UdpConfig::default()
    };
    if let Some(mac) = link.mac {
        config.address = mac;
    }
    let mut node = Node::new(UdpTransport::new(config));
    node.begin(&identity.name, identity.device_type, identity.device_version)
        .map_err(|err| node_error("link open failed", err))?;
    Ok(node)
}

/// Resolve a command given by name or numeric id.
pub(crate) fn parse_command(table: &CommandTable, input: &str) -> CliResult<u8> {
    let input = input.trim();
    if let Some(id) = table.id_for_name(input) {
        return Ok(id);
    }
    let parsed = match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|_| CliError::new(USAGE, format!("unknown command: {input}")))
}

pub(crate) fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(&digits)
        .map_err(|err| CliError::new(USAGE, format!("invalid hex payload '{input}': {err}")))
}

fn parse_device_type(input: &str) -> Result<DeviceType, String> {
    let bytes = parse_hex(input).map_err(|err| err.message)?;
    match bytes.as_slice() {
        [a, b] => Ok(DeviceType::new(*a, *b)),
        _ => Err(format!("device type must be four hex digits, got '{input}'")),
    }
}

fn parse_version(input: &str) -> Result<Version, String> {
    let parts: Vec<&str> = input.trim().split('.').collect();
    let [major, minor, patch] = parts.as_slice() else {
        return Err(format!("version must look like 1.2.3, got '{input}'"));
    };
    let field = |s: &str| {
        s.parse::<u8>()
            .map_err(|_| format!("version fields must be 0-255, got '{input}'"))
    };
    Ok(Version::new(field(*major)?, field(*minor)?, field(*patch)?))
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
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
