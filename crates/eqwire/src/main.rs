mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::{Command, LinkArgs};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "eqwire", version, about = "eqwire link CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(flatten)]
    link: LinkArgs,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, &cli.link, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eqwire_transport::{MacAddress, BROADCAST, DEFAULT_PORT};

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "eqwire",
            "send",
            "aa:bb:cc:dd:ee:ff",
            "--command",
            "Power",
            "--data",
            "on",
        ])
        .expect("send args should parse");

        let Command::Send(args) = cli.command else {
            panic!("expected send subcommand");
        };
        assert_eq!(args.dest, MacAddress([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]));
        assert_eq!(cli.link.port, DEFAULT_PORT);
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "eqwire", "send", "broadcast", "-c", "1", "--hex", "01", "--data", "on",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_query_filters_and_global_link_flags() {
        let cli = Cli::try_parse_from([
            "eqwire",
            "query",
            "--type",
            "0102,0700",
            "--address",
            "02:00:00:00:00:0b",
            "--port",
            "40000",
            "--mac",
            "02-00-00-00-00-0a",
        ])
        .expect("query args should parse");

        let Command::Query(args) = cli.command else {
            panic!("expected query subcommand");
        };
        assert_eq!(args.to, BROADCAST);
        assert_eq!(args.device_types.len(), 2);
        assert_eq!(args.addresses.len(), 1);
        assert_eq!(cli.link.port, 40_000);
        assert_eq!(cli.link.mac, Some(MacAddress([0x02, 0, 0, 0, 0, 0x0a])));
    }

    #[test]
    fn rejects_bad_device_type() {
        let err = Cli::try_parse_from(["eqwire", "listen", "--device-type", "1"])
            .expect_err("short device type should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
