use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::OutputFormat;

const VERSION_SCHEMA_ID: &str = "https://schemas.eqwire.dev/cli/v1/version.schema.json";

/// Build and wire-format facts reported by `eqwire version --extended`.
#[derive(Debug, Serialize)]
struct BuildInfo {
    schema_id: &'static str,
    version: &'static str,
    target: &'static str,
    profile: &'static str,
    default_port: u16,
    frame_magic: String,
    max_payload: usize,
    max_frame: usize,
    reply_timeout_ms: u128,
    inbox_capacity: usize,
}

impl BuildInfo {
    fn current() -> Self {
        Self {
            schema_id: VERSION_SCHEMA_ID,
            version: env!("CARGO_PKG_VERSION"),
            target: option_env!("EQWIRE_BUILD_TARGET").unwrap_or("unknown"),
            profile: option_env!("EQWIRE_BUILD_PROFILE").unwrap_or("unknown"),
            default_port: eqwire_transport::DEFAULT_PORT,
            frame_magic: hex::encode(eqwire_frame::MAGIC),
            max_payload: eqwire_frame::MAX_PAYLOAD_SIZE,
            max_frame: eqwire_frame::MAX_FRAME_SIZE,
            reply_timeout_ms: eqwire_node::DEFAULT_REPLY_TIMEOUT.as_millis(),
            inbox_capacity: eqwire_node::INBOX_CAPACITY,
        }
    }

    fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("version", self.version.to_string()),
            ("target", self.target.to_string()),
            ("profile", self.profile.to_string()),
            ("default_port", self.default_port.to_string()),
            ("frame_magic", self.frame_magic.clone()),
            ("max_payload", self.max_payload.to_string()),
            ("max_frame", self.max_frame.to_string()),
            ("reply_timeout_ms", self.reply_timeout_ms.to_string()),
            ("inbox_capacity", self.inbox_capacity.to_string()),
        ]
    }
}

pub fn run(args: VersionArgs, format: OutputFormat) -> CliResult<i32> {
    let info = BuildInfo::current();

    if !args.extended {
        println!("eqwire {}", info.version);
        return Ok(SUCCESS);
    }

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&info).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (field, value) in info.rows() {
                table.add_row(vec![field.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for (field, value) in info.rows() {
                println!("{field}={value}");
            }
        }
    }

    Ok(SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_info_reports_wire_limits() {
        let info = BuildInfo::current();
        assert_eq!(info.max_payload, eqwire_frame::MAX_PAYLOAD_SIZE);
        assert!(info.max_frame > info.max_payload);
        assert_eq!(info.reply_timeout_ms, 10_000);

        let json = serde_json::to_value(&info).expect("should serialize");
        assert_eq!(json["schema_id"], VERSION_SCHEMA_ID);
        assert_eq!(json["default_port"], eqwire_transport::DEFAULT_PORT);
    }

    #[test]
    fn rows_cover_every_field_but_schema() {
        let info = BuildInfo::current();
        let rows = info.rows();
        assert_eq!(rows.len(), 9);
        assert!(rows
            .iter()
            .any(|(field, value)| *field == "frame_magic" && value == "455157"));
    }
}
