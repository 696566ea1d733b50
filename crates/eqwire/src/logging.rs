//! Stderr diagnostics for the CLI.
//!
//! `--log-level` applies to the eqwire crates only; everything else stays at
//! `warn`. Setting `EQWIRE_LOG` replaces the whole directive string.

use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a full filter directive.
pub const LOG_ENV: &str = "EQWIRE_LOG";

const ENGINE_TARGETS: [&str; 4] = ["eqwire", "eqwire_node", "eqwire_frame", "eqwire_transport"];

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Directive string for `level` on the engine crates.
fn default_directives(level: LogLevel) -> String {
    let mut directives = String::from("warn");
    for target in ENGINE_TARGETS {
        directives.push(',');
        directives.push_str(target);
        directives.push('=');
        directives.push_str(level.directive());
    }
    directives
}

fn build_filter(env_override: Option<&str>, level: LogLevel) -> EnvFilter {
    env_override
        .and_then(|raw| EnvFilter::try_new(raw).ok())
        .unwrap_or_else(|| EnvFilter::new(default_directives(level)))
}

/// Install the stderr subscriber so stdout stays machine-readable.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let env_override = std::env::var(LOG_ENV).ok();
    let filter = build_filter(env_override.as_deref(), level);

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_ansi(false);

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = match format {
        LogFormat::Text => builder.compact().try_init(),
        LogFormat::Json => builder.json().with_current_span(false).try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_scopes_engine_crates_only() {
        let directives = default_directives(LogLevel::Debug);
        assert!(directives.starts_with("warn,"));
        for target in ENGINE_TARGETS {
            assert!(
                directives.contains(&format!("{target}=debug")),
                "missing {target} in {directives}"
            );
        }
    }

    #[test]
    fn env_override_wins_when_valid() {
        let filter = build_filter(Some("eqwire_node=trace"), LogLevel::Error);
        assert_eq!(filter.to_string(), "eqwire_node=trace");
    }

    #[test]
    fn invalid_env_override_falls_back_to_level() {
        let filter = build_filter(Some("eqwire_node=loud"), LogLevel::Info);
        assert!(filter.to_string().contains("eqwire_node=info"));
    }
}
