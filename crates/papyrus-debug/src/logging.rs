//! Tracing subscriber setup for hosts embedding the debug server.

use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use crate::config::DebugServerConfig;

const TARGETS: [&str; 2] = ["papyrus_debug", "papyrus_runtime"];

/// Install a stderr subscriber filtered by `RUST_LOG` plus the configured
/// level. Does nothing if the host already installed one.
pub fn init(config: &DebugServerConfig) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(&config.log_level))
        .with_writer(std::io::stderr)
        .try_init();
}

fn filter(level: &str) -> EnvFilter {
    let mut filter = EnvFilter::from_default_env();
    for target in TARGETS {
        match format!("{target}={level}").parse::<Directive>() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(_) => filter = filter.add_directive(tracing::Level::INFO.into()),
        }
    }
    filter
}
