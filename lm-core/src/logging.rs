use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use crate::errors::*;

// RUST_LOG, when present, takes precedence over the --verbosity directives
pub fn setup(verbosity: &str) -> EmptyResult {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(verbosity))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::NEW)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| anyhow!("could not install log subscriber: {e}"))
}
