//! AWS adapters and the provisioning and decommissioning sequences for the
//! Hello API demo deployment.
//!
//! `adapters` holds one narrow trait per AWS service plus its SDK-backed
//! implementation; `handlers` holds the sequences, which only see the traits.

pub mod adapters;
pub mod handlers;

use tracing_subscriber::EnvFilter;

/// Logs to stderr at `info` unless `RUST_LOG` says otherwise.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
