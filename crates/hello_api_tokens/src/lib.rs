//! Browser-based OAuth login against the demo user pool.
//!
//! Runs the authorization code flow with PKCE: a one-shot local listener
//! catches the redirect, the code is exchanged for tokens, the tokens are
//! checked against the pool's signing keys, and the access token is used for
//! a single call to the deployed API.

pub mod api;
pub mod authorize;
pub mod callback;
pub mod error;
pub mod exchange;
pub mod flow;
pub mod pkce;
pub mod verify;

pub use error::TokenFetchError;
pub use flow::{fetch_tokens, FetchOptions, FetchSummary};

use tracing_subscriber::EnvFilter;

/// Logs to stderr at `info` unless `RUST_LOG` says otherwise; stdout is left
/// for the tokens and the API response.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
