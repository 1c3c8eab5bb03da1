use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use hello_api_core::state::{load_state, STATE_FILE_NAME};
use hello_api_tokens::{fetch_tokens, FetchOptions};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    about = "Log in through the hosted UI and call the Hello API with the issued token"
)]
struct Cli {
    #[arg(long, default_value = STATE_FILE_NAME)]
    state_file: PathBuf,
    /// Scope to request; repeat for several. Defaults to the app client's scopes.
    #[arg(long = "scope")]
    scopes: Vec<String>,
    /// Give up if no login completes within this many seconds.
    #[arg(long, default_value_t = 300)]
    login_timeout_secs: u64,
    /// Print the login URL without opening a browser.
    #[arg(long)]
    no_browser: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hello_api_tokens::init_tracing();
    let cli = Cli::parse();

    let state = load_state(&cli.state_file)?;
    let options = FetchOptions {
        scopes: (!cli.scopes.is_empty()).then_some(cli.scopes),
        login_timeout: Duration::from_secs(cli.login_timeout_secs),
        open_browser: !cli.no_browser,
    };

    match fetch_tokens(&state, &options).await {
        Ok(summary) => info!(status = summary.api_response.status, "done"),
        Err(fetch_error) if fetch_error.is_abandoned_login() => return Err(fetch_error.into()),
        Err(fetch_error) => error!(error = %fetch_error, "token fetch failed"),
    }
    Ok(())
}
