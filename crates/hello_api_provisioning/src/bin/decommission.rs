use std::path::PathBuf;

use clap::Parser;
use hello_api_core::state::{load_state, STATE_FILE_NAME};
use hello_api_provisioning::adapters::{load_sdk_config, AwsProviders};
use hello_api_provisioning::handlers::decommission::{decommission, purge_logs, DeletionOutcome};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(about = "Delete every resource recorded in the state file")]
struct Cli {
    #[arg(long, default_value = STATE_FILE_NAME)]
    state_file: PathBuf,
    /// Defaults to the region recorded at provisioning time.
    #[arg(long)]
    region: Option<String>,
    /// Also delete the function's CloudWatch log group and streams.
    #[arg(long)]
    purge_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hello_api_provisioning::init_tracing();
    let cli = Cli::parse();

    let state = load_state(&cli.state_file)?;
    let region = cli.region.unwrap_or_else(|| state.config.region.clone());
    let sdk_config = load_sdk_config(Some(region)).await;
    let providers = AwsProviders::from_config(&sdk_config);

    let report = decommission(providers.handles(), &state);
    if cli.purge_logs {
        purge_logs(&providers.logs, &state.config.lambda_function_name);
    }

    let count = |wanted: fn(&DeletionOutcome) -> bool| {
        report
            .outcomes
            .iter()
            .filter(|(_, outcome)| wanted(outcome))
            .count()
    };
    let failed = report.failures().count();
    info!(
        deleted = count(|outcome| matches!(outcome, DeletionOutcome::Deleted)),
        not_found = count(|outcome| matches!(outcome, DeletionOutcome::NotFound(_))),
        skipped = count(|outcome| matches!(outcome, DeletionOutcome::Skipped { .. })),
        failed,
        "decommission finished"
    );
    if failed > 0 {
        warn!("some resources could not be deleted; check the errors above");
    }
    Ok(())
}
