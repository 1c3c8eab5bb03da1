use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use hello_api_core::state::{save_state_atomic, DeploymentConfig, DeploymentState, STATE_FILE_NAME};
use hello_api_provisioning::adapters::{load_sdk_config, AwsProviders};
use hello_api_provisioning::handlers::consistency::ConsistencyPolicy;
use hello_api_provisioning::handlers::package::FunctionPackage;
use hello_api_provisioning::handlers::provision::{
    provision, ProvisionInputs, DOMAIN_PREFIX_ENV, PASSWORD_ENV,
};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    about = "Create the Hello API demo deployment and record it in the state file"
)]
struct Cli {
    #[arg(long, default_value = STATE_FILE_NAME)]
    state_file: PathBuf,
    /// Overrides the region from the AWS environment.
    #[arg(long)]
    region: Option<String>,
    /// Permanent password of the test user.
    #[arg(long, env = PASSWORD_ENV, hide_env_values = true)]
    password: Option<String>,
    /// Prefix of the hosted sign-in domain; must be globally unique.
    #[arg(long, env = DOMAIN_PREFIX_ENV)]
    domain_prefix: Option<String>,
    /// Deploy a prebuilt `bootstrap` zip instead of the inline Python handler.
    #[arg(long)]
    function_zip: Option<PathBuf>,
    /// How long to wait for the execution role to become usable.
    #[arg(long, default_value_t = 60)]
    consistency_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hello_api_provisioning::init_tracing();
    let cli = Cli::parse();

    let package = match &cli.function_zip {
        Some(path) => FunctionPackage::from_zip_file(path)?,
        None => FunctionPackage::InlinePython,
    };
    let inputs = ProvisionInputs::new(
        cli.password,
        cli.domain_prefix,
        package,
        ConsistencyPolicy::with_timeout(Duration::from_secs(cli.consistency_timeout_secs)),
    )?;

    let sdk_config = load_sdk_config(cli.region).await;
    let region = sdk_config
        .region()
        .map(ToString::to_string)
        .context("no AWS region configured; pass --region or set AWS_REGION")?;
    let mut state = DeploymentState::new(DeploymentConfig::for_region(region));
    let providers = AwsProviders::from_config(&sdk_config);

    let report = provision(providers.handles(), &mut state, &inputs);

    save_state_atomic(&cli.state_file, &state)?;
    info!(path = %cli.state_file.display(), "state saved");
    if !report.is_complete() {
        warn!(
            completed = report.completed_steps.len(),
            "provisioning incomplete; run decommission to remove what was created"
        );
    }
    Ok(())
}
