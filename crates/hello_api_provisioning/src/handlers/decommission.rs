use std::fmt;

use hello_api_core::naming::{self, BASIC_EXECUTION_POLICY_ARN};
use hello_api_core::state::{DeploymentState, ResourceField};
use tracing::{error, info, warn};

use crate::adapters::{LogStore, ProviderError, Providers, RoleManager};

/// Deletable resources, children before the parents they depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Stage,
    Route,
    Integration,
    Function,
    Authorizer,
    Api,
    ExecutionRole,
    AppClient,
    ResourceServer,
    User,
    AuthDomain,
    UserPool,
}

impl ResourceKind {
    pub const DELETION_ORDER: [Self; 12] = [
        Self::Stage,
        Self::Route,
        Self::Integration,
        Self::Function,
        Self::Authorizer,
        Self::Api,
        Self::ExecutionRole,
        Self::AppClient,
        Self::ResourceServer,
        Self::User,
        Self::AuthDomain,
        Self::UserPool,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Stage => "stage",
            Self::Route => "route",
            Self::Integration => "integration",
            Self::Function => "function",
            Self::Authorizer => "authorizer",
            Self::Api => "HTTP API",
            Self::ExecutionRole => "execution role",
            Self::AppClient => "app client",
            Self::ResourceServer => "resource server",
            Self::User => "test user",
            Self::AuthDomain => "auth domain",
            Self::UserPool => "user pool",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionOutcome {
    Deleted,
    /// Already gone; benign.
    NotFound(String),
    Failed(String),
    /// The identifier needed to address the resource was never recorded.
    Skipped { field: &'static str },
}

impl DeletionOutcome {
    fn from_result(result: Result<(), ProviderError>) -> Self {
        match result {
            Ok(()) => Self::Deleted,
            Err(error) if error.is_not_found() => Self::NotFound(error.to_string()),
            Err(error) => Self::Failed(error.to_string()),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[derive(Debug, Default)]
pub struct DecommissionReport {
    pub outcomes: Vec<(ResourceKind, DeletionOutcome)>,
}

impl DecommissionReport {
    pub fn outcome(&self, kind: ResourceKind) -> Option<&DeletionOutcome> {
        self.outcomes
            .iter()
            .find(|(candidate, _)| *candidate == kind)
            .map(|(_, outcome)| outcome)
    }

    pub fn failures(&self) -> impl Iterator<Item = &(ResourceKind, DeletionOutcome)> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_failure())
    }
}

/// Deletes every resource the state describes. Never stops early, and never
/// modifies the state.
pub fn decommission(providers: Providers<'_>, state: &DeploymentState) -> DecommissionReport {
    let mut report = DecommissionReport::default();
    for kind in ResourceKind::DELETION_ORDER {
        let outcome = match request_deletion(providers, state, kind) {
            Ok(result) => DeletionOutcome::from_result(result),
            Err(field) => DeletionOutcome::Skipped { field },
        };
        log_outcome(kind, &outcome);
        report.outcomes.push((kind, outcome));
    }
    report
}

/// Issues the delete call for `kind`, or returns the name of the missing
/// state field.
fn request_deletion(
    providers: Providers<'_>,
    state: &DeploymentState,
    kind: ResourceKind,
) -> Result<Result<(), ProviderError>, &'static str> {
    let config = &state.config;
    let recorded = |field: ResourceField| state.resources.get(field).ok_or(field.as_str());

    Ok(match kind {
        ResourceKind::Stage => providers
            .gateway
            .delete_stage(recorded(ResourceField::ApiId)?, &config.api_stage_name),
        ResourceKind::Route => providers.gateway.delete_route(
            recorded(ResourceField::ApiId)?,
            recorded(ResourceField::RouteId)?,
        ),
        ResourceKind::Integration => providers.gateway.delete_integration(
            recorded(ResourceField::ApiId)?,
            recorded(ResourceField::IntegrationId)?,
        ),
        ResourceKind::Function => providers
            .functions
            .delete_function(&config.lambda_function_name),
        ResourceKind::Authorizer => providers.gateway.delete_authorizer(
            recorded(ResourceField::ApiId)?,
            recorded(ResourceField::AuthorizerId)?,
        ),
        ResourceKind::Api => providers
            .gateway
            .delete_api(recorded(ResourceField::ApiId)?),
        ResourceKind::ExecutionRole => delete_role(providers.roles, &config.lambda_role_name),
        ResourceKind::AppClient => providers.identity.delete_app_client(
            recorded(ResourceField::UserPoolId)?,
            recorded(ResourceField::AppClientId)?,
        ),
        ResourceKind::ResourceServer => providers.identity.delete_resource_server(
            recorded(ResourceField::UserPoolId)?,
            recorded(ResourceField::ResourceServerId)?,
        ),
        ResourceKind::User => providers.identity.delete_user(
            recorded(ResourceField::UserPoolId)?,
            &config.user_pool_username,
        ),
        ResourceKind::AuthDomain => providers.identity.delete_domain(
            recorded(ResourceField::UserPoolId)?,
            recorded(ResourceField::AuthDomainPrefix)?,
        ),
        ResourceKind::UserPool => providers
            .identity
            .delete_user_pool(recorded(ResourceField::UserPoolId)?),
    })
}

/// A role with attached policies cannot be deleted, so detach first. The
/// detach is best-effort: the policy may already be gone.
fn delete_role(roles: &dyn RoleManager, role_name: &str) -> Result<(), ProviderError> {
    if let Err(error) = roles.detach_policy(role_name, BASIC_EXECUTION_POLICY_ARN) {
        warn!(role_name, %error, "could not detach the basic execution policy");
    }
    roles.delete_role(role_name)
}

fn log_outcome(kind: ResourceKind, outcome: &DeletionOutcome) {
    match outcome {
        DeletionOutcome::Deleted => info!(resource = %kind, "deleted"),
        DeletionOutcome::NotFound(message) => {
            warn!(resource = %kind, %message, "already deleted")
        }
        DeletionOutcome::Failed(message) => error!(resource = %kind, %message, "delete failed"),
        DeletionOutcome::Skipped { field } => {
            warn!(resource = %kind, field, "skipped, identifier was never recorded")
        }
    }
}

/// Deletes every stream of the function's log group, then the group.
pub fn purge_logs(logs: &dyn LogStore, function_name: &str) -> DeletionOutcome {
    let log_group = naming::function_log_group(function_name);
    let result = logs.list_log_streams(&log_group).and_then(|streams| {
        for stream in &streams {
            logs.delete_log_stream(&log_group, stream)?;
        }
        info!(%log_group, streams = streams.len(), "log streams deleted");
        logs.delete_log_group(&log_group)
    });

    let outcome = DeletionOutcome::from_result(result);
    match &outcome {
        DeletionOutcome::Deleted => info!(%log_group, "log group deleted"),
        DeletionOutcome::NotFound(message) => warn!(%log_group, %message, "log group not found"),
        DeletionOutcome::Failed(message) => error!(%log_group, %message, "log purge failed"),
        DeletionOutcome::Skipped { .. } => {}
    }
    outcome
}
