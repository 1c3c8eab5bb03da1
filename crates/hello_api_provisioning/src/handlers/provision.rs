//! Creates the demo deployment one resource at a time.
//!
//! Every identifier a step produces is recorded in the state before the next
//! step starts, so later steps read their inputs from the state and a failed
//! run still leaves behind a record of what exists.

use std::fmt;
use std::time::Duration;

use hello_api_core::naming::{
    self, API_GATEWAY_PRINCIPAL, AUTHORIZER_NAME, BASIC_EXECUTION_POLICY_ARN, INVOKE_ACTION,
    JWT_IDENTITY_SOURCE, LAMBDA_TRUST_POLICY,
};
use hello_api_core::scopes::RouteAuthorization;
use hello_api_core::state::{DeploymentState, ResourceField, StateError};
use tracing::{error, info};

use crate::adapters::{
    AppClientRequest, AuthorizerRequest, FunctionRequest, IntegrationRequest,
    InvokePermissionRequest, ProviderError, Providers, RouteRequest, UserPoolRequest,
};
use crate::handlers::consistency::{
    retry_while, wait_until, Backoff, ConsistencyError, ConsistencyPolicy,
};
use crate::handlers::package::{FunctionPackage, PackagingError, FUNCTION_DESCRIPTION};

pub const PASSWORD_ENV: &str = "PASSWORD";
pub const DOMAIN_PREFIX_ENV: &str = "DOMAIN_PREFIX";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    UserPool,
    AuthDomain,
    ResourceServer,
    AppClient,
    TestUser,
    HttpApi,
    Authorizer,
    ExecutionRole,
    RolePropagation,
    Function,
    InvokePermission,
    Integration,
    Route,
    Stage,
}

impl ProvisionStep {
    pub const ALL: [Self; 14] = [
        Self::UserPool,
        Self::AuthDomain,
        Self::ResourceServer,
        Self::AppClient,
        Self::TestUser,
        Self::HttpApi,
        Self::Authorizer,
        Self::ExecutionRole,
        Self::RolePropagation,
        Self::Function,
        Self::InvokePermission,
        Self::Integration,
        Self::Route,
        Self::Stage,
    ];

    pub fn describe(self) -> &'static str {
        match self {
            Self::UserPool => "create user pool",
            Self::AuthDomain => "create auth domain",
            Self::ResourceServer => "create resource server",
            Self::AppClient => "create app client",
            Self::TestUser => "create test user",
            Self::HttpApi => "create HTTP API",
            Self::Authorizer => "create JWT authorizer",
            Self::ExecutionRole => "create execution role",
            Self::RolePropagation => "wait for execution role",
            Self::Function => "create function",
            Self::InvokePermission => "grant invoke permission",
            Self::Integration => "create integration",
            Self::Route => "create route",
            Self::Stage => "create stage",
        }
    }
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error(
        "provide the '{}' and '{}' environment variables",
        PASSWORD_ENV,
        DOMAIN_PREFIX_ENV
    )]
    MissingEnvironment,
    #[error("{step} failed: {source}")]
    Provider {
        step: ProvisionStep,
        #[source]
        source: ProviderError,
    },
    #[error(transparent)]
    State(#[from] StateError),
    #[error("{step} did not converge within {waited:?} ({attempts} attempts)")]
    ConsistencyTimeout {
        step: ProvisionStep,
        waited: Duration,
        attempts: u32,
    },
    #[error(transparent)]
    Packaging(#[from] PackagingError),
}

impl ProvisionError {
    fn at(step: ProvisionStep) -> impl Fn(ProviderError) -> Self {
        move |source| Self::Provider { step, source }
    }

    fn converging(step: ProvisionStep, error: ConsistencyError) -> Self {
        match error {
            ConsistencyError::Timeout { waited, attempts } => Self::ConsistencyTimeout {
                step,
                waited,
                attempts,
            },
            ConsistencyError::Provider(source) => Self::Provider { step, source },
        }
    }
}

/// Values supplied by the operator rather than derived from state.
#[derive(Clone)]
pub struct ProvisionInputs {
    pub password: String,
    pub domain_prefix: String,
    pub package: FunctionPackage,
    pub consistency: ConsistencyPolicy,
}

impl fmt::Debug for ProvisionInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisionInputs")
            .field("password", &"<redacted>")
            .field("domain_prefix", &self.domain_prefix)
            .field("package", &self.package)
            .field("consistency", &self.consistency)
            .finish()
    }
}

impl ProvisionInputs {
    /// Both the password and the domain prefix must be present and non-blank.
    pub fn new(
        password: Option<String>,
        domain_prefix: Option<String>,
        package: FunctionPackage,
        consistency: ConsistencyPolicy,
    ) -> Result<Self, ProvisionError> {
        let present = |value: Option<String>| value.filter(|value| !value.trim().is_empty());
        match (present(password), present(domain_prefix)) {
            (Some(password), Some(domain_prefix)) => Ok(Self {
                password,
                domain_prefix,
                package,
                consistency,
            }),
            _ => Err(ProvisionError::MissingEnvironment),
        }
    }
}

#[derive(Debug)]
pub struct ProvisionReport {
    pub completed_steps: Vec<ProvisionStep>,
    pub failure: Option<ProvisionError>,
}

impl ProvisionReport {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Runs every step in order, stopping at the first failure. The state holds
/// whatever was created either way and should be saved by the caller.
pub fn provision(
    providers: Providers<'_>,
    state: &mut DeploymentState,
    inputs: &ProvisionInputs,
) -> ProvisionReport {
    let mut provisioner = Provisioner {
        providers,
        inputs,
        backoff: None,
    };
    let mut completed_steps = Vec::with_capacity(ProvisionStep::ALL.len());

    for step in ProvisionStep::ALL {
        if let Err(failure) = provisioner.run(step, state) {
            error!(%step, error = %failure, "provisioning stopped");
            return ProvisionReport {
                completed_steps,
                failure: Some(failure),
            };
        }
        completed_steps.push(step);
    }

    if let Some(api_url) = state.resources.get(ResourceField::ApiUrl) {
        info!(api_url, "API available");
    }
    ProvisionReport {
        completed_steps,
        failure: None,
    }
}

struct Provisioner<'a> {
    providers: Providers<'a>,
    inputs: &'a ProvisionInputs,
    /// Started once the role exists; the function step keeps the same deadline.
    backoff: Option<Backoff>,
}

impl Provisioner<'_> {
    fn run(
        &mut self,
        step: ProvisionStep,
        state: &mut DeploymentState,
    ) -> Result<(), ProvisionError> {
        match step {
            ProvisionStep::UserPool => self.create_user_pool(state),
            ProvisionStep::AuthDomain => self.create_auth_domain(state),
            ProvisionStep::ResourceServer => self.create_resource_server(state),
            ProvisionStep::AppClient => self.create_app_client(state),
            ProvisionStep::TestUser => self.create_test_user(state),
            ProvisionStep::HttpApi => self.create_http_api(state),
            ProvisionStep::Authorizer => self.create_authorizer(state),
            ProvisionStep::ExecutionRole => self.create_execution_role(state),
            ProvisionStep::RolePropagation => self.wait_for_role(state),
            ProvisionStep::Function => self.create_function(state),
            ProvisionStep::InvokePermission => self.grant_invoke_permission(state),
            ProvisionStep::Integration => self.create_integration(state),
            ProvisionStep::Route => self.create_route(state),
            ProvisionStep::Stage => self.create_stage(state),
        }
    }

    fn create_user_pool(&mut self, state: &mut DeploymentState) -> Result<(), ProvisionError> {
        let request = UserPoolRequest::relaxed(&state.config.user_pool_name);
        let user_pool_id = self
            .providers
            .identity
            .create_user_pool(&request)
            .map_err(ProvisionError::at(ProvisionStep::UserPool))?;

        let issuer_url = naming::issuer_url(&state.config.region, &user_pool_id);
        info!(%user_pool_id, %issuer_url, "user pool created");
        state.resources.user_pool_id = Some(user_pool_id);
        state.resources.user_pool_jwt_issuer_url = Some(issuer_url);
        Ok(())
    }

    fn create_auth_domain(&mut self, state: &mut DeploymentState) -> Result<(), ProvisionError> {
        let user_pool_id = state
            .resources
            .require(ResourceField::UserPoolId, "create the auth domain")?;
        let prefix = &self.inputs.domain_prefix;
        self.providers
            .identity
            .create_domain(user_pool_id, prefix)
            .map_err(ProvisionError::at(ProvisionStep::AuthDomain))?;

        let auth_domain = naming::auth_domain_url(prefix, &state.config.region);
        info!(%auth_domain, "sign-in domain created");
        state.resources.user_pool_auth_domain_prefix = Some(prefix.clone());
        state.resources.user_pool_auth_domain = Some(auth_domain);
        Ok(())
    }

    fn create_resource_server(
        &mut self,
        state: &mut DeploymentState,
    ) -> Result<(), ProvisionError> {
        let user_pool_id = state
            .resources
            .require(ResourceField::UserPoolId, "create the resource server")?;
        let identifier = self
            .providers
            .identity
            .create_resource_server(
                user_pool_id,
                &state.config.api_name,
                &state.config.api_scopes,
            )
            .map_err(ProvisionError::at(ProvisionStep::ResourceServer))?;

        info!(resource_server_id = %identifier, "resource server created");
        state.resources.user_pool_resource_server_id = Some(identifier);
        Ok(())
    }

    fn create_app_client(&mut self, state: &mut DeploymentState) -> Result<(), ProvisionError> {
        let user_pool_id = state
            .resources
            .require(ResourceField::UserPoolId, "create the app client")?;
        let request = AppClientRequest::terminal_app(
            user_pool_id,
            state.config.terminal_app_scopes.clone(),
            state.config.terminal_app_callback_urls.clone(),
        );
        let client_id = self
            .providers
            .identity
            .create_app_client(&request)
            .map_err(ProvisionError::at(ProvisionStep::AppClient))?;

        info!(%client_id, "terminal app client created");
        state.resources.terminal_app_client_id = Some(client_id);
        Ok(())
    }

    fn create_test_user(&mut self, state: &mut DeploymentState) -> Result<(), ProvisionError> {
        let user_pool_id = state
            .resources
            .require(ResourceField::UserPoolId, "create the test user")?;
        let config = &state.config;
        let identity = self.providers.identity;
        identity
            .create_user(
                user_pool_id,
                &config.user_pool_username,
                &config.user_pool_email,
            )
            .and_then(|()| {
                identity.set_permanent_password(
                    user_pool_id,
                    &config.user_pool_username,
                    &self.inputs.password,
                )
            })
            .map_err(ProvisionError::at(ProvisionStep::TestUser))?;

        info!(
            username = %config.user_pool_username,
            email = %config.user_pool_email,
            user_pool_id,
            "test user created"
        );
        Ok(())
    }

    fn create_http_api(&mut self, state: &mut DeploymentState) -> Result<(), ProvisionError> {
        let api_id = self
            .providers
            .gateway
            .create_http_api(&state.config.api_name)
            .map_err(ProvisionError::at(ProvisionStep::HttpApi))?;

        info!(api_name = %state.config.api_name, %api_id, "HTTP API created");
        state.resources.api_id = Some(api_id);
        Ok(())
    }

    fn create_authorizer(&mut self, state: &mut DeploymentState) -> Result<(), ProvisionError> {
        const OPERATION: &str = "create the JWT authorizer";
        let resources = &state.resources;
        let request = AuthorizerRequest {
            api_id: resources
                .require(ResourceField::ApiId, OPERATION)?
                .to_string(),
            name: AUTHORIZER_NAME.to_string(),
            identity_source: JWT_IDENTITY_SOURCE.to_string(),
            issuer: resources
                .require(ResourceField::IssuerUrl, OPERATION)?
                .to_string(),
            audience: resources
                .require(ResourceField::AppClientId, OPERATION)?
                .to_string(),
        };
        let authorizer_id = self
            .providers
            .gateway
            .create_jwt_authorizer(&request)
            .map_err(ProvisionError::at(ProvisionStep::Authorizer))?;

        info!(%authorizer_id, "JWT authorizer created");
        state.resources.api_authorizer_id = Some(authorizer_id);
        Ok(())
    }

    fn create_execution_role(&mut self, state: &mut DeploymentState) -> Result<(), ProvisionError> {
        let role_name = &state.config.lambda_role_name;
        let roles = self.providers.roles;
        let role_arn = roles
            .create_role(role_name, LAMBDA_TRUST_POLICY)
            .map_err(ProvisionError::at(ProvisionStep::ExecutionRole))?;
        state.resources.lambda_role_arn = Some(role_arn.clone());

        roles
            .attach_policy(role_name, BASIC_EXECUTION_POLICY_ARN)
            .map_err(ProvisionError::at(ProvisionStep::ExecutionRole))?;
        info!(%role_arn, "execution role created");
        Ok(())
    }

    fn wait_for_role(&mut self, state: &mut DeploymentState) -> Result<(), ProvisionError> {
        let role_name = &state.config.lambda_role_name;
        let roles = self.providers.roles;
        let policy = self.inputs.consistency;
        let backoff = self.backoff.insert(Backoff::start(policy));
        wait_until(backoff, || roles.trust_policy_visible(role_name))
            .map_err(|error| ProvisionError::converging(ProvisionStep::RolePropagation, error))?;

        info!(role_name = %role_name, attempts = backoff.attempts(), "trust policy visible");
        Ok(())
    }

    fn create_function(&mut self, state: &mut DeploymentState) -> Result<(), ProvisionError> {
        let role_arn = state
            .resources
            .require(ResourceField::RoleArn, "create the function")?;
        let package = &self.inputs.package;
        let request = FunctionRequest {
            function_name: state.config.lambda_function_name.clone(),
            role_arn: role_arn.to_string(),
            runtime: package.runtime(),
            handler: package.handler().to_string(),
            description: FUNCTION_DESCRIPTION.to_string(),
            zip: package.archive()?,
        };
        info!(function_name = %request.function_name, %role_arn, "creating function");

        let functions = self.providers.functions;
        let consistency = self.inputs.consistency;
        let backoff = self
            .backoff
            .get_or_insert_with(|| Backoff::start(consistency));
        let function_arn = retry_while(
            backoff,
            || functions.create_function(&request),
            ProviderError::is_role_propagation,
        )
        .map_err(|error| ProvisionError::converging(ProvisionStep::Function, error))?;

        info!(%function_arn, "function created");
        state.resources.lambda_function_arn = Some(function_arn);
        Ok(())
    }

    fn grant_invoke_permission(
        &mut self,
        state: &mut DeploymentState,
    ) -> Result<(), ProvisionError> {
        let api_id = state
            .resources
            .require(ResourceField::ApiId, "grant the invoke permission")?;
        let account_id = self
            .providers
            .account
            .account_id()
            .map_err(ProvisionError::at(ProvisionStep::InvokePermission))?;
        let request = InvokePermissionRequest {
            function_name: state.config.lambda_function_name.clone(),
            statement_id: naming::permission_statement_id(api_id),
            action: INVOKE_ACTION.to_string(),
            principal: API_GATEWAY_PRINCIPAL.to_string(),
            source_arn: naming::execute_api_source_arn(&state.config.region, &account_id, api_id),
        };
        self.providers
            .functions
            .add_invoke_permission(&request)
            .map_err(ProvisionError::at(ProvisionStep::InvokePermission))?;

        info!(statement_id = %request.statement_id, "API Gateway may invoke the function");
        Ok(())
    }

    fn create_integration(&mut self, state: &mut DeploymentState) -> Result<(), ProvisionError> {
        const OPERATION: &str = "create the integration";
        let request = IntegrationRequest {
            api_id: state
                .resources
                .require(ResourceField::ApiId, OPERATION)?
                .to_string(),
            function_arn: state
                .resources
                .require(ResourceField::FunctionArn, OPERATION)?
                .to_string(),
            method: state.config.api_route_method.clone(),
        };
        let integration_id = self
            .providers
            .gateway
            .create_integration(&request)
            .map_err(ProvisionError::at(ProvisionStep::Integration))?;

        info!(%integration_id, "integration created");
        state.resources.api_integration_id = Some(integration_id);
        Ok(())
    }

    fn create_route(&mut self, state: &mut DeploymentState) -> Result<(), ProvisionError> {
        const OPERATION: &str = "create the route";
        let resources = &state.resources;
        let config = &state.config;
        let integration_id = resources.require(ResourceField::IntegrationId, OPERATION)?;
        // any one of these scopes in the access token grants access
        let authorization = RouteAuthorization::for_config(config);
        let request = RouteRequest {
            api_id: resources
                .require(ResourceField::ApiId, OPERATION)?
                .to_string(),
            route_key: naming::route_key(&config.api_route_method, &config.api_route_path),
            authorizer_id: resources
                .require(ResourceField::AuthorizerId, OPERATION)?
                .to_string(),
            authorization_scopes: authorization
                .required_scopes()
                .map(str::to_string)
                .collect(),
            target: naming::integration_target(integration_id),
        };
        let route_id = self
            .providers
            .gateway
            .create_route(&request)
            .map_err(ProvisionError::at(ProvisionStep::Route))?;

        info!(route_key = %request.route_key, %route_id, "route created");
        state.resources.api_route_id = Some(route_id);
        Ok(())
    }

    fn create_stage(&mut self, state: &mut DeploymentState) -> Result<(), ProvisionError> {
        let api_id = state
            .resources
            .require(ResourceField::ApiId, "create the stage")?
            .to_string();
        let config = &state.config;
        self.providers
            .gateway
            .create_auto_deploy_stage(&api_id, &config.api_stage_name)
            .map_err(ProvisionError::at(ProvisionStep::Stage))?;
        info!(stage = %config.api_stage_name, "auto-deploy stage created");

        let api_url = naming::api_url(
            &api_id,
            &config.region,
            &config.api_stage_name,
            &config.api_route_path,
        );
        state.resources.api_url = Some(api_url);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_run_in_dependency_order() {
        let position = |step| {
            ProvisionStep::ALL
                .iter()
                .position(|candidate| *candidate == step)
                .expect("step listed")
        };
        assert!(position(ProvisionStep::AppClient) < position(ProvisionStep::Authorizer));
        assert!(position(ProvisionStep::RolePropagation) < position(ProvisionStep::Function));
        assert!(position(ProvisionStep::Function) < position(ProvisionStep::Integration));
        assert!(position(ProvisionStep::Integration) < position(ProvisionStep::Route));
        assert_eq!(ProvisionStep::ALL.last(), Some(&ProvisionStep::Stage));
    }

    #[test]
    fn inputs_require_password_and_domain_prefix() {
        let build = |password: Option<&str>, prefix: Option<&str>| {
            ProvisionInputs::new(
                password.map(str::to_string),
                prefix.map(str::to_string),
                FunctionPackage::InlinePython,
                ConsistencyPolicy::default(),
            )
        };

        assert!(build(Some("Secret123"), Some("demo-xyz")).is_ok());
        for (password, prefix) in [
            (None, Some("demo-xyz")),
            (Some("Secret123"), None),
            (Some("  "), Some("demo-xyz")),
        ] {
            let error = build(password, prefix).expect_err("incomplete environment");
            assert_eq!(
                error.to_string(),
                "provide the 'PASSWORD' and 'DOMAIN_PREFIX' environment variables"
            );
        }
    }

    #[test]
    fn debug_output_hides_the_password() {
        let inputs = ProvisionInputs::new(
            Some("Secret123".to_string()),
            Some("demo-xyz".to_string()),
            FunctionPackage::InlinePython,
            ConsistencyPolicy::default(),
        )
        .expect("complete");
        let rendered = format!("{inputs:?}");
        assert!(!rendered.contains("Secret123"));
        assert!(rendered.contains("demo-xyz"));
    }
}
