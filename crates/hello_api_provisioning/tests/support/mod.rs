#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Mutex;
use std::time::Duration;

use hello_api_core::state::{ApiScope, DeploymentConfig, DeploymentState};
use hello_api_provisioning::adapters::{
    AccountLookup, ApiGateway, AppClientRequest, AuthorizerRequest, FunctionManager,
    FunctionRequest, IdentityProvider, IntegrationRequest, InvokePermissionRequest, LogStore,
    ProviderError, Providers, RoleManager, RouteRequest, UserPoolRequest,
};
use hello_api_provisioning::handlers::consistency::ConsistencyPolicy;
use hello_api_provisioning::handlers::package::FunctionPackage;
use hello_api_provisioning::handlers::provision::{provision, ProvisionInputs, ProvisionReport};

pub const REGION: &str = "us-east-1";
pub const USER_POOL_ID: &str = "us-east-1_TestPool";
pub const CLIENT_ID: &str = "client-1";
pub const API_ID: &str = "api-1";
pub const AUTHORIZER_ID: &str = "authorizer-1";
pub const INTEGRATION_ID: &str = "integration-1";
pub const ROUTE_ID: &str = "route-1";
pub const ACCOUNT_ID: &str = "123456789012";
pub const ROLE_ARN: &str = "arn:aws:iam::123456789012:role/APIGatewayLambdaRole";
pub const FUNCTION_ARN: &str = "arn:aws:lambda:us-east-1:123456789012:function:EchoFunction";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub operation: &'static str,
    pub args: Vec<String>,
}

/// In-memory stand-in for every provider. Creates register resources and
/// deletes remove them, so deleting twice reports not-found the second time.
#[derive(Default)]
pub struct FakeCloud {
    calls: Mutex<Vec<Call>>,
    live: Mutex<BTreeSet<String>>,
    fail_on: Mutex<Option<&'static str>>,
    invisible_trust_polls: Mutex<Option<u32>>,
    role_propagation_failures: Mutex<u32>,
    log_streams: Mutex<Vec<String>>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn providers(&self) -> Providers<'_> {
        Providers {
            identity: self,
            gateway: self,
            roles: self,
            functions: self,
            account: self,
        }
    }

    pub fn fail_on(&self, operation: &'static str) {
        *self.fail_on.lock().unwrap() = Some(operation);
    }

    /// `None` keeps the trust policy invisible forever.
    pub fn trust_policy_invisible_for(&self, polls: Option<u32>) {
        *self.invisible_trust_polls.lock().unwrap() = polls;
    }

    pub fn reject_role_for(&self, attempts: u32) {
        *self.role_propagation_failures.lock().unwrap() = attempts;
    }

    pub fn with_log_streams(&self, streams: &[&str]) {
        let mut live = self.live.lock().unwrap();
        live.insert("log-group//aws/lambda/EchoFunction".to_string());
        *self.log_streams.lock().unwrap() = streams.iter().map(|name| name.to_string()).collect();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn operations(&self) -> Vec<&'static str> {
        self.calls()
            .into_iter()
            .map(|call| call.operation)
            .collect()
    }

    pub fn call(&self, operation: &str) -> Call {
        self.calls()
            .into_iter()
            .find(|call| call.operation == operation)
            .unwrap_or_else(|| panic!("{operation} was never called"))
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn live_resources(&self) -> BTreeSet<String> {
        self.live.lock().unwrap().clone()
    }

    fn record(&self, operation: &'static str, args: &[&str]) -> Result<(), ProviderError> {
        self.calls.lock().unwrap().push(Call {
            operation,
            args: args.iter().map(|arg| arg.to_string()).collect(),
        });
        if *self.fail_on.lock().unwrap() == Some(operation) {
            return Err(ProviderError::from_code(
                Some("ServiceUnavailable"),
                format!("{operation} is unavailable"),
            ));
        }
        Ok(())
    }

    fn create(&self, key: String) {
        self.live.lock().unwrap().insert(key);
    }

    fn remove(&self, key: String, not_found_code: &str) -> Result<(), ProviderError> {
        if self.live.lock().unwrap().remove(&key) {
            Ok(())
        } else {
            Err(ProviderError::from_code(Some(not_found_code), format!("{key} does not exist")))
        }
    }
}

const COGNITO_NOT_FOUND: &str = "ResourceNotFoundException";
const GATEWAY_NOT_FOUND: &str = "NotFoundException";
const IAM_NOT_FOUND: &str = "NoSuchEntity";
const LAMBDA_NOT_FOUND: &str = "ResourceNotFoundException";

impl IdentityProvider for FakeCloud {
    fn create_user_pool(&self, request: &UserPoolRequest) -> Result<String, ProviderError> {
        self.record("create_user_pool", &[&request.pool_name])?;
        self.create(format!("user-pool/{USER_POOL_ID}"));
        Ok(USER_POOL_ID.to_string())
    }

    fn create_domain(&self, user_pool_id: &str, domain_prefix: &str) -> Result<(), ProviderError> {
        self.record("create_domain", &[user_pool_id, domain_prefix])?;
        self.create(format!("domain/{user_pool_id}/{domain_prefix}"));
        Ok(())
    }

    fn create_resource_server(
        &self,
        user_pool_id: &str,
        identifier: &str,
        scopes: &[ApiScope],
    ) -> Result<String, ProviderError> {
        let mut args = vec![user_pool_id, identifier];
        args.extend(scopes.iter().map(|scope| scope.name.as_str()));
        self.record("create_resource_server", &args)?;
        self.create(format!("resource-server/{user_pool_id}/{identifier}"));
        Ok(identifier.to_string())
    }

    fn create_app_client(&self, request: &AppClientRequest) -> Result<String, ProviderError> {
        let mut args = vec![request.user_pool_id.as_str(), request.client_name.as_str()];
        args.extend(request.allowed_scopes.iter().map(String::as_str));
        args.extend(request.callback_urls.iter().map(String::as_str));
        self.record("create_app_client", &args)?;
        self.create(format!("app-client/{}/{CLIENT_ID}", request.user_pool_id));
        Ok(CLIENT_ID.to_string())
    }

    fn create_user(
        &self,
        user_pool_id: &str,
        username: &str,
        email: &str,
    ) -> Result<(), ProviderError> {
        self.record("create_user", &[user_pool_id, username, email])?;
        self.create(format!("user/{user_pool_id}/{username}"));
        Ok(())
    }

    fn set_permanent_password(
        &self,
        user_pool_id: &str,
        username: &str,
        password: &str,
    ) -> Result<(), ProviderError> {
        self.record(
            "set_permanent_password",
            &[user_pool_id, username, password],
        )
    }

    fn delete_user(&self, user_pool_id: &str, username: &str) -> Result<(), ProviderError> {
        self.record("delete_user", &[user_pool_id, username])?;
        self.remove(
            format!("user/{user_pool_id}/{username}"),
            "UserNotFoundException",
        )
    }

    fn delete_resource_server(
        &self,
        user_pool_id: &str,
        identifier: &str,
    ) -> Result<(), ProviderError> {
        self.record("delete_resource_server", &[user_pool_id, identifier])?;
        self.remove(
            format!("resource-server/{user_pool_id}/{identifier}"),
            COGNITO_NOT_FOUND,
        )
    }

    fn delete_domain(&self, user_pool_id: &str, domain_prefix: &str) -> Result<(), ProviderError> {
        self.record("delete_domain", &[user_pool_id, domain_prefix])?;
        self.remove(
            format!("domain/{user_pool_id}/{domain_prefix}"),
            COGNITO_NOT_FOUND,
        )
    }

    fn delete_app_client(&self, user_pool_id: &str, client_id: &str) -> Result<(), ProviderError> {
        self.record("delete_app_client", &[user_pool_id, client_id])?;
        self.remove(
            format!("app-client/{user_pool_id}/{client_id}"),
            COGNITO_NOT_FOUND,
        )
    }

    fn delete_user_pool(&self, user_pool_id: &str) -> Result<(), ProviderError> {
        self.record("delete_user_pool", &[user_pool_id])?;
        self.remove(format!("user-pool/{user_pool_id}"), COGNITO_NOT_FOUND)
    }
}

impl ApiGateway for FakeCloud {
    fn create_http_api(&self, name: &str) -> Result<String, ProviderError> {
        self.record("create_http_api", &[name])?;
        self.create(format!("api/{API_ID}"));
        Ok(API_ID.to_string())
    }

    fn create_jwt_authorizer(&self, request: &AuthorizerRequest) -> Result<String, ProviderError> {
        self.record(
            "create_jwt_authorizer",
            &[
                &request.api_id,
                &request.name,
                &request.identity_source,
                &request.issuer,
                &request.audience,
            ],
        )?;
        self.create(format!("authorizer/{}/{AUTHORIZER_ID}", request.api_id));
        Ok(AUTHORIZER_ID.to_string())
    }

    fn create_integration(&self, request: &IntegrationRequest) -> Result<String, ProviderError> {
        self.record(
            "create_integration",
            &[&request.api_id, &request.function_arn, &request.method],
        )?;
        self.create(format!("integration/{}/{INTEGRATION_ID}", request.api_id));
        Ok(INTEGRATION_ID.to_string())
    }

    fn create_route(&self, request: &RouteRequest) -> Result<String, ProviderError> {
        let mut args = vec![
            request.api_id.as_str(),
            request.route_key.as_str(),
            request.authorizer_id.as_str(),
            request.target.as_str(),
        ];
        args.extend(request.authorization_scopes.iter().map(String::as_str));
        self.record("create_route", &args)?;
        self.create(format!("route/{}/{ROUTE_ID}", request.api_id));
        Ok(ROUTE_ID.to_string())
    }

    fn create_auto_deploy_stage(
        &self,
        api_id: &str,
        stage_name: &str,
    ) -> Result<(), ProviderError> {
        self.record("create_auto_deploy_stage", &[api_id, stage_name])?;
        self.create(format!("stage/{api_id}/{stage_name}"));
        Ok(())
    }

    fn delete_stage(&self, api_id: &str, stage_name: &str) -> Result<(), ProviderError> {
        self.record("delete_stage", &[api_id, stage_name])?;
        self.remove(format!("stage/{api_id}/{stage_name}"), GATEWAY_NOT_FOUND)
    }

    fn delete_route(&self, api_id: &str, route_id: &str) -> Result<(), ProviderError> {
        self.record("delete_route", &[api_id, route_id])?;
        self.remove(format!("route/{api_id}/{route_id}"), GATEWAY_NOT_FOUND)
    }

    fn delete_integration(&self, api_id: &str, integration_id: &str) -> Result<(), ProviderError> {
        self.record("delete_integration", &[api_id, integration_id])?;
        self.remove(
            format!("integration/{api_id}/{integration_id}"),
            GATEWAY_NOT_FOUND,
        )
    }

    fn delete_authorizer(&self, api_id: &str, authorizer_id: &str) -> Result<(), ProviderError> {
        self.record("delete_authorizer", &[api_id, authorizer_id])?;
        self.remove(
            format!("authorizer/{api_id}/{authorizer_id}"),
            GATEWAY_NOT_FOUND,
        )
    }

    fn delete_api(&self, api_id: &str) -> Result<(), ProviderError> {
        self.record("delete_api", &[api_id])?;
        self.remove(format!("api/{api_id}"), GATEWAY_NOT_FOUND)
    }
}

impl RoleManager for FakeCloud {
    fn create_role(&self, role_name: &str, trust_policy: &str) -> Result<String, ProviderError> {
        self.record("create_role", &[role_name, trust_policy])?;
        self.create(format!("role/{role_name}"));
        Ok(ROLE_ARN.to_string())
    }

    fn attach_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), ProviderError> {
        self.record("attach_policy", &[role_name, policy_arn])?;
        self.create(format!("role-policy/{role_name}"));
        Ok(())
    }

    fn detach_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), ProviderError> {
        self.record("detach_policy", &[role_name, policy_arn])?;
        self.remove(format!("role-policy/{role_name}"), IAM_NOT_FOUND)
    }

    fn delete_role(&self, role_name: &str) -> Result<(), ProviderError> {
        self.record("delete_role", &[role_name])?;
        if self
            .live
            .lock()
            .unwrap()
            .contains(&format!("role-policy/{role_name}"))
        {
            return Err(ProviderError::from_code(
                Some("DeleteConflict"),
                "Cannot delete entity, must detach all policies first.",
            ));
        }
        self.remove(format!("role/{role_name}"), IAM_NOT_FOUND)
    }

    fn trust_policy_visible(&self, role_name: &str) -> Result<bool, ProviderError> {
        self.record("trust_policy_visible", &[role_name])?;
        let mut remaining = self.invisible_trust_polls.lock().unwrap();
        match *remaining {
            None => Ok(false),
            Some(0) => Ok(true),
            Some(ref mut polls) => {
                *polls -= 1;
                Ok(false)
            }
        }
    }
}

impl FunctionManager for FakeCloud {
    fn create_function(&self, request: &FunctionRequest) -> Result<String, ProviderError> {
        self.record(
            "create_function",
            &[
                &request.function_name,
                &request.role_arn,
                &request.handler,
                &request.description,
            ],
        )?;
        let mut failures = self.role_propagation_failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(ProviderError::from_code(
                Some("InvalidParameterValueException"),
                "The role defined for the function cannot be assumed by Lambda.",
            ));
        }
        self.create(format!("function/{}", request.function_name));
        Ok(FUNCTION_ARN.to_string())
    }

    fn add_invoke_permission(
        &self,
        request: &InvokePermissionRequest,
    ) -> Result<(), ProviderError> {
        self.record(
            "add_invoke_permission",
            &[
                &request.function_name,
                &request.statement_id,
                &request.action,
                &request.principal,
                &request.source_arn,
            ],
        )
    }

    fn delete_function(&self, function_name: &str) -> Result<(), ProviderError> {
        self.record("delete_function", &[function_name])?;
        self.remove(format!("function/{function_name}"), LAMBDA_NOT_FOUND)
    }
}

impl AccountLookup for FakeCloud {
    fn account_id(&self) -> Result<String, ProviderError> {
        self.record("account_id", &[])?;
        Ok(ACCOUNT_ID.to_string())
    }
}

impl LogStore for FakeCloud {
    fn list_log_streams(&self, log_group: &str) -> Result<Vec<String>, ProviderError> {
        self.record("list_log_streams", &[log_group])?;
        let group = format!("log-group/{log_group}");
        if !self.live.lock().unwrap().contains(&group) {
            return Err(ProviderError::from_code(
                Some("ResourceNotFoundException"),
                "The specified log group does not exist.",
            ));
        }
        Ok(self.log_streams.lock().unwrap().clone())
    }

    fn delete_log_stream(&self, log_group: &str, log_stream: &str) -> Result<(), ProviderError> {
        self.record("delete_log_stream", &[log_group, log_stream])?;
        self.log_streams
            .lock()
            .unwrap()
            .retain(|stream| stream != log_stream);
        Ok(())
    }

    fn delete_log_group(&self, log_group: &str) -> Result<(), ProviderError> {
        self.record("delete_log_group", &[log_group])?;
        self.remove(
            format!("log-group/{log_group}"),
            "ResourceNotFoundException",
        )
    }
}

pub fn fast_consistency() -> ConsistencyPolicy {
    ConsistencyPolicy {
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        timeout: Duration::from_millis(250),
    }
}

pub fn demo_inputs() -> ProvisionInputs {
    ProvisionInputs::new(
        Some("Secret123".to_string()),
        Some("demo-xyz".to_string()),
        FunctionPackage::InlinePython,
        fast_consistency(),
    )
    .expect("complete inputs")
}

pub fn fresh_state() -> DeploymentState {
    DeploymentState::new(DeploymentConfig::for_region(REGION))
}

/// A state provisioned end to end against `cloud`, with the trust policy
/// visible on the first poll.
pub fn provisioned(cloud: &FakeCloud) -> (DeploymentState, ProvisionReport) {
    cloud.trust_policy_invisible_for(Some(0));
    let mut state = fresh_state();
    let report = provision(cloud.providers(), &mut state, &demo_inputs());
    (state, report)
}
