//! Provider seams. Each trait is the narrow slice of one AWS service that the
//! provisioning and decommissioning sequences use; the SDK-backed types bridge
//! into the async clients, and tests substitute recording fakes.

pub mod account;
pub mod error;
pub mod functions;
pub mod gateway;
pub mod identity;
pub mod logs;
pub mod roles;

use std::future::Future;

pub use account::{AccountLookup, StsAccountLookup};
pub use error::ProviderError;
pub use functions::{
    FunctionManager, FunctionRequest, FunctionRuntime, InvokePermissionRequest,
    LambdaFunctionManager,
};
pub use gateway::{ApiGateway, ApiGatewayV2, AuthorizerRequest, IntegrationRequest, RouteRequest};
pub use identity::{AppClientRequest, CognitoIdentityProvider, IdentityProvider, UserPoolRequest};
pub use logs::{CloudWatchLogStore, LogStore};
pub use roles::{IamRoleManager, RoleManager};

/// Client handles shared by the provisioning and decommissioning sequences.
#[derive(Clone, Copy)]
pub struct Providers<'a> {
    pub identity: &'a dyn IdentityProvider,
    pub gateway: &'a dyn ApiGateway,
    pub roles: &'a dyn RoleManager,
    pub functions: &'a dyn FunctionManager,
    pub account: &'a dyn AccountLookup,
}

/// SDK-backed handles built from one shared AWS configuration.
pub struct AwsProviders {
    pub identity: CognitoIdentityProvider,
    pub gateway: ApiGatewayV2,
    pub roles: IamRoleManager,
    pub functions: LambdaFunctionManager,
    pub account: StsAccountLookup,
    pub logs: CloudWatchLogStore,
}

impl AwsProviders {
    pub fn from_config(config: &aws_config::SdkConfig) -> Self {
        let cognito = aws_sdk_cognitoidentityprovider::Client::new(config);
        Self {
            identity: CognitoIdentityProvider::new(cognito),
            gateway: ApiGatewayV2::new(aws_sdk_apigatewayv2::Client::new(config)),
            roles: IamRoleManager::new(aws_sdk_iam::Client::new(config)),
            functions: LambdaFunctionManager::new(aws_sdk_lambda::Client::new(config)),
            account: StsAccountLookup::new(aws_sdk_sts::Client::new(config)),
            logs: CloudWatchLogStore::new(aws_sdk_cloudwatchlogs::Client::new(config)),
        }
    }

    pub fn handles(&self) -> Providers<'_> {
        Providers {
            identity: &self.identity,
            gateway: &self.gateway,
            roles: &self.roles,
            functions: &self.functions,
            account: &self.account,
        }
    }
}

/// Loads the shared SDK configuration, honouring an explicit region override.
pub async fn load_sdk_config(region: Option<String>) -> aws_config::SdkConfig {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(aws_config::Region::new(region));
    }
    loader.load().await
}

/// Runs an SDK future from synchronous adapter code on the multi-threaded runtime.
pub(crate) fn block_on<F: Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
