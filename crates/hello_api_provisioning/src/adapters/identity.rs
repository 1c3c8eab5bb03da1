use aws_sdk_cognitoidentityprovider::types::{
    AttributeDataType, AttributeType, MessageActionType, OAuthFlowType, PasswordPolicyType,
    ResourceServerScopeType, SchemaAttributeType, UserPoolPolicyType, VerifiedAttributeType,
};
use hello_api_core::naming::{APP_CLIENT_NAME, IDENTITY_PROVIDER_NAME};
use hello_api_core::state::ApiScope;

use super::block_on;
use super::error::{classify, ProviderError};

/// User pool settings for the demo: email sign-in, relaxed password rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPoolRequest {
    pub pool_name: String,
    pub minimum_password_length: i32,
    pub temporary_password_validity_days: i32,
}

impl UserPoolRequest {
    pub fn relaxed(pool_name: impl Into<String>) -> Self {
        Self {
            pool_name: pool_name.into(),
            minimum_password_length: 8,
            temporary_password_validity_days: 7,
        }
    }
}

/// Public OAuth client using the authorization code flow without a secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppClientRequest {
    pub user_pool_id: String,
    pub client_name: String,
    pub allowed_scopes: Vec<String>,
    pub callback_urls: Vec<String>,
}

impl AppClientRequest {
    pub fn terminal_app(
        user_pool_id: impl Into<String>,
        allowed_scopes: Vec<String>,
        callback_urls: Vec<String>,
    ) -> Self {
        Self {
            user_pool_id: user_pool_id.into(),
            client_name: APP_CLIENT_NAME.to_string(),
            allowed_scopes,
            callback_urls,
        }
    }
}

pub trait IdentityProvider {
    /// Returns the new user pool id.
    fn create_user_pool(&self, request: &UserPoolRequest) -> Result<String, ProviderError>;
    fn create_domain(&self, user_pool_id: &str, domain_prefix: &str) -> Result<(), ProviderError>;
    /// Returns the resource server identifier.
    fn create_resource_server(
        &self,
        user_pool_id: &str,
        identifier: &str,
        scopes: &[ApiScope],
    ) -> Result<String, ProviderError>;
    /// Returns the client id.
    fn create_app_client(&self, request: &AppClientRequest) -> Result<String, ProviderError>;
    fn create_user(
        &self,
        user_pool_id: &str,
        username: &str,
        email: &str,
    ) -> Result<(), ProviderError>;
    fn set_permanent_password(
        &self,
        user_pool_id: &str,
        username: &str,
        password: &str,
    ) -> Result<(), ProviderError>;

    fn delete_user(&self, user_pool_id: &str, username: &str) -> Result<(), ProviderError>;
    fn delete_resource_server(
        &self,
        user_pool_id: &str,
        identifier: &str,
    ) -> Result<(), ProviderError>;
    fn delete_domain(&self, user_pool_id: &str, domain_prefix: &str) -> Result<(), ProviderError>;
    fn delete_app_client(&self, user_pool_id: &str, client_id: &str) -> Result<(), ProviderError>;
    fn delete_user_pool(&self, user_pool_id: &str) -> Result<(), ProviderError>;
}

pub struct CognitoIdentityProvider {
    client: aws_sdk_cognitoidentityprovider::Client,
}

impl CognitoIdentityProvider {
    pub fn new(client: aws_sdk_cognitoidentityprovider::Client) -> Self {
        Self { client }
    }
}

impl IdentityProvider for CognitoIdentityProvider {
    fn create_user_pool(&self, request: &UserPoolRequest) -> Result<String, ProviderError> {
        let password_policy = PasswordPolicyType::builder()
            .minimum_length(request.minimum_password_length)
            .require_uppercase(false)
            .require_lowercase(false)
            .require_numbers(false)
            .require_symbols(false)
            .temporary_password_validity_days(request.temporary_password_validity_days)
            .build();
        let email_attribute = SchemaAttributeType::builder()
            .name("email")
            .required(true)
            .attribute_data_type(AttributeDataType::String)
            .build();

        let output = block_on(
            self.client
                .create_user_pool()
                .pool_name(&request.pool_name)
                .auto_verified_attributes(VerifiedAttributeType::Email)
                .policies(
                    UserPoolPolicyType::builder()
                        .password_policy(password_policy)
                        .build(),
                )
                .schema(email_attribute)
                .send(),
        )
        .map_err(classify)?;

        output
            .user_pool()
            .and_then(|pool| pool.id())
            .map(str::to_string)
            .ok_or_else(|| ProviderError::missing_output("CreateUserPool", "UserPool.Id"))
    }

    fn create_domain(&self, user_pool_id: &str, domain_prefix: &str) -> Result<(), ProviderError> {
        block_on(
            self.client
                .create_user_pool_domain()
                .domain(domain_prefix)
                .user_pool_id(user_pool_id)
                .send(),
        )
        .map(|_| ())
        .map_err(classify)
    }

    fn create_resource_server(
        &self,
        user_pool_id: &str,
        identifier: &str,
        scopes: &[ApiScope],
    ) -> Result<String, ProviderError> {
        let scopes = scopes
            .iter()
            .map(|scope| {
                ResourceServerScopeType::builder()
                    .scope_name(&scope.name)
                    .scope_description(&scope.description)
                    .build()
                    .map_err(ProviderError::invalid_request)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let output = block_on(
            self.client
                .create_resource_server()
                .user_pool_id(user_pool_id)
                .identifier(identifier)
                .name(identifier)
                .set_scopes(Some(scopes))
                .send(),
        )
        .map_err(classify)?;

        output
            .resource_server()
            .and_then(|server| server.identifier())
            .map(str::to_string)
            .ok_or_else(|| {
                ProviderError::missing_output("CreateResourceServer", "ResourceServer.Identifier")
            })
    }

    fn create_app_client(&self, request: &AppClientRequest) -> Result<String, ProviderError> {
        let output = block_on(
            self.client
                .create_user_pool_client()
                .user_pool_id(&request.user_pool_id)
                .client_name(&request.client_name)
                .generate_secret(false)
                .allowed_o_auth_flows(OAuthFlowType::Code)
                .set_allowed_o_auth_scopes(Some(request.allowed_scopes.clone()))
                .set_callback_urls(Some(request.callback_urls.clone()))
                .allowed_o_auth_flows_user_pool_client(true)
                .supported_identity_providers(IDENTITY_PROVIDER_NAME)
                .send(),
        )
        .map_err(classify)?;

        output
            .user_pool_client()
            .and_then(|client| client.client_id())
            .map(str::to_string)
            .ok_or_else(|| {
                ProviderError::missing_output("CreateUserPoolClient", "UserPoolClient.ClientId")
            })
    }

    fn create_user(
        &self,
        user_pool_id: &str,
        username: &str,
        email: &str,
    ) -> Result<(), ProviderError> {
        let attributes = [("email", email), ("email_verified", "true")]
            .into_iter()
            .map(|(name, value)| {
                AttributeType::builder()
                    .name(name)
                    .value(value)
                    .build()
                    .map_err(ProviderError::invalid_request)
            })
            .collect::<Result<Vec<_>, _>>()?;

        block_on(
            self.client
                .admin_create_user()
                .user_pool_id(user_pool_id)
                .username(username)
                .set_user_attributes(Some(attributes))
                .message_action(MessageActionType::Suppress)
                .send(),
        )
        .map(|_| ())
        .map_err(classify)
    }

    fn set_permanent_password(
        &self,
        user_pool_id: &str,
        username: &str,
        password: &str,
    ) -> Result<(), ProviderError> {
        block_on(
            self.client
                .admin_set_user_password()
                .user_pool_id(user_pool_id)
                .username(username)
                .password(password)
                .permanent(true)
                .send(),
        )
        .map(|_| ())
        .map_err(classify)
    }

    fn delete_user(&self, user_pool_id: &str, username: &str) -> Result<(), ProviderError> {
        block_on(
            self.client
                .admin_delete_user()
                .user_pool_id(user_pool_id)
                .username(username)
                .send(),
        )
        .map(|_| ())
        .map_err(classify)
    }

    fn delete_resource_server(
        &self,
        user_pool_id: &str,
        identifier: &str,
    ) -> Result<(), ProviderError> {
        block_on(
            self.client
                .delete_resource_server()
                .user_pool_id(user_pool_id)
                .identifier(identifier)
                .send(),
        )
        .map(|_| ())
        .map_err(classify)
    }

    fn delete_domain(&self, user_pool_id: &str, domain_prefix: &str) -> Result<(), ProviderError> {
        block_on(
            self.client
                .delete_user_pool_domain()
                .domain(domain_prefix)
                .user_pool_id(user_pool_id)
                .send(),
        )
        .map(|_| ())
        .map_err(classify)
    }

    fn delete_app_client(&self, user_pool_id: &str, client_id: &str) -> Result<(), ProviderError> {
        block_on(
            self.client
                .delete_user_pool_client()
                .user_pool_id(user_pool_id)
                .client_id(client_id)
                .send(),
        )
        .map(|_| ())
        .map_err(classify)
    }

    fn delete_user_pool(&self, user_pool_id: &str) -> Result<(), ProviderError> {
        block_on(
            self.client
                .delete_user_pool()
                .user_pool_id(user_pool_id)
                .send(),
        )
        .map(|_| ())
        .map_err(classify)
    }
}
