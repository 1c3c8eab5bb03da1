use aws_sdk_apigatewayv2::types::{
    AuthorizationType, AuthorizerType, IntegrationType, JwtConfiguration, ProtocolType,
};

use super::block_on;
use super::error::{classify, ProviderError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizerRequest {
    pub api_id: String,
    pub name: String,
    pub identity_source: String,
    pub issuer: String,
    pub audience: String,
}

/// Lambda proxy integration using payload format 2.0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrationRequest {
    pub api_id: String,
    pub function_arn: String,
    pub method: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRequest {
    pub api_id: String,
    pub route_key: String,
    pub authorizer_id: String,
    pub authorization_scopes: Vec<String>,
    pub target: String,
}

pub trait ApiGateway {
    /// Returns the new API id.
    fn create_http_api(&self, name: &str) -> Result<String, ProviderError>;
    fn create_jwt_authorizer(&self, request: &AuthorizerRequest) -> Result<String, ProviderError>;
    fn create_integration(&self, request: &IntegrationRequest) -> Result<String, ProviderError>;
    fn create_route(&self, request: &RouteRequest) -> Result<String, ProviderError>;
    fn create_auto_deploy_stage(&self, api_id: &str, stage_name: &str)
        -> Result<(), ProviderError>;

    fn delete_stage(&self, api_id: &str, stage_name: &str) -> Result<(), ProviderError>;
    fn delete_route(&self, api_id: &str, route_id: &str) -> Result<(), ProviderError>;
    fn delete_integration(&self, api_id: &str, integration_id: &str) -> Result<(), ProviderError>;
    fn delete_authorizer(&self, api_id: &str, authorizer_id: &str) -> Result<(), ProviderError>;
    fn delete_api(&self, api_id: &str) -> Result<(), ProviderError>;
}

pub struct ApiGatewayV2 {
    client: aws_sdk_apigatewayv2::Client,
}

impl ApiGatewayV2 {
    pub fn new(client: aws_sdk_apigatewayv2::Client) -> Self {
        Self { client }
    }
}

impl ApiGateway for ApiGatewayV2 {
    fn create_http_api(&self, name: &str) -> Result<String, ProviderError> {
        let output = block_on(
            self.client
                .create_api()
                .name(name)
                .protocol_type(ProtocolType::Http)
                .send(),
        )
        .map_err(classify)?;
        output
            .api_id()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::missing_output("CreateApi", "ApiId"))
    }

    fn create_jwt_authorizer(&self, request: &AuthorizerRequest) -> Result<String, ProviderError> {
        let jwt_configuration = JwtConfiguration::builder()
            .issuer(&request.issuer)
            .audience(&request.audience)
            .build();
        let output = block_on(
            self.client
                .create_authorizer()
                .api_id(&request.api_id)
                .name(&request.name)
                .authorizer_type(AuthorizerType::Jwt)
                .identity_source(&request.identity_source)
                .jwt_configuration(jwt_configuration)
                .send(),
        )
        .map_err(classify)?;
        output
            .authorizer_id()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::missing_output("CreateAuthorizer", "AuthorizerId"))
    }

    fn create_integration(&self, request: &IntegrationRequest) -> Result<String, ProviderError> {
        let output = block_on(
            self.client
                .create_integration()
                .api_id(&request.api_id)
                .integration_type(IntegrationType::AwsProxy)
                .integration_uri(&request.function_arn)
                .integration_method(&request.method)
                .payload_format_version("2.0")
                .send(),
        )
        .map_err(classify)?;
        output
            .integration_id()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::missing_output("CreateIntegration", "IntegrationId"))
    }

    fn create_route(&self, request: &RouteRequest) -> Result<String, ProviderError> {
        let output = block_on(
            self.client
                .create_route()
                .api_id(&request.api_id)
                .route_key(&request.route_key)
                .authorization_type(AuthorizationType::Jwt)
                .set_authorization_scopes(Some(request.authorization_scopes.clone()))
                .authorizer_id(&request.authorizer_id)
                .target(&request.target)
                .send(),
        )
        .map_err(classify)?;
        output
            .route_id()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::missing_output("CreateRoute", "RouteId"))
    }

    fn create_auto_deploy_stage(
        &self,
        api_id: &str,
        stage_name: &str,
    ) -> Result<(), ProviderError> {
        block_on(
            self.client
                .create_stage()
                .api_id(api_id)
                .stage_name(stage_name)
                .auto_deploy(true)
                .send(),
        )
        .map(|_| ())
        .map_err(classify)
    }

    fn delete_stage(&self, api_id: &str, stage_name: &str) -> Result<(), ProviderError> {
        block_on(
            self.client
                .delete_stage()
                .api_id(api_id)
                .stage_name(stage_name)
                .send(),
        )
        .map(|_| ())
        .map_err(classify)
    }

    fn delete_route(&self, api_id: &str, route_id: &str) -> Result<(), ProviderError> {
        block_on(
            self.client
                .delete_route()
                .api_id(api_id)
                .route_id(route_id)
                .send(),
        )
        .map(|_| ())
        .map_err(classify)
    }

    fn delete_integration(&self, api_id: &str, integration_id: &str) -> Result<(), ProviderError> {
        block_on(
            self.client
                .delete_integration()
                .api_id(api_id)
                .integration_id(integration_id)
                .send(),
        )
        .map(|_| ())
        .map_err(classify)
    }

    fn delete_authorizer(&self, api_id: &str, authorizer_id: &str) -> Result<(), ProviderError> {
        block_on(
            self.client
                .delete_authorizer()
                .api_id(api_id)
                .authorizer_id(authorizer_id)
                .send(),
        )
        .map(|_| ())
        .map_err(classify)
    }

    fn delete_api(&self, api_id: &str) -> Result<(), ProviderError> {
        block_on(self.client.delete_api().api_id(api_id).send())
            .map(|_| ())
            .map_err(classify)
    }
}
