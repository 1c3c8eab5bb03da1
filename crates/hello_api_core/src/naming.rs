//! Provider-facing names, URLs, and ARNs derived from recorded state.

pub const BASIC_EXECUTION_POLICY_ARN: &str =
    "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";
pub const JWT_IDENTITY_SOURCE: &str = "$request.header.Authorization";
pub const AUTHORIZER_NAME: &str = "MyAuthorizer";
pub const APP_CLIENT_NAME: &str = "Terminal Application";
pub const IDENTITY_PROVIDER_NAME: &str = "COGNITO";
pub const INVOKE_ACTION: &str = "lambda:InvokeFunction";
pub const API_GATEWAY_PRINCIPAL: &str = "apigateway.amazonaws.com";
pub const LAMBDA_SERVICE_PRINCIPAL: &str = "lambda.amazonaws.com";

pub const LAMBDA_TRUST_POLICY: &str = r#"{
    "Version": "2012-10-17",
    "Statement": [
        {
            "Sid": "TrustedService",
            "Effect": "Allow",
            "Principal": {
                "Service": "lambda.amazonaws.com"
            },
            "Action": "sts:AssumeRole"
        }
    ]
}"#;

pub fn issuer_url(region: &str, user_pool_id: &str) -> String {
    format!("https://cognito-idp.{region}.amazonaws.com/{user_pool_id}")
}

pub fn jwks_url(issuer_url: &str) -> String {
    format!("{}/.well-known/jwks.json", issuer_url.trim_end_matches('/'))
}

pub fn auth_domain_url(domain_prefix: &str, region: &str) -> String {
    format!("https://{domain_prefix}.auth.{region}.amazoncognito.com")
}

pub fn login_url(auth_domain: &str) -> String {
    format!("{}/login", auth_domain.trim_end_matches('/'))
}

/// Token endpoint of the hosted domain. The region comes from the recorded
/// domain URL rather than a fixed one.
pub fn token_endpoint(auth_domain: &str) -> String {
    format!("{}/oauth2/token", auth_domain.trim_end_matches('/'))
}

/// Custom scopes are addressed as `<resource server>/<scope>`.
pub fn qualified_scope(resource_server: &str, scope: &str) -> String {
    format!("{resource_server}/{scope}")
}

pub fn route_key(method: &str, path: &str) -> String {
    format!("{method} {path}")
}

pub fn integration_target(integration_id: &str) -> String {
    format!("integrations/{integration_id}")
}

pub fn execute_api_source_arn(region: &str, account_id: &str, api_id: &str) -> String {
    format!("arn:aws:execute-api:{region}:{account_id}:{api_id}/*/*")
}

pub fn permission_statement_id(api_id: &str) -> String {
    format!("apigateway-{api_id}")
}

pub fn api_url(api_id: &str, region: &str, stage: &str, route_path: &str) -> String {
    format!("https://{api_id}.execute-api.{region}.amazonaws.com/{stage}{route_path}")
}

pub fn function_log_group(function_name: &str) -> String {
    format!("/aws/lambda/{function_name}")
}
