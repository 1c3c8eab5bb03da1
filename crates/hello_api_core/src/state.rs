use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub const STATE_FILE_NAME: &str = "state.json";
pub const STATE_FILE_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("state file '{}' not found; run the provisioner first", .path.display())]
    NotFound { path: PathBuf },
    #[error("failed to {action} '{}': {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid state file '{}': {message}", .path.display())]
    InvalidFormat { path: PathBuf, message: String },
    #[error(
        "unsupported state file version {found} in '{}' (expected {})",
        .path.display(),
        STATE_FILE_VERSION
    )]
    UnsupportedVersion { path: PathBuf, found: u32 },
    #[error("state field '{field}' is required to {operation} but has not been recorded")]
    MissingField {
        field: &'static str,
        operation: &'static str,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ApiScope {
    pub name: String,
    pub description: String,
}

impl ApiScope {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Names and settings fixed when provisioning starts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DeploymentConfig {
    pub region: String,
    pub user_pool_name: String,
    pub user_pool_username: String,
    pub user_pool_email: String,
    pub api_name: String,
    pub api_route_path: String,
    pub api_route_method: String,
    pub lambda_function_name: String,
    pub lambda_role_name: String,
    pub api_stage_name: String,
    pub api_scopes: Vec<ApiScope>,
    pub terminal_app_callback_urls: Vec<String>,
    pub terminal_app_scopes: Vec<String>,
}

impl DeploymentConfig {
    /// Demo defaults for the given region.
    pub fn for_region(region: impl Into<String>) -> Self {
        let api_name = "HelloAPI".to_string();
        let terminal_app_scopes = vec![
            "openid".to_string(),
            "profile".to_string(),
            "email".to_string(),
            crate::naming::qualified_scope(&api_name, "hello.read"),
        ];
        Self {
            region: region.into(),
            user_pool_name: "HelloUserPool".to_string(),
            user_pool_username: "Testuser".to_string(),
            user_pool_email: "testuser@example.com".to_string(),
            api_name,
            api_route_path: "/hello".to_string(),
            api_route_method: "GET".to_string(),
            lambda_function_name: "EchoFunction".to_string(),
            lambda_role_name: "APIGatewayLambdaRole".to_string(),
            api_stage_name: "dev".to_string(),
            api_scopes: vec![
                ApiScope::new("hello.read", "Allows read access to the hello API"),
                ApiScope::new("hello.write", "Allows writing"),
            ],
            terminal_app_callback_urls: vec!["http://localhost:8083/callback".to_string()],
            terminal_app_scopes,
        }
    }

    /// API scopes as the identity provider exposes them (`<api>/<scope>`).
    pub fn qualified_api_scopes(&self) -> Vec<String> {
        self.api_scopes
            .iter()
            .map(|scope| crate::naming::qualified_scope(&self.api_name, &scope.name))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceField {
    UserPoolId,
    IssuerUrl,
    AuthDomainPrefix,
    AuthDomain,
    ResourceServerId,
    AppClientId,
    ApiId,
    AuthorizerId,
    RoleArn,
    FunctionArn,
    IntegrationId,
    RouteId,
    ApiUrl,
}

impl ResourceField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UserPoolId => "user_pool_id",
            Self::IssuerUrl => "user_pool_jwt_issuer_url",
            Self::AuthDomainPrefix => "user_pool_auth_domain_prefix",
            Self::AuthDomain => "user_pool_auth_domain",
            Self::ResourceServerId => "user_pool_resource_server_id",
            Self::AppClientId => "terminal_app_client_id",
            Self::ApiId => "api_id",
            Self::AuthorizerId => "api_authorizer_id",
            Self::RoleArn => "lambda_role_arn",
            Self::FunctionArn => "lambda_function_arn",
            Self::IntegrationId => "api_integration_id",
            Self::RouteId => "api_route_id",
            Self::ApiUrl => "api_url",
        }
    }
}

/// Identifiers recorded as each provisioning step succeeds.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GeneratedResources {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_pool_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_pool_jwt_issuer_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_pool_auth_domain_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_pool_auth_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_pool_resource_server_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_app_client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_authorizer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lambda_role_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lambda_function_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_integration_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_route_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl GeneratedResources {
    pub fn get(&self, field: ResourceField) -> Option<&str> {
        let value = match field {
            ResourceField::UserPoolId => &self.user_pool_id,
            ResourceField::IssuerUrl => &self.user_pool_jwt_issuer_url,
            ResourceField::AuthDomainPrefix => &self.user_pool_auth_domain_prefix,
            ResourceField::AuthDomain => &self.user_pool_auth_domain,
            ResourceField::ResourceServerId => &self.user_pool_resource_server_id,
            ResourceField::AppClientId => &self.terminal_app_client_id,
            ResourceField::ApiId => &self.api_id,
            ResourceField::AuthorizerId => &self.api_authorizer_id,
            ResourceField::RoleArn => &self.lambda_role_arn,
            ResourceField::FunctionArn => &self.lambda_function_arn,
            ResourceField::IntegrationId => &self.api_integration_id,
            ResourceField::RouteId => &self.api_route_id,
            ResourceField::ApiUrl => &self.api_url,
        };
        value.as_deref().filter(|value| !value.trim().is_empty())
    }

    /// Returns the recorded value or a `MissingField` error naming `operation`.
    pub fn require(
        &self,
        field: ResourceField,
        operation: &'static str,
    ) -> Result<&str, StateError> {
        self.get(field).ok_or(StateError::MissingField {
            field: field.as_str(),
            operation,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DeploymentState {
    pub version: u32,
    pub config: DeploymentConfig,
    #[serde(default)]
    pub resources: GeneratedResources,
}

/// Everything the token fetcher reads from a provisioned deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenFetchInputs {
    pub client_id: String,
    pub scopes: Vec<String>,
    pub callback_url: String,
    pub auth_domain: String,
    pub issuer_url: String,
    pub api_url: String,
}

impl DeploymentState {
    pub fn new(config: DeploymentConfig) -> Self {
        Self {
            version: STATE_FILE_VERSION,
            config,
            resources: GeneratedResources::default(),
        }
    }

    pub fn token_fetch_inputs(&self) -> Result<TokenFetchInputs, StateError> {
        const OPERATION: &str = "fetch tokens";
        let resources = &self.resources;
        // the first callback url is the local listener
        let callback_url = self
            .config
            .terminal_app_callback_urls
            .first()
            .cloned()
            .ok_or(StateError::MissingField {
                field: "terminal_app_callback_urls",
                operation: OPERATION,
            })?;

        Ok(TokenFetchInputs {
            client_id: resources
                .require(ResourceField::AppClientId, OPERATION)?
                .to_string(),
            scopes: self.config.terminal_app_scopes.clone(),
            callback_url,
            auth_domain: resources
                .require(ResourceField::AuthDomain, OPERATION)?
                .to_string(),
            issuer_url: resources
                .require(ResourceField::IssuerUrl, OPERATION)?
                .to_string(),
            api_url: resources
                .require(ResourceField::ApiUrl, OPERATION)?
                .to_string(),
        })
    }
}

pub fn default_state_path() -> Result<PathBuf, StateError> {
    let cwd = std::env::current_dir().map_err(|source| StateError::Io {
        action: "read current directory",
        path: PathBuf::from("."),
        source,
    })?;
    Ok(cwd.join(STATE_FILE_NAME))
}

pub fn load_state(path: &Path) -> Result<DeploymentState, StateError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            return Err(StateError::NotFound {
                path: path.to_path_buf(),
            })
        }
        Err(source) => {
            return Err(StateError::Io {
                action: "read state file",
                path: path.to_path_buf(),
                source,
            })
        }
    };

    // Check the version before the full schema so old files get a useful error.
    #[derive(Deserialize)]
    struct VersionHeader {
        version: u32,
    }
    let header: VersionHeader = serde_json::from_str(&contents).map_err(invalid_format(path))?;
    if header.version != STATE_FILE_VERSION {
        return Err(StateError::UnsupportedVersion {
            path: path.to_path_buf(),
            found: header.version,
        });
    }

    serde_json::from_str(&contents).map_err(invalid_format(path))
}

fn invalid_format(path: &Path) -> impl Fn(serde_json::Error) -> StateError + '_ {
    move |error| StateError::InvalidFormat {
        path: path.to_path_buf(),
        message: error.to_string(),
    }
}

pub fn save_state_atomic(path: &Path, state: &DeploymentState) -> Result<(), StateError> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| StateError::Io {
            action: "create state directory",
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let json = serde_json::to_string_pretty(state).map_err(|error| StateError::InvalidFormat {
        path: path.to_path_buf(),
        message: format!("failed to serialize state: {error}"),
    })?;

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_nanos())
        .unwrap_or(0);
    let temp_path = path.with_extension(format!("json.tmp.{nanos}"));
    let mut temp_file = File::create(&temp_path).map_err(|source| StateError::Io {
        action: "create temp state file",
        path: temp_path.clone(),
        source,
    })?;
    temp_file
        .write_all(json.as_bytes())
        .and_then(|()| temp_file.sync_all())
        .map_err(|source| {
            let _ = fs::remove_file(&temp_path);
            StateError::Io {
                action: "write temp state file",
                path: temp_path.clone(),
                source,
            }
        })?;

    replace_file(&temp_path, path)
}

fn replace_file(temp_path: &Path, target_path: &Path) -> Result<(), StateError> {
    match fs::rename(temp_path, target_path) {
        Ok(()) => Ok(()),
        Err(first_error) => {
            if target_path.exists() {
                fs::remove_file(target_path).map_err(|source| {
                    let _ = fs::remove_file(temp_path);
                    StateError::Io {
                        action: "replace state file",
                        path: target_path.to_path_buf(),
                        source,
                    }
                })?;
                fs::rename(temp_path, target_path).map_err(|source| {
                    let _ = fs::remove_file(temp_path);
                    StateError::Io {
                        action: "move temp state file onto",
                        path: target_path.to_path_buf(),
                        source,
                    }
                })
            } else {
                let _ = fs::remove_file(temp_path);
                Err(StateError::Io {
                    action: "move temp state file onto",
                    path: target_path.to_path_buf(),
                    source: first_error,
                })
            }
        }
    }
}
