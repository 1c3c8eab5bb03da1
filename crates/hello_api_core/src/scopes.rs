use std::collections::BTreeSet;

use crate::state::DeploymentConfig;

/// Scopes a JWT-protected route demands. API Gateway grants access when the
/// token carries any one of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteAuthorization {
    required_scopes: BTreeSet<String>,
}

impl RouteAuthorization {
    pub fn new<I, S>(required_scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required_scopes: required_scopes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn for_config(config: &DeploymentConfig) -> Self {
        Self::new(config.qualified_api_scopes())
    }

    pub fn required_scopes(&self) -> impl Iterator<Item = &str> {
        self.required_scopes.iter().map(String::as_str)
    }

    pub fn permits<'a, I>(&self, token_scopes: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        if self.required_scopes.is_empty() {
            return true;
        }
        token_scopes
            .into_iter()
            .any(|scope| self.required_scopes.contains(scope))
    }
}

/// Splits an access token `scope` claim on whitespace.
pub fn parse_scope_claim(value: &str) -> Vec<&str> {
    value.split_whitespace().collect()
}
