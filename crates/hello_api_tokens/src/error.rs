use std::time::Duration;

use hello_api_core::state::StateError;

#[derive(Debug, thiserror::Error)]
pub enum TokenFetchError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error("invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },
    #[error("could not listen on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no login completed within {}s", .waited.as_secs())]
    LoginTimedOut { waited: Duration },
    #[error("login cancelled")]
    Cancelled,
    #[error("callback listener stopped before receiving a request")]
    ListenerClosed,
    #[error(
        "authorization denied: {error} ({})",
        .description.as_deref().unwrap_or("no description")
    )]
    AuthorizationDenied {
        error: String,
        description: Option<String>,
    },
    #[error("authorization code not found in the callback URL")]
    CallbackWithoutCode,
    #[error("callback arrived on unexpected path '{path}'")]
    CallbackPathNotFound { path: String },
    #[error("callback state does not match the authorization request")]
    StateMismatch,
    #[error("token exchange failed with status {status}: {body}")]
    Exchange { status: u16, body: String },
    #[error("failed to load signing keys from '{url}': {message}")]
    Jwks { url: String, message: String },
    #[error("no signing key matches key id {kid:?}")]
    SigningKeyNotFound { kid: Option<String> },
    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("token {claim} '{found}' does not match client id '{expected}'")]
    AudienceMismatch {
        claim: &'static str,
        found: String,
        expected: String,
    },
    #[error("token carries neither a client_id nor an aud claim")]
    MissingAudience,
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl TokenFetchError {
    /// Whether the login itself never completed. Failures after a completed
    /// login are reported without failing the command.
    pub fn is_abandoned_login(&self) -> bool {
        matches!(self, Self::LoginTimedOut { .. } | Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_timeout_and_cancel_abandon_the_login() {
        let timed_out = TokenFetchError::LoginTimedOut {
            waited: Duration::from_secs(300),
        };
        assert!(timed_out.is_abandoned_login());
        assert!(TokenFetchError::Cancelled.is_abandoned_login());

        let rejected = TokenFetchError::Exchange {
            status: 400,
            body: "invalid_grant".to_string(),
        };
        assert!(!rejected.is_abandoned_login());
        assert!(!TokenFetchError::StateMismatch.is_abandoned_login());
    }
}
