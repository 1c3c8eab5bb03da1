//! Signature and audience verification of issued tokens.
//!
//! Keys are resolved from the issuer's published key set by the `kid` in the
//! token header. Audience is checked by hand: Cognito ID tokens carry the
//! client id in `aud`, while access tokens carry it in `client_id` and have
//! no `aud` at all, so the library's audience check stays off.

use hello_api_core::naming;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tracing::debug;

use crate::error::TokenFetchError;

pub type Claims = serde_json::Map<String, Value>;

#[derive(Debug, Clone)]
pub struct TokenVerifier {
    keys: JwkSet,
    issuer: Option<String>,
    client_id: String,
}

impl TokenVerifier {
    pub fn new(keys: JwkSet, client_id: impl Into<String>) -> Self {
        Self {
            keys,
            issuer: None,
            client_id: client_id.into(),
        }
    }

    /// Also require the `iss` claim to equal `issuer`.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Downloads the issuer's key set.
    pub async fn fetch(
        http: &reqwest::Client,
        issuer_url: &str,
        client_id: &str,
    ) -> Result<Self, TokenFetchError> {
        let url = naming::jwks_url(issuer_url);
        let jwks_error = |error: reqwest::Error| TokenFetchError::Jwks {
            url: url.clone(),
            message: error.to_string(),
        };
        let keys = http
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(jwks_error)?
            .json::<JwkSet>()
            .await
            .map_err(jwks_error)?;
        debug!(%url, keys = keys.keys.len(), "signing keys loaded");
        Ok(Self::new(keys, client_id).with_issuer(issuer_url))
    }

    /// Verifies signature, algorithm, expiry and audience, returning the
    /// token's claims.
    pub fn decode(&self, token: &str) -> Result<Claims, TokenFetchError> {
        let header = decode_header(token)?;
        let jwk = header
            .kid
            .as_deref()
            .and_then(|kid| self.keys.find(kid))
            .ok_or_else(|| TokenFetchError::SigningKeyNotFound {
                kid: header.kid.clone(),
            })?;
        let key = DecodingKey::from_jwk(jwk)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_aud = false;
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }

        let claims = decode::<Claims>(token, &key, &validation)?.claims;
        check_audience(&claims, &self.client_id)?;
        Ok(claims)
    }
}

/// Checks the audience-equivalent claim against `client_id`. Access tokens
/// name it `client_id`, ID tokens `aud`; tokens without a `token_use` are
/// accepted through either claim.
pub fn check_audience(claims: &Claims, client_id: &str) -> Result<(), TokenFetchError> {
    let token_use = claims.get("token_use").and_then(Value::as_str);
    let matched = match token_use {
        Some("access") => match_claim(claims, "client_id", client_id)?,
        Some("id") => match_claim(claims, "aud", client_id)?,
        _ => match match_claim(claims, "client_id", client_id)? {
            Some(()) => Some(()),
            None => match_claim(claims, "aud", client_id)?,
        },
    };
    matched.ok_or(TokenFetchError::MissingAudience)
}

/// `Ok(None)` when the claim is absent.
fn match_claim(
    claims: &Claims,
    claim: &'static str,
    client_id: &str,
) -> Result<Option<()>, TokenFetchError> {
    let Some(value) = claims.get(claim) else {
        return Ok(None);
    };
    let matches = match value {
        Value::String(found) => found == client_id,
        Value::Array(values) => values.iter().any(|v| v.as_str() == Some(client_id)),
        _ => false,
    };
    if matches {
        Ok(Some(()))
    } else {
        Err(TokenFetchError::AudienceMismatch {
            claim,
            found: value.to_string(),
            expected: client_id.to_string(),
        })
    }
}

/// Scopes granted in an access token's `scope` claim.
pub fn granted_scopes(claims: &Claims) -> Vec<&str> {
    claims
        .get("scope")
        .and_then(Value::as_str)
        .map(hello_api_core::scopes::parse_scope_claim)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn claims(value: Value) -> Claims {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn access_tokens_are_matched_on_client_id() {
        let access = claims(json!({"token_use": "access", "client_id": "client-1"}));
        assert!(check_audience(&access, "client-1").is_ok());

        let wrong = claims(json!({"token_use": "access", "client_id": "other"}));
        assert!(matches!(
            check_audience(&wrong, "client-1"),
            Err(TokenFetchError::AudienceMismatch { claim: "client_id", .. })
        ));
    }

    #[test]
    fn id_tokens_are_matched_on_aud() {
        let id = claims(json!({"token_use": "id", "aud": "client-1", "client_id": "ignored"}));
        assert!(check_audience(&id, "client-1").is_ok());

        let listed = claims(json!({"token_use": "id", "aud": ["x", "client-1"]}));
        assert!(check_audience(&listed, "client-1").is_ok());
    }

    #[test]
    fn token_without_audience_is_rejected() {
        let bare = claims(json!({"token_use": "access"}));
        assert!(matches!(
            check_audience(&bare, "client-1"),
            Err(TokenFetchError::MissingAudience)
        ));
    }

    #[test]
    fn untyped_tokens_fall_back_to_aud() {
        let untyped = claims(json!({"aud": "client-1"}));
        assert!(check_audience(&untyped, "client-1").is_ok());
    }

    #[test]
    fn scope_claim_is_split() {
        let access = claims(json!({"scope": "openid HelloAPI/hello.read"}));
        assert_eq!(
            granted_scopes(&access),
            vec!["openid", "HelloAPI/hello.read"]
        );
        assert!(granted_scopes(&claims(json!({}))).is_empty());
    }
}
