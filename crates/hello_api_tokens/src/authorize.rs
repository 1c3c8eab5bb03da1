use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::Rng;
use url::Url;

use crate::error::TokenFetchError;
use crate::pkce::{PkceVerifier, CHALLENGE_METHOD};

/// Hosted login URL carrying an authorization code request.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: Url,
    /// Opaque value the callback must echo back.
    pub state: String,
}

impl AuthorizationRequest {
    pub fn build(
        login_url: &str,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
        pkce: &PkceVerifier,
    ) -> Result<Self, TokenFetchError> {
        let mut url = parse_url(login_url)?;
        let random_bytes: [u8; 16] = rand::thread_rng().gen();
        let state = URL_SAFE_NO_PAD.encode(random_bytes);

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &scopes.join(" "))
            .append_pair("state", &state)
            .append_pair("code_challenge", &pkce.challenge)
            .append_pair("code_challenge_method", CHALLENGE_METHOD);

        Ok(Self { url, state })
    }
}

pub(crate) fn parse_url(value: &str) -> Result<Url, TokenFetchError> {
    Url::parse(value).map_err(|error| TokenFetchError::InvalidUrl {
        url: value.to_string(),
        message: error.to_string(),
    })
}
