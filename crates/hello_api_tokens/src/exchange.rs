use serde::Deserialize;
use tracing::debug;

use crate::error::TokenFetchError;

/// Token endpoint response for the authorization code grant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime of the access token in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

#[derive(Debug, Clone, Copy)]
pub struct CodeExchange<'a> {
    pub token_endpoint: &'a str,
    pub client_id: &'a str,
    pub code: &'a str,
    pub code_verifier: &'a str,
    pub redirect_uri: &'a str,
}

/// Redeems an authorization code at the token endpoint. The request is a
/// form POST with no client secret; the PKCE verifier proves possession.
pub async fn exchange_code(
    http: &reqwest::Client,
    exchange: CodeExchange<'_>,
) -> Result<TokenSet, TokenFetchError> {
    let params = [
        ("grant_type", "authorization_code"),
        ("client_id", exchange.client_id),
        ("code", exchange.code),
        ("code_verifier", exchange.code_verifier),
        ("redirect_uri", exchange.redirect_uri),
    ];
    debug!(
        token_endpoint = exchange.token_endpoint,
        "exchanging authorization code"
    );

    let response = http
        .post(exchange.token_endpoint)
        .form(&params)
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(TokenFetchError::Exchange {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json::<TokenSet>().await?)
}
