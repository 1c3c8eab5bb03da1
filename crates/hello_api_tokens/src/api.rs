use crate::error::TokenFetchError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

/// One GET against the deployed route with the access token as bearer.
pub async fn call_api(
    http: &reqwest::Client,
    api_url: &str,
    access_token: &str,
) -> Result<ApiResponse, TokenFetchError> {
    let response = http.get(api_url).bearer_auth(access_token).send().await?;
    let status = response.status().as_u16();
    let body = response.text().await?;
    Ok(ApiResponse { status, body })
}

/// Equivalent request for pasting into a shell.
pub fn curl_command(api_url: &str, access_token: &str) -> String {
    format!("curl -H \"Authorization: Bearer {access_token}\" {api_url}")
}
