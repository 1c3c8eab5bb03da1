use std::time::Duration;

use hello_api_core::naming;
use hello_api_core::scopes::RouteAuthorization;
use hello_api_core::state::DeploymentState;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use url::Url;

use crate::api::{call_api, curl_command, ApiResponse};
use crate::authorize::{parse_url, AuthorizationRequest};
use crate::callback::CallbackListener;
use crate::error::TokenFetchError;
use crate::exchange::{exchange_code, CodeExchange, TokenSet};
use crate::pkce::PkceVerifier;
use crate::verify::{granted_scopes, Claims, TokenVerifier};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Requested scopes; the app client's configured scopes when unset.
    pub scopes: Option<Vec<String>>,
    pub login_timeout: Duration,
    pub open_browser: bool,
}

impl FetchOptions {
    /// The override when one was given, otherwise `configured`.
    pub fn requested_scopes(&self, configured: Vec<String>) -> Vec<String> {
        self.scopes.clone().unwrap_or(configured)
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            scopes: None,
            login_timeout: Duration::from_secs(300),
            open_browser: true,
        }
    }
}

#[derive(Debug)]
pub struct FetchSummary {
    pub authorization_url: Url,
    pub tokens: TokenSet,
    pub api_response: ApiResponse,
}

/// Runs the browser login, exchanges the code, verifies the tokens, and calls
/// the deployed route once with the access token.
///
/// Verification problems are reported but do not fail the run; the API call
/// still happens so the gateway's own verdict is visible.
pub async fn fetch_tokens(
    state: &DeploymentState,
    options: &FetchOptions,
) -> Result<FetchSummary, TokenFetchError> {
    let inputs = state.token_fetch_inputs()?;
    let scopes = options.requested_scopes(inputs.scopes);
    let callback_url = parse_url(&inputs.callback_url)?;

    let listener = CallbackListener::bind(&callback_url).await?;
    info!(address = %listener.local_addr(), "waiting for the login redirect");

    let pkce = PkceVerifier::generate();
    let request = AuthorizationRequest::build(
        &naming::login_url(&inputs.auth_domain),
        &inputs.client_id,
        &inputs.callback_url,
        &scopes,
        &pkce,
    )?;
    println!("Log in at:\n\n  {}\n", request.url);
    if options.open_browser {
        if let Err(error) = open::that(request.url.as_str()) {
            warn!(%error, "could not open a browser; open the URL above manually");
        }
    }

    let spinner = login_spinner();
    let outcome = listener.wait(options.login_timeout).await;
    spinner.finish_and_clear();
    let code = outcome?.into_code(&request.state)?;
    info!("authorization code received");

    let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
    let tokens = exchange_code(
        &http,
        CodeExchange {
            token_endpoint: &naming::token_endpoint(&inputs.auth_domain),
            client_id: &inputs.client_id,
            code: &code,
            code_verifier: &pkce.verifier,
            redirect_uri: &inputs.callback_url,
        },
    )
    .await?;
    print_tokens(&tokens);

    match TokenVerifier::fetch(&http, &inputs.issuer_url, &inputs.client_id).await {
        Ok(verifier) => {
            if let Some(id_token) = &tokens.id_token {
                report_verification("ID token", verifier.decode(id_token));
            }
            let access_claims =
                report_verification("access token", verifier.decode(&tokens.access_token));
            if let Some(claims) = access_claims {
                check_route_scopes(state, &claims);
            }
        }
        Err(error) => warn!(%error, "tokens not verified"),
    }

    println!(
        "\nEquivalent request:\n\n  {}\n",
        curl_command(&inputs.api_url, &tokens.access_token)
    );
    let api_response = call_api(&http, &inputs.api_url, &tokens.access_token).await?;
    println!("API response status: {}", api_response.status);
    println!("API response body: {}", api_response.body);

    Ok(FetchSummary {
        authorization_url: request.url,
        tokens,
        api_response,
    })
}

fn login_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("waiting for login in the browser");
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

fn print_tokens(tokens: &TokenSet) {
    println!("Access token: {}", tokens.access_token);
    if let Some(id_token) = &tokens.id_token {
        println!("ID token: {id_token}");
    }
    if let Some(refresh_token) = &tokens.refresh_token {
        println!("Refresh token: {refresh_token}");
    }
    let expiry = tokens
        .expires_in
        .and_then(chrono::TimeDelta::try_seconds)
        .and_then(|lifetime| chrono::Local::now().checked_add_signed(lifetime));
    match expiry {
        Some(expires_at) => println!(
            "Token type: {}, expires at {}",
            tokens.token_type,
            expires_at.format("%Y-%m-%d %H:%M:%S %Z")
        ),
        None => println!("Token type: {}", tokens.token_type),
    }
}

fn report_verification(label: &str, result: Result<Claims, TokenFetchError>) -> Option<Claims> {
    match result {
        Ok(claims) => {
            info!(token = label, "signature and audience verified");
            Some(claims)
        }
        Err(error) => {
            warn!(token = label, %error, "verification failed");
            None
        }
    }
}

fn check_route_scopes(state: &DeploymentState, access_claims: &Claims) {
    let route = RouteAuthorization::for_config(&state.config);
    let granted = granted_scopes(access_claims);
    if !route.permits(granted.iter().copied()) {
        let required: Vec<&str> = route.required_scopes().collect();
        warn!(
            granted = ?granted,
            required = ?required,
            "access token carries none of the route's scopes; expect 401"
        );
    }
}
