mod support;

use std::net::TcpListener;
use std::time::Duration;

use hello_api_core::state::{DeploymentConfig, DeploymentState};
use hello_api_tokens::{fetch_tokens, FetchOptions, TokenFetchError};
use jsonwebtoken::get_current_timestamp;
use mockito::Matcher;
use serde_json::json;
use support::{sign, CLIENT_ID, JWKS, KEY_ID};

fn free_local_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .expect("free port")
        .port()
}

/// A deployment whose hosted domain, issuer and API all live on `server_url`.
fn deployed_state(server_url: &str, callback_url: &str) -> DeploymentState {
    let mut state = DeploymentState::new(DeploymentConfig::for_region("us-east-1"));
    state.config.terminal_app_callback_urls = vec![callback_url.to_string()];
    let resources = &mut state.resources;
    resources.terminal_app_client_id = Some(CLIENT_ID.to_string());
    resources.user_pool_auth_domain = Some(server_url.to_string());
    resources.user_pool_jwt_issuer_url = Some(format!("{server_url}/pool"));
    resources.api_url = Some(format!("{server_url}/dev/hello"));
    state
}

/// Plays the browser: follows the redirect once the listener is up.
async fn follow_redirect(callback: String) -> reqwest::StatusCode {
    for _ in 0..250 {
        match reqwest::get(&callback).await {
            Ok(response) => return response.status(),
            Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
        }
    }
    panic!("callback listener never came up at {callback}");
}

#[tokio::test]
async fn login_exchanges_code_and_calls_the_api() {
    let mut server = mockito::Server::new_async().await;
    let issuer = format!("{}/pool", server.url());
    let expires_at = get_current_timestamp() + 3600;
    let id_token = sign(
        KEY_ID,
        &json!({
            "sub": "user-1",
            "iss": issuer,
            "aud": CLIENT_ID,
            "token_use": "id",
            "exp": expires_at,
        }),
    );
    // issued to another client, so verification fails but the call still goes out
    let access_token = sign(
        KEY_ID,
        &json!({
            "iss": issuer,
            "client_id": "another-client",
            "token_use": "access",
            "scope": "openid",
            "exp": expires_at,
        }),
    );

    let callback_url = format!("http://127.0.0.1:{}/callback", free_local_port());
    let token_mock = server
        .mock("POST", "/oauth2/token")
        .match_header("content-type", "application/x-www-form-urlencoded")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
            Matcher::UrlEncoded("client_id".into(), CLIENT_ID.into()),
            Matcher::UrlEncoded("code".into(), "code-from-browser".into()),
            Matcher::UrlEncoded("redirect_uri".into(), callback_url.clone()),
            Matcher::Regex("code_verifier=[A-Za-z0-9_-]{43}".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "access_token": access_token,
                "id_token": id_token,
                "token_type": "Bearer",
                "expires_in": 3600,
            })
            .to_string(),
        )
        .create_async()
        .await;
    let jwks_mock = server
        .mock("GET", "/pool/.well-known/jwks.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(JWKS)
        .create_async()
        .await;
    let api_mock = server
        .mock("GET", "/dev/hello")
        .match_header("authorization", format!("Bearer {access_token}").as_str())
        .with_status(200)
        .with_body("\"hello world\"")
        .create_async()
        .await;

    let state = deployed_state(&server.url(), &callback_url);
    let options = FetchOptions {
        scopes: Some(vec!["openid".to_string()]),
        login_timeout: Duration::from_secs(30),
        open_browser: false,
    };
    let redirect = format!("{callback_url}?code=code-from-browser");
    let browser = tokio::spawn(follow_redirect(redirect));

    let summary = fetch_tokens(&state, &options)
        .await
        .expect("login completes");

    assert_eq!(
        browser.await.expect("browser task"),
        reqwest::StatusCode::OK
    );
    token_mock.assert_async().await;
    jwks_mock.assert_async().await;
    api_mock.assert_async().await;
    assert_eq!(summary.tokens.access_token, access_token);
    assert_eq!(summary.api_response.status, 200);
    assert_eq!(summary.api_response.body, "\"hello world\"");

    let scope = summary
        .authorization_url
        .query_pairs()
        .find(|(key, _)| key == "scope")
        .map(|(_, value)| value.into_owned());
    assert_eq!(scope.as_deref(), Some("openid"));
}

#[tokio::test]
async fn rejected_exchange_skips_the_api_call() {
    let mut server = mockito::Server::new_async().await;
    let callback_url = format!("http://127.0.0.1:{}/callback", free_local_port());
    server
        .mock("POST", "/oauth2/token")
        .with_status(400)
        .with_body(r#"{"error":"invalid_grant"}"#)
        .create_async()
        .await;
    let api_mock = server
        .mock("GET", "/dev/hello")
        .expect(0)
        .create_async()
        .await;

    let state = deployed_state(&server.url(), &callback_url);
    let options = FetchOptions {
        login_timeout: Duration::from_secs(30),
        open_browser: false,
        ..FetchOptions::default()
    };
    let redirect = format!("{callback_url}?code=stale");
    let browser = tokio::spawn(follow_redirect(redirect));

    let error = fetch_tokens(&state, &options)
        .await
        .expect_err("exchange rejected");

    assert_eq!(
        browser.await.expect("browser task"),
        reqwest::StatusCode::OK
    );
    api_mock.assert_async().await;
    assert!(!error.is_abandoned_login());
    match error {
        TokenFetchError::Exchange { status, .. } => assert_eq!(status, 400),
        other => panic!("unexpected error: {other}"),
    }
}
