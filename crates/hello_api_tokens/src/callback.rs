//! One-shot local listener for the authorization redirect.
//!
//! The listener answers the first request it receives, hands what it saw to
//! the waiting flow, and shuts down. The token exchange happens afterwards in
//! the main flow, not inside the request handler.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{RawQuery, State};
use axum::http::{StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use crate::error::TokenFetchError;

const SUCCESS_PAGE: &str = r#"<html>
<body>
<p>Authorization successful. You can close this window and return to your application.</p>
</body>
</html>
"#;
const MISSING_CODE_BODY: &str = "Authorization code not found in the callback URL.";
const NOT_FOUND_BODY: &str = "Not Found";

/// What the first request to the listener carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Code { code: String, state: Option<String> },
    Denied {
        error: String,
        description: Option<String>,
    },
    MissingCode,
    UnknownPath { path: String },
}

impl CallbackOutcome {
    /// The authorization code, provided the redirect echoed `expected_state`.
    pub fn into_code(self, expected_state: &str) -> Result<String, TokenFetchError> {
        match self {
            Self::Code { code, state } => match state {
                Some(state) if state != expected_state => Err(TokenFetchError::StateMismatch),
                _ => Ok(code),
            },
            Self::Denied { error, description } => {
                Err(TokenFetchError::AuthorizationDenied { error, description })
            }
            Self::MissingCode => Err(TokenFetchError::CallbackWithoutCode),
            Self::UnknownPath { path } => Err(TokenFetchError::CallbackPathNotFound { path }),
        }
    }
}

/// Query parameters of the redirect. A repeated key keeps its first
/// non-empty value and an empty value counts as absent.
#[derive(Debug, Default)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl CallbackQuery {
    fn parse(raw: Option<&str>) -> Self {
        let mut query = Self::default();
        let pairs = url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes());
        for (key, value) in pairs {
            if value.is_empty() {
                continue;
            }
            let slot = match &*key {
                "code" => &mut query.code,
                "state" => &mut query.state,
                "error" => &mut query.error,
                "error_description" => &mut query.error_description,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        query
    }
}

type OutcomeSender = Arc<Mutex<Option<oneshot::Sender<CallbackOutcome>>>>;

/// Only the first delivery reaches the flow; later requests are answered but
/// otherwise ignored.
fn deliver(sender: &OutcomeSender, outcome: CallbackOutcome) {
    let taken = match sender.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    };
    match taken {
        Some(tx) => {
            let _ = tx.send(outcome);
        }
        None => debug!(?outcome, "ignoring request after the first callback"),
    }
}

async fn handle_callback(
    State(sender): State<OutcomeSender>,
    RawQuery(raw_query): RawQuery,
) -> Response {
    let query = CallbackQuery::parse(raw_query.as_deref());
    match (query.code, query.error) {
        (Some(code), _) => {
            deliver(
                &sender,
                CallbackOutcome::Code {
                    code,
                    state: query.state,
                },
            );
            (StatusCode::OK, Html(SUCCESS_PAGE)).into_response()
        }
        (None, Some(error)) => {
            deliver(
                &sender,
                CallbackOutcome::Denied {
                    error,
                    description: query.error_description,
                },
            );
            (StatusCode::BAD_REQUEST, MISSING_CODE_BODY).into_response()
        }
        (None, None) => {
            deliver(&sender, CallbackOutcome::MissingCode);
            (StatusCode::BAD_REQUEST, MISSING_CODE_BODY).into_response()
        }
    }
}

async fn handle_unknown_path(State(sender): State<OutcomeSender>, uri: Uri) -> Response {
    deliver(
        &sender,
        CallbackOutcome::UnknownPath {
            path: uri.path().to_string(),
        },
    );
    (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response()
}

/// Routes the callback path; every other path is a 404.
pub fn callback_router(callback_path: &str, sender: oneshot::Sender<CallbackOutcome>) -> Router {
    let sender: OutcomeSender = Arc::new(Mutex::new(Some(sender)));
    Router::new()
        .route(callback_path, get(handle_callback))
        .fallback(handle_unknown_path)
        .with_state(sender)
}

pub struct CallbackListener {
    addr: SocketAddr,
    outcome_rx: oneshot::Receiver<CallbackOutcome>,
    shutdown_tx: oneshot::Sender<()>,
    server: JoinHandle<std::io::Result<()>>,
}

impl CallbackListener {
    /// Binds to the host and port of `callback_url` and starts serving.
    pub async fn bind(callback_url: &Url) -> Result<Self, TokenFetchError> {
        let host = callback_url
            .host_str()
            .ok_or_else(|| TokenFetchError::InvalidUrl {
                url: callback_url.to_string(),
                message: "callback URL has no host".to_string(),
            })?;
        let port = callback_url
            .port_or_known_default()
            .ok_or_else(|| TokenFetchError::InvalidUrl {
                url: callback_url.to_string(),
                message: "callback URL has no port".to_string(),
            })?;

        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|source| TokenFetchError::Bind {
                address: format!("{host}:{port}"),
                source,
            })?;
        let addr = listener
            .local_addr()
            .map_err(|source| TokenFetchError::Bind {
                address: format!("{host}:{port}"),
                source,
            })?;

        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = callback_router(callback_url.path(), outcome_tx);
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });
        debug!(%addr, "callback listener started");

        Ok(Self {
            addr,
            outcome_rx,
            shutdown_tx,
            server,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Waits for the first request, for at most `timeout`; Ctrl-C cancels.
    /// The listener is shut down whatever the result.
    pub async fn wait(self, timeout: Duration) -> Result<CallbackOutcome, TokenFetchError> {
        let received = tokio::select! {
            received = tokio::time::timeout(timeout, self.outcome_rx) => match received {
                Ok(Ok(outcome)) => Ok(outcome),
                Ok(Err(_)) => Err(TokenFetchError::ListenerClosed),
                Err(_) => Err(TokenFetchError::LoginTimedOut { waited: timeout }),
            },
            _ = tokio::signal::ctrl_c() => Err(TokenFetchError::Cancelled),
        };

        let _ = self.shutdown_tx.send(());
        match tokio::time::timeout(Duration::from_secs(5), self.server).await {
            Ok(Ok(Ok(()))) => debug!("callback listener stopped"),
            Ok(Ok(Err(error))) => warn!(%error, "callback listener failed"),
            Ok(Err(error)) => warn!(%error, "callback listener task failed"),
            Err(_) => warn!("callback listener did not stop in time"),
        }
        received
    }
}
