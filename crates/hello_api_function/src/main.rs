//! Backend of the Hello API route, packaged as a `bootstrap` binary for the
//! `provided.al2023` runtime.

use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

const GREETING: &str = "hello world";

async fn handle_request(event: LambdaEvent<Value>) -> Result<Value, Error> {
    let (payload, context) = event.into_parts();
    info!(request_id = %context.request_id, event = %payload, "request received");
    Ok(Value::String(GREETING.to_string()))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Lambda adds its own timestamps to every log line
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .with_ansi(false)
        .init();
    lambda_runtime::run(service_fn(handle_request)).await
}

#[cfg(test)]
mod tests {
    use lambda_runtime::Context;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn answers_any_event_with_a_greeting() {
        let event = LambdaEvent::new(
            json!({"rawPath": "/dev/hello", "requestContext": {"http": {"method": "GET"}}}),
            Context::default(),
        );
        let response = handle_request(event).await.expect("handler succeeds");
        assert_eq!(response, json!("hello world"));
    }
}
