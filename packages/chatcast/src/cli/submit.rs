use anyhow::Result;
use serde_json::Value;

use crate::ws::{SubmitPayload, SubmitResponse};

use super::{ClientError, ServerEndpoint};

/// Post `text` to `/submit` and return the server's `received` value.
pub async fn submit_text(
    client: &reqwest::Client,
    endpoint: &ServerEndpoint,
    text: &str,
) -> Result<Option<Value>, ClientError> {
    let url = endpoint.submit_url()?;
    let payload = SubmitPayload {
        text: Some(Value::String(text.to_string())),
    };

    let resp = client
        .post(url)
        .json(&payload)
        .send()
        .await
        .map_err(ClientError::from_reqwest)?
        .error_for_status()
        .map_err(ClientError::from_reqwest)?;

    let body: SubmitResponse = resp.json().await.map_err(ClientError::from_reqwest)?;
    Ok(body.received)
}

/// How a `received` value is shown: strings verbatim, null falls back to
/// what was sent, anything else as JSON.
pub fn display_received(received: Option<&Value>, sent: &str) -> String {
    match received {
        None | Some(Value::Null) => sent.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// `chatcast submit <text>`
pub async fn submit_command(endpoint: &ServerEndpoint, text: &str) -> Result<()> {
    let client = reqwest::Client::new();
    match submit_text(&client, endpoint, text).await {
        Ok(received) => {
            println!("{}", display_received(received.as_ref(), text));
            Ok(())
        }
        Err(ClientError::Unavailable) => {
            eprintln!("[chatcast: server unavailable]");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
