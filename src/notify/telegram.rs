use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{NOTIFY_BACKOFF_MS, NOTIFY_MAX_RETRY_AFTER_SECS};
use crate::error::{AppError, Result};
use crate::fetcher::http_client;

/// Outcome of one `sendMessage` call.
#[derive(Debug, PartialEq)]
enum Attempt {
    Sent,
    /// 429 with the server's requested wait.
    RateLimited(Duration),
    /// Network error or 5xx; worth another try.
    Transient(String),
    /// Any other 4xx; retrying cannot help.
    Rejected(String),
}

pub struct TelegramClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
    chat_id: String,
    backoff: Vec<Duration>,
    max_retry_after: Duration,
}

impl TelegramClient {
    pub fn new(api_url: impl Into<String>, token: String, chat_id: String) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            api_url: api_url.into(),
            token,
            chat_id,
            backoff: NOTIFY_BACKOFF_MS.iter().map(|ms| Duration::from_millis(*ms)).collect(),
            max_retry_after: Duration::from_secs(NOTIFY_MAX_RETRY_AFTER_SECS),
        })
    }

    /// Send one message with bounded retry. A 429 waits for the server's
    /// `retry_after` (capped); other transient failures walk the backoff table.
    pub async fn send_message(&self, text: &str) -> Result<()> {
        let mut retry_idx = 0usize;
        loop {
            let delay = match self.send_once(text).await {
                Attempt::Sent => return Ok(()),
                Attempt::Rejected(reason) => return Err(AppError::Notify(reason)),
                Attempt::RateLimited(wait) => wait.min(self.max_retry_after),
                Attempt::Transient(reason) => match self.backoff.get(retry_idx).copied() {
                    Some(d) => {
                        warn!(
                            attempt = retry_idx + 1,
                            "Telegram send failed: {reason}, retrying in {d:?}"
                        );
                        d
                    }
                    None => {
                        return Err(AppError::Notify(format!(
                            "giving up after {} attempts: {reason}",
                            retry_idx + 1
                        )))
                    }
                },
            };
            if retry_idx >= self.backoff.len() {
                return Err(AppError::Notify("rate limited on every attempt".to_string()));
            }
            retry_idx += 1;
            tokio::time::sleep(delay).await;
        }
    }

    /// Errors never carry the request URL: it embeds the bot token.
    async fn send_once(&self, text: &str) -> Attempt {
        let url = format!("{}/bot{}/sendMessage", self.api_url, self.token);
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });

        let resp = match self.http.post(&url).json(&body).send().await {
            Ok(resp) => resp,
            Err(e) => return Attempt::Transient(e.without_url().to_string()),
        };
        let status = resp.status();
        if status.is_success() {
            debug!(chars = text.chars().count(), "Telegram message sent");
            return Attempt::Sent;
        }

        let payload: Value = resp.json().await.unwrap_or(Value::Null);
        classify(status.as_u16(), &payload)
    }
}

fn classify(status: u16, payload: &Value) -> Attempt {
    let description = payload
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or("no description");
    match status {
        429 => Attempt::RateLimited(Duration::from_secs(retry_after_secs(payload).unwrap_or(1))),
        500..=599 => Attempt::Transient(format!("HTTP {status}: {description}")),
        _ => Attempt::Rejected(format!("HTTP {status}: {description}")),
    }
}

fn retry_after_secs(payload: &Value) -> Option<u64> {
    payload.get("parameters")?.get("retry_after")?.as_u64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use serde_json::json;

    #[derive(Clone, Default)]
    struct MockTelegram {
        replies: Arc<Mutex<VecDeque<(StatusCode, Value)>>>,
        received: Arc<Mutex<Vec<Value>>>,
    }

    async fn send_message(
        State(mock): State<MockTelegram>,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        mock.received.lock().unwrap().push(body);
        let (status, reply) = mock
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or((StatusCode::OK, json!({"ok": true})));
        (status, Json(reply))
    }

    async fn spawn(replies: Vec<(StatusCode, Value)>) -> (TelegramClient, MockTelegram) {
        let mock = MockTelegram {
            replies: Arc::new(Mutex::new(replies.into())),
            ..MockTelegram::default()
        };
        let app = Router::new()
            .route("/bottest-token/sendMessage", post(send_message))
            .with_state(mock.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let mut client = TelegramClient::new(
            format!("http://{addr}"),
            "test-token".to_string(),
            "42".to_string(),
        )
        .unwrap();
        client.backoff = vec![Duration::from_millis(1); 2];
        client.max_retry_after = Duration::from_millis(5);
        (client, mock)
    }

    #[test]
    fn classifies_responses() {
        let rate_limited = json!({"ok": false, "parameters": {"retry_after": 7}});
        assert_eq!(classify(429, &rate_limited), Attempt::RateLimited(Duration::from_secs(7)));
        assert!(matches!(classify(502, &Value::Null), Attempt::Transient(_)));
        assert!(matches!(
            classify(400, &json!({"description": "Bad Request: chat not found"})),
            Attempt::Rejected(d) if d.contains("chat not found")
        ));
    }

    #[tokio::test]
    async fn delivers_with_chat_id_and_text() {
        let (client, mock) = spawn(Vec::new()).await;
        client.send_message("gap alert").await.unwrap();

        let received = mock.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0]["chat_id"], "42");
        assert_eq!(received[0]["text"], "gap alert");
    }

    #[tokio::test]
    async fn retries_after_rate_limit_and_server_error() {
        let (client, mock) = spawn(vec![
            (StatusCode::TOO_MANY_REQUESTS, json!({"ok": false, "parameters": {"retry_after": 30}})),
            (StatusCode::BAD_GATEWAY, json!({"ok": false})),
        ])
        .await;
        client.send_message("hello").await.unwrap();
        assert_eq!(mock.received.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_backoff_table() {
        let failures = vec![(StatusCode::INTERNAL_SERVER_ERROR, json!({"ok": false})); 5];
        let (client, mock) = spawn(failures).await;
        assert!(matches!(client.send_message("x").await, Err(AppError::Notify(_))));
        // One first try plus one per backoff entry.
        assert_eq!(mock.received.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn transport_errors_do_not_expose_the_token() {
        // Nothing listens on the discard port, so every attempt fails to connect.
        let mut client = TelegramClient::new(
            "http://127.0.0.1:9",
            "SECRET-BOT-TOKEN".to_string(),
            "42".to_string(),
        )
        .unwrap();
        client.backoff = vec![Duration::from_millis(1)];

        let err = client.send_message("x").await.unwrap_err();
        assert!(matches!(err, AppError::Notify(_)));
        assert!(!err.to_string().contains("SECRET-BOT-TOKEN"), "{err}");
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let (client, mock) = spawn(vec![(StatusCode::BAD_REQUEST, json!({"ok": false}))]).await;
        assert!(client.send_message("x").await.is_err());
        assert_eq!(mock.received.lock().unwrap().len(), 1);
    }
}
