//! Delivery collaborator. Alerts leave the process through [`Notifier`],
//! which either talks to Telegram or, with no credentials configured, logs
//! each message so a dry run still shows what would have been sent.

pub mod format;
pub mod telegram;

pub use telegram::TelegramClient;

use tracing::info;

use crate::config::{Config, NOTIFY_CHUNK_CHARS};
use crate::error::Result;
use crate::types::Alert;

pub enum Notifier {
    Telegram(TelegramClient),
    LogOnly,
}

impl Notifier {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        match (&cfg.telegram_bot_token, &cfg.telegram_chat_id) {
            (Some(token), Some(chat_id)) => Ok(Notifier::Telegram(TelegramClient::new(
                crate::config::TELEGRAM_API_URL,
                token.clone(),
                chat_id.clone(),
            )?)),
            _ => {
                info!("Telegram credentials not set; notifications will be logged only");
                Ok(Notifier::LogOnly)
            }
        }
    }

    /// Send `text`, split into chunks the channel accepts.
    pub async fn send(&self, text: &str) -> Result<()> {
        match self {
            Notifier::Telegram(client) => {
                for chunk in split_chunks(text, NOTIFY_CHUNK_CHARS) {
                    client.send_message(&chunk).await?;
                }
                Ok(())
            }
            Notifier::LogOnly => {
                info!(event = "NOTIFY_DRY_RUN", "\n{text}");
                Ok(())
            }
        }
    }

    pub async fn send_alert(&self, alert: &Alert) -> Result<()> {
        self.send(&format::alert(alert)).await
    }
}

/// Split on char boundaries into pieces of at most `max_chars` chars,
/// preferring to break after a newline when one falls inside the window.
pub fn split_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > max_chars {
        let hard_end = rest
            .char_indices()
            .nth(max_chars)
            .map_or(rest.len(), |(i, _)| i);
        let end = rest[..hard_end]
            .rfind('\n')
            .map_or(hard_end, |i| i + 1);
        chunks.push(rest[..end].to_string());
        rest = &rest[end..];
    }
    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_chunks("hello", 4000), vec!["hello".to_string()]);
        assert_eq!(split_chunks("", 4000), vec![String::new()]);
    }

    #[test]
    fn long_text_splits_on_char_boundaries() {
        let text = "é".repeat(9);
        let chunks = split_chunks(&text, 4);
        assert_eq!(chunks, vec!["éééé", "éééé", "é"]);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn prefers_newline_breaks() {
        let chunks = split_chunks("aaa\nbbb\nccc", 9);
        assert_eq!(chunks, vec!["aaa\nbbb\n", "ccc"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 9));
    }

    #[tokio::test]
    async fn log_only_notifier_never_fails() {
        assert!(Notifier::LogOnly.send("dry run").await.is_ok());
    }
}
