//! HTTP client for the Bot API

use super::types::{reply_markup, TgMessage, TgResponse, TgUpdate};
use super::TransportError;
use crate::runtime::Transport;
use crate::state_machine::{ChatId, FileRef, Keyboard};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;

/// Extra time on top of the long-poll timeout before the HTTP call gives up
const POLL_SLACK: Duration = Duration::from_secs(10);

pub struct TelegramClient {
    client: Client,
    /// `{api_url}/bot{token}`; never logged
    base_url: String,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TransportError::network(format!("Failed to create HTTP client: {}", e.without_url())))?;
        Ok(Self {
            client,
            base_url: format!("{}/bot{token}", api_url.trim_end_matches('/')),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
        timeout: Option<Duration>,
    ) -> Result<T, TransportError> {
        let mut request = self
            .client
            .post(format!("{}/{method}", self.base_url))
            .json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| {
            let e = e.without_url();
            if e.is_timeout() {
                TransportError::network(format!("{method}: request timeout: {e}"))
            } else {
                TransportError::network(format!("{method}: request failed: {e}"))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::network(format!("{method}: failed to read response: {}", e.without_url())))?;

        let parsed: TgResponse<T> = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => return Err(classify_error(method, status, None::<&TgResponse<T>>)),
            Err(e) => {
                return Err(TransportError::server_error(format!(
                    "{method}: unparseable response: {e}"
                )))
            }
        };

        if !status.is_success() || !parsed.ok {
            return Err(classify_error(method, status, Some(&parsed)));
        }
        parsed
            .result
            .ok_or_else(|| TransportError::server_error(format!("{method}: response without result")))
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(&self, offset: i64, timeout: Duration) -> Result<Vec<TgUpdate>, TransportError> {
        let body = json!({
            "offset": offset,
            "timeout": timeout.as_secs(),
            "allowed_updates": ["message", "callback_query"],
        });
        self.call("getUpdates", &body, Some(timeout + POLL_SLACK)).await
    }

    /// Polling and webhooks are mutually exclusive on the Bot API side
    pub async fn delete_webhook(&self) -> Result<(), TransportError> {
        let _: bool = self.call("deleteWebhook", &json!({}), None).await?;
        Ok(())
    }

    async fn send_file(
        &self,
        method: &str,
        field: &str,
        chat_id: ChatId,
        file: &FileRef,
        caption: Option<&str>,
    ) -> Result<FileRef, TransportError> {
        let mut body = json!({ "chat_id": chat_id });
        body[field] = json!(file.file_id);
        if let Some(caption) = caption {
            body["caption"] = json!(caption);
        }
        let sent: TgMessage = self.call(method, &body, None).await?;
        Ok(sent.attachment().unwrap_or_else(|| file.clone()))
    }
}

fn classify_error<T>(method: &str, status: StatusCode, response: Option<&TgResponse<T>>) -> TransportError {
    let code = response
        .and_then(|r| r.error_code)
        .unwrap_or_else(|| status.as_u16());
    let description = response
        .and_then(|r| r.description.clone())
        .unwrap_or_else(|| status.to_string());
    let message = format!("{method}: {code} {description}");

    match code {
        429 => {
            let mut err = TransportError::rate_limit(message);
            if let Some(secs) = response
                .and_then(|r| r.parameters.as_ref())
                .and_then(|p| p.retry_after)
            {
                err = err.with_retry_after(Duration::from_secs(secs));
            }
            err
        }
        500..=599 => TransportError::server_error(message),
        _ => TransportError::rejected(message),
    }
}

#[async_trait]
impl Transport for TelegramClient {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        let mut body = json!({ "chat_id": chat_id, "text": text });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = reply_markup(keyboard);
        }
        let _: TgMessage = self.call("sendMessage", &body, None).await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<(), TransportError> {
        let mut body = json!({ "callback_query_id": callback_id });
        if let Some(text) = text {
            body["text"] = json!(text);
        }
        let _: bool = self.call("answerCallbackQuery", &body, None).await?;
        Ok(())
    }

    async fn send_photo(&self, chat_id: ChatId, file: &FileRef, caption: Option<&str>) -> Result<FileRef, TransportError> {
        self.send_file("sendPhoto", "photo", chat_id, file, caption).await
    }

    async fn send_document(
        &self,
        chat_id: ChatId,
        file: &FileRef,
        caption: Option<&str>,
    ) -> Result<FileRef, TransportError> {
        self.send_file("sendDocument", "document", chat_id, file, caption).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::error::TransportErrorKind;

    fn response(raw: &str) -> TgResponse<Value> {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn test_flood_control_carries_retry_after() {
        let r = response(
            r#"{"ok": false, "error_code": 429, "description": "Too Many Requests: retry after 7",
                "parameters": {"retry_after": 7}}"#,
        );
        let err = classify_error("sendMessage", StatusCode::TOO_MANY_REQUESTS, Some(&r));
        assert_eq!(err.kind, TransportErrorKind::RateLimit);
        assert_eq!(err.retry_after, Some(Duration::from_secs(7)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_blocked_bot_is_not_retryable() {
        let r = response(r#"{"ok": false, "error_code": 403, "description": "Forbidden: bot was blocked by the user"}"#);
        let err = classify_error("sendMessage", StatusCode::FORBIDDEN, Some(&r));
        assert_eq!(err.kind, TransportErrorKind::Rejected);
        assert!(!err.is_retryable());
        assert!(err.message.contains("blocked"));
    }

    #[test]
    fn test_gateway_error_without_body() {
        let err = classify_error::<Value>("getUpdates", StatusCode::BAD_GATEWAY, None);
        assert_eq!(err.kind, TransportErrorKind::ServerError);
    }

    #[test]
    fn test_base_url_trims_slash() {
        let client = TelegramClient::new("https://api.example.org/", "123:abc").unwrap();
        assert_eq!(client.base_url, "https://api.example.org/bot123:abc");
    }
}
