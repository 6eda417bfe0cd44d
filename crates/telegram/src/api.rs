use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use facturo_core::config::TelegramConfig;

use crate::keyboard::InlineKeyboardMarkup;
use crate::update::Update;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("update poll failed: {0}")]
    Poll(String),
    #[error("outbound send failed: {0}")]
    Send(String),
    #[error("callback acknowledgement failed: {0}")]
    Acknowledge(String),
    #[error("file download failed: {0}")]
    Download(String),
    #[error("bot api rejected the call: {0}")]
    Rejected(String),
}

/// Bot API calls the update loop needs. `next_updates` long-polls and
/// returns when the server has updates at or past `offset` or the poll
/// timeout elapses.
#[async_trait]
pub trait BotApi: Send + Sync {
    async fn next_updates(&self, offset: i64) -> Result<Vec<Update>, TransportError>;
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<(), TransportError>;
    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError>;
    async fn send_document(
        &self,
        chat_id: i64,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<(), TransportError>;
    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, TransportError>;
}

/// reqwest-backed Bot API client.
pub struct TelegramApi {
    http: reqwest::Client,
    base_url: String,
    token: SecretString,
    poll_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: serde::Deserialize<'de>"))]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    #[serde(default)]
    file_path: Option<String>,
}

impl TelegramApi {
    pub fn from_config(config: &TelegramConfig) -> Result<Self, TransportError> {
        // The HTTP timeout must outlast the server-side long-poll window.
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + 10))
            .build()
            .map_err(|e| TransportError::Poll(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            token: config.bot_token.clone(),
            poll_timeout_secs: config.poll_timeout_secs,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token.expose_secret(), method)
    }

    async fn call<T>(
        &self,
        method: &str,
        body: serde_json::Value,
        wrap: fn(String) -> TransportError,
    ) -> Result<T, TransportError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .http
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| wrap(e.to_string()))?;
        let parsed: ApiResponse<T> = response.json().await.map_err(|e| wrap(e.to_string()))?;
        if !parsed.ok {
            return Err(TransportError::Rejected(
                parsed.description.unwrap_or_else(|| format!("{method} returned ok=false")),
            ));
        }
        parsed.result.ok_or_else(|| wrap(format!("{method} returned no result")))
    }
}

#[async_trait]
impl BotApi for TelegramApi {
    async fn next_updates(&self, offset: i64) -> Result<Vec<Update>, TransportError> {
        let body = json!({
            "offset": offset,
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        self.call("getUpdates", body, TransportError::Poll).await
    }

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<(), TransportError> {
        let mut body = json!({ "chat_id": chat_id, "text": text });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = serde_json::to_value(keyboard)
                .map_err(|e| TransportError::Send(e.to_string()))?;
        }
        self.call::<serde_json::Value>("sendMessage", body, TransportError::Send).await?;
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        let mut body = json!({ "callback_query_id": callback_id });
        if let Some(text) = text {
            body["text"] = json!(text);
        }
        // answerCallbackQuery returns a bare boolean result.
        self.call::<bool>("answerCallbackQuery", body, TransportError::Acknowledge).await?;
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: i64,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<(), TransportError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_owned())
            .mime_str("text/plain")
            .map_err(|e| TransportError::Send(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", part);

        let response = self
            .http
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;
        let parsed: ApiResponse<serde_json::Value> =
            response.json().await.map_err(|e| TransportError::Send(e.to_string()))?;
        if !parsed.ok {
            return Err(TransportError::Rejected(
                parsed.description.unwrap_or_else(|| "sendDocument returned ok=false".to_owned()),
            ));
        }
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, TransportError> {
        let info: FileInfo = self
            .call("getFile", json!({ "file_id": file_id }), TransportError::Download)
            .await?;
        let path = info
            .file_path
            .ok_or_else(|| TransportError::Download("getFile returned no path".to_owned()))?;

        let url =
            format!("{}/file/bot{}/{}", self.base_url, self.token.expose_secret(), path);
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::Download(e.to_string()))?
            .error_for_status()
            .map_err(|e| TransportError::Download(e.to_string()))?;
        let bytes =
            response.bytes().await.map_err(|e| TransportError::Download(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
