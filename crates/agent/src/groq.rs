use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::multipart;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use facturo_core::config::GroqConfig;

use crate::collaborators::{ExtractedDraft, StructuredExtractor, Transcriber};

const EXTRACTION_SYSTEM_PROMPT: &str = "\
Ты — парсер накладных. Верни ТОЛЬКО валидный JSON без комментариев и без markdown.
Схема JSON:
{ \"supplier\": string, \"date\": string|null, \"eta_text\": string|null, \
\"items\": [{\"name\": string, \"qty\": number, \"unit_price\": number}] }
Правила:
- Если дата не указана, date=null.
- 'Доставка 5000' — отдельная позиция name='Доставка', qty=1, unit_price=5000.
- Если не уверен в цене или количестве — ставь 0, но имя заполняй.
- Не придумывай товары.";

/// Groq OpenAI-compatible client: Whisper transcription and JSON-contract
/// chat extraction, both on the same HTTP client and key.
pub struct GroqClient {
    http: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    text_model: String,
    whisper_model: String,
}

impl GroqClient {
    /// `None` when no API key is configured.
    pub fn from_config(config: &GroqConfig) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .ok()?;
        Some(Self {
            http,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            text_model: config.text_model.clone(),
            whisper_model: config.whisper_model.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl Transcriber for GroqClient {
    async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        let file = multipart::Part::bytes(audio.to_vec())
            .file_name("voice.ogg")
            .mime_str("audio/ogg")
            .context("building audio upload part")?;
        let form =
            multipart::Form::new().text("model", self.whisper_model.clone()).part("file", file);

        let response = self
            .http
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .context("transcription request failed")?
            .error_for_status()
            .context("transcription request rejected")?;

        let body: TranscriptionResponse =
            response.json().await.context("decoding transcription response")?;
        Ok(body.text.trim().to_owned())
    }
}

#[async_trait]
impl StructuredExtractor for GroqClient {
    async fn extract(&self, text: &str) -> Result<Option<ExtractedDraft>> {
        let request = json!({
            "model": self.text_model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": EXTRACTION_SYSTEM_PROMPT },
                { "role": "user", "content": format!("Текст:\n{text}") },
            ],
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .context("extraction request failed")?
            .error_for_status()
            .context("extraction request rejected")?;

        let body: ChatCompletionResponse =
            response.json().await.context("decoding extraction response")?;
        let content = body
            .choices
            .first()
            .map(|choice| choice.message.content.trim())
            .ok_or_else(|| anyhow!("extraction response carried no choices"))?;

        Ok(parse_draft(content))
    }
}

/// Best-effort parse of the model output: tolerate markdown code fences,
/// reject anything that is not the agreed schema with at least one item.
fn parse_draft(content: &str) -> Option<ExtractedDraft> {
    let bare = strip_code_fences(content);
    let draft: ExtractedDraft = serde_json::from_str(bare).ok()?;
    (!draft.items.is_empty()).then_some(draft)
}

fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
