//! Chat-completions backend (OpenAI and compatible endpoints).

use super::{build_prompt, parse_value_map, text_message, wire_mime};
use super::{AnalysisProvider, AnalysisResult, ProviderKind};
use crate::batch::TokenUsage;
use crate::error::ProviderError;
use crate::extract::FileContent;
use crate::template::RenameTemplate;
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        Self::with_base_url(api_key, model, ProviderKind::OpenAi.base_url())
    }

    /// Point the provider at a compatible endpoint (proxies, test servers).
    pub fn with_base_url(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| {
                ProviderError::RequestFailed(format!("Failed to create HTTP client: {}", err))
            })?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
        })
    }

    fn build_request(
        &self,
        content: &FileContent,
        template: &RenameTemplate,
        file_name: &str,
    ) -> ChatRequest {
        let prompt = build_prompt(&template.variable_names(), file_name);

        let message_content = match content {
            FileContent::Text(text) => MessageContent::Text(text_message(&prompt, text)),
            FileContent::Image { data, mime_type } => {
                let base64_image = base64::engine::general_purpose::STANDARD.encode(data);
                let data_url = format!("data:{};base64,{}", wire_mime(mime_type), base64_image);
                MessageContent::Parts(vec![
                    ContentPart::Text { text: prompt },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: data_url },
                    },
                ])
            }
        };

        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: message_content,
            }],
            temperature: 0.1,
        }
    }

    fn parse_reply(reply: ChatResponse) -> Result<AnalysisResult, ProviderError> {
        let usage = reply
            .usage
            .map(|usage| TokenUsage::new(usage.prompt_tokens, usage.completion_tokens))
            .unwrap_or_default();

        let text = reply
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(ProviderError::InvalidResponse)?;

        Ok(AnalysisResult {
            values: parse_value_map(&text)?,
            usage,
        })
    }
}

#[async_trait]
impl AnalysisProvider for OpenAiProvider {
    async fn analyze(
        &self,
        content: &FileContent,
        template: &RenameTemplate,
        file_name: &str,
    ) -> Result<AnalysisResult, ProviderError> {
        let request = self.build_request(content, template, file_name);

        tracing::debug!("[OpenAI] Analyzing {} with model {}", file_name, self.model);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|err| ProviderError::RequestFailed(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("[OpenAI] Request failed with HTTP {}", status.as_u16());
            return Err(ProviderError::http(status, &body));
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|_| ProviderError::InvalidResponse)?;

        Self::parse_reply(reply)
    }
}

// Wire types

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: MessageContent,
}

/// Plain string for text payloads, part array for multimodal ones.
#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}
