//! Messages-API backend (Anthropic and compatible endpoints).

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

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        Self::with_base_url(api_key, model, ProviderKind::Anthropic.base_url())
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
    ) -> ApiRequest {
        let prompt = build_prompt(&template.variable_names(), file_name);

        let message_content = match content {
            FileContent::Text(text) => MessageContent::Text(text_message(&prompt, text)),
            FileContent::Image { data, mime_type } => {
                let base64_image = base64::engine::general_purpose::STANDARD.encode(data);
                MessageContent::Blocks(vec![
                    ContentBlock::Text { text: prompt },
                    ContentBlock::Image {
                        source: ImageSource {
                            source_type: "base64".to_string(),
                            media_type: wire_mime(mime_type).to_string(),
                            data: base64_image,
                        },
                    },
                ])
            }
        };

        ApiRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: message_content,
            }],
        }
    }

    fn parse_reply(reply: ApiResponse) -> Result<AnalysisResult, ProviderError> {
        let usage = reply
            .usage
            .map(|usage| TokenUsage::new(usage.input_tokens, usage.output_tokens))
            .unwrap_or_default();

        let text = reply
            .content
            .into_iter()
            .next()
            .and_then(|block| block.text)
            .ok_or(ProviderError::InvalidResponse)?;

        Ok(AnalysisResult {
            values: parse_value_map(&text)?,
            usage,
        })
    }
}

#[async_trait]
impl AnalysisProvider for AnthropicProvider {
    async fn analyze(
        &self,
        content: &FileContent,
        template: &RenameTemplate,
        file_name: &str,
    ) -> Result<AnalysisResult, ProviderError> {
        let request = self.build_request(content, template, file_name);

        tracing::debug!(
            "[Anthropic] Analyzing {} with model {}",
            file_name,
            self.model
        );

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|err| ProviderError::RequestFailed(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("[Anthropic] Request failed with HTTP {}", status.as_u16());
            return Err(ProviderError::http(status, &body));
        }

        let reply: ApiResponse = response
            .json()
            .await
            .map_err(|_| ProviderError::InvalidResponse)?;

        Self::parse_reply(reply)
    }
}

// Wire types

#[derive(Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ApiMessage>,
}

#[derive(Serialize)]
struct ApiMessage {
    role: String,
    content: MessageContent,
}

/// Plain string for text payloads, block array for multimodal ones.
#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image")]
    Image { source: ImageSource },
}

#[derive(Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    source_type: String,
    media_type: String,
    data: String,
}

#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ResponseBlock>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct ResponseBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn provider() -> AnthropicProvider {
        AnthropicProvider::new("sk-ant-test", "claude-sonnet-4-20250514").unwrap()
    }

    #[test]
    fn test_text_request_body_shape() {
        let request = provider().build_request(
            &FileContent::Text("ledger rows".to_string()),
            &RenameTemplate::new("{date}.{ext}"),
            "ledger.csv",
        );
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["model"], "claude-sonnet-4-20250514");
        assert_eq!(body["max_tokens"], 1024);
        assert!(body.get("temperature").is_none());
        assert_eq!(body["messages"][0]["role"], "user");

        let content = body["messages"][0]["content"].as_str().unwrap();
        assert!(content.contains("The original file name is \"ledger.csv\""));
        assert!(content.ends_with("File content:\nledger rows"));
    }

    #[test]
    fn test_image_request_body_shape() {
        let request = provider().build_request(
            &FileContent::Image {
                data: vec![9, 9, 9],
                mime_type: "image/png".to_string(),
            },
            &RenameTemplate::new("{topic}.{ext}"),
            "scan.png",
        );
        let body = serde_json::to_value(&request).unwrap();

        let blocks = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0]["type"], "text");
        assert_eq!(blocks[1]["type"], "image");
        assert_eq!(blocks[1]["source"]["type"], "base64");
        assert_eq!(blocks[1]["source"]["media_type"], "image/png");
        assert_eq!(
            blocks[1]["source"]["data"],
            base64::engine::general_purpose::STANDARD.encode([9u8, 9, 9])
        );
    }

    fn reply(value: Value) -> ApiResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_reply_with_usage() {
        let result = AnthropicProvider::parse_reply(reply(json!({
            "content": [{"type": "text", "text": "{\"topic\": \"meeting-notes\"}"}],
            "usage": {"input_tokens": 42, "output_tokens": 7}
        })))
        .unwrap();

        assert_eq!(result.values["topic"], "meeting-notes");
        assert_eq!(result.usage, TokenUsage::new(42, 7));
    }

    #[test]
    fn test_parse_reply_without_usage_defaults_to_zero() {
        let result = AnthropicProvider::parse_reply(reply(json!({
            "content": [{"type": "text", "text": "{\"a\": \"b\"}"}]
        })))
        .unwrap();
        assert_eq!(result.usage, TokenUsage::default());
    }

    #[test]
    fn test_parse_reply_without_text_is_invalid() {
        let err = AnthropicProvider::parse_reply(reply(json!({"content": []}))).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse));

        let err =
            AnthropicProvider::parse_reply(reply(json!({"content": [{"type": "tool_use"}]})))
                .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse));
    }
}
