//! Analysis providers: asking a model to fill in template variables.
//!
//! Two wire formats behind one trait. Both share the same instruction prompt,
//! the same text-truncation and image-encoding rules, and the same tolerant
//! reply parsing; they differ only in request/response shape.

mod anthropic;
mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;

use crate::batch::TokenUsage;
use crate::credentials::CredentialStore;
use crate::error::ProviderError;
use crate::extract::{FileContent, OCTET_STREAM};
use crate::settings::SettingsStore;
use crate::template::RenameTemplate;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Maximum characters of text content attached to a request.
const MAX_TEXT_CHARS: usize = 8000;

/// Values extracted by the model plus the token accounting for the call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisResult {
    pub values: HashMap<String, String>,
    pub usage: TokenUsage,
}

/// A model backend able to fill in template variables for one file.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    async fn analyze(
        &self,
        content: &FileContent,
        template: &RenameTemplate,
        file_name: &str,
    ) -> Result<AnalysisResult, ProviderError>;
}

impl std::fmt::Debug for dyn AnalysisProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AnalysisProvider")
    }
}

/// The wire formats this crate speaks natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Anthropic => "Anthropic",
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Anthropic => "https://api.anthropic.com/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o",
            ProviderKind::Anthropic => "claude-sonnet-4-20250514",
        }
    }

    /// Settings key holding an optional model-name override.
    pub fn model_key(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai_model",
            ProviderKind::Anthropic => "anthropic_model",
        }
    }

    /// Credential key the API key is stored under.
    pub fn credential_key(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai_api_key",
            ProviderKind::Anthropic => "anthropic_api_key",
        }
    }
}

/// Build a ready-to-use provider from stored credentials and settings.
///
/// The API key must be present and non-empty; the model name falls back to
/// the provider default when not configured.
pub fn build_provider(
    kind: ProviderKind,
    credentials: &dyn CredentialStore,
    settings: &dyn SettingsStore,
) -> Result<Arc<dyn AnalysisProvider>, ProviderError> {
    let api_key = credentials
        .load(kind.credential_key())
        .filter(|key| !key.is_empty())
        .ok_or(ProviderError::NoApiKey)?;

    let model = settings
        .lookup(kind.model_key())
        .filter(|model| !model.is_empty())
        .unwrap_or_else(|| kind.default_model().to_string());

    tracing::debug!(
        "[Provider] Using {} with model {}",
        kind.display_name(),
        model
    );

    let provider: Arc<dyn AnalysisProvider> = match kind {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(api_key, model)?),
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(api_key, model)?),
    };
    Ok(provider)
}

/// Instruction sent ahead of the file content. The model must answer with a
/// flat JSON object mapping each listed variable to a value.
fn build_prompt(variables: &[String], file_name: &str) -> String {
    let variable_list = variables.join(", ");
    format!(
        r#"Analyze this file and extract values for a file naming template. The original file name is "{file_name}".

Extract values for these template variables: {variable_list}

Rules:
- Use only filesystem-safe characters (no / \ : * ? " < > |)
- Use hyphens or underscores instead of spaces
- Keep values concise (1-4 words each)
- For dates, use YYYY-MM-DD format
- If a value cannot be determined, use "unknown"

Respond ONLY with a JSON object mapping variable names to extracted values. Example: {{"date": "2024-01-15", "topic": "quarterly-report", "author": "john-smith"}}"#
    )
}

/// Full user-message text for a text payload, bounded to keep request size
/// and cost predictable.
fn text_message(prompt: &str, text: &str) -> String {
    let truncated: String = text.chars().take(MAX_TEXT_CHARS).collect();
    format!("{}\n\nFile content:\n{}", prompt, truncated)
}

/// MIME type actually put on the wire for an image payload; generic binary is
/// presented as PNG so vision endpoints will accept it.
fn wire_mime(mime_type: &str) -> &str {
    if mime_type == OCTET_STREAM {
        "image/png"
    } else {
        mime_type
    }
}

/// Pull the first JSON object out of a reply that may wrap it in prose or
/// markdown fences.
///
/// The raw-brace fallback is a tolerance heuristic, not a balanced parser:
/// prose braces surrounding the object can widen the capture and fail the
/// decode. That boundary is pinned in tests rather than papered over.
fn extract_json_object(text: &str) -> Option<&str> {
    // ```json fenced block
    if let Some(start) = text.find("```json") {
        let json_start = start + 7;
        if let Some(end) = text[json_start..].find("```") {
            return Some(text[json_start..json_start + end].trim());
        }
    }

    // Plain fenced block, skipping the language line
    if let Some(start) = text.find("```") {
        let block_start = start + 3;
        let content_start = text[block_start..]
            .find('\n')
            .map(|i| block_start + i + 1)
            .unwrap_or(block_start);
        if let Some(end) = text[content_start..].find("```") {
            return Some(text[content_start..content_start + end].trim());
        }
    }

    // First { to last }
    if let Some(start) = text.find('{') {
        if let Some(end) = text.rfind('}') {
            if end > start {
                return Some(&text[start..=end]);
            }
        }
    }

    None
}

/// Decode the model's reply into a flat name→value map.
fn parse_value_map(reply: &str) -> Result<HashMap<String, String>, ProviderError> {
    let json = extract_json_object(reply).ok_or(ProviderError::InvalidResponse)?;
    serde_json::from_str(json).map_err(|_| ProviderError::InvalidResponse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentials;
    use crate::settings::MemorySettings;

    #[test]
    fn test_build_provider_requires_api_key() {
        let credentials = MemoryCredentials::new();
        let settings = MemorySettings::new();
        let err = build_provider(ProviderKind::OpenAi, &credentials, &settings).unwrap_err();
        assert!(matches!(err, ProviderError::NoApiKey));
    }

    #[test]
    fn test_build_provider_with_stored_key_and_model_override() {
        let credentials = MemoryCredentials::new().with("anthropic_api_key", "sk-ant-test");
        let settings = MemorySettings::new().with("anthropic_model", "claude-3-5-haiku-latest");
        assert!(build_provider(ProviderKind::Anthropic, &credentials, &settings).is_ok());
    }

    #[test]
    fn test_prompt_lists_variables_and_file_name() {
        let prompt = build_prompt(&["date".to_string(), "topic".to_string()], "scan_001.pdf");
        assert!(prompt.contains("The original file name is \"scan_001.pdf\""));
        assert!(prompt.contains("template variables: date, topic"));
        assert!(prompt.contains("use \"unknown\""));
        assert!(prompt.contains(r#"Example: {"date": "2024-01-15""#));
    }

    #[test]
    fn test_text_message_truncates_to_char_limit() {
        let long = "ü".repeat(MAX_TEXT_CHARS * 2);
        let message = text_message("prompt", &long);
        let body = message.split("File content:\n").nth(1).unwrap();
        assert_eq!(body.chars().count(), MAX_TEXT_CHARS);
    }

    #[test]
    fn test_wire_mime_substitutes_generic_binary() {
        assert_eq!(wire_mime("application/octet-stream"), "image/png");
        assert_eq!(wire_mime("image/jpeg"), "image/jpeg");
    }

    #[test]
    fn test_parse_fenced_reply() {
        let reply = "Sure! ```json\n{\"date\":\"2024-01-01\"}\n```";
        let values = parse_value_map(reply).unwrap();
        assert_eq!(values["date"], "2024-01-01");
    }

    #[test]
    fn test_parse_plain_fenced_reply() {
        let reply = "```\n{\"topic\": \"minutes\"}\n```";
        let values = parse_value_map(reply).unwrap();
        assert_eq!(values["topic"], "minutes");
    }

    #[test]
    fn test_parse_raw_object_in_prose() {
        let reply = r#"Here you go: {"a": "1", "b": "2"} hope that helps"#;
        let values = parse_value_map(reply).unwrap();
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_reply_without_braces_is_invalid() {
        let err = parse_value_map("I could not determine any values.").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse));
    }

    #[test]
    fn test_non_string_values_are_invalid() {
        let err = parse_value_map(r#"{"count": 3}"#).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse));
    }

    #[test]
    fn test_reversed_braces_are_invalid_not_a_panic() {
        let err = parse_value_map("} nothing here {").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse));
    }

    // Known tolerance boundary of the brace heuristic: prose braces around
    // the object widen the capture to something undecodable.
    #[test]
    fn test_prose_braces_widen_the_capture() {
        let reply = r#"a {weird} aside {"date": "2024-01-01"} trailing {brace}"#;
        assert!(parse_value_map(reply).is_err());
    }
}
