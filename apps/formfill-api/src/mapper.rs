//! Claude-backed instruction mapper.
//!
//! One Messages API call per turn: the detected fields are serialized
//! into the prompt and the model answers with a JSON array of
//! `{field_id, value}` edits.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use formfill_core::{DetectedField, FieldEdit, MapperError};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 2048;

const SYSTEM_PROMPT: &str = "You map natural-language form-filling instructions onto PDF form fields.\n\
You are given the detected fields as JSON and the user's instructions.\n\
Respond with ONLY a JSON array of edits: [{\"field_id\": \"...\", \"value\": ...}].\n\
Rules:\n\
- Use each field's label_context to decide what it is for.\n\
- For dropdown fields, value must be one of the listed options, exactly.\n\
- For checkbox fields, value must be the boolean true or false.\n\
- Only include fields the instructions give a value for. An empty array is a valid answer.";

pub struct ClaudeMapper {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: String,
}

impl ClaudeMapper {
    /// Build from `ANTHROPIC_API_KEY` / `ANTHROPIC_MODEL`. A missing key
    /// is `MapperError::Unavailable`, which callers surface distinctly
    /// from an empty mapping result.
    pub fn from_env() -> Result<Self, MapperError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| MapperError::Unavailable("ANTHROPIC_API_KEY not set".to_string()))?;
        let model =
            std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| MapperError::Unavailable(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub async fn map(
        &self,
        instructions: &str,
        fields: &[DetectedField],
    ) -> Result<Vec<FieldEdit>, MapperError> {
        let fields_json = serde_json::to_string_pretty(fields)
            .map_err(|e| MapperError::Failed(e.to_string()))?;
        let user_prompt = format!(
            "Form fields:\n{}\n\nInstructions:\n{}",
            fields_json, instructions
        );

        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            system: SYSTEM_PROMPT.to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: user_prompt,
            }],
        };

        debug!("Calling Anthropic API with model: {}", self.model);

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| MapperError::Failed(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(MapperError::Failed(format!("API error: {}", error_text)));
        }

        let result: MessagesResponse = response
            .json()
            .await
            .map_err(|e| MapperError::Failed(format!("bad response: {}", e)))?;

        let content = result
            .content
            .first()
            .map(|block| block.text.as_str())
            .unwrap_or_default();

        parse_edits(content)
    }
}

/// Parse the model's answer, tolerating code fences and surrounding prose.
fn parse_edits(content: &str) -> Result<Vec<FieldEdit>, MapperError> {
    let trimmed = content.trim();
    let json = match (trimmed.find('['), trimmed.rfind(']')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => {
            return Err(MapperError::Failed(format!(
                "no JSON array in mapper output: {}",
                truncate(trimmed, 120)
            )))
        }
    };
    serde_json::from_str(json)
        .map_err(|e| MapperError::Failed(format!("unparseable mapper output: {}", e)))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formfill_core::FieldValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_edits_plain_array() {
        let edits = parse_edits(r#"[{"field_id":"page0_Name","value":"John"}]"#).unwrap();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].value, FieldValue::Text("John".into()));
    }

    #[test]
    fn test_parse_edits_fenced_with_prose() {
        let content = "Here are the edits:\n```json\n[\n  {\"field_id\": \"page0_Agree\", \"value\": true}\n]\n```";
        let edits = parse_edits(content).unwrap();
        assert_eq!(edits[0].value, FieldValue::Bool(true));
    }

    #[test]
    fn test_parse_edits_empty_array_is_valid() {
        assert!(parse_edits("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_edits_rejects_prose_only() {
        assert!(parse_edits("I could not find any fields.").is_err());
    }
}
