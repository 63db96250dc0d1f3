//! Request and wire types for oracle calls

use std::time::Duration;

use mafia_core::ModelProvider;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which decision an oracle call is producing. Carried for logging.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    Speech,
    Vote,
    MafiaKill,
    DoctorSave,
    DeputyInvestigate,
    Reflect,
    Curate,
}

impl Purpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Speech => "speech",
            Self::Vote => "vote",
            Self::MafiaKill => "mafia_kill",
            Self::DoctorSave => "doctor_save",
            Self::DeputyInvestigate => "deputy_investigate",
            Self::Reflect => "reflect",
            Self::Curate => "curate",
        }
    }
}

impl std::fmt::Display for Purpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A response type an oracle can be asked to produce.
pub trait StructuredResponse: DeserializeOwned + Send {
    /// JSON schema describing the expected reply.
    fn schema() -> Value;
}

#[derive(Debug, Clone)]
pub struct OracleRequest {
    pub provider: ModelProvider,
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub response_schema: Value,
    pub timeout: Duration,
    pub purpose: Purpose,
}

impl OracleRequest {
    pub fn new<T: StructuredResponse>(
        provider: ModelProvider,
        model: impl Into<String>,
        purpose: Purpose,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            response_schema: T::schema(),
            timeout: Duration::from_secs(60),
            purpose,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// System prompt with the JSON reply instructions appended.
    pub fn json_system_prompt(&self) -> String {
        let schema = serde_json::to_string_pretty(&self.response_schema)
            .unwrap_or_else(|_| self.response_schema.to_string());
        format!(
            "{}\n\nYou must respond with valid JSON matching this schema:\n{}\n\nRespond ONLY with the JSON object, no other text.",
            self.system_prompt, schema
        )
    }
}

// ============================================================================
// OpenAI-style chat completions
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

// ============================================================================
// Anthropic messages
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

// ============================================================================
// Provider error bodies
// ============================================================================

/// Error body shared by OpenAI-compatible and Anthropic APIs.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Speech {
        #[allow(dead_code)]
        content: String,
    }

    impl StructuredResponse for Speech {
        fn schema() -> Value {
            json!({"type": "object", "properties": {"content": {"type": "string"}}})
        }
    }

    #[test]
    fn test_json_system_prompt_embeds_schema() {
        let request = OracleRequest::new::<Speech>(
            ModelProvider::Openai,
            "gpt-4o",
            Purpose::Speech,
            "You are playing Mafia.",
            "Give your speech now.",
        );
        let prompt = request.json_system_prompt();
        assert!(prompt.starts_with("You are playing Mafia."));
        assert!(prompt.contains("\"content\""));
        assert!(prompt.ends_with("no other text."));
        assert_eq!(request.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_anthropic_response_parsing() {
        let body = r#"{"content":[{"type":"text","text":"{\"vote\":\"no_lynch\"}"}]}"#;
        let response: MessagesResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.content[0].block_type, "text");
        assert_eq!(response.content[0].text.as_deref(), Some("{\"vote\":\"no_lynch\"}"));
    }
}
