//! HTTP oracle speaking OpenAI-style chat completions and Anthropic messages

use std::collections::HashMap;

use async_trait::async_trait;
use mafia_core::ModelProvider;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::{OracleError, OracleResult};
use crate::parse::parse_json_response;
use crate::types::*;
use crate::LanguageOracle;

const MAX_TOKENS: u32 = 2048;
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Short W&B Inference model ids and the full names the API expects.
const WANDB_MODEL_MAP: [(&str, &str); 5] = [
    ("llama-3.1-8b", "meta-llama/Llama-3.1-8B-Instruct"),
    ("qwen3-235b", "Qwen/Qwen3-235B-A22B-Instruct-2507"),
    ("deepseek-v3", "deepseek-ai/DeepSeek-V3-0324"),
    ("llama-3.3-70b", "meta-llama/Llama-3.3-70B-Instruct"),
    ("gpt-oss-20b", "openai/GPT-OSS-20B"),
];

fn resolve_model_name(provider: ModelProvider, model: &str) -> String {
    if provider == ModelProvider::Wandb {
        if let Some((_, full)) = WANDB_MODEL_MAP.iter().find(|(short, _)| *short == model) {
            return (*full).to_string();
        }
    }
    model.to_string()
}

/// Wire protocol spoken by a provider endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApiStyle {
    #[default]
    OpenaiChat,
    AnthropicMessages,
}

#[derive(Debug, Clone)]
pub struct ProviderEndpoint {
    pub base_url: String,
    pub api_key: String,
    pub api: ApiStyle,
}

impl ProviderEndpoint {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, api: ApiStyle) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api,
        }
    }

    /// Public endpoint for a provider. `OpenaiCompatible` has none and must
    /// be configured with an explicit base URL.
    pub fn default_for(provider: ModelProvider, api_key: impl Into<String>) -> Option<Self> {
        let (base_url, api) = match provider {
            ModelProvider::Anthropic => ("https://api.anthropic.com", ApiStyle::AnthropicMessages),
            ModelProvider::Openai => ("https://api.openai.com/v1", ApiStyle::OpenaiChat),
            ModelProvider::Google => (
                "https://generativelanguage.googleapis.com/v1beta/openai",
                ApiStyle::OpenaiChat,
            ),
            ModelProvider::Openrouter => ("https://openrouter.ai/api/v1", ApiStyle::OpenaiChat),
            ModelProvider::Wandb => ("https://api.inference.wandb.ai/v1", ApiStyle::OpenaiChat),
            ModelProvider::OpenaiCompatible => return None,
        };
        Some(Self::new(base_url, api_key, api))
    }
}

/// Oracle backed by remote model APIs, one endpoint per provider.
#[derive(Clone)]
pub struct HttpOracle {
    client: Client,
    endpoints: HashMap<ModelProvider, ProviderEndpoint>,
}

impl HttpOracle {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            endpoints: HashMap::new(),
        }
    }

    pub fn with_endpoint(mut self, provider: ModelProvider, endpoint: ProviderEndpoint) -> Self {
        self.endpoints.insert(provider, endpoint);
        self
    }

    pub fn is_available(&self, provider: ModelProvider) -> bool {
        self.endpoints.contains_key(&provider)
    }

    pub fn available_providers(&self) -> Vec<ModelProvider> {
        let mut providers: Vec<_> = self.endpoints.keys().copied().collect();
        providers.sort_by_key(|p| p.as_str());
        providers
    }

    async fn complete_text(&self, request: &OracleRequest) -> OracleResult<String> {
        let endpoint = self
            .endpoints
            .get(&request.provider)
            .ok_or_else(|| OracleError::UnknownProvider(request.provider.to_string()))?;
        let model = resolve_model_name(request.provider, &request.model);
        let system_prompt = request.json_system_prompt();

        debug!(
            provider = %request.provider,
            model = %model,
            purpose = %request.purpose,
            "Sending oracle request"
        );

        match endpoint.api {
            ApiStyle::OpenaiChat => {
                self.chat_completion(endpoint, model, system_prompt, &request.user_prompt)
                    .await
            }
            ApiStyle::AnthropicMessages => {
                self.anthropic_messages(endpoint, model, system_prompt, &request.user_prompt)
                    .await
            }
        }
    }

    async fn chat_completion(
        &self,
        endpoint: &ProviderEndpoint,
        model: String,
        system_prompt: String,
        user_prompt: &str,
    ) -> OracleResult<String> {
        let body = ChatCompletionRequest {
            model,
            messages: vec![ChatMessage::system(system_prompt), ChatMessage::user(user_prompt)],
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", endpoint.base_url))
            .header("Authorization", format!("Bearer {}", endpoint.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Parse(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| OracleError::provider("OpenAI-style endpoint returned empty response"))
    }

    async fn anthropic_messages(
        &self,
        endpoint: &ProviderEndpoint,
        model: String,
        system_prompt: String,
        user_prompt: &str,
    ) -> OracleResult<String> {
        let body = MessagesRequest {
            model,
            system: system_prompt,
            messages: vec![ChatMessage::user(user_prompt)],
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", endpoint.base_url))
            .header("x-api-key", &endpoint.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;

        let message: MessagesResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Parse(e.to_string()))?;

        message
            .content
            .into_iter()
            .find(|block| block.block_type == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| OracleError::provider("Anthropic returned no text content"))
    }
}

impl Default for HttpOracle {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps a non-success status into a provider error.
async fn check_status(response: Response) -> OracleResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response.text().await.unwrap_or_default();
    if status.as_u16() == 429 {
        warn!("Rate limited by provider");
    }

    if let Ok(error_resp) = serde_json::from_str::<ApiErrorBody>(&error_text) {
        error!(
            "Provider API error: {} (type: {:?})",
            error_resp.error.message, error_resp.error.error_type
        );
        return Err(OracleError::Provider {
            message: error_resp.error.message,
            status_code: Some(status.as_u16()),
        });
    }

    Err(OracleError::Provider {
        message: format!("HTTP {}: {}", status, error_text),
        status_code: Some(status.as_u16()),
    })
}

#[async_trait]
impl LanguageOracle for HttpOracle {
    async fn complete_json(&self, request: &OracleRequest) -> OracleResult<Value> {
        let text = self.complete_text(request).await?;
        parse_json_response(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wandb_model_mapping() {
        assert_eq!(
            resolve_model_name(ModelProvider::Wandb, "deepseek-v3"),
            "deepseek-ai/DeepSeek-V3-0324"
        );
        assert_eq!(resolve_model_name(ModelProvider::Wandb, "custom/model"), "custom/model");
        assert_eq!(resolve_model_name(ModelProvider::Openai, "deepseek-v3"), "deepseek-v3");
    }

    #[test]
    fn test_default_endpoints() {
        let anthropic = ProviderEndpoint::default_for(ModelProvider::Anthropic, "k").unwrap();
        assert_eq!(anthropic.api, ApiStyle::AnthropicMessages);

        let openrouter = ProviderEndpoint::default_for(ModelProvider::Openrouter, "k").unwrap();
        assert_eq!(openrouter.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(openrouter.api, ApiStyle::OpenaiChat);

        assert!(ProviderEndpoint::default_for(ModelProvider::OpenaiCompatible, "k").is_none());
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let endpoint = ProviderEndpoint::new("http://localhost:8000/v1/", "k", ApiStyle::OpenaiChat);
        assert_eq!(endpoint.base_url, "http://localhost:8000/v1");
    }

    #[test]
    fn test_availability() {
        let oracle = HttpOracle::new().with_endpoint(
            ModelProvider::Openai,
            ProviderEndpoint::default_for(ModelProvider::Openai, "k").unwrap(),
        );
        assert!(oracle.is_available(ModelProvider::Openai));
        assert!(!oracle.is_available(ModelProvider::Anthropic));
        assert_eq!(oracle.available_providers(), vec![ModelProvider::Openai]);
    }
}
