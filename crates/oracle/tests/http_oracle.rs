use std::time::Duration;

use mafia_core::ModelProvider;
use oracle::{
    call_with_retry, complete_structured, ApiStyle, HttpOracle, OracleError, OracleRequest,
    ProviderEndpoint, Purpose, RetryPolicy, StructuredResponse,
};
use serde::Deserialize;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize)]
struct Vote {
    vote: String,
    reasoning: String,
}

impl StructuredResponse for Vote {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {"vote": {"type": "string"}, "reasoning": {"type": "string"}},
            "required": ["vote", "reasoning"]
        })
    }
}

fn vote_request(provider: ModelProvider, model: &str) -> OracleRequest {
    OracleRequest::new::<Vote>(
        provider,
        model,
        Purpose::Vote,
        "You are voting in a Mafia game.",
        "Cast your vote. Valid targets: Alice, Bob, or 'no_lynch'",
    )
    .with_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn test_openai_chat_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_partial_json(json!({"model": "gpt-4o", "max_tokens": 2048})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant",
                "content": "```json\n{\"vote\": \"Alice\", \"reasoning\": \"She dodged questions\"}\n```"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let oracle = HttpOracle::new().with_endpoint(
        ModelProvider::Openai,
        ProviderEndpoint::new(server.uri(), "test-key", ApiStyle::OpenaiChat),
    );

    let vote: Vote = complete_structured(&oracle, &vote_request(ModelProvider::Openai, "gpt-4o"))
        .await
        .unwrap();
    assert_eq!(vote.vote, "Alice");
    assert_eq!(vote.reasoning, "She dodged questions");
}

#[tokio::test]
async fn test_anthropic_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "ant-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "{\"vote\": \"no_lynch\", \"reasoning\": \"Too early\"}"}]
        })))
        .mount(&server)
        .await;

    let oracle = HttpOracle::new().with_endpoint(
        ModelProvider::Anthropic,
        ProviderEndpoint::new(server.uri(), "ant-key", ApiStyle::AnthropicMessages),
    );

    let vote: Vote = complete_structured(
        &oracle,
        &vote_request(ModelProvider::Anthropic, "claude-sonnet"),
    )
    .await
    .unwrap();
    assert_eq!(vote.vote, "no_lynch");
}

#[tokio::test]
async fn test_wandb_short_model_is_expanded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "deepseek-ai/DeepSeek-V3-0324"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "{\"vote\": \"Bob\", \"reasoning\": \"r\"}"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let oracle = HttpOracle::new().with_endpoint(
        ModelProvider::Wandb,
        ProviderEndpoint::new(server.uri(), "wb", ApiStyle::OpenaiChat),
    );

    let vote: Vote = complete_structured(&oracle, &vote_request(ModelProvider::Wandb, "deepseek-v3"))
        .await
        .unwrap();
    assert_eq!(vote.vote, "Bob");
}

#[tokio::test]
async fn test_provider_error_is_mapped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"message": "upstream overloaded", "type": "server_error"}
        })))
        .mount(&server)
        .await;

    let oracle = HttpOracle::new().with_endpoint(
        ModelProvider::Openrouter,
        ProviderEndpoint::new(server.uri(), "k", ApiStyle::OpenaiChat),
    );

    let err = complete_structured::<Vote>(&oracle, &vote_request(ModelProvider::Openrouter, "m"))
        .await
        .unwrap_err();
    match err {
        OracleError::Provider { message, status_code } => {
            assert_eq!(message, "upstream overloaded");
            assert_eq!(status_code, Some(500));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_unconfigured_provider() {
    let oracle = HttpOracle::new();
    let err = complete_structured::<Vote>(&oracle, &vote_request(ModelProvider::Google, "gemini"))
        .await
        .unwrap_err();
    assert!(matches!(err, OracleError::UnknownProvider(_)));
}

#[tokio::test]
async fn test_retry_recovers_from_malformed_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "I think Bob did it."}}]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "{\"vote\": \"Bob\", \"reasoning\": \"r\"}"}}]
        })))
        .mount(&server)
        .await;

    let oracle = HttpOracle::new().with_endpoint(
        ModelProvider::Openai,
        ProviderEndpoint::new(server.uri(), "k", ApiStyle::OpenaiChat),
    );

    let vote: Vote = call_with_retry(
        &oracle,
        &vote_request(ModelProvider::Openai, "gpt-4o"),
        RetryPolicy::new(2, Duration::ZERO),
    )
    .await
    .unwrap();
    assert_eq!(vote.vote, "Bob");
}
