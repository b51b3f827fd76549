//! Chat-completions client for OpenAI-compatible endpoints.
//!
//! Gemini is reached through Google's OpenAI endpoint; OpenRouter, Ollama,
//! vLLM and llama.cpp expose the same `/chat/completions` shape.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uavchat_core::error::ProviderError;
use uavchat_core::message::{Role, Turn};
use uavchat_core::provider::*;

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(120);

/// One configured endpoint. Requests are single-shot and non-streaming.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

fn role_name(role: &Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// JSON body for a completion request. `max_tokens` is omitted when unset.
fn request_body(request: &ProviderRequest) -> serde_json::Value {
    let messages: Vec<ApiMessage> = request
        .messages
        .iter()
        .map(|turn| ApiMessage {
            role: role_name(&turn.role).to_string(),
            content: Some(turn.content.clone()),
        })
        .collect();

    let mut body = serde_json::json!({
        "model": request.model,
        "messages": messages,
        "temperature": request.temperature,
        "stream": false,
    });
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = serde_json::json!(max_tokens);
    }
    body
}

/// Maps a non-success HTTP status to the provider error it stands for.
fn status_error(status: u16, body: String) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited {
            retry_after_secs: 5,
        },
        401 | 403 => ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ),
        _ => ProviderError::ApiError {
            status_code: status,
            message: body,
        },
    }
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// Takes the first choice. An empty `choices` array is an API error.
fn into_provider_response(
    parsed: ApiResponse,
    requested_model: String,
) -> Result<ProviderResponse, ProviderError> {
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::ApiError {
            status_code: 200,
            message: "No choices in response".into(),
        })?;

    Ok(ProviderResponse {
        message: Turn::assistant(choice.message.content.unwrap_or_default()),
        usage: parsed.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }),
        model: parsed.model.unwrap_or(requested_model),
    })
}

#[async_trait]
impl uavchat_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request_body(&request))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(provider = %self.name, status = status.as_u16(), body = %body, "Provider returned error");
            return Err(status_error(status.as_u16(), body));
        }

        let parsed: ApiResponse = response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: status.as_u16(),
            message: format!("Failed to parse response: {e}"),
        })?;

        into_provider_response(parsed, request.model)
    }
}

// --- wire types ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    // Gemini's compatibility layer omits `model` on some responses.
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uavchat_core::Provider;

    fn request(max_tokens: Option<u32>) -> ProviderRequest {
        ProviderRequest {
            model: "gemini-2.0-flash".into(),
            messages: vec![Turn::system("persona"), Turn::user("what vehicle is this?")],
            temperature: 0.0,
            max_tokens,
        }
    }

    #[test]
    fn base_url_is_trimmed_before_joining() {
        let provider = OpenAiCompatProvider::new("local", "http://host:1234/v1/", "k");
        assert_eq!(provider.name(), "local");
        assert_eq!(provider.endpoint(), "http://host:1234/v1/chat/completions");
    }

    #[test]
    fn body_carries_roles_and_settings() {
        let body = request_body(&request(Some(512)));
        assert_eq!(body["model"], "gemini-2.0-flash");
        assert_eq!(body["stream"], false);
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "what vehicle is this?");
    }

    #[test]
    fn body_omits_unset_max_tokens() {
        let body = request_body(&request(None));
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn statuses_map_to_provider_errors() {
        assert!(matches!(
            status_error(429, String::new()),
            ProviderError::RateLimited { .. }
        ));
        assert!(matches!(
            status_error(401, String::new()),
            ProviderError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            status_error(403, String::new()),
            ProviderError::AuthenticationFailed(_)
        ));
        match status_error(500, "upstream exploded".into()) {
            ProviderError::ApiError {
                status_code,
                message,
            } => {
                assert_eq!(status_code, 500);
                assert_eq!(message, "upstream exploded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn first_choice_becomes_assistant_turn() {
        let data = r#"{
            "model": "gemini-2.0-flash",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "{\"sections\": [\"vehicle\"]}"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 120, "completion_tokens": 9, "total_tokens": 129}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        let response = into_provider_response(parsed, "requested".into()).unwrap();
        assert_eq!(response.message.role, Role::Assistant);
        assert_eq!(response.message.content, "{\"sections\": [\"vehicle\"]}");
        assert_eq!(response.model, "gemini-2.0-flash");
        assert_eq!(response.usage.unwrap().total_tokens, 129);
    }

    #[test]
    fn missing_model_falls_back_to_requested() {
        let data = r#"{"choices": [{"message": {"role": "assistant", "content": "ok"}}]}"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        let response = into_provider_response(parsed, "requested".into()).unwrap();
        assert_eq!(response.model, "requested");
        assert!(response.usage.is_none());
    }

    #[test]
    fn empty_choices_is_an_api_error() {
        let parsed: ApiResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        let err = into_provider_response(parsed, "m".into()).unwrap_err();
        assert!(matches!(err, ProviderError::ApiError { status_code: 200, .. }));
    }
}
