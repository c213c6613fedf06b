use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::CompletionConfig;
use crate::error::{RelayError, Result};
use crate::types::{
    CompletionResult, CompletionSettings, FunctionCallRequest, FunctionDescriptor, Message,
};

/// One chat completion exchange. Implemented by the HTTP client and by test doubles.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        transcript: &[Message],
        settings: &CompletionSettings,
        functions: Option<&[FunctionDescriptor]>,
    ) -> Result<CompletionResult>;
}

/// Azure OpenAI chat completions client.
#[derive(Clone)]
pub struct LlmClient {
    endpoint: String,
    api_key: String,
    api_version: String,
    max_tokens: u32,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RelayError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
            max_tokens: config.max_tokens,
            http,
        })
    }

    fn url(&self, model: &str) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, model, self.api_version
        )
    }
}

#[async_trait]
impl CompletionClient for LlmClient {
    #[tracing::instrument(
        name = "llm.complete",
        skip(self, transcript, functions),
        fields(model = %settings.model, messages = transcript.len(), with_functions = functions.is_some())
    )]
    async fn complete(
        &self,
        transcript: &[Message],
        settings: &CompletionSettings,
        functions: Option<&[FunctionDescriptor]>,
    ) -> Result<CompletionResult> {
        if transcript.is_empty() {
            return Err(RelayError::Validation("transcript must not be empty".to_string()));
        }
        if settings.model.trim().is_empty() {
            return Err(RelayError::Validation("model must not be empty".to_string()));
        }

        let req = build_request_body(transcript, settings, functions, self.max_tokens);

        let resp = self
            .http
            .post(self.url(&settings.model))
            .header("api-key", &self.api_key)
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        let response_text = resp.text().await?;

        if !status.is_success() {
            warn!(target: "llm_client", %status, "Completion API returned an error status");
            return Err(RelayError::Transport(format!(
                "Completion API returned {}: {}",
                status,
                response_text.trim()
            )));
        }

        let response_json: Value = serde_json::from_str(&response_text)?;

        let result = parse_completion(&response_json)?;
        match &result {
            CompletionResult::TextReply { content } => {
                debug!(target: "llm_client", chars = content.len(), "Text reply")
            }
            CompletionResult::FunctionCallReply { call } => {
                debug!(target: "llm_client", function = %call.name, "Function call reply")
            }
        }
        Ok(result)
    }
}

/// Request payload for the chat completions endpoint. `tool_choice` is only sent
/// alongside a non-empty function catalog.
pub fn build_request_body(
    transcript: &[Message],
    settings: &CompletionSettings,
    functions: Option<&[FunctionDescriptor]>,
    max_tokens: u32,
) -> Value {
    let mut req = json!({
        "messages": transcript,
        "model": settings.model,
        "temperature": settings.temperature.as_f64(),
        "max_tokens": max_tokens,
    });
    if let Some(functions) = functions.filter(|f| !f.is_empty()) {
        let tools: Vec<Value> = functions.iter().map(|f| f.to_tool_schema()).collect();
        req["tools"] = Value::Array(tools);
        req["tool_choice"] = json!("auto");
    }
    req
}

/// Interprets a chat completions response body.
///
/// The first choice's message is a function call if it carries a non-empty
/// `tool_calls` array (first entry wins) or a legacy `function_call` object;
/// otherwise it must carry string `content`.
pub fn parse_completion(body: &Value) -> Result<CompletionResult> {
    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        return Err(RelayError::Protocol(format!("API error: {}", error)));
    }

    let message = body["choices"]
        .as_array()
        .and_then(|choices| choices.first())
        .map(|choice| &choice["message"])
        .filter(|m| m.is_object())
        .ok_or_else(|| RelayError::Protocol("No choices in response".to_string()))?;

    if let Some(tc) = message["tool_calls"].as_array().and_then(|calls| calls.first()) {
        let id = tc["id"]
            .as_str()
            .map(String::from)
            .unwrap_or_else(generated_call_id);
        let call = function_call_from(&tc["function"], id)?;
        return Ok(CompletionResult::FunctionCallReply { call });
    }

    if message["function_call"].is_object() {
        let call = function_call_from(&message["function_call"], generated_call_id())?;
        return Ok(CompletionResult::FunctionCallReply { call });
    }

    match message["content"].as_str() {
        Some(content) => Ok(CompletionResult::TextReply {
            content: content.to_string(),
        }),
        None => Err(RelayError::Protocol(
            "Response contained neither content nor a function call".to_string(),
        )),
    }
}

fn function_call_from(function: &Value, id: String) -> Result<FunctionCallRequest> {
    let name = function["name"]
        .as_str()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| RelayError::Protocol("Function call without a name".to_string()))?;
    let arguments = match &function["arguments"] {
        Value::String(raw) => raw.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    Ok(FunctionCallRequest::new(id, name, arguments))
}

fn generated_call_id() -> String {
    format!("call_{}", Uuid::new_v4().simple())
}
