//! Chat orchestration: validates an inbound request, runs the completion, and
//! performs at most one function round trip before returning the model's reply.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{RelayError, Result};
use crate::llm_client::CompletionClient;
use crate::tool_registry::ToolRegistry;
use crate::types::{CompletionResult, CompletionSettings, FunctionCallRequest, Message, Role};
use crate::utils::clip;

pub const LOCATION_CLARIFICATION: &str =
    "I can't find the complete location information. Please provide a valid city name.";

/// Inbound request as received from the outer layer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    /// Prior conversation, oldest first.
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub prompt: Option<String>,
    pub model: String,
    pub temperature: f64,
}

impl ChatRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>, temperature: f64) -> Self {
        Self {
            messages: Vec::new(),
            prompt: Some(prompt.into()),
            model: model.into(),
            temperature,
        }
    }

    pub fn with_history(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }
}

#[derive(Clone, Debug)]
pub struct RelayOptions {
    pub system_prompt: Option<String>,
    /// Empty means any non-empty model name is accepted.
    pub allowed_models: Vec<String>,
}

/// How a function-enabled request was answered.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayReply {
    /// The model answered without calling a function.
    Direct(String),
    /// The model called a function without enough arguments to run it.
    Clarification(String),
    /// The model's answer after one function result was injected.
    Augmented { function: String, content: String },
}

impl RelayReply {
    pub fn content(&self) -> &str {
        match self {
            RelayReply::Direct(c) | RelayReply::Clarification(c) => c,
            RelayReply::Augmented { content, .. } => content,
        }
    }

    pub fn into_content(self) -> String {
        match self {
            RelayReply::Direct(c) | RelayReply::Clarification(c) => c,
            RelayReply::Augmented { content, .. } => content,
        }
    }
}

pub struct ChatRelay {
    llm: Arc<dyn CompletionClient>,
    tools: ToolRegistry,
    opts: RelayOptions,
}

impl ChatRelay {
    pub fn new(llm: Arc<dyn CompletionClient>, tools: ToolRegistry, opts: RelayOptions) -> Self {
        Self { llm, tools, opts }
    }

    /// Checks the request and builds the opening transcript. No I/O happens here.
    pub fn prepare(&self, request: &ChatRequest) -> Result<(Vec<Message>, CompletionSettings)> {
        let prompt = request
            .prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());
        if prompt.is_none() && request.messages.is_empty() {
            return Err(RelayError::Validation("Missing required parameters".to_string()));
        }

        let settings = CompletionSettings::new(request.model.trim(), request.temperature)?;
        if !self.opts.allowed_models.is_empty()
            && !self.opts.allowed_models.iter().any(|m| *m == settings.model)
        {
            return Err(RelayError::Validation(format!(
                "model must be one of: {}",
                self.opts.allowed_models.join(", ")
            )));
        }

        let mut transcript = Vec::with_capacity(request.messages.len() + 2);
        if let Some(system) = &self.opts.system_prompt {
            let has_system = request
                .messages
                .first()
                .is_some_and(|m| m.role == Role::System);
            if !has_system {
                transcript.push(Message::system(system.clone()));
            }
        }
        transcript.extend(request.messages.iter().cloned());
        if let Some(prompt) = prompt {
            transcript.push(Message::user(prompt));
        }
        Ok((transcript, settings))
    }

    /// Single completion with no functions offered.
    #[tracing::instrument(name = "relay.chat", skip(self, request), fields(model = %request.model))]
    pub async fn chat(&self, request: &ChatRequest) -> Result<String> {
        let (transcript, settings) = self.prepare(request)?;
        match self.llm.complete(&transcript, &settings, None).await? {
            CompletionResult::TextReply { content } => Ok(content),
            CompletionResult::FunctionCallReply { call } => Err(RelayError::Protocol(format!(
                "model requested function '{}' although none were offered",
                call.name
            ))),
        }
    }

    /// Function-enabled chat; returns the reply text only.
    pub async fn respond(&self, request: &ChatRequest) -> Result<String> {
        self.respond_detailed(request).await.map(RelayReply::into_content)
    }

    #[tracing::instrument(name = "relay.respond", skip(self, request), fields(model = %request.model))]
    pub async fn respond_detailed(&self, request: &ChatRequest) -> Result<RelayReply> {
        let (transcript, settings) = self.prepare(request)?;
        self.run_with_functions(transcript, &settings).await
    }

    async fn run_with_functions(
        &self,
        transcript: Vec<Message>,
        settings: &CompletionSettings,
    ) -> Result<RelayReply> {
        debug!(target: "relay", messages = transcript.len(), "Awaiting first completion");
        let first = self
            .llm
            .complete(&transcript, settings, Some(self.tools.catalog()))
            .await?;

        let call = match first {
            CompletionResult::TextReply { content } => {
                debug!(target: "relay", reply = %clip(&content, 120), "Direct answer");
                return Ok(RelayReply::Direct(content));
            }
            CompletionResult::FunctionCallReply { call } => call,
        };

        info!(target: "relay", function = %call.name, "Model requested a function call");

        if !self.tools.has_required_arguments(&call) {
            info!(target: "relay", function = %call.name, "Incomplete arguments, asking for clarification");
            return Ok(RelayReply::Clarification(LOCATION_CLARIFICATION.to_string()));
        }

        let output = self.tools.dispatch(&call).await;
        let transcript = append_tool_result(&transcript, &call, &output);

        debug!(target: "relay", messages = transcript.len(), "Awaiting second completion");
        match self.llm.complete(&transcript, settings, None).await? {
            CompletionResult::TextReply { content } => Ok(RelayReply::Augmented {
                function: call.name,
                content,
            }),
            CompletionResult::FunctionCallReply { call: again } => Err(RelayError::Protocol(
                format!(
                    "model requested '{}' after a function result was already provided",
                    again.name
                ),
            )),
        }
    }
}

/// Returns a new transcript with `result` recorded as the answer to `call`.
///
/// The assistant turn that issued the call is appended first unless the
/// transcript already ends with it.
pub fn append_tool_result(
    transcript: &[Message],
    call: &FunctionCallRequest,
    result: &str,
) -> Vec<Message> {
    let mut next = Vec::with_capacity(transcript.len() + 2);
    next.extend_from_slice(transcript);
    if !next.last().is_some_and(|m| m.requests_call(&call.id)) {
        next.push(Message::assistant_function_call(call));
    }
    next.push(Message::tool_result(call.id.clone(), result));
    next
}
