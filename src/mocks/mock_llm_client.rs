use crate::error::{RelayError, Result};
use crate::llm_client::CompletionClient;
use crate::types::{
    CompletionResult, CompletionSettings, FunctionCallRequest, FunctionDescriptor, Message,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// What the client was asked on one call.
#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub transcript: Vec<Message>,
    pub settings: CompletionSettings,
    pub function_names: Option<Vec<&'static str>>,
}

/// Scripted completion client. Clones share the same script and history.
#[derive(Clone, Default)]
pub struct MockCompletionClient {
    responses: Arc<Mutex<VecDeque<Result<CompletionResult>>>>,
    call_history: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockCompletionClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_text_response(&self, content: &str) {
        self.push(Ok(CompletionResult::TextReply {
            content: content.to_string(),
        }));
    }

    pub fn add_function_call_response(&self, name: &str, args: &str) {
        self.push(Ok(CompletionResult::FunctionCallReply {
            call: FunctionCallRequest::new("call_123", name, args),
        }));
    }

    pub fn add_error_response(&self, error: RelayError) {
        self.push(Err(error));
    }

    pub fn get_call_history(&self) -> Vec<RecordedCall> {
        self.call_history.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.call_history.lock().unwrap().len()
    }

    fn push(&self, response: Result<CompletionResult>) {
        self.responses.lock().unwrap().push_back(response);
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(
        &self,
        transcript: &[Message],
        settings: &CompletionSettings,
        functions: Option<&[FunctionDescriptor]>,
    ) -> Result<CompletionResult> {
        self.call_history.lock().unwrap().push(RecordedCall {
            transcript: transcript.to_vec(),
            settings: settings.clone(),
            function_names: functions.map(|f| f.iter().map(|d| d.name).collect()),
        });

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(RelayError::Protocol(
                    "No more mock responses configured".to_string(),
                ))
            })
    }
}
