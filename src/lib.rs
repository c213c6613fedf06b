//! Weather-aware chat relay.
//!
//! Forwards prompts to an Azure OpenAI chat deployment, lets the model request a
//! weather forecast from Open-Meteo, and returns the model's markdown reply.

pub mod config;
pub mod error;
pub mod llm_client;
pub mod relay;
pub mod session;
pub mod tool_registry;
pub mod tools;
pub mod types;
pub mod utils;

#[cfg(test)]
mod mocks;

use std::sync::Arc;

pub use config::RelayConfig;
pub use error::{DispatchError, RelayError, Result};
pub use llm_client::{CompletionClient, LlmClient};
pub use relay::{ChatRelay, ChatRequest, RelayOptions, RelayReply};
pub use tool_registry::ToolRegistry;

/// Wires the HTTP-backed completion and forecast clients into a relay.
pub fn build_relay(config: &RelayConfig) -> Result<ChatRelay> {
    let llm = LlmClient::new(&config.completion)?;
    let forecast = tools::OpenMeteoClient::new(
        config.forecast.endpoint.clone(),
        config.forecast.request_timeout,
    )
    .map_err(|e| RelayError::Config(e.to_string()))?;
    Ok(ChatRelay::new(
        Arc::new(llm),
        ToolRegistry::new(Arc::new(forecast)),
        config.relay_options(),
    ))
}
