use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::Message;

/// Conversation kept by the interactive CLI between prompts.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub model: String,
    pub temperature: f64,
}

impl Session {
    pub fn new(model: &str, temperature: f64) -> Session {
        Session {
            id: Uuid::new_v4().to_string(),
            messages: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            model: model.to_string(),
            temperature,
        }
    }

    // Append one completed exchange
    pub fn record_exchange(&mut self, prompt: &str, reply: &str) {
        self.messages.push(Message::user(prompt));
        self.messages.push(Message::assistant(reply));
        self.updated_at = Utc::now();
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.updated_at = Utc::now();
    }

    pub fn set_model(&mut self, model: &str) {
        self.model = model.to_string();
        self.updated_at = Utc::now();
    }
}
