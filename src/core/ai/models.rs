use serde::{Deserialize, Serialize};

/// Instruction sent ahead of every memo unless overridden in config.
pub const DEFAULT_SUMMARY_PROMPT: &str = "You are a sharp assistant to an office team. \
Read the memo (chat or email text) and write an action summary of at most three bullet lines. \
Drop greetings and background; keep only actions and key facts. \
Use terse report style and answer in the same language as the memo.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiMessage {
    pub role: String,
    pub content: String,
}

impl AiMessage {
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

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            model: "llama-3.1-8b-instant".to_string(),
            temperature: 0.5,
            max_tokens: None,
        }
    }
}
