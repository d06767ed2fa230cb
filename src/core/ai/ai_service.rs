use super::models::{AiConfig, AiMessage};
use crate::core::memo::Summarizer;
use async_trait::async_trait;
use std::error::Error;

#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Sends a chat completion request and returns the first choice's text.
    async fn chat_complete(
        &self,
        messages: &[AiMessage],
        config: &AiConfig,
    ) -> Result<String, Box<dyn Error + Send + Sync>>;
}

// Blanket implementation for Box<dyn AiProvider>
// so the provider can be picked at runtime.
#[async_trait]
impl AiProvider for Box<dyn AiProvider> {
    async fn chat_complete(
        &self,
        messages: &[AiMessage],
        config: &AiConfig,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        (**self).chat_complete(messages, config).await
    }
}

pub struct AiService<P: AiProvider> {
    provider: P,
    system_prompt: String,
    config: AiConfig,
}

impl<P: AiProvider> AiService<P> {
    pub fn new(provider: P, system_prompt: String, config: AiConfig) -> Self {
        Self {
            provider,
            system_prompt,
            config,
        }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    /// System prompt followed by the memo as the single user turn.
    fn build_messages(&self, text: &str) -> Vec<AiMessage> {
        vec![
            AiMessage::system(self.system_prompt.clone()),
            AiMessage::user(text),
        ]
    }
}

#[async_trait]
impl<P: AiProvider> Summarizer for AiService<P> {
    async fn summarize(&self, text: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
        let messages = self.build_messages(text);
        tracing::debug!(
            model = %self.config.model,
            chars = text.chars().count(),
            "Requesting summary"
        );

        // Returned verbatim; the user edits it on the review screen.
        self.provider.chat_complete(&messages, &self.config).await
    }
}
