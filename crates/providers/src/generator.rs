//! Adapts a chat [`Provider`] into the single-prompt [`Generator`] the
//! conversation pipeline consumes.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use uavchat_core::error::ProviderError;
use uavchat_core::message::Turn;
use uavchat_core::provider::{Generator, Provider, ProviderRequest};

/// Sends each prompt as a one-turn user conversation and returns the text.
pub struct ProviderGenerator {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl ProviderGenerator {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
        }
    }

    /// Set the max tokens per response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Build a generator for the configured default provider and model.
    ///
    /// A per-provider `default_model` wins over the global one.
    pub fn from_config(config: &uavchat_config::AppConfig) -> Result<Self, ProviderError> {
        let router = crate::router::build_from_config(config);
        let provider = router.default().ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "no provider registered as '{}'",
                config.default_provider
            ))
        })?;

        Ok(Self::new(provider, config.effective_model(), config.default_temperature)
            .with_max_tokens(config.default_max_tokens))
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Generator for ProviderGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: vec![Turn::user(prompt)],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self.provider.complete(request).await?;
        if let Some(usage) = &response.usage {
            debug!(
                provider = self.provider.name(),
                model = %response.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Generation complete"
            );
        }
        Ok(response.message.content)
    }
}
