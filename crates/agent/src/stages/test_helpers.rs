//! Shared test helpers for stage and session tests.

use std::sync::Mutex;
use uavchat_core::error::ProviderError;
use uavchat_core::provider::Generator;

/// A generator that returns a sequence of scripted replies and records
/// every prompt it receives.
///
/// Panics if more calls are made than replies provided.
pub struct ScriptedGenerator {
    replies: Mutex<Vec<Result<String, ProviderError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every call succeeds with the given texts, in order.
    pub fn texts(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let mut prompts = self.prompts.lock().unwrap();
        let replies = self.replies.lock().unwrap();
        let call = prompts.len();
        if call >= replies.len() {
            panic!(
                "ScriptedGenerator: no more replies (call #{}, have {})",
                call,
                replies.len()
            );
        }
        prompts.push(prompt.to_string());
        replies[call].clone()
    }
}

pub fn network_error() -> ProviderError {
    ProviderError::Network("connection reset by peer".into())
}
