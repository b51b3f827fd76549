//! Answer generation over a telemetry slice.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::info;
use uavchat_core::provider::Generator;

use crate::context::History;
use crate::context::prompt;
use crate::context::token::estimate_tokens;

/// Answers a question from the recent window, the running summary and the
/// selected slice of the flight log.
pub struct AnswerGenerator {
    generator: Arc<dyn Generator>,
    history_window: usize,
}

impl AnswerGenerator {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            generator,
            history_window: 5,
        }
    }

    pub fn with_history_window(mut self, turns: usize) -> Self {
        self.history_window = turns;
        self
    }

    pub fn build_prompt(
        &self,
        question: &str,
        history: &History,
        summary: &str,
        slice: &Map<String, Value>,
    ) -> uavchat_core::Result<String> {
        let data = serde_json::to_string_pretty(slice)?;
        let names = slice.keys().map(String::as_str).collect::<Vec<_>>().join(", ");
        Ok(prompt::answer_prompt(
            question,
            &history.render_prior(self.history_window),
            summary,
            &names,
            &data,
        ))
    }

    /// Produce the answer text. The reply is returned verbatim, without
    /// post-validation against the data.
    pub async fn answer(
        &self,
        question: &str,
        history: &History,
        summary: &str,
        slice: &Map<String, Value>,
    ) -> uavchat_core::Result<String> {
        let prompt = self.build_prompt(question, history, summary, slice)?;
        info!(
            sections = slice.len(),
            prompt_tokens = estimate_tokens(&prompt),
            "Answering"
        );
        let answer = self.generator.generate(&prompt).await?;
        Ok(answer)
    }
}
