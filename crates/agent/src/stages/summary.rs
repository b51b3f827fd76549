//! Rolling conversation summary.
//!
//! The summary is refreshed every `interval` turns from the last `window`
//! turns of the full history. Refresh failures never reach the caller: the
//! previous summary is kept and a warning is logged.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uavchat_core::provider::Generator;

use crate::context::History;
use crate::context::prompt;

/// What a refresh attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    /// Not due on this turn count.
    Skipped,
    Updated(String),
    /// Due, but the generator failed or returned nothing usable.
    Retained,
}

pub struct SummaryMaintainer {
    generator: Arc<dyn Generator>,
    interval: usize,
    window: usize,
    max_chars: usize,
}

impl SummaryMaintainer {
    pub fn new(
        generator: Arc<dyn Generator>,
        interval: usize,
        window: usize,
        max_chars: usize,
    ) -> Self {
        Self {
            generator,
            interval: interval.max(1),
            window,
            max_chars,
        }
    }

    /// True when the total turn count (system turn included) is a multiple
    /// of the interval.
    pub fn is_due(&self, turn_count: usize) -> bool {
        turn_count > 0 && turn_count % self.interval == 0
    }

    /// Refresh the summary if due. Never fails.
    pub async fn maybe_update(&self, history: &History, current: &str) -> SummaryOutcome {
        if !self.is_due(history.len()) {
            debug!(turns = history.len(), "Summary not due");
            return SummaryOutcome::Skipped;
        }

        let prompt = prompt::summary_prompt(
            current,
            &history.render_recent(self.window),
            (self.max_chars / 6).max(20),
        );

        match self.generator.generate(&prompt).await {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    warn!("Summary refresh returned empty text, keeping previous summary");
                    return SummaryOutcome::Retained;
                }
                let summary = truncate_chars(text, self.max_chars);
                info!(chars = summary.chars().count(), "Summary refreshed");
                SummaryOutcome::Updated(summary)
            }
            Err(e) => {
                warn!(error = %e, "Summary refresh failed, keeping previous summary");
                SummaryOutcome::Retained
            }
        }
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
