//! The per-document conversation session.
//!
//! A [`Session`] owns one telemetry document and one [`ConversationState`].
//! Each call to [`Session::ask`] runs the fixed pipeline
//! `Routing → Answering → Summarizing → Done` to completion.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, info_span, Instrument};
use uavchat_config::SessionConfig;
use uavchat_core::flight::{SectionSet, TelemetryDocument, join_sections};
use uavchat_core::message::ConversationId;
use uavchat_core::provider::Generator;

use crate::context::History;
use crate::stages::{AnswerGenerator, SectionRouter, SummaryMaintainer, SummaryOutcome};

/// Summary text before the first refresh.
pub const NO_PREVIOUS_CONVERSATION: &str = "No previous conversation.";

/// Mutable state of a single conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationState {
    pub id: ConversationId,
    pub history: History,
    pub selected_sections: SectionSet,
    pub summary: String,
}

impl ConversationState {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            id: ConversationId::new(),
            history: History::new(system_prompt),
            selected_sections: SectionSet::new(),
            summary: NO_PREVIOUS_CONVERSATION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStage {
    Routing,
    Answering,
    Summarizing,
    Done,
}

impl fmt::Display for TurnStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TurnStage::Routing => "routing",
            TurnStage::Answering => "answering",
            TurnStage::Summarizing => "summarizing",
            TurnStage::Done => "done",
        })
    }
}

/// Tunables for a session. Mirrors the `[session]` config table.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub system_prompt: String,
    pub history_window: usize,
    pub summary_interval: usize,
    pub summary_window: usize,
    pub summary_max_chars: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for SessionOptions {
    fn from(config: &SessionConfig) -> Self {
        Self {
            system_prompt: config.system_prompt.clone(),
            history_window: config.history_window,
            summary_interval: config.summary_interval,
            summary_window: config.summary_window,
            summary_max_chars: config.summary_max_chars,
        }
    }
}

pub struct Session {
    document: TelemetryDocument,
    state: ConversationState,
    router: SectionRouter,
    answerer: AnswerGenerator,
    summarizer: SummaryMaintainer,
}

impl Session {
    /// Start a fresh conversation over `document`.
    pub fn new(
        document: TelemetryDocument,
        generator: Arc<dyn Generator>,
        options: &SessionOptions,
    ) -> Self {
        let state = ConversationState::new(options.system_prompt.clone());
        info!(
            session_id = %state.id,
            keys = document.len(),
            present = %join_sections(&document.present_sections()),
            "Session created"
        );
        Self {
            document,
            state,
            router: SectionRouter::new(generator.clone())
                .with_history_window(options.history_window),
            answerer: AnswerGenerator::new(generator.clone())
                .with_history_window(options.history_window),
            summarizer: SummaryMaintainer::new(
                generator,
                options.summary_interval,
                options.summary_window,
                options.summary_max_chars,
            ),
        }
    }

    /// Run one user turn and return the answer.
    ///
    /// The user turn is recorded before any generator call. If routing or
    /// answering fails the error is returned and no assistant turn is added.
    pub async fn ask(&mut self, question: &str) -> uavchat_core::Result<String> {
        let span = info_span!("turn", session_id = %self.state.id, turn = self.state.history.len());
        self.run_turn(question).instrument(span).await
    }

    async fn run_turn(&mut self, question: &str) -> uavchat_core::Result<String> {
        self.state.history.push_user(question);

        info!(stage = %TurnStage::Routing, "Turn stage");
        let decision = self
            .router
            .route(question, &self.state.history, &self.state.selected_sections)
            .await?;
        self.state.selected_sections = decision.sections;

        info!(stage = %TurnStage::Answering, "Turn stage");
        let slice = self.document.slice(&self.state.selected_sections);
        let answer = self
            .answerer
            .answer(question, &self.state.history, &self.state.summary, &slice)
            .await?;
        self.state.history.push_assistant(answer);

        info!(stage = %TurnStage::Summarizing, "Turn stage");
        if let SummaryOutcome::Updated(summary) = self
            .summarizer
            .maybe_update(&self.state.history, &self.state.summary)
            .await
        {
            self.state.summary = summary;
        }

        info!(
            stage = %TurnStage::Done,
            turns = self.state.history.len(),
            "Turn stage"
        );
        Ok(self
            .state
            .history
            .last_assistant()
            .map(|turn| turn.content.clone())
            .unwrap_or_default())
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn document(&self) -> &TelemetryDocument {
        &self.document
    }

    pub fn id(&self) -> &ConversationId {
        &self.state.id
    }
}
