//! The conversation pipeline for uavchat.
//!
//! Every user turn runs three stages against the generation service:
//!
//! 1. **Route**: pick the telemetry sections the question needs
//! 2. **Answer**: answer from the recent window, the running summary and
//!    the selected slice of the flight log
//! 3. **Summarize**: fold recent turns into the running summary when due
//!
//! Routing never fails on a bad reply (see [`stages::router`]); summary
//! refresh never fails at all. Only generator errors while routing or
//! answering reach the caller.

pub mod context;
pub mod session;
pub mod stages;

pub use context::History;
pub use session::{
    ConversationState, NO_PREVIOUS_CONVERSATION, Session, SessionOptions, TurnStage,
};
pub use stages::{
    AnswerGenerator, ParseOutcome, RouteDecision, RouteSource, SectionRouter, SummaryMaintainer,
    SummaryOutcome,
};
