//! The three generator-backed stages of a turn.
//!
//! | Stage | Input | Output |
//! |-------|-------|--------|
//! | [`router`] | question, prior window, previous selection | section subset |
//! | [`answer`] | question, prior window, summary, data slice | answer text |
//! | [`summary`] | current summary, recent window | refreshed summary |

pub mod answer;
pub mod router;
pub mod summary;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use answer::AnswerGenerator;
pub use router::{ParseOutcome, RouteDecision, RouteSource, SectionRouter};
pub use summary::{SummaryMaintainer, SummaryOutcome};
