//! Append-only conversation history with bounded prompt windows.
//!
//! A history always starts with exactly one system turn. Only user and
//! assistant turns can be appended afterwards, and nothing is ever removed.

use serde::Serialize;
use uavchat_core::message::{Role, Turn};

/// Rendered in place of an empty window.
pub const EMPTY_WINDOW: &str = "(no previous turns)";

#[derive(Debug, Clone, Serialize)]
pub struct History {
    turns: Vec<Turn>,
}

impl History {
    /// Start a history with its system turn.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::system(system_prompt)],
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) -> &Turn {
        self.append(Turn::user(content))
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) -> &Turn {
        self.append(Turn::assistant(content))
    }

    fn append(&mut self, turn: Turn) -> &Turn {
        self.turns.push(turn);
        &self.turns[self.turns.len() - 1]
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Total turn count, system turn included.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Never true: the system turn is always present.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The most recent assistant turn, found by scanning backwards.
    pub fn last_assistant(&self) -> Option<&Turn> {
        self.turns.iter().rev().find(|t| t.role == Role::Assistant)
    }

    /// Up to `limit` non-system turns preceding the pending question.
    ///
    /// When the newest turn is a user turn it is the question being
    /// answered and is left out; the prompt carries it separately.
    pub fn prior_turns(&self, limit: usize) -> Vec<&Turn> {
        let end = match self.turns.last() {
            Some(last) if last.role == Role::User => self.turns.len() - 1,
            _ => self.turns.len(),
        };
        let eligible: Vec<&Turn> = self.turns[..end]
            .iter()
            .filter(|t| t.role != Role::System)
            .collect();
        let skip = eligible.len().saturating_sub(limit);
        eligible.into_iter().skip(skip).collect()
    }

    /// The last `limit` turns of any role, system included.
    pub fn recent_turns(&self, limit: usize) -> Vec<&Turn> {
        let skip = self.turns.len().saturating_sub(limit);
        self.turns.iter().skip(skip).collect()
    }

    /// [`prior_turns`](Self::prior_turns) rendered as `Role: text` lines, oldest first.
    pub fn render_prior(&self, limit: usize) -> String {
        render(&self.prior_turns(limit))
    }

    /// [`recent_turns`](Self::recent_turns) rendered as `Role: text` lines, oldest first.
    pub fn render_recent(&self, limit: usize) -> String {
        render(&self.recent_turns(limit))
    }
}

fn render(turns: &[&Turn]) -> String {
    if turns.is_empty() {
        return EMPTY_WINDOW.to_string();
    }
    turns
        .iter()
        .map(|t| t.render())
        .collect::<Vec<_>>()
        .join("\n")
}
