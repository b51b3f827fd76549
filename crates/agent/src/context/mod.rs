//! Context assembly building blocks.
//!
//! | Piece | Used by | Window |
//! |-------|---------|--------|
//! | Prior turns | router, answerer | last N non-system turns before the question |
//! | Recent turns | summarizer | last N turns, system included |
//! | Running summary | answerer, summarizer | whole conversation, size-capped |
//! | Data slice | answerer | router-selected sections only |

pub mod history;
pub mod prompt;
pub mod token;

pub use history::History;
