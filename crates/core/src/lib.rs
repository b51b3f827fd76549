//! # uavchat Core
//!
//! Domain types, traits, and error definitions for the uavchat flight-log
//! assistant. This crate has **zero framework dependencies**; it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The generation service is defined as a trait here. Implementations live in
//! `uavchat-providers`; the pipeline in `uavchat-agent` only sees the trait.
//! This enables:
//! - Swapping LLM backends via configuration
//! - Easy testing with scripted generators
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod flight;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, SessionError};
pub use flight::{SectionId, SectionSet, TelemetryDocument};
pub use message::{ConversationId, Role, Turn};
pub use provider::{Generator, Provider, ProviderRequest, ProviderResponse, Usage};
