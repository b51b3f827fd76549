//! LLM Provider implementations for uavchat.
//!
//! All providers implement the `uavchat_core::Provider` trait.
//! The router selects the correct provider based on configuration, and
//! [`ProviderGenerator`] exposes it to the pipeline as a `Generator`.

pub mod generator;
pub mod openai_compat;
pub mod router;

pub use generator::ProviderGenerator;
pub use openai_compat::OpenAiCompatProvider;
pub use router::ProviderRouter;
