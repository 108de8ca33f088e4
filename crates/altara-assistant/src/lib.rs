//! Hosted assistant job client for Altara
//!
//! A report is produced by an asynchronous assistant job: a conversation
//! thread is created, the prompt is posted to it, a run is started against a
//! configured assistant, and the run is polled until it reaches a terminal
//! state. This crate provides:
//!
//! - [`AssistantBackend`], the seam over the remote job API
//! - [`JobRunner`], the bounded, cancellable polling loop
//! - [`JobOutcome`], a discriminated result so callers never have to
//!   string-match a failure message
//! - an OpenAI Assistants implementation (behind the `openai` feature)

pub mod backend;
pub mod cancel;
pub mod error;
pub mod job;
pub mod runner;

// Re-export main types
pub use backend::AssistantBackend;
pub use cancel::CancelToken;
pub use error::{AssistantError, Result};
pub use job::{JobOutcome, MessageRole, RunSnapshot, RunStatus, ThreadMessage};
pub use runner::{JobRunner, PollPolicy};

// Provider implementations (feature-gated)
#[cfg(feature = "openai")]
pub mod providers;
