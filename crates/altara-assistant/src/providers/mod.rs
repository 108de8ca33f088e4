//! Assistant service implementations

pub mod openai;

pub use openai::{OpenAIAssistantsClient, OpenAIConfig};
