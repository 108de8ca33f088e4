//! Assistant backend trait definition

use crate::{Result, RunSnapshot, ThreadMessage};
use async_trait::async_trait;

/// Remote asynchronous job API.
///
/// Implementations wrap a hosted assistant service. The runner only relies
/// on these operations, so tests can script a backend without a network.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    /// Create a conversation thread and return its id
    async fn create_thread(&self) -> Result<String>;

    /// Append a user message to a thread
    async fn add_message(&self, thread_id: &str, content: &str) -> Result<()>;

    /// Start a run of `assistant_id` over the thread
    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<RunSnapshot>;

    /// Fetch the current state of a run
    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<RunSnapshot>;

    /// Ask the service to stop a run
    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<()>;

    /// List the thread's messages, most recent first
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>>;

    /// Delete a thread and its messages
    async fn delete_thread(&self, thread_id: &str) -> Result<()>;
}
