//! Job state and outcome types

use serde::{Deserialize, Serialize};

/// Lifecycle state of a submitted assistant run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Accepted by the service, not yet picked up
    Submitted,
    /// Being processed
    Running,
    /// Finished; the reply is available in the thread
    Completed,
    /// Ended with an error on the service side
    Failed,
    /// Cancelled before completion
    Cancelled,
    /// Abandoned by the service (provider-side timeout)
    Expired,
}

impl RunStatus {
    /// Map a provider status string onto the lifecycle.
    ///
    /// Unknown values count as running; the poll budget bounds the wait.
    pub fn from_api(status: &str) -> Self {
        match status {
            "queued" => Self::Submitted,
            "in_progress" | "cancelling" | "requires_action" => Self::Running,
            "completed" => Self::Completed,
            "failed" | "incomplete" => Self::Failed,
            "cancelled" => Self::Cancelled,
            "expired" => Self::Expired,
            _ => Self::Running,
        }
    }

    /// Whether polling should stop at this state
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Expired
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Submitted => "submitted",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// Point-in-time view of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub id: String,
    pub thread_id: String,
    pub status: RunStatus,
    /// Service-provided error description, set for failed runs
    pub last_error: Option<String>,
}

/// Author of a thread message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A message in a conversation thread, text parts already joined
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    pub role: MessageRole,
    /// Unix timestamp (seconds)
    pub created_at: i64,
    pub text: String,
}

/// Extract the reply from a most-recent-first message list
pub fn latest_reply(messages: &[ThreadMessage]) -> Option<&str> {
    messages
        .iter()
        .find(|m| m.role == MessageRole::Assistant && !m.text.trim().is_empty())
        .map(|m| m.text.as_str())
}

/// How an assistant job ended.
///
/// Only `Completed` carries report text. Every other variant is a distinct,
/// inspectable failure state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    /// The run completed and produced a reply
    Completed { text: String },
    /// The run failed, or completed without a usable reply
    Failed { reason: String },
    /// The run was cancelled by the service
    Cancelled,
    /// The service expired the run
    Expired,
    /// The local poll budget ran out before a terminal state
    TimedOut { attempts: u32, elapsed_ms: u64 },
    /// The caller cancelled the wait
    Aborted,
}

impl JobOutcome {
    /// Report text, if the job completed
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Completed { text } => Some(text),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Short description of a non-completed outcome
    pub fn describe(&self) -> String {
        match self {
            Self::Completed { .. } => "completed".to_string(),
            Self::Failed { reason } => format!("assistant run failed: {reason}"),
            Self::Cancelled => "assistant run was cancelled by the service".to_string(),
            Self::Expired => "assistant run expired before completing".to_string(),
            Self::TimedOut {
                attempts,
                elapsed_ms,
            } => format!("gave up waiting after {attempts} polls ({elapsed_ms} ms)"),
            Self::Aborted => "analysis aborted".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: &str, role: MessageRole, text: &str) -> ThreadMessage {
        ThreadMessage {
            id: id.to_string(),
            role,
            created_at: 0,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(RunStatus::from_api("queued"), RunStatus::Submitted);
        assert_eq!(RunStatus::from_api("in_progress"), RunStatus::Running);
        assert_eq!(RunStatus::from_api("requires_action"), RunStatus::Running);
        assert_eq!(RunStatus::from_api("completed"), RunStatus::Completed);
        assert_eq!(RunStatus::from_api("incomplete"), RunStatus::Failed);
        assert_eq!(RunStatus::from_api("expired"), RunStatus::Expired);
        assert_eq!(RunStatus::from_api("something_new"), RunStatus::Running);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!RunStatus::Submitted.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
        assert!(RunStatus::Expired.is_terminal());
    }

    #[test]
    fn test_latest_reply_skips_user_and_empty_messages() {
        let messages = vec![
            msg("m3", MessageRole::Assistant, "   "),
            msg("m2", MessageRole::Assistant, "newest answer"),
            msg("m1", MessageRole::User, "prompt"),
            msg("m0", MessageRole::Assistant, "older answer"),
        ];
        assert_eq!(latest_reply(&messages), Some("newest answer"));
        assert_eq!(latest_reply(&messages[2..3]), None);
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let json = serde_json::to_value(JobOutcome::Failed {
            reason: "boom".to_string(),
        })
        .unwrap();
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["reason"], "boom");

        let json = serde_json::to_value(JobOutcome::Aborted).unwrap();
        assert_eq!(json["outcome"], "aborted");
    }

    #[test]
    fn test_outcome_text_only_when_completed() {
        let done = JobOutcome::Completed {
            text: "report".to_string(),
        };
        assert_eq!(done.text(), Some("report"));
        assert!(JobOutcome::Expired.text().is_none());
        assert!(JobOutcome::Expired.describe().contains("expired"));
    }
}
