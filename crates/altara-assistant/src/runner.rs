//! Bounded, cancellable polling of assistant jobs
//!
//! One call to [`JobRunner::run`] owns one job from submission to result:
//!
//! ```text
//! SUBMITTED -> RUNNING -> COMPLETED   (reply extracted)
//!                      -> FAILED | CANCELLED | EXPIRED
//!                      -> TIMED OUT   (local poll budget exhausted)
//!                      -> ABORTED     (caller cancelled)
//! ```
//!
//! Every service call is raced against the cancel token and the job
//! deadline. The conversation thread created for the job is deleted before
//! `run` returns, whatever the outcome.

use crate::job::latest_reply;
use crate::{AssistantBackend, CancelToken, JobOutcome, Result, RunSnapshot, RunStatus};
use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout, timeout_at};
use tracing::{debug, info, instrument, warn};

/// Upper bound on each cleanup call (remote cancel, thread deletion)
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll budget for a single job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between status checks
    pub interval: Duration,
    /// Maximum number of status checks after submission
    pub max_attempts: u32,
    /// Wall-clock limit for the whole job, service calls included
    pub deadline: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 120,
            deadline: Duration::from_secs(180),
        }
    }
}

impl PollPolicy {
    /// Create a policy
    pub fn new(interval: Duration, max_attempts: u32, deadline: Duration) -> Self {
        Self {
            interval,
            max_attempts,
            deadline,
        }
    }

    /// Fast polling (for testing)
    pub fn fast() -> Self {
        Self {
            interval: Duration::from_millis(1),
            max_attempts: 20,
            deadline: Duration::from_secs(5),
        }
    }
}

/// Clock and poll count of one job
#[derive(Debug, Clone, Copy)]
struct Budget {
    started: Instant,
    deadline: Instant,
    attempts: u32,
}

impl Budget {
    fn start(policy: &PollPolicy) -> Self {
        let started = Instant::now();
        Self {
            started,
            deadline: started + policy.deadline,
            attempts: 0,
        }
    }

    fn timed_out(&self) -> JobOutcome {
        JobOutcome::TimedOut {
            attempts: self.attempts,
            elapsed_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Submits prompts to an assistant and waits for the reply
pub struct JobRunner {
    backend: Arc<dyn AssistantBackend>,
    assistant_id: String,
    policy: PollPolicy,
}

impl JobRunner {
    /// Create a runner for the given assistant
    pub fn new(
        backend: Arc<dyn AssistantBackend>,
        assistant_id: impl Into<String>,
        policy: PollPolicy,
    ) -> Self {
        Self {
            backend,
            assistant_id: assistant_id.into(),
            policy,
        }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    pub fn assistant_id(&self) -> &str {
        &self.assistant_id
    }

    /// Run `prompt` as one assistant job.
    ///
    /// `Err` means the service could not be reached or answered with
    /// something unparseable. A job that ran and ended badly is `Ok` with a
    /// non-`Completed` outcome.
    #[instrument(skip(self, prompt, cancel), fields(assistant_id = %self.assistant_id, prompt_len = prompt.len()))]
    pub async fn run(&self, prompt: &str, cancel: &CancelToken) -> Result<JobOutcome> {
        if cancel.is_cancelled() {
            return Ok(JobOutcome::Aborted);
        }

        let mut budget = Budget::start(&self.policy);
        let thread_id = match guarded(cancel, &budget, self.backend.create_thread()).await? {
            ControlFlow::Continue(id) => id,
            ControlFlow::Break(outcome) => return Ok(outcome),
        };
        debug!(thread_id = %thread_id, "created conversation thread");

        let outcome = self.drive(&thread_id, prompt, cancel, &mut budget).await;

        match timeout(CLEANUP_TIMEOUT, self.backend.delete_thread(&thread_id)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(thread_id = %thread_id, "failed to delete conversation thread: {e}"),
            Err(_) => warn!(thread_id = %thread_id, "timed out deleting conversation thread"),
        }

        if let Ok(outcome) = &outcome {
            info!(outcome = %outcome_label(outcome), "assistant job finished");
        }
        outcome
    }

    async fn drive(
        &self,
        thread_id: &str,
        prompt: &str,
        cancel: &CancelToken,
        budget: &mut Budget,
    ) -> Result<JobOutcome> {
        if let ControlFlow::Break(outcome) =
            guarded(cancel, budget, self.backend.add_message(thread_id, prompt)).await?
        {
            return Ok(outcome);
        }

        let create = self.backend.create_run(thread_id, &self.assistant_id);
        let mut run = match guarded(cancel, budget, create).await? {
            ControlFlow::Continue(run) => run,
            ControlFlow::Break(outcome) => return Ok(outcome),
        };
        debug!(run_id = %run.id, status = %run.status, "submitted run");

        while !run.status.is_terminal() {
            let now = Instant::now();
            if budget.attempts >= self.policy.max_attempts || now >= budget.deadline {
                warn!(
                    run_id = %run.id,
                    attempts = budget.attempts,
                    "poll budget exhausted, giving up on run"
                );
                self.cancel_quietly(thread_id, &run.id).await;
                return Ok(budget.timed_out());
            }

            let wait = self.policy.interval.min(budget.deadline - now);
            tokio::select! {
                () = cancel.cancelled() => {
                    info!(run_id = %run.id, "analysis cancelled by caller");
                    self.cancel_quietly(thread_id, &run.id).await;
                    return Ok(JobOutcome::Aborted);
                }
                () = sleep(wait) => {}
            }

            budget.attempts += 1;
            let run_id = run.id.clone();
            run = match guarded(cancel, budget, self.backend.retrieve_run(thread_id, &run_id)).await? {
                ControlFlow::Continue(run) => run,
                ControlFlow::Break(outcome) => {
                    self.cancel_quietly(thread_id, &run_id).await;
                    return Ok(outcome);
                }
            };
            debug!(run_id = %run.id, status = %run.status, attempt = budget.attempts, "polled run");
        }

        self.finish(thread_id, run, cancel, budget).await
    }

    async fn finish(
        &self,
        thread_id: &str,
        run: RunSnapshot,
        cancel: &CancelToken,
        budget: &Budget,
    ) -> Result<JobOutcome> {
        Ok(match run.status {
            RunStatus::Completed => {
                let messages =
                    match guarded(cancel, budget, self.backend.list_messages(thread_id)).await? {
                        ControlFlow::Continue(messages) => messages,
                        ControlFlow::Break(outcome) => return Ok(outcome),
                    };
                match latest_reply(&messages) {
                    Some(text) => JobOutcome::Completed {
                        text: text.to_string(),
                    },
                    None => JobOutcome::Failed {
                        reason: "run completed without an assistant reply".to_string(),
                    },
                }
            }
            RunStatus::Failed => JobOutcome::Failed {
                reason: run
                    .last_error
                    .unwrap_or_else(|| "no error details provided".to_string()),
            },
            RunStatus::Cancelled => JobOutcome::Cancelled,
            RunStatus::Expired => JobOutcome::Expired,
            RunStatus::Submitted | RunStatus::Running => JobOutcome::Failed {
                reason: format!("run ended in non-terminal state {}", run.status),
            },
        })
    }

    async fn cancel_quietly(&self, thread_id: &str, run_id: &str) {
        match timeout(CLEANUP_TIMEOUT, self.backend.cancel_run(thread_id, run_id)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(run_id, "cancel request failed: {e}"),
            Err(_) => debug!(run_id, "cancel request timed out"),
        }
    }
}

/// Await one service call unless the caller cancels or the job deadline
/// passes first.
async fn guarded<T>(
    cancel: &CancelToken,
    budget: &Budget,
    call: impl Future<Output = Result<T>>,
) -> Result<ControlFlow<JobOutcome, T>> {
    tokio::select! {
        () = cancel.cancelled() => {
            info!("analysis cancelled by caller");
            Ok(ControlFlow::Break(JobOutcome::Aborted))
        }
        result = timeout_at(budget.deadline, call) => match result {
            Ok(value) => value.map(ControlFlow::Continue),
            Err(_) => {
                warn!(attempts = budget.attempts, "job deadline passed during a service call");
                Ok(ControlFlow::Break(budget.timed_out()))
            }
        },
    }
}

fn outcome_label(outcome: &JobOutcome) -> &'static str {
    match outcome {
        JobOutcome::Completed { .. } => "completed",
        JobOutcome::Failed { .. } => "failed",
        JobOutcome::Cancelled => "cancelled",
        JobOutcome::Expired => "expired",
        JobOutcome::TimedOut { .. } => "timed_out",
        JobOutcome::Aborted => "aborted",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockAssistantBackend;
    use crate::{AssistantError, MessageRole, ThreadMessage};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn snapshot(status: RunStatus) -> RunSnapshot {
        RunSnapshot {
            id: "run_1".to_string(),
            thread_id: "thread_1".to_string(),
            status,
            last_error: None,
        }
    }

    fn reply(text: &str) -> ThreadMessage {
        ThreadMessage {
            id: "msg_2".to_string(),
            role: MessageRole::Assistant,
            created_at: 2,
            text: text.to_string(),
        }
    }

    /// Mock with thread setup and cleanup expectations already in place
    fn base_mock() -> MockAssistantBackend {
        let mut mock = MockAssistantBackend::new();
        mock.expect_create_thread()
            .times(1)
            .returning(|| Ok("thread_1".to_string()));
        mock.expect_add_message()
            .withf(|thread, _| thread == "thread_1")
            .times(1)
            .returning(|_, _| Ok(()));
        mock.expect_create_run()
            .withf(|thread, assistant| thread == "thread_1" && assistant == "asst_1")
            .times(1)
            .returning(|_, _| Ok(snapshot(RunStatus::Submitted)));
        mock.expect_delete_thread()
            .withf(|thread| thread == "thread_1")
            .times(1)
            .returning(|_| Ok(()));
        mock
    }

    fn runner(mock: MockAssistantBackend, policy: PollPolicy) -> JobRunner {
        JobRunner::new(Arc::new(mock), "asst_1", policy)
    }

    #[test]
    fn test_default_policy() {
        let policy = PollPolicy::default();
        assert_eq!(policy.interval, Duration::from_secs(1));
        assert_eq!(policy.max_attempts, 120);
        assert_eq!(policy.deadline, Duration::from_secs(180));
    }

    #[tokio::test]
    async fn test_completed_returns_latest_reply() {
        let mut mock = base_mock();
        let mut polls = 0;
        mock.expect_retrieve_run().times(2).returning(move |_, _| {
            polls += 1;
            Ok(snapshot(if polls == 1 {
                RunStatus::Running
            } else {
                RunStatus::Completed
            }))
        });
        mock.expect_list_messages().times(1).returning(|_| {
            Ok(vec![
                reply("AAPL looks strong."),
                ThreadMessage {
                    id: "msg_1".to_string(),
                    role: MessageRole::User,
                    created_at: 1,
                    text: "prompt".to_string(),
                },
            ])
        });
        mock.expect_cancel_run().never();

        let outcome = runner(mock, PollPolicy::fast())
            .run("prompt", &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            JobOutcome::Completed {
                text: "AAPL looks strong.".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_failed_stops_polling() {
        let mut mock = base_mock();
        let mut polls = 0;
        mock.expect_retrieve_run().times(2).returning(move |_, _| {
            polls += 1;
            if polls == 1 {
                Ok(snapshot(RunStatus::Running))
            } else {
                Ok(RunSnapshot {
                    last_error: Some("server_error: model overloaded".to_string()),
                    ..snapshot(RunStatus::Failed)
                })
            }
        });
        mock.expect_list_messages().never();

        let outcome = runner(mock, PollPolicy::fast())
            .run("prompt", &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            JobOutcome::Failed {
                reason: "server_error: model overloaded".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_expired_and_cancelled_are_distinct() {
        for (status, expected) in [
            (RunStatus::Expired, JobOutcome::Expired),
            (RunStatus::Cancelled, JobOutcome::Cancelled),
        ] {
            let mut mock = base_mock();
            mock.expect_retrieve_run()
                .times(1)
                .returning(move |_, _| Ok(snapshot(status)));

            let outcome = runner(mock, PollPolicy::fast())
                .run("prompt", &CancelToken::new())
                .await
                .unwrap();
            assert_eq!(outcome, expected);
        }
    }

    #[tokio::test]
    async fn test_attempt_budget_times_out() {
        let mut mock = base_mock();
        mock.expect_retrieve_run()
            .times(3)
            .returning(|_, _| Ok(snapshot(RunStatus::Running)));
        mock.expect_cancel_run().times(1).returning(|_, _| Ok(()));

        let policy = PollPolicy::new(Duration::from_millis(1), 3, Duration::from_secs(5));
        let outcome = runner(mock, policy)
            .run("prompt", &CancelToken::new())
            .await
            .unwrap();

        assert!(matches!(outcome, JobOutcome::TimedOut { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn test_deadline_times_out() {
        let mut mock = base_mock();
        mock.expect_retrieve_run()
            .returning(|_, _| Ok(snapshot(RunStatus::Running)));
        mock.expect_cancel_run().times(1).returning(|_, _| Ok(()));

        let policy = PollPolicy::new(Duration::from_millis(10), 1_000, Duration::from_millis(35));
        let outcome = runner(mock, policy)
            .run("prompt", &CancelToken::new())
            .await
            .unwrap();

        match outcome {
            JobOutcome::TimedOut { attempts, .. } => assert!(attempts < 1_000),
            other => panic!("expected TimedOut, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancel_aborts_wait_and_cleans_up() {
        let mut mock = base_mock();
        let polls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&polls);
        mock.expect_retrieve_run().returning(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(snapshot(RunStatus::Running))
        });
        mock.expect_cancel_run().times(1).returning(|_, _| Ok(()));

        let policy = PollPolicy::new(Duration::from_millis(20), 1_000, Duration::from_secs(30));
        let runner = runner(mock, policy);
        let token = CancelToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let outcome = runner.run("prompt", &token).await.unwrap();
        assert_eq!(outcome, JobOutcome::Aborted);
        assert!(polls.load(Ordering::SeqCst) < 1_000);
    }

    #[tokio::test]
    async fn test_already_cancelled_submits_nothing() {
        let mut mock = MockAssistantBackend::new();
        mock.expect_create_thread().never();

        let token = CancelToken::new();
        token.cancel();
        let outcome = runner(mock, PollPolicy::fast())
            .run("prompt", &token)
            .await
            .unwrap();
        assert_eq!(outcome, JobOutcome::Aborted);
    }

    #[tokio::test]
    async fn test_completed_without_reply_is_failure() {
        let mut mock = base_mock();
        mock.expect_retrieve_run()
            .times(1)
            .returning(|_, _| Ok(snapshot(RunStatus::Completed)));
        mock.expect_list_messages().times(1).returning(|_| Ok(vec![]));

        let outcome = runner(mock, PollPolicy::fast())
            .run("prompt", &CancelToken::new())
            .await
            .unwrap();
        assert!(matches!(outcome, JobOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_transport_error_still_deletes_thread() {
        let mut mock = base_mock();
        mock.expect_retrieve_run()
            .times(1)
            .returning(|_, _| Err(AssistantError::RequestFailed("connection reset".to_string())));

        let result = runner(mock, PollPolicy::fast())
            .run("prompt", &CancelToken::new())
            .await;
        assert!(matches!(result, Err(AssistantError::RequestFailed(_))));
    }

    #[tokio::test]
    async fn test_delete_failure_does_not_mask_outcome() {
        let mut mock = MockAssistantBackend::new();
        mock.expect_create_thread()
            .returning(|| Ok("thread_1".to_string()));
        mock.expect_add_message().returning(|_, _| Ok(()));
        mock.expect_create_run()
            .returning(|_, _| Ok(snapshot(RunStatus::Expired)));
        mock.expect_delete_thread()
            .times(1)
            .returning(|_| Err(AssistantError::NotFound("thread_1".to_string())));

        let outcome = runner(mock, PollPolicy::fast())
            .run("prompt", &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, JobOutcome::Expired);
    }

    /// Backend whose status checks hang far longer than any test budget
    #[derive(Default)]
    struct StalledPollBackend {
        cancels: AtomicU32,
        deletes: AtomicU32,
    }

    #[async_trait::async_trait]
    impl AssistantBackend for StalledPollBackend {
        async fn create_thread(&self) -> Result<String> {
            Ok("thread_1".to_string())
        }

        async fn add_message(&self, _thread_id: &str, _content: &str) -> Result<()> {
            Ok(())
        }

        async fn create_run(&self, _thread_id: &str, _assistant_id: &str) -> Result<RunSnapshot> {
            Ok(snapshot(RunStatus::Submitted))
        }

        async fn retrieve_run(&self, _thread_id: &str, _run_id: &str) -> Result<RunSnapshot> {
            sleep(Duration::from_secs(3)).await;
            Ok(snapshot(RunStatus::Running))
        }

        async fn cancel_run(&self, _thread_id: &str, _run_id: &str) -> Result<()> {
            self.cancels.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn list_messages(&self, _thread_id: &str) -> Result<Vec<ThreadMessage>> {
            Ok(vec![])
        }

        async fn delete_thread(&self, _thread_id: &str) -> Result<()> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_cancel_interrupts_in_flight_status_check() {
        let backend = Arc::new(StalledPollBackend::default());
        let policy = PollPolicy::new(Duration::from_millis(10), 100, Duration::from_secs(30));
        let runner = JobRunner::new(backend.clone(), "asst_1", policy);

        let token = CancelToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let outcome = runner.run("prompt", &token).await.unwrap();

        assert_eq!(outcome, JobOutcome::Aborted);
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(backend.cancels.load(Ordering::SeqCst), 1);
        assert_eq!(backend.deletes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deadline_interrupts_in_flight_status_check() {
        let backend = Arc::new(StalledPollBackend::default());
        let policy = PollPolicy::new(Duration::from_millis(10), 100, Duration::from_millis(200));
        let runner = JobRunner::new(backend.clone(), "asst_1", policy);

        let started = Instant::now();
        let outcome = runner.run("prompt", &CancelToken::new()).await.unwrap();

        match outcome {
            JobOutcome::TimedOut { attempts, elapsed_ms } => {
                assert_eq!(attempts, 1);
                assert!(elapsed_ms < 1_000);
            }
            other => panic!("expected TimedOut, got {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(backend.cancels.load(Ordering::SeqCst), 1);
        assert_eq!(backend.deletes.load(Ordering::SeqCst), 1);
    }
}
