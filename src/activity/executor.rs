//! Activity executor.
//!
//! Runs one activity invocation to completion: attempts, instrumentation,
//! retry delays and cancellation.
//!
//! ```text
//!   Scheduled ──▶ Running ──ok──▶ Succeeded
//!       ▲            │
//!       │          err
//!       │            ▼
//!   sleep(delay) ◀─ retry? ──no──▶ Exhausted
//! ```
//!
//! Cancellation is observed while an attempt runs and while waiting to
//! retry. A cancelled attempt is recorded as failed and never retried.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use tokio_util::sync::CancellationToken;

use crate::activity::error::{ActivityError, ExecutionError, Exhaustion};
use crate::activity::instrumentation::{self, AttemptOutcome};
use crate::activity::{Activity, ActivityContext};
use crate::config::ActivityConfig;
use crate::config::ConfigError;
use crate::observability::Scope;
use crate::resilience::{AttemptState, RetryPolicy, Retryable, Sleeper, TokioSleeper};

/// Options applied to every activity an executor runs.
#[derive(Debug, Clone, Default)]
pub struct ActivityOptions {
    /// Upper bound on a single attempt, handed to the activity.
    pub start_to_close_timeout: Option<Duration>,
    pub retry_policy: RetryPolicy,
}

impl TryFrom<&ActivityConfig> for ActivityOptions {
    type Error = ConfigError;

    fn try_from(config: &ActivityConfig) -> Result<Self, Self::Error> {
        let timeout = match config.start_to_close_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        Ok(Self {
            start_to_close_timeout: timeout,
            retry_policy: RetryPolicy::try_from(&config.retry)?,
        })
    }
}

/// A successful execution and what it cost.
#[derive(Debug, Clone, PartialEq)]
pub struct Completed<T> {
    pub output: T,
    pub attempts: u32,
    pub elapsed: Duration,
}

#[derive(Clone)]
pub struct ActivityExecutor {
    options: ActivityOptions,
    scope: Scope,
    sleeper: Arc<dyn Sleeper>,
}

impl ActivityExecutor {
    pub fn new(options: ActivityOptions, scope: Scope) -> Self {
        Self {
            options,
            scope,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Same options and sleeper, different metric scope.
    pub fn with_scope(&self, scope: Scope) -> Self {
        Self {
            options: self.options.clone(),
            scope,
            sleeper: self.sleeper.clone(),
        }
    }

    pub fn options(&self) -> &ActivityOptions {
        &self.options
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Run `activity` until it succeeds, exhausts its retries or is cancelled.
    pub async fn execute<A>(
        &self,
        activity: &A,
        input: &A::Input,
        cancel: &CancellationToken,
    ) -> Result<A::Output, ExecutionError>
    where
        A: Activity + ?Sized,
    {
        self.execute_detailed(activity, input, cancel)
            .await
            .map(|completed| completed.output)
    }

    /// Like [`execute`](Self::execute), also reporting how many attempts the
    /// success took.
    pub async fn execute_detailed<A>(
        &self,
        activity: &A,
        input: &A::Input,
        cancel: &CancellationToken,
    ) -> Result<Completed<A::Output>, ExecutionError>
    where
        A: Activity + ?Sized,
    {
        let invoked = Instant::now();
        let scope = self.scope.with_tag("stage", activity.stage());
        let policy = &self.options.retry_policy;
        let mut state = AttemptState::new(SystemTime::now());

        loop {
            if cancel.is_cancelled() {
                return Err(self.exhausted(
                    activity.name(),
                    state.attempt - 1,
                    invoked,
                    Exhaustion::Cancelled,
                    ActivityError::cancelled("cancelled before attempt"),
                ));
            }

            let measurement = instrumentation::record_start(&scope, activity.name(), state.scheduled_at);
            let ctx = ActivityContext::new(
                activity.name(),
                state.attempt,
                state.scheduled_at,
                self.options.start_to_close_timeout,
                cancel.child_token(),
            );

            tracing::debug!(activity = activity.name(), attempt = state.attempt, "Activity attempt started");

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(ActivityError::cancelled("cancelled during attempt")),
                result = activity.execute(&ctx, input) => result,
            };
            measurement.finish(AttemptOutcome::from(&result));

            let failure = match result {
                Ok(output) => {
                    tracing::debug!(
                        activity = activity.name(),
                        attempt = state.attempt,
                        elapsed_ms = invoked.elapsed().as_millis() as u64,
                        "Activity succeeded"
                    );
                    return Ok(Completed {
                        output,
                        attempts: state.attempt,
                        elapsed: invoked.elapsed(),
                    });
                }
                Err(failure) => failure,
            };

            if failure.is_cancelled() {
                return Err(self.exhausted(activity.name(), state.attempt, invoked, Exhaustion::Cancelled, failure));
            }

            if !policy.should_retry(state.attempt, &failure) {
                let reason = if failure.is_retryable() {
                    Exhaustion::AttemptsExhausted
                } else {
                    Exhaustion::NonRetryable
                };
                return Err(self.exhausted(activity.name(), state.attempt, invoked, reason, failure));
            }

            let failed_attempt = state.attempt;
            let delay = state.record_failure(policy, SystemTime::now());
            tracing::warn!(
                activity = activity.name(),
                attempt = failed_attempt,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "Activity attempt failed, retrying"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(self.exhausted(
                        activity.name(),
                        failed_attempt,
                        invoked,
                        Exhaustion::Cancelled,
                        ActivityError::cancelled("cancelled while waiting to retry"),
                    ));
                }
                _ = self.sleeper.sleep(delay) => {}
            }
        }
    }

    fn exhausted(
        &self,
        activity: &str,
        attempts: u32,
        invoked: Instant,
        reason: Exhaustion,
        source: ActivityError,
    ) -> ExecutionError {
        let err = ExecutionError {
            activity: activity.to_string(),
            attempts,
            elapsed: invoked.elapsed(),
            reason,
            source,
        };
        tracing::warn!(
            activity = %err.activity,
            attempts = err.attempts,
            reason = %err.reason,
            error = %err.source,
            "Activity exhausted"
        );
        err
    }
}

impl std::fmt::Debug for ActivityExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityExecutor")
            .field("options", &self.options)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::instrumentation::{ACTIVITY_FAILED, ACTIVITY_STARTED, ACTIVITY_SUCCEEDED};
    use crate::observability::MemorySink;
    use crate::resilience::RecordingSleeper;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed script of attempt results.
    struct Scripted {
        results: Mutex<VecDeque<Result<u32, ActivityError>>>,
        calls: Mutex<Vec<u32>>,
    }

    impl Scripted {
        fn new(results: Vec<Result<u32, ActivityError>>) -> Self {
            Self {
                results: Mutex::new(results.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn attempts(&self) -> Vec<u32> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Activity for Scripted {
        type Input = ();
        type Output = u32;

        fn name(&self) -> &'static str {
            "activity.scripted"
        }

        fn stage(&self) -> &'static str {
            "Scripted"
        }

        async fn execute(&self, ctx: &ActivityContext, _input: &()) -> Result<u32, ActivityError> {
            self.calls.lock().unwrap().push(ctx.attempt());
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ActivityError::transient("script exhausted")))
        }
    }

    /// Never finishes on its own.
    struct Hanging;

    #[async_trait]
    impl Activity for Hanging {
        type Input = ();
        type Output = ();

        fn name(&self) -> &'static str {
            "activity.hanging"
        }

        fn stage(&self) -> &'static str {
            "Hanging"
        }

        async fn execute(&self, _ctx: &ActivityContext, _input: &()) -> Result<(), ActivityError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn executor(max_attempts: Option<u32>) -> (ActivityExecutor, Arc<MemorySink>, RecordingSleeper) {
        let sink = Arc::new(MemorySink::new());
        let sleeper = RecordingSleeper::new();
        let policy = RetryPolicy::new(Duration::from_secs(1), Duration::from_secs(60), 2.0, max_attempts).unwrap();
        let options = ActivityOptions {
            start_to_close_timeout: Some(Duration::from_secs(60)),
            retry_policy: policy,
        };
        let executor = ActivityExecutor::new(options, Scope::new(sink.clone()))
            .with_sleeper(Arc::new(sleeper.clone()));
        (executor, sink, sleeper)
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let (executor, sink, sleeper) = executor(Some(4));
        let activity = Scripted::new(vec![
            Err(ActivityError::transient("timeout")),
            Err(ActivityError::transient("timeout")),
            Err(ActivityError::transient("timeout")),
            Ok(42),
        ]);

        let completed = executor
            .execute_detailed(&activity, &(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(completed.output, 42);
        assert_eq!(completed.attempts, 4);
        assert_eq!(activity.attempts(), vec![1, 2, 3, 4]);
        assert_eq!(
            sleeper.calls(),
            vec![Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)]
        );
        assert_eq!(sink.counter_total(ACTIVITY_STARTED), 4);
        assert_eq!(sink.counter_total(ACTIVITY_SUCCEEDED), 1);
        assert_eq!(sink.counter_total(ACTIVITY_FAILED), 3);

        for event in sink.events() {
            assert_eq!(event.tags.get("stage"), Some("Scripted"));
            assert_eq!(event.tags.get("operation"), Some("activity.scripted"));
        }
    }

    #[tokio::test]
    async fn test_fatal_failure_is_not_retried() {
        let (executor, sink, sleeper) = executor(None);
        let activity = Scripted::new(vec![Err(ActivityError::fatal("invalid ip")), Ok(1)]);

        let err = executor
            .execute(&activity, &(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.reason, Exhaustion::NonRetryable);
        assert_eq!(err.attempts, 1);
        assert_eq!(err.source, ActivityError::fatal("invalid ip"));
        assert!(sleeper.calls().is_empty());
        assert_eq!(sink.counter_total(ACTIVITY_FAILED), 1);
    }

    #[tokio::test]
    async fn test_attempt_budget_is_enforced() {
        let (executor, sink, sleeper) = executor(Some(3));
        let activity = Scripted::new(vec![]);

        let err = executor
            .execute(&activity, &(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.reason, Exhaustion::AttemptsExhausted);
        assert_eq!(err.attempts, 3);
        assert_eq!(activity.attempts(), vec![1, 2, 3]);
        assert_eq!(sleeper.calls().len(), 2);
        assert_eq!(sink.counter_total(ACTIVITY_STARTED), 3);
        assert_eq!(sink.counter_total(ACTIVITY_FAILED), 3);
    }

    #[tokio::test]
    async fn test_cancel_during_attempt() {
        let (executor, sink, _) = executor(None);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = executor.execute(&Hanging, &(), &cancel).await.unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(err.attempts, 1);
        assert_eq!(sink.counter_total(ACTIVITY_STARTED), 1);
        assert_eq!(sink.counter_total(ACTIVITY_FAILED), 1);
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_to_retry() {
        let sink = Arc::new(MemorySink::new());
        let options = ActivityOptions {
            start_to_close_timeout: None,
            retry_policy: RetryPolicy::new(Duration::from_secs(3600), Duration::from_secs(3600), 1.0, None).unwrap(),
        };
        let executor = ActivityExecutor::new(options, Scope::new(sink.clone()));
        let activity = Scripted::new(vec![Err(ActivityError::transient("HTTP 503"))]);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = executor.execute(&activity, &(), &cancel).await.unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(err.attempts, 1);
        assert_eq!(activity.attempts(), vec![1]);
        assert_eq!(sink.counter_total(ACTIVITY_STARTED), 1);
    }

    #[tokio::test]
    async fn test_already_cancelled_runs_nothing() {
        let (executor, sink, _) = executor(None);
        let activity = Scripted::new(vec![Ok(1)]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = executor.execute(&activity, &(), &cancel).await.unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(err.attempts, 0);
        assert!(activity.attempts().is_empty());
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_options_from_config() {
        let config = ActivityConfig::default();
        let options = ActivityOptions::try_from(&config).unwrap();
        assert_eq!(options.start_to_close_timeout, Some(Duration::from_secs(60)));
        assert_eq!(options.retry_policy, RetryPolicy::default());
    }
}
