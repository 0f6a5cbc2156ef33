//! Retry controller for the reasoning pipeline.
//!
//! Drives a single fallible pipeline invocation to completion under
//! transient failure. The state machine is expressed as data: each attempt
//! either succeeds, produces a retryable rate-limit failure, or produces a
//! fatal failure that ends the run immediately.
//!
//! Backoff policy:
//! - A rate-limit failure whose message carries a provider wait hint
//!   sleeps `hint + hint_buffer` and does not consume the exponential
//!   schedule.
//! - Without a hint, the controller sleeps the current exponential delay
//!   (`initial_delay`, doubling after each hintless wait).
//! - After the final rate-limited attempt the controller reports
//!   exhaustion without sleeping again.
//!
//! Every sleep and every attempt is preceded by a [`CancelToken`] check,
//! and sleeps race the token, so a caller can abort a multi-minute backoff
//! wait.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::config::RetryConfig;
use crate::pipeline::{PipelineFailure, ReasoningPipeline};
use crate::wait_hint;

/// Tunable knobs for [`RetryController`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Starting delay for hintless rate-limit backoff; doubles per use.
    pub initial_delay: Duration,
    /// Safety margin added on top of a provider wait hint.
    pub hint_buffer: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(30),
            hint_buffer: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_secs(config.initial_delay_secs),
            hint_buffer: Duration::from_secs(config.hint_buffer_secs),
        }
    }
}

/// Terminal outcome of a controlled run.
///
/// The controller never returns an error: rate-limit exhaustion and fatal
/// failures are ordinary values the caller inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The pipeline produced a result.
    Answered(String),
    /// Every attempt ended rate-limited.
    RetriesExhausted { attempts: u32 },
    /// A fatal failure ended the run before the attempt budget.
    Fatal(PipelineFailure),
    /// The cancel token fired before an attempt or during a backoff wait.
    Cancelled,
}

/// Cooperative cancellation signal.
///
/// Clone freely; all clones observe the same state. `cancel()` wakes any
/// in-flight backoff wait.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve once the token is cancelled.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        // Register interest before re-checking, so a cancel() between the
        // check and the await cannot be missed.
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

/// Clock seam so tests can observe backoff without waiting it out.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Executes one pipeline invocation under the retry policy.
pub struct RetryController {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    cancel: CancelToken,
}

impl RetryController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_sleeper(policy, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            policy,
            sleeper,
            cancel: CancelToken::new(),
        }
    }

    /// A clone of the controller's cancel token, for handing to callers.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Drive the pipeline to a terminal [`Outcome`].
    ///
    /// Returns on the first successful attempt, on the first fatal
    /// failure, after `max_attempts` rate-limited attempts, or on
    /// cancellation — whichever comes first.
    pub async fn run(&self, pipeline: &dyn ReasoningPipeline, user_input: &str) -> Outcome {
        let mut delay = self.policy.initial_delay;

        for attempt in 1..=self.policy.max_attempts {
            if self.cancel.is_cancelled() {
                return Outcome::Cancelled;
            }

            match pipeline.run(user_input).await {
                Ok(answer) => return Outcome::Answered(answer),

                Err(PipelineFailure::RateLimited { message }) => {
                    eprintln!(
                        "Warning: rate limited (attempt {}/{}): {}",
                        attempt, self.policy.max_attempts, message
                    );

                    if attempt == self.policy.max_attempts {
                        break;
                    }

                    let wait = match wait_hint::parse_wait_hint(&message) {
                        Some(hint_secs) => {
                            let wait = Duration::from_secs_f64(hint_secs) + self.policy.hint_buffer;
                            eprintln!(
                                "Warning: waiting {:.1}s before retry (provider hint)",
                                wait.as_secs_f64()
                            );
                            wait
                        }
                        None => {
                            let wait = delay;
                            delay *= 2;
                            eprintln!(
                                "Warning: waiting {:.1}s before retry (exponential backoff)",
                                wait.as_secs_f64()
                            );
                            wait
                        }
                    };

                    if self.cancel.is_cancelled() {
                        return Outcome::Cancelled;
                    }
                    tokio::select! {
                        _ = self.sleeper.sleep(wait) => {}
                        _ = self.cancel.cancelled() => return Outcome::Cancelled,
                    }
                }

                Err(failure) => return Outcome::Fatal(failure),
            }
        }

        Outcome::RetriesExhausted {
            attempts: self.policy.max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct ScriptedPipeline {
        script: Mutex<VecDeque<Result<String, PipelineFailure>>>,
        calls: AtomicUsize,
    }

    impl ScriptedPipeline {
        fn new(script: Vec<Result<String, PipelineFailure>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ReasoningPipeline for ScriptedPipeline {
        async fn run(&self, _user_input: &str) -> Result<String, PipelineFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .expect("pipeline called more times than scripted")
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        sleeps: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        fn recorded(&self) -> Vec<Duration> {
            self.sleeps.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    fn rate_limited(message: &str) -> Result<String, PipelineFailure> {
        Err(PipelineFailure::RateLimited {
            message: message.to_string(),
        })
    }

    fn controller(sleeper: &Arc<RecordingSleeper>) -> RetryController {
        RetryController::with_sleeper(RetryPolicy::default(), Arc::clone(sleeper) as Arc<dyn Sleeper>)
    }

    #[tokio::test]
    async fn test_success_short_circuits() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let pipeline = ScriptedPipeline::new(vec![Ok("answer".to_string())]);

        let outcome = controller(&sleeper).run(&pipeline, "q").await;

        assert_eq!(outcome, Outcome::Answered("answer".to_string()));
        assert_eq!(pipeline.calls(), 1);
        assert!(sleeper.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_hint_sleep_is_hint_plus_buffer() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let pipeline = ScriptedPipeline::new(vec![
            rate_limited("Please try again in 2m3.5s."),
            Ok("answer".to_string()),
        ]);

        let outcome = controller(&sleeper).run(&pipeline, "q").await;

        assert_eq!(outcome, Outcome::Answered("answer".to_string()));
        assert_eq!(sleeper.recorded(), vec![Duration::from_secs_f64(128.5)]);
    }

    #[tokio::test]
    async fn test_hintless_backoff_doubles() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let pipeline = ScriptedPipeline::new(vec![
            rate_limited("throttled"),
            rate_limited("throttled"),
            rate_limited("throttled"),
            Ok("answer".to_string()),
        ]);

        let outcome = controller(&sleeper).run(&pipeline, "q").await;

        assert_eq!(outcome, Outcome::Answered("answer".to_string()));
        assert_eq!(
            sleeper.recorded(),
            vec![
                Duration::from_secs(30),
                Duration::from_secs(60),
                Duration::from_secs(120),
            ]
        );
    }

    #[tokio::test]
    async fn test_hint_does_not_consume_exponential_schedule() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let pipeline = ScriptedPipeline::new(vec![
            rate_limited("try again in 0m10s"),
            rate_limited("throttled"),
            rate_limited("throttled"),
            Ok("answer".to_string()),
        ]);

        controller(&sleeper).run(&pipeline, "q").await;

        // Hinted wait first, then the exponential schedule starts fresh.
        assert_eq!(
            sleeper.recorded(),
            vec![
                Duration::from_secs(15),
                Duration::from_secs(30),
                Duration::from_secs(60),
            ]
        );
    }

    #[tokio::test]
    async fn test_exhaustion_after_max_attempts_without_final_sleep() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let pipeline = ScriptedPipeline::new(vec![
            rate_limited("throttled"),
            rate_limited("throttled"),
            rate_limited("throttled"),
            rate_limited("throttled"),
            rate_limited("throttled"),
        ]);

        let outcome = controller(&sleeper).run(&pipeline, "q").await;

        assert_eq!(outcome, Outcome::RetriesExhausted { attempts: 5 });
        assert_eq!(pipeline.calls(), 5);
        // Four sleeps between five attempts; none after the last failure.
        assert_eq!(sleeper.recorded().len(), 4);
    }

    #[tokio::test]
    async fn test_configuration_missing_is_immediately_fatal() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let pipeline = ScriptedPipeline::new(vec![Err(PipelineFailure::ConfigurationMissing {
            key: "GROQ_API_KEY".to_string(),
        })]);

        let outcome = controller(&sleeper).run(&pipeline, "q").await;

        assert_eq!(
            outcome,
            Outcome::Fatal(PipelineFailure::ConfigurationMissing {
                key: "GROQ_API_KEY".to_string(),
            })
        );
        assert_eq!(pipeline.calls(), 1);
        assert!(sleeper.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_unexpected_failure_is_immediately_fatal() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let pipeline = ScriptedPipeline::new(vec![
            rate_limited("throttled"),
            Err(PipelineFailure::Unexpected {
                kind: "network".to_string(),
                message: "connection reset".to_string(),
            }),
        ]);

        let outcome = controller(&sleeper).run(&pipeline, "q").await;

        assert!(matches!(
            outcome,
            Outcome::Fatal(PipelineFailure::Unexpected { .. })
        ));
        assert_eq!(pipeline.calls(), 2);
        assert_eq!(sleeper.recorded().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let pipeline = ScriptedPipeline::new(vec![]);
        let controller = controller(&sleeper);

        controller.cancel_token().cancel();
        let outcome = controller.run(&pipeline, "q").await;

        assert_eq!(outcome, Outcome::Cancelled);
        assert_eq!(pipeline.calls(), 0);
    }

    /// Sleeper that fires the cancel token mid-wait and never completes,
    /// standing in for a caller aborting a long backoff.
    struct CancellingSleeper {
        token: CancelToken,
    }

    #[async_trait]
    impl Sleeper for CancellingSleeper {
        async fn sleep(&self, _duration: Duration) {
            self.token.cancel();
            std::future::pending::<()>().await;
        }
    }

    #[tokio::test]
    async fn test_cancelled_during_backoff_wait() {
        let pipeline = ScriptedPipeline::new(vec![rate_limited("throttled")]);
        let controller = RetryController::new(RetryPolicy::default());
        let sleeper: Arc<dyn Sleeper> = Arc::new(CancellingSleeper {
            token: controller.cancel_token(),
        });
        let controller = RetryController {
            sleeper,
            ..controller
        };

        let outcome = controller.run(&pipeline, "q").await;

        assert_eq!(outcome, Outcome::Cancelled);
        assert_eq!(pipeline.calls(), 1);
    }
}
