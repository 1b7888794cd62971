//! Retry coordinator for portal fetches
//!
//! Every attempt gets a fresh session, a hard timeout and a guaranteed
//! teardown. Failures are logged and counted, never returned: the caller
//! only ever sees an amount or `NotFound`.

use crate::classify::FetchOutcome;
use crate::fetch::{SessionGuard, SessionProvider};
use futures::FutureExt;
use rand::Rng;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{debug, warn};

/// Bounded retry settings for one account
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum attempts, each with its own session
    pub attempts: u32,

    /// Maximum wait for the amount on one attempt
    pub wait: Duration,

    /// Lower bound of the sleep between attempts
    pub backoff_min: Duration,

    /// Upper bound of the sleep between attempts
    pub backoff_max: Duration,
}

impl RetryPolicy {
    /// Draw a random sleep from the backoff range
    pub fn backoff(&self) -> Duration {
        if self.backoff_max <= self.backoff_min {
            return self.backoff_min;
        }
        rand::thread_rng().gen_range(self.backoff_min..=self.backoff_max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            wait: Duration::from_secs(15),
            backoff_min: Duration::from_millis(1000),
            backoff_max: Duration::from_millis(2500),
        }
    }
}

/// Fetch an account's amount, retrying with a fresh session per attempt
///
/// Invokes the provider at most `policy.attempts` times and returns
/// `NotFound` once every attempt has failed.
pub async fn fetch_with_retry<P: SessionProvider>(
    provider: &P,
    account: &str,
    policy: &RetryPolicy,
) -> FetchOutcome {
    for attempt in 1..=policy.attempts {
        if let Some(amount) = attempt_once(provider, account, attempt, policy.wait).await {
            debug!(account, attempt, amount, "Fetched amount");
            return FetchOutcome::Amount(amount);
        }

        if attempt < policy.attempts {
            tokio::time::sleep(policy.backoff()).await;
        }
    }

    warn!(
        account,
        attempts = policy.attempts,
        "All attempts failed, marking account as not found"
    );
    FetchOutcome::NotFound
}

/// Run a single attempt; the session is released when this returns
///
/// A panic inside the provider or the session is caught and counted as a
/// failed attempt, like any other fault.
async fn attempt_once<P: SessionProvider>(
    provider: &P,
    account: &str,
    attempt: u32,
    wait: Duration,
) -> Option<f64> {
    let session = match AssertUnwindSafe(provider.create()).catch_unwind().await {
        Ok(Ok(session)) => session,
        Ok(Err(e)) => {
            warn!(account, attempt, error = %e, "Failed to create session");
            return None;
        }
        Err(payload) => {
            warn!(
                account,
                attempt,
                panic = %panic_message(payload.as_ref()),
                "Session creation panicked"
            );
            return None;
        }
    };
    let mut guard = SessionGuard::new(session);
    let fetch = AssertUnwindSafe(guard.fetch_value(account)).catch_unwind();

    match tokio::time::timeout(wait, fetch).await {
        Ok(Ok(Ok(Some(amount)))) => Some(amount),
        Ok(Ok(Ok(None))) => {
            warn!(account, attempt, "Amount not present on page");
            None
        }
        Ok(Ok(Err(e))) => {
            warn!(account, attempt, error = %e, "Fetch attempt failed");
            None
        }
        Ok(Err(payload)) => {
            warn!(
                account,
                attempt,
                panic = %panic_message(payload.as_ref()),
                "Fetch attempt panicked"
            );
            None
        }
        Err(_) => {
            warn!(
                account,
                attempt,
                wait_secs = wait.as_secs_f64(),
                "Timed out waiting for amount"
            );
            None
        }
    }
}

/// Best-effort text of a panic payload
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, FetchResult};
    use crate::fetch::FetchSession;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Scripted provider: each created session answers from `script`
    #[derive(Default)]
    struct ScriptedProvider {
        script: Vec<Script>,
        created: Arc<AtomicUsize>,
        destroyed: Arc<AtomicUsize>,
        fail_create: bool,
    }

    #[derive(Clone, Copy)]
    enum Script {
        Value(f64),
        Absent,
        Error,
        Hang,
        Panic,
    }

    struct ScriptedSession {
        step: Script,
        destroyed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SessionProvider for ScriptedProvider {
        type Session = ScriptedSession;

        async fn create(&self) -> FetchResult<ScriptedSession> {
            let n = self.created.fetch_add(1, Ordering::SeqCst);
            if self.fail_create {
                return Err(FetchError::Provision("no browser".into()));
            }
            let step = self.script.get(n).copied().unwrap_or(Script::Error);
            Ok(ScriptedSession {
                step,
                destroyed: Arc::clone(&self.destroyed),
            })
        }
    }

    #[async_trait]
    impl FetchSession for ScriptedSession {
        async fn fetch_value(&mut self, account: &str) -> FetchResult<Option<f64>> {
            match self.step {
                Script::Value(v) => Ok(Some(v)),
                Script::Absent => Ok(None),
                Script::Error => Err(FetchError::Status {
                    status: 503,
                    account: account.to_string(),
                }),
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(Some(1.0))
                }
                Script::Panic => panic!("session fault for account {}", account),
            }
        }

        fn destroy(&mut self) {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            wait: Duration::from_millis(50),
            backoff_min: Duration::ZERO,
            backoff_max: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_always_failing_hits_exact_ceiling() {
        let provider = ScriptedProvider::default();
        let outcome = fetch_with_retry(&provider, "333", &fast_policy(3)).await;

        assert_eq!(outcome, FetchOutcome::NotFound);
        assert_eq!(provider.created.load(Ordering::SeqCst), 3);
        assert_eq!(provider.destroyed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_success_stops_retrying() {
        let provider = ScriptedProvider {
            script: vec![Script::Error, Script::Value(42.5), Script::Value(1.0)],
            ..Default::default()
        };
        let outcome = fetch_with_retry(&provider, "111", &fast_policy(3)).await;

        assert_eq!(outcome, FetchOutcome::Amount(42.5));
        assert_eq!(provider.created.load(Ordering::SeqCst), 2);
        assert_eq!(provider.destroyed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetched_zero_is_an_amount() {
        let provider = ScriptedProvider {
            script: vec![Script::Value(0.0)],
            ..Default::default()
        };
        let outcome = fetch_with_retry(&provider, "111", &fast_policy(3)).await;
        assert_eq!(outcome, FetchOutcome::Amount(0.0));
    }

    #[tokio::test]
    async fn test_timeout_and_absence_count_as_failures() {
        let provider = ScriptedProvider {
            script: vec![Script::Hang, Script::Absent, Script::Value(7.0)],
            ..Default::default()
        };
        let outcome = fetch_with_retry(&provider, "222", &fast_policy(3)).await;

        assert_eq!(outcome, FetchOutcome::Amount(7.0));
        assert_eq!(provider.destroyed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_panicking_session_is_retried() {
        let provider = ScriptedProvider {
            script: vec![Script::Panic, Script::Value(9.0)],
            ..Default::default()
        };
        let outcome = fetch_with_retry(&provider, "555", &fast_policy(3)).await;

        assert_eq!(outcome, FetchOutcome::Amount(9.0));
        assert_eq!(provider.created.load(Ordering::SeqCst), 2);
        assert_eq!(provider.destroyed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_panic_on_every_attempt_is_not_found() {
        let provider = ScriptedProvider {
            script: vec![Script::Panic, Script::Panic],
            ..Default::default()
        };
        let outcome = fetch_with_retry(&provider, "555", &fast_policy(2)).await;

        assert_eq!(outcome, FetchOutcome::NotFound);
        assert_eq!(provider.destroyed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[tokio::test]
    async fn test_creation_failure_counts_as_attempt() {
        let provider = ScriptedProvider {
            fail_create: true,
            ..Default::default()
        };
        let outcome = fetch_with_retry(&provider, "444", &fast_policy(2)).await;

        assert_eq!(outcome, FetchOutcome::NotFound);
        assert_eq!(provider.created.load(Ordering::SeqCst), 2);
        assert_eq!(provider.destroyed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_backoff_within_range() {
        let policy = RetryPolicy {
            backoff_min: Duration::from_millis(10),
            backoff_max: Duration::from_millis(20),
            ..RetryPolicy::default()
        };
        for _ in 0..100 {
            let sleep = policy.backoff();
            assert!(sleep >= Duration::from_millis(10));
            assert!(sleep <= Duration::from_millis(20));
        }
    }
}
