//! Remote value fetching
//!
//! A [`SessionProvider`] creates expensive, stateful portal sessions; a
//! [`FetchSession`] reads one amount for one account. Sessions are never
//! shared: each fetch attempt creates its own and releases it through a
//! [`SessionGuard`], so a broken session cannot contaminate the next attempt.
//!
//! ```text
//!   fetch_with_retry(account)
//!          │
//!          ├── attempt 1: create ─▶ SessionGuard ─▶ fetch_value (bounded wait) ─▶ destroy
//!          │       (random backoff)
//!          ├── attempt 2: create ─▶ SessionGuard ─▶ fetch_value (bounded wait) ─▶ destroy
//!          │       ...
//!          └── Amount(v) on first success, NotFound after the last failure
//! ```

pub mod http;
pub mod retry;

use crate::error::FetchResult;
use async_trait::async_trait;

pub use http::{HttpPortal, HttpSession};
pub use retry::{fetch_with_retry, RetryPolicy};

/// Creates portal sessions
#[async_trait]
pub trait SessionProvider: Send + Sync + 'static {
    /// Session type produced by this provider
    type Session: FetchSession;

    /// Create a fresh session
    async fn create(&self) -> FetchResult<Self::Session>;
}

/// A single portal session, owned by exactly one fetch attempt
#[async_trait]
pub trait FetchSession: Send {
    /// Fetch the amount for a normalized account id
    ///
    /// `Ok(None)` means the page loaded but carried no amount.
    async fn fetch_value(&mut self, account: &str) -> FetchResult<Option<f64>>;

    /// Tear the session down. Must be idempotent and must not panic.
    fn destroy(&mut self);
}

/// Scoped session that is destroyed on every exit path
pub struct SessionGuard<S: FetchSession> {
    session: S,
}

impl<S: FetchSession> SessionGuard<S> {
    /// Take ownership of a freshly created session
    pub fn new(session: S) -> Self {
        Self { session }
    }

    /// Fetch through the guarded session
    pub async fn fetch_value(&mut self, account: &str) -> FetchResult<Option<f64>> {
        self.session.fetch_value(account).await
    }
}

impl<S: FetchSession> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        self.session.destroy();
    }
}
