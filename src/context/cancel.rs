//! Cancellation and deadline token threaded through every handler, hook and
//! middleware call.
//!
//! The dispatch core never looks inside a [`CancelToken`]; it only passes the
//! one it was given along. Collaborators that care (timeouts, long-running
//! handlers) derive children from it and watch them.

use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

/// A cancellation signal with an optional deadline.
///
/// Cloning yields a handle to the same signal. [`child`](Self::child) and the
/// deadline constructors yield tokens that are cancelled with their parent but
/// can also be cancelled on their own.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use strata::CancelToken;
///
/// let root = CancelToken::new();
/// let scoped = root.with_timeout(Duration::from_secs(30));
/// assert!(scoped.deadline().is_some());
///
/// root.cancel();
/// assert!(scoped.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token cancelled together with `self`, keeping the same deadline.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// A child token whose deadline is the earlier of `deadline` and the current one.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current <= deadline => current,
            _ => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// A child token that expires `timeout` from now (or earlier, if `self` does).
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Cancels this token and every token derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// `true` once cancelled explicitly or once the deadline has passed.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves when the token is cancelled or its deadline passes.
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }
}
