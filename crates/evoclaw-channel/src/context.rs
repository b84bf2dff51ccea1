//! Cancellation/deadline propagation for blocking channel operations. A
//! thin `watch`-backed shutdown signal plus an optional deadline, threaded
//! through enqueue/`wait_for_response`/provider calls so every blocking
//! point can race against cancellation.

use std::time::Duration;

use evoclaw_core::{Error, Result};
use tokio::sync::watch;
use tokio::time::Instant;

#[derive(Clone)]
pub struct Context {
    deadline: Option<Instant>,
    shutdown: watch::Receiver<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Shutdown,
    DeadlineExceeded,
}

impl Context {
    pub fn new(shutdown: watch::Receiver<bool>) -> Self {
        Self { deadline: None, shutdown }
    }

    /// Root context with no shutdown signal wired up (for standalone tests).
    pub fn background() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { deadline: None, shutdown: rx }
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => Some(existing),
            _ => Some(candidate),
        };
        Self {
            deadline,
            shutdown: self.shutdown.clone(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.shutdown.borrow() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves once the context is cancelled, either by shutdown signal or
    /// deadline. Callers `tokio::select!` this against the real work.
    pub async fn cancelled(&mut self) -> CancelReason {
        loop {
            if *self.shutdown.borrow() {
                return CancelReason::Shutdown;
            }
            match self.deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = tokio::time::sleep_until(deadline) => return CancelReason::DeadlineExceeded,
                        changed = self.shutdown.changed() => {
                            if changed.is_err() || *self.shutdown.borrow() {
                                return CancelReason::Shutdown;
                            }
                        }
                    }
                }
                None => {
                    if self.shutdown.changed().await.is_err() {
                        return CancelReason::Shutdown;
                    }
                }
            }
        }
    }
}

impl From<CancelReason> for Error {
    fn from(reason: CancelReason) -> Self {
        match reason {
            CancelReason::Shutdown => Error::cancelled("context cancelled: shutdown"),
            CancelReason::DeadlineExceeded => Error::timeout("context cancelled: deadline exceeded"),
        }
    }
}

pub fn shutdown_pair() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Race `fut` against the context's cancellation, mapping a timeout/shutdown
/// into the corresponding typed error.
pub async fn race<T>(ctx: &mut Context, fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
        result = fut => result,
        reason = ctx.cancelled() => Err(reason.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn background_context_never_cancels_without_timeout() {
        let ctx = Context::background();
        assert!(!ctx.is_cancelled());
    }

    #[tokio::test]
    async fn with_timeout_eventually_cancels() {
        let mut ctx = Context::background().with_timeout(Duration::from_millis(5));
        let reason = ctx.cancelled().await;
        assert_eq!(reason, CancelReason::DeadlineExceeded);
    }

    #[tokio::test]
    async fn shutdown_signal_cancels_immediately() {
        let (tx, rx) = shutdown_pair();
        let mut ctx = Context::new(rx);
        tx.send(true).unwrap();
        let reason = ctx.cancelled().await;
        assert_eq!(reason, CancelReason::Shutdown);
    }
}
