//! Cancellation and deadlines for blocking operations.
//!
//! HTTP requests and retry delays are the only places where this crate
//! blocks. Both take a [`Context`] and stop as soon as it is cancelled or its
//! deadline passes, reporting [`FsError::Cancelled`] or
//! [`FsError::DeadlineExceeded`].

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::FsError;

/// Cancellation signal with an optional deadline.
///
/// Clones and contexts derived with [`with_timeout`](Self::with_timeout) or
/// [`with_deadline`](Self::with_deadline) share the same cancel signal:
/// cancelling any of them cancels all of them. Derived contexts keep the
/// earlier of their own and their parent's deadline.
///
/// # Example
///
/// ```rust
/// use layerfs::Context;
/// use std::time::Duration;
///
/// let ctx = Context::background().with_timeout(Duration::from_millis(10));
/// assert!(ctx.sleep(Duration::from_secs(5)).is_err());
/// assert!(ctx.err().is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Context {
    signal: Arc<Signal>,
    deadline: Option<Instant>,
}

#[derive(Debug, Default)]
struct Signal {
    cancelled: Mutex<bool>,
    cond: Condvar,
}

impl Signal {
    fn lock(&self) -> MutexGuard<'_, bool> {
        self.cancelled.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a context that expires after `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a context that expires at `deadline`.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        };
        Self {
            signal: Arc::clone(&self.signal),
            deadline: Some(deadline),
        }
    }

    /// Cancel this context and every context sharing its signal.
    pub fn cancel(&self) {
        *self.signal.lock() = true;
        self.signal.cond.notify_all();
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline, saturating at zero.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Returns `true` once the context is cancelled or expired.
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// The reason the context ended, or `None` while it is still live.
    ///
    /// Explicit cancellation wins over an expired deadline.
    pub fn err(&self) -> Option<FsError> {
        let cancelled = *self.signal.lock();
        self.check(cancelled)
    }

    fn check(&self, cancelled: bool) -> Option<FsError> {
        if cancelled {
            return Some(FsError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(FsError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Sleep for `duration`, waking early if the context ends.
    ///
    /// # Errors
    ///
    /// The cancellation error if the context ended before the duration
    /// elapsed.
    pub fn sleep(&self, duration: Duration) -> Result<(), FsError> {
        let until = Instant::now() + duration;
        self.wait_until(Some(until))
    }

    /// Block until the context ends and return the reason.
    ///
    /// Blocks forever on a context without a deadline that is never
    /// cancelled.
    pub fn wait(&self) -> FsError {
        match self.wait_until(None) {
            Err(err) => err,
            Ok(()) => FsError::Cancelled,
        }
    }

    fn wait_until(&self, until: Option<Instant>) -> Result<(), FsError> {
        let mut cancelled = self.signal.lock();
        loop {
            if let Some(err) = self.check(*cancelled) {
                return Err(err);
            }
            let now = Instant::now();
            if until.is_some_and(|u| now >= u) {
                return Ok(());
            }
            let wake = match (until, self.deadline) {
                (Some(u), Some(d)) => Some(u.min(d)),
                (u, d) => u.or(d),
            };
            cancelled = match wake {
                Some(wake) => {
                    let timeout = wake.saturating_duration_since(now);
                    self.signal
                        .cond
                        .wait_timeout(cancelled, timeout)
                        .map(|(guard, _)| guard)
                        .unwrap_or_else(|e| e.into_inner().0)
                }
                None => self
                    .signal
                    .cond
                    .wait(cancelled)
                    .unwrap_or_else(|e| e.into_inner()),
            };
        }
    }
}
