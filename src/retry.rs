//! Bounded or unbounded retry loop honoring a [`Context`].

use std::time::Duration;

use crate::{Context, FsError};

/// Outcome of a single attempt.
#[derive(Debug)]
pub enum Attempt<T> {
    /// Stop retrying and return this result.
    Done(Result<T, FsError>),
    /// The attempt failed in a way that may succeed later.
    Retry(FsError),
}

/// Call `f` until it returns [`Attempt::Done`], the attempts run out, or the
/// context ends.
///
/// A negative `attempts` retries forever; zero behaves as one. Attempts run
/// sequentially with `delay` between them, and no delay follows the last
/// one.
///
/// # Errors
///
/// - the error from [`Attempt::Done`]
/// - the context's cancellation error if it ended before success
/// - the last [`Attempt::Retry`] error once the attempts are exhausted
///
/// # Example
///
/// ```rust
/// use layerfs::retry::{try_with, Attempt};
/// use layerfs::{Context, FsError};
/// use std::time::Duration;
///
/// let mut calls = 0;
/// let value = try_with(&Context::background(), 3, Duration::ZERO, |_| {
///     calls += 1;
///     if calls < 2 {
///         Attempt::Retry(FsError::Cancelled)
///     } else {
///         Attempt::Done(Ok(calls))
///     }
/// });
/// assert_eq!(value.unwrap(), 2);
/// ```
pub fn try_with<T, F>(ctx: &Context, attempts: i32, delay: Duration, mut f: F) -> Result<T, FsError>
where
    F: FnMut(&Context) -> Attempt<T>,
{
    let attempts = if attempts == 0 { 1 } else { attempts };
    let mut last = None;
    let mut n: i32 = 0;
    while attempts < 0 || n < attempts {
        if let Some(err) = ctx.err() {
            return Err(err);
        }
        match f(ctx) {
            Attempt::Done(result) => return result,
            Attempt::Retry(err) => last = Some(err),
        }
        n = n.saturating_add(1);
        if let Some(err) = ctx.err() {
            return Err(err);
        }
        if attempts < 0 || n < attempts {
            ctx.sleep(delay)?;
        }
    }
    Err(last.unwrap_or(FsError::NotSupported {
        operation: "retry",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn transient() -> FsError {
        FsError::Io {
            operation: "open",
            path: "a".into(),
            source: std::io::Error::other("boom"),
        }
    }

    #[test]
    fn stops_on_first_success() {
        let mut calls = 0;
        let result = try_with(&Context::background(), 5, Duration::ZERO, |_| {
            calls += 1;
            Attempt::Done(Ok(()))
        });
        assert!(result.is_ok());
        assert_eq!(calls, 1);
    }

    #[test]
    fn returns_last_error_after_exhaustion() {
        let mut calls = 0;
        let result: Result<(), _> = try_with(&Context::background(), 3, Duration::ZERO, |_| {
            calls += 1;
            Attempt::Retry(FsError::NotFound {
                path: format!("attempt-{calls}"),
            })
        });
        assert_eq!(calls, 3);
        assert!(matches!(result, Err(FsError::NotFound { path }) if path == "attempt-3"));
    }

    #[test]
    fn done_error_is_not_retried() {
        let mut calls = 0;
        let result: Result<(), _> = try_with(&Context::background(), 3, Duration::ZERO, |_| {
            calls += 1;
            Attempt::Done(Err(transient()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn zero_attempts_runs_once() {
        let mut calls = 0;
        let _: Result<(), _> = try_with(&Context::background(), 0, Duration::ZERO, |_| {
            calls += 1;
            Attempt::Retry(transient())
        });
        assert_eq!(calls, 1);
    }

    #[test]
    fn unlimited_attempts_until_success() {
        let mut calls = 0;
        let result = try_with(&Context::background(), -1, Duration::ZERO, |_| {
            calls += 1;
            if calls < 50 {
                Attempt::Retry(transient())
            } else {
                Attempt::Done(Ok(calls))
            }
        });
        assert_eq!(result.unwrap(), 50);
    }

    #[test]
    fn cancellation_interrupts_delay() {
        let ctx = Context::background().with_timeout(Duration::from_millis(20));
        let start = Instant::now();
        let result: Result<(), _> = try_with(&ctx, -1, Duration::from_secs(30), |_| {
            Attempt::Retry(transient())
        });
        assert!(matches!(result, Err(FsError::DeadlineExceeded)));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn cancelled_context_makes_no_attempt() {
        let ctx = Context::background();
        ctx.cancel();
        let mut calls = 0;
        let result: Result<(), _> = try_with(&ctx, 3, Duration::ZERO, |_| {
            calls += 1;
            Attempt::Done(Ok(()))
        });
        assert!(matches!(result, Err(FsError::Cancelled)));
        assert_eq!(calls, 0);
    }
}
