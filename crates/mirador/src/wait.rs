//! Time-bounded predicate waiting.
//!
//! Nearly every component funnels through [`wait_for`]: the page-safe
//! barrier, navigation retries, REST task polling, and widget state waits.

use std::time::{Duration, Instant};

use crate::result::{MiradorError, MiradorResult};

/// Default overall wait budget (30 seconds)
pub const DEFAULT_WAIT_NUM_SEC: f64 = 30.0;

/// Default polling interval (200ms)
pub const DEFAULT_WAIT_DELAY_MS: u64 = 200;

/// Values a waited-on closure may produce.
///
/// `wait_for` keeps polling until the produced value is "truthy":
/// `false`, `None`, `Err(..)` (with `handle_exception`) and JSON
/// `null`/`false` all count as not-yet.
pub trait WaitPredicate {
    /// Whether this value terminates the wait
    fn is_satisfied(&self) -> bool;
}

impl WaitPredicate for bool {
    fn is_satisfied(&self) -> bool {
        *self
    }
}

impl<T> WaitPredicate for Option<T> {
    fn is_satisfied(&self) -> bool {
        self.is_some()
    }
}

impl WaitPredicate for serde_json::Value {
    fn is_satisfied(&self) -> bool {
        !matches!(
            self,
            serde_json::Value::Null | serde_json::Value::Bool(false)
        )
    }
}

impl WaitPredicate for () {
    fn is_satisfied(&self) -> bool {
        true
    }
}

/// Options for a single `wait_for` invocation
pub struct WaitOptions {
    /// Overall budget in seconds
    pub num_sec: f64,
    /// Polling interval
    pub delay: Duration,
    /// Message included in the timeout error
    pub message: String,
    /// Treat errors from the polled closure as falsey results
    pub handle_exception: bool,
    /// On timeout, return the last outcome instead of erroring
    pub silent_failure: bool,
}

impl std::fmt::Debug for WaitOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitOptions")
            .field("num_sec", &self.num_sec)
            .field("delay", &self.delay)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            num_sec: DEFAULT_WAIT_NUM_SEC,
            delay: Duration::from_millis(DEFAULT_WAIT_DELAY_MS),
            message: "condition".to_string(),
            handle_exception: false,
            silent_failure: false,
        }
    }
}

impl WaitOptions {
    /// Create options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the overall budget in seconds
    #[must_use]
    pub fn num_sec(mut self, num_sec: f64) -> Self {
        self.num_sec = num_sec;
        self
    }

    /// Set the polling interval
    #[must_use]
    pub const fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set the timeout message
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Treat closure errors as falsey results
    #[must_use]
    pub const fn handle_exception(mut self) -> Self {
        self.handle_exception = true;
        self
    }

    /// Return the last outcome on timeout instead of erroring
    #[must_use]
    pub const fn silent_failure(mut self) -> Self {
        self.silent_failure = true;
        self
    }

    fn budget(&self) -> Duration {
        Duration::from_secs_f64(self.num_sec.max(0.0))
    }
}

/// Outcome of a successful (or silently failed) wait
#[derive(Debug)]
pub struct WaitOutcome<T> {
    /// The last value produced by the polled closure
    pub value: Option<T>,
    /// Time spent waiting
    pub elapsed: Duration,
    /// Whether the condition was actually met
    pub satisfied: bool,
}

/// Repeatedly evaluate `fn_` until it produces a satisfied value or the
/// budget elapses.
///
/// Between attempts `fail_func` (if any) runs, typically refreshing the
/// DOM or reloading a REST entity.
///
/// # Errors
///
/// [`MiradorError::Timeout`] when the budget elapses, unless
/// `silent_failure` is set.
pub fn wait_for_with<T, F, G>(
    mut fn_: F,
    mut fail_func: Option<G>,
    options: &WaitOptions,
) -> MiradorResult<WaitOutcome<T>>
where
    T: WaitPredicate,
    F: FnMut() -> MiradorResult<T>,
    G: FnMut(),
{
    let start = Instant::now();
    let budget = options.budget();
    let mut last: Option<T> = None;

    loop {
        match fn_() {
            Ok(value) => {
                if value.is_satisfied() {
                    return Ok(WaitOutcome {
                        value: Some(value),
                        elapsed: start.elapsed(),
                        satisfied: true,
                    });
                }
                last = Some(value);
            }
            Err(err) if options.handle_exception => {
                tracing::debug!(error = %err, "wait_for swallowed exception");
            }
            Err(err) => return Err(err),
        }

        if start.elapsed() >= budget {
            break;
        }

        if let Some(ref mut f) = fail_func {
            f();
        }
        std::thread::sleep(options.delay.min(budget.saturating_sub(start.elapsed())));
    }

    if options.silent_failure {
        return Ok(WaitOutcome {
            value: last,
            elapsed: start.elapsed(),
            satisfied: false,
        });
    }

    Err(MiradorError::Timeout {
        ms: budget.as_millis() as u64,
        message: options.message.clone(),
    })
}

/// [`wait_for_with`] without a fail-func.
///
/// # Errors
///
/// [`MiradorError::Timeout`] when the budget elapses.
pub fn wait_for<T, F>(fn_: F, options: &WaitOptions) -> MiradorResult<WaitOutcome<T>>
where
    T: WaitPredicate,
    F: FnMut() -> MiradorResult<T>,
{
    wait_for_with(fn_, None::<fn()>, options)
}
