//! Whole-job retry with exponential backoff.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::warn;

use crate::config::RetryConfig;
use crate::import::ImportError;

/// Attempt ceiling and first backoff delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Initial attempt plus retries.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.base_delay())
    }

    /// Delay after the given failed attempt: `base * 2^(attempt - 1)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.checked_mul(factor).unwrap_or(Duration::MAX)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Suspends the worker between attempts.
pub trait Backoff: Send + Sync {
    fn wait(&self, delay: Duration);
}

pub struct ThreadSleep;

impl Backoff for ThreadSleep {
    fn wait(&self, delay: Duration) {
        std::thread::sleep(delay);
    }
}

type WaitHook = Box<dyn Fn(u32) + Send + Sync>;

/// Records requested delays instead of sleeping.
#[derive(Default)]
pub struct RecordingBackoff {
    delays: Mutex<Vec<Duration>>,
    hook: Option<WaitHook>,
}

impl RecordingBackoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `hook` with the 1-based wait number on every wait.
    pub fn with_hook(hook: impl Fn(u32) + Send + Sync + 'static) -> Self {
        Self {
            delays: Mutex::new(Vec::new()),
            hook: Some(Box::new(hook)),
        }
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

impl Backoff for RecordingBackoff {
    fn wait(&self, delay: Duration) {
        let count = match self.delays.lock() {
            Ok(mut delays) => {
                delays.push(delay);
                delays.len() as u32
            }
            Err(_) => 0,
        };
        if let Some(hook) = &self.hook {
            hook(count);
        }
    }
}

/// The last error of a job that could not be completed.
#[derive(Debug)]
pub struct RetryFailure {
    pub attempts: u32,
    pub error: ImportError,
    /// `true` when the ceiling was reached, `false` when the error was not
    /// worth retrying.
    pub exhausted: bool,
}

pub struct RetryController {
    policy: RetryPolicy,
    backoff: Arc<dyn Backoff>,
}

impl RetryController {
    pub fn new(policy: RetryPolicy, backoff: Arc<dyn Backoff>) -> Self {
        Self { policy, backoff }
    }

    pub fn with_thread_sleep(policy: RetryPolicy) -> Self {
        Self::new(policy, Arc::new(ThreadSleep))
    }

    /// Calls `op` with attempt numbers starting at 1 until it succeeds, fails
    /// with a non-retryable error, or the attempt ceiling is reached.
    pub fn run<T, F>(&self, mut op: F) -> Result<T, RetryFailure>
    where
        F: FnMut(u32) -> Result<T, ImportError>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match op(attempt) {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let retryable = error.is_retryable();
            if !retryable || attempt >= self.policy.max_attempts {
                return Err(RetryFailure {
                    attempts: attempt,
                    error,
                    exhausted: retryable,
                });
            }

            let delay = self.policy.delay_for(attempt);
            warn!(
                "Attempt {}/{} failed: {}; retrying in {:?}",
                attempt, self.policy.max_attempts, error, delay
            );
            self.backoff.wait(delay);
        }
    }
}
