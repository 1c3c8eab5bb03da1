//! Bounded waits for eventually consistent provider state.
//!
//! A freshly created IAM role exists before its trust policy can be used by
//! Lambda. Rather than sleeping for a fixed interval, provisioning polls with
//! exponential backoff and gives up once the deadline passes.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::adapters::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsistencyPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub timeout: Duration,
}

impl Default for ConsistencyPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            timeout: Duration::from_secs(60),
        }
    }
}

impl ConsistencyPolicy {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConsistencyError {
    #[error("gave up after {attempts} attempts over {waited:?}")]
    Timeout { waited: Duration, attempts: u32 },
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Deadline and delay schedule shared by consecutive waits.
#[derive(Debug)]
pub struct Backoff {
    policy: ConsistencyPolicy,
    started: Instant,
    next_delay: Duration,
    attempts: u32,
}

impl Backoff {
    pub fn start(policy: ConsistencyPolicy) -> Self {
        Self {
            policy,
            started: Instant::now(),
            next_delay: policy.initial_delay,
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Sleeps before the next attempt, or fails if that sleep would overrun
    /// the deadline.
    fn pause(&mut self) -> Result<(), ConsistencyError> {
        self.attempts += 1;
        let waited = self.started.elapsed();
        if waited + self.next_delay > self.policy.timeout {
            return Err(ConsistencyError::Timeout {
                waited,
                attempts: self.attempts,
            });
        }
        debug!(
            attempt = self.attempts,
            delay_ms = self.next_delay.as_millis() as u64,
            "waiting for provider state to converge"
        );
        std::thread::sleep(self.next_delay);
        self.next_delay = (self.next_delay * 2).min(self.policy.max_delay);
        Ok(())
    }
}

/// Polls `converged` until it reports true.
pub fn wait_until<P>(backoff: &mut Backoff, mut converged: P) -> Result<(), ConsistencyError>
where
    P: FnMut() -> Result<bool, ProviderError>,
{
    loop {
        if converged()? {
            return Ok(());
        }
        backoff.pause()?;
    }
}

/// Repeats `operation` while it fails with an error `retryable` accepts.
pub fn retry_while<T, F, R>(
    backoff: &mut Backoff,
    mut operation: F,
    retryable: R,
) -> Result<T, ConsistencyError>
where
    F: FnMut() -> Result<T, ProviderError>,
    R: Fn(&ProviderError) -> bool,
{
    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(error) if retryable(&error) => {
                warn!(%error, "provider not ready yet, retrying");
                backoff.pause()?;
            }
            Err(error) => return Err(error.into()),
        }
    }
}
