//! Retry with exponential backoff for Overpass requests.

use std::time::Duration;

use log::debug;

use super::{OverpassError, OverpassTransport, TransportResponse};

/// Statuses treated as transient.
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// How many times to try a request and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Total attempts, including the first. Values below one act as one.
    pub max_attempts: u32,
    /// Wait after the first failed attempt.
    pub initial_delay: Duration,
    /// Factor applied to the wait after each further failure.
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(1_200),
            multiplier: 1.8,
        }
    }
}

impl BackoffPolicy {
    /// Wait after failed attempt number `attempt` (1-based).
    ///
    /// # Examples
    /// ```
    /// use std::time::Duration;
    /// use woladen_data::overpass::BackoffPolicy;
    ///
    /// let policy = BackoffPolicy::default();
    /// assert_eq!(policy.delay_after(1), Duration::from_millis(1_200));
    /// assert_eq!(policy.delay_after(2), Duration::from_millis(2_160));
    /// ```
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let millis = self.initial_delay.as_secs_f64() * 1_000.0 * self.multiplier.powi(exponent);
        if millis.is_finite() && millis > 0.0 {
            Duration::from_millis(millis.round() as u64)
        } else {
            Duration::ZERO
        }
    }

    /// Whether `status` should be retried.
    #[must_use]
    pub fn is_retryable(status: u16) -> bool {
        RETRYABLE_STATUSES.contains(&status)
    }
}

/// Sleeps between attempts.
pub trait Pause {
    /// Block the current thread for `duration`.
    fn pause(&self, duration: Duration);
}

impl<P: Pause + ?Sized> Pause for &P {
    fn pause(&self, duration: Duration) {
        (**self).pause(duration);
    }
}

/// [`Pause`] backed by [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Send `query` through `transport`, retrying transient failures.
///
/// Statuses below 400 succeed. Statuses in [`RETRYABLE_STATUSES`] and
/// transport failures are retried after [`BackoffPolicy::delay_after`] until
/// the attempts run out; any other status fails immediately.
///
/// # Errors
///
/// Returns [`OverpassError::Status`] or [`OverpassError::Transport`] for the
/// last failure.
pub fn send_with_retry<T, P>(
    transport: &T,
    query: &str,
    policy: &BackoffPolicy,
    pause: &P,
) -> Result<TransportResponse, OverpassError>
where
    T: OverpassTransport + ?Sized,
    P: Pause + ?Sized,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let failure = match transport.post_query(query) {
            Ok(response) if response.status < 400 => return Ok(response),
            Ok(response) if BackoffPolicy::is_retryable(response.status) => OverpassError::Status {
                url: transport.endpoint().to_owned(),
                status: response.status,
                attempts: attempt,
            },
            Ok(response) => {
                return Err(OverpassError::Status {
                    url: transport.endpoint().to_owned(),
                    status: response.status,
                    attempts: attempt,
                });
            }
            Err(source) => OverpassError::Transport {
                attempts: attempt,
                source,
            },
        };
        if attempt >= max_attempts {
            return Err(failure);
        }
        let delay = policy.delay_after(attempt);
        debug!("Overpass attempt {attempt}/{max_attempts} failed ({failure}); retrying in {delay:?}");
        pause.pause(delay);
    }
}
