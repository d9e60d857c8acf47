//! Retry and pacing policy for calls against the measurement API.
//!
//! Both values are plain data handed to the transport at construction.

use std::fmt;
use std::time::Duration;

/// The kinds of listing resource the API exposes. Each may be paced differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Locations,
    Sensors,
    Measurements,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Locations => "locations",
            ResourceKind::Sensors => "sensors",
            ResourceKind::Measurements => "measurements",
        };
        write!(f, "{}", name)
    }
}

/// How often and how long to retry a failed call.
///
/// Rate-limit responses (HTTP 429) back off exponentially:
/// `rate_limit_base_delay * 2^attempt`. Network level failures back off linearly:
/// `transport_base_delay * (attempt + 1)`. Every delay is capped by `max_delay`,
/// and each kind of failure has its own attempt budget.
///
/// # Examples
///
/// ```
/// use aq_harvest::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.rate_limit_delay(0), Duration::from_secs(5));
/// assert_eq!(policy.rate_limit_delay(2), Duration::from_secs(20));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts (including the first) while the provider answers 429.
    pub max_rate_limit_attempts: u32,
    pub rate_limit_base_delay: Duration,
    /// Total attempts (including the first) while the request itself fails.
    pub max_transport_attempts: u32,
    pub transport_base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_rate_limit_attempts: 3,
            rate_limit_base_delay: Duration::from_secs(5),
            max_transport_attempts: 3,
            transport_base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// A policy that retries as configured but never actually waits.
    pub fn immediate(max_rate_limit_attempts: u32, max_transport_attempts: u32) -> Self {
        Self {
            max_rate_limit_attempts,
            rate_limit_base_delay: Duration::ZERO,
            max_transport_attempts,
            transport_base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before the retry that follows the `attempt`-th (zero based) 429.
    pub fn rate_limit_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.rate_limit_base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }

    /// Delay before the retry that follows the `attempt`-th (zero based) request failure.
    pub fn transport_delay(&self, attempt: u32) -> Duration {
        self.transport_base_delay
            .saturating_mul(attempt.saturating_add(1))
            .min(self.max_delay)
    }
}

/// Minimum spacing between consecutive calls, per resource kind.
///
/// The spacing is measured from the previous call of *any* kind, because the
/// provider's limit is global to the API key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleConfig {
    pub locations: Duration,
    pub sensors: Duration,
    pub measurements: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            locations: Duration::from_millis(500),
            sensors: Duration::from_millis(500),
            measurements: Duration::from_millis(1000),
        }
    }
}

impl ThrottleConfig {
    pub fn none() -> Self {
        Self {
            locations: Duration::ZERO,
            sensors: Duration::ZERO,
            measurements: Duration::ZERO,
        }
    }

    pub fn interval(&self, kind: ResourceKind) -> Duration {
        match kind {
            ResourceKind::Locations => self.locations,
            ResourceKind::Sensors => self.sensors,
            ResourceKind::Measurements => self.measurements,
        }
    }
}
