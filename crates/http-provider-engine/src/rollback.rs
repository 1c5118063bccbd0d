//! Retry limit policy
//!
//! Once a resource has failed `rollbackRetriesLimit` times in a row, the
//! orchestrator asks a [`RetryLimitPolicy`] whether to send another mutating
//! request. The policy decides; the orchestrator only enforces.

use tracing::warn;

/// What to do when the retry limit has been reached
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Send the request anyway
    Proceed,
    /// Do not send; report the limit as reached
    Halt,
}

/// Decides whether a resource past its retry limit may be retried
pub trait RetryLimitPolicy: Send + Sync {
    /// Called before a mutating request when `failed >= limit`
    fn on_limit_reached(&self, failed: i32, limit: i32) -> RetryDecision;
}

/// Stop sending requests once the limit is reached
///
/// The resource stays in its failed state, with its last error and request
/// preserved, until its spec changes.
#[derive(Clone, Copy, Debug, Default)]
pub struct HaltOnExhaustion;

impl RetryLimitPolicy for HaltOnExhaustion {
    fn on_limit_reached(&self, failed: i32, limit: i32) -> RetryDecision {
        warn!(failed, limit, "retry limit reached, not sending request");
        RetryDecision::Halt
    }
}

/// Whether `failed` has reached `limit`; an unset limit is never reached
pub fn limit_reached(failed: i32, limit: Option<i32>) -> Option<i32> {
    limit.filter(|limit| failed >= *limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halt_policy_always_halts() {
        assert_eq!(HaltOnExhaustion.on_limit_reached(3, 3), RetryDecision::Halt);
        assert_eq!(HaltOnExhaustion.on_limit_reached(10, 3), RetryDecision::Halt);
    }

    #[test]
    fn unset_limit_is_never_reached() {
        assert_eq!(limit_reached(1_000, None), None);
    }

    #[test]
    fn limit_is_reached_at_equality() {
        assert_eq!(limit_reached(2, Some(3)), None);
        assert_eq!(limit_reached(3, Some(3)), Some(3));
        assert_eq!(limit_reached(4, Some(3)), Some(3));
    }

    #[test]
    fn zero_limit_halts_before_the_first_attempt() {
        assert_eq!(limit_reached(0, Some(0)), Some(0));
    }
}
