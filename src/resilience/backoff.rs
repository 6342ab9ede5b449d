//! Fixed and exponential backoff.

use std::time::Duration;

/// Delay to wait after failed attempt number `attempt` (1-based).
///
/// Exponential backoff yields `base * 2^(attempt-1)`; fixed backoff always
/// yields `base`. Attempt 0 never sleeps.
pub fn calculate_backoff(attempt: u32, base: Duration, exponential: bool) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    if !exponential {
        return base;
    }

    let factor = 2u32.saturating_pow(attempt - 1);
    base.saturating_mul(factor)
}

/// Render a delay in seconds the way retry log lines show it (`1`, `0.5`, `4`).
pub fn format_secs(delay: Duration) -> String {
    delay.as_secs_f64().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let base = Duration::from_millis(100);
        assert_eq!(calculate_backoff(0, base, true), Duration::ZERO);
        assert_eq!(calculate_backoff(1, base, true), Duration::from_millis(100));
        assert_eq!(calculate_backoff(2, base, true), Duration::from_millis(200));
        assert_eq!(calculate_backoff(3, base, true), Duration::from_millis(400));
    }

    #[test]
    fn test_fixed_backoff() {
        let base = Duration::from_secs(1);
        for attempt in 1..5 {
            assert_eq!(calculate_backoff(attempt, base, false), base);
        }
    }

    #[test]
    fn test_backoff_saturates() {
        let delay = calculate_backoff(200, Duration::from_secs(1), true);
        assert!(delay >= Duration::from_secs(u32::MAX as u64));
    }

    #[test]
    fn test_format_secs() {
        assert_eq!(format_secs(Duration::from_secs(1)), "1");
        assert_eq!(format_secs(Duration::from_millis(500)), "0.5");
        assert_eq!(format_secs(Duration::from_secs(4)), "4");
    }
}
