//! Grace window and sleep computations.

use std::time::Duration;

// Share of the TTL that forms the lower bound of the grace window.
const GRACE_FRACTION: u32 = 10;

fn unit(r: f64) -> f64 {
    if r.is_finite() {
        r.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Grace window for `ttl`: uniformly in `[g, 2g)` where `g` is 10% of `ttl`.
pub(super) fn grace_window(ttl: Duration, r: f64) -> Duration {
    let g = ttl / GRACE_FRACTION;
    g + g.mul_f64(unit(r))
}

/// Time to sleep before the next renewal: two thirds of the TTL plus a third
/// of the grace window, scaled by a factor in `[0.5, 1)`.
pub(super) fn sleep_before_renewal(ttl: Duration, grace: Duration, r: f64) -> Duration {
    let target = (ttl - ttl / 3) + grace / 3;
    target.mul_f64(0.5 + unit(r) / 2.0)
}

/// Whether the watcher should exit instead of sleeping: either the TTL is
/// already inside the grace window, or sleeping would land inside it.
pub(super) fn within_grace(ttl: Duration, grace: Duration, sleep: Duration) -> bool {
    ttl <= grace || ttl.saturating_sub(sleep) <= grace
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_grace_window_bounds() {
        assert_eq!(grace_window(HOUR, 0.0), Duration::from_secs(360));
        assert_eq!(grace_window(HOUR, 0.5), Duration::from_secs(540));
        assert!(grace_window(HOUR, 0.999_999) < Duration::from_secs(720));
    }

    #[test]
    fn test_grace_window_of_zero_ttl_is_zero() {
        assert_eq!(grace_window(Duration::ZERO, 0.7), Duration::ZERO);
    }

    #[test]
    fn test_sleep_is_two_thirds_plus_grace_third_scaled() {
        let grace = Duration::from_secs(360);
        // 2400 + 120
        assert_eq!(
            sleep_before_renewal(HOUR, grace, 1.0),
            Duration::from_secs(2520)
        );
        assert_eq!(
            sleep_before_renewal(HOUR, grace, 0.0),
            Duration::from_secs(1260)
        );
    }

    #[test]
    fn test_out_of_range_randomness_is_clamped() {
        let grace = Duration::from_secs(360);
        assert_eq!(grace_window(HOUR, f64::NAN), Duration::from_secs(360));
        assert_eq!(
            sleep_before_renewal(HOUR, grace, -3.0),
            Duration::from_secs(1260)
        );
    }

    #[test]
    fn test_within_grace() {
        let grace = Duration::from_secs(10);
        assert!(within_grace(Duration::from_secs(10), grace, Duration::ZERO));
        assert!(within_grace(
            Duration::from_secs(15),
            grace,
            Duration::from_secs(6)
        ));
        assert!(!within_grace(HOUR, grace, Duration::from_secs(2400)));
        assert!(within_grace(Duration::ZERO, Duration::ZERO, Duration::ZERO));
    }
}
