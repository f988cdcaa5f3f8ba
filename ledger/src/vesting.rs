//! Linear vesting math.

use streamledger_common::{Amount, Result, StreamError, Timestamp};

/// Amount of `total` vested at `now` for a stream of `length` seconds that
/// started at `start_time`.
///
/// Vesting is linear with floor division. Nothing is vested before
/// `start_time`; everything is vested from `start_time + length` on. The end
/// time is computed in `u128`, so a stream whose end lies past `u64::MAX`
/// simply never fully vests.
pub fn vested_amount(
    total: Amount,
    start_time: Timestamp,
    length: u64,
    now: Timestamp,
) -> Result<Amount> {
    let end = start_time as u128 + length as u128;

    if now as u128 >= end {
        return Ok(total);
    }

    // now < end implies length > 0
    let elapsed = now.saturating_sub(start_time) as u128;
    let vested = (total as u128)
        .checked_mul(elapsed)
        .ok_or(StreamError::ArithmeticOverflow("vested amount"))?
        / length as u128;

    Amount::try_from(vested).map_err(|_| StreamError::ArithmeticOverflow("vested amount"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const T: Timestamp = 1_700_000_000;

    #[test]
    fn test_linear_vesting_points() {
        assert_eq!(vested_amount(1000, T, 100, T).unwrap(), 0);
        assert_eq!(vested_amount(1000, T, 100, T + 50).unwrap(), 500);
        assert_eq!(vested_amount(1000, T, 100, T + 100).unwrap(), 1000);
        assert_eq!(vested_amount(1000, T, 100, T + 10_000).unwrap(), 1000);
    }

    #[test]
    fn test_floor_division() {
        // 10 * 1 / 3 = 3.33..
        assert_eq!(vested_amount(10, T, 3, T + 1).unwrap(), 3);
        assert_eq!(vested_amount(10, T, 3, T + 2).unwrap(), 6);
    }

    #[test]
    fn test_clock_before_start_vests_nothing() {
        assert_eq!(vested_amount(1000, T, 100, T - 5).unwrap(), 0);
    }

    #[test]
    fn test_large_totals_do_not_wrap() {
        let total = u64::MAX;
        let half = vested_amount(total, T, 2, T + 1).unwrap();
        assert_eq!(half, u64::MAX / 2);
    }

    #[test]
    fn test_end_time_past_u64_max() {
        assert_eq!(vested_amount(1000, u64::MAX - 10, 100, u64::MAX - 5).unwrap(), 50);
        assert_eq!(vested_amount(1000, T, u64::MAX, T + 5).unwrap(), 0);
        assert_eq!(vested_amount(1000, T, u64::MAX, u64::MAX).unwrap(), 999);
    }

    proptest! {
        #[test]
        fn prop_vesting_is_monotonic_and_bounded(
            total in any::<u64>(),
            length in 1u64..10_000_000,
            a in 0u64..20_000_000,
            b in 0u64..20_000_000,
        ) {
            let (earlier, later) = if a <= b { (a, b) } else { (b, a) };
            let v1 = vested_amount(total, T, length, T + earlier).unwrap();
            let v2 = vested_amount(total, T, length, T + later).unwrap();

            prop_assert!(v1 <= v2);
            prop_assert!(v2 <= total);
        }
    }
}
