//! Rounding helpers used to compute how much padding a session needs.

use crate::Error;

/// Rounds `n` to a multiple of `k`.
///
/// Zero stays zero and values below `k` become `k`. Otherwise the result is
/// the closest multiple of `k` at or above `n` when `round_up` is set, and at
/// or below `n` when it is not. A zero `k` leaves `n` unchanged.
pub fn closest_multiple(n: u64, k: u64, round_up: bool) -> u64 {
    if n == 0 {
        return 0;
    }
    if k == 0 || n % k == 0 {
        return n;
    }
    if n < k {
        return k;
    }
    let below = (n / k) * k;
    if round_up { below.saturating_add(k) } else { below }
}

/// Rounds `n` to a power of two, never returning less than two.
///
/// With `round_up` the result is the smallest power of two greater than or
/// equal to `n`, else the largest one less than or equal to `n`.
pub fn closest_power_of_two(n: i64, round_up: bool) -> Result<u64, Error> {
    if n < 0 {
        Err(Error::InvalidArgument(format!(
            "cannot round negative value {n} to a power of two"
        )))?;
    }
    let n = n.unsigned_abs();
    if n <= 2 {
        return Ok(2);
    }
    if n.is_power_of_two() || !round_up {
        return Ok(1 << (u64::BITS - 1 - n.leading_zeros()));
    }
    n.checked_next_power_of_two().ok_or_else(|| {
        Error::InvalidArgument(format!("no power of two above {n} fits in 64 bits"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiple_rounding() {
        assert_eq!(closest_multiple(0, 8, true), 0);
        assert_eq!(closest_multiple(3, 8, true), 8);
        assert_eq!(closest_multiple(16, 8, true), 16);
        assert_eq!(closest_multiple(17, 8, true), 24);
        assert_eq!(closest_multiple(17, 1, true), 17);

        assert_eq!(closest_multiple(3, 8, false), 8);
        assert_eq!(closest_multiple(17, 8, false), 16);
        assert_eq!(closest_multiple(23, 8, false), 16);
        assert_eq!(closest_multiple(9, 0, true), 9);
    }

    #[test]
    fn power_of_two_rounding() {
        assert_eq!(closest_power_of_two(0, true).unwrap(), 2);
        assert_eq!(closest_power_of_two(1, true).unwrap(), 2);
        assert_eq!(closest_power_of_two(2, true).unwrap(), 2);
        assert_eq!(closest_power_of_two(3, true).unwrap(), 4);
        assert_eq!(closest_power_of_two(8, true).unwrap(), 8);
        assert_eq!(closest_power_of_two(9, true).unwrap(), 16);
        assert_eq!(closest_power_of_two(1000, true).unwrap(), 1024);

        assert_eq!(closest_power_of_two(9, false).unwrap(), 8);
        assert_eq!(closest_power_of_two(1023, false).unwrap(), 512);
        assert_eq!(closest_power_of_two(1024, false).unwrap(), 1024);
    }

    #[test]
    fn power_of_two_rejects_negative() {
        let r = closest_power_of_two(-1, true);
        assert!(matches!(r, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn power_of_two_overflow() {
        let r = closest_power_of_two(i64::MAX, true);
        // 2^63 still fits in a u64
        assert_eq!(r.unwrap(), 1 << 63);
    }
}
