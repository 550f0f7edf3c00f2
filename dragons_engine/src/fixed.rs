//! 16.16 fixed-point helpers shared by line-of-sight stepping and the walk
//! integrator.

pub type Fixed = i64;

pub const FRAC_BITS: u32 = 16;
pub const ONE: Fixed = 1 << FRAC_BITS;
const HALF: Fixed = ONE / 2;

#[inline]
pub const fn from_int(value: i32) -> Fixed {
    (value as Fixed) << FRAC_BITS
}

/// Integer part, rounding toward negative infinity.
#[inline]
pub const fn floor(value: Fixed) -> i32 {
    (value >> FRAC_BITS) as i32
}

/// Nearest pixel, halves rounding up.
#[inline]
pub const fn round(value: Fixed) -> i32 {
    ((value + HALF) >> FRAC_BITS) as i32
}

/// `numerator / denominator` in 16.16 with the sign taken from the numerator,
/// so truncation never flips the direction of a small increment.
#[inline]
pub fn ratio(numerator: i32, denominator: i32) -> Fixed {
    let magnitude = from_int(numerator.abs()) / (denominator.abs() as Fixed);
    if numerator < 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// `(a * b) >> 16`.
#[inline]
pub const fn mul(a: Fixed, b: Fixed) -> Fixed {
    (a * b) >> FRAC_BITS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_and_flooring_differ_on_negative_halves() {
        assert_eq!(round(from_int(3) + HALF), 4);
        assert_eq!(round(from_int(-3) - HALF), -3);
        assert_eq!(floor(from_int(-3) + 1), -3);
        assert_eq!(floor(from_int(-3) - 1), -4);
    }

    #[test]
    fn ratio_keeps_numerator_sign() {
        assert_eq!(ratio(1, 3), 0x5555);
        assert_eq!(ratio(-1, 3), -0x5555);
        assert_eq!(ratio(-1, -3), -0x5555);
        assert_eq!(ratio(0, 7), 0);
    }

    #[test]
    fn mul_scales_by_one() {
        assert_eq!(mul(from_int(5), ONE), from_int(5));
        assert_eq!(mul(from_int(5), ONE / 2), from_int(5) / 2);
    }
}
