// Utils module

/// Convert a currency amount to minor units (cents).
///
/// Amount equality is always compared at minor-unit precision so that
/// float drift (49.990000000001 vs 49.99) never produces a false mismatch
/// or a false match against a genuinely different amount.
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Whether two amounts agree at minor-unit precision.
pub fn amounts_match(claimed: f64, confirmed: f64) -> bool {
    to_minor_units(claimed) == to_minor_units(confirmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minor_units_round_half_up() {
        assert_eq!(to_minor_units(50.0), 5000);
        assert_eq!(to_minor_units(49.99), 4999);
        assert_eq!(to_minor_units(0.1 + 0.2), 30);
    }

    #[test]
    fn near_equal_amounts_match() {
        assert!(amounts_match(50.0, 50.000000000001));
        assert!(amounts_match(0.3, 0.1 + 0.2));
    }

    #[test]
    fn one_cent_off_does_not_match() {
        assert!(!amounts_match(50.00, 49.99));
    }
}
