//! Property-based tests for composition item-count bounds.

use proptest::prelude::*;

use super::count::{CountMode, check_bounds};

// Bounds are inclusive: a count is accepted exactly when it lies within
// the bounds that apply to the mode.
proptest! {
    #[test]
    fn prop_bounds_are_inclusive(
        actual in 0u64..20,
        min in proptest::option::of(0u64..10),
        max in proptest::option::of(0u64..10),
    ) {
        let max_ok = max.is_none_or(|m| actual <= m);
        let min_ok = min.is_none_or(|m| actual >= m);

        prop_assert_eq!(
            check_bounds("E.c", actual, min, max, CountMode::MaxOnly).is_ok(),
            max_ok
        );
        prop_assert_eq!(
            check_bounds("E.c", actual, min, max, CountMode::Both).is_ok(),
            max_ok && min_ok
        );
    }
}
