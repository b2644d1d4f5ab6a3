use proptest::prelude::*;
use risk::{fees, max_affordable_quantity};
use rust_decimal::Decimal;

fn cents(value: u64) -> Decimal {
    Decimal::new(value as i64, 2)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn buy_fees_never_below_sell_fees(value in 1u64..1_000_000_000) {
        let v = cents(value);
        prop_assert!(fees(v, true) >= fees(v, false));
    }

    #[test]
    fn fees_are_non_decreasing(a in 0u64..1_000_000_000, b in 0u64..1_000_000_000) {
        let (lo, hi) = if a <= b { (cents(a), cents(b)) } else { (cents(b), cents(a)) };
        prop_assert!(fees(lo, true) <= fees(hi, true));
        prop_assert!(fees(lo, false) <= fees(hi, false));
    }

    #[test]
    fn affordable_quantity_respects_budget(budget in 1u64..10_000_000, price in 1u64..1_000_000) {
        let budget = cents(budget);
        let price = cents(price);
        let qty = max_affordable_quantity(budget, price);

        let value = price * Decimal::from(qty);
        prop_assert!(value + fees(value, true) <= budget || qty == 0);

        let next = price * Decimal::from(qty + 1);
        prop_assert!(next + fees(next, true) > budget);
    }
}
