//! Property-based tests for derived invoice totals.

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::totals::{InvoiceTotals, TotalsError, line_amount};

/// Strategy for a money amount from 0.00 to 100,000.00.
fn money() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy for a quantity from 0.001 to 1,000.000.
fn quantity() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|milli| Decimal::new(milli, 3))
}

/// Strategy for a whole quantity from 1 to 1,000.
fn whole_quantity() -> impl Strategy<Value = Decimal> {
    (1i64..=1_000i64).prop_map(Decimal::from)
}

/// Strategy for a line whose net always comes to whole cents.
fn line() -> impl Strategy<Value = (Decimal, Decimal, Decimal)> {
    (whole_quantity(), money(), money())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Accepted lines satisfy amount = quantity * unit_price + tax exactly and
    /// fit a two-place column; the rest are rejected for sub-cent nets only.
    #[test]
    fn prop_line_amount_is_exact(q in quantity(), p in money(), t in money()) {
        match line_amount(q, p, t) {
            Ok(line) => {
                prop_assert_eq!(line.amount, q * p + t);
                prop_assert!(line.amount >= line.tax_amount);
                prop_assert!(line.amount.normalize().scale() <= 2);
            }
            Err(TotalsError::FractionalCents(net)) => {
                prop_assert_eq!(net, q * p);
                prop_assert!(net.normalize().scale() > 2);
            }
            Err(other) => prop_assert!(false, "unexpected error: {other}"),
        }
    }

    /// Derived totals always satisfy total = subtotal + tax - discount and
    /// subtotal = sum of line amounts.
    #[test]
    fn prop_totals_consistent(
        lines in prop::collection::vec(line(), 0..20),
        tax in money(),
        discount in money(),
    ) {
        let amounts: Vec<Decimal> = lines
            .iter()
            .map(|(q, p, t)| line_amount(*q, *p, *t).unwrap().amount)
            .collect();
        let expected_subtotal: Decimal = amounts.iter().copied().sum();

        match InvoiceTotals::derive(amounts, tax, discount) {
            Ok(totals) => {
                prop_assert!(totals.is_consistent());
                prop_assert_eq!(totals.subtotal, expected_subtotal);
                prop_assert!(totals.total_amount >= Decimal::ZERO);
            }
            Err(TotalsError::DiscountExceedsGross { discount: d, gross }) => {
                prop_assert!(d > gross);
                prop_assert_eq!(gross, expected_subtotal + tax);
            }
            Err(other) => prop_assert!(false, "unexpected error: {other}"),
        }
    }

    /// The derived total is always accepted as a claim; anything else is not.
    #[test]
    fn prop_claims_checked(
        lines in prop::collection::vec(line(), 1..10),
        offset in 1i64..10_000i64,
    ) {
        let amounts = lines
            .iter()
            .map(|(q, p, t)| line_amount(*q, *p, *t).unwrap().amount);
        let totals = InvoiceTotals::derive(amounts, Decimal::ZERO, Decimal::ZERO).unwrap();

        prop_assert!(totals.verify_claims(None, Some(totals.total_amount)).is_ok());
        let wrong = totals.total_amount + Decimal::new(offset, 2);
        prop_assert!(totals.verify_claims(None, Some(wrong)).is_err());
    }
}
