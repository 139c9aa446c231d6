//! Derived monetary fields for invoices and their line items.
//!
//! CRITICAL: Never use floating-point for money calculations.
//!
//! A line's `amount` is exactly `quantity * unit_price + tax_amount`. Lines
//! whose net does not come to whole cents are rejected rather than rounded.
//! An invoice's `subtotal` is the sum of its line amounts and
//! `total_amount = subtotal + tax_amount - discount_amount`, where the
//! header-level tax and discount are supplied by the caller.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of decimal places stored for money columns.
pub const MONEY_SCALE: u32 = 2;

/// Number of decimal places stored for line quantities.
pub const QUANTITY_SCALE: u32 = 3;

/// Errors raised while deriving or checking monetary fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TotalsError {
    /// Line quantity must be strictly positive.
    #[error("Quantity must be greater than zero, got {0}")]
    NonPositiveQuantity(Decimal),

    /// Unit price cannot be negative.
    #[error("Unit price cannot be negative, got {0}")]
    NegativeUnitPrice(Decimal),

    /// Tax cannot be negative.
    #[error("Tax amount cannot be negative, got {0}")]
    NegativeTax(Decimal),

    /// Discount cannot be negative.
    #[error("Discount amount cannot be negative, got {0}")]
    NegativeDiscount(Decimal),

    /// Discount larger than subtotal plus tax would produce a negative total.
    #[error("Discount {discount} exceeds subtotal plus tax {gross}")]
    DiscountExceedsGross {
        /// Requested discount.
        discount: Decimal,
        /// Subtotal plus tax.
        gross: Decimal,
    },

    /// Caller-supplied value disagrees with the derived one.
    #[error("Supplied {field} {claimed} does not match derived value {derived}")]
    ClaimMismatch {
        /// Name of the field that was claimed.
        field: &'static str,
        /// Value supplied by the caller.
        claimed: Decimal,
        /// Value derived from the inputs.
        derived: Decimal,
    },

    /// Value carries more decimal places than its column stores.
    #[error("{field} {value} has more than {max} decimal places")]
    ExcessScale {
        /// Offending field.
        field: &'static str,
        /// Value as given.
        value: Decimal,
        /// Decimal places the column stores.
        max: u32,
    },

    /// `quantity * unit_price` is not a whole number of cents.
    #[error("Line net {0} is not a whole number of cents")]
    FractionalCents(Decimal),

    /// Arithmetic overflowed the decimal range.
    #[error("Monetary arithmetic overflow")]
    Overflow,
}

/// Rounds an amount to cents, half away from zero.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Validated inputs of a line together with its derived amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAmounts {
    /// Quantity (> 0).
    pub quantity: Decimal,
    /// Unit price (>= 0).
    pub unit_price: Decimal,
    /// Line tax (>= 0).
    pub tax_amount: Decimal,
    /// `quantity * unit_price + tax_amount`.
    pub amount: Decimal,
}

/// Derives the amount of a single invoice or template line.
///
/// # Errors
///
/// Returns an error if quantity is not positive, price or tax is negative,
/// any input has more decimal places than its column, the net is not whole
/// cents, or the product overflows.
pub fn line_amount(
    quantity: Decimal,
    unit_price: Decimal,
    tax_amount: Decimal,
) -> Result<LineAmounts, TotalsError> {
    if quantity <= Decimal::ZERO {
        return Err(TotalsError::NonPositiveQuantity(quantity));
    }
    if unit_price < Decimal::ZERO {
        return Err(TotalsError::NegativeUnitPrice(unit_price));
    }
    if tax_amount < Decimal::ZERO {
        return Err(TotalsError::NegativeTax(tax_amount));
    }
    check_scale("quantity", quantity, QUANTITY_SCALE)?;
    check_scale("unit_price", unit_price, MONEY_SCALE)?;
    check_scale("tax_amount", tax_amount, MONEY_SCALE)?;

    let net = quantity
        .checked_mul(unit_price)
        .ok_or(TotalsError::Overflow)?
        .normalize();
    if net.scale() > MONEY_SCALE {
        return Err(TotalsError::FractionalCents(net));
    }
    let amount = net.checked_add(tax_amount).ok_or(TotalsError::Overflow)?;

    Ok(LineAmounts {
        quantity,
        unit_price,
        tax_amount,
        amount,
    })
}

/// Trailing zeros do not count: `2.500` fits a two-place column.
fn check_scale(field: &'static str, value: Decimal, max: u32) -> Result<(), TotalsError> {
    if value.normalize().scale() > max {
        return Err(TotalsError::ExcessScale { field, value, max });
    }
    Ok(())
}

/// Header totals of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    /// Sum of line amounts.
    pub subtotal: Decimal,
    /// Header-level tax.
    pub tax_amount: Decimal,
    /// Header-level discount.
    pub discount_amount: Decimal,
    /// `subtotal + tax_amount - discount_amount`.
    pub total_amount: Decimal,
}

impl InvoiceTotals {
    /// Derives totals from line amounts and the header tax and discount.
    ///
    /// # Errors
    ///
    /// Returns an error if tax or discount is negative, the discount exceeds
    /// subtotal plus tax, or the sum overflows.
    pub fn derive<I>(
        line_amounts: I,
        tax_amount: Decimal,
        discount_amount: Decimal,
    ) -> Result<Self, TotalsError>
    where
        I: IntoIterator<Item = Decimal>,
    {
        if tax_amount < Decimal::ZERO {
            return Err(TotalsError::NegativeTax(tax_amount));
        }
        if discount_amount < Decimal::ZERO {
            return Err(TotalsError::NegativeDiscount(discount_amount));
        }

        let subtotal = line_amounts
            .into_iter()
            .try_fold(Decimal::ZERO, Decimal::checked_add)
            .ok_or(TotalsError::Overflow)?;
        let tax_amount = round_money(tax_amount);
        let discount_amount = round_money(discount_amount);

        let gross = subtotal
            .checked_add(tax_amount)
            .ok_or(TotalsError::Overflow)?;
        if discount_amount > gross {
            return Err(TotalsError::DiscountExceedsGross {
                discount: discount_amount,
                gross,
            });
        }

        Ok(Self {
            subtotal,
            tax_amount,
            discount_amount,
            total_amount: gross - discount_amount,
        })
    }

    /// Totals of an invoice without lines.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            subtotal: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
        }
    }

    /// Returns true if `total_amount = subtotal + tax_amount - discount_amount`.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.total_amount == self.subtotal + self.tax_amount - self.discount_amount
    }

    /// Checks caller-supplied subtotal and total against the derived values.
    ///
    /// `None` means the caller made no claim.
    ///
    /// # Errors
    ///
    /// Returns `ClaimMismatch` for the first claim that disagrees.
    pub fn verify_claims(
        &self,
        claimed_subtotal: Option<Decimal>,
        claimed_total: Option<Decimal>,
    ) -> Result<(), TotalsError> {
        for (field, claimed, derived) in [
            ("subtotal", claimed_subtotal, self.subtotal),
            ("total_amount", claimed_total, self.total_amount),
        ] {
            if let Some(claimed) = claimed
                && claimed != derived
            {
                return Err(TotalsError::ClaimMismatch {
                    field,
                    claimed,
                    derived,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(2), dec!(10.00), dec!(0), dec!(20.00))]
    #[case(dec!(1), dec!(99.99), dec!(10.00), dec!(109.99))]
    #[case(dec!(1.5), dec!(3.34), dec!(0), dec!(5.01))]
    #[case(dec!(0.25), dec!(80.00), dec!(0.50), dec!(20.50))]
    #[case(dec!(3), dec!(0), dec!(1.25), dec!(1.25))]
    fn test_line_amount(
        #[case] quantity: Decimal,
        #[case] unit_price: Decimal,
        #[case] tax: Decimal,
        #[case] expected: Decimal,
    ) {
        let line = line_amount(quantity, unit_price, tax).unwrap();
        assert_eq!(line.amount, expected);
    }

    #[test]
    fn test_line_amount_rejects_bad_input() {
        assert_eq!(
            line_amount(dec!(0), dec!(1), dec!(0)),
            Err(TotalsError::NonPositiveQuantity(dec!(0)))
        );
        assert_eq!(
            line_amount(dec!(1), dec!(-1), dec!(0)),
            Err(TotalsError::NegativeUnitPrice(dec!(-1)))
        );
        assert_eq!(
            line_amount(dec!(1), dec!(1), dec!(-0.5)),
            Err(TotalsError::NegativeTax(dec!(-0.5)))
        );
    }

    #[test]
    fn test_line_amount_matches_stored_columns() {
        assert_eq!(
            line_amount(dec!(3), dec!(10.005), dec!(0)),
            Err(TotalsError::ExcessScale {
                field: "unit_price",
                value: dec!(10.005),
                max: 2,
            })
        );
        assert!(matches!(
            line_amount(dec!(1.0005), dec!(10), dec!(0)),
            Err(TotalsError::ExcessScale { field: "quantity", .. })
        ));
        assert!(matches!(
            line_amount(dec!(1), dec!(10), dec!(0.001)),
            Err(TotalsError::ExcessScale { field: "tax_amount", .. })
        ));
        assert_eq!(
            line_amount(dec!(1.5), dec!(3.33), dec!(0)),
            Err(TotalsError::FractionalCents(dec!(4.995)))
        );

        // Trailing zeros are not extra precision.
        let line = line_amount(dec!(2.000), dec!(10.500), dec!(0)).unwrap();
        assert_eq!(line.amount, dec!(21));
        assert_eq!(line.amount, line.quantity * line.unit_price + line.tax_amount);
    }

    #[test]
    fn test_line_amount_overflow() {
        assert_eq!(
            line_amount(Decimal::MAX, dec!(2), dec!(0)),
            Err(TotalsError::Overflow)
        );
    }

    #[test]
    fn test_round_money_half_away_from_zero() {
        assert_eq!(round_money(dec!(2.345)), dec!(2.35));
        assert_eq!(round_money(dec!(-2.345)), dec!(-2.35));
        assert_eq!(round_money(dec!(2.344)), dec!(2.34));
    }

    #[test]
    fn test_derive_totals() {
        let totals =
            InvoiceTotals::derive([dec!(20.00), dec!(109.99)], dec!(5.00), dec!(10.00)).unwrap();
        assert_eq!(totals.subtotal, dec!(129.99));
        assert_eq!(totals.total_amount, dec!(124.99));
        assert!(totals.is_consistent());
    }

    #[test]
    fn test_derive_totals_without_lines() {
        let totals = InvoiceTotals::derive([], dec!(0), dec!(0)).unwrap();
        assert_eq!(totals, InvoiceTotals::empty());
    }

    #[test]
    fn test_discount_cannot_exceed_gross() {
        let err = InvoiceTotals::derive([dec!(10)], dec!(1), dec!(12)).unwrap_err();
        assert_eq!(
            err,
            TotalsError::DiscountExceedsGross {
                discount: dec!(12),
                gross: dec!(11),
            }
        );
    }

    #[test]
    fn test_negative_header_amounts_rejected() {
        assert!(matches!(
            InvoiceTotals::derive([dec!(10)], dec!(-1), dec!(0)),
            Err(TotalsError::NegativeTax(_))
        ));
        assert!(matches!(
            InvoiceTotals::derive([dec!(10)], dec!(0), dec!(-1)),
            Err(TotalsError::NegativeDiscount(_))
        ));
    }

    #[test]
    fn test_verify_claims() {
        let totals = InvoiceTotals::derive([dec!(50)], dec!(5), dec!(0)).unwrap();
        assert!(totals.verify_claims(None, None).is_ok());
        assert!(totals.verify_claims(Some(dec!(50.00)), Some(dec!(55))).is_ok());

        let err = totals.verify_claims(None, Some(dec!(60))).unwrap_err();
        assert_eq!(
            err,
            TotalsError::ClaimMismatch {
                field: "total_amount",
                claimed: dec!(60),
                derived: dec!(55),
            }
        );
    }

    #[test]
    fn test_inconsistent_totals_detected() {
        let totals = InvoiceTotals {
            subtotal: dec!(10),
            tax_amount: dec!(1),
            discount_amount: dec!(0),
            total_amount: dec!(12),
        };
        assert!(!totals.is_consistent());
    }
}
