use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

pub const MINOR_UNIT_PLACES: u32 = 2;

/// Rounds to the currency minor unit. Only used when presenting values; stored
/// amounts keep full precision.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MINOR_UNIT_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

pub fn format_money(amount: Decimal) -> String {
    format!("{:.2}", round_money(amount))
}

/// Quantities are shown without trailing zeros.
pub fn format_quantity(quantity: Decimal) -> String {
    quantity.normalize().to_string()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// Presentation-only tax line; `tax_rate` is a fraction such as `0.07`.
/// `None` when the taxed total does not fit in a `Decimal`.
pub fn apply_tax(subtotal: Decimal, tax_rate: Decimal) -> Option<TaxBreakdown> {
    let subtotal = round_money(subtotal);
    let tax = round_money(subtotal.checked_mul(tax_rate)?);
    let total = subtotal.checked_add(tax)?;
    Some(TaxBreakdown { subtotal, tax_rate, tax, total })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{apply_tax, format_money, format_quantity, round_money};

    #[test]
    fn rounds_midpoint_away_from_zero() {
        assert_eq!(round_money(Decimal::new(12345, 3)), Decimal::new(1235, 2));
        assert_eq!(round_money(Decimal::new(-12345, 3)), Decimal::new(-1235, 2));
        assert_eq!(round_money(Decimal::new(12344, 3)), Decimal::new(1234, 2));
    }

    #[test]
    fn formats_with_two_places() {
        assert_eq!(format_money(Decimal::from(120)), "120.00");
        assert_eq!(format_money(Decimal::new(10005, 4)), "1.00");
        assert_eq!(format_quantity(Decimal::new(2400, 2)), "24");
    }

    #[test]
    fn tax_is_computed_on_the_rounded_subtotal() {
        let breakdown = apply_tax(Decimal::new(100_004, 3), Decimal::new(7, 2)).expect("tax");
        assert_eq!(breakdown.subtotal, Decimal::new(10000, 2));
        assert_eq!(breakdown.tax, Decimal::new(700, 2));
        assert_eq!(breakdown.total, Decimal::new(10700, 2));
    }

    #[test]
    fn tax_on_the_largest_amount_does_not_fit() {
        assert!(apply_tax(Decimal::MAX, Decimal::new(7, 2)).is_none());
        assert!(apply_tax(Decimal::MAX, Decimal::ZERO).is_some());
    }
}
