// src/ledger.rs
//
// All money math lives here. Every amount that reaches persistence has
// passed through `round_money`, so rounding cannot drift between the
// negotiation, invoicing, and settlement paths.

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// GST rate applied when a project opts in.
pub const GST_RATE: Decimal = dec!(0.10);

/// Round half-up to 2 decimal places.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// GST on a pre-tax base: `(gst_amount, total_amount)`.
pub fn split_gst(base: Decimal, gst_enabled: bool) -> (Decimal, Decimal) {
    let gst_amount = if gst_enabled {
        round_money(base * GST_RATE)
    } else {
        Decimal::ZERO
    };
    (gst_amount, round_money(base + gst_amount))
}

/// Price an offer from the partner's proposed cost and the admin's margin
/// percentage: `(admin_margin, offer_price)`. The margin is taken pre-GST;
/// GST, when enabled, applies to the full subtotal.
pub fn compute_offer(
    partner_cost: Decimal,
    margin_pct: Decimal,
    gst_enabled: bool,
) -> (Decimal, Decimal) {
    let admin_margin = round_money(partner_cost * margin_pct / dec!(100));
    let subtotal = partner_cost + admin_margin;
    let (_, offer_price) = split_gst(subtotal, gst_enabled);
    (admin_margin, offer_price)
}

/// Share of `value` attributable to `part` out of `whole`. Used to prorate
/// invoice GST across partial payments.
pub fn prorate(part: Decimal, whole: Decimal, value: Decimal) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    round_money(value * part / whole)
}

/// Month key for the revenue rollup, e.g. "2025-08".
pub fn revenue_month(now: DateTime<Utc>) -> String {
    format!("{:04}-{:02}", now.year(), now.month())
}

/// Quarter key for the GST rollup, e.g. "Q3 2025".
pub fn gst_period(now: DateTime<Utc>) -> String {
    format!("Q{} {}", (now.month0() / 3) + 1, now.year())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_up() {
        assert_eq!(round_money(dec!(1.005)), dec!(1.01));
        assert_eq!(round_money(dec!(1.004)), dec!(1.00));
        assert_eq!(round_money(dec!(-1.005)), dec!(-1.01));
    }

    #[test]
    fn gst_split_when_enabled() {
        let (gst, total) = split_gst(dec!(1100), true);
        assert_eq!(gst, dec!(110.00));
        assert_eq!(total, dec!(1210.00));
    }

    #[test]
    fn gst_split_when_disabled() {
        let (gst, total) = split_gst(dec!(1100), false);
        assert_eq!(gst, Decimal::ZERO);
        assert_eq!(total, dec!(1100.00));
    }

    #[test]
    fn offer_without_gst() {
        // 800 at 20% margin prices out at 960.
        let (margin, offer) = compute_offer(dec!(800), dec!(20), false);
        assert_eq!(margin, dec!(160.00));
        assert_eq!(offer, dec!(960.00));
    }

    #[test]
    fn offer_with_gst() {
        let (margin, offer) = compute_offer(dec!(800), dec!(20), true);
        assert_eq!(margin, dec!(160.00));
        assert_eq!(offer, dec!(1056.00));
    }

    #[test]
    fn margin_identity_holds() {
        // margin == offer - partner_cost pre-GST
        let (margin, offer) = compute_offer(dec!(1234.56), dec!(15), false);
        assert_eq!(offer - dec!(1234.56), margin);
    }

    #[test]
    fn prorates_partial_share() {
        assert_eq!(prorate(dec!(605), dec!(1210), dec!(110)), dec!(55.00));
        assert_eq!(prorate(dec!(100), Decimal::ZERO, dec!(110)), Decimal::ZERO);
    }

    #[test]
    fn period_keys() {
        let t = DateTime::parse_from_rfc3339("2025-08-07T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(revenue_month(t), "2025-08");
        assert_eq!(gst_period(t), "Q3 2025");
    }
}
