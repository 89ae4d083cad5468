use rust_decimal::{Decimal, RoundingStrategy};

const CURRENCY_PREFIX: &str = "Rp ";

/// Rounds to the stored precision (two places), halves away from zero.
pub fn to_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Rounds to whole rupiah, halves away from zero. Used for display and for
/// amounts sent to the gateway.
pub fn whole_rupiah(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Formats an amount as whole rupiah with `.` thousands separators,
/// e.g. `Rp 170.000`.
pub fn format_rupiah(amount: Decimal) -> String {
    let rounded = whole_rupiah(amount);
    let digits = rounded.abs().trunc().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("-{}{}", CURRENCY_PREFIX, grouped)
    } else {
        format!("{}{}", CURRENCY_PREFIX, grouped)
    }
}
