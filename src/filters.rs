use askama::Result;
use rust_decimal::{Decimal, RoundingStrategy};

/// Formats an amount with thousands separators and two decimals: `1234.5` -> `1,234.50`.
#[allow(clippy::unnecessary_wraps)]
pub fn money(value: &Decimal) -> Result<String> {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.2}", rounded.abs());
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    Ok(format!("{}{}.{}", sign, grouped, fraction))
}
