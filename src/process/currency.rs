use rust_decimal::Decimal;
use std::str::FromStr;

/// Parse a Brazilian-formatted amount (`R$ 1.234,56`) into a decimal.
///
/// Best effort: anything unparsable, blank or absent yields zero.
pub fn parse_brl(raw: Option<&str>) -> Decimal {
    let Some(raw) = raw else {
        return Decimal::ZERO;
    };
    let cleaned: String = raw
        .replace("R$", "")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{00A0}' && *c != '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() {
        return Decimal::ZERO;
    }
    Decimal::from_str(&cleaned)
        .map(|d| d.round_dp(2))
        .unwrap_or(Decimal::ZERO)
}
