use crate::config::MessageFormat;
use chrono::{Datelike, NaiveDate};

/// Rounds to cents, half away from zero.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// "YYYY-MM" bucket key for a date.
pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

pub fn format_date_dmy(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Formats an amount as `<symbol> <grouped integer><decimal sep><2 decimals>`.
///
/// With the default format `1234.5` renders as `R$ 1.234,50`.
pub fn format_currency(amount: f64, format: &MessageFormat) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let units = (cents / 100).to_string();
    let fraction = cents % 100;

    let mut grouped = String::with_capacity(units.len() + units.len() / 3);
    for (i, digit) in units.chars().enumerate() {
        if i > 0 && (units.len() - i) % 3 == 0 {
            grouped.push(format.thousands_separator);
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!(
        "{} {}{}{}{:02}",
        format.currency_symbol, sign, grouped, format.decimal_separator, fraction
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(875.0000001), 875.0);
        assert_eq!(round_cents(472.125), 472.13);
        assert_eq!(round_cents(-12.5), -12.5);
    }

    #[test]
    fn test_month_key() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(month_key(date), "2024-03");
    }

    #[test]
    fn test_format_currency_grouping() {
        let fmt = MessageFormat::default();
        assert_eq!(format_currency(1234.5, &fmt), "R$ 1.234,50");
        assert_eq!(format_currency(999.99, &fmt), "R$ 999,99");
        assert_eq!(format_currency(1_234_567.891, &fmt), "R$ 1.234.567,89");
        assert_eq!(format_currency(0.0, &fmt), "R$ 0,00");
        assert_eq!(format_currency(-50.0, &fmt), "R$ -50,00");
    }

    #[test]
    fn test_format_date_dmy() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(format_date_dmy(date), "05/03/2024");
    }
}
