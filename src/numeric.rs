//! Locale-tolerant numeric parsing.
//!
//! Labor-market exports mix the Brazilian convention (`1.234,56`) with the
//! English one (`1,234.56`), sometimes within one column. [`parse_decimal`]
//! disambiguates by structure:
//!
//! - both `.` and `,` present: the rightmost separator is the decimal mark
//!   and the other one must form valid thousands groups;
//! - one separator occurring more than once: thousands grouping;
//! - one separator occurring once: thousands grouping only when it is
//!   followed by exactly three digits and preceded by one to three digits
//!   without a leading zero (`1.234` is 1234), otherwise decimal
//!   (`12,50`, `0.125`, `1234.567`).
//!
//! Currency and unit noise (`R$`, `$`, `€`, `£`, `%`, inner spaces, quotes)
//! is stripped first. Parsing never falls back to zero: a token that does
//! not fit these rules is an [`PipelineError::UnparseableNumber`].

use std::{str::FromStr, sync::LazyLock};

use regex::Regex;
use rust_decimal::{Decimal, prelude::ToPrimitive};

use crate::error::{PipelineError, Result};

const NOISE_TOKENS: &[&str] = &["R$", "US$", "$", "€", "£", "%"];

static DOT_GROUPS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}(\.\d{3})*$").expect("valid dot grouping pattern"));
static COMMA_GROUPS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}(,\d{3})*$").expect("valid comma grouping pattern"));
static DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+$").expect("valid digits pattern"));

/// Parses a raw cell into an exact decimal.
pub fn parse_decimal(raw: &str) -> Result<Decimal> {
    let cleaned = strip_noise(raw);
    let (negative, body) = split_sign(&cleaned);
    if body.is_empty() || !body.bytes().any(|b| b.is_ascii_digit()) {
        return Err(PipelineError::unparseable(raw));
    }
    if !body.bytes().all(|b| b.is_ascii_digit() || b == b'.' || b == b',') {
        return Err(PipelineError::unparseable(raw));
    }

    let (integer, fraction) =
        split_separators(body).ok_or_else(|| PipelineError::unparseable(raw))?;
    let mut canonical = String::with_capacity(integer.len() + fraction.len() + 2);
    if negative {
        canonical.push('-');
    }
    if integer.is_empty() {
        canonical.push('0');
    } else {
        canonical.push_str(&integer);
    }
    if !fraction.is_empty() {
        canonical.push('.');
        canonical.push_str(fraction);
    }
    Decimal::from_str(&canonical).map_err(|_| PipelineError::unparseable(raw))
}

/// Like [`parse_decimal`] but maps an empty (after noise stripping) cell to `None`.
pub fn parse_optional_decimal(raw: &str) -> Result<Option<Decimal>> {
    if is_blank(raw) {
        return Ok(None);
    }
    parse_decimal(raw).map(Some)
}

/// Parses a count. Grouped forms such as `1.234` are accepted; fractional
/// values are rejected rather than truncated.
pub fn parse_integer(raw: &str) -> Result<i64> {
    let value = parse_decimal(raw)?;
    if !value.fract().is_zero() {
        return Err(PipelineError::unparseable(raw));
    }
    value.to_i64().ok_or_else(|| PipelineError::unparseable(raw))
}

pub fn parse_year(raw: &str) -> Result<i32> {
    let trimmed = raw.trim();
    if !DIGITS.is_match(trimmed) {
        return Err(PipelineError::unparseable(raw));
    }
    trimmed
        .parse::<i32>()
        .map_err(|_| PipelineError::unparseable(raw))
}

pub fn is_blank(raw: &str) -> bool {
    strip_noise(raw).is_empty()
}

fn strip_noise(raw: &str) -> String {
    let mut value = raw.trim().trim_matches('"').trim().to_string();
    for token in NOISE_TOKENS {
        if value.contains(token) {
            value = value.replace(token, "");
        }
    }
    value.retain(|c| !c.is_whitespace());
    value
}

fn split_sign(value: &str) -> (bool, &str) {
    if value.len() > 2 && value.starts_with('(') && value.ends_with(')') {
        return (true, &value[1..value.len() - 1]);
    }
    if let Some(rest) = value.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = value.strip_prefix('+') {
        (false, rest)
    } else {
        (false, value)
    }
}

/// Returns the integer digits (grouping removed) and the fraction digits.
fn split_separators(body: &str) -> Option<(String, &str)> {
    let dots = body.matches('.').count();
    let commas = body.matches(',').count();

    match (dots, commas) {
        (0, 0) => Some((body.to_string(), "")),
        (d, c) if d > 0 && c > 0 => {
            let dot_pos = body.rfind('.')?;
            let comma_pos = body.rfind(',')?;
            let (decimal, groups, decimal_count) = if dot_pos > comma_pos {
                ('.', &*COMMA_GROUPS, d)
            } else {
                (',', &*DOT_GROUPS, c)
            };
            if decimal_count != 1 {
                return None;
            }
            let (integer, fraction) = body.split_once(decimal)?;
            if !groups.is_match(integer) || !DIGITS.is_match(fraction) {
                return None;
            }
            Some((strip_non_digits(integer), fraction))
        }
        (d, c) => {
            let separator = if d > 0 { '.' } else { ',' };
            let groups = if d > 0 { &*DOT_GROUPS } else { &*COMMA_GROUPS };
            if d + c > 1 {
                return groups.is_match(body).then(|| (strip_non_digits(body), ""));
            }
            let (integer, fraction) = body.split_once(separator)?;
            if fraction.is_empty() || !DIGITS.is_match(fraction) {
                return None;
            }
            if !integer.is_empty() && !DIGITS.is_match(integer) {
                return None;
            }
            let looks_grouped = fraction.len() == 3
                && (1..=3).contains(&integer.len())
                && !integer.starts_with('0');
            if looks_grouped {
                Some((format!("{integer}{fraction}"), ""))
            } else {
                Some((integer.to_string(), fraction))
            }
        }
    }
}

fn strip_non_digits(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    #[test]
    fn both_conventions_parse_to_the_same_value() {
        assert_eq!(parse_decimal("1.234,56").unwrap(), dec("1234.56"));
        assert_eq!(parse_decimal("1,234.56").unwrap(), dec("1234.56"));
        assert_eq!(parse_decimal("12.345.678,9").unwrap(), dec("12345678.9"));
        assert_eq!(parse_decimal("12,345,678.9").unwrap(), dec("12345678.9"));
    }

    #[test]
    fn zero_is_a_value_not_missing() {
        let zero = parse_decimal("0").unwrap();
        assert!(zero.is_zero());
        assert_eq!(parse_optional_decimal("0,00").unwrap(), Some(Decimal::ZERO));
        assert_eq!(parse_optional_decimal("  ").unwrap(), None);
    }

    #[test]
    fn single_separator_heuristics() {
        assert_eq!(parse_decimal("1234,56").unwrap(), dec("1234.56"));
        assert_eq!(parse_decimal("12,5").unwrap(), dec("12.5"));
        assert_eq!(parse_decimal("1.234").unwrap(), dec("1234"));
        assert_eq!(parse_decimal("1,234").unwrap(), dec("1234"));
        assert_eq!(parse_decimal("0.125").unwrap(), dec("0.125"));
        assert_eq!(parse_decimal("1234.567").unwrap(), dec("1234.567"));
        assert_eq!(parse_decimal(".5").unwrap(), dec("0.5"));
        assert_eq!(parse_decimal("1.234.567").unwrap(), dec("1234567"));
    }

    #[test]
    fn strips_currency_and_unit_noise() {
        assert_eq!(parse_decimal(" R$ 2.500,00 ").unwrap(), dec("2500.00"));
        assert_eq!(parse_decimal("\"1 234,5\"").unwrap(), dec("1234.5"));
        assert_eq!(parse_decimal("11,5%").unwrap(), dec("11.5"));
        assert_eq!(parse_decimal("-3,25").unwrap(), dec("-3.25"));
        assert_eq!(parse_decimal("(1.000,00)").unwrap(), dec("-1000"));
    }

    #[test]
    fn rejects_ambiguous_or_garbage_tokens() {
        for token in ["", "abc", "1.2.3", "1,23,4", "1.234,5,6", "1.23,45", "12a", "5.", "-"] {
            assert!(
                matches!(
                    parse_decimal(token),
                    Err(PipelineError::UnparseableNumber { .. })
                ),
                "expected failure for {token:?}"
            );
        }
    }

    #[test]
    fn integers_accept_grouping_but_not_fractions() {
        assert_eq!(parse_integer("1.234").unwrap(), 1234);
        assert_eq!(parse_integer("900").unwrap(), 900);
        assert!(parse_integer("12,5").is_err());
    }

    #[test]
    fn years_are_plain_digits() {
        assert_eq!(parse_year(" 2019 ").unwrap(), 2019);
        assert!(parse_year("2.019").is_err());
        assert!(parse_year("").is_err());
    }
}
