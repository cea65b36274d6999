//! Weight normalization to kilograms.
//!
//! Units are recognized by an ordered rule table; the first rule whose
//! suffix pattern matches decides the conversion.

use std::sync::LazyLock;

use regex::Regex;

use super::text::remove_invisible;
use crate::events::LogSink;

/// How a matched value becomes kilograms.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Conversion {
    /// Multiply and round to two decimals.
    Factor(f64),
    /// Divide and round to two decimals.
    Divisor(f64),
    /// Already kilograms; keep the number as written.
    PassThrough,
}

struct WeightRule {
    unit: Regex,
    conversion: Conversion,
}

const OUNCE_KG: f64 = 0.028349523125;
const POUND_KG: f64 = 0.45359237;

static WEIGHT_RULES: LazyLock<Vec<WeightRule>> = LazyLock::new(|| {
    vec![
        WeightRule {
            unit: Regex::new(r"(?i) Grams$| g$").unwrap(),
            conversion: Conversion::Divisor(1000.0),
        },
        WeightRule {
            unit: Regex::new(r"(?i) Kilograms| kg$").unwrap(),
            conversion: Conversion::PassThrough,
        },
        WeightRule {
            unit: Regex::new(r"(?i) ounces$").unwrap(),
            conversion: Conversion::Factor(OUNCE_KG),
        },
        WeightRule {
            unit: Regex::new(r"(?i) pounds$").unwrap(),
            conversion: Conversion::Factor(POUND_KG),
        },
    ]
});

static LEADING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d[\d,]*(?:\.\d+)?)").unwrap());

/// Convert a weight such as `"2.89 Pounds"` to kilograms.
///
/// Returns an empty string (after one diagnostic) when the unit is not
/// recognized or no number precedes it.
pub fn normalize_weight(raw: &str, log: &dyn LogSink) -> String {
    let cleaned = remove_invisible(raw);
    let cleaned = cleaned.trim();

    let Some(rule) = WEIGHT_RULES.iter().find(|r| r.unit.is_match(cleaned)) else {
        log.diagnostic(&format!("Unknown weight unit: {}", cleaned));
        return String::new();
    };

    let Some(number) = LEADING_NUMBER
        .captures(cleaned)
        .map(|c| c[1].replace(',', ""))
    else {
        log.diagnostic(&format!("Unreadable weight value: {}", cleaned));
        return String::new();
    };

    if rule.conversion == Conversion::PassThrough {
        return number;
    }
    let Ok(value) = number.parse::<f64>() else {
        log.diagnostic(&format!("Unreadable weight value: {}", cleaned));
        return String::new();
    };
    match rule.conversion {
        Conversion::Factor(factor) => two_decimals(value * factor),
        Conversion::Divisor(divisor) => two_decimals(value / divisor),
        Conversion::PassThrough => number,
    }
}

/// Two fixed decimals, with halves rounded away from zero.
pub(crate) fn two_decimals(value: f64) -> String {
    format!("{:.2}", (value * 100.0).round() / 100.0)
}
