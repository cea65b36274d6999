//! Key/value attribute harvesting.
//!
//! Product pages expose the same facts (dimensions, weight, material,
//! colour) in several tables with slightly different labels. Keys are
//! classified by [`KEY_RULES`]; dimension strings are parsed by
//! [`DIMENSION_RULES`], tried in order, first match wins.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::text::remove_invisible;
use super::units::{normalize_weight, two_decimals};
use crate::events::LogSink;
use crate::models::AttributeMap;

const CM_PER_INCH: f64 = 2.54;

/// What a recognized key contributes to the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Parsed into `L`, `W`, `H` and possibly `Weight`.
    Dimensions,
    /// Normalized into `Item Weight`.
    ItemWeight,
    /// Copied under the key itself.
    Verbatim,
}

static KEY_RULES: LazyLock<Vec<(Regex, FieldKind)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"(?i)Item dimensions L x W x H|Product dimensions|Package Dimensions")
                .unwrap(),
            FieldKind::Dimensions,
        ),
        (Regex::new(r"(?i)item weight").unwrap(), FieldKind::ItemWeight),
        (Regex::new(r"^(?:Material|Colour)$").unwrap(), FieldKind::Verbatim),
    ]
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LengthUnit {
    /// Converted to centimetres with two decimals.
    Inches,
    /// Rounded to whole centimetres.
    Centimetres,
}

/// One way of reading a dimensions string.
struct DimensionRule {
    name: &'static str,
    pattern: Regex,
    unit: LengthUnit,
    has_height: bool,
    has_weight: bool,
}

static DIMENSION_RULES: LazyLock<Vec<DimensionRule>> = LazyLock::new(|| {
    vec![
        // 5"L x 3"W
        DimensionRule {
            name: "inches-lw",
            pattern: Regex::new(r#"(\d+(?:\.\d+)?)"?L x (\d+(?:\.\d+)?)"?W"#).unwrap(),
            unit: LengthUnit::Inches,
            has_height: false,
            has_weight: false,
        },
        // 9.72 x 5.87 x 0.75 inches; 2.89 Pounds
        DimensionRule {
            name: "inches-lwh-weight",
            pattern: Regex::new(
                r"(?i)(\d+(?:\.\d+)?) x (\d+(?:\.\d+)?) x (\d+(?:\.\d+)?) inches;\s*([^;]+)",
            )
            .unwrap(),
            unit: LengthUnit::Inches,
            has_height: true,
            has_weight: true,
        },
        // 10.2 x 6.1 x 0.7 cm; 100 Grams
        DimensionRule {
            name: "cm-lwh-weight",
            pattern: Regex::new(
                r"(?i)(\d+(?:\.\d+)?)\s*x\s*(\d+(?:\.\d+)?)\s*x\s*(\d+(?:\.\d+)?)\s*cm;\s*([^;]+)",
            )
            .unwrap(),
            unit: LengthUnit::Centimetres,
            has_height: true,
            has_weight: true,
        },
    ]
});

impl DimensionRule {
    fn length(&self, caps: &Captures<'_>, group: usize) -> Option<String> {
        let value: f64 = caps.get(group)?.as_str().parse().ok()?;
        Some(match self.unit {
            LengthUnit::Inches => two_decimals(value * CM_PER_INCH),
            LengthUnit::Centimetres => format!("{}", value.round() as i64),
        })
    }

    fn apply(&self, caps: &Captures<'_>, out: &mut AttributeMap, log: &dyn LogSink) {
        if let Some(l) = self.length(caps, 1) {
            out.set("L", l);
        }
        if let Some(w) = self.length(caps, 2) {
            out.set("W", w);
        }
        if self.has_height {
            if let Some(h) = self.length(caps, 3) {
                out.set("H", h);
            }
        }
        if self.has_weight {
            if let Some(rest) = caps.get(4) {
                out.set("Weight", normalize_weight(rest.as_str(), log));
            }
        }
    }
}

/// Classify a raw key. A key may fall under several kinds.
pub fn classify_key(key: &str) -> Vec<FieldKind> {
    KEY_RULES
        .iter()
        .filter(|(pattern, _)| pattern.is_match(key))
        .map(|(_, kind)| *kind)
        .collect()
}

/// Parse a dimensions string with the first matching rule.
///
/// Returns the name of the rule that matched, if any.
pub fn parse_dimensions(
    value: &str,
    out: &mut AttributeMap,
    log: &dyn LogSink,
) -> Option<&'static str> {
    let value = remove_invisible(value);
    for rule in DIMENSION_RULES.iter() {
        if let Some(caps) = rule.pattern.captures(&value) {
            rule.apply(&caps, out, log);
            return Some(rule.name);
        }
    }
    None
}

/// Accumulates attributes from several page regions.
///
/// Regions are absorbed in priority order: a later region overwrites
/// fields already set by an earlier one.
pub struct AttributeRebuilder<'a> {
    map: AttributeMap,
    log: &'a dyn LogSink,
}

impl<'a> AttributeRebuilder<'a> {
    pub fn new(log: &'a dyn LogSink) -> Self {
        Self {
            map: AttributeMap::new(),
            log,
        }
    }

    /// Fold one region's parallel key/value sequences into the map.
    ///
    /// Iterates over `keys`; a key without a value sees an empty string.
    pub fn absorb(&mut self, keys: &[String], values: &[String]) {
        for (i, key) in keys.iter().enumerate() {
            let value = values.get(i).map(String::as_str).unwrap_or("");
            for kind in classify_key(key) {
                match kind {
                    FieldKind::Dimensions => {
                        parse_dimensions(value, &mut self.map, self.log);
                    }
                    FieldKind::ItemWeight => {
                        self.map.set("Item Weight", normalize_weight(value, self.log));
                    }
                    FieldKind::Verbatim => {
                        self.map.set(key.as_str(), value);
                    }
                }
            }
        }
    }

    pub fn finish(self) -> AttributeMap {
        self.map
    }
}

/// Single-region convenience wrapper around [`AttributeRebuilder`].
pub fn rebuild_key_value(keys: &[String], values: &[String], log: &dyn LogSink) -> AttributeMap {
    let mut rebuilder = AttributeRebuilder::new(log);
    rebuilder.absorb(keys, values);
    rebuilder.finish()
}
