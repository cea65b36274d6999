//! Domain types shared by the extractor, the orchestrator and the sinks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A batch of product URLs to scrape in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeRequest {
    pub urls: Vec<String>,
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Delay between items, in seconds.
    #[serde(rename = "sleepSecond", default)]
    pub sleep_seconds: f64,
}

/// Longest accepted delay between items (one day).
pub const MAX_SLEEP_SECONDS: f64 = 86_400.0;

fn default_headless() -> bool {
    true
}

impl ScrapeRequest {
    pub fn new(urls: Vec<String>, headless: bool, sleep_seconds: f64) -> Self {
        Self {
            urls,
            headless,
            sleep_seconds,
        }
    }

    /// Reject requests that cannot be run before any browser work starts.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.urls.is_empty() {
            return Err(ValidationError::NoUrls);
        }
        for raw in &self.urls {
            let parsed =
                url::Url::parse(raw).map_err(|_| ValidationError::InvalidUrl(raw.clone()))?;
            if !matches!(parsed.scheme(), "http" | "https" | "file") {
                return Err(ValidationError::InvalidUrl(raw.clone()));
            }
        }
        if !(0.0..=MAX_SLEEP_SECONDS).contains(&self.sleep_seconds) {
            return Err(ValidationError::InvalidSleep);
        }
        Ok(())
    }

    pub fn sleep_duration(&self) -> std::time::Duration {
        std::time::Duration::try_from_secs_f64(self.sleep_seconds.clamp(0.0, MAX_SLEEP_SECONDS))
            .unwrap_or_default()
    }
}

/// Raw image-related signals read from a product page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSignal {
    #[serde(default)]
    pub script_blocks: Vec<String>,
    #[serde(default)]
    pub main_image_dynamic_attr: Option<String>,
    #[serde(default)]
    pub main_image_src: Option<String>,
    #[serde(default)]
    pub thumbnail_srcs: Vec<String>,
}

/// Normalized field name to value.
///
/// Field names are the canonical ones produced by the attribute rules:
/// `L`, `W`, `H`, `Weight`, `Item Weight`, `Material`, `Colour`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMap(BTreeMap<String, String>);

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a field.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Value of `key`, or an empty string.
    pub fn get_or_empty(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Selected variant, e.g. `Colour: Black`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specification {
    pub spec_name: String,
    pub spec_value: String,
}

impl Specification {
    /// Split a variant label on its first colon.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        match text.split_once(':') {
            Some((name, value)) => Self {
                spec_name: name.trim().to_string(),
                spec_value: value.trim().to_string(),
            },
            None => Self {
                spec_name: text.to_string(),
                spec_value: String::new(),
            },
        }
    }
}

/// Everything extracted from one product page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub title: String,
    pub description: String,
    pub images: Vec<String>,
    pub attributes: AttributeMap,
    pub specification: Option<Specification>,
}

/// Fixed cell values written into every row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowDefaults {
    pub region: String,
    pub warranty: String,
}

impl Default for RowDefaults {
    fn default() -> Self {
        Self {
            region: "中国大陆".to_string(),
            warranty: "无保修".to_string(),
        }
    }
}

/// Column positions of the output workbook.
pub mod columns {
    pub const TITLE: usize = 1;
    pub const DESCRIPTION: usize = 2;
    pub const SPEC_NAME: usize = 5;
    pub const SPEC_VALUE: usize = 6;
    pub const PRIMARY_IMAGE: usize = 7;
    pub const FIXED_TEN_A: usize = 10;
    pub const FIXED_TEN_B: usize = 11;
    pub const SOURCE_URL: usize = 12;
    pub const FIRST_IMAGE_SLOT: usize = 13;
    pub const IMAGE_SLOTS: usize = 9;
    pub const WEIGHT: usize = 24;
    pub const LENGTH: usize = 25;
    pub const WIDTH: usize = 26;
    pub const HEIGHT: usize = 27;
    pub const FIXED_TWO: usize = 28;
    pub const FIXED_ZERO: usize = 29;
    pub const REGION: usize = 31;
    pub const WARRANTY: usize = 32;
    pub const COLOUR: usize = 33;
    pub const MATERIAL: usize = 34;
    pub const WIDTH_TOTAL: usize = 35;
}

/// One positional row of the output workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRow {
    cells: Vec<String>,
}

impl OutputRow {
    /// Lay out a record according to the workbook column contract.
    pub fn from_record(record: &ProductRecord, source_url: &str, defaults: &RowDefaults) -> Self {
        use columns::*;

        let mut cells = vec![String::new(); WIDTH_TOTAL];
        let attrs = &record.attributes;

        cells[TITLE] = record.title.clone();
        cells[DESCRIPTION] = record.description.clone();
        if let Some(spec) = &record.specification {
            cells[SPEC_NAME] = spec.spec_name.clone();
            cells[SPEC_VALUE] = spec.spec_value.clone();
            cells[PRIMARY_IMAGE] = record.images.first().cloned().unwrap_or_default();
        }
        cells[FIXED_TEN_A] = "10".to_string();
        cells[FIXED_TEN_B] = "10".to_string();
        cells[SOURCE_URL] = source_url.to_string();
        for (slot, image) in record.images.iter().take(IMAGE_SLOTS).enumerate() {
            cells[FIRST_IMAGE_SLOT + slot] = image.clone();
        }

        let weight = match attrs.get("Item Weight") {
            Some(w) if !w.is_empty() => w,
            _ => attrs.get_or_empty("Weight"),
        };
        cells[WEIGHT] = weight.to_string();
        cells[LENGTH] = attrs.get_or_empty("L").to_string();
        cells[WIDTH] = attrs.get_or_empty("W").to_string();
        cells[HEIGHT] = attrs.get_or_empty("H").to_string();
        cells[FIXED_TWO] = "2".to_string();
        cells[FIXED_ZERO] = "0".to_string();
        cells[REGION] = defaults.region.clone();
        cells[WARRANTY] = defaults.warranty.clone();
        cells[COLOUR] = attrs.get_or_empty("Colour").to_string();
        cells[MATERIAL] = attrs.get_or_empty("Material").to_string();

        Self { cells }
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    pub fn cell(&self, index: usize) -> &str {
        self.cells.get(index).map(String::as_str).unwrap_or("")
    }

    /// Image slot `n` (0-based) of the nine image columns.
    pub fn image_slot(&self, n: usize) -> &str {
        if n >= columns::IMAGE_SLOTS {
            return "";
        }
        self.cell(columns::FIRST_IMAGE_SLOT + n)
    }
}
