//! Turning a loaded product page into a [`ProductRecord`](crate::models::ProductRecord).

pub mod attributes;
pub mod images;
pub mod page;
pub mod storefront;
pub mod text;
pub mod units;

pub use attributes::{rebuild_key_value, AttributeRebuilder};
pub use images::{resolve_images, ImageStrategy, ResolvedImages};
pub use page::{sleep_or_cancel, ExtractorConfig, PageExtractor, ATTRIBUTE_REGIONS};
pub use storefront::extract_asins;
pub use text::remove_invisible;
pub use units::normalize_weight;
