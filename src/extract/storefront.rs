//! ASIN harvesting from storefront link targets.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static PRODUCT_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(?:dp|gp/product)/([A-Z0-9]{10})").unwrap());

/// ASINs referenced by `links`, first occurrence order.
pub fn extract_asins<S: AsRef<str>>(links: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    links
        .iter()
        .filter_map(|link| PRODUCT_LINK.captures(link.as_ref()))
        .map(|caps| caps[1].to_string())
        .filter(|asin| seen.insert(asin.clone()))
        .collect()
}
