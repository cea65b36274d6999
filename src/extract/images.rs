//! High-resolution product image discovery.
//!
//! Product pages carry image URLs in several places, none of them
//! documented. Strategies are tried in a fixed order and the first one that
//! yields anything wins:
//!
//! 1. `'imageGalleryData'` array literal in an inline script
//! 2. `'colorImages'` object literal (followed by `'colorToAsin'`)
//! 3. legacy `jQuery.parseJSON('...')` payload
//! 4. DOM attributes of the main image and the thumbnails
//!
//! Script payloads are JavaScript object literals. They are read with a
//! JSON5 parser and never evaluated.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::models::PageSignal;

/// Where the resolved URLs came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStrategy {
    ScriptGallery,
    ScriptColorImages,
    LegacyJson,
    DomFallback,
}

/// Outcome of [`resolve_images`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedImages {
    /// Canonical URLs, de-duplicated, in order of discovery.
    pub urls: Vec<String>,
    /// Strategy that produced the URLs, `None` when nothing was found.
    pub strategy: Option<ImageStrategy>,
}

static GALLERY_DATA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)'imageGalleryData'\s*:\s*(\[.*?\])").unwrap());
static GALLERY_MAIN_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""mainUrl":"(https?://.*?)""#).unwrap());
static COLOR_IMAGES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)'colorImages':\s*(\{.*\}),\s*'colorToAsin'").unwrap());
static JQUERY_PARSE_JSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"jQuery\.parseJSON\('(.*)'\)").unwrap());
/// Resolution code in a media filename, e.g. `._AC_SL1500_.jpg`.
static SIZE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\._[A-Z0-9_,]+_\.(jpg|png|gif|jpeg)").unwrap());
static THUMB_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\._[A-Z0-9_,]+_\.(jpg|png|gif)").unwrap());

const MEDIA_IMAGE_PATH: &str = "media-amazon.com/images/I/";

/// Insertion-ordered URL set.
#[derive(Debug, Default)]
struct UrlCollector {
    seen: HashSet<String>,
    urls: Vec<String>,
}

impl UrlCollector {
    fn add(&mut self, url: impl Into<String>) {
        let url = url.into();
        if url.is_empty() {
            return;
        }
        if self.seen.insert(url.clone()) {
            self.urls.push(url);
        }
    }

    fn add_value(&mut self, value: Option<&Value>) {
        if let Some(Value::String(url)) = value {
            self.add(url.as_str());
        }
    }

    fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

type ScriptStrategy = fn(&str, &mut UrlCollector);

const SCRIPT_STRATEGIES: &[(ImageStrategy, ScriptStrategy)] = &[
    (ImageStrategy::ScriptGallery, collect_gallery_data),
    (ImageStrategy::ScriptColorImages, collect_color_images),
    (ImageStrategy::LegacyJson, collect_legacy_json),
];

/// Collect `mainUrl` / `largeUrl` / `hiResUrl` from gallery entries.
fn collect_gallery_entries(entries: &[Value], out: &mut UrlCollector) {
    for entry in entries {
        out.add_value(entry.get("mainUrl"));
        out.add_value(entry.get("largeUrl"));
        out.add_value(entry.get("hiResUrl"));
    }
}

/// Collect from `colorImages.initial`: `hiRes`, else `large`, else the
/// string values of `main`.
fn collect_color_entries(entries: &[Value], include_main: bool, out: &mut UrlCollector) {
    for entry in entries {
        if let Some(Value::String(url)) = entry.get("hiRes") {
            out.add(url.as_str());
        } else if let Some(Value::String(url)) = entry.get("large") {
            out.add(url.as_str());
        } else if include_main {
            if let Some(Value::Object(main)) = entry.get("main") {
                for value in main.values() {
                    out.add_value(Some(value));
                }
            }
        }
    }
}

fn collect_gallery_data(script: &str, out: &mut UrlCollector) {
    let Some(literal) = GALLERY_DATA.captures(script).map(|c| c[1].to_string()) else {
        return;
    };
    match json5::from_str::<Value>(&literal) {
        Ok(Value::Array(entries)) => collect_gallery_entries(&entries, out),
        Ok(_) => debug!("imageGalleryData is not an array"),
        Err(e) => {
            debug!("Could not parse imageGalleryData ({}), falling back to regex", e);
            for caps in GALLERY_MAIN_URL.captures_iter(&literal) {
                out.add(caps[1].replace('\\', ""));
            }
        }
    }
}

fn collect_color_images(script: &str, out: &mut UrlCollector) {
    let Some(literal) = COLOR_IMAGES.captures(script).map(|c| c[1].to_string()) else {
        return;
    };
    match json5::from_str::<Value>(&literal) {
        Ok(data) => {
            if let Some(Value::Array(initial)) = data.get("initial") {
                collect_color_entries(initial, true, out);
            }
        }
        Err(e) => debug!("Could not parse colorImages data: {}", e),
    }
}

fn collect_legacy_json(script: &str, out: &mut UrlCollector) {
    let Some(payload) = JQUERY_PARSE_JSON.captures(script).map(|c| c[1].to_string()) else {
        return;
    };
    let payload = payload.replace("\\'", "'").replace("\\\\", "\\");
    let data: Value = match serde_json::from_str(&payload) {
        Ok(data) => data,
        Err(e) => {
            debug!("Could not parse jQuery.parseJSON payload: {}", e);
            return;
        }
    };

    if let Some(Value::Array(entries)) = data.get("imageGalleryData") {
        collect_gallery_entries(entries, out);
    }
    if out.is_empty() {
        if let Some(Value::Array(initial)) = data.pointer("/colorImages/initial") {
            collect_color_entries(initial, false, out);
        }
    }
}

/// Main image candidates plus upgraded thumbnails.
fn collect_from_dom(signal: &PageSignal, out: &mut UrlCollector) {
    match signal.main_image_dynamic_attr.as_deref() {
        Some(raw) => match serde_json::from_str::<serde_json::Map<String, Value>>(raw) {
            Ok(candidates) => {
                for url in candidates.keys() {
                    out.add(url.as_str());
                }
            }
            Err(e) => {
                debug!("Could not parse data-a-dynamic-image ({}), using src", e);
                if let Some(src) = &signal.main_image_src {
                    out.add(src.as_str());
                }
            }
        },
        None => {
            if let Some(src) = &signal.main_image_src {
                out.add(src.as_str());
            }
        }
    }

    for thumb in &signal.thumbnail_srcs {
        out.add(upgrade_thumbnail(thumb));
    }
}

/// Ask for the 1500px rendition of a thumbnail.
pub fn upgrade_thumbnail(url: &str) -> String {
    THUMB_SUFFIX.replace(url, "._SL1500_.$1").into_owned()
}

/// Strip the resolution code from CDN image URLs; other URLs are kept.
pub fn canonicalize_image_url(url: &str) -> String {
    if url.contains(MEDIA_IMAGE_PATH) {
        SIZE_SUFFIX.replace(url, ".$1").into_owned()
    } else {
        url.to_string()
    }
}

/// Run the strategy chain over one page's signals.
pub fn resolve_images(signal: &PageSignal) -> ResolvedImages {
    let mut found = UrlCollector::default();
    let mut strategy = None;

    'strategies: for (kind, collect) in SCRIPT_STRATEGIES {
        for script in &signal.script_blocks {
            collect(script, &mut found);
            if !found.is_empty() {
                strategy = Some(*kind);
                break 'strategies;
            }
        }
    }

    if found.is_empty() {
        debug!("Script data did not yield image URLs, reading DOM attributes");
        collect_from_dom(signal, &mut found);
        if !found.is_empty() {
            strategy = Some(ImageStrategy::DomFallback);
        }
    }

    let mut canonical = UrlCollector::default();
    for url in &found.urls {
        canonical.add(canonicalize_image_url(url));
    }

    ResolvedImages {
        urls: canonical.urls,
        strategy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal_with_scripts(scripts: &[&str]) -> PageSignal {
        PageSignal {
            script_blocks: scripts.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_gallery_data_parsed_as_object_literal() {
        let script = r#"
            P.when('A').register("ImageBlockATF", function(A){
              var data = {
                'imageGalleryData' : [{mainUrl:'https://m.media-amazon.com/images/I/a1._AC_SL1500_.jpg', largeUrl:"https://m.media-amazon.com/images/I/a1._AC_SX679_.jpg"},{'mainUrl':'https://m.media-amazon.com/images/I/b2._AC_SL1500_.png'}],
                'centerColMargin' : 0
              };
            });
        "#;
        let mut signal = signal_with_scripts(&[script]);
        signal.main_image_src = Some("https://m.media-amazon.com/images/I/zz.jpg".into());

        let resolved = resolve_images(&signal);
        assert_eq!(resolved.strategy, Some(ImageStrategy::ScriptGallery));
        assert_eq!(
            resolved.urls,
            vec![
                "https://m.media-amazon.com/images/I/a1.jpg",
                "https://m.media-amazon.com/images/I/b2.png",
            ]
        );
    }

    #[test]
    fn test_gallery_regex_fallback_on_broken_literal() {
        let script = r#"'imageGalleryData' : [{"mainUrl":"https:\/\/m.media-amazon.com\/images\/I\/c3._AC_.jpg", oops: ]"#;
        let resolved = resolve_images(&signal_with_scripts(&[script]));
        assert_eq!(resolved.strategy, Some(ImageStrategy::ScriptGallery));
        assert_eq!(resolved.urls, vec!["https://m.media-amazon.com/images/I/c3.jpg"]);
    }

    #[test]
    fn test_color_images_prefers_hi_res_then_large_then_main() {
        let script = r#"
            var data = {
                'colorImages': { 'initial': [
                    {"hiRes":"https://m.media-amazon.com/images/I/h1._AC_SL1500_.jpg","large":"https://m.media-amazon.com/images/I/l1._AC_.jpg"},
                    {"hiRes":null,"large":"https://m.media-amazon.com/images/I/l2._AC_.jpg"},
                    {"main":{"a":"https://example.com/m3.jpg","b":[500,500]}}
                ]},
                'colorToAsin': {'initial': {}},
            };
        "#;
        let resolved = resolve_images(&signal_with_scripts(&[script]));
        assert_eq!(resolved.strategy, Some(ImageStrategy::ScriptColorImages));
        assert_eq!(
            resolved.urls,
            vec![
                "https://m.media-amazon.com/images/I/h1.jpg",
                "https://m.media-amazon.com/images/I/l2.jpg",
                "https://example.com/m3.jpg",
            ]
        );
    }

    #[test]
    fn test_legacy_jquery_payload() {
        let script = r#"var obj = jQuery.parseJSON('{"title":"It\'s here","colorImages":{"initial":[{"large":"https://m.media-amazon.com/images/I/j1._SX38_.jpg"}]}}');"#;
        let resolved = resolve_images(&signal_with_scripts(&[script]));
        assert_eq!(resolved.strategy, Some(ImageStrategy::LegacyJson));
        assert_eq!(resolved.urls, vec!["https://m.media-amazon.com/images/I/j1.jpg"]);
    }

    #[test]
    fn test_gallery_wins_over_later_strategies() {
        let color = r#"'colorImages': { 'initial': [{"hiRes":"https://example.com/color.jpg"}]}, 'colorToAsin': {}"#;
        let gallery = r#"'imageGalleryData' : [{"mainUrl":"https://example.com/gallery.jpg"}]"#;
        let mut signal = signal_with_scripts(&[color, gallery]);
        signal.main_image_src = Some("https://example.com/dom.jpg".into());

        let resolved = resolve_images(&signal);
        assert_eq!(resolved.strategy, Some(ImageStrategy::ScriptGallery));
        assert_eq!(resolved.urls, vec!["https://example.com/gallery.jpg"]);
    }

    #[test]
    fn test_dom_fallback_uses_dynamic_attribute_and_thumbnails() {
        let signal = PageSignal {
            script_blocks: vec!["var nothing = 1;".into()],
            main_image_dynamic_attr: Some(
                r#"{"https://m.media-amazon.com/images/I/d1._AC_SX425_.jpg":[425,425],"https://m.media-amazon.com/images/I/d1._AC_SX569_.jpg":[569,569]}"#
                    .into(),
            ),
            main_image_src: Some("https://m.media-amazon.com/images/I/ignored.jpg".into()),
            thumbnail_srcs: vec![
                "https://m.media-amazon.com/images/I/d1._AC_US40_.jpg".into(),
                "https://m.media-amazon.com/images/I/t2._AC_US40_.jpg".into(),
                "https://other.example/t3.webp".into(),
            ],
        };
        let resolved = resolve_images(&signal);
        assert_eq!(resolved.strategy, Some(ImageStrategy::DomFallback));
        assert_eq!(
            resolved.urls,
            vec![
                "https://m.media-amazon.com/images/I/d1.jpg",
                "https://m.media-amazon.com/images/I/t2.jpg",
                "https://other.example/t3.webp",
            ]
        );
    }

    #[test]
    fn test_dom_fallback_bad_dynamic_attribute_uses_src() {
        let signal = PageSignal {
            main_image_dynamic_attr: Some("{not json".into()),
            main_image_src: Some("https://media-amazon.com/images/I/abc._AC_SL1500_.jpg".into()),
            ..Default::default()
        };
        let resolved = resolve_images(&signal);
        assert_eq!(resolved.urls, vec!["https://media-amazon.com/images/I/abc.jpg"]);
    }

    #[test]
    fn test_nothing_found() {
        let resolved = resolve_images(&PageSignal::default());
        assert!(resolved.urls.is_empty());
        assert_eq!(resolved.strategy, None);
    }

    #[test]
    fn test_canonicalize_only_touches_cdn_urls() {
        assert_eq!(
            canonicalize_image_url("https://m.media-amazon.com/images/I/x._AC_SR38,50_.jpeg"),
            "https://m.media-amazon.com/images/I/x.jpeg"
        );
        assert_eq!(
            canonicalize_image_url("https://cdn.example.com/images/I/x._AC_SL1500_.jpg"),
            "https://cdn.example.com/images/I/x._AC_SL1500_.jpg"
        );
    }

    #[test]
    fn test_upgrade_thumbnail() {
        assert_eq!(
            upgrade_thumbnail("https://m.media-amazon.com/images/I/t._AC_US40_.png"),
            "https://m.media-amazon.com/images/I/t._SL1500_.png"
        );
        assert_eq!(upgrade_thumbnail("https://x/y.webp"), "https://x/y.webp");
    }
}
