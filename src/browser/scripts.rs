//! In-page scripts for the Chrome driver.
//!
//! Every script evaluates to a JSON string so results cross the protocol
//! boundary as plain text and are decoded with `serde_json`.

#![cfg_attr(not(feature = "browser"), allow(dead_code))]

use super::ScrollPlan;

/// HTTP status of the current document; 0 when the browser did not record one.
pub const NAV_STATUS: &str = r#"
JSON.stringify((() => {
    const entry = performance.getEntriesByType('navigation')[0];
    return entry && entry.responseStatus ? entry.responseStatus : 0;
})())
"#;

/// Raw inputs for image resolution.
pub const PAGE_SIGNAL: &str = r#"
JSON.stringify((() => {
    const scriptBlocks = Array.from(document.querySelectorAll('script[type="text/javascript"]'))
        .map(s => s.innerHTML);
    const main = document.getElementById('landingImage');
    const thumbnailSrcs = Array.from(document.querySelectorAll('#altImages .a-button-thumbnail img'))
        .map(img => img.src)
        .filter(src => !!src);
    return {
        scriptBlocks,
        mainImageDynamicAttr: main ? (main.getAttribute('data-a-dynamic-image') || null) : null,
        mainImageSrc: main ? (main.src || null) : null,
        thumbnailSrcs,
    };
})())
"#;

/// Absolute `href` of every anchor.
pub const LINK_TARGETS: &str = r#"
JSON.stringify(Array.from(document.querySelectorAll('a[href]')).map(a => a.href))
"#;

/// Encode `value` as a JavaScript string literal.
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

pub fn query_text(selector: &str) -> String {
    format!(
        r#"
JSON.stringify((() => {{
    const el = document.querySelector({sel});
    return el ? (el.innerText ?? el.textContent) : null;
}})())
"#,
        sel = js_string(selector)
    )
}

pub fn query_all_text(scope: &str, selector: &str) -> String {
    format!(
        r#"
JSON.stringify((() => {{
    const root = document.querySelector({scope});
    if (!root) return null;
    return Array.from(root.querySelectorAll({sel})).map(el => el.textContent || '');
}})())
"#,
        scope = js_string(scope),
        sel = js_string(selector)
    )
}

pub fn auto_scroll(plan: &ScrollPlan) -> String {
    format!(
        r#"
new Promise((resolve) => {{
    let total = 0;
    const timer = setInterval(() => {{
        const height = document.body ? document.body.scrollHeight : 0;
        window.scrollBy(0, {step});
        total += {step};
        if (total >= height || total > {max}) {{
            clearInterval(timer);
            resolve(JSON.stringify(total));
        }}
    }}, {interval});
}})
"#,
        step = plan.step_px,
        max = plan.max_px,
        interval = plan.interval.as_millis()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selectors_are_quoted() {
        let script = query_text(r#"a[title="x"]"#);
        assert!(script.contains(r#"document.querySelector("a[title=\"x\"]")"#));
    }

    #[test]
    fn test_query_text_reads_rendered_text() {
        let script = query_text("#feature-bullets ul");
        assert!(script.contains("el.innerText ?? el.textContent"));
    }

    #[test]
    fn test_scroll_plan_is_inlined() {
        let script = auto_scroll(&ScrollPlan::default());
        assert!(script.contains("window.scrollBy(0, 100)"));
        assert!(script.contains("total > 10000"));
        assert!(script.contains("}, 100);"));
    }
}
