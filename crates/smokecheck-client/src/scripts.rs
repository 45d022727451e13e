//! Page-side JavaScript shared by the CDP and WebDriver drivers.
//!
//! Each snippet is a single expression. WebDriver's `execute` wants a function
//! body instead, so use [`as_function_body`] there.

use smokecheck_core::Locator;

/// `{ ready, resources }` sample for the network-idle wait.
///
/// Chrome stops recording resource timings after 250 entries, which would
/// freeze the count on heavy pages, so the buffer is raised on first use.
pub const NETWORK_SAMPLE: &str = "(() => { \
    if (!window.__smokecheckBuffer) { \
        performance.setResourceTimingBufferSize(100000); \
        window.__smokecheckBuffer = true; \
    } \
    return { \
        ready: document.readyState === 'complete', \
        resources: performance.getEntriesByType('resource').length \
    }; \
})()";

/// Expression that resolves the locator to its first matching node (or null).
pub fn resolve(locator: &Locator) -> String {
    let literal = serde_json::Value::String(locator.expr().to_string()).to_string();
    match locator {
        Locator::XPath(_) => format!(
            "document.evaluate({literal}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue"
        ),
        Locator::Css(_) => format!("document.querySelector({literal})"),
    }
}

/// Boolean expression: the node exists, has a non-empty bounding box and a
/// computed `visibility` other than `hidden`.
pub fn visibility_check(locator: &Locator) -> String {
    format!(
        "(() => {{ \
            const el = {}; \
            if (!el) return false; \
            const rect = el.getBoundingClientRect(); \
            const style = window.getComputedStyle(el); \
            return rect.width > 0 && rect.height > 0 && style.visibility !== 'hidden'; \
        }})()",
        resolve(locator)
    )
}

/// Expression yielding the node's `textContent`, or null.
pub fn text_content(locator: &Locator) -> String {
    format!(
        "(() => {{ const el = {}; return el ? el.textContent : null; }})()",
        resolve(locator)
    )
}

pub fn as_function_body(expression: &str) -> String {
    format!("return {expression};")
}
