//! Rendering the upstream news API response as listing markup.
//!
//! The JSON news API and the proxy endpoint both end up producing the same
//! markup shape, so the extractor only has one input format to understand:
//!
//! ```text
//! <div class="news-container">
//!   <article>
//!     <h3>title</h3>
//!     <div class="meta"><time datetime="createdAt">createdAt</time><span class="source">sourceName</span></div>
//!     <div class="description">description</div>
//!   </article>
//! </div>
//! ```
//!
//! Item fields are read from the item itself or from its nested `meta`
//! object, whichever has them.

use quick_xml::escape::escape;
use serde_json::Value;

/// Field names tried for each rendered value, in order.
const TITLE_KEYS: &[&str] = &["title"];
const TIME_KEYS: &[&str] = &["createdAt", "releasedAt", "publishedAt"];
const SOURCE_KEYS: &[&str] = &["sourceName", "source"];
const DESCRIPTION_KEYS: &[&str] = &["description", "subtitle"];

/// Extract `data.items` from an API response body.
///
/// # Errors
///
/// A message describing the contract violation when the body is not JSON or
/// `data.items` is not an array.
pub fn api_items(body: &str) -> Result<Vec<Value>, String> {
    let json: Value =
        serde_json::from_str(body).map_err(|e| format!("response is not JSON: {e}"))?;
    match json.pointer("/data/items") {
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(_) => Err("data.items is not an array".to_string()),
        None => Err("response has no data.items".to_string()),
    }
}

/// Render API items into the shared listing markup.
pub fn render_items(items: &[Value]) -> String {
    let mut html = String::from("<html><body><div class=\"news-container\">");
    for item in items {
        let title = field(item, TITLE_KEYS).unwrap_or_default();
        let time = field(item, TIME_KEYS).unwrap_or_default();
        let time = escape(&time);

        html.push_str("<article>");
        html.push_str(&format!("<h3>{}</h3>", escape(&title)));
        html.push_str("<div class=\"meta\">");
        html.push_str(&format!("<time datetime=\"{time}\">{time}</time>"));
        if let Some(source) = field(item, SOURCE_KEYS) {
            html.push_str(&format!("<span class=\"source\">{}</span>", escape(&source)));
        }
        html.push_str("</div>");
        if let Some(description) = field(item, DESCRIPTION_KEYS) {
            html.push_str(&format!(
                "<div class=\"description\">{}</div>",
                escape(&description)
            ));
        }
        html.push_str("</article>");
    }
    html.push_str("</div></body></html>");
    html
}

fn field(item: &Value, keys: &[&str]) -> Option<String> {
    let meta = item.get("meta");
    keys.iter()
        .flat_map(|key| [item.get(key), meta.and_then(|m| m.get(key))])
        .flatten()
        .find_map(scalar_text)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
