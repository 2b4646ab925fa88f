use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Flat, string-typed view of one raw GHDB row.
///
/// Absent or malformed fields degrade to empty strings; the endpoint mixes
/// numeric and string scalars across rows, so everything is stringified to
/// keep the clean export's schema stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedEntry {
    pub id: String,
    pub date: String,
    pub category: String,
    pub category_id: String,
    pub author: String,
    pub author_id: String,
    pub query: String,
    pub resource_id: String,
}

/// Normalize one raw row. Pure and total: no failure path, same output for
/// the same input every time.
pub fn normalize(entry: &Value) -> NormalizedEntry {
    let id = scalar_string(entry.get("id"));
    let date = scalar_string(entry.get("date"));

    let (category, category_id) = nested_pair(entry.get("category"), "cat_title", "cat_id");
    let (author, author_id) = nested_pair(entry.get("author"), "name", "id");

    let url_title = entry.get("url_title").and_then(Value::as_str).unwrap_or("");
    let query = anchor_text(url_title);
    let resource_id = anchor_resource_id(url_title).unwrap_or_else(|| id.clone());

    NormalizedEntry {
        id,
        date,
        category,
        category_id,
        author,
        author_id,
        query,
        resource_id,
    }
}

/// Read two fields out of a nested object; anything that is not an object
/// (absent, string, number) yields empty strings for both.
fn nested_pair(value: Option<&Value>, title_key: &str, id_key: &str) -> (String, String) {
    match value.and_then(Value::as_object) {
        Some(obj) => (
            scalar_string(obj.get(title_key)),
            scalar_string(obj.get(id_key)),
        ),
        None => (String::new(), String::new()),
    }
}

fn scalar_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Inner text of the first anchor in the title fragment. The fragment comes
/// from a known server template, so a narrow pattern beats a real HTML
/// parser here. No anchor means the field is already plain text.
fn anchor_text(url_title: &str) -> String {
    let re = Regex::new(r"<a[^>]*>([^<]+)</a>").unwrap();
    match re.captures(url_title).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().to_string(),
        None => url_title.to_string(),
    }
}

/// Numeric identifier embedded in the anchor's `/ghdb/<digits>` href, if any.
fn anchor_resource_id(url_title: &str) -> Option<String> {
    let re = Regex::new(r#"href="[^"]*ghdb/(\d+)""#).unwrap();
    re.captures(url_title)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}
