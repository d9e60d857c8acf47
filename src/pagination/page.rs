use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// One page of a listing resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// 1-based position of this page within the read.
    pub number: u32,
    /// Items that deserialized into `T`. Items that did not are dropped.
    pub results: Vec<T>,
    /// Number of items the server sent, parseable or not.
    pub raw_len: usize,
    /// Total number of items the server claims to hold, when it says so.
    pub found: Option<u64>,
    pub page_count: Option<u32>,
}

impl<T: DeserializeOwned> Page<T> {
    /// Splits a `{meta, results}` envelope. A missing or non-array `results` is an
    /// empty page.
    pub fn from_payload(number: u32, payload: Value) -> Self {
        let (meta, results) = match payload {
            Value::Object(mut map) => (map.remove("meta"), map.remove("results")),
            _ => (None, None),
        };
        let items = match results {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        let raw_len = items.len();

        let results = items
            .into_iter()
            .enumerate()
            .filter_map(|(i, item)| match serde_json::from_value::<T>(item) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    debug!("Skipping item {} on page {}: {}", i, number, e);
                    None
                }
            })
            .collect();

        let meta = meta.as_ref();
        Page {
            number,
            results,
            raw_len,
            found: meta.and_then(|m| m.get("found")).and_then(count_hint),
            page_count: meta
                .and_then(|m| m.get("pageCount").or_else(|| m.get("pages")))
                .and_then(count_hint)
                .and_then(|n| u32::try_from(n).ok()),
        }
    }
}

/// Reads a count the server may send as a number or as a string. Strings such as
/// `">1000"` are lower bounds, not totals, and give `None`.
fn count_hint(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}
