use serde_json::Value;

const WATCH_MARKER: &str = "watch?v=";

/// Pull the video id out of a `watch?v=` url, up to the next `&` or end of string
pub fn extract_watch_video_id(url: &str) -> Option<String> {
    let (_, rest) = url.split_once(WATCH_MARKER)?;
    let id = rest.split('&').next().unwrap_or_default();

    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// Best-effort integer decoding: ints, floats (truncated) and numeric strings
pub fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|u| i64::try_from(u).unwrap_or(i64::MAX)))
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
        }
        _ => None,
    }
}

/// Strings are taken as-is, numbers are rendered, everything else counts as missing
pub fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn value_as_str(value: &Value) -> &str {
    value.as_str().unwrap_or_default()
}
