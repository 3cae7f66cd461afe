use crate::models::{RawRecord, Track};
use crate::utils::{extract_watch_video_id, value_as_i64, value_as_string};
use serde_json::Value;

const UNKNOWN_TITLE: &str = "Unknown Title";
const UNKNOWN_CHANNEL: &str = "Unknown Channel";

fn string_field(raw: &RawRecord, key: &str) -> Option<String> {
    raw.get(key).and_then(value_as_string)
}

fn int_field(raw: &RawRecord, key: &str) -> i64 {
    raw.get(key).and_then(value_as_i64).unwrap_or(0)
}

fn hashtags_field(raw: &RawRecord) -> Vec<String> {
    match raw.get("hashtags") {
        Some(Value::Array(tags)) => tags
            .iter()
            .filter_map(|tag| tag.as_str().map(String::from))
            .collect(),
        _ => Vec::new(),
    }
}

/// Resolve the video id from the explicit `id` field, falling back to the watch url
pub fn resolve_video_id(raw: &RawRecord) -> Option<String> {
    string_field(raw, "id")
        .filter(|id| !id.is_empty())
        .or_else(|| {
            raw.get("url")
                .and_then(Value::as_str)
                .and_then(extract_watch_video_id)
        })
}

/// Map one raw record onto the canonical track shape.
///
/// Returns `None` when no video id can be derived; every other field falls
/// back to its default when missing or of an unexpected type.
pub fn normalize(raw: &RawRecord) -> Option<Track> {
    let video_id = resolve_video_id(raw)?;

    let url = string_field(raw, "url")
        .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={video_id}"));

    Some(Track {
        title: string_field(raw, "title").unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
        channel_title: string_field(raw, "channelName")
            .unwrap_or_else(|| UNKNOWN_CHANNEL.to_string()),
        channel_id: string_field(raw, "channelId").unwrap_or_default(),
        channel_url: string_field(raw, "channelUrl").unwrap_or_default(),
        thumbnail: string_field(raw, "thumbnailUrl").unwrap_or_default(),
        description: string_field(raw, "text").unwrap_or_default(),
        url,
        view_count: int_field(raw, "viewCount"),
        likes: int_field(raw, "likes"),
        comments_count: int_field(raw, "commentsCount"),
        duration: string_field(raw, "duration").unwrap_or_default(),
        upload_date: string_field(raw, "date").unwrap_or_default(),
        subscribers: int_field(raw, "numberOfSubscribers"),
        hashtags: hashtags_field(raw),
        search_query: string_field(raw, "input").unwrap_or_default(),
        video_id,
    })
}
