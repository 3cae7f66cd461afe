use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::Responder;
use rocket::serde::{Deserialize, Serialize};
use rocket::{response, Response};
use serde_json::{Map, Value};
use std::io::Cursor;

/// One scraped item exactly as the collector wrote it
pub type RawRecord = Map<String, Value>;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Track {
    pub title: String,
    pub video_id: String,
    pub channel_title: String,
    pub channel_id: String,
    pub channel_url: String,
    pub thumbnail: String,
    pub description: String,
    pub url: String,
    pub view_count: i64,
    pub likes: i64,
    pub comments_count: i64,
    pub duration: String,
    pub upload_date: String,
    pub subscribers: i64,
    pub hashtags: Vec<String>,
    pub search_query: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChannelSummary {
    pub channel_title: String,
    pub channel_id: String,
    pub channel_url: String,
    pub subscribers: i64,
    pub video_count: i64,
    pub total_views: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct DatasetStats {
    pub total_tracks: i64,
    pub total_views: i64,
    pub total_likes: i64,
    pub unique_channels: i64,
    pub avg_views_per_track: i64,
    pub avg_likes_per_track: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReloadReport {
    pub success: bool,
    pub message: String,
    pub old_count: usize,
    pub new_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReloadResponse {
    #[serde(flatten)]
    pub report: ReloadReport,
    pub stats: DatasetStats,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub message: String,
    pub stats: DatasetStats,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WatcherStatus {
    pub available: bool,
    pub active: bool,
    pub watched_path: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip)]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn not_found(message: &str) -> Self {
        ErrorResponse {
            error: "Not Found".to_string(),
            message: message.to_string(),
            status: Some(Status::NotFound.code),
        }
    }
}

impl<'r> Responder<'r, 'static> for ErrorResponse {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let status = self
            .status
            .and_then(Status::from_code)
            .unwrap_or(Status::BadRequest);
        let json = serde_json::to_string(&self).map_err(|_| Status::InternalServerError)?;
        Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(json.len(), Cursor::new(json))
            .ok()
    }
}
