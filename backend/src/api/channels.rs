use crate::models::{ChannelSummary, ErrorResponse, Track};
use crate::AppState;
use rocket::serde::json::Json;
use rocket::{get, State};

#[get("/channels")]
pub fn get_channels(state: &State<AppState>) -> Json<Vec<ChannelSummary>> {
    let mut channels = state.cache.get_channels_summary();
    channels.sort_by(|a, b| b.subscribers.cmp(&a.subscribers));
    Json(channels)
}

#[get("/channels/<channel_id>/tracks")]
pub fn get_channel_tracks(
    channel_id: &str,
    state: &State<AppState>,
) -> Result<Json<Vec<Track>>, ErrorResponse> {
    let tracks = state.cache.get_tracks_by_channel_id(channel_id);
    if tracks.is_empty() {
        return Err(ErrorResponse::not_found("No tracks found for this channel"));
    }
    Ok(Json(tracks))
}
