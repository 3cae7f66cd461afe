use crate::models::{
    DatasetStats, ErrorResponse, RefreshResponse, ReloadResponse, Track, WatcherStatus,
};
use crate::AppState;
use log::{error, info};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{get, post, State};

#[get("/tracks?<limit>&<channel>&<search>")]
pub fn get_tracks(
    limit: Option<i64>,
    channel: Option<String>,
    search: Option<String>,
    state: &State<AppState>,
) -> Json<Vec<Track>> {
    let cache = &state.cache;

    let mut tracks = match (
        search.as_deref().filter(|s| !s.is_empty()),
        channel.as_deref().filter(|c| !c.is_empty()),
    ) {
        (Some(query), _) => cache.search_tracks(query),
        (None, Some(name)) => cache.get_tracks_by_channel(name),
        (None, None) => cache.get_all_tracks(),
    };

    if let Some(limit) = limit.filter(|l| *l > 0) {
        tracks.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    }

    Json(tracks)
}

#[get("/tracks/random")]
pub fn get_random_track(state: &State<AppState>) -> Result<Json<Track>, ErrorResponse> {
    state
        .cache
        .get_random_track()
        .map(Json)
        .ok_or_else(|| ErrorResponse::not_found("No tracks available"))
}

#[get("/tracks/stats")]
pub fn get_tracks_stats(state: &State<AppState>) -> Json<DatasetStats> {
    Json(state.cache.get_stats())
}

#[get("/tracks/watcher/status")]
pub fn get_file_watcher_status(state: &State<AppState>) -> Json<WatcherStatus> {
    Json(state.cache.get_watcher_status())
}

#[get("/tracks/<video_id>")]
pub fn get_track_by_id(
    video_id: &str,
    state: &State<AppState>,
) -> Result<Json<Track>, ErrorResponse> {
    state
        .cache
        .get_track_by_id(video_id)
        .map(Json)
        .ok_or_else(|| ErrorResponse::not_found("Track not found"))
}

async fn reload_with_stats(state: &State<AppState>) -> Result<ReloadResponse, Status> {
    let cache = state.cache.clone();

    // File I/O stays off the async workers
    let (report, stats) = tokio::task::spawn_blocking(move || {
        let report = cache.force_reload();
        (report, cache.get_stats())
    })
    .await
    .map_err(|e| {
        error!("Reload task failed: {e:?}");
        Status::InternalServerError
    })?;

    Ok(ReloadResponse { report, stats })
}

#[post("/tracks/reload")]
pub async fn reload_tracks(state: &State<AppState>) -> Result<Json<ReloadResponse>, Status> {
    let response = reload_with_stats(state).await?;
    info!("Manual reload: {}", response.report.message);
    Ok(Json(response))
}

/// Older clients call this one; same reload, slimmer body
#[post("/tracks/refresh")]
pub async fn refresh_tracks(state: &State<AppState>) -> Result<Json<RefreshResponse>, Status> {
    let response = reload_with_stats(state).await?;
    Ok(Json(RefreshResponse {
        message: response.report.message,
        stats: response.stats,
    }))
}
