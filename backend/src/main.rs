#[macro_use]
extern crate rocket;

mod api;
mod config;
mod models;
mod services;
mod utils;

use log::{error, info};
use rocket::fairing::AdHoc;
use rocket::{Build, Rocket};
use services::track_cache::TrackCache;
use std::sync::Arc;

pub struct AppState {
    pub cache: Arc<TrackCache>,
}

#[get("/")]
fn index() -> &'static str {
    "Setlist backend is running"
}

/// Joining the watcher thread can wait on an in-flight reload, so keep it off the async workers
async fn stop_watcher_off_runtime(cache: Arc<TrackCache>) {
    if let Err(e) = tokio::task::spawn_blocking(move || cache.stop_watcher()).await {
        error!("Stopping file watcher failed: {e:?}");
    }
}

pub fn build_rocket(cache: Arc<TrackCache>) -> Rocket<Build> {
    rocket::build()
        .manage(AppState { cache })
        .attach(AdHoc::on_shutdown("Stop file watcher", |rocket| {
            Box::pin(async move {
                if let Some(state) = rocket.state::<AppState>() {
                    stop_watcher_off_runtime(state.cache.clone()).await;
                }
            })
        }))
        .mount("/", routes![index])
        .mount(
            "/api",
            routes![
                api::get_tracks,
                api::get_random_track,
                api::get_tracks_stats,
                api::get_file_watcher_status,
                api::get_track_by_id,
                api::reload_tracks,
                api::refresh_tracks,
                api::get_channels,
                api::get_channel_tracks,
            ],
        )
}

#[launch]
fn rocket() -> _ {
    config::load_environment();
    config::init_logger();

    let state = config::create_app_state();
    let stats = state.cache.get_stats();
    info!(
        "Cache ready: {} tracks across {} channels",
        stats.total_tracks, stats.unique_channels
    );

    let rocket = build_rocket(state.cache);
    match config::create_cors() {
        Ok(cors) => rocket.attach(cors),
        Err(e) => {
            error!("{e}; continuing without CORS");
            rocket
        }
    }
}
