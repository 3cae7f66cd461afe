use crate::services::file_watcher::{WatchTiming, DEFAULT_DEBOUNCE_WINDOW, DEFAULT_SETTLE_DELAY};
use crate::services::track_cache::{CacheConfig, TrackCache};
use crate::AppState;
use anyhow::Result;
use env_logger::Builder;
use lazy_static::lazy_static;
use log::{info, LevelFilter};
use rocket::http::Method;
use rocket_cors::{AllowedHeaders, AllowedOrigins, CorsOptions};
use std::env;
use std::sync::Arc;
use std::time::Duration;

lazy_static! {
    pub static ref SETLIST_DATA_FILE: String =
        env::var("SETLIST_DATA_FILE").unwrap_or_else(|_| "AI_Setlist.json".to_string());
    pub static ref FILE_WATCH_ENABLED: bool = env::var("FILE_WATCH_ENABLED")
        .map(|v| parse_flag(&v))
        .unwrap_or(true);
    pub static ref WATCH_DEBOUNCE_MS: u64 = env::var("WATCH_DEBOUNCE_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_DEBOUNCE_WINDOW.as_millis() as u64);
    pub static ref WATCH_SETTLE_MS: u64 = env::var("WATCH_SETTLE_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_SETTLE_DELAY.as_millis() as u64);
    pub static ref CORS_ALLOWED_ORIGIN: String =
        env::var("CORS_ALLOWED_ORIGIN").unwrap_or_else(|_| "http://localhost:8080".to_string());
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

pub fn init_logger() {
    Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();
    info!("Starting setlist backend...");
}

pub fn load_environment() {
    dotenv::dotenv().ok();
}

pub fn cache_config_from_env() -> CacheConfig {
    CacheConfig {
        data_file: SETLIST_DATA_FILE.as_str().into(),
        watch_enabled: *FILE_WATCH_ENABLED,
        watch_timing: WatchTiming {
            debounce_window: Duration::from_millis(*WATCH_DEBOUNCE_MS),
            settle_delay: Duration::from_millis(*WATCH_SETTLE_MS),
        },
    }
}

pub fn create_app_state() -> AppState {
    let config = cache_config_from_env();
    info!("Serving tracks from: {}", config.data_file.display());

    AppState {
        cache: Arc::new(TrackCache::new(config)),
    }
}

pub fn create_cors() -> Result<rocket_cors::Cors> {
    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::some_exact(&[CORS_ALLOWED_ORIGIN.as_str()]))
        .allowed_methods(
            vec![Method::Get, Method::Post, Method::Options]
                .into_iter()
                .map(From::from)
                .collect(),
        )
        .allowed_headers(AllowedHeaders::some(&["Accept", "Content-Type"]))
        .allow_credentials(true)
        .to_cors()
        .map_err(|e| anyhow::anyhow!("Failed to create CORS options: {}", e))?;

    Ok(cors)
}
