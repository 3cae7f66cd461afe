pub mod file_watcher;
pub mod normalizer;
pub mod snapshot;
pub mod track_cache;
