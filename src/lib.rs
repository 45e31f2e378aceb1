pub mod baseline;
pub mod catalog;
pub mod config;
pub mod describe;
pub mod extract;
pub mod key;
pub mod mood;
pub mod pipeline;
pub mod record;
pub mod tagger;
pub mod validate;

/// Application name for XDG paths
pub const APP_NAME: &str = "trackmeta";

/// File name of the persisted catalog
pub const CATALOG_FILE: &str = "audio_metadata.json";
