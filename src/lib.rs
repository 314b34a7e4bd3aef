//! CDN Player - playback with source fallback, an audio asset cache and play statistics
//!
//! This library provides the playback fallback engine, the versioned audio
//! cache, LRC lyrics parsing and the play-count API server.

pub mod cache;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod engine;
pub mod lyrics;
pub mod resolver;
pub mod server;
pub mod stats;
pub mod storage;
