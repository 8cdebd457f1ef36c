//! Keeps a game client in sync with a locally running Cider music player.
//!
//! [`Engine`] ties the pieces together: the [`api::Poller`] observes Cider
//! and publishes [`api::PlaybackEvent`]s, the [`cache::ArtworkCache`] maps
//! tracks to textures, and the [`sharing`] module lets nearby players see
//! what each other are listening to.

pub mod api;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod sharing;

pub use config::Config;
pub use engine::Engine;
pub use error::{CiderError, Result};
