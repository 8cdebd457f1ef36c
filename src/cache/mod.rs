//! # Cache Module
//!
//! Time-bounded caching for values that are expensive to derive per track.
//!
//! ## Features
//!
//! - **Absolute TTL**: entries die a fixed time after insertion; reads never
//!   extend their life
//! - **Eviction Callback**: expired and cleared values are handed back exactly
//!   once, so external resources (textures) can be released
//! - **Thread Safety**: one lock per cache instance, callbacks run outside it
//!
//! ## Cache Types
//!
//! - [`TtlCache`]: generic string-keyed cache
//! - [`ArtworkCache`]: artwork texture handles keyed by track identity, 30
//!   minutes by default
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use cider_link::cache::TtlCache;
//! use std::time::Duration;
//!
//! let cache = TtlCache::with_eviction(Duration::from_secs(1800), |cover: String| {
//!     println!("released {cover}");
//! });
//! cache.put("Song A|Artist X", "cider:track/song_a_artist_x".to_string());
//! assert!(cache.get("Song A|Artist X").is_some());
//! ```

pub mod artwork;
pub mod ttl_cache;

use std::time::Duration;

pub use artwork::{ArtworkCache, ArtworkHandle, ArtworkLoader};
pub use ttl_cache::TtlCache;

/// Default lifetime of a cached artwork handle.
pub const DEFAULT_ARTWORK_TTL: Duration = Duration::from_secs(30 * 60);
