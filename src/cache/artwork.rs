use parking_lot::Mutex;
use regex::Regex;
use std::{
    sync::{Arc, LazyLock},
    time::Duration,
};
use tracing::debug;

use super::ttl_cache::TtlCache;
use crate::api::track::Track;

/// Resource key of the bundled "unknown cover" texture.
pub const PLACEHOLDER_KEY: &str = "cider:textures/unknown_cover";

/// Edge length requested when the artwork URL carries a size template.
pub const ARTWORK_SIZE: u32 = 256;

static KEY_SANITIZER: LazyLock<Regex> = LazyLock::new(|| Regex::new("[^a-z0-9-]").unwrap());

/// Texture backend that actually downloads and decodes artwork.
///
/// The cache only decides *when* a key is loaded or released; the loader owns
/// the texture behind it.
pub trait ArtworkLoader: Send + Sync {
    fn load(&self, url: &str, key: &str);
    fn release(&self, key: &str);
}

/// Identity of a loaded (or loading) artwork texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtworkHandle {
    key: String,
    url: Option<String>,
}

impl ArtworkHandle {
    pub fn placeholder() -> Self {
        Self {
            key: PLACEHOLDER_KEY.to_string(),
            url: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn is_placeholder(&self) -> bool {
        self.key == PLACEHOLDER_KEY
    }
}

/// Resource key for a track id: `cider:track/<id>` with anything outside
/// `[a-z0-9-]` folded to `_`.
pub fn resource_key(track_id: &str) -> String {
    let lowered = track_id.to_lowercase();
    format!("cider:track/{}", KEY_SANITIZER.replace_all(&lowered, "_"))
}

/// Per-track artwork handles, released back to the loader when they expire.
pub struct ArtworkCache {
    handles: TtlCache<ArtworkHandle>,
    loader: Arc<dyn ArtworkLoader>,
    resolve_lock: Mutex<()>,
}

impl ArtworkCache {
    pub fn new(ttl: Duration, loader: Arc<dyn ArtworkLoader>) -> Self {
        let releaser = loader.clone();
        let handles = TtlCache::with_eviction(ttl, move |handle: ArtworkHandle| {
            if !handle.is_placeholder() {
                debug!("🖼️ Liberando artwork: {}", handle.key);
                releaser.release(&handle.key);
            }
        });

        Self {
            handles,
            loader,
            resolve_lock: Mutex::new(()),
        }
    }

    /// Returns the artwork handle for `track`, asking the loader for it on a miss.
    pub fn resolve(&self, track: Option<&Track>) -> ArtworkHandle {
        let Some(track) = track else {
            return ArtworkHandle::placeholder();
        };
        let Some(url) = track
            .artwork_url_sized(ARTWORK_SIZE, ARTWORK_SIZE)
            .filter(|url| !url.is_empty())
        else {
            return ArtworkHandle::placeholder();
        };

        // Serialize lookups so two callers never load the same track twice.
        let _guard = self.resolve_lock.lock();

        let track_id = track.id();
        if let Some(handle) = self.handles.get(&track_id) {
            return handle;
        }

        let handle = ArtworkHandle {
            key: resource_key(&track_id),
            url: Some(url),
        };
        if let Some(url) = handle.url() {
            debug!("🖼️ Cargando artwork {} desde {}", handle.key, url);
            self.loader.load(url, &handle.key);
        }
        self.handles.put(track_id, handle.clone());
        handle
    }

    pub fn purge_expired(&self) -> usize {
        self.handles.purge_expired()
    }

    /// Releases every cached texture.
    pub fn clear(&self) {
        self.handles.clear();
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
