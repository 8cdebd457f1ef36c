use dashmap::DashMap;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};
use tracing::{debug, info};
use uuid::Uuid;

use super::record::SharedTrack;

/// Who is listening to what, one live record per peer.
///
/// Records expire [`SHARE_TTL`](super::record::SHARE_TTL) after they were
/// stored. Expiry is checked on every read; `sweep_and_list_all` also drops
/// every dead record. While disabled the directory stays empty.
#[derive(Debug, Default)]
pub struct SharedTrackDirectory {
    tracks: DashMap<Uuid, SharedTrack>,
    enabled: AtomicBool,
}

impl SharedTrackDirectory {
    pub fn new(enabled: bool) -> Self {
        Self {
            tracks: DashMap::new(),
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        let was_enabled = self.enabled.swap(enabled, Ordering::SeqCst);
        if was_enabled != enabled {
            info!(
                "📡 Compartir tracks {}",
                if enabled { "activado" } else { "desactivado" }
            );
        }
        if !enabled {
            self.tracks.clear();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Stores `record` for `peer_id` with a fresh age, replacing any older one.
    ///
    /// Returns `false` (and stores nothing) while disabled.
    pub fn put(&self, peer_id: Uuid, record: SharedTrack) -> bool {
        if !self.is_enabled() {
            return false;
        }
        debug!("📥 Track compartido por {}: {}", record.peer_name, record);
        self.tracks.insert(peer_id, record.refreshed());

        // `set_enabled(false)` may have cleared the map between check and insert.
        if !self.is_enabled() {
            self.tracks.remove(&peer_id);
            return false;
        }
        true
    }

    pub fn get(&self, peer_id: &Uuid) -> Option<SharedTrack> {
        if let Some(record) = self.tracks.get(peer_id) {
            if !record.is_expired() {
                return Some(record.clone());
            }
        }
        self.tracks.remove_if(peer_id, |_, record| record.is_expired());
        None
    }

    /// Drops expired records, then returns a copy of the live ones.
    pub fn sweep_and_list_all(&self) -> HashMap<Uuid, SharedTrack> {
        self.tracks.retain(|_, record| !record.is_expired());
        self.tracks
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    pub fn clear(&self) {
        self.tracks.clear();
    }

    /// Stored records, expired ones included until the next sweep.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
