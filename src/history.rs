use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::VecDeque;
use tracing::debug;

use crate::api::{events::PlaybackEvent, events::PlaybackListener, track::Track};

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub track: Track,
    pub started_at: DateTime<Utc>,
}

/// Recently played tracks, newest first, kept in memory only.
///
/// A song that comes back moves to the front instead of appearing twice.
#[derive(Debug)]
pub struct TrackHistory {
    entries: RwLock<VecDeque<HistoryEntry>>,
    max_size: usize,
}

impl TrackHistory {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(max_size)),
            max_size,
        }
    }

    pub fn record(&self, track: Track) {
        if self.max_size == 0 {
            return;
        }

        let mut entries = self.entries.write();
        entries.retain(|entry| !entry.track.same_song(&track));
        entries.push_front(HistoryEntry {
            track,
            started_at: Utc::now(),
        });
        entries.truncate(self.max_size);
        debug!("📜 Historial: {} tracks", entries.len());
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.read().iter().cloned().collect()
    }

    pub fn last(&self) -> Option<HistoryEntry> {
        self.entries.read().front().cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl PlaybackListener for TrackHistory {
    fn on_event(&self, event: &PlaybackEvent) -> anyhow::Result<()> {
        if let PlaybackEvent::TrackChanged { new, .. } = event {
            self.record(new.clone());
        }
        Ok(())
    }
}
