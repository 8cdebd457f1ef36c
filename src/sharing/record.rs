use std::{fmt, time::Duration};
use tokio::time::Instant;
use uuid::Uuid;

/// How long a peer's announcement stays visible.
pub const SHARE_TTL: Duration = Duration::from_secs(30);

/// What a peer said it is listening to, and when we heard it.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedTrack {
    pub peer_id: Uuid,
    pub peer_name: String,
    pub track_name: String,
    pub artist_name: String,
    pub album_name: String,
    created_at: Instant,
}

impl SharedTrack {
    pub fn new(
        peer_id: Uuid,
        peer_name: impl Into<String>,
        track_name: impl Into<String>,
        artist_name: impl Into<String>,
        album_name: impl Into<String>,
    ) -> Self {
        Self {
            peer_id,
            peer_name: peer_name.into(),
            track_name: track_name.into(),
            artist_name: artist_name.into(),
            album_name: album_name.into(),
            created_at: Instant::now(),
        }
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.created_at)
    }

    pub fn is_expired(&self) -> bool {
        self.age() > SHARE_TTL
    }

    /// Same record with its age reset to zero.
    pub(crate) fn refreshed(mut self) -> Self {
        self.created_at = Instant::now();
        self
    }
}

impl fmt::Display for SharedTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist_name, self.track_name)
    }
}
