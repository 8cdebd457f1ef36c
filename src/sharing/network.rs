use bytes::Bytes;
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use super::{directory::SharedTrackDirectory, packet::TrackPacket, packet::CHANNEL};
use crate::api::{events::PlaybackEvent, events::PlaybackListener, track::Track};
use crate::error::{CiderError, Result};

/// Re-announce the current track this often so peers never see it expire.
pub const REANNOUNCE_INTERVAL: Duration = Duration::from_secs(15);

/// Outbound side of whatever carries packets between peers.
pub trait TrackTransport: Send + Sync {
    fn send(&self, channel: &str, payload: Bytes) -> Result<()>;
}

/// In-process transport backed by a `flume` channel.
pub struct ChannelTransport {
    tx: flume::Sender<(String, Bytes)>,
}

impl ChannelTransport {
    pub fn pair() -> (Self, flume::Receiver<(String, Bytes)>) {
        let (tx, rx) = flume::unbounded();
        (Self { tx }, rx)
    }
}

impl TrackTransport for ChannelTransport {
    fn send(&self, channel: &str, payload: Bytes) -> Result<()> {
        self.tx
            .send((channel.to_string(), payload))
            .map_err(|_| CiderError::Transport("peer channel closed".to_string()))
    }
}

/// Identity this session announces itself with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPeer {
    pub id: Uuid,
    pub name: String,
}

/// Announces the local track to peers and files their announcements.
///
/// Every operation is a no-op while the directory is disabled.
pub struct SharingHandler {
    directory: Arc<SharedTrackDirectory>,
    transport: Arc<dyn TrackTransport>,
    local: LocalPeer,
    announced: Mutex<Option<(Track, Instant)>>,
}

impl SharingHandler {
    pub fn new(
        directory: Arc<SharedTrackDirectory>,
        transport: Arc<dyn TrackTransport>,
        local: LocalPeer,
    ) -> Self {
        Self {
            directory,
            transport,
            local,
            announced: Mutex::new(None),
        }
    }

    pub fn local_peer(&self) -> &LocalPeer {
        &self.local
    }

    /// Broadcasts `track` as ours. Returns `Ok(false)` when sharing is off.
    pub fn announce(&self, track: &Track) -> Result<bool> {
        if !self.directory.is_enabled() {
            return Ok(false);
        }

        let packet = TrackPacket::new(
            self.local.id,
            self.local.name.clone(),
            track.title(),
            track.artist(),
            track.album(),
        );
        let payload = packet.encode()?;

        self.directory
            .put(self.local.id, packet.into_shared_track());
        // Recorded first so the heartbeat retries a failed send.
        *self.announced.lock() = Some((track.clone(), Instant::now()));
        self.transport.send(CHANNEL, payload)?;

        info!("📡 Compartiendo track: {} - {}", track.artist(), track.title());
        Ok(true)
    }

    /// Files a peer's announcement. Returns whether it was stored.
    pub fn receive(&self, packet: TrackPacket) -> bool {
        if !self.directory.is_enabled() {
            return false;
        }
        info!(
            "📥 Track recibido de {}: {} - {}",
            packet.peer_name, packet.artist_name, packet.track_name
        );
        self.directory.put(packet.peer_id, packet.into_shared_track())
    }

    /// Decodes and files a raw plugin message; other channels are ignored.
    pub fn receive_bytes(&self, channel: &str, payload: &[u8]) -> Result<bool> {
        if channel != CHANNEL || !self.directory.is_enabled() {
            return Ok(false);
        }
        let packet = TrackPacket::decode(payload)?;
        Ok(self.receive(packet))
    }

    /// Re-announces the last announced track once it is older than
    /// [`REANNOUNCE_INTERVAL`]. Returns whether a packet went out.
    pub fn refresh(&self) -> Result<bool> {
        let due = match &*self.announced.lock() {
            Some((track, at)) if at.elapsed() >= REANNOUNCE_INTERVAL => Some(track.clone()),
            _ => None,
        };
        match due {
            Some(track) => {
                debug!("🔁 Renovando anuncio de {}", track.title());
                self.announce(&track)
            }
            None => Ok(false),
        }
    }
}

impl PlaybackListener for SharingHandler {
    fn on_event(&self, event: &PlaybackEvent) -> anyhow::Result<()> {
        match event {
            PlaybackEvent::TrackChanged { new, .. } => {
                self.announce(new)?;
            }
            PlaybackEvent::PositionChanged { .. } => {
                self.refresh()?;
            }
            PlaybackEvent::Disconnected => {
                *self.announced.lock() = None;
            }
            PlaybackEvent::PlaybackChanged { .. } => {}
        }
        Ok(())
    }
}
