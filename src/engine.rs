use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{
    client::{CiderClient, PlaybackSource},
    controls::PlaybackController,
    events::{EventDispatcher, PlaybackListener, SubscriptionId},
    poller::{PlaybackState, Poller},
};
use crate::cache::artwork::{ArtworkCache, ArtworkHandle, ArtworkLoader};
use crate::config::Config;
use crate::error::Result;
use crate::history::TrackHistory;
use crate::sharing::{LocalPeer, SharedTrackDirectory, SharingHandler, TrackTransport};

/// Owns every component of the integration and applies configuration to them.
///
/// Built once per client session. The sharing handler and the history are
/// subscribed to the poller's events at construction.
pub struct Engine {
    config: RwLock<Config>,
    dispatcher: Arc<EventDispatcher>,
    poller: Arc<Poller>,
    artwork: Arc<ArtworkCache>,
    directory: Arc<SharedTrackDirectory>,
    sharing: Arc<SharingHandler>,
    history: Arc<TrackHistory>,
    controls: PlaybackController,
}

impl Engine {
    pub fn new(
        config: Config,
        source: Arc<dyn PlaybackSource>,
        client: CiderClient,
        loader: Arc<dyn ArtworkLoader>,
        transport: Arc<dyn TrackTransport>,
    ) -> Self {
        let dispatcher = Arc::new(EventDispatcher::new());
        let settings = config.connection_settings();

        let poller = Arc::new(Poller::new(source, dispatcher.clone(), settings.clone()));
        let artwork = Arc::new(ArtworkCache::new(config.artwork_ttl(), loader));
        let directory = Arc::new(SharedTrackDirectory::new(sharing_enabled(&config)));

        let local = LocalPeer {
            id: config.player_id.unwrap_or_else(Uuid::new_v4),
            name: config.player_name.clone(),
        };
        let sharing = Arc::new(SharingHandler::new(directory.clone(), transport, local));
        let history = Arc::new(TrackHistory::new(config.history_size));
        let controls = PlaybackController::new(client, settings, config.enable_playback_controls);

        dispatcher.subscribe(sharing.clone());
        dispatcher.subscribe(history.clone());

        Self {
            config: RwLock::new(config),
            dispatcher,
            poller,
            artwork,
            directory,
            sharing,
            history,
            controls,
        }
    }

    /// Pushes `config` to every component without touching the poll worker.
    ///
    /// Artwork TTL and history size are fixed at construction.
    pub fn apply_config(&self, config: Config) {
        let settings = config.connection_settings();
        self.poller.configure(
            settings.base_url.clone(),
            settings.token.clone(),
            settings.require_token,
        );
        self.controls
            .configure(settings, config.enable_playback_controls);

        let was_sharing = self.directory.is_enabled();
        let sharing = sharing_enabled(&config);
        self.directory.set_enabled(sharing);

        debug!("⚙️ Configuración aplicada");
        *self.config.write() = config;

        if sharing && !was_sharing {
            if let Err(e) = self.share_current_track() {
                warn!("⚠️ No se pudo compartir el track actual: {}", e);
            }
        }
    }

    /// Announces whatever the poller is playing right now.
    ///
    /// Returns `Ok(false)` when nothing is playing or sharing is off.
    pub fn share_current_track(&self) -> Result<bool> {
        match self.poller.current_track() {
            Some(track) => self.sharing.announce(&track),
            None => Ok(false),
        }
    }

    /// Brings the poll worker in line with the current configuration.
    ///
    /// When enabled, a running worker is restarted so new connection settings
    /// take effect at once; when disabled, the worker is stopped.
    pub async fn reconcile(&self) {
        let enabled = self.config.read().enabled;

        if self.poller.is_running() {
            self.poller.stop().await;
        }
        if enabled {
            self.poller.start();
        } else {
            info!("💤 Integración con Cider desactivada");
        }
    }

    /// `apply_config` followed by `reconcile`.
    pub async fn reload(&self, config: Config) {
        self.apply_config(config);
        self.reconcile().await;
    }

    /// Called when the player leaves a world or server: peer records no
    /// longer mean anything.
    pub fn on_session_left(&self) {
        self.directory.clear();
        info!("👋 Sesión cerrada, directorio de tracks vaciado");
    }

    pub async fn on_session_joined(&self) {
        info!("🌍 Sesión iniciada");
        self.reconcile().await;
    }

    pub async fn poll_now(&self) -> bool {
        self.poller.poll_now().await
    }

    /// Stops polling and releases every cached texture.
    pub async fn shutdown(&self) {
        self.poller.stop().await;
        self.artwork.clear();
        info!("🛑 Engine detenido");
    }

    /// Artwork for the track currently playing, or the placeholder.
    pub fn current_artwork(&self) -> ArtworkHandle {
        self.artwork.resolve(self.poller.current_track().as_ref())
    }

    /// Periodic housekeeping: expired artwork and stale peer records.
    pub fn sweep(&self) {
        let textures = self.artwork.purge_expired();
        let peers = self.directory.sweep_and_list_all().len();
        if textures > 0 {
            debug!("🧹 {} texturas expiradas liberadas, {} peers activos", textures, peers);
        }
    }

    pub fn subscribe(&self, listener: Arc<dyn PlaybackListener>) -> SubscriptionId {
        self.dispatcher.subscribe(listener)
    }

    pub fn config(&self) -> Config {
        self.config.read().clone()
    }

    pub fn state(&self) -> PlaybackState {
        self.poller.state()
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    pub fn poller(&self) -> &Arc<Poller> {
        &self.poller
    }

    pub fn artwork(&self) -> &Arc<ArtworkCache> {
        &self.artwork
    }

    pub fn directory(&self) -> &Arc<SharedTrackDirectory> {
        &self.directory
    }

    pub fn sharing(&self) -> &Arc<SharingHandler> {
        &self.sharing
    }

    pub fn history(&self) -> &Arc<TrackHistory> {
        &self.history
    }

    pub fn controls(&self) -> &PlaybackController {
        &self.controls
    }
}

fn sharing_enabled(config: &Config) -> bool {
    config.enabled && config.enable_track_sharing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{client::MockPlaybackSource, events::PlaybackEvent, track::Track};
    use crate::error::CiderError;
    use crate::sharing::{ChannelTransport, SharedTrack, TrackPacket};
    use bytes::Bytes;
    use pretty_assertions::assert_eq;

    struct NullLoader;

    impl ArtworkLoader for NullLoader {
        fn load(&self, _url: &str, _key: &str) {}
        fn release(&self, _key: &str) {}
    }

    fn song() -> Track {
        Track::new(
            "Song A",
            "Artist X",
            "Album Z",
            Some("https://art.example/{w}x{h}.jpg".to_string()),
            200.0,
            12.0,
            "Pop",
        )
    }

    fn playing_source() -> MockPlaybackSource {
        let mut source = MockPlaybackSource::new();
        source.expect_is_active().returning(|_| Ok(()));
        source.expect_is_playing().returning(|_| Ok(true));
        source.expect_now_playing().returning(|_| Ok(song()));
        source
    }

    fn engine_with(
        config: Config,
        source: MockPlaybackSource,
    ) -> (Engine, flume::Receiver<(String, Bytes)>) {
        let (transport, rx) = ChannelTransport::pair();
        let engine = Engine::new(
            config,
            Arc::new(source),
            CiderClient::new().unwrap(),
            Arc::new(NullLoader),
            Arc::new(transport),
        );
        (engine, rx)
    }

    fn sharing_config() -> Config {
        Config {
            enable_track_sharing: true,
            player_id: Some(Uuid::from_u128(7)),
            player_name: "Steve".to_string(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_poll_feeds_sharing_and_history() {
        let (engine, rx) = engine_with(sharing_config(), playing_source());
        engine.reconcile().await;

        assert!(engine.poll_now().await);

        let (_, payload) = rx.try_recv().unwrap();
        let packet = TrackPacket::decode(&payload).unwrap();
        assert_eq!(packet.peer_id, Uuid::from_u128(7));
        assert_eq!(packet.track_name, "Song A");

        let own: SharedTrack = engine.directory().get(&Uuid::from_u128(7)).unwrap();
        assert_eq!(own.peer_name, "Steve");
        assert_eq!(engine.history().last().unwrap().track, song());
        assert!(engine.state().is_playing);
        assert!(!engine.current_artwork().is_placeholder());
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_sharing_off_by_default() {
        let (engine, rx) = engine_with(Config::default(), playing_source());
        engine.reconcile().await;

        assert!(engine.poll_now().await);

        assert!(rx.try_recv().is_err());
        assert!(engine.directory().is_empty());
        assert_eq!(engine.history().len(), 1);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_enabling_sharing_mid_song_announces_it() {
        let (engine, rx) = engine_with(
            Config {
                enable_track_sharing: false,
                ..sharing_config()
            },
            playing_source(),
        );
        engine.reconcile().await;
        assert!(engine.poll_now().await);
        assert!(rx.try_recv().is_err());

        engine.apply_config(sharing_config());

        let (_, payload) = rx.try_recv().unwrap();
        assert_eq!(TrackPacket::decode(&payload).unwrap().track_name, "Song A");
        assert_eq!(
            engine.directory().get(&Uuid::from_u128(7)).unwrap().track_name,
            "Song A"
        );

        // Already on: re-applying does not announce again.
        engine.apply_config(sharing_config());
        assert!(rx.try_recv().is_err());
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_share_current_track_without_track_is_noop() {
        let (engine, rx) = engine_with(sharing_config(), MockPlaybackSource::new());

        assert!(!engine.share_current_track().unwrap());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_poll_now_on_disabled_engine_is_inert() {
        let mut source = MockPlaybackSource::new();
        source.expect_is_active().never();
        source.expect_is_playing().never();
        source.expect_now_playing().never();
        let (engine, _rx) = engine_with(
            Config {
                enabled: false,
                ..Config::default()
            },
            source,
        );
        let (_, events) = engine.dispatcher().subscribe_channel();

        engine.reconcile().await;
        assert!(!engine.poll_now().await);

        assert!(events.try_recv().is_err());
        assert_eq!(engine.state(), PlaybackState::default());
        assert!(engine.history().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_follows_enabled_flag() {
        let (engine, _rx) = engine_with(sharing_config(), playing_source());
        let (_, events) = engine.dispatcher().subscribe_channel();

        engine.reconcile().await;
        assert!(engine.poller().is_running());

        engine
            .reload(Config {
                enabled: false,
                ..sharing_config()
            })
            .await;
        assert!(!engine.poller().is_running());
        assert!(!engine.directory().is_enabled());
        assert!(events
            .try_iter()
            .any(|event| matches!(event, PlaybackEvent::Disconnected)));

        engine.reload(sharing_config()).await;
        assert!(engine.poller().is_running());
        assert!(engine.directory().is_enabled());

        engine.shutdown().await;
        assert!(!engine.poller().is_running());
    }

    #[tokio::test]
    async fn test_disabled_engine_never_polls() {
        // No expectations: any call to the source would panic.
        let (engine, _rx) = engine_with(
            Config {
                enabled: false,
                ..Config::default()
            },
            MockPlaybackSource::new(),
        );

        engine.on_session_joined().await;
        assert!(!engine.poller().is_running());
        assert!(!engine.state().is_initialized);
    }

    #[tokio::test]
    async fn test_apply_config_reaches_poller_and_controls() {
        let (engine, _rx) = engine_with(Config::default(), MockPlaybackSource::new());

        engine.apply_config(Config {
            api_url: "http://10.0.0.5:10767".to_string(),
            require_api_token: true,
            app_token: "abc".to_string(),
            ..Config::default()
        });

        let settings = engine.poller().settings();
        assert_eq!(settings.base_url, "http://10.0.0.5:10767");
        assert_eq!(settings.auth_token(), Some("abc"));
        assert!(!engine.controls().is_enabled());
        assert!(matches!(
            engine.controls().next().await,
            Err(CiderError::ControlsDisabled)
        ));
    }

    #[test]
    fn test_session_left_clears_peer_records() {
        let (engine, _rx) = engine_with(sharing_config(), MockPlaybackSource::new());
        let peer = TrackPacket::new(Uuid::from_u128(2), "Alex", "Song B", "Artist Y", "Album");
        assert!(engine.sharing().receive(peer));
        assert_eq!(engine.directory().len(), 1);

        engine.on_session_left();
        assert!(engine.directory().is_empty());
        assert!(engine.directory().is_enabled());
    }
}
