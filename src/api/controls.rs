use parking_lot::RwLock;
use reqwest::Method;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

use super::client::{is_success, CiderClient, ConnectionSettings};
use crate::error::{CiderError, Result};

/// Playback commands Cider may accept.
///
/// Current Cider releases do not document these endpoints, so the controller
/// is off unless `enable_playback_controls` is set; every call then returns
/// [`CiderError::ControlsDisabled`] without touching the network.
pub struct PlaybackController {
    client: CiderClient,
    settings: RwLock<ConnectionSettings>,
    enabled: AtomicBool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackCommand {
    Play,
    Pause,
    PlayPause,
    Next,
    Previous,
}

impl PlaybackCommand {
    pub fn path(self) -> &'static str {
        match self {
            PlaybackCommand::Play => "/api/v1/playback/play",
            PlaybackCommand::Pause => "/api/v1/playback/pause",
            PlaybackCommand::PlayPause => "/api/v1/playback/playpause",
            PlaybackCommand::Next => "/api/v1/playback/next",
            PlaybackCommand::Previous => "/api/v1/playback/previous",
        }
    }
}

const SEEK_PATH: &str = "/api/v1/playback/seek";
const VOLUME_PATH: &str = "/api/v1/playback/volume";

impl PlaybackController {
    pub fn new(client: CiderClient, settings: ConnectionSettings, enabled: bool) -> Self {
        Self {
            client,
            settings: RwLock::new(settings),
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn configure(&self, settings: ConnectionSettings, enabled: bool) {
        *self.settings.write() = settings;
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub async fn play(&self) -> Result<()> {
        self.send(PlaybackCommand::Play).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.send(PlaybackCommand::Pause).await
    }

    pub async fn toggle_play_pause(&self) -> Result<()> {
        self.send(PlaybackCommand::PlayPause).await
    }

    pub async fn next(&self) -> Result<()> {
        self.send(PlaybackCommand::Next).await
    }

    pub async fn previous(&self) -> Result<()> {
        self.send(PlaybackCommand::Previous).await
    }

    /// Seeks to `seconds` from the start of the track.
    pub async fn seek(&self, seconds: f64) -> Result<()> {
        let seconds = seconds.max(0.0);
        self.post(SEEK_PATH, Some(("position", seconds))).await
    }

    /// Sets the volume, clamped to `[0.0, 1.0]`.
    pub async fn set_volume(&self, level: f64) -> Result<()> {
        let level = level.clamp(0.0, 1.0);
        self.post(VOLUME_PATH, Some(("level", level))).await
    }

    pub async fn send(&self, command: PlaybackCommand) -> Result<()> {
        self.post(command.path(), None).await
    }

    async fn post(&self, path: &str, param: Option<(&str, f64)>) -> Result<()> {
        if !self.is_enabled() {
            return Err(CiderError::ControlsDisabled);
        }

        let conn = self.settings.read().clone();
        let mut request = self.client.request(Method::POST, &conn, path);
        if let Some((name, value)) = param {
            request = request.query(&[(name, value)]);
        }

        debug!("🎛️ POST {}", path);
        let response = request.send().await.inspect_err(|e| {
            warn!("❌ Comando {} falló: {}", path, e);
        })?;

        let status = response.status();
        if is_success(status) {
            Ok(())
        } else {
            warn!("❌ Comando {} rechazado con HTTP {}", path, status);
            Err(CiderError::status(path, status))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_controller_never_calls_out() {
        // Unroutable address: a network attempt would surface as Http, not ControlsDisabled.
        let settings = ConnectionSettings::new("http://192.0.2.1:1", None, false);
        let controller = PlaybackController::new(CiderClient::new().unwrap(), settings, false);

        assert!(matches!(controller.play().await, Err(CiderError::ControlsDisabled)));
        assert!(matches!(controller.seek(30.0).await, Err(CiderError::ControlsDisabled)));
        assert!(matches!(
            controller.set_volume(0.4).await,
            Err(CiderError::ControlsDisabled)
        ));
    }

    #[test]
    fn test_command_paths() {
        assert_eq!(PlaybackCommand::PlayPause.path(), "/api/v1/playback/playpause");
        assert_eq!(PlaybackCommand::Previous.path(), "/api/v1/playback/previous");
    }

    #[test]
    fn test_configure_toggles_gate() {
        let controller =
            PlaybackController::new(CiderClient::new().unwrap(), ConnectionSettings::default(), false);
        assert!(!controller.is_enabled());
        controller.configure(ConnectionSettings::default(), true);
        assert!(controller.is_enabled());
    }
}
