use parking_lot::{Mutex, RwLock};
use std::{sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    client::{ConnectionSettings, PlaybackSource},
    events::{EventDispatcher, PlaybackEvent},
    track::Track,
};

/// Fixed delay between the start of two poll cycles.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// How long `stop` waits for an in-flight cycle before aborting the worker.
pub const STOP_GRACE: Duration = Duration::from_secs(5);

/// Read-only copy of the poller's view of Cider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackState {
    pub current_track: Option<Track>,
    pub is_playing: bool,
    pub is_initialized: bool,
}

/// State owned by the poll cycle.
#[derive(Debug, Default)]
struct CycleState {
    current: Option<Track>,
    last_track_id: Option<String>,
    is_playing: bool,
}

impl CycleState {
    /// Stores a successful poll and returns the events it produced, in
    /// delivery order.
    fn apply(&mut self, track: Track, playing: bool) -> Vec<PlaybackEvent> {
        let mut events = Vec::with_capacity(3);

        let track_id = track.id();
        if self.last_track_id.as_deref() != Some(track_id.as_str()) {
            let old = self.current.replace(track.clone());
            self.last_track_id = Some(track_id);
            events.push(PlaybackEvent::TrackChanged {
                old,
                new: track.clone(),
            });
        } else {
            // Same song: keep the fresher position and duration.
            self.current = Some(track.clone());
        }

        if self.is_playing != playing {
            self.is_playing = playing;
            events.push(PlaybackEvent::PlaybackChanged { playing });
        }

        events.push(PlaybackEvent::PositionChanged {
            current_time: track.current_time(),
            duration: track.duration(),
        });
        events
    }

    /// Forgets everything. Returns whether a track was known.
    fn reset(&mut self) -> bool {
        let had_track = self.current.is_some();
        *self = CycleState::default();
        had_track
    }
}

struct Shared {
    source: Arc<dyn PlaybackSource>,
    dispatcher: Arc<EventDispatcher>,
    settings: RwLock<ConnectionSettings>,
    state: RwLock<CycleState>,
    // Cycles never overlap, whether they come from the worker or `poll_now`.
    cycle_lock: tokio::sync::Mutex<()>,
}

impl Shared {
    async fn poll_cycle(&self) {
        let _cycle = self.cycle_lock.lock().await;
        self.run_cycle().await;
    }

    /// Body of one cycle. Callers hold `cycle_lock`.
    async fn run_cycle(&self) {
        let conn = self.settings.read().clone();

        if let Err(e) = self.source.is_active(&conn).await {
            debug!("🔌 Cider no responde en {}: {}", conn.base_url, e);
            self.handle_disconnect();
            return;
        }

        let playing = self.source.is_playing(&conn).await.unwrap_or_else(|e| {
            debug!("Estado de reproducción no disponible: {}", e);
            false
        });

        let track = match self.source.now_playing(&conn).await {
            Ok(track) => track,
            Err(e) => {
                warn!("⚠️ Error obteniendo now-playing: {}", e);
                self.handle_disconnect();
                return;
            }
        };

        let events = self.state.write().apply(track, playing);
        for event in &events {
            if let PlaybackEvent::TrackChanged { new, .. } = event {
                info!("🎵 Reproduciendo: {}", new);
            }
            self.dispatcher.dispatch(event);
        }
    }

    fn handle_disconnect(&self) {
        let had_track = self.state.write().reset();
        if had_track {
            info!("🔌 Cider desconectado");
            self.dispatcher.dispatch(&PlaybackEvent::Disconnected);
        }
    }
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Polls Cider on a fixed cadence and turns state transitions into events.
///
/// `Stopped → Running` on [`Poller::start`], `Running → Stopped` on
/// [`Poller::stop`]; both are no-ops when already in the target state.
pub struct Poller {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl Poller {
    pub fn new(
        source: Arc<dyn PlaybackSource>,
        dispatcher: Arc<EventDispatcher>,
        settings: ConnectionSettings,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                source,
                dispatcher,
                settings: RwLock::new(settings),
                state: RwLock::new(CycleState::default()),
                cycle_lock: tokio::sync::Mutex::new(()),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Replaces the connection parameters used from the next cycle on.
    pub fn configure(
        &self,
        base_url: impl Into<String>,
        token: Option<String>,
        require_token: bool,
    ) {
        let settings = ConnectionSettings::new(base_url, token, require_token);
        debug!("⚙️ Conexión configurada: {:?}", settings);
        *self.shared.settings.write() = settings;
    }

    pub fn settings(&self) -> ConnectionSettings {
        self.shared.settings.read().clone()
    }

    /// Starts the poll worker; the first probe runs immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_worker(self.shared.clone(), cancel.clone()));
        *worker = Some(Worker { cancel, handle });
        info!(
            "▶️ Poller iniciado contra {}",
            self.shared.settings.read().base_url
        );
    }

    /// Stops the worker, clears the playback state and fires `Disconnected`.
    pub async fn stop(&self) {
        let Some(Worker { cancel, mut handle }) = self.worker.lock().take() else {
            return;
        };

        cancel.cancel();
        if tokio::time::timeout(STOP_GRACE, &mut handle).await.is_err() {
            warn!("⏱️ El ciclo en curso no terminó a tiempo, abortando worker");
            handle.abort();
            // Wait for the aborted task to drop its cycle guard.
            let _ = handle.await;
        }

        // A `poll_now` cycle already in flight finishes before the reset.
        let _cycle = match tokio::time::timeout(STOP_GRACE, self.shared.cycle_lock.lock()).await {
            Ok(guard) => Some(guard),
            Err(_) => {
                warn!("⏱️ poll_now sigue en curso, reiniciando estado igualmente");
                None
            }
        };
        self.shared.state.write().reset();
        info!("⏹️ Poller detenido");
        self.shared.dispatcher.dispatch(&PlaybackEvent::Disconnected);
    }

    /// Runs one probe right away, e.g. for a "click to retry" action.
    ///
    /// Does nothing while stopped. Returns whether a cycle ran.
    pub async fn poll_now(&self) -> bool {
        let _cycle = self.shared.cycle_lock.lock().await;
        if !self.is_running() {
            debug!("Poller detenido, poll_now ignorado");
            return false;
        }
        self.shared.run_cycle().await;
        true
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    pub fn current_track(&self) -> Option<Track> {
        self.shared.state.read().current.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.shared.state.read().is_playing
    }

    pub fn state(&self) -> PlaybackState {
        let state = self.shared.state.read();
        PlaybackState {
            current_track: state.current.clone(),
            is_playing: state.is_playing,
            is_initialized: self.is_running(),
        }
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.shared.dispatcher
    }
}

async fn run_worker(shared: Arc<Shared>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    // A slow cycle pushes the schedule back instead of bunching ticks.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => shared.poll_cycle().await,
        }
    }
    debug!("Worker de polling finalizado");
}
