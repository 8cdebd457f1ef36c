use parking_lot::RwLock;
use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use tracing::{debug, error, warn};

use super::track::Track;

/// Everything the poller reports to the rest of the application.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// A different song (by title and artist) is now current.
    TrackChanged { old: Option<Track>, new: Track },
    PlaybackChanged { playing: bool },
    /// Heartbeat sent every successful cycle while a track is known.
    PositionChanged { current_time: f64, duration: f64 },
    /// The server went away, or the poller itself was stopped.
    Disconnected,
}

impl PlaybackEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            PlaybackEvent::TrackChanged { .. } => "track_changed",
            PlaybackEvent::PlaybackChanged { .. } => "playback_changed",
            PlaybackEvent::PositionChanged { .. } => "position_changed",
            PlaybackEvent::Disconnected => "disconnected",
        }
    }
}

/// Receives playback events on the poll worker.
///
/// Runs synchronously inside the poll cycle, so implementations should stay
/// cheap or forward the event elsewhere (see [`EventDispatcher::subscribe_channel`]).
pub trait PlaybackListener: Send + Sync {
    fn on_event(&self, event: &PlaybackEvent) -> anyhow::Result<()>;

    /// Closed listeners are dropped from the dispatcher after the next event.
    fn is_closed(&self) -> bool {
        false
    }
}

impl<F> PlaybackListener for F
where
    F: Fn(&PlaybackEvent) -> anyhow::Result<()> + Send + Sync,
{
    fn on_event(&self, event: &PlaybackEvent) -> anyhow::Result<()> {
        self(event)
    }
}

/// Forwards events into a `flume` channel for consumers on another task.
struct ChannelListener {
    tx: flume::Sender<PlaybackEvent>,
}

impl PlaybackListener for ChannelListener {
    fn on_event(&self, event: &PlaybackEvent) -> anyhow::Result<()> {
        if self.tx.send(event.clone()).is_err() {
            debug!("Receptor de eventos cerrado, descartando {}", event.kind());
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.tx.is_disconnected()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Typed publish/subscribe hub between the poller and its consumers.
///
/// Delivery is synchronous and follows registration order. Each dispatch
/// works on a snapshot of the subscriber list, so `subscribe` and
/// `unsubscribe` are safe from inside a listener: changes apply from the next
/// event on. A listener that returns an error or panics is logged and the
/// remaining listeners still receive the event.
#[derive(Default)]
pub struct EventDispatcher {
    listeners: RwLock<Vec<(SubscriptionId, Arc<dyn PlaybackListener>)>>,
    next_id: AtomicU64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn PlaybackListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    /// Subscribes an unbounded channel and returns its receiving end.
    pub fn subscribe_channel(&self) -> (SubscriptionId, flume::Receiver<PlaybackEvent>) {
        let (tx, rx) = flume::unbounded();
        let id = self.subscribe(Arc::new(ChannelListener { tx }));
        (id, rx)
    }

    /// Returns `false` when `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    pub fn dispatch(&self, event: &PlaybackEvent) {
        let snapshot: Vec<(SubscriptionId, Arc<dyn PlaybackListener>)> =
            self.listeners.read().clone();

        let mut closed = Vec::new();
        for (id, listener) in &snapshot {
            match panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("⚠️ Listener {:?} falló con {}: {:#}", id, event.kind(), e);
                }
                Err(_) => {
                    error!("❌ Listener {:?} entró en pánico con {}", id, event.kind());
                }
            }
            if listener.is_closed() {
                closed.push(*id);
            }
        }

        if !closed.is_empty() {
            self.listeners
                .write()
                .retain(|(id, _)| !closed.contains(id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::sync::OnceLock;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> Arc<dyn PlaybackListener> {
        let log = log.clone();
        Arc::new(move |event: &PlaybackEvent| -> anyhow::Result<()> {
            log.lock().push(format!("{name}:{}", event.kind()));
            Ok(())
        })
    }

    #[test]
    fn test_delivers_in_registration_order() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        dispatcher.subscribe(recorder(&log, "a"));
        dispatcher.subscribe(recorder(&log, "b"));
        dispatcher.subscribe(recorder(&log, "c"));

        dispatcher.dispatch(&PlaybackEvent::Disconnected);

        assert_eq!(
            *log.lock(),
            vec!["a:disconnected", "b:disconnected", "c:disconnected"]
        );
    }

    #[test]
    fn test_failing_listeners_do_not_block_others() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        dispatcher.subscribe(Arc::new(|_: &PlaybackEvent| -> anyhow::Result<()> {
            anyhow::bail!("boom")
        }));
        dispatcher.subscribe(Arc::new(|_: &PlaybackEvent| -> anyhow::Result<()> {
            panic!("listener panic")
        }));
        dispatcher.subscribe(recorder(&log, "survivor"));

        dispatcher.dispatch(&PlaybackEvent::PlaybackChanged { playing: true });

        assert_eq!(*log.lock(), vec!["survivor:playback_changed"]);
        assert_eq!(dispatcher.len(), 3);
    }

    #[test]
    fn test_unsubscribe_from_inside_a_listener() {
        let dispatcher = Arc::new(EventDispatcher::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let own_id: Arc<OnceLock<SubscriptionId>> = Arc::new(OnceLock::new());

        let hub = dispatcher.clone();
        let id_cell = own_id.clone();
        let once_log = log.clone();
        let id = dispatcher.subscribe(Arc::new(move |event: &PlaybackEvent| -> anyhow::Result<()> {
            once_log.lock().push(format!("once:{}", event.kind()));
            if let Some(id) = id_cell.get() {
                hub.unsubscribe(*id);
            }
            hub.subscribe(Arc::new(|_: &PlaybackEvent| -> anyhow::Result<()> { Ok(()) }));
            Ok(())
        }));
        own_id.set(id).unwrap();
        dispatcher.subscribe(recorder(&log, "steady"));

        dispatcher.dispatch(&PlaybackEvent::Disconnected);
        dispatcher.dispatch(&PlaybackEvent::Disconnected);

        assert_eq!(
            *log.lock(),
            vec!["once:disconnected", "steady:disconnected", "steady:disconnected"]
        );
        assert!(!dispatcher.unsubscribe(id));
    }

    #[test]
    fn test_channel_subscription_forwards_and_prunes() {
        let dispatcher = EventDispatcher::new();
        let (_id, rx) = dispatcher.subscribe_channel();

        dispatcher.dispatch(&PlaybackEvent::PositionChanged {
            current_time: 1.0,
            duration: 2.0,
        });
        assert_eq!(
            rx.try_recv().unwrap(),
            PlaybackEvent::PositionChanged {
                current_time: 1.0,
                duration: 2.0
            }
        );

        drop(rx);
        dispatcher.dispatch(&PlaybackEvent::Disconnected);
        assert!(dispatcher.is_empty());
    }
}
