//! # API Module
//!
//! Client side of Cider's RPC server.
//!
//! ### [`poller`] - State Synchronization
//! - Probes `active`, `is-playing` and `now-playing` once per second
//! - Detects track, play/pause and connectivity transitions
//!
//! ### [`events`] - Event Dispatch
//! - Typed [`PlaybackEvent`]s delivered in registration order
//! - Per-listener failure isolation
//!
//! ### [`track`] - Track Model
//! - Normalized [`Track`] built from the now-playing document
//!
//! ### [`controls`] - Playback Commands
//! - Optional play/pause/seek/volume endpoints, gated by configuration

pub mod client;
pub mod controls;
pub mod events;
pub mod poller;
pub mod track;

pub use client::{CiderClient, ConnectionSettings, PlaybackSource, DEFAULT_API_URL};
pub use controls::{PlaybackCommand, PlaybackController};
pub use events::{EventDispatcher, PlaybackEvent, PlaybackListener, SubscriptionId};
pub use poller::{PlaybackState, Poller, POLL_INTERVAL};
pub use track::Track;
