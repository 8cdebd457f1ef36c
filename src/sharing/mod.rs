//! # Sharing Module
//!
//! "Who is listening to what" between nearby players.
//!
//! ## Features
//!
//! - **Per-peer Expiry**: every announcement lives 30 seconds from receipt
//! - **Concurrent Directory**: poll worker, packet receiver and render path
//!   may all touch it at once
//! - **Wire Format**: compact binary [`TrackPacket`] on the `cider:track_share`
//!   channel
//!
//! The transport that moves packets between players is not part of this crate;
//! [`TrackTransport`] is the seam it plugs into.

pub mod directory;
pub mod network;
pub mod packet;
pub mod record;

pub use directory::SharedTrackDirectory;
pub use network::{ChannelTransport, LocalPeer, SharingHandler, TrackTransport};
pub use packet::TrackPacket;
pub use record::{SharedTrack, SHARE_TTL};
