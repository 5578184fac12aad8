//! Realtime push channel subsystem.
//!
//! # Data Flow
//! ```text
//! WebSocket upgrade (http/websocket.rs)
//!     → hub.rs (register subscriber, bounded queue)
//!     → jobs / handlers broadcast ChannelEvent
//!     → each connection forwards queued events as text frames
//!
//! Shutdown (teardown.rs):
//!     broadcast ServerShutdown → wait grace period → close_all
//! ```

pub mod hub;
pub mod teardown;

pub use hub::{ChannelEvent, ChannelHub, ChannelRegistry, SubscriberId, Subscription};
pub use teardown::{ChannelTeardown, CHANNEL_GRACE_PERIOD};
