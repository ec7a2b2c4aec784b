//! nus-bridge: the stream bridge between a PTY shell and a notify/write
//! characteristic pair.
//!
//! Shell output is drained on a fixed tick, split into frames no larger than
//! the transport payload limit, and pushed out through the notify channel,
//! which only transmits while the peer is subscribed. Peer writes go straight
//! into the shell as they arrive.
//!
//! # Architecture
//!
//! - [`chunk`] — pure frame splitting.
//! - [`NotifyChannel`] — egress: subscription flag, last value, outward sink.
//! - [`WriteChannel`] — ingress: forwards non-empty frames to the shell.
//! - [`BridgePump`] / [`run_bridge`] — the single control flow tying them together.
//! - [`Transport`] / [`register_with_fallback`] — the boundary to whatever
//!   actually carries frames to the peer.

pub mod chunk;
pub mod error;
pub mod identity;
pub mod notify;
pub mod pump;
pub mod shell;
pub mod transport;
pub mod write;

#[cfg(test)]
pub(crate) mod testing;

pub use chunk::{chunk, frame_count};
pub use error::BridgeError;
pub use identity::{DEFAULT_TICK, MAX_CHUNK};
pub use notify::{NotifyChannel, NotifySink};
pub use pump::{run_bridge, BridgePump, PumpState, StopReason};
pub use shell::{Shell, ShellInput};
pub use transport::{
    register_with_fallback, ChannelSink, Outbound, PeerEvent, Registration, Transport,
    TransportEnd, TransportError, TransportLink,
};
pub use write::WriteChannel;
