//! Boundary between the bridge and whatever carries frames to the peer.
//!
//! A [`Transport`] registers the notify/write characteristic pair with the
//! underlying stack and hands back a [`TransportLink`]: a receiver of peer
//! events and a sink for outbound frames. The transport side keeps the
//! matching [`TransportEnd`].

use std::fmt;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::BridgeError;
use crate::notify::NotifySink;

/// Inbound events from the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// A write to the RX characteristic.
    Write(Vec<u8>),
    /// The peer enabled notifications on the TX characteristic.
    Subscribe,
    /// The peer disabled notifications, or went away.
    Unsubscribe,
    /// The peer read the TX characteristic value.
    Read,
}

/// Outbound messages from the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Notify(Vec<u8>),
    ReadResponse(Vec<u8>),
}

/// Which registration path to attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Primary,
    Fallback,
}

impl fmt::Display for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Registration::Primary => write!(f, "primary"),
            Registration::Fallback => write!(f, "fallback"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// Registers the characteristic pair with the underlying stack.
pub trait Transport {
    fn register(&mut self, registration: Registration) -> Result<TransportLink, TransportError>;
}

/// Bridge-side half of a registered transport.
#[derive(Debug)]
pub struct TransportLink {
    pub events: mpsc::Receiver<PeerEvent>,
    pub sink: ChannelSink,
}

/// Transport-side half of a registered transport.
#[derive(Debug)]
pub struct TransportEnd {
    pub events: mpsc::Sender<PeerEvent>,
    pub outbound: mpsc::Receiver<Outbound>,
}

impl TransportLink {
    /// Create a connected link/end pair with bounded queues in each direction.
    pub fn channel(capacity: usize) -> (TransportLink, TransportEnd) {
        let (event_tx, event_rx) = mpsc::channel(capacity);
        let (out_tx, out_rx) = mpsc::channel(capacity);
        (
            TransportLink {
                events: event_rx,
                sink: ChannelSink::new(out_tx),
            },
            TransportEnd {
                events: event_tx,
                outbound: out_rx,
            },
        )
    }
}

/// [`NotifySink`] over a bounded channel.
///
/// Never waits: if the queue is full or the transport is gone, the frame is
/// dropped.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Outbound>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Outbound>) -> Self {
        Self { tx }
    }

    fn send(&self, message: Outbound) {
        match self.tx.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => log::trace!("outbound queue full, frame dropped"),
            Err(TrySendError::Closed(_)) => log::trace!("transport closed, frame dropped"),
        }
    }
}

impl NotifySink for ChannelSink {
    fn notify(&mut self, frame: &[u8]) {
        self.send(Outbound::Notify(frame.to_vec()));
    }

    fn read_response(&mut self, value: &[u8]) {
        self.send(Outbound::ReadResponse(value.to_vec()));
    }
}

/// Register through the primary path, falling back exactly once.
///
/// Returns the link and the path that succeeded. If both paths fail the
/// error carries both causes.
pub fn register_with_fallback<T: Transport + ?Sized>(
    transport: &mut T,
) -> Result<(TransportLink, Registration), BridgeError> {
    let primary = match transport.register(Registration::Primary) {
        Ok(link) => return Ok((link, Registration::Primary)),
        Err(e) => e,
    };

    log::warn!("primary registration failed: {primary}; trying fallback");

    match transport.register(Registration::Fallback) {
        Ok(link) => Ok((link, Registration::Fallback)),
        Err(fallback) => Err(BridgeError::Registration { primary, fallback }),
    }
}
