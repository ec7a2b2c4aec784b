/// Outward side of the notify characteristic.
///
/// Implemented by whatever actually transmits to the peer. Both calls are
/// fire-and-forget: there is no acknowledgement and no backpressure.
pub trait NotifySink {
    /// Transmit one frame to the subscribed peer.
    fn notify(&mut self, frame: &[u8]);

    /// Answer a peer read of the characteristic value.
    fn read_response(&mut self, _value: &[u8]) {}
}

/// Egress channel: bridge -> peer.
///
/// Holds the subscription flag and the last pushed value. A push while the
/// peer is not subscribed only updates the value; nothing is queued for later.
#[derive(Debug)]
pub struct NotifyChannel<S> {
    sink: S,
    subscribed: bool,
    value: Vec<u8>,
    pushed: u64,
    notified: u64,
}

impl<S: NotifySink> NotifyChannel<S> {
    /// Create an unsubscribed channel over `sink`.
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            subscribed: false,
            value: Vec::new(),
            pushed: 0,
            notified: 0,
        }
    }

    /// Apply a subscribe (`true`) or unsubscribe (`false`) from the peer.
    pub fn set_subscribed(&mut self, subscribed: bool) {
        if self.subscribed != subscribed {
            log::info!(
                "peer {} notifications",
                if subscribed { "subscribed to" } else { "unsubscribed from" }
            );
        }
        self.subscribed = subscribed;
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Push one frame.
    ///
    /// The value is always updated; the frame only goes out if the peer is
    /// subscribed. Returns whether a notification was sent.
    pub fn push(&mut self, frame: &[u8]) -> bool {
        self.value.clear();
        self.value.extend_from_slice(frame);
        self.pushed += 1;

        if !self.subscribed {
            return false;
        }
        self.sink.notify(frame);
        self.notified += 1;
        true
    }

    /// Current characteristic value (the last pushed frame).
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Hand the current value to the peer that asked for it.
    pub fn respond_read(&mut self) {
        self.sink.read_response(&self.value);
    }

    pub fn frames_pushed(&self) -> u64 {
        self.pushed
    }

    pub fn notifications_sent(&self) -> u64 {
        self.notified
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
