//! The bridge pump: drains shell output on a fixed tick and applies peer
//! events as they arrive.
//!
//! Ticks and peer events run on one task, so the shell and the subscription
//! flag are never touched concurrently and need no lock.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::chunk::chunk;
use crate::notify::{NotifyChannel, NotifySink};
use crate::shell::Shell;
use crate::transport::PeerEvent;
use crate::write::WriteChannel;

/// What a tick found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    /// No shell output.
    Idle,
    /// Output read but nobody subscribed; frames were discarded.
    Draining,
    /// Output read and pushed to the subscribed peer.
    Forwarding,
}

/// Why [`run_bridge`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The shutdown future resolved (Ctrl-C).
    Interrupted,
    /// The shell exited on its own.
    ShellExited(Option<u32>),
    /// The transport dropped its event sender.
    TransportClosed,
}

/// Ties one shell to one notify/write channel pair.
#[derive(Debug)]
pub struct BridgePump<S, N> {
    shell: S,
    notify: NotifyChannel<N>,
    write: WriteChannel,
    max_chunk: usize,
}

impl<S: Shell, N: NotifySink> BridgePump<S, N> {
    /// # Panics
    ///
    /// Panics if `max_chunk` is zero.
    pub fn new(shell: S, sink: N, max_chunk: usize) -> Self {
        assert!(max_chunk > 0, "frame size must be non-zero");
        Self {
            shell,
            notify: NotifyChannel::new(sink),
            write: WriteChannel::new(),
            max_chunk,
        }
    }

    /// One pump cycle: a single bounded read, chunked and pushed.
    ///
    /// Frames pushed while the peer is unsubscribed are gone; the shell keeps
    /// running regardless of whether anyone is reading.
    pub fn tick(&mut self) -> PumpState {
        let output = self.shell.read();
        if output.is_empty() {
            return PumpState::Idle;
        }

        let state = if self.notify.is_subscribed() {
            PumpState::Forwarding
        } else {
            PumpState::Draining
        };

        for frame in chunk(&output, self.max_chunk) {
            self.notify.push(frame);
        }

        log::trace!("pump {state:?}: {} bytes", output.len());
        state
    }

    /// Apply one peer event immediately.
    pub fn handle_event(&mut self, event: PeerEvent) {
        match event {
            PeerEvent::Write(frame) => {
                self.write.deliver(&mut self.shell, &frame);
            }
            PeerEvent::Subscribe => self.notify.set_subscribed(true),
            PeerEvent::Unsubscribe => self.notify.set_subscribed(false),
            PeerEvent::Read => self.notify.respond_read(),
        }
    }

    pub fn shell_alive(&mut self) -> bool {
        self.shell.is_alive()
    }

    pub fn exit_code(&mut self) -> Option<u32> {
        self.shell.exit_code()
    }

    /// Tear the shell down. In-flight frames are abandoned.
    pub fn shutdown(&mut self) {
        self.shell.terminate();
    }

    pub fn notify(&self) -> &NotifyChannel<N> {
        &self.notify
    }

    pub fn write_channel(&self) -> &WriteChannel {
        &self.write
    }

    pub fn shell(&self) -> &S {
        &self.shell
    }
}

/// Drive `pump` until shutdown, shell exit, or transport loss.
///
/// Each `period` the pump ticks; peer events are handled as soon as they
/// arrive, independent of the tick. Missed ticks are skipped rather than
/// bunched up. The shell is terminated before this returns.
pub async fn run_bridge<S, N, F>(
    pump: &mut BridgePump<S, N>,
    events: &mut mpsc::Receiver<PeerEvent>,
    period: Duration,
    shutdown: F,
) -> StopReason
where
    S: Shell,
    N: NotifySink,
    F: Future<Output = ()>,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    let reason = loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => break StopReason::Interrupted,

            event = events.recv() => match event {
                Some(event) => pump.handle_event(event),
                None => break StopReason::TransportClosed,
            },

            _ = interval.tick() => {
                pump.tick();
                if !pump.shell_alive() {
                    break StopReason::ShellExited(pump.exit_code());
                }
            }
        }
    };

    log::info!("bridge stopping: {reason:?}");
    pump.shutdown();
    reason
}
