//! nus-pty: the shell side of the nus-shell bridge.
//!
//! Owns a login shell attached to a pseudo-terminal and exposes the three
//! operations the bridge needs: a non-blocking poll-then-read of shell output,
//! a single non-blocking write of peer input, and an idempotent terminate.
//!
//! # Architecture
//!
//! - [`PtySession`] — the child process, its PTY master, and liveness tracking.
//! - [`ShellConfig`] — which shell to start and how big the terminal is.

pub mod config;
pub mod session;

pub use config::ShellConfig;
pub use session::{PtyError, PtySession};
