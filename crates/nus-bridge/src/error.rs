use nus_pty::PtyError;

use crate::transport::TransportError;

/// Fatal bridge errors. Anything that reaches here ends the process.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Pty(#[from] PtyError),

    #[error("transport registration failed (primary: {primary}; fallback: {fallback})")]
    Registration {
        primary: TransportError,
        fallback: TransportError,
    },
}
