use crate::shell::ShellInput;

/// Ingress channel: peer -> shell.
///
/// Forwards each non-empty frame verbatim, in delivery order. Empty frames
/// are ignored.
#[derive(Debug, Default)]
pub struct WriteChannel {
    forwarded: u64,
}

impl WriteChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward one peer frame to `target`. Returns whether it was forwarded.
    pub fn deliver<W: ShellInput + ?Sized>(&mut self, target: &mut W, frame: &[u8]) -> bool {
        if frame.is_empty() {
            return false;
        }

        let accepted = target.write(frame);
        if accepted < frame.len() {
            log::debug!(
                "shell took {accepted} of {} peer bytes, rest dropped",
                frame.len()
            );
        }
        self.forwarded += 1;
        true
    }

    pub fn frames_forwarded(&self) -> u64 {
        self.forwarded
    }
}
