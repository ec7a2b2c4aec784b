use nus_pty::PtySession;

/// Where peer input goes.
pub trait ShellInput {
    /// Write `data` without blocking; returns the bytes accepted.
    fn write(&mut self, data: &[u8]) -> usize;
}

/// The shell end of the bridge.
pub trait Shell: ShellInput {
    /// Ready output, or empty when there is none.
    fn read(&mut self) -> Vec<u8>;

    fn is_alive(&mut self) -> bool;

    fn exit_code(&mut self) -> Option<u32>;

    /// Best-effort, idempotent teardown.
    fn terminate(&mut self);
}

impl ShellInput for PtySession {
    fn write(&mut self, data: &[u8]) -> usize {
        PtySession::write(self, data)
    }
}

impl Shell for PtySession {
    fn read(&mut self) -> Vec<u8> {
        PtySession::read(self)
    }

    fn is_alive(&mut self) -> bool {
        PtySession::is_alive(self)
    }

    fn exit_code(&mut self) -> Option<u32> {
        PtySession::exit_code(self)
    }

    fn terminate(&mut self) {
        PtySession::terminate(self)
    }
}
