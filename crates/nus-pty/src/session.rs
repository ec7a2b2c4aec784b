use std::io::{ErrorKind, Read, Write};
use std::os::fd::{BorrowedFd, RawFd};

use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::termios::{tcgetattr, tcsetattr, LocalFlags, SetArg};
use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize};

use crate::config::{resolve_program, ShellConfig};

/// Errors from PTY operations.
///
/// Everything here is fatal for the session: steady-state read and write
/// failures are swallowed inside [`PtySession`] and never surface as errors.
#[derive(Debug, thiserror::Error)]
pub enum PtyError {
    #[error("failed to open PTY: {0}")]
    OpenFailed(String),
    #[error("shell not found: {0}")]
    ShellNotFound(String),
    #[error("failed to spawn shell: {0}")]
    SpawnFailed(String),
    #[error("PTY resize failed: {0}")]
    ResizeFailed(String),
    #[error("PTY I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A login shell attached to a pseudo-terminal.
///
/// Owns the child process and the PTY master. The master is switched to
/// non-blocking mode at spawn, so [`read`](Self::read) and
/// [`write`](Self::write) never wait on the shell. Both resources are released
/// together: [`terminate`](Self::terminate) hangs up the child and reaps it,
/// and dropping the session closes the master.
pub struct PtySession {
    master: Box<dyn MasterPty + Send>,
    reader: Box<dyn Read + Send>,
    writer: Box<dyn Write + Send>,
    child: Box<dyn Child + Send + Sync>,
    master_fd: RawFd,
    pid: Option<u32>,
    read_buf: usize,
    terminated: bool,
    exit_code: Option<u32>,
}

impl PtySession {
    /// Spawn the configured shell on a freshly allocated PTY pair.
    ///
    /// The terminal is put in canonical mode with local echo before the shell
    /// starts. Fails if the shell binary cannot be found or the PTY cannot be
    /// allocated; neither is recoverable.
    pub fn spawn(config: &ShellConfig) -> Result<Self, PtyError> {
        let program = config.program();
        let resolved =
            resolve_program(&program).ok_or_else(|| PtyError::ShellNotFound(program.clone()))?;

        let pair = native_pty_system()
            .openpty(PtySize {
                rows: config.rows,
                cols: config.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::OpenFailed(e.to_string()))?;

        let master_fd = pair
            .master
            .as_raw_fd()
            .ok_or_else(|| PtyError::OpenFailed("master has no file descriptor".to_string()))?;
        set_line_discipline(master_fd)?;

        let mut cmd = CommandBuilder::new(&resolved);
        cmd.args(config.args());
        if let Ok(cwd) = std::env::current_dir() {
            cmd.cwd(cwd);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::SpawnFailed(format!("{}: {e}", resolved.display())))?;
        // The child holds its own copy of the secondary side.
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::OpenFailed(format!("failed to clone reader: {e}")))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::OpenFailed(format!("failed to take writer: {e}")))?;

        // Reader and writer are dups of the master, so they share this flag.
        set_nonblocking(master_fd)?;

        let pid = child.process_id();
        log::info!("spawned {} on PTY (pid {:?})", resolved.display(), pid);

        Ok(Self {
            master: pair.master,
            reader,
            writer,
            child,
            master_fd,
            pid,
            read_buf: config.read_buf.max(1),
            terminated: false,
            exit_code: None,
        })
    }

    /// Write peer input to the shell.
    ///
    /// Issues a single non-blocking write and returns how many bytes the
    /// terminal accepted. Whatever did not fit is dropped, and write errors
    /// count as zero bytes accepted.
    pub fn write(&mut self, data: &[u8]) -> usize {
        if self.terminated || data.is_empty() {
            return 0;
        }

        match self.writer.write(data) {
            Ok(n) => {
                if n < data.len() {
                    log::debug!("PTY accepted {n} of {} input bytes, dropping rest", data.len());
                }
                n
            }
            Err(err) => {
                log::debug!("PTY write dropped {} bytes: {err}", data.len());
                0
            }
        }
    }

    /// Read whatever shell output is ready, without waiting.
    ///
    /// Returns at most `read_buf` bytes. An empty result means no data was
    /// ready, the descriptor is closed, or the read failed; callers just poll
    /// again on their next tick.
    pub fn read(&mut self) -> Vec<u8> {
        if self.terminated || !self.poll_readable() {
            return Vec::new();
        }

        let mut buf = vec![0u8; self.read_buf];
        match self.reader.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                buf
            }
            Err(err) => {
                if err.kind() != ErrorKind::WouldBlock {
                    log::trace!("PTY read returned no data: {err}");
                }
                Vec::new()
            }
        }
    }

    /// Hang up the shell and reap it.
    ///
    /// Best effort and idempotent: a second call, or a call after the child
    /// already exited, does nothing.
    pub fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;

        if self.refresh_exit().is_none() {
            // SIGHUP, a short grace period, then SIGKILL.
            match self.child.kill() {
                Ok(()) => match self.child.wait() {
                    Ok(status) => self.exit_code = Some(status.exit_code()),
                    Err(err) => log::debug!("failed to reap shell: {err}"),
                },
                Err(err) => {
                    log::debug!("shell already gone: {err}");
                    self.refresh_exit();
                }
            }
        }

        log::info!(
            "shell terminated (pid {:?}, exit code {:?})",
            self.pid,
            self.exit_code
        );
    }

    /// Resize the terminal.
    pub fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError> {
        self.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::ResizeFailed(e.to_string()))
    }

    /// Check if the child process is still running.
    ///
    /// Always `false` once [`terminate`](Self::terminate) has been called.
    pub fn is_alive(&mut self) -> bool {
        !self.terminated && self.refresh_exit().is_none()
    }

    /// Exit code of the shell, if it has exited.
    pub fn exit_code(&mut self) -> Option<u32> {
        self.refresh_exit()
    }

    /// Process id of the shell.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn refresh_exit(&mut self) -> Option<u32> {
        if self.exit_code.is_none() {
            if let Ok(Some(status)) = self.child.try_wait() {
                self.exit_code = Some(status.exit_code());
            }
        }
        self.exit_code
    }

    fn poll_readable(&self) -> bool {
        // SAFETY: `master_fd` belongs to `self.master`, which outlives this borrow.
        let fd = unsafe { BorrowedFd::borrow_raw(self.master_fd) };
        let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
        match poll(&mut fds, PollTimeout::ZERO) {
            Ok(n) if n > 0 => fds[0].revents().is_some_and(|r| {
                r.intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR)
            }),
            _ => false,
        }
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        self.terminate();
    }
}

impl std::fmt::Debug for PtySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtySession")
            .field("master_fd", &self.master_fd)
            .field("pid", &self.pid)
            .field("terminated", &self.terminated)
            .field("exit_code", &self.exit_code)
            .finish()
    }
}

/// Canonical line editing with local echo.
fn set_line_discipline(fd: RawFd) -> Result<(), PtyError> {
    // SAFETY: the caller keeps the master open for the duration of this call.
    let fd = unsafe { BorrowedFd::borrow_raw(fd) };
    let mut attrs = tcgetattr(fd).map_err(|e| PtyError::OpenFailed(format!("tcgetattr: {e}")))?;
    attrs.local_flags |= LocalFlags::ICANON | LocalFlags::ECHO;
    tcsetattr(fd, SetArg::TCSANOW, &attrs)
        .map_err(|e| PtyError::OpenFailed(format!("tcsetattr: {e}")))
}

fn set_nonblocking(fd: RawFd) -> Result<(), PtyError> {
    let flags = fcntl(fd, FcntlArg::F_GETFL).map_err(std::io::Error::from)?;
    let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(fd, FcntlArg::F_SETFL(flags)).map_err(std::io::Error::from)?;
    Ok(())
}
