//! Profiler control channel
//!
//! The windowed strategy hands the profiler a *control* FIFO (commands in)
//! and an *acknowledgement* FIFO (confirmations out). Both must exist on
//! disk before the profiler starts and must be gone once the invocation
//! ends, crashed or not. [`ControlChannel`] scopes the pair: creation is
//! remove-then-recreate so stale channels left by a crashed run never block
//! the next one, and `Drop` removes both paths on every exit path.

use std::fs::{File, OpenOptions};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;

use crate::error::{Error, Result};

/// File name of the control FIFO.
pub const CTL_NAME: &str = "perf_fifo.ctl";

/// File name of the acknowledgement FIFO.
pub const ACK_NAME: &str = "perf_fifo.ack";

/// A control/acknowledgement FIFO pair scoped to one profiled invocation.
///
/// Both FIFOs are opened read-write by the harness. A FIFO opened `O_RDWR`
/// never blocks waiting for a peer, and the open descriptors keep the pipe
/// alive for the profiler regardless of which end it opens first. The
/// descriptors have close-on-exec cleared so the spawned profiler inherits
/// them at the numbers reported by [`ctl_fd`](Self::ctl_fd) and
/// [`ack_fd`](Self::ack_fd).
#[derive(Debug)]
pub struct ControlChannel {
    ctl_path: PathBuf,
    ack_path: PathBuf,
    ctl: File,
    ack: File,
}

impl ControlChannel {
    /// Create the FIFO pair under `dir`.
    ///
    /// Stale channels from a previous crashed invocation are removed before
    /// creation, so a leftover `perf_fifo.ctl`/`perf_fifo.ack` of any file
    /// type is recovered from rather than fatal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Channel`] when a FIFO cannot be created or opened,
    /// or when its descriptor cannot be marked inheritable.
    pub fn create(dir: &Path) -> Result<Self> {
        let ctl_path = dir.join(CTL_NAME);
        let ack_path = dir.join(ACK_NAME);

        remove_stale(&ctl_path)?;
        remove_stale(&ack_path)?;

        let opened: Result<(File, File)> = (|| {
            make_fifo(&ctl_path)?;
            make_fifo(&ack_path)?;
            Ok((open_inheritable(&ctl_path)?, open_inheritable(&ack_path)?))
        })();
        match opened {
            Ok((ctl, ack)) => Ok(Self {
                ctl,
                ack,
                ctl_path,
                ack_path,
            }),
            Err(e) => {
                // Partial setup leaves nothing behind for the next invocation.
                let _ = std::fs::remove_file(&ctl_path);
                let _ = std::fs::remove_file(&ack_path);
                Err(e)
            }
        }
    }

    /// Raw descriptor of the control FIFO, inheritable by a child process.
    #[must_use]
    pub fn ctl_fd(&self) -> RawFd {
        self.ctl.as_raw_fd()
    }

    /// Raw descriptor of the acknowledgement FIFO, inheritable by a child
    /// process.
    #[must_use]
    pub fn ack_fd(&self) -> RawFd {
        self.ack.as_raw_fd()
    }
}

impl Drop for ControlChannel {
    fn drop(&mut self) {
        for path in [&self.ctl_path, &self.ack_path] {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove control fifo");
                }
            }
        }
    }
}

fn remove_stale(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "removed stale control fifo");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Channel(format!(
            "cannot remove stale {}: {e}",
            path.display()
        ))),
    }
}

fn make_fifo(path: &Path) -> Result<()> {
    mkfifo(path, Mode::from_bits_truncate(0o644))
        .map_err(|e| Error::Channel(format!("mkfifo {} failed: {e}", path.display())))
}

fn open_inheritable(path: &Path) -> Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| Error::Channel(format!("cannot open {}: {e}", path.display())))?;
    // Rust opens files close-on-exec; the profiler child needs these.
    fcntl(file.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::empty()))
        .map_err(|e| Error::Channel(format!("cannot clear CLOEXEC on {}: {e}", path.display())))?;
    Ok(file)
}
