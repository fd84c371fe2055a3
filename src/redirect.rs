//! Opening redirection targets and wiring them onto file descriptors.

use crate::command::{RedirectMode, Redirection};
use anyhow::{Context, Result};
use nix::fcntl::{FcntlArg, fcntl};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::{AsRawFd, FromRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::process::CommandExt;
use std::process::Stdio;

const CREATE_MODE: u32 = 0o644;

/// A redirection whose target file is already open.
#[derive(Debug)]
pub struct OpenRedirect {
    file: File,
    fds: Vec<RawFd>,
}

fn open_options(mode: RedirectMode) -> OpenOptions {
    let mut options = OpenOptions::new();
    match mode {
        RedirectMode::None | RedirectMode::Input => {
            options.read(true);
        }
        RedirectMode::Output | RedirectMode::OutputAndErrorTruncate => {
            options.write(true).create(true).truncate(true).mode(CREATE_MODE);
        }
        RedirectMode::Append | RedirectMode::OutputAndErrorAppend => {
            options.append(true).create(true).mode(CREATE_MODE);
        }
    }
    options
}

/// Open the target of `redirection`. Mode `None` opens nothing.
pub fn open(redirection: &Redirection) -> Result<Option<OpenRedirect>> {
    let Some(target) = redirection.target.as_deref() else {
        return Ok(None);
    };
    if redirection.mode == RedirectMode::None {
        return Ok(None);
    }

    let file = open_options(redirection.mode)
        .open(target)
        .with_context(|| format!("{target}: cannot open redirection target"))?;
    let fds = redirection.fds();
    let file = move_off_targets(file, &fds)?;
    tracing::debug!(file = target, mode = ?redirection.mode, ?fds, "opened redirection");

    Ok(Some(OpenRedirect { file, fds }))
}

/// Make sure `file` does not already sit on one of `fds`.
///
/// `dup2` onto the same descriptor is a no-op that leaves close-on-exec set,
/// and dropping the file afterwards would close the installed descriptor.
fn move_off_targets(file: File, fds: &[RawFd]) -> Result<File> {
    let raw = file.as_raw_fd();
    let Some(&highest) = fds.iter().max() else {
        return Ok(file);
    };
    if !fds.contains(&raw) {
        return Ok(file);
    }
    let moved = fcntl(raw, FcntlArg::F_DUPFD_CLOEXEC(highest + 1))
        .with_context(|| format!("cannot move descriptor {raw}"))?;
    tracing::trace!(from = raw, to = moved, "moved redirection target");
    // SAFETY: fcntl just returned a fresh descriptor that nothing else owns.
    Ok(unsafe { File::from_raw_fd(moved) })
}

impl OpenRedirect {
    /// Point the shell's own descriptors at the target.
    ///
    /// Nothing restores them afterwards: later commands in the session keep
    /// writing to (or reading from) the target.
    pub fn apply_in_process(self) -> Result<()> {
        io::stdout().flush()?;
        io::stderr().flush()?;
        for &fd in &self.fds {
            nix::unistd::dup2(self.file.as_raw_fd(), fd)
                .with_context(|| format!("cannot redirect descriptor {fd}"))?;
        }
        Ok(())
    }

    /// Arrange for a child process to start with the target on its descriptors.
    pub fn apply_to_child(self, cmd: &mut std::process::Command) -> Result<()> {
        let mut extra = Vec::new();
        for &fd in &self.fds {
            match fd {
                0 => {
                    cmd.stdin(Stdio::from(self.file.try_clone()?));
                }
                1 => {
                    cmd.stdout(Stdio::from(self.file.try_clone()?));
                }
                2 => {
                    cmd.stderr(Stdio::from(self.file.try_clone()?));
                }
                other => extra.push(other),
            }
        }

        if !extra.is_empty() {
            let file = self.file;
            // SAFETY: the hook only calls dup2, which is async-signal-safe.
            unsafe {
                cmd.pre_exec(move || {
                    for &fd in &extra {
                        nix::unistd::dup2(file.as_raw_fd(), fd)?;
                    }
                    Ok(())
                });
            }
        }
        Ok(())
    }
}
