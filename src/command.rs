use std::fmt;
use std::os::fd::RawFd;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
pub type ExitCode = i32;

/// How a redirection target is opened and which descriptors it replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectMode {
    /// No redirection.
    None,
    /// `<`: read the target, must exist.
    Input,
    /// `>`: create or truncate the target.
    Output,
    /// `>>`: create or append to the target.
    Append,
    /// `&>`: like `Output`, but standard error follows standard output.
    OutputAndErrorTruncate,
    /// `&>>`: like `Append`, but standard error follows standard output.
    OutputAndErrorAppend,
}

impl RedirectMode {
    /// Descriptors replaced when no explicit descriptor was given.
    pub fn default_fds(self) -> &'static [RawFd] {
        match self {
            RedirectMode::None => &[],
            RedirectMode::Input => &[0],
            RedirectMode::Output | RedirectMode::Append => &[1],
            RedirectMode::OutputAndErrorTruncate | RedirectMode::OutputAndErrorAppend => &[1, 2],
        }
    }
}

/// A redirection parsed from the trailing token of a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirection {
    pub mode: RedirectMode,
    /// Target file; `None` only when `mode` is [`RedirectMode::None`].
    pub target: Option<String>,
    /// Explicit descriptor from a leading digit run, e.g. the `2` in `2>err`.
    pub fd: Option<RawFd>,
}

impl Redirection {
    pub fn none() -> Self {
        Self {
            mode: RedirectMode::None,
            target: None,
            fd: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.mode != RedirectMode::None && self.target.is_some()
    }

    /// Descriptors this redirection replaces.
    pub fn fds(&self) -> Vec<RawFd> {
        match self.fd {
            Some(fd) => vec![fd],
            None => self.mode.default_fds().to_vec(),
        }
    }
}

impl Default for Redirection {
    fn default() -> Self {
        Self::none()
    }
}

/// One parsed command line: the command name, its arguments and a redirection.
///
/// A `Command` always holds at least one token. While the redirection is
/// active its source token is still the last entry of `tokens`; it is removed
/// by [`Command::strip_redirection`] right before execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    tokens: Vec<String>,
    redirection: Redirection,
}

impl Command {
    /// Returns `None` for an empty token list.
    pub fn new(tokens: Vec<String>, redirection: Redirection) -> Option<Self> {
        if tokens.is_empty() {
            return None;
        }
        Some(Self {
            tokens,
            redirection,
        })
    }

    pub fn name(&self) -> &str {
        &self.tokens[0]
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn tokens_mut(&mut self) -> &mut [String] {
        &mut self.tokens
    }

    /// Everything after the command name.
    pub fn args(&self) -> &[String] {
        &self.tokens[1..]
    }

    pub fn redirection(&self) -> &Redirection {
        &self.redirection
    }

    /// Exact token-sequence equality; the redirection does not take part.
    pub fn same_tokens(&self, other: &Command) -> bool {
        self.tokens == other.tokens
    }

    /// Drops the trailing redirection token, if the command carries one.
    pub fn strip_redirection(&mut self) {
        if self.redirection.is_active() && self.tokens.len() > 1 {
            self.tokens.pop();
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tokens.join(" "))
    }
}
