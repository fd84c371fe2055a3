//! Turns one line of input into a [`Command`].
//!
//! Tokens are separated by runs of spaces; there is no quoting or escaping.
//! Only the last token of a multi-token line is inspected for a redirection of
//! the form `[fd]OP target`, where `OP` is one of `&>>`, `>>`, `&>`, `>`, `<`.

use crate::command::{Command, RedirectMode, Redirection};
use regex::Regex;
use std::sync::LazyLock;

/// Upper bound on tokens kept per line; anything beyond it is dropped.
pub const MAX_TOKENS: usize = 128;

const DELIMITER: char = ' ';

// Alternatives are tried left to right, so the longer operators win.
static REDIRECT_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?<fd>[0-9]+)?(?<op>&>>|>>|&>|>|<)(?<target>.*)$")
        .expect("redirection pattern is valid")
});

/// Parse a line; blank lines and comments (`#...` as first token) yield `None`.
pub fn parse_line(line: &str) -> Option<Command> {
    let tokens = split_tokens(line);
    if tokens.first()?.starts_with('#') {
        return None;
    }

    let redirection = if tokens.len() < 2 {
        Redirection::none()
    } else {
        parse_redirection(&tokens[tokens.len() - 1])
    };

    Command::new(tokens, redirection)
}

fn split_tokens(line: &str) -> Vec<String> {
    let tokens: Vec<String> = line
        .split(DELIMITER)
        .filter(|t| !t.is_empty())
        .take(MAX_TOKENS)
        .map(str::to_owned)
        .collect();
    if tokens.len() == MAX_TOKENS {
        tracing::trace!(cap = MAX_TOKENS, "token list at capacity, extra tokens dropped");
    }
    tokens
}

/// Recognize a redirection token. Anything else is [`RedirectMode::None`].
pub fn parse_redirection(token: &str) -> Redirection {
    let Some(caps) = REDIRECT_TOKEN.captures(token) else {
        return Redirection::none();
    };

    let fd = match caps.name("fd") {
        Some(digits) => match digits.as_str().parse() {
            Ok(fd) => Some(fd),
            Err(_) => return Redirection::none(),
        },
        None => None,
    };

    let mode = match &caps["op"] {
        "&>>" => RedirectMode::OutputAndErrorAppend,
        ">>" => RedirectMode::Append,
        "&>" => RedirectMode::OutputAndErrorTruncate,
        ">" => RedirectMode::Output,
        _ => RedirectMode::Input,
    };

    Redirection {
        mode,
        target: Some(caps["target"].to_owned()),
        fd,
    }
}
