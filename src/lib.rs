//! A small line-oriented command shell.
//!
//! Each input line is split into whitespace-separated tokens, `$name` tokens
//! are expanded, an optional trailing redirection such as `>out` or `2>>log`
//! is applied, and the command runs either as a builtin inside the shell or as
//! an external program found on `PATH`.
//!
//! The main entry point is [`Shell`], which owns the session state: local
//! variables, the command [`History`](history::History) and the status of the
//! last command. The [`env`] module holds the environment the shell hands to
//! the programs it runs.

mod builtin;
pub mod command;
pub mod env;
pub mod external;
pub mod history;
mod interpreter;
mod io_adapters;
pub mod parser;
pub mod redirect;
pub mod vars;

pub use command::{Command, ExitCode, RedirectMode, Redirection};
pub use env::Environment;
pub use interpreter::Shell;
pub use io_adapters::MemWriter;
