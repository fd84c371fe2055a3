use crate::command::ExitCode;
use crate::external::FAILURE;
use crate::interpreter::Shell;
use anyhow::{Context, Result, anyhow, bail};
use argh::{EarlyExit, FromArgs};
use std::cmp::Ordering;
use std::env;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed
/// directly in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "cd".
    const NAME: &'static str;

    /// Usage line printed when the arguments do not parse.
    const USAGE: &'static str;

    /// Return value follows shell conventions: 0 for success, non-zero for error.
    fn execute(self, shell: &mut Shell) -> Result<ExitCode>;
}

/// Entry point shared by every builtin: raw arguments in, result code out.
pub(crate) type BuiltinFn = fn(&mut Shell, &[String]) -> ExitCode;

pub(crate) struct Builtin {
    pub name: &'static str,
    pub run: BuiltinFn,
}

const fn entry<T: BuiltinCommand>() -> Builtin {
    Builtin {
        name: T::NAME,
        run: invoke::<T>,
    }
}

static BUILTINS: [Builtin; 7] = [
    entry::<Exit>(),
    entry::<Cd>(),
    entry::<Export>(),
    entry::<Local>(),
    entry::<Vars>(),
    entry::<HistoryCmd>(),
    entry::<Ls>(),
];

pub(crate) fn lookup(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|b| b.name == name)
}

fn invoke<T: BuiltinCommand>(shell: &mut Shell, args: &[String]) -> ExitCode {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let cmd = match T::from_args(&[T::NAME], &args) {
        Ok(cmd) => cmd,
        Err(EarlyExit { output, status }) => {
            return match status {
                Ok(()) => match shell.stdout.write_all(output.as_bytes()) {
                    Ok(()) => 0,
                    Err(e) => {
                        eprintln!("{}: {e}", T::NAME);
                        FAILURE
                    }
                },
                Err(()) => {
                    tracing::debug!(builtin = T::NAME, %output, "argument parsing failed");
                    eprintln!("{}: usage: '{}'", T::NAME, T::USAGE);
                    FAILURE
                }
            };
        }
    };

    match cmd.execute(shell) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e:#}");
            FAILURE
        }
    }
}

/// Split `name=value`. The value is `None` when there is no `=`.
fn split_definition(definition: &str) -> (&str, Option<&str>) {
    match definition.split_once('=') {
        Some((name, value)) => (name, Some(value)),
        None => (definition, None),
    }
}

#[derive(FromArgs)]
/// Exit the shell with the status of the last command.
pub struct Exit {
    #[argh(positional, greedy)]
    /// ignored
    pub _args: Vec<String>,
}

impl BuiltinCommand for Exit {
    const NAME: &'static str = "exit";
    const USAGE: &'static str = "exit";

    fn execute(self, shell: &mut Shell) -> Result<ExitCode> {
        shell.should_exit = true;
        Ok(shell.last_error)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to, absolute or relative to the current directory.
    pub dir: String,
}

impl BuiltinCommand for Cd {
    const NAME: &'static str = "cd";
    const USAGE: &'static str = "cd <dir>";

    fn execute(self, _shell: &mut Shell) -> Result<ExitCode> {
        env::set_current_dir(&self.dir)
            .with_context(|| format!("cd: cannot change to directory '{}'", self.dir))?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Set an environment variable for this shell and the commands it runs.
pub struct Export {
    #[argh(positional)]
    /// definition of the form NAME=VALUE.
    pub definition: String,
}

impl BuiltinCommand for Export {
    const NAME: &'static str = "export";
    const USAGE: &'static str = "export VAR=<value>";

    fn execute(self, shell: &mut Shell) -> Result<ExitCode> {
        let (name, value) = split_definition(&self.definition);
        if name.is_empty() {
            bail!("export: usage: '{}'", Self::USAGE);
        }
        match value {
            Some(value) if !value.is_empty() => {
                shell.env.set_var(name, value);
                Ok(0)
            }
            _ => Err(anyhow!("export: variable must have definition")),
        }
    }
}

#[derive(FromArgs)]
/// Set a shell-local variable.
pub struct Local {
    #[argh(positional)]
    /// definition of the form NAME=VALUE; VALUE may be empty.
    pub definition: String,
}

impl BuiltinCommand for Local {
    const NAME: &'static str = "local";
    const USAGE: &'static str = "local VAR=<value>";

    fn execute(self, shell: &mut Shell) -> Result<ExitCode> {
        let (name, value) = split_definition(&self.definition);
        if name.is_empty() {
            bail!("local: usage: '{}'", Self::USAGE);
        }
        shell.vars.set(name, value.unwrap_or_default());
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print every shell-local variable as NAME=VALUE.
pub struct Vars {}

impl BuiltinCommand for Vars {
    const NAME: &'static str = "vars";
    const USAGE: &'static str = "vars";

    fn execute(self, shell: &mut Shell) -> Result<ExitCode> {
        for var in shell.vars.iter() {
            writeln!(shell.stdout, "{}={}", var.name, var.value)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// List the command history, re-run entry N, or resize it with `set N`.
pub struct HistoryCmd {
    #[argh(positional, greedy)]
    /// nothing to list, N to re-run entry N (1 is the most recent), or `set N`.
    pub args: Vec<String>,
}

impl BuiltinCommand for HistoryCmd {
    const NAME: &'static str = "history";
    const USAGE: &'static str = "history [<n> | set <n>]";

    fn execute(self, shell: &mut Shell) -> Result<ExitCode> {
        match self.args.as_slice() {
            [] => {
                for (i, cmd) in shell.history.list().enumerate() {
                    writeln!(shell.stdout, "{}) {}", i + 1, cmd)?;
                }
                Ok(0)
            }
            [n] => {
                let n: usize = n
                    .parse()
                    .map_err(|_| anyhow!("history: usage: 'history <n>'"))?;
                let cmd = shell
                    .history
                    .get(n)
                    .ok_or_else(|| anyhow!("history: no such entry {n}"))?;
                tracing::debug!(entry = n, command = %cmd, "replaying history entry");
                Ok(shell.execute(cmd))
            }
            [set, n] if set == "set" => {
                let capacity: i64 = n
                    .parse()
                    .map_err(|_| anyhow!("history: usage: 'history set <n>'"))?;
                let capacity = usize::try_from(capacity)
                    .ok()
                    .filter(|&c| c >= 1)
                    .ok_or_else(|| anyhow!("history: minimum history is 1"))?;
                shell.history.resize(capacity);
                Ok(0)
            }
            _ => Err(anyhow!("history: usage: '{}'", Self::USAGE)),
        }
    }
}

#[derive(FromArgs)]
/// List the current directory, hiding dotfiles.
pub struct Ls {}

impl BuiltinCommand for Ls {
    const NAME: &'static str = "ls";
    const USAGE: &'static str = "ls";

    fn execute(self, shell: &mut Shell) -> Result<ExitCode> {
        for name in list_dir(Path::new("."))? {
            writeln!(shell.stdout, "{name}")?;
        }
        Ok(0)
    }
}

/// Visible entries of `dir`, ordered by [`compare_names`].
pub fn list_dir(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("ls: cannot read {}", dir.display()))? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if !name.starts_with('.') {
            names.push(name);
        }
    }
    names.sort_by(|a, b| compare_names(a, b));
    Ok(names)
}

/// Compare names on their ASCII letters and digits only.
///
/// Non-alphanumeric characters are skipped on either side, so `a-2` and `a2`
/// compare equal here. Equal names fall back to plain byte order to keep the
/// listing deterministic.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    let (a_bytes, b_bytes) = (a.as_bytes(), b.as_bytes());
    let (mut i, mut j) = (0, 0);
    while i < a_bytes.len() && j < b_bytes.len() {
        let (x, y) = (a_bytes[i], b_bytes[j]);
        if x.is_ascii_alphanumeric() && y.is_ascii_alphanumeric() {
            if x != y {
                return x.cmp(&y);
            }
            i += 1;
            j += 1;
        } else {
            if !x.is_ascii_alphanumeric() {
                i += 1;
            }
            if !y.is_ascii_alphanumeric() {
                j += 1;
            }
        }
    }

    let by_alnum = match (i < a_bytes.len(), j < b_bytes.len()) {
        (true, _) => Ordering::Greater,
        (_, true) => Ordering::Less,
        _ => Ordering::Equal,
    };
    by_alnum.then_with(|| a.cmp(b))
}
