use crate::builtin;
use crate::command::{Command, ExitCode};
use crate::env::Environment;
use crate::external::{self, FAILURE};
use crate::history::History;
use crate::parser;
use crate::redirect;
use crate::vars::{self, DefinitionGuard, VariableStore};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, BufRead, Write};

const PROMPT: &str = "lsh> ";

/// The shell session: variables, history and the status of the last command.
///
/// Example
/// ```
/// use line_shell::{Environment, MemWriter, Shell};
/// let (out, handle) = MemWriter::with_handle();
/// let mut sh = Shell::with_output(Environment::from_vars([("PATH", "/bin")]), Box::new(out));
/// sh.run_line("local greeting=hello");
/// sh.run_line("vars");
/// assert_eq!(handle.contents(), "greeting=hello\n");
/// ```
pub struct Shell {
    pub(crate) env: Environment,
    pub(crate) vars: VariableStore,
    pub(crate) history: History,
    pub(crate) last_error: ExitCode,
    pub(crate) should_exit: bool,
    /// Where builtins print.
    pub(crate) stdout: Box<dyn Write>,
}

impl Shell {
    /// Create a shell whose builtins print to the process's standard output.
    pub fn new(env: Environment) -> Self {
        Self::with_output(env, Box::new(io::stdout()))
    }

    pub fn with_output(env: Environment, stdout: Box<dyn Write>) -> Self {
        Self {
            env,
            vars: VariableStore::new(),
            history: History::default(),
            last_error: 0,
            should_exit: false,
            stdout,
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn vars(&self) -> &VariableStore {
        &self.vars
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Status of the most recently executed command.
    pub fn last_error(&self) -> ExitCode {
        self.last_error
    }

    /// Set once `exit` has run.
    pub fn should_exit(&self) -> bool {
        self.should_exit
    }

    /// Parse and execute one line, recording its status as the last error.
    ///
    /// Returns `None` when the line holds no command.
    pub fn run_line(&mut self, line: &str) -> Option<ExitCode> {
        let cmd = parser::parse_line(line)?;
        let code = self.execute(cmd);
        self.last_error = code;
        Some(code)
    }

    /// Execute a parsed command, either in-process or as a child.
    pub fn execute(&mut self, mut cmd: Command) -> ExitCode {
        let Some(builtin) = builtin::lookup(cmd.name()) else {
            tracing::debug!(command = %cmd, "dispatching external command");
            self.history.record(&cmd);
            cmd.strip_redirection();
            vars::substitute(&mut cmd, &self.env, &self.vars);
            return external::run(&cmd, &self.env);
        };

        tracing::debug!(command = %cmd, "dispatching builtin");
        let guard = DefinitionGuard::for_command(builtin.name);
        if let Err(e) = vars::check_definition(&cmd, guard) {
            eprintln!("{e}");
            return FAILURE;
        }
        vars::substitute(&mut cmd, &self.env, &self.vars);
        cmd.strip_redirection();

        if let Err(e) = self.redirect_self(&cmd) {
            eprintln!("{e:#}");
            return FAILURE;
        }
        let code = (builtin.run)(self, cmd.args());
        if let Err(e) = self.stdout.flush() {
            tracing::warn!(error = %e, "failed to flush builtin output");
        }
        code
    }

    fn redirect_self(&mut self, cmd: &Command) -> anyhow::Result<()> {
        if let Some(redirection) = redirect::open(cmd.redirection())? {
            self.stdout.flush()?;
            redirection.apply_in_process()?;
        }
        Ok(())
    }

    /// Run every line of `script` until it ends or `exit` runs.
    ///
    /// Bytes that are not UTF-8 are replaced rather than ending the script.
    pub fn run_script(&mut self, mut script: impl BufRead) -> io::Result<ExitCode> {
        let mut buf = Vec::new();
        while !self.should_exit {
            buf.clear();
            if script.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\n', '\r']);
            self.run_line(line);
        }
        Ok(self.last_error)
    }

    /// Read-Eval-Print Loop on the terminal.
    pub fn repl(&mut self) -> rustyline::Result<ExitCode> {
        let mut rl = DefaultEditor::new()?;

        while !self.should_exit {
            match rl.readline(PROMPT) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    self.run_line(&line);
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err),
            }
        }
        Ok(self.last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io_adapters::MemWriter;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::io::Cursor;

    fn shell() -> (Shell, MemWriter) {
        let (out, handle) = MemWriter::with_handle();
        let env = Environment::from_vars([("PATH", "/bin:/usr/bin")]);
        (Shell::with_output(env, Box::new(out)), handle)
    }

    fn history_lines(sh: &mut Shell, out: &MemWriter) -> Vec<String> {
        out.take();
        assert_eq!(sh.run_line("history"), Some(0));
        out.take().lines().map(str::to_owned).collect()
    }

    #[test]
    fn test_blank_and_comment_lines_do_nothing() {
        let (mut sh, _) = shell();
        sh.last_error = 4;
        assert_eq!(sh.run_line(""), None);
        assert_eq!(sh.run_line("# comment"), None);
        assert_eq!(sh.last_error(), 4);
    }

    #[test]
    fn test_repeated_command_is_stored_once() {
        let (mut sh, out) = shell();
        sh.run_line("true");
        sh.run_line("true");
        assert_eq!(history_lines(&mut sh, &out), vec!["1) true"]);
    }

    #[test]
    fn test_builtins_are_not_recorded() {
        let (mut sh, out) = shell();
        sh.run_line("local a=1");
        sh.run_line("vars");
        assert!(sh.history().is_empty());
        assert_eq!(history_lines(&mut sh, &out), Vec::<String>::new());
    }

    #[test]
    fn test_eviction_and_listing_order() {
        let (mut sh, out) = shell();
        sh.run_line("history set 3");
        for arg in ["a", "b", "c", "d"] {
            sh.run_line(&format!("true {arg}"));
        }
        assert_eq!(
            history_lines(&mut sh, &out),
            vec!["1) true d", "2) true c", "3) true b"]
        );
    }

    #[test]
    fn test_shrink_keeps_most_recent_in_order() {
        let (mut sh, out) = shell();
        for arg in ["1", "2", "3", "4", "5"] {
            sh.run_line(&format!("true {arg}"));
        }
        assert_eq!(sh.run_line("history set 2"), Some(0));
        assert_eq!(history_lines(&mut sh, &out), vec!["1) true 5", "2) true 4"]);
    }

    #[test]
    fn test_grow_keeps_entries() {
        let (mut sh, out) = shell();
        sh.run_line("history set 2");
        sh.run_line("true x");
        sh.run_line("true y");
        assert_eq!(sh.run_line("history set 10"), Some(0));
        assert_eq!(sh.history().capacity(), 10);
        assert_eq!(history_lines(&mut sh, &out), vec!["1) true y", "2) true x"]);
    }

    #[test]
    fn test_history_replay_runs_entry_again() {
        let (mut sh, out) = shell();
        sh.run_line("false");
        sh.run_line("true");
        assert_eq!(sh.run_line("history 2"), Some(1));
        assert_eq!(
            history_lines(&mut sh, &out),
            vec!["1) false", "2) true", "3) false"]
        );
        assert_eq!(sh.run_line("history 9"), Some(1));
    }

    #[test]
    fn test_environment_shadows_local() {
        let (mut sh, _) = shell();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("x.txt");

        assert_eq!(sh.run_line("export x=1"), Some(0));
        assert_eq!(sh.run_line("local x=2"), Some(0));
        sh.run_line(&format!("echo $x >{}", out.display()));
        assert_eq!(fs::read_to_string(&out).unwrap(), "1\n");
    }

    #[test]
    fn test_unbound_variable_expands_to_empty() {
        let (mut sh, _) = shell();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("z.txt");
        assert_eq!(sh.run_line(&format!("echo a $zzz b >{}", out.display())), Some(0));
        assert_eq!(fs::read_to_string(&out).unwrap(), "a  b\n");
    }

    #[test]
    fn test_dollar_definitions_are_rejected_without_mutation() {
        let (mut sh, out) = shell();
        sh.run_line("local x=5");
        assert_eq!(sh.run_line("local $x=1"), Some(1));
        assert_eq!(sh.run_line("export $x=1"), Some(1));

        assert_eq!(sh.vars().len(), 1);
        assert_eq!(sh.env().get_var("5"), None);
        sh.run_line("vars");
        assert_eq!(out.contents(), "x=5\n");
    }

    #[test]
    fn test_exported_variables_reach_children() {
        let (mut sh, _) = shell();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("env.txt");
        sh.run_line("export GREETING=hi");
        sh.run_line(&format!("env >{}", out.display()));
        let listing = fs::read_to_string(&out).unwrap();
        assert!(listing.lines().any(|l| l == "GREETING=hi"), "{listing}");
    }

    #[test]
    fn test_output_redirection_truncates_and_appends() {
        let (mut sh, _) = shell();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        fs::write(&out, "stale contents\n").unwrap();

        assert_eq!(sh.run_line(&format!("echo one >{}", out.display())), Some(0));
        assert_eq!(fs::read_to_string(&out).unwrap(), "one\n");

        assert_eq!(sh.run_line(&format!("echo two >>{}", out.display())), Some(0));
        assert_eq!(fs::read_to_string(&out).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn test_digit_prefix_selects_descriptor() {
        let (mut sh, _) = shell();
        let dir = tempfile::tempdir().unwrap();
        let err = dir.path().join("err.txt");

        let code = sh.run_line(&format!("cat /definitely/not/here 2>{}", err.display()));
        assert_eq!(code, Some(1));
        let text = fs::read_to_string(&err).unwrap();
        assert!(text.contains("not/here"), "{text}");
    }

    #[test]
    fn test_combined_redirection_captures_both_streams() {
        let (mut sh, _) = shell();
        let dir = tempfile::tempdir().unwrap();
        let both = dir.path().join("both.txt");
        let script = dir.path().join("both.sh");
        fs::write(&script, "echo to-out\necho to-err >&2\n").unwrap();

        let line = format!("sh {} &>{}", script.display(), both.display());
        assert_eq!(sh.run_line(&line), Some(0));
        assert_eq!(fs::read_to_string(&both).unwrap(), "to-out\nto-err\n");
    }

    #[test]
    fn test_external_gets_numbered_descriptor() {
        let (mut sh, _) = shell();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("fd3.txt");
        let script = dir.path().join("fd3.sh");
        fs::write(&script, "echo hi >&3\n").unwrap();

        let line = format!("sh {} 3>{}", script.display(), out.display());
        assert_eq!(sh.run_line(&line), Some(0));
        assert_eq!(fs::read_to_string(&out).unwrap(), "hi\n");
    }

    #[test]
    fn test_builtin_redirection_stays_in_place() {
        let (mut sh, _) = shell();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("fd58.txt");
        let script = dir.path().join("later.sh");
        fs::write(&script, "echo later >&58\n").unwrap();

        assert_eq!(sh.run_line(&format!("local a=1 58>{}", out.display())), Some(0));
        assert_eq!(sh.run_line(&format!("sh {}", script.display())), Some(0));
        assert_eq!(fs::read_to_string(&out).unwrap(), "later\n");
    }

    #[test]
    fn test_input_redirection_feeds_stdin() {
        let (mut sh, _) = shell();
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.txt");
        let out = dir.path().join("out.txt");
        fs::write(&input, "from file\n").unwrap();

        let script = dir.path().join("copy.sh");
        fs::write(&script, format!("cat >{}\n", out.display())).unwrap();

        let line = format!("sh {} <{}", script.display(), input.display());
        assert_eq!(sh.run_line(&line), Some(0));
        assert_eq!(fs::read_to_string(&out).unwrap(), "from file\n");
    }

    #[test]
    fn test_unknown_command_fails_and_shell_continues() {
        let (mut sh, out) = shell();
        assert_eq!(sh.run_line("nope arg"), Some(1));
        assert_eq!(sh.last_error(), 1);
        assert_eq!(history_lines(&mut sh, &out), vec!["1) nope arg"]);
        assert_eq!(sh.run_line("true"), Some(0));
    }

    #[test]
    fn test_search_path_follows_export() {
        let (mut sh, _) = shell();
        sh.run_line("export PATH=/nowhere");
        assert_eq!(sh.run_line("true"), Some(1));
        sh.run_line("export PATH=/bin:/usr/bin");
        assert_eq!(sh.run_line("true"), Some(0));
    }

    #[test]
    fn test_failed_redirection_aborts_builtin() {
        let (mut sh, _) = shell();
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.txt");
        assert_eq!(sh.run_line(&format!("local a=1 <{}", missing.display())), Some(1));
        assert!(sh.vars().is_empty());
    }

    #[test]
    fn test_script_stops_at_exit() {
        let (mut sh, out) = shell();
        let script = "local a=1\nfalse\n\n# note\nexit\nlocal b=2\n";
        let code = sh.run_script(Cursor::new(script)).unwrap();

        assert_eq!(code, 1);
        assert!(sh.should_exit());
        sh.run_line("vars");
        assert_eq!(out.contents(), "a=1\n");
    }

    #[test]
    fn test_script_survives_invalid_utf8_line() {
        let (mut sh, out) = shell();
        let script: &[u8] = b"local a=1\nlocal b=\xff\nlocal c=3\r\nvars\n";
        assert_eq!(sh.run_script(script).unwrap(), 0);
        assert_eq!(out.contents(), "a=1\nb=\u{FFFD}\nc=3\n");
    }

    #[test]
    fn test_script_without_exit_reports_last_status() {
        let (mut sh, _) = shell();
        let code = sh.run_script(Cursor::new("false\ntrue\n")).unwrap();
        assert_eq!(code, 0);
        assert!(!sh.should_exit());
    }
}
