use crate::command::{Command, ExitCode};
use crate::env::Environment;
use crate::redirect;
use nix::unistd::{AccessFlags, access};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

/// Result code for anything that prevents a program from running normally.
pub const FAILURE: ExitCode = 1;

/// Resolve an executable the way the shell does.
///
/// - A name containing `/` is used as-is and must be executable.
/// - Otherwise each directory of the colon-separated `search_path` is tried
///   in order; the first executable match wins.
/// - An empty name never resolves.
pub fn find_executable(search_path: Option<&str>, name: &str) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    if name.contains('/') {
        let path = Path::new(name);
        return is_executable(path).then(|| path.to_path_buf());
    }

    search_path?
        .split(':')
        .filter(|dir| !dir.is_empty())
        .map(|dir| Path::new(dir).join(name))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    path.is_file() && access(path, AccessFlags::X_OK).is_ok()
}

/// Map a finished child's status to a result code.
pub fn status_code(status: ExitStatus) -> ExitCode {
    match status.code() {
        Some(code) => code,
        None => {
            tracing::debug!(?status, "child terminated abnormally");
            FAILURE
        }
    }
}

/// Spawn `cmd` as a child process and wait for it.
///
/// The executable is resolved against `PATH` from `env` before the
/// redirection target is touched, so an unknown command never creates or
/// truncates its output file. The child gets exactly the variables of `env`.
pub fn run(cmd: &Command, env: &Environment) -> ExitCode {
    let Some(executable) = find_executable(env.get_var("PATH"), cmd.name()) else {
        eprintln!("command not found: {}", cmd.name());
        return FAILURE;
    };

    let mut child = std::process::Command::new(&executable);
    child
        .arg0(cmd.name())
        .args(cmd.args())
        .env_clear()
        .envs(env.iter());

    let redirection = match redirect::open(cmd.redirection()) {
        Ok(redirection) => redirection,
        Err(e) => {
            eprintln!("{e:#}");
            return FAILURE;
        }
    };
    if let Some(redirection) = redirection {
        if let Err(e) = redirection.apply_to_child(&mut child) {
            eprintln!("{e:#}");
            return FAILURE;
        }
    }

    tracing::debug!(executable = %executable.display(), args = ?cmd.args(), "spawning");
    let status = child.spawn().and_then(|mut c| c.wait());
    match status {
        Ok(status) => status_code(status),
        Err(e) => {
            eprintln!("{}: {e}", cmd.name());
            FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn make_script(dir: &Path, name: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    fn test_absolute_executable_is_used_as_is() {
        let found = find_executable(None, "/bin/sh").expect("/bin/sh should be executable");
        assert_eq!(found, Path::new("/bin/sh"));
    }

    #[test]
    fn test_absolute_missing_is_none() {
        assert!(find_executable(Some("/bin"), "/bin/nonexisting").is_none());
    }

    #[test]
    fn test_bare_name_searches_each_directory_in_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        make_script(first.path(), "tool", 0o644);
        let expected = make_script(second.path(), "tool", 0o755);

        let search = format!("{}::{}", first.path().display(), second.path().display());
        assert_eq!(find_executable(Some(&search), "tool"), Some(expected));
    }

    #[test]
    fn test_non_executable_path_with_separator_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_script(dir.path(), "plain", 0o644);
        assert!(find_executable(Some("/bin"), path.to_str().unwrap()).is_none());
    }

    #[test]
    fn test_missing_search_path_or_name_is_none() {
        assert!(find_executable(None, "sh").is_none());
        assert!(find_executable(Some("/bin"), "").is_none());
        assert!(find_executable(Some("/bin"), "definitely-not-a-command-xyz").is_none());
    }

    #[test]
    fn test_exit_code_is_reported() {
        let env = Environment::from_vars([("PATH", "/bin:/usr/bin")]);
        let ok = crate::parser::parse_line("true ignored").unwrap();
        assert_eq!(run(&ok, &env), 0);

        let failing = crate::parser::parse_line("false").unwrap();
        assert_eq!(run(&failing, &env), 1);
    }

    #[test]
    fn test_killed_child_maps_to_failure() {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(status_code(ExitStatus::from_raw(9)), FAILURE);
        assert_eq!(status_code(ExitStatus::from_raw(7 << 8)), 7);
    }

    #[test]
    fn test_unknown_command_does_not_touch_target() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let line = format!("nope arg >{}", out.display());
        let mut cmd = crate::parser::parse_line(&line).unwrap();
        cmd.strip_redirection();

        let env = Environment::from_vars([("PATH", "/bin")]);
        assert_eq!(run(&cmd, &env), FAILURE);
        assert!(!out.exists());
    }
}
