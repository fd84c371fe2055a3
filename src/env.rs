use std::collections::HashMap;
use std::env as stdenv;
use std::ffi::OsString;

/// Search path installed at startup.
pub const DEFAULT_PATH: &str = "/bin";

/// Environment variables visible to `$name` expansion and to spawned commands.
///
/// The shell never writes to its own process environment. Instead this map is
/// seeded from it once, updated by `export`, and handed to every child process
/// in full. Tests build one from scratch with [`Environment::from_vars`].
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Capture the current process environment and reset `PATH` to [`DEFAULT_PATH`].
    pub fn capture() -> Self {
        let mut env = Self::from_os_vars(stdenv::vars_os());
        env.set_var("PATH", DEFAULT_PATH);
        env
    }

    /// Keep the pairs that are valid UTF-8 and skip the rest.
    fn from_os_vars(vars: impl IntoIterator<Item = (OsString, OsString)>) -> Self {
        Self::from_vars(vars.into_iter().filter_map(|(key, value)| {
            match (key.into_string(), value.into_string()) {
                (Ok(key), Ok(value)) => Some((key, value)),
                (key, _) => {
                    tracing::debug!(key = ?key, "skipping environment variable that is not UTF-8");
                    None
                }
            }
        }))
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Set or override a variable.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get_var() {
        let mut env = Environment::default();
        assert_eq!(env.get_var("SOME_RANDOM_ENV_VAR_12345"), None);

        env.set_var("KEY", "VALUE");
        assert_eq!(env.get_var("KEY"), Some("VALUE"));

        env.set_var("KEY", "OTHER");
        assert_eq!(env.get_var("KEY"), Some("OTHER"));
    }

    #[test]
    fn test_capture_pins_search_path() {
        let env = Environment::capture();
        assert_eq!(env.get_var("PATH"), Some(DEFAULT_PATH));
    }

    #[test]
    fn test_non_utf8_entries_are_skipped() {
        use std::os::unix::ffi::OsStringExt;
        let bad = || OsString::from_vec(vec![b'b', 0xff]);
        let env = Environment::from_os_vars([
            (OsString::from("GOOD"), OsString::from("yes")),
            (OsString::from("BAD_VALUE"), bad()),
            (bad(), OsString::from("x")),
        ]);
        let pairs: Vec<_> = env.iter().collect();
        assert_eq!(pairs, vec![("GOOD", "yes")]);
    }

    #[test]
    fn test_iter_yields_every_pair() {
        let env = Environment::from_vars([("A", "1"), ("B", "2")]);
        let mut pairs: Vec<_> = env.iter().collect();
        pairs.sort();
        assert_eq!(pairs, vec![("A", "1"), ("B", "2")]);
    }
}
