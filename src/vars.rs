use crate::command::Command;
use crate::env::Environment;
use anyhow::{Result, bail};

const INITIAL_CAPACITY: usize = 128;

/// A session-local variable set with `local NAME=VALUE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub value: String,
}

/// Shell-local variables, unique by name, listed in creation order.
#[derive(Debug)]
pub struct VariableStore {
    vars: Vec<Variable>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self {
            vars: Vec::with_capacity(INITIAL_CAPACITY),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.value.as_str())
    }

    /// Update the variable named `name`, or append it if it is new.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.vars.iter_mut().find(|v| v.name == name) {
            Some(var) => var.value = value.to_owned(),
            None => self.vars.push(Variable {
                name: name.to_owned(),
                value: value.to_owned(),
            }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.vars.iter()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl Default for VariableStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Which builtin, if any, forbids a `$` at the start of its definition argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionGuard {
    None,
    Local,
    Export,
}

impl DefinitionGuard {
    pub fn for_command(name: &str) -> Self {
        match name {
            "local" => DefinitionGuard::Local,
            "export" => DefinitionGuard::Export,
            _ => DefinitionGuard::None,
        }
    }
}

/// Resolve `$name`: environment first, then the local store, else empty.
pub fn lookup(name: &str, env: &Environment, store: &VariableStore) -> String {
    env.get_var(name)
        .or_else(|| store.get(name))
        .unwrap_or_default()
        .to_owned()
}

/// Reject a `$`-prefixed first argument of `local` or `export`.
pub fn check_definition(cmd: &Command, guard: DefinitionGuard) -> Result<()> {
    let Some(first) = cmd.args().first() else {
        return Ok(());
    };
    if first.starts_with('$') {
        match guard {
            DefinitionGuard::Local => bail!("local: variable cannot start with $"),
            DefinitionGuard::Export => bail!("export: variable cannot start with $"),
            DefinitionGuard::None => {}
        }
    }
    Ok(())
}

/// Replace every `$name` token of `cmd` with its value.
pub fn substitute(cmd: &mut Command, env: &Environment, store: &VariableStore) {
    for token in cmd.tokens_mut() {
        if let Some(name) = token.strip_prefix('$') {
            let value = lookup(name, env, store);
            tracing::trace!(name, value = %value, "substituted variable");
            *token = value;
        }
    }
}
