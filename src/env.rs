use std::collections::BTreeMap;
use std::env as stdenv;
use std::ffi::{CString, NulError};

/// Environment bindings owned by the shell.
///
/// The environment contains:
/// - `vars`: the bindings handed to every launched child, listed by `set`.
/// - `should_exit`: set by the `exit` builtin so the REPL loop knows to stop.
///
/// Children get a copy at fork time; changes a child makes never reach the shell.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    /// Key-value bindings, kept sorted so listings are stable.
    pub vars: BTreeMap<String, String>,
    /// When set to true, the interactive loop terminates.
    pub should_exit: bool,
}

impl Environment {
    /// Capture the current process environment.
    pub fn new() -> Self {
        Self {
            vars: stdenv::vars().collect(),
            should_exit: false,
        }
    }

    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Create or replace a binding.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// `NAME=VALUE` strings for every binding, in listing order.
    pub fn bindings(&self) -> impl Iterator<Item = String> + '_ {
        self.vars.iter().map(|(k, v)| format!("{k}={v}"))
    }

    /// The bindings as C strings, ready to become a child's `envp`.
    pub fn to_envp(&self) -> Result<Vec<CString>, NulError> {
        self.bindings().map(CString::new).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_set_and_get_var() {
        let mut env = Environment::default();
        assert_eq!(env.get_var("SUPERSH_TEST_UNSET"), None);

        env.set_var("KEY", "VALUE");
        assert_eq!(env.get_var("KEY"), Some("VALUE"));

        env.set_var("KEY", "");
        assert_eq!(env.get_var("KEY"), Some(""));
    }

    #[test]
    fn test_env_reads_from_process_env() {
        let env = Environment::new();
        assert!(env.get_var("PATH").is_some());
        assert!(!env.should_exit);
    }

    #[test]
    fn test_bindings_are_sorted_name_value_pairs() {
        let mut env = Environment::default();
        env.set_var("ZED", "1");
        env.set_var("ALPHA", "a=b");
        assert_eq!(env.bindings().collect::<Vec<_>>(), vec!["ALPHA=a=b", "ZED=1"]);

        let envp = env.to_envp().unwrap();
        assert_eq!(envp[1].as_bytes(), b"ZED=1");
    }
}
