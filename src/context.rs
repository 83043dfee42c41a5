//! Build context passed explicitly through every helper.

use crate::config::Constants;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// What the command runner does when a child cannot start or exits nonzero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Report, open an interactive shell, then exit the process with code 1.
    #[default]
    Interactive,
    /// Report, then exit the process with code 1.
    Abort,
    /// Return the failure to the caller as an error.
    ReturnError,
}

/// Execution context for one dependency build.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Install prefix, scripts dir, build output dir and shell.
    pub constants: Constants,
    /// Directory commands run in and relative paths resolve against.
    pub cwd: PathBuf,
    /// Per-command environment overlay; `None` removes the variable.
    pub env: BTreeMap<String, Option<String>>,
    /// Failure handling for spawned commands.
    pub policy: FailurePolicy,
    /// If true, echo commands without executing them
    pub dry_run: bool,
}

impl BuildContext {
    /// Create a context rooted at the process's current directory.
    pub fn new(constants: Constants) -> Self {
        Self {
            constants,
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env: BTreeMap::new(),
            policy: FailurePolicy::default(),
            dry_run: false,
        }
    }

    /// Set the working directory.
    ///
    /// A relative `dir` is made absolute against the process's current directory.
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.cwd = std::path::absolute(&dir).unwrap_or(dir);
        self
    }

    /// Set a variable for every command run with this context.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), Some(value.into()));
        self
    }

    /// Remove a variable from every command run with this context.
    pub fn env_remove(mut self, key: impl Into<String>) -> Self {
        self.env.insert(key.into(), None);
        self
    }

    /// Set the failure policy.
    pub fn policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set dry run mode.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Change the working directory, resolving `dir` against the current one.
    pub fn chdir(&mut self, dir: impl AsRef<Path>) {
        self.cwd = self.resolve(dir);
    }

    /// Resolve a possibly relative path against the working directory.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        self.cwd.join(path)
    }

    pub fn prefix(&self) -> &Path {
        &self.constants.prefix
    }

    pub fn build_dir(&self) -> &Path {
        &self.constants.build_dir
    }
}
