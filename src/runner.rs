//! Command runner
//!
//! Runs external build tools in the context's working directory, echoing the
//! command line first. Commands are given either as a single line, split
//! with POSIX shell word rules, or as a ready argument vector.
//!
//! ## Library path injection
//!
//! With [`RunOptions::library_path`] set, the command is run through
//! `<scripts>/ld.sh` with `LLP` exported for that child only, so freshly
//! built tools can find libraries under the install prefix.
//!
//! ## Failures
//!
//! What happens when a command is missing or exits nonzero depends on the
//! context's [`FailurePolicy`]. The default opens an interactive shell in the
//! failing build tree and then exits the process.

use crate::context::{BuildContext, FailurePolicy};
use crate::error::{Error, Result};
use crate::output;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

/// Environment variable read by `ld.sh`.
pub const LIBRARY_PATH_VAR: &str = "LLP";

#[cfg(windows)]
const PATH_SEP: char = ';';
#[cfg(not(windows))]
const PATH_SEP: char = ':';

/// A command as given by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSpec {
    /// A command line, split with shell word rules.
    Line(String),
    /// A pre-split argument vector.
    Argv(Vec<String>),
}

impl CommandSpec {
    /// The argument vector this command runs, program first.
    pub fn to_argv(&self) -> Result<Vec<String>> {
        let argv = match self {
            CommandSpec::Line(line) => {
                shlex::split(line).ok_or_else(|| Error::Tokenize(line.clone()))?
            }
            CommandSpec::Argv(argv) => argv.clone(),
        };
        if argv.is_empty() {
            return Err(Error::EmptyCommand);
        }
        Ok(argv)
    }
}

impl From<&str> for CommandSpec {
    fn from(line: &str) -> Self {
        CommandSpec::Line(line.to_string())
    }
}

impl From<String> for CommandSpec {
    fn from(line: String) -> Self {
        CommandSpec::Line(line)
    }
}

impl From<Vec<String>> for CommandSpec {
    fn from(argv: Vec<String>) -> Self {
        CommandSpec::Argv(argv)
    }
}

impl From<Vec<&str>> for CommandSpec {
    fn from(argv: Vec<&str>) -> Self {
        CommandSpec::Argv(argv.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for CommandSpec {
    fn from(argv: &[&str]) -> Self {
        CommandSpec::Argv(argv.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for CommandSpec {
    fn from(argv: [&str; N]) -> Self {
        CommandSpec::Argv(argv.iter().map(|s| s.to_string()).collect())
    }
}

/// Library search path to inject through the `ld.sh` wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryPath {
    /// `<prefix>/lib`
    Default,
    /// The given path list, followed by `<prefix>/lib`.
    Prepend(String),
}

impl LibraryPath {
    /// The value exported as `LLP`.
    pub fn value(&self, ctx: &BuildContext) -> String {
        let lib = ctx.constants.prefix_lib();
        match self {
            LibraryPath::Default => lib.display().to_string(),
            LibraryPath::Prepend(extra) => format!("{}{}{}", extra, PATH_SEP, lib.display()),
        }
    }
}

/// Per-call runner options.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub library_path: Option<LibraryPath>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run through `ld.sh` with the given library path.
    pub fn library_path(mut self, path: LibraryPath) -> Self {
        self.library_path = Some(path);
        self
    }
}

/// A fully resolved command, ready to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Variables set for this child only, on top of the context overlay.
    pub env: Vec<(String, String)>,
}

impl Invocation {
    /// The shell-quoted command line, as echoed before running.
    pub fn command_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(shell_quote)
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn command(&self, ctx: &BuildContext) -> Command {
        let mut cmd = Command::new(resolve_program(ctx, &self.program));
        cmd.args(&self.args).current_dir(&ctx.cwd);
        apply_context_env(&mut cmd, ctx);
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        cmd
    }
}

/// Resolve a command into the invocation `run_with` would spawn.
pub fn prepare(
    ctx: &BuildContext,
    cmd: impl Into<CommandSpec>,
    opts: &RunOptions,
) -> Result<Invocation> {
    let mut argv = cmd.into().to_argv()?;
    let mut env = Vec::new();

    if let Some(ref lib) = opts.library_path {
        env.push((LIBRARY_PATH_VAR.to_string(), lib.value(ctx)));
        argv.insert(0, ctx.constants.ld_wrapper().display().to_string());
    }

    let program = argv.remove(0);
    Ok(Invocation {
        program,
        args: argv,
        env,
    })
}

/// Run a command with default options.
///
/// # Example
/// ```ignore
/// run(&ctx, "make -j4")?;
/// run(&ctx, ["tar", "xf", "zlib-1.3.tar.gz"])?;
/// ```
pub fn run(ctx: &BuildContext, cmd: impl Into<CommandSpec>) -> Result<()> {
    run_with(ctx, cmd, &RunOptions::default())
}

/// Run a command, applying `opts`.
pub fn run_with(ctx: &BuildContext, cmd: impl Into<CommandSpec>, opts: &RunOptions) -> Result<()> {
    let inv = prepare(ctx, cmd, opts)?;
    let line = inv.command_line();
    output::command(&line);

    if ctx.dry_run {
        return Ok(());
    }

    let status = match inv.command(ctx).status() {
        Ok(status) => status,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return program_not_found(ctx, &inv.program);
        }
        Err(source) => {
            return Err(Error::Spawn {
                program: inv.program,
                source,
            });
        }
    };

    if status.success() {
        return Ok(());
    }
    command_failed(ctx, status.code(), line)
}

/// Open the configured interactive shell in the context's working directory
/// and wait for the user to leave it.
pub fn run_shell(ctx: &BuildContext) -> Result<ExitStatus> {
    let shell = &ctx.constants.shell;
    let mut cmd = Command::new(shell);
    cmd.current_dir(&ctx.cwd)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    apply_context_env(&mut cmd, ctx);
    cmd.status().map_err(|source| Error::Spawn {
        program: shell.display().to_string(),
        source,
    })
}

fn program_not_found(ctx: &BuildContext, program: &str) -> Result<()> {
    if ctx.policy == FailurePolicy::ReturnError {
        return Err(Error::ProgramNotFound(program.to_string()));
    }
    output::error(&format!("Could not find the program: {}", program));
    std::process::exit(1);
}

fn command_failed(ctx: &BuildContext, code: Option<i32>, line: String) -> Result<()> {
    match ctx.policy {
        FailurePolicy::ReturnError => Err(Error::CommandFailed { cmd: line, code }),
        FailurePolicy::Abort => {
            output::command_failed(code, &line, false);
            std::process::exit(1);
        }
        FailurePolicy::Interactive => {
            output::command_failed(code, &line, true);
            if let Err(e) = run_shell(ctx) {
                output::warning(&e.to_string());
            }
            std::process::exit(1);
        }
    }
}

fn apply_context_env(cmd: &mut Command, ctx: &BuildContext) {
    for (k, v) in &ctx.env {
        match v {
            Some(v) => cmd.env(k, v),
            None => cmd.env_remove(k),
        };
    }
}

// Relative programs with a directory part ("./configure") are looked up in
// the context's working directory, not the parent process's. A relative cwd
// is already applied by `current_dir`, so the program is left alone then.
fn resolve_program(ctx: &BuildContext, program: &str) -> PathBuf {
    let path = Path::new(program);
    if ctx.cwd.is_absolute() && path.is_relative() && path.components().count() > 1 {
        ctx.resolve(path)
    } else {
        path.to_path_buf()
    }
}

/// Shell-quote a word for display, leaving safe words bare.
pub fn shell_quote(s: impl std::fmt::Display) -> String {
    let s = s.to_string();
    if s.is_empty() {
        return "''".to_string();
    }
    if s.chars().all(|c| {
        c.is_alphanumeric() || matches!(c, '_' | '@' | '%' | '+' | '=' | ':' | ',' | '.' | '/' | '-')
    }) {
        s
    } else {
        format!("'{}'", s.replace('\'', "'\"'\"'"))
    }
}
