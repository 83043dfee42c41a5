//! Error types for the build helpers.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while staging, building, installing or packaging.
#[derive(Error, Debug)]
pub enum Error {
    #[error("could not find the program: {0}")]
    ProgramNotFound(String),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command failed: {cmd} (exit code: {code:?})")]
    CommandFailed { cmd: String, code: Option<i32> },

    #[error("cannot split command line: {0}")]
    Tokenize(String),

    #[error("empty command")]
    EmptyCommand,

    #[error("copy failed: {} -> {}: {source}", .src.display(), .dst.display())]
    Copy {
        src: PathBuf,
        dst: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", .path.display())]
    Path {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archive error in {}: {message}", .path.display())]
    Archive { path: PathBuf, message: String },

    #[error("invalid glob pattern '{pattern}': {message}")]
    Glob { pattern: String, message: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("script error: {0}")]
    Script(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Attach a path to an I/O error.
    pub(crate) fn path(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Path {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn archive(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Error::Archive {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
