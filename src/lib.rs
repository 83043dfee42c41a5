//! Helpers for building the third-party dependencies bundled with an application
//!
//! A build driver calls these in sequence for every dependency:
//! stage the source, build it, install the outputs, package the result.
//!
//! # Example
//!
//! ```no_run
//! use bundle_deps::{BuildContext, Constants};
//! use std::path::Path;
//!
//! # fn main() -> bundle_deps::Result<()> {
//! let mut ctx = BuildContext::new(Constants::load()?);
//! bundle_deps::extract_source(&mut ctx, Path::new("/sources/zlib-1.3.tar.gz"))?;
//! bundle_deps::simple_build(&ctx)?;
//! bundle_deps::install_binaries(&ctx, "libz.so*", "lib")?;
//! bundle_deps::install_tree(&ctx, Path::new("contrib/minizip"), "include")?;
//! bundle_deps::create_package(ctx.build_dir(), Path::new("/packages/zlib.tar.bz2"), None)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Failure handling
//!
//! Commands run through [`runner::run`]. By default a failing command drops
//! the operator into an interactive shell in the failing build tree and then
//! exits the process with code 1. Unattended drivers should select
//! [`FailurePolicy::Abort`] or [`FailurePolicy::ReturnError`].
//!
//! # Modules
//!
//! - **env**: scoped process environment overlays
//! - **runner**: command runner with library path injection
//! - **extract**: archive extraction and source staging
//! - **autotools**: configure / make / make install
//! - **install**: symlink-aware copies, binary and tree installers
//! - **package**: bzip2 package creation and installation
//! - **script**: Rhai bindings for driver scripts

pub mod autotools;
pub mod config;
pub mod context;
pub mod env;
pub mod error;
pub mod extract;
pub mod install;
pub mod output;
pub mod package;
pub mod runner;
pub mod script;

pub use autotools::simple_build;
pub use config::Constants;
pub use context::{BuildContext, FailurePolicy};
pub use env::{with_modified_env, ModifiedEnv};
pub use error::{Error, Result};
pub use extract::{extract, extract_source, ArchiveKind, StagedSource};
pub use install::{ensure_dir, install_binaries, install_tree, lcopy};
pub use package::{create_package, install_package, PackageFilter};
pub use runner::{run, run_with, CommandSpec, LibraryPath, RunOptions};
pub use script::ScriptHost;
