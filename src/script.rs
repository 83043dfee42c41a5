//! Rhai bindings for driver scripts
//!
//! A driver script stages, builds, installs and packages one dependency by
//! calling the helpers below. They share one [`BuildContext`], so `cd()` and
//! `extract_source()` affect the commands that follow.
//!
//! ```rhai
//! extract_source("/sources/zlib-1.3.tar.gz");
//! simple_build();
//! install_binaries("libz.so*");
//! create_package(BUILD_DIR, "/packages/zlib.tar.bz2");
//! ```
//!
//! ## Functions
//!
//! - **run**: run(cmd), run_with_libs(cmd), run_with_libs(cmd, extra_lib_dirs)
//! - **staging**: extract(path), extract_source(path), cd(dir), cwd()
//! - **build**: simple_build()
//! - **install**: install_binaries(pattern[, destdir]), install_tree(src[, parent]), ensure_dir(path)
//! - **package**: create_package(src, out[, excluded_names]), install_package(pkg, dest)

use crate::autotools::simple_build;
use crate::context::BuildContext;
use crate::error::{Error, Result};
use crate::extract::{extract, extract_source};
use crate::install::{ensure_dir, install_binaries, install_tree};
use crate::package::{create_package, install_package};
use crate::runner::{run, run_with, LibraryPath, RunOptions};
use rhai::{Array, Dynamic, Engine, EvalAltResult, Scope};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

type ScriptResult<T> = std::result::Result<T, Box<EvalAltResult>>;

type SharedContext = Arc<Mutex<BuildContext>>;

/// A Rhai engine with every helper registered against a shared context.
pub struct ScriptHost {
    engine: Engine,
    ctx: SharedContext,
}

impl ScriptHost {
    pub fn new(ctx: BuildContext) -> Self {
        let ctx = Arc::new(Mutex::new(ctx));
        let mut engine = Engine::new();
        register_all(&mut engine, &ctx);
        Self { engine, ctx }
    }

    /// Run a driver script.
    pub fn eval(&self, source: &str) -> Result<()> {
        let mut scope = self.scope();
        self.engine
            .run_with_scope(&mut scope, source)
            .map_err(|e| Error::Script(e.to_string()))
    }

    /// Run a driver script from a file.
    pub fn eval_file(&self, path: &Path) -> Result<()> {
        let source = std::fs::read_to_string(path).map_err(|e| Error::path(path, e))?;
        self.eval(&source)
    }

    /// A snapshot of the context as the script left it.
    pub fn context(&self) -> BuildContext {
        lock(&self.ctx).clone()
    }

    fn scope(&self) -> Scope<'static> {
        let ctx = lock(&self.ctx);
        let mut scope = Scope::new();
        scope.push_constant("PREFIX", ctx.prefix().display().to_string());
        scope.push_constant("BUILD_DIR", ctx.build_dir().display().to_string());
        scope.push_constant(
            "SCRIPTS",
            ctx.constants.scripts_dir.display().to_string(),
        );
        scope
    }
}

fn lock(ctx: &SharedContext) -> MutexGuard<'_, BuildContext> {
    ctx.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn script_err(e: Error) -> Box<EvalAltResult> {
    e.to_string().into()
}

fn paths_to_array(paths: Vec<std::path::PathBuf>) -> Array {
    paths
        .into_iter()
        .map(|p| Dynamic::from(p.display().to_string()))
        .collect()
}

/// Register all helper functions with the Rhai engine
pub fn register_all(engine: &mut Engine, ctx: &SharedContext) {
    // Command runner
    let c = ctx.clone();
    engine.register_fn("run", move |cmd: &str| -> ScriptResult<()> {
        run(&lock(&c), cmd).map_err(script_err)
    });
    let c = ctx.clone();
    engine.register_fn("run_with_libs", move |cmd: &str| -> ScriptResult<()> {
        let opts = RunOptions::new().library_path(LibraryPath::Default);
        run_with(&lock(&c), cmd, &opts).map_err(script_err)
    });
    let c = ctx.clone();
    engine.register_fn(
        "run_with_libs",
        move |cmd: &str, extra: &str| -> ScriptResult<()> {
            let opts = RunOptions::new().library_path(LibraryPath::Prepend(extra.to_string()));
            run_with(&lock(&c), cmd, &opts).map_err(script_err)
        },
    );

    // Staging
    let c = ctx.clone();
    engine.register_fn("extract", move |path: &str| -> ScriptResult<()> {
        extract(&lock(&c), Path::new(path)).map_err(script_err)
    });
    let c = ctx.clone();
    engine.register_fn("extract_source", move |path: &str| -> ScriptResult<String> {
        let staged = extract_source(&mut lock(&c), Path::new(path)).map_err(script_err)?;
        Ok(staged.source_dir.display().to_string())
    });
    let c = ctx.clone();
    engine.register_fn("cd", move |dir: &str| {
        lock(&c).chdir(dir);
    });
    let c = ctx.clone();
    engine.register_fn("cwd", move || -> String { lock(&c).cwd.display().to_string() });

    // Build
    let c = ctx.clone();
    engine.register_fn("simple_build", move || -> ScriptResult<()> {
        simple_build(&lock(&c)).map_err(script_err)
    });

    // Install
    let c = ctx.clone();
    engine.register_fn("install_binaries", move |pattern: &str| -> ScriptResult<Array> {
        install_binaries(&lock(&c), pattern, "lib")
            .map(paths_to_array)
            .map_err(script_err)
    });
    let c = ctx.clone();
    engine.register_fn(
        "install_binaries",
        move |pattern: &str, destdir: &str| -> ScriptResult<Array> {
            install_binaries(&lock(&c), pattern, destdir)
                .map(paths_to_array)
                .map_err(script_err)
        },
    );
    let c = ctx.clone();
    engine.register_fn("install_tree", move |src: &str| -> ScriptResult<String> {
        install_tree(&lock(&c), Path::new(src), "include")
            .map(|p| p.display().to_string())
            .map_err(script_err)
    });
    let c = ctx.clone();
    engine.register_fn(
        "install_tree",
        move |src: &str, parent: &str| -> ScriptResult<String> {
            install_tree(&lock(&c), Path::new(src), parent)
                .map(|p| p.display().to_string())
                .map_err(script_err)
        },
    );
    let c = ctx.clone();
    engine.register_fn("ensure_dir", move |path: &str| -> ScriptResult<()> {
        ensure_dir(&lock(&c).resolve(path)).map_err(script_err)
    });

    // Packaging
    let c = ctx.clone();
    engine.register_fn("create_package", move |src: &str, out: &str| -> ScriptResult<i64> {
        let ctx = lock(&c);
        create_package(&ctx.resolve(src), &ctx.resolve(out), None)
            .map(|n| n as i64)
            .map_err(script_err)
    });
    let c = ctx.clone();
    engine.register_fn(
        "create_package",
        move |src: &str, out: &str, excluded: Array| -> ScriptResult<i64> {
            let names: Vec<String> = excluded.into_iter().map(|v| v.to_string()).collect();
            let filter = |parts: &[&str]| parts.iter().any(|p| names.iter().any(|n| n == p));
            let ctx = lock(&c);
            create_package(&ctx.resolve(src), &ctx.resolve(out), Some(&filter))
                .map(|n| n as i64)
                .map_err(script_err)
        },
    );
    let c = ctx.clone();
    engine.register_fn("install_package", move |pkg: &str, dest: &str| -> ScriptResult<()> {
        let ctx = lock(&c);
        install_package(&ctx.resolve(pkg), &ctx.resolve(dest)).map_err(script_err)
    });
}
