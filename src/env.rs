//! Scoped process environment overlays.
//!
//! The process environment is global state. These helpers assume a single
//! build pipeline per process; concurrent readers in other threads are the
//! caller's problem.

use std::ffi::{OsStr, OsString};

/// RAII guard that applies an environment overlay and restores the previous
/// values (or absence) on drop, including early error returns and panics.
///
/// ```ignore
/// let _env = ModifiedEnv::apply([("CFLAGS", Some("-O2")), ("MAKEFLAGS", None)]);
/// run(&ctx, "make")?;
/// // CFLAGS and MAKEFLAGS are back to what they were here
/// ```
#[must_use = "the overlay is reverted as soon as the guard is dropped"]
pub struct ModifiedEnv {
    orig: Vec<(OsString, Option<OsString>)>,
}

impl ModifiedEnv {
    /// Apply `mods`: `Some(value)` sets the variable, `None` removes it.
    pub fn apply<I, K, V>(mods: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        let mut orig: Vec<(OsString, Option<OsString>)> = Vec::new();
        for (key, val) in mods {
            let key = key.as_ref().to_os_string();
            // Repeated keys: the first capture is the real original.
            if !orig.iter().any(|(k, _)| *k == key) {
                orig.push((key.clone(), std::env::var_os(&key)));
            }
            let val: Option<&OsStr> = val.as_ref().map(|v| v.as_ref());
            set_or_remove(&key, val);
        }
        Self { orig }
    }
}

impl Drop for ModifiedEnv {
    fn drop(&mut self) {
        for (key, val) in self.orig.iter().rev() {
            set_or_remove(key, val.as_deref());
        }
    }
}

fn set_or_remove(key: &OsStr, val: Option<&OsStr>) {
    // Safety: single-threaded build pipeline, see module docs
    unsafe {
        match val {
            Some(v) => std::env::set_var(key, v),
            None => std::env::remove_var(key),
        }
    }
}

/// Run `f` with `mods` applied to the process environment.
pub fn with_modified_env<I, K, V, T>(mods: I, f: impl FnOnce() -> T) -> T
where
    I: IntoIterator<Item = (K, Option<V>)>,
    K: AsRef<OsStr>,
    V: AsRef<OsStr>,
{
    let _guard = ModifiedEnv::apply(mods);
    f()
}
