//! Install helpers
//!
//! Copy build outputs into the build output dir:
//! - `install_binaries` copies glob matches into `<build_dir>/lib` (or another
//!   subdir), keeping symlinks as symlinks and making everything else 0755
//! - `install_tree` replaces `<build_dir>/include/<name>` with a full copy of
//!   a directory
//!
//! Symlinks are never followed; a link is recreated with the same target.

use crate::context::BuildContext;
use crate::error::{Error, Result};
use crate::output;
use glob::{MatchOptions, Pattern};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// How many times `lcopy` deletes a conflicting destination and tries again.
pub const MAX_COPY_RETRIES: usize = 1;

/// Copy `src` to `dst`, recreating symlinks instead of following them.
///
/// Returns `true` when `src` was a symlink. If `dst` is in the way, it is
/// deleted and the copy retried once; a second conflict is returned.
pub fn lcopy(src: &Path, dst: &Path) -> Result<bool> {
    lcopy_with(src, dst, try_lcopy)
}

fn lcopy_with<F>(src: &Path, dst: &Path, mut attempt: F) -> Result<bool>
where
    F: FnMut(&Path, &Path) -> std::io::Result<bool>,
{
    let mut retries = 0;
    loop {
        match attempt(src, dst) {
            Err(e) if e.kind() == ErrorKind::AlreadyExists && retries < MAX_COPY_RETRIES => {
                retries += 1;
                std::fs::remove_file(dst).map_err(|e| Error::path(dst, e))?;
            }
            result => {
                return result.map_err(|source| Error::Copy {
                    src: src.to_path_buf(),
                    dst: dst.to_path_buf(),
                    source,
                });
            }
        }
    }
}

fn try_lcopy(src: &Path, dst: &Path) -> std::io::Result<bool> {
    if src.symlink_metadata()?.file_type().is_symlink() {
        let target = std::fs::read_link(src)?;
        symlink(&target, dst)?;
        Ok(true)
    } else {
        std::fs::copy(src, dst)?;
        Ok(false)
    }
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

/// Create a directory and its parents. An existing directory is not an error.
pub fn ensure_dir(path: &Path) -> Result<()> {
    match std::fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => Err(Error::path(path, e)),
    }
}

/// Install files matching `pattern` (relative to `ctx.cwd`) into
/// `<build_dir>/<destdir>`, returning the installed paths.
///
/// # Example
/// ```ignore
/// install_binaries(&ctx, ".libs/libz.so*", "lib")?;
/// ```
pub fn install_binaries(ctx: &BuildContext, pattern: &str, destdir: &str) -> Result<Vec<PathBuf>> {
    let dest = ctx.build_dir().join(destdir);
    let full_pattern = anchored_pattern(&ctx.cwd, pattern);
    let matches: Vec<PathBuf> = glob::glob_with(&full_pattern, MATCH_OPTIONS)
        .map_err(|e| Error::Glob {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?
        .filter_map(|r| r.ok())
        .collect();

    if matches.is_empty() {
        output::warning(&format!("no files match pattern: {}", pattern));
        return Ok(Vec::new());
    }
    ensure_dir(&dest)?;

    let mut installed = Vec::with_capacity(matches.len());
    for src in matches {
        let Some(name) = src.file_name() else {
            continue;
        };
        let dst = dest.join(name);
        output::detail(&format!("install {} -> {}", src.display(), dst.display()));
        if !lcopy(&src, &dst)? {
            set_mode(&dst, 0o755)?;
        }
        installed.push(dst);
    }
    Ok(installed)
}

// Leading dots must be matched literally, so `*` skips hidden files.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: true,
};

// Only `pattern` is a glob; the directory it is relative to is taken literally.
fn anchored_pattern(cwd: &Path, pattern: &str) -> String {
    if Path::new(pattern).is_absolute() {
        return pattern.to_string();
    }
    let base = Pattern::escape(&cwd.to_string_lossy());
    Path::new(&base).join(pattern).to_string_lossy().into_owned()
}

/// Copy the directory `src` (relative to `ctx.cwd`) to
/// `<build_dir>/<dest_parent>/<name of src>`, replacing whatever was there.
pub fn install_tree(ctx: &BuildContext, src: &Path, dest_parent: &str) -> Result<PathBuf> {
    let src = ctx.resolve(src);
    let name = src.file_name().ok_or_else(|| {
        Error::path(
            &src,
            std::io::Error::new(ErrorKind::InvalidInput, "path has no file name"),
        )
    })?;
    let dst = ctx.build_dir().join(dest_parent).join(name);

    if dst.symlink_metadata().is_ok() {
        remove_any(&dst)?;
    }
    output::detail(&format!("install {} -> {}", src.display(), dst.display()));
    copy_tree(&src, &dst)?;
    Ok(dst)
}

fn remove_any(path: &Path) -> Result<()> {
    let is_dir = path
        .symlink_metadata()
        .map(|m| m.is_dir())
        .map_err(|e| Error::path(path, e))?;
    if is_dir {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    }
    .map_err(|e| Error::path(path, e))
}

/// Recursively copy `src` to `dst`, which must not exist yet.
///
/// Symlinks are recreated, files copied with their permission bits, and
/// directory permissions applied once their contents are in place.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    let mut dirs = Vec::new();

    for entry in WalkDir::new(src).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            Error::path(path, e.into())
        })?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| Error::path(entry.path(), std::io::Error::other(e)))?;
        let target = dst.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| Error::path(&target, e))?;
            dirs.push((target, entry.path().to_path_buf()));
        } else {
            lcopy(entry.path(), &target)?;
        }
    }

    // Deepest first so read-only directories don't block their children.
    for (target, source) in dirs.iter().rev() {
        let perms = std::fs::metadata(source)
            .map_err(|e| Error::path(source, e))?
            .permissions();
        std::fs::set_permissions(target, perms).map_err(|e| Error::path(target, e))?;
    }

    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| Error::path(path, e))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
