//! Package creation and installation
//!
//! A package is a bzip2-compressed tarball of the top-level directories of a
//! build output tree (`bin/`, `lib/`, `include/`, ...). Documentation trees
//! are left out and ownership is normalized so the artifact does not depend
//! on who built it.

use crate::error::{Error, Result};
use crate::extract::open_tar;
use crate::install::ensure_dir;
use crate::output;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tar::{EntryType, Header, HeaderMode};
use walkdir::WalkDir;

/// Path components that exclude an entry (and everything below it).
pub const EXCLUDED_COMPONENTS: [&str; 3] = ["doc", "man", "info"];

/// Owner stored for every packaged entry.
pub const PACKAGE_UID: u64 = 1000;
/// Group stored for every packaged entry.
pub const PACKAGE_GID: u64 = 100;

/// Caller policy: receives the slash-split archive path of an entry and
/// returns `true` to leave it out.
pub type PackageFilter<'a> = &'a dyn Fn(&[&str]) -> bool;

/// Whether the archive entry `name` is left out of the package.
pub fn is_excluded(name: &str, filter: Option<PackageFilter<'_>>) -> bool {
    let parts: Vec<&str> = name.split('/').collect();
    if parts.iter().any(|p| EXCLUDED_COMPONENTS.contains(p)) {
        return true;
    }
    filter.is_some_and(|f| f(&parts))
}

/// Package every top-level directory of `src_dir` into `outfile`.
///
/// Returns the number of entries written.
///
/// # Example
/// ```ignore
/// // keep static archives out of the runtime bundle
/// let no_static = |parts: &[&str]| parts.last().is_some_and(|p| p.ends_with(".a"));
/// create_package(&build_dir, &out.join("zlib.tar.bz2"), Some(&no_static))?;
/// ```
pub fn create_package(
    src_dir: &Path,
    outfile: &Path,
    filter: Option<PackageFilter<'_>>,
) -> Result<usize> {
    let pb = output::spinner(&format!("packaging {}", outfile.display()));
    match write_package(src_dir, outfile, filter) {
        Ok(count) => {
            output::progress_success(pb, &format!("packaged {} entries", count));
            Ok(count)
        }
        Err(e) => {
            output::progress_fail(pb, "packaging failed");
            Err(e)
        }
    }
}

fn write_package(src_dir: &Path, outfile: &Path, filter: Option<PackageFilter<'_>>) -> Result<usize> {
    let file = File::create(outfile).map_err(|e| Error::path(outfile, e))?;
    let encoder = bzip2::write::BzEncoder::new(BufWriter::new(file), bzip2::Compression::best());
    let mut builder = tar::Builder::new(encoder);

    let mut children = Vec::new();
    for entry in std::fs::read_dir(src_dir).map_err(|e| Error::path(src_dir, e))? {
        let entry = entry.map_err(|e| Error::path(src_dir, e))?;
        if entry.path().is_dir() {
            children.push(entry.path());
        }
    }
    children.sort();

    let mut count = 0;
    for child in children {
        let walker = WalkDir::new(&child)
            .follow_root_links(false)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                archive_name(src_dir, e.path()).is_some_and(|(_, name)| !is_excluded(&name, filter))
            });

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(child.as_path()).to_path_buf();
                Error::path(path, e.into())
            })?;
            let Some((rel, name)) = archive_name(src_dir, entry.path()) else {
                continue;
            };
            if append_entry(&mut builder, entry.path(), &rel)
                .map_err(|e| Error::archive(outfile, format!("{}: {}", name, e)))?
            {
                count += 1;
            }
        }
    }

    let encoder = builder
        .into_inner()
        .map_err(|e| Error::archive(outfile, e))?;
    encoder
        .finish()
        .and_then(|w| w.into_inner().map_err(|e| e.into_error()))
        .map_err(|e| Error::archive(outfile, e))?;
    Ok(count)
}

/// `path` relative to `root`, plus its slash-joined name for filtering.
///
/// The relative path is what gets stored, so names that are not valid UTF-8
/// keep their bytes; the lossy string is only matched against.
fn archive_name(root: &Path, path: &Path) -> Option<(PathBuf, String)> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some((rel.to_path_buf(), parts.join("/")))
    }
}

/// Append one filesystem entry with normalized ownership.
/// Returns false for entries that are not stored (devices, fifos, sockets).
fn append_entry<W: std::io::Write>(
    builder: &mut tar::Builder<W>,
    path: &Path,
    name: &Path,
) -> std::io::Result<bool> {
    let meta = std::fs::symlink_metadata(path)?;
    let file_type = meta.file_type();

    let mut header = Header::new_gnu();
    header.set_metadata_in_mode(&meta, HeaderMode::Complete);
    header.set_uid(PACKAGE_UID);
    header.set_gid(PACKAGE_GID);

    if file_type.is_dir() {
        header.set_entry_type(EntryType::Directory);
        header.set_size(0);
        builder.append_data(&mut header, name, std::io::empty())?;
    } else if file_type.is_symlink() {
        let target = std::fs::read_link(path)?;
        header.set_entry_type(EntryType::Symlink);
        header.set_size(0);
        builder.append_link(&mut header, name, target)?;
    } else if file_type.is_file() {
        let mut file = File::open(path)?;
        header.set_entry_type(EntryType::Regular);
        header.set_size(meta.len());
        builder.append_data(&mut header, name, &mut file)?;
    } else {
        return Ok(false);
    }
    Ok(true)
}

/// Extract a package (any compression) into `dest_dir`.
///
/// Packages come from [`create_package`] in the same pipeline and are
/// trusted.
pub fn install_package(pkg_path: &Path, dest_dir: &Path) -> Result<()> {
    ensure_dir(dest_dir)?;
    let pb = output::spinner(&format!("installing {}", pkg_path.display()));

    let stream = open_tar(pkg_path)?;
    let mut archive = tar::Archive::new(stream);
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);

    match archive.unpack(dest_dir) {
        Ok(()) => {
            output::progress_success(pb, &format!("installed into {}", dest_dir.display()));
            Ok(())
        }
        Err(e) => {
            output::progress_fail(pb, "install failed");
            Err(Error::archive(pkg_path, e))
        }
    }
}

/// List the entry names of a package, in archive order.
pub fn package_entries(pkg_path: &Path) -> Result<Vec<PathBuf>> {
    let mut archive = tar::Archive::new(open_tar(pkg_path)?);
    let mut names = Vec::new();
    for entry in archive.entries().map_err(|e| Error::archive(pkg_path, e))? {
        let entry = entry.map_err(|e| Error::archive(pkg_path, e))?;
        let path = entry.path().map_err(|e| Error::archive(pkg_path, e))?;
        names.push(path.into_owned());
    }
    Ok(names)
}
