//! Archive extraction and source staging
//!
//! Zip archives are unpacked in-process. Everything else is handed to the
//! system `tar`, which knows every compression the platform ships.
//!
//! ## Example
//!
//! ```ignore
//! let staged = extract_source(&mut ctx, Path::new("/sources/zlib-1.3.tar.gz"))?;
//! // ctx.cwd is now <tmp>/zlib-XXXXXX/zlib-1.3
//! simple_build(&ctx)?;
//! ```

use crate::context::BuildContext;
use crate::error::{Error, Result};
use crate::output;
use crate::runner::run;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

/// How an archive is unpacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// In-process zip extraction.
    Zip,
    /// `tar xf`, compression left to the tool.
    Tar,
}

impl ArchiveKind {
    /// `.zip` (any case) is a zip archive, anything else goes to tar.
    pub fn detect(path: &Path) -> Self {
        let name = path.to_string_lossy().to_lowercase();
        if name.ends_with(".zip") {
            ArchiveKind::Zip
        } else {
            ArchiveKind::Tar
        }
    }
}

/// Extract an archive into the context's working directory.
pub fn extract(ctx: &BuildContext, source: &Path) -> Result<()> {
    let source = ctx.resolve(source);
    match ArchiveKind::detect(&source) {
        ArchiveKind::Zip => {
            if ctx.dry_run {
                output::detail(&format!("unzip {}", source.display()));
                return Ok(());
            }
            extract_zip(&source, &ctx.cwd)
        }
        ArchiveKind::Tar => run(
            ctx,
            vec![
                "tar".to_string(),
                "xf".to_string(),
                source.to_string_lossy().into_owned(),
            ],
        ),
    }
}

/// Extract every entry of a zip archive into `dest`.
///
/// Entries whose names would land outside `dest` are skipped.
pub fn extract_zip(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive_path).map_err(|e| Error::path(archive_path, e))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| Error::archive(archive_path, e))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| Error::archive(archive_path, e))?;

        let outpath = match entry.enclosed_name() {
            Some(path) => dest.join(path),
            None => continue,
        };

        if entry.is_dir() {
            std::fs::create_dir_all(&outpath).map_err(|e| Error::path(&outpath, e))?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::path(parent, e))?;
        }
        let mut outfile = File::create(&outpath).map_err(|e| Error::path(&outpath, e))?;
        std::io::copy(&mut entry, &mut outfile).map_err(|e| Error::path(&outpath, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode & 0o7777))
                    .map_err(|e| Error::path(&outpath, e))?;
            }
        }
    }

    Ok(())
}

/// Where a source archive was staged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedSource {
    /// The temporary directory the archive was extracted into.
    pub root: PathBuf,
    /// The directory the context was left in.
    pub source_dir: PathBuf,
}

/// Extract `source` into a fresh temporary directory and move the context into it.
///
/// The directory is named after the archive up to its first hyphen
/// (`zlib-1.3.tar.gz` stages into `zlib-XXXXXX`). When the archive holds a
/// single top-level directory, the context descends into it; otherwise it
/// stays at the staging root. The staging directory is not removed.
pub fn extract_source(ctx: &mut BuildContext, source: &Path) -> Result<StagedSource> {
    let source = ctx.resolve(source);
    output::action(&format!("Staging {}", source.display()));
    let root = tempfile::Builder::new()
        .prefix(&staging_prefix(&source))
        .tempdir()?
        .keep();

    ctx.cwd = root.clone();
    extract(ctx, &source)?;

    let entries = std::fs::read_dir(&root)
        .map_err(|e| Error::path(&root, e))?
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| Error::path(&root, e))?;
    if let [only] = entries.as_slice()
        && only.path().is_dir()
    {
        ctx.chdir(only.file_name());
    }

    Ok(StagedSource {
        root,
        source_dir: ctx.cwd.clone(),
    })
}

fn staging_prefix(source: &Path) -> String {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.split('-').next().unwrap_or_default();
    format!("{}-", stem)
}

/// Compression of a tar stream, detected from its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
    Xz,
    Zstd,
}

impl Compression {
    pub fn detect(magic: &[u8]) -> Self {
        if magic.starts_with(&[0x1f, 0x8b]) {
            Compression::Gzip
        } else if magic.starts_with(b"BZh") {
            Compression::Bzip2
        } else if magic.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
            Compression::Xz
        } else if magic.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
            Compression::Zstd
        } else {
            Compression::None
        }
    }
}

/// Open a tar archive of any supported compression as a plain tar stream.
pub fn open_tar(archive_path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(archive_path).map_err(|e| Error::path(archive_path, e))?;
    let mut reader = BufReader::new(file);
    let magic = reader.fill_buf().map_err(|e| Error::path(archive_path, e))?;

    let stream: Box<dyn Read> = match Compression::detect(magic) {
        Compression::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
        Compression::Bzip2 => Box::new(bzip2::read::BzDecoder::new(reader)),
        Compression::Xz => Box::new(xz2::read::XzDecoder::new(reader)),
        Compression::Zstd => Box::new(
            zstd::stream::read::Decoder::new(reader)
                .map_err(|e| Error::archive(archive_path, format!("zstd init error: {}", e)))?,
        ),
        Compression::None => Box::new(reader),
    };
    Ok(stream)
}
