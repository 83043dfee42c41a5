//! Integration tests for the stage → build → install → package pipeline
//!
//! Tests that spawn `sh`, `make` or `tar` only run on Unix.

use bundle_deps::package::{package_entries, PACKAGE_GID, PACKAGE_UID};
use bundle_deps::{
    create_package, install_package, install_tree, BuildContext, Constants, FailurePolicy,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Create a test environment with sources, prefix and build output dirs
fn create_test_env() -> (TempDir, BuildContext) {
    let dir = TempDir::new().unwrap();
    let sources = dir.path().join("sources");
    std::fs::create_dir_all(&sources).unwrap();
    let ctx = BuildContext::new(
        Constants::with_prefix(dir.path().join("sw")).build_dir(dir.path().join("out")),
    )
    .policy(FailurePolicy::ReturnError)
    .cwd(&sources);
    (dir, ctx)
}

fn write_zip(path: &Path, entries: &[(&str, &str, u32)]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for (name, content, mode) in entries {
        let options = zip::write::SimpleFileOptions::default().unix_permissions(*mode);
        zip.start_file(*name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

fn list_tree(root: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|e| e.unwrap().path().strip_prefix(root).unwrap().to_path_buf())
        .collect();
    paths.sort();
    paths
}

// =============================================================================
// Packaging
// =============================================================================

#[test]
fn test_package_round_trip_excludes_docs() {
    let (dir, _ctx) = create_test_env();
    let out = dir.path().join("out");
    std::fs::create_dir_all(out.join("bin")).unwrap();
    std::fs::create_dir_all(out.join("doc/html")).unwrap();
    std::fs::create_dir_all(out.join("share/man/man1")).unwrap();
    std::fs::create_dir_all(out.join("share/pkg")).unwrap();
    std::fs::write(out.join("bin/tool"), "#!/bin/sh\n").unwrap();
    std::fs::write(out.join("doc/html/index.html"), "").unwrap();
    std::fs::write(out.join("share/man/man1/tool.1"), "").unwrap();
    std::fs::write(out.join("share/pkg/data"), "d").unwrap();

    let pkg = dir.path().join("tool.tar.bz2");
    create_package(&out, &pkg, None).unwrap();

    let dest = dir.path().join("unpacked");
    install_package(&pkg, &dest).unwrap();

    assert_eq!(
        list_tree(&dest),
        vec![
            PathBuf::from("bin"),
            PathBuf::from("bin/tool"),
            PathBuf::from("share"),
            PathBuf::from("share/pkg"),
            PathBuf::from("share/pkg/data"),
        ]
    );
}

#[test]
fn test_package_normalizes_ownership() {
    let (dir, _ctx) = create_test_env();
    let out = dir.path().join("out");
    std::fs::create_dir_all(out.join("bin")).unwrap();
    std::fs::create_dir_all(out.join("lib")).unwrap();
    std::fs::write(out.join("bin/tool"), "x").unwrap();
    std::fs::write(out.join("lib/libfoo.so.1"), "y").unwrap();
    #[cfg(unix)]
    std::os::unix::fs::symlink("libfoo.so.1", out.join("lib/libfoo.so")).unwrap();

    let pkg = dir.path().join("foo.tar.bz2");
    create_package(&out, &pkg, None).unwrap();

    let file = std::fs::File::open(&pkg).unwrap();
    let mut archive = tar::Archive::new(bzip2::read::BzDecoder::new(file));
    let mut seen = 0;
    for entry in archive.entries().unwrap() {
        let entry = entry.unwrap();
        let header = entry.header();
        assert_eq!(header.uid().unwrap(), PACKAGE_UID);
        assert_eq!(header.gid().unwrap(), PACKAGE_GID);
        seen += 1;
    }
    assert!(seen >= 4);
}

#[test]
fn test_package_caller_filter_prunes_subtree() {
    let (dir, _ctx) = create_test_env();
    let out = dir.path().join("out");
    std::fs::create_dir_all(out.join("lib/python3.12/test")).unwrap();
    std::fs::write(out.join("lib/python3.12/test/big.py"), "").unwrap();
    std::fs::write(out.join("lib/python3.12/os.py"), "").unwrap();

    let pkg = dir.path().join("py.tar.bz2");
    let no_tests = |parts: &[&str]| parts.len() > 2 && parts[2] == "test";
    create_package(&out, &pkg, Some(&no_tests)).unwrap();

    let names = package_entries(&pkg).unwrap();
    assert_eq!(
        names,
        vec![
            PathBuf::from("lib"),
            PathBuf::from("lib/python3.12"),
            PathBuf::from("lib/python3.12/os.py"),
        ]
    );
}

// =============================================================================
// Tree install
// =============================================================================

#[test]
fn test_install_tree_twice_matches_once() {
    let (dir, ctx) = create_test_env();
    let src = dir.path().join("sources/headers");
    std::fs::create_dir_all(src.join("detail")).unwrap();
    std::fs::write(src.join("a.h"), "a").unwrap();
    std::fs::write(src.join("detail/b.h"), "b").unwrap();

    let dst = install_tree(&ctx, Path::new("headers"), "include").unwrap();
    let once = list_tree(&dst);
    install_tree(&ctx, Path::new("headers"), "include").unwrap();
    let twice = list_tree(&dst);

    assert_eq!(once, twice);
    assert!(!dst.join("headers").exists());
}

// =============================================================================
// Full pipeline
// =============================================================================

#[cfg(unix)]
#[test]
fn test_stage_build_install_package() {
    let (dir, mut ctx) = create_test_env();

    let make_available = std::process::Command::new("make")
        .arg("--version")
        .output()
        .is_ok_and(|o| o.status.success());
    if !make_available {
        return;
    }

    let configure = "#!/bin/sh\n\
        prefix=\"${1#--prefix=}\"\n\
        printf 'all:\\n\\techo built > libdemo.so.1\\ninstall:\\n\\tmkdir -p %s/share/doc\\n\\ttouch %s/share/doc/README\\n' \"$prefix\" \"$prefix\" > Makefile\n";
    write_zip(
        &dir.path().join("sources/demo-1.0.zip"),
        &[
            ("demo-1.0/configure", configure, 0o755),
            ("demo-1.0/include/demo/demo.h", "int demo(void);\n", 0o644),
        ],
    );

    let staged = bundle_deps::extract_source(&mut ctx, Path::new("demo-1.0.zip")).unwrap();
    assert!(ctx.cwd.ends_with("demo-1.0"));

    bundle_deps::simple_build(&ctx).unwrap();
    std::os::unix::fs::symlink("libdemo.so.1", ctx.cwd.join("libdemo.so")).unwrap();

    let installed = bundle_deps::install_binaries(&ctx, "libdemo.so*", "lib").unwrap();
    assert_eq!(installed.len(), 2);
    install_tree(&ctx, Path::new("include/demo"), "include").unwrap();

    let out = dir.path().join("out");
    assert!(out.join("share/doc/README").exists());

    let pkg = dir.path().join("demo.tar.bz2");
    create_package(&out, &pkg, None).unwrap();
    let dest = dir.path().join("sw");
    install_package(&pkg, &dest).unwrap();

    assert_eq!(
        std::fs::read_to_string(dest.join("lib/libdemo.so.1")).unwrap(),
        "built\n"
    );
    assert_eq!(
        std::fs::read_link(dest.join("lib/libdemo.so")).unwrap(),
        PathBuf::from("libdemo.so.1")
    );
    assert!(dest.join("include/demo/demo.h").exists());
    assert!(!dest.join("share/doc").exists());

    std::fs::remove_dir_all(&staged.root).unwrap();
}

#[test]
fn test_environment_restored_around_pipeline_step() {
    let key = "BUNDLE_DEPS_PIPELINE_CFLAGS";
    let result: bundle_deps::Result<()> =
        bundle_deps::with_modified_env([(key, Some("-O2 -fPIC"))], || {
            assert_eq!(std::env::var(key).unwrap(), "-O2 -fPIC");
            Err(bundle_deps::Error::Config("simulated failure".into()))
        });
    assert!(result.is_err());
    assert!(std::env::var_os(key).is_none());
}
