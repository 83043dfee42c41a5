//! Build constants: install prefix, scripts dir, build output dir, shell.
//!
//! Resolution order, later sources winning:
//! 1. built-in defaults under `$XDG_DATA_HOME/bundle-deps`
//! 2. `bundle-deps/constants.toml` in each `$XDG_CONFIG_DIRS` entry, then `$XDG_CONFIG_HOME`
//! 3. `BUNDLE_PREFIX`, `BUNDLE_SCRIPTS`, `BUNDLE_BUILD_DIR`, `BUNDLE_SHELL`

use crate::error::{Error, Result};
use serde::Deserialize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

pub const DEFAULT_SHELL: &str = "/bin/bash";

/// Paths shared by every helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constants {
    /// Prefix where previously built dependencies are installed.
    pub prefix: PathBuf,
    /// Directory holding helper scripts such as `ld.sh`.
    pub scripts_dir: PathBuf,
    /// Output tree of the dependency currently being built.
    pub build_dir: PathBuf,
    /// Interactive shell launched when a command fails.
    pub shell: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConstantsToml {
    prefix: Option<PathBuf>,
    scripts_dir: Option<PathBuf>,
    build_dir: Option<PathBuf>,
    shell: Option<PathBuf>,
}

impl ConstantsToml {
    fn merge(&mut self, other: ConstantsToml) {
        if other.prefix.is_some() {
            self.prefix = other.prefix;
        }
        if other.scripts_dir.is_some() {
            self.scripts_dir = other.scripts_dir;
        }
        if other.build_dir.is_some() {
            self.build_dir = other.build_dir;
        }
        if other.shell.is_some() {
            self.shell = other.shell;
        }
    }

    fn merge_env(&mut self) {
        let var = |name: &str| {
            std::env::var_os(name)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        };
        self.merge(ConstantsToml {
            prefix: var("BUNDLE_PREFIX"),
            scripts_dir: var("BUNDLE_SCRIPTS"),
            build_dir: var("BUNDLE_BUILD_DIR"),
            shell: var("BUNDLE_SHELL"),
        });
    }

    fn resolve(self) -> Constants {
        let prefix = self.prefix.unwrap_or_else(default_prefix);
        let root = prefix
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| prefix.clone());
        Constants {
            scripts_dir: self.scripts_dir.unwrap_or_else(|| root.join("scripts")),
            build_dir: self.build_dir.unwrap_or_else(|| root.join("build")),
            shell: self.shell.unwrap_or_else(|| PathBuf::from(DEFAULT_SHELL)),
            prefix,
        }
    }
}

impl Default for Constants {
    fn default() -> Self {
        ConstantsToml::default().resolve()
    }
}

impl Constants {
    /// Constants rooted at an explicit prefix, with sibling `scripts` and `build` dirs.
    pub fn with_prefix(prefix: impl Into<PathBuf>) -> Self {
        ConstantsToml {
            prefix: Some(prefix.into()),
            ..Default::default()
        }
        .resolve()
    }

    /// Set the scripts directory.
    pub fn scripts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scripts_dir = dir.into();
        self
    }

    /// Set the build output directory.
    pub fn build_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.build_dir = dir.into();
        self
    }

    /// Set the shell used for the failure escape hatch.
    pub fn shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Load from the XDG config files, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut merged = ConstantsToml::default();
        for path in find_config_files() {
            if path.exists() {
                merged.merge(read_toml(&path)?);
            }
        }
        merged.merge_env();
        Ok(merged.resolve())
    }

    /// Load a single TOML file. Environment overrides are not applied.
    pub fn load_file(path: &Path) -> Result<Self> {
        Ok(read_toml(path)?.resolve())
    }

    /// The library directory of the install prefix.
    pub fn prefix_lib(&self) -> PathBuf {
        self.prefix.join("lib")
    }

    /// The library path wrapper script.
    pub fn ld_wrapper(&self) -> PathBuf {
        self.scripts_dir.join("ld.sh")
    }
}

fn default_prefix() -> PathBuf {
    env_dir("XDG_DATA_HOME")
        .or_else(dirs::data_dir)
        .unwrap_or_else(|| PathBuf::from(".local/share"))
        .join("bundle-deps")
        .join("sw")
}

fn env_dir(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn find_config_files() -> Vec<PathBuf> {
    let system = std::env::var_os("XDG_CONFIG_DIRS").unwrap_or_else(|| "/etc/xdg".into());
    let user = env_dir("XDG_CONFIG_HOME")
        .or_else(dirs::config_dir)
        .unwrap_or_else(|| PathBuf::from(".config"));
    config_files(&system, &user)
}

// System dirs first, so the user file wins when merged.
fn config_files(system: &OsStr, user: &Path) -> Vec<PathBuf> {
    std::env::split_paths(system)
        .filter(|dir| !dir.as_os_str().is_empty())
        .chain(std::iter::once(user.to_path_buf()))
        .map(|dir| dir.join("bundle-deps").join("constants.toml"))
        .collect()
}

fn read_toml(path: &Path) -> Result<ConstantsToml> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
    toml::from_str::<ConstantsToml>(&text)
        .map_err(|e| Error::Config(format!("invalid TOML in {}: {e}", path.display())))
}
