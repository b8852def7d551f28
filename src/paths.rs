//! Directory resolution and first-run bootstrap

use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

/// Resolved pkgbox directories
///
/// `config_dir` holds user-editable configuration such as the base crun
/// config; `data_dir` holds the layer store, the instruction cache, and
/// per-build scratch space.
#[derive(Clone, Debug, PartialEq)]
pub struct Paths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl Paths {
    /// Resolve directories from the process environment
    ///
    /// `PKGBOX_HOME` wins when set; otherwise the XDG directories, then
    /// the usual `$HOME` locations, with `/opt/pkgbox` as a last resort.
    pub fn resolve() -> Paths {
        Paths::resolve_from(|name| env::var(name).ok())
    }

    fn resolve_from<F: Fn(&str) -> Option<String>>(var: F) -> Paths {
        if let Some(home) = var("PKGBOX_HOME") {
            return Paths {
                config_dir: Path::new(&home).join("config"),
                data_dir: Path::new(&home).join("data"),
            };
        }

        let mut config_dir = var("XDG_CONFIG_HOME").map(|dir| Path::new(&dir).join("pkgbox"));
        let mut data_dir = var("XDG_DATA_HOME").map(|dir| Path::new(&dir).join("pkgbox"));

        if let Some(home) = var("HOME") {
            config_dir.get_or_insert_with(|| Path::new(&home).join(".config").join("pkgbox"));
            data_dir
                .get_or_insert_with(|| Path::new(&home).join(".local").join("share").join("pkgbox"));
        }

        Paths {
            config_dir: config_dir.unwrap_or_else(|| PathBuf::from("/opt/pkgbox/config")),
            data_dir: data_dir.unwrap_or_else(|| PathBuf::from("/opt/pkgbox/data")),
        }
    }

    /// Create the directories when missing
    pub fn ensure(&self) -> io::Result<()> {
        fs::create_dir_all(&self.config_dir)?;
        fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }

    /// On-disk layer store, one `{algorithm}:{hex}.tar.gz` per layer
    pub fn layer_dir(&self) -> PathBuf {
        self.data_dir.join("oci-layers")
    }

    /// Content-addressed instruction result cache
    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    /// Per-build scratch directories and occupancy markers
    pub fn build_dir(&self) -> PathBuf {
        self.data_dir.join("builds")
    }

    /// User-editable base crun configuration
    pub fn crun_config(&self) -> PathBuf {
        self.config_dir.join("crun").join("config.json")
    }
}

/// Install the base runtime config template into the config dir
pub fn bootstrap(paths: &Paths) -> io::Result<()> {
    let dest = paths.crun_config();
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&dest, crate::runtime::crun_default_config())
}
