use crate::{
    errors::RuntimeError,
    image::Descriptor,
    runtime::InstructionOutcome,
};
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

/// Content-addressed store of per-instruction build outcomes
///
/// One JSON record per instruction digest, so there is at most one stored
/// result per unique instruction across the spec's history. Records are
/// written to a temp file and renamed into place; whoever wins a racing
/// rename wrote identical content, so the store needs no locking.
pub struct InstructionCache {
    dir: PathBuf,
}

impl InstructionCache {
    pub fn new(dir: PathBuf) -> Self {
        InstructionCache { dir }
    }

    /// Look up the stored outcome for an instruction digest
    pub fn lookup(&self, digest: &Descriptor) -> Result<Option<InstructionOutcome>, RuntimeError> {
        let path = self.record_path(digest);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        log::debug!("cache hit for {}", digest);
        let mut outcome: InstructionOutcome = serde_json::from_slice(&data)?;
        outcome.cached = true;
        Ok(Some(outcome))
    }

    /// Store the outcome of a freshly executed instruction
    pub fn store(&self, digest: &Descriptor, outcome: &InstructionOutcome) -> Result<(), RuntimeError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.record_path(digest);
        let temp = path.with_extension(format!("json.{}.partial", std::process::id()));
        fs::write(&temp, serde_json::to_vec(outcome)?)?;
        fs::rename(&temp, &path)?;
        log::debug!("cache store for {}", digest);
        Ok(())
    }

    fn record_path(&self, digest: &Descriptor) -> PathBuf {
        self.dir.join(format!("{}.json", digest.hex()))
    }
}

/// Occupancy marker serializing builds of an identical spec
///
/// Keyed on the aggregate instructions digest, acquired with `create_new`
/// so exactly one build per digest is in flight; builds of different specs
/// never contend. The marker is removed on drop.
pub struct BuildLock {
    path: PathBuf,
}

impl BuildLock {
    pub fn acquire(dir: &Path, digest: &Descriptor) -> Result<BuildLock, RuntimeError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.lock", digest.hex()));
        match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(BuildLock { path }),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                Err(RuntimeError::BuildBusy(digest.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            log::warn!("failed to remove build lock {:?}: {}", self.path, err);
        }
    }
}
