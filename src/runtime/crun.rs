//! Runtime backend that drives builds through the crun container runtime

use crate::{
    containerfile::{BuildInstruction, BuildSpec},
    errors::RuntimeError,
    paths::Paths,
    runtime::{BuildLock, BuildMetadata, BuildRun, InstructionCache, Runtime, StepExecutor},
};
use std::{
    env,
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
    process::Command,
};

/// Base OCI runtime configuration, installed by `pkgbox init`; a copy
/// under `{config_dir}/crun/config.json` takes precedence when present.
pub(crate) static DEFAULT_CONFIG: &str = include_str!("../../assets/crun/config.json");

/// Build runtime backed by the `crun` command line tool
///
/// Each instruction runs in a kernel container (pid/ipc/uts/mount
/// namespaces) over the build's scratch rootfs.
pub struct CrunRuntime {
    paths: Paths,
}

impl CrunRuntime {
    pub fn new(paths: Paths) -> Self {
        CrunRuntime { paths }
    }

    fn scratch_dir(&self, spec: &BuildSpec) -> PathBuf {
        self.paths.build_dir().join(spec.instructions_digest().hex())
    }

    fn base_config(&self) -> Result<serde_json::Value, RuntimeError> {
        let user_config = self.paths.crun_config();
        let text = if user_config.is_file() {
            fs::read_to_string(&user_config)?
        } else {
            DEFAULT_CONFIG.to_owned()
        };
        Ok(serde_json::from_str(&text)?)
    }

    pub(crate) fn preflight_with_path(&self, search_path: Option<&OsStr>) -> Result<(), RuntimeError> {
        let path = find_in_path("crun", search_path)
            .ok_or_else(|| RuntimeError::Unavailable("cannot find \"crun\" in $PATH".to_owned()))?;
        if !is_executable(&path) {
            return Err(RuntimeError::Unavailable(format!(
                "not enough permissions to run {:?}",
                path
            )));
        }
        Ok(())
    }
}

impl Runtime for CrunRuntime {
    fn preflight_check(&self) -> Result<(), RuntimeError> {
        self.preflight_with_path(env::var_os("PATH").as_deref())
    }

    fn prepare_build(&mut self, spec: &BuildSpec) -> Result<(), RuntimeError> {
        let metadata = BuildMetadata::from_spec(spec)?;
        let scratch = self.scratch_dir(spec);
        fs::create_dir_all(scratch.join("rootfs"))?;

        let mut config = self.base_config()?;
        if let Some(env_list) = config["process"]["env"].as_array_mut() {
            for (key, value) in spec.envs() {
                env_list.push(serde_json::json!(format!("{}={}", key, value)));
            }
        }
        fs::write(scratch.join("config.json"), serde_json::to_vec_pretty(&config)?)?;

        log::info!(
            "prepared build {} for package {} {}-{}",
            spec.instructions_digest(),
            metadata.package_name,
            metadata.package_version,
            metadata.package_release,
        );
        Ok(())
    }

    fn run_build<'a>(&'a mut self, spec: &'a BuildSpec) -> Result<BuildRun<'a>, RuntimeError> {
        let scratch = self.scratch_dir(spec);
        if !scratch.join("config.json").is_file() {
            self.prepare_build(spec)?;
        }
        let lock = BuildLock::acquire(&self.paths.build_dir(), spec.instructions_digest())?;
        let cache = InstructionCache::new(self.paths.cache_dir());
        let exec = Box::new(CrunExecutor { bundle: scratch });
        Ok(BuildRun::new(spec, cache, exec, lock))
    }
}

struct CrunExecutor {
    bundle: PathBuf,
}

impl StepExecutor for CrunExecutor {
    fn execute(&mut self, instruction: &BuildInstruction) -> Result<(), String> {
        if instruction.context() != "RUN" {
            // metadata directives apply instantly; only RUN enters the container
            return Ok(());
        }
        self.set_process_args(instruction.command())
            .map_err(|err| err.to_string())?;

        let container_id = format!("pkgbox-{}", &instruction.digest().hex()[..12]);
        let output = Command::new("crun")
            .arg("run")
            .arg("--bundle")
            .arg(&self.bundle)
            .arg(&container_id)
            .output()
            .map_err(|err| err.to_string())?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(format!("crun exited with {}: {}", output.status, stderr.trim()))
        }
    }
}

impl CrunExecutor {
    fn set_process_args(&self, command: &str) -> Result<(), RuntimeError> {
        let path = self.bundle.join("config.json");
        let mut config: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        config["process"]["args"] = serde_json::json!(["/bin/sh", "-c", command]);
        fs::write(&path, serde_json::to_vec_pretty(&config)?)?;
        Ok(())
    }
}

pub(crate) fn find_in_path(name: &str, search_path: Option<&OsStr>) -> Option<PathBuf> {
    env::split_paths(search_path?)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|meta| meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
