//! Build runtimes: backend resolution, spec validation, and the
//! cache-aware instruction driver


mod cache;
mod crun;

pub use cache::{BuildLock, InstructionCache};
pub use crun::CrunRuntime;

/// The embedded base OCI config template for the crun backend
pub fn crun_default_config() -> &'static str {
    crun::DEFAULT_CONFIG
}

use crate::{
    containerfile::{BuildInstruction, BuildSpec},
    errors::RuntimeError,
    paths::Paths,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Label keys a valid build spec is required to carry
pub mod labels {
    pub const SCHEMA_VERSION: &str = "org.pkgbox.schema.version";
    pub const PACKAGE_NAME: &str = "org.pkgbox.package.name";
    pub const PACKAGE_VERSION: &str = "org.pkgbox.package.version";
    pub const PACKAGE_RELEASE: &str = "org.pkgbox.package.release";
}

/// Schema version this implementation understands
pub const SUPPORTED_SCHEMA: &str = "1";

/// Capability set implemented by every build runtime backend
pub trait Runtime {
    /// Verify the backend's external executable is resolvable and runnable.
    /// No side effects.
    fn preflight_check(&self) -> Result<(), RuntimeError>;

    /// Validate the spec's required metadata and set up per-build scratch
    /// state. Idempotent for the same build identity.
    fn prepare_build(&mut self, spec: &BuildSpec) -> Result<(), RuntimeError>;

    /// Execute the spec's instructions strictly in order, yielding one
    /// outcome per instruction as it completes.
    fn run_build<'a>(&'a mut self, spec: &'a BuildSpec) -> Result<BuildRun<'a>, RuntimeError>;
}

type RuntimeFactory = Box<dyn Fn() -> Box<dyn Runtime>>;

/// Explicit name-to-backend registry
///
/// Constructed once at process start and passed where needed; there is no
/// hidden global lookup table. Resolving an unregistered name is a
/// configuration error.
pub struct RuntimeRegistry {
    factories: HashMap<String, RuntimeFactory>,
}

impl RuntimeRegistry {
    pub fn new() -> Self {
        RuntimeRegistry {
            factories: HashMap::new(),
        }
    }

    /// A registry with every built-in backend registered
    pub fn with_defaults(paths: &Paths) -> Self {
        let mut registry = RuntimeRegistry::new();
        let paths = paths.clone();
        registry.register("crun", move || Box::new(CrunRuntime::new(paths.clone())));
        registry
    }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn Runtime> + 'static,
    {
        self.factories.insert(name.to_owned(), Box::new(factory));
    }

    pub fn resolve(&self, name: &str) -> Result<Box<dyn Runtime>, RuntimeError> {
        match self.factories.get(name) {
            Some(factory) => Ok(factory()),
            None => Err(RuntimeError::UnknownRuntime(name.to_owned())),
        }
    }
}

/// Typed view of the labels a build must declare
///
/// The validator reports every missing or empty package label at once
/// instead of stopping at the first.
#[derive(Debug, Clone)]
pub struct BuildMetadata {
    pub package_name: String,
    pub package_version: String,
    pub package_release: String,
}

impl BuildMetadata {
    pub fn from_spec(spec: &BuildSpec) -> Result<Self, RuntimeError> {
        let schema = spec
            .labels()
            .get(labels::SCHEMA_VERSION)
            .cloned()
            .unwrap_or_default();
        if schema != SUPPORTED_SCHEMA {
            return Err(RuntimeError::UnsupportedSchema(schema));
        }

        let mut missing = Vec::new();
        let mut required = |key: &str| -> String {
            match spec.labels().get(key) {
                Some(value) if !value.is_empty() => value.clone(),
                _ => {
                    missing.push(key.to_owned());
                    String::new()
                }
            }
        };
        let package_name = required(labels::PACKAGE_NAME);
        let package_version = required(labels::PACKAGE_VERSION);
        let package_release = required(labels::PACKAGE_RELEASE);

        if !missing.is_empty() {
            return Err(RuntimeError::InvalidSpec(missing));
        }
        Ok(BuildMetadata {
            package_name,
            package_version,
            package_release,
        })
    }
}

/// Result of one executed (or replayed) build instruction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionOutcome {
    pub context: String,
    pub command: String,
    pub digest: String,
    /// true when this outcome was replayed from the cache; not part of the
    /// stored record
    #[serde(default, skip_serializing)]
    pub cached: bool,
}

/// Backend-specific execution of a single instruction; the error value is
/// the human-readable failure detail.
pub(crate) trait StepExecutor {
    fn execute(&mut self, instruction: &BuildInstruction) -> Result<(), String>;
}

/// Lazy, finite, non-restartable sequence of per-instruction outcomes
///
/// Yields exactly one outcome per instruction, in spec order. Before an
/// instruction executes, the content-addressed cache is consulted by
/// instruction digest; a hit replays the stored outcome without invoking
/// the backend. Fresh results are stored before the next instruction
/// starts, so instruction *i+1* always observes the state committed by
/// instruction *i*. The sequence is fused after the first failure, and
/// everything completed before the failure stays cached, which lets a
/// later run resume from the failed instruction.
pub struct BuildRun<'a> {
    instructions: std::slice::Iter<'a, BuildInstruction>,
    cache: InstructionCache,
    exec: Box<dyn StepExecutor>,
    stopped: bool,
    _lock: BuildLock,
}

impl<'a> BuildRun<'a> {
    pub(crate) fn new(
        spec: &'a BuildSpec,
        cache: InstructionCache,
        exec: Box<dyn StepExecutor>,
        lock: BuildLock,
    ) -> Self {
        BuildRun {
            instructions: spec.instructions().iter(),
            cache,
            exec,
            stopped: false,
            _lock: lock,
        }
    }

    /// Cooperatively stop before the next instruction; nothing already
    /// completed is rolled back.
    pub fn cancel(&mut self) {
        self.stopped = true;
    }

    fn step(&mut self, instruction: &BuildInstruction) -> Result<InstructionOutcome, RuntimeError> {
        match self.cache.lookup(instruction.digest()) {
            Ok(Some(outcome)) => {
                log::info!("{} {} replayed from cache", instruction.context(), instruction.digest());
                return Ok(outcome);
            }
            Ok(None) => (),
            Err(err) => {
                self.stopped = true;
                return Err(err);
            }
        }

        log::info!("{} {} executing...", instruction.context(), instruction.digest());
        if let Err(detail) = self.exec.execute(instruction) {
            self.stopped = true;
            return Err(RuntimeError::Execution {
                context: instruction.context().to_owned(),
                digest: instruction.digest().to_string(),
                detail,
            });
        }

        let outcome = InstructionOutcome {
            context: instruction.context().to_owned(),
            command: instruction.command().to_owned(),
            digest: instruction.digest().to_string(),
            cached: false,
        };
        if let Err(err) = self.cache.store(instruction.digest(), &outcome) {
            self.stopped = true;
            return Err(err);
        }
        Ok(outcome)
    }
}

impl<'a> Iterator for BuildRun<'a> {
    type Item = Result<InstructionOutcome, RuntimeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.stopped {
            return None;
        }
        let instruction = self.instructions.next()?;
        Some(self.step(instruction))
    }
}
