//! Error types you might see while parsing, fetching, or running a build
//!
//! Every error renders a human-readable message and maps to a stable
//! sysexits-style process exit code via `exit_code()`.

use thiserror::Error;

/// Errors while reading or parsing a build specification
#[derive(Error, Debug)]
pub enum SpecError {
    /// source io error
    #[error("source io error: {0}")]
    Io(#[from] std::io::Error),

    /// network error while reading a source
    #[error("network error while reading source: {0}")]
    Network(#[from] reqwest::Error),

    /// http source responded with an error status
    #[error("source {url:?} responded with status {status}")]
    Http { url: String, status: u16 },

    /// malformed specification text
    #[error("parse error at line {line}: {detail}")]
    Syntax { line: usize, detail: String },
}

impl SpecError {
    pub fn exit_code(&self) -> i32 {
        match self {
            SpecError::Io(_) => 66,
            SpecError::Network(_) | SpecError::Http { .. } => 74,
            SpecError::Syntax { .. } => 65,
        }
    }
}

/// Errors during image reference handling and registry access
#[derive(Error, Debug)]
pub enum ImageError {
    /// invalid image reference format
    #[error("invalid image reference format: {0:?}")]
    InvalidReferenceFormat(String),

    /// registry server responded with an error status
    #[error("registry request {url:?} failed with status {status}")]
    RegistryStatus { url: String, status: u16 },

    /// registry response did not carry a usable content digest header
    #[error("registry response did not carry a usable docker-content-digest header")]
    MissingDigestHeader,

    /// malformed registry response body
    #[error("malformed registry response body: {0}")]
    ManifestBody(#[from] serde_json::Error),

    /// network request error
    #[error("network request error: {0}")]
    Network(#[from] reqwest::Error),

    /// layer storage io error
    #[error("layer storage io error: {0}")]
    Storage(#[from] std::io::Error),
}

impl ImageError {
    pub fn exit_code(&self) -> i32 {
        match self {
            ImageError::InvalidReferenceFormat(_) => 65,
            ImageError::RegistryStatus { .. }
            | ImageError::MissingDigestHeader
            | ImageError::ManifestBody(_) => 76,
            ImageError::Network(_) | ImageError::Storage(_) => 74,
        }
    }
}

/// Errors while resolving or driving a build runtime
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// no runtime registered under the requested name
    #[error("no runtime registered under the name {0:?}")]
    UnknownRuntime(String),

    /// runtime executable missing or not executable
    #[error("runtime unavailable: {0}")]
    Unavailable(String),

    /// the spec declares a schema version this runtime does not support
    #[error("unsupported value {0:?} for label \"org.pkgbox.schema.version\"")]
    UnsupportedSchema(String),

    /// required package labels missing or empty
    #[error("missing or empty required labels: {}", .0.join(", "))]
    InvalidSpec(Vec<String>),

    /// an instruction failed during the build
    #[error("instruction {context:?} ({digest}) failed: {detail}")]
    Execution {
        context: String,
        digest: String,
        detail: String,
    },

    /// another build of the identical spec is already in flight
    #[error("a build for instructions digest {0} is already in progress")]
    BuildBusy(String),

    /// scratch or cache io error
    #[error("runtime io error: {0}")]
    Io(#[from] std::io::Error),

    /// malformed cache record or runtime config json
    #[error("malformed runtime state: {0}")]
    CacheRecord(#[from] serde_json::Error),
}

impl RuntimeError {
    pub fn exit_code(&self) -> i32 {
        match self {
            RuntimeError::UnknownRuntime(_) => 78,
            RuntimeError::Unavailable(_) => 69,
            RuntimeError::UnsupportedSchema(_) | RuntimeError::InvalidSpec(_) => 65,
            RuntimeError::Execution { .. } | RuntimeError::CacheRecord(_) => 70,
            RuntimeError::BuildBusy(_) => 75,
            RuntimeError::Io(_) => 74,
        }
    }
}

/// Top-level error used by the command line interface
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// io error outside any specific subsystem
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Exit status to use when this error terminates the process
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Spec(e) => e.exit_code(),
            Error::Image(e) => e.exit_code(),
            Error::Runtime(e) => e.exit_code(),
            Error::Io(_) => 74,
        }
    }
}
