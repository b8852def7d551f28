use crate::errors::ImageError;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::{fmt, str, str::FromStr};

/// A content-addressing value in `algorithm:hex` form
///
/// Descriptors identify blobs and instruction results by the hash of their
/// content. The algorithm is currently always `sha256` for descriptors we
/// create; descriptors we parse may carry any alphanumeric algorithm name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Descriptor {
    algorithm: String,
    hex: String,
}

impl Descriptor {
    /// Parse a [prim@str] in `algorithm:hex` form as a [Descriptor]
    ///
    /// The hex portion must be at least 32 lowercase hex digits.
    pub fn parse(s: &str) -> Result<Self, ImageError> {
        lazy_static! {
            static ref RE: Regex = Regex::new(
                "^(?P<alg>[a-zA-Z][a-zA-Z0-9]*(?:[-_+.][a-zA-Z][a-zA-Z0-9]*)*):(?P<hex>[a-f0-9]{32,})$"
            )
            .unwrap();
        }
        match RE.captures(s) {
            None => Err(ImageError::InvalidReferenceFormat(s.to_owned())),
            Some(captures) => Ok(Descriptor {
                algorithm: captures.name("alg").unwrap().as_str().to_owned(),
                hex: captures.name("hex").unwrap().as_str().to_owned(),
            }),
        }
    }

    /// Create a new [Descriptor] by hashing content data with `sha256`
    pub fn from_content(content_bytes: &[u8]) -> Self {
        Descriptor {
            algorithm: "sha256".to_owned(),
            hex: format!("{:x}", Sha256::digest(content_bytes)),
        }
    }

    /// The algorithm portion, `sha256` for all descriptors we create
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// The hexadecimal portion, at least 32 lowercase hex digits
    pub fn hex(&self) -> &str {
        &self.hex
    }
}

impl FromStr for Descriptor {
    type Err = ImageError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Descriptor::parse(s)
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}
