use crate::errors::ImageError;
use regex::Regex;
use std::{fmt, str, str::FromStr};

/// Parsed image reference, like `registry.example.org/ns/name:39`
///
/// A reference always names a registry server, a namespace path within it,
/// and a tag. The registry is everything before the first `/`, and may
/// carry a port. The tag separator is the last `:` of the remainder, so a
/// port colon in the registry can never be mistaken for it. References
/// without a registry or without a tag do not parse.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    registry: String,
    namespace: String,
    tag: String,
}

impl Reference {
    /// Parse a [prim@str] as a [Reference]
    pub fn parse(s: &str) -> Result<Self, ImageError> {
        lazy_static! {
            static ref REGISTRY: Regex = Regex::new(
                "^(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9])\
                 (?:\\.(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9]))*\
                 (?::[0-9]+)?$"
            )
            .unwrap();
            static ref NAMESPACE: Regex = Regex::new(
                "^[a-z0-9]+(?:[._-][a-z0-9]+)*(?:/[a-z0-9]+(?:[._-][a-z0-9]+)*)*$"
            )
            .unwrap();
            static ref TAG: Regex = Regex::new("^[a-zA-Z0-9_][a-zA-Z0-9_.-]{0,127}$").unwrap();
        }

        let err = || ImageError::InvalidReferenceFormat(s.to_owned());

        let slash = s.find('/').ok_or_else(err)?;
        let (registry, rest) = (&s[..slash], &s[slash + 1..]);
        let colon = rest.rfind(':').ok_or_else(err)?;
        let (namespace, tag) = (&rest[..colon], &rest[colon + 1..]);

        if !REGISTRY.is_match(registry) || !NAMESPACE.is_match(namespace) || !TAG.is_match(tag) {
            return Err(err());
        }

        Ok(Reference {
            registry: registry.to_owned(),
            namespace: namespace.to_owned(),
            tag: tag.to_owned(),
        })
    }

    /// The registry host, with its port when present
    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// The namespace path within the registry
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The tag naming the image version
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The protocol to use when contacting this registry
    ///
    /// Registries are https, with the same heuristic Docker uses for the
    /// ergonomics of development setups: `localhost`, dot-less hosts, and
    /// bare IPv4 literals are contacted over unencrypted http.
    pub fn protocol_str(&self) -> &str {
        if self.is_https() {
            "https"
        } else {
            "http"
        }
    }

    fn is_https(&self) -> bool {
        let domain = match self.registry.find(':') {
            Some(pos) => &self.registry[..pos],
            None => &self.registry[..],
        };
        let numeric = domain.chars().all(|c| c.is_ascii_digit() || c == '.');
        domain != "localhost" && domain.contains('.') && !numeric
    }
}

impl FromStr for Reference {
    type Err = ImageError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Reference::parse(s)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.namespace, self.tag)
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}
