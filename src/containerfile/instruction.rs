use crate::image::Descriptor;
use std::hash::{Hash, Hasher};

/// A single build instruction with its content digest
///
/// The context is the directive keyword (`RUN`, `FROM`, ...) and the
/// command is the directive's value. The digest is computed once at
/// construction as `sha256` of `"{context} {command}"`; the value is
/// immutable afterwards and equality is digest equality only.
#[derive(Debug, Clone)]
pub struct BuildInstruction {
    context: String,
    command: String,
    digest: Descriptor,
}

impl BuildInstruction {
    pub(crate) fn new(context: &str, command: &str) -> Self {
        let digest = Descriptor::from_content(format!("{} {}", context, command).as_bytes());
        BuildInstruction {
            context: context.to_owned(),
            command: command.to_owned(),
            digest,
        }
    }

    /// The directive keyword, like `RUN`
    pub fn context(&self) -> &str {
        &self.context
    }

    /// The directive value, like `make install`
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Digest of this instruction's content
    pub fn digest(&self) -> &Descriptor {
        &self.digest
    }
}

impl Eq for BuildInstruction {}

impl PartialEq for BuildInstruction {
    fn eq(&self, other: &Self) -> bool {
        self.digest == other.digest
    }
}

impl Hash for BuildInstruction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.digest.hash(state);
    }
}
