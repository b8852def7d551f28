//! Containerfile parsing and the canonical build descriptor


mod canonical;
mod instruction;
mod parser;

pub use canonical::{as_canonical_json, as_canonical_map};
pub use instruction::BuildInstruction;

use crate::{errors::SpecError, image::Descriptor};
use std::collections::BTreeMap;

/// Parsed build specification
///
/// Built once by [BuildSpec::parse] and never mutated afterwards. Singular
/// directives keep their last occurrence; labels and environment entries
/// are merged by key with later values winning. Every directive also lands
/// in `instructions`, in exact file order, which is load-bearing for the
/// aggregate digest and for execution order.
#[derive(Debug, Clone)]
pub struct BuildSpec {
    base_image: Option<String>,
    labels: BTreeMap<String, String>,
    envs: BTreeMap<String, String>,
    cmd: Option<String>,
    args: BTreeMap<String, String>,
    build_args: BTreeMap<String, String>,
    instructions: Vec<BuildInstruction>,
    instructions_digest: Descriptor,
}

impl BuildSpec {
    /// Parse raw Containerfile text into a [BuildSpec]
    pub fn parse(text: &str) -> Result<Self, SpecError> {
        let mut base_image = None;
        let mut labels = BTreeMap::new();
        let mut envs = BTreeMap::new();
        let mut cmd = None;
        let mut args = BTreeMap::new();
        let mut instructions = Vec::new();

        for directive in parser::logical_lines(text)? {
            instructions.push(BuildInstruction::new(&directive.keyword, &directive.value));

            match directive.keyword.as_str() {
                "FROM" => base_image = Some(directive.value),
                "CMD" => cmd = Some(directive.value),
                "LABEL" => {
                    for (key, value) in parser::key_value_pairs(&directive.value, directive.line)? {
                        labels.insert(key, value);
                    }
                }
                "ENV" => {
                    for (key, value) in parser::key_value_pairs(&directive.value, directive.line)? {
                        envs.insert(key, value);
                    }
                }
                "ARG" => {
                    let (name, default) = match directive.value.find('=') {
                        Some(pos) => (
                            directive.value[..pos].to_owned(),
                            directive.value[pos + 1..].to_owned(),
                        ),
                        None => (directive.value, String::new()),
                    };
                    args.insert(name, default);
                }
                // every other directive only contributes an instruction
                _ => (),
            }
        }

        let instructions_digest = aggregate_digest(&instructions);

        Ok(BuildSpec {
            base_image,
            labels,
            envs,
            cmd,
            args,
            build_args: BTreeMap::new(),
            instructions,
            instructions_digest,
        })
    }

    /// Base image named by the last FROM directive, if any
    pub fn base_image(&self) -> Option<&str> {
        self.base_image.as_deref()
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    pub fn envs(&self) -> &BTreeMap<String, String> {
        &self.envs
    }

    /// Value of the last CMD directive, if any
    pub fn cmd(&self) -> Option<&str> {
        self.cmd.as_deref()
    }

    pub fn args(&self) -> &BTreeMap<String, String> {
        &self.args
    }

    pub fn build_args(&self) -> &BTreeMap<String, String> {
        &self.build_args
    }

    /// Every directive of the file, in exact file order
    pub fn instructions(&self) -> &[BuildInstruction] {
        &self.instructions
    }

    /// Aggregate digest over all instruction digests, in order
    pub fn instructions_digest(&self) -> &Descriptor {
        &self.instructions_digest
    }
}

/// `sha256` over the concatenated hex parts of each instruction digest,
/// with no separator, in instruction order. Any change to any
/// instruction's content or position changes this value.
fn aggregate_digest(instructions: &[BuildInstruction]) -> Descriptor {
    let mut concatenated = String::with_capacity(instructions.len() * 64);
    for instruction in instructions {
        concatenated.push_str(instruction.digest().hex());
    }
    Descriptor::from_content(concatenated.as_bytes())
}
