use crate::containerfile::BuildSpec;
use serde_json::{json, Value};

/// Project a parsed spec into its canonical map
///
/// The shape is fixed: `{from, labels, envs, cmd, args, build_args,
/// instructions: {digest, items: [{name, value, digest}, ...]}}`. Maps are
/// BTree-backed, so keys come out lexicographically sorted at every
/// nesting level.
pub fn as_canonical_map(spec: &BuildSpec) -> Value {
    let items: Vec<Value> = spec
        .instructions()
        .iter()
        .map(|instruction| {
            json!({
                "name": instruction.context(),
                "value": instruction.command(),
                "digest": instruction.digest().to_string(),
            })
        })
        .collect();

    json!({
        "from": spec.base_image(),
        "labels": spec.labels(),
        "envs": spec.envs(),
        "cmd": spec.cmd(),
        "args": spec.args(),
        "build_args": spec.build_args(),
        "instructions": {
            "digest": spec.instructions_digest().to_string(),
            "items": items,
        },
    })
}

/// Encode the canonical map as a byte-stable JSON string
///
/// Deterministic for identical input: sorted keys and no incidental
/// whitespace. `pretty` only changes indentation, never key order or value
/// encoding, so both forms stay content-equivalent.
pub fn as_canonical_json(spec: &BuildSpec, pretty: bool) -> String {
    let map = as_canonical_map(spec);
    if pretty {
        serde_json::to_string_pretty(&map).unwrap()
    } else {
        serde_json::to_string(&map).unwrap()
    }
}
