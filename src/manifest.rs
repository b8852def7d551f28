//! Registry manifest wire format and its parsed form

use crate::{errors::ImageError, image::Descriptor};
use serde::Deserialize;

/// Partial implementation of the image manifest v2 schema1 spec.
///
/// Reference: https://distribution.github.io/distribution/spec/manifest-v2-1/
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ManifestBody {
    pub name: String,
    pub tag: String,
    pub architecture: String,
    #[serde(rename = "fsLayers")]
    pub fs_layers: Vec<LayerRef>,
    #[serde(default)]
    pub history: Vec<serde_json::Value>,
    #[serde(default)]
    pub signatures: Vec<serde_json::Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct LayerRef {
    #[serde(rename = "blobSum")]
    pub blob_sum: String,
}

/// Parsed registry manifest for one image
///
/// Created fresh per registry query and never persisted. The digest is the
/// manifest's own content digest, delivered out of band via the
/// `docker-content-digest` response header.
#[derive(Clone, Debug)]
pub struct Manifest {
    pub schema_version: u32,
    pub name: String,
    pub tag: String,
    pub architecture: String,
    pub layers: Vec<Descriptor>,
    pub history: Vec<serde_json::Value>,
    pub signatures: Vec<serde_json::Value>,
    pub digest: Descriptor,
}

pub(crate) const SCHEMA_VERSION: u32 = 1;

impl Manifest {
    pub(crate) fn from_body(body: ManifestBody, digest: Descriptor) -> Result<Self, ImageError> {
        let mut layers = Vec::with_capacity(body.fs_layers.len());
        for layer in &body.fs_layers {
            layers.push(Descriptor::parse(&layer.blob_sum)?);
        }
        Ok(Manifest {
            schema_version: SCHEMA_VERSION,
            name: body.name,
            tag: body.tag,
            architecture: body.architecture,
            layers,
            history: body.history,
            signatures: body.signatures,
            digest,
        })
    }
}
