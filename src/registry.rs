//! Support for downloading image manifests and layers from a registry server

use crate::{
    errors::ImageError,
    image::{Descriptor, Reference},
    manifest::{Manifest, ManifestBody},
};
use reqwest::header;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Accept header value for the v1 manifest format we consume
static MANIFEST_MEDIA_TYPE: &str = "application/vnd.docker.distribution.manifest.v1+json";

/// Registry clients resolve image references into manifests and
/// materialize layer blobs on disk
///
/// One client can be used for any number of images on any number of
/// registry servers. Layer fetches are idempotent: blobs already present
/// in the destination directory are never requested again.
#[derive(Clone, Debug)]
pub struct Client {
    req: reqwest::Client,
}

impl Client {
    /// Construct a new registry client
    pub fn new() -> Result<Client, ImageError> {
        let req = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Client { req })
    }

    /// Fetch and parse the manifest for a reference
    ///
    /// Issues a GET against `{scheme}://{registry}/v2/{namespace}/manifests/{tag}`
    /// and takes the manifest's own digest from the `docker-content-digest`
    /// response header.
    pub async fn fetch_manifest(&self, reference: &Reference) -> Result<Manifest, ImageError> {
        let url = format!(
            "{}/manifests/{}",
            base_url(reference),
            reference.tag()
        );
        log::info!("{} <{}> downloading manifest...", reference, url);

        let response = self
            .req
            .get(&url)
            .header(header::ACCEPT, MANIFEST_MEDIA_TYPE)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::RegistryStatus {
                url,
                status: status.as_u16(),
            });
        }

        let digest = response
            .headers()
            .get("docker-content-digest")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Descriptor::parse(value).ok())
            .ok_or(ImageError::MissingDigestHeader)?;

        let text = response.text().await?;
        log::trace!("raw json manifest, {}", text);
        let body: ManifestBody = serde_json::from_str(&text)?;
        Manifest::from_body(body, digest)
    }

    /// Materialize every layer of a manifest into `dest`
    ///
    /// `dest` is created when missing. Each layer lands at
    /// `{dest}/{algorithm}:{hex}.tar.gz`; layers already present are
    /// skipped, so repeat calls resume only the missing ones. A failed
    /// layer aborts the call but leaves completed layers valid.
    pub async fn fetch_layers(
        &self,
        reference: &Reference,
        manifest: &Manifest,
        dest: &Path,
    ) -> Result<(), ImageError> {
        tokio::fs::create_dir_all(dest).await?;

        for layer in &manifest.layers {
            let path = dest.join(format!("{}.tar.gz", layer));
            if path.exists() {
                log::debug!("{} layer {} is already cached", reference, layer);
                continue;
            }
            self.fetch_blob(reference, layer, &path).await?;
        }
        Ok(())
    }

    async fn fetch_blob(
        &self,
        reference: &Reference,
        layer: &Descriptor,
        path: &Path,
    ) -> Result<(), ImageError> {
        let url = format!("{}/blobs/{}", base_url(reference), layer);
        log::info!("{} <{}> downloading layer...", reference, url);

        let mut response = self.req.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::RegistryStatus {
                url,
                status: status.as_u16(),
            });
        }

        // Stream chunks to a nearby temp file first; the rename is atomic,
        // so a crashed or failed download never leaves a half-written layer
        // under its final name.
        let temp = temp_path(path);
        let mut file = tokio::fs::File::create(&temp).await?;
        let result: Result<(), ImageError> = loop {
            match response.chunk().await {
                Err(err) => break Err(err.into()),
                Ok(None) => break Ok(()),
                Ok(Some(chunk)) => match file.write_all(&chunk).await {
                    Err(err) => break Err(err.into()),
                    Ok(()) => (),
                },
            }
        };
        if let Err(err) = result {
            drop(file);
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(err);
        }
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&temp, path).await?;
        Ok(())
    }
}

fn base_url(reference: &Reference) -> String {
    format!(
        "{}://{}/v2/{}",
        reference.protocol_str(),
        reference.registry(),
        reference.namespace()
    )
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}.partial", std::process::id()));
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::SCHEMA_VERSION;

    const DIGEST: &str = "sha256:718a00fe32127ad01ddab9fc4b7c968ab2679c92c6385ac6865ae6e2523275e4";

    const MANIFEST_JSON: &str = r#"{
        "schemaVersion": 1,
        "name": "fedora",
        "tag": "39",
        "architecture": "amd64",
        "fsLayers": [
            {"blobSum": "sha256:718a00fe32127ad01ddab9fc4b7c968ab2679c92c6385ac6865ae6e2523275e4"}
        ],
        "history": [{"v1Compatibility": "{}"}],
        "signatures": [{"protected": "ignored"}]
    }"#;

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new()
            .basic_scheduler()
            .enable_all()
            .build()
            .unwrap()
            .block_on(future)
    }

    fn reference_for(server: &mockito::Server) -> Reference {
        Reference::parse(&format!("{}/fedora:39", server.host_with_port())).unwrap()
    }

    #[test]
    fn fetch_manifest_maps_response() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/v2/fedora/manifests/39")
            .with_header("docker-content-digest", DIGEST)
            .with_body(MANIFEST_JSON)
            .create();

        let client = Client::new().unwrap();
        let manifest = block_on(client.fetch_manifest(&reference_for(&server))).unwrap();
        mock.assert();

        assert_eq!(manifest.schema_version, SCHEMA_VERSION);
        assert_eq!(manifest.name, "fedora");
        assert_eq!(manifest.tag, "39");
        assert_eq!(manifest.architecture, "amd64");
        assert_eq!(manifest.layers.len(), 1);
        assert_eq!(manifest.layers[0].to_string(), DIGEST);
        assert_eq!(manifest.history.len(), 1);
        assert_eq!(manifest.signatures.len(), 1);
        assert_eq!(manifest.digest.to_string(), DIGEST);
    }

    #[test]
    fn fetch_manifest_failures() {
        let mut server = mockito::Server::new();
        let client = Client::new().unwrap();
        let reference = reference_for(&server);

        let _missing = server
            .mock("GET", "/v2/fedora/manifests/39")
            .with_status(404)
            .create();
        match block_on(client.fetch_manifest(&reference)) {
            Err(ImageError::RegistryStatus { status: 404, .. }) => (),
            other => panic!("unexpected result: {:?}", other.map(|m| m.name)),
        }

        let _no_header = server
            .mock("GET", "/v2/fedora/manifests/39")
            .with_body(MANIFEST_JSON)
            .create();
        match block_on(client.fetch_manifest(&reference)) {
            Err(ImageError::MissingDigestHeader) => (),
            other => panic!("unexpected result: {:?}", other.map(|m| m.name)),
        }

        let _bad_body = server
            .mock("GET", "/v2/fedora/manifests/39")
            .with_header("docker-content-digest", DIGEST)
            .with_body("{\"name\": \"fedora\"}")
            .create();
        match block_on(client.fetch_manifest(&reference)) {
            Err(ImageError::ManifestBody(_)) => (),
            other => panic!("unexpected result: {:?}", other.map(|m| m.name)),
        }
    }

    #[test]
    fn fetch_layers_is_idempotent() {
        let mut server = mockito::Server::new();
        let blob = server
            .mock(
                "GET",
                format!("/v2/fedora/blobs/{}", DIGEST).as_str(),
            )
            .with_body("layer-bytes")
            .expect(1)
            .create();

        let client = Client::new().unwrap();
        let reference = reference_for(&server);
        let manifest = Manifest {
            schema_version: SCHEMA_VERSION,
            name: "fedora".to_owned(),
            tag: "39".to_owned(),
            architecture: "amd64".to_owned(),
            layers: vec![Descriptor::parse(DIGEST).unwrap()],
            history: vec![],
            signatures: vec![],
            digest: Descriptor::parse(DIGEST).unwrap(),
        };

        let dest = tempfile::tempdir().unwrap();
        block_on(client.fetch_layers(&reference, &manifest, dest.path())).unwrap();

        let path = dest.path().join(format!("{}.tar.gz", DIGEST));
        assert_eq!(std::fs::read(&path).unwrap(), b"layer-bytes");

        // the layer is on disk now, so no further blob requests happen
        block_on(client.fetch_layers(&reference, &manifest, dest.path())).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"layer-bytes");
        blob.assert();
    }

    #[test]
    fn fetch_layers_resumes_after_failure() {
        let other_digest =
            "sha256:a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f90";
        let mut server = mockito::Server::new();
        let good = server
            .mock("GET", format!("/v2/fedora/blobs/{}", DIGEST).as_str())
            .with_body("first-layer")
            .expect(1)
            .create();
        let broken = server
            .mock("GET", format!("/v2/fedora/blobs/{}", other_digest).as_str())
            .with_status(503)
            .create();

        let client = Client::new().unwrap();
        let reference = reference_for(&server);
        let manifest = Manifest {
            schema_version: SCHEMA_VERSION,
            name: "fedora".to_owned(),
            tag: "39".to_owned(),
            architecture: "amd64".to_owned(),
            layers: vec![
                Descriptor::parse(DIGEST).unwrap(),
                Descriptor::parse(other_digest).unwrap(),
            ],
            history: vec![],
            signatures: vec![],
            digest: Descriptor::parse(DIGEST).unwrap(),
        };

        let dest = tempfile::tempdir().unwrap();
        match block_on(client.fetch_layers(&reference, &manifest, dest.path())) {
            Err(ImageError::RegistryStatus { status: 503, .. }) => (),
            other => panic!("unexpected result: {:?}", other),
        }
        // the first layer survived the failure
        assert!(dest.path().join(format!("{}.tar.gz", DIGEST)).exists());
        assert!(!dest.path().join(format!("{}.tar.gz", other_digest)).exists());
        good.assert();
        broken.assert();

        // a repeat call skips the first layer and fetches only the missing one
        server.reset();
        let fixed = server
            .mock("GET", format!("/v2/fedora/blobs/{}", other_digest).as_str())
            .with_body("second-layer")
            .expect(1)
            .create();
        block_on(client.fetch_layers(&reference, &manifest, dest.path())).unwrap();
        assert_eq!(
            std::fs::read(dest.path().join(format!("{}.tar.gz", other_digest))).unwrap(),
            b"second-layer"
        );
        fixed.assert();
    }
}
