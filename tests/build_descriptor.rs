//! End-to-end: Containerfile text through the public API to a canonical,
//! independently verifiable build descriptor

use pkgbox::{
    containerfile::{as_canonical_json, as_canonical_map},
    BuildSpec, Descriptor,
};
use sha2::{Digest, Sha256};

const CONTAINERFILE: &str = "\
# reference build
FROM docker.io/library/alpine:3.19
LABEL org.pkgbox.schema.version=1
LABEL org.pkgbox.package.name=hello \\
      org.pkgbox.package.version=2.12 \\
      org.pkgbox.package.release=1
ENV BUILD_ROOT=/build
ARG PREFIX=/usr
RUN tar -xf hello-2.12.tar.gz
RUN cd hello-2.12 && ./configure --prefix=$PREFIX
RUN cd hello-2.12 && make && make install
CMD /usr/bin/hello
";

fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

#[test]
fn descriptor_is_reproducible_and_verifiable() {
    let spec = BuildSpec::parse(CONTAINERFILE).unwrap();

    assert_eq!(spec.base_image(), Some("docker.io/library/alpine:3.19"));
    assert_eq!(spec.cmd(), Some("/usr/bin/hello"));
    assert_eq!(spec.labels().len(), 4);
    assert_eq!(spec.args().get("PREFIX").map(String::as_str), Some("/usr"));
    assert_eq!(spec.instructions().len(), 9);

    // every per-instruction digest can be recomputed from first principles
    for instruction in spec.instructions() {
        let content = format!("{} {}", instruction.context(), instruction.command());
        let expected = Descriptor::parse(&format!("sha256:{}", sha256_hex(content.as_bytes())))
            .unwrap();
        assert_eq!(instruction.digest(), &expected);
    }

    // so can the aggregate digest over the instruction sequence
    let concatenated: String = spec
        .instructions()
        .iter()
        .map(|instruction| instruction.digest().hex().to_owned())
        .collect();
    assert_eq!(
        spec.instructions_digest().hex(),
        sha256_hex(concatenated.as_bytes())
    );

    // parsing the identical text again reproduces every digest
    let again = BuildSpec::parse(CONTAINERFILE).unwrap();
    assert_eq!(spec.instructions_digest(), again.instructions_digest());
    assert_eq!(as_canonical_json(&spec, false), as_canonical_json(&again, false));
}

#[test]
fn canonical_descriptor_shape() {
    let spec = BuildSpec::parse(CONTAINERFILE).unwrap();
    let descriptor = as_canonical_map(&spec);

    assert_eq!(descriptor["from"], "docker.io/library/alpine:3.19");
    assert_eq!(descriptor["labels"]["org.pkgbox.package.name"], "hello");
    assert_eq!(descriptor["envs"]["BUILD_ROOT"], "/build");
    assert_eq!(descriptor["cmd"], "/usr/bin/hello");

    let items = descriptor["instructions"]["items"].as_array().unwrap();
    assert_eq!(items.len(), spec.instructions().len());
    assert_eq!(items[0]["name"], "FROM");
    assert_eq!(
        descriptor["instructions"]["digest"],
        spec.instructions_digest().to_string()
    );

    // compact and pretty are renderings of the same value
    let compact: serde_json::Value =
        serde_json::from_str(&as_canonical_json(&spec, false)).unwrap();
    let pretty: serde_json::Value =
        serde_json::from_str(&as_canonical_json(&spec, true)).unwrap();
    assert_eq!(compact, pretty);
    assert_eq!(compact, descriptor);
}
