use unicore::{
    artifact::Artifact,
    container::{ArtifactContainer, ArtifactPayload},
    error::UniError,
    features::FeatureSet,
    manifest::ExportManifest,
    signature::Signature,
};

fn sig(text: &str) -> Signature {
    text.parse().expect("signature should parse")
}

fn fs(text: &str) -> FeatureSet {
    text.parse().expect("feature set should parse")
}

fn sample_manifest() -> ExportManifest {
    let mut manifest = ExportManifest::new();
    manifest
        .add_variant(
            "add",
            sig("i64(i64, i64)"),
            "add_i64",
            FeatureSet::empty(),
            Some("kernels/add.c".to_string()),
        )
        .unwrap();
    manifest
        .add_variant("add", sig("i64(i64, i64)"), "add_i64_avx2", fs("avx2"), None)
        .unwrap();
    manifest
        .add_variant("scale", sig("void(ptr, f64)"), "scale_f64", FeatureSet::empty(), None)
        .unwrap();
    manifest
        .finalize(b"portable-ir-bytes".to_vec(), None)
        .unwrap();
    manifest
}

#[test]
fn packaging_then_parsing_reproduces_the_manifest() {
    let manifest = sample_manifest();
    let identity = manifest.identity();
    let artifact = Artifact::new(manifest, b"native image".to_vec()).unwrap();

    let bytes = artifact.encode().expect("artifact should encode");
    let decoded = Artifact::decode(&bytes).expect("artifact should decode");

    assert_eq!(decoded.manifest().identity(), identity);
    assert_eq!(decoded.manifest().exports(), artifact.manifest().exports());
    assert_eq!(decoded.manifest().ir_payload(), b"portable-ir-bytes");
    assert!(!decoded.manifest().is_specialized());
    assert!(decoded.manifest().is_frozen(), "decoded manifests are frozen");
    assert_eq!(decoded.image(), b"native image");
    assert_eq!(decoded, artifact);
}

#[test]
fn variant_insertion_order_survives_the_round_trip() {
    let mut manifest = ExportManifest::new();
    // Two single-flag variants: the tie-break depends on this order.
    manifest
        .add_variant("dot", sig("f64(ptr, ptr, i64)"), "dot_fma", fs("fma"), None)
        .unwrap();
    manifest
        .add_variant("dot", sig("f64(ptr, ptr, i64)"), "dot_avx", fs("avx"), None)
        .unwrap();
    manifest
        .add_variant("dot", sig("f64(ptr, ptr, i64)"), "dot", FeatureSet::empty(), None)
        .unwrap();
    manifest.finalize(Vec::new(), None).unwrap();

    let artifact = Artifact::new(manifest, Vec::new()).unwrap();
    let decoded = Artifact::decode(&artifact.encode().unwrap()).unwrap();

    let group = decoded
        .manifest()
        .group("dot", &sig("f64(ptr, ptr, i64)"))
        .expect("group should survive");
    let symbols: Vec<_> = group.variants().iter().map(|v| v.symbol.as_str()).collect();
    assert_eq!(symbols, ["dot_fma", "dot_avx", "dot"]);
}

#[test]
fn bad_magic_is_rejected() {
    let payload = ArtifactPayload {
        manifest: sample_manifest(),
        image: Vec::new(),
    };
    let bytes = payload.encode().unwrap();

    let mut container: ArtifactContainer = serde_cbor::from_slice(&bytes).unwrap();
    container.magic = *b"NOTULIB\0";
    let tampered = serde_cbor::to_vec(&container).unwrap();

    assert!(matches!(
        ArtifactPayload::decode(&tampered),
        Err(UniError::BadMagic)
    ));
}

#[test]
fn incompatible_version_is_rejected() {
    let payload = ArtifactPayload {
        manifest: sample_manifest(),
        image: Vec::new(),
    };
    let bytes = payload.encode().unwrap();

    let mut container: ArtifactContainer = serde_cbor::from_slice(&bytes).unwrap();
    container.version_req = "=99.0.0".parse().unwrap();
    let tampered = serde_cbor::to_vec(&container).unwrap();

    assert!(matches!(
        ArtifactPayload::decode(&tampered),
        Err(UniError::IncompatibleVersion { .. })
    ));
}

#[test]
fn truncated_containers_fail_to_decode() {
    let artifact = Artifact::new(sample_manifest(), b"image".to_vec()).unwrap();
    let bytes = artifact.encode().unwrap();
    assert!(matches!(
        Artifact::decode(&bytes[..bytes.len() / 2]),
        Err(UniError::Decode { .. })
    ));
}

#[test]
fn packaging_an_unfinalized_manifest_is_rejected() {
    let manifest = ExportManifest::new();
    assert!(matches!(
        Artifact::new(manifest, Vec::new()),
        Err(UniError::UnfinalizedManifest)
    ));
}
