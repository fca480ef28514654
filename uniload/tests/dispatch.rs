use unicore::{features::FeatureSet, manifest::ExportManifest, signature::Signature};
use uniload::{
    error::LoadError,
    resolver::bind,
    tests_utils::MemoryImage,
};

fn sig(text: &str) -> Signature {
    text.parse().expect("signature should parse")
}

fn fs(text: &str) -> FeatureSet {
    text.parse().expect("feature set should parse")
}

fn add_manifest() -> ExportManifest {
    let mut manifest = ExportManifest::new();
    manifest
        .add_variant("add", sig("i64(i64, i64)"), "add_i64", FeatureSet::empty(), None)
        .unwrap();
    manifest
        .add_variant("add", sig("i64(i64, i64)"), "add_i64_avx2", fs("avx2"), None)
        .unwrap();
    manifest.finalize(b"ir".to_vec(), None).unwrap();
    manifest
}

fn add_image() -> MemoryImage {
    MemoryImage::with_symbols([("add_i64", 0x1000usize), ("add_i64_avx2", 0x2000usize)])
}

#[test]
fn capable_host_gets_the_feature_variant() {
    let manifest = add_manifest();
    let image = add_image();

    let table = bind(&manifest, &image, &fs("avx2,avx512f")).expect("bind should succeed");
    let export = table.get("add", &sig("i64(i64, i64)")).expect("export bound");

    assert_eq!(export.binding.symbol(), "add_i64_avx2");
    assert_eq!(export.binding.address(), 0x2000);
    assert_eq!(export.required_features, fs("avx2"));
}

#[test]
fn bare_host_falls_back_to_the_baseline() {
    let manifest = add_manifest();
    let image = add_image();

    let table = bind(&manifest, &image, &FeatureSet::empty()).expect("bind should succeed");
    let export = table.get("add", &sig("i64(i64, i64)")).expect("export bound");

    assert_eq!(export.binding.symbol(), "add_i64");
    assert_eq!(export.binding.address(), 0x1000);
    assert!(export.required_features.is_empty());
}

#[test]
fn missing_promised_symbol_is_fatal() {
    let manifest = add_manifest();
    let image = MemoryImage::with_symbols([("add_i64", 0x1000usize)]);

    let err = bind(&manifest, &image, &fs("avx2")).unwrap_err();
    match err {
        LoadError::MissingSymbol { symbol, name } => {
            assert_eq!(symbol, "add_i64_avx2");
            assert_eq!(name, "add");
        }
        other => panic!("expected MissingSymbol, got {other}"),
    }
}

#[test]
fn every_export_of_the_manifest_is_bound() {
    let mut manifest = ExportManifest::new();
    manifest
        .add_variant("add", sig("i64(i64, i64)"), "add_i64", FeatureSet::empty(), None)
        .unwrap();
    manifest
        .add_variant("add", sig("i64(i64, i64)"), "add_i64_avx2", fs("avx2"), None)
        .unwrap();
    manifest
        .add_variant("scale", sig("void(ptr, f64)"), "scale_f64", FeatureSet::empty(), None)
        .unwrap();
    manifest.finalize(b"ir".to_vec(), None).unwrap();

    let mut image = add_image();
    image.insert("scale_f64", 0x3000);

    let table = bind(&manifest, &image, &fs("avx2")).expect("bind should succeed");
    assert_eq!(table.len(), 2);
    assert!(table.get("scale", &sig("void(ptr, f64)")).is_some());
    assert_eq!(table.host_features(), &fs("avx2"));
}

#[test]
fn resolved_bindings_are_callable_through_their_typed_form() {
    unsafe extern "C" fn add(a: i64, b: i64) -> i64 {
        a.wrapping_add(b)
    }

    let mut manifest = ExportManifest::new();
    manifest
        .add_variant("add", sig("i64(i64, i64)"), "add_i64", FeatureSet::empty(), None)
        .unwrap();
    manifest.finalize(Vec::new(), None).unwrap();

    let image = MemoryImage::with_symbols([("add_i64", add as usize)]);
    let table = bind(&manifest, &image, &FeatureSet::empty()).unwrap();
    let export = table.get("add", &sig("i64(i64, i64)")).unwrap();

    let f = export
        .binding
        .typed::<unsafe extern "C" fn(i64, i64) -> i64>()
        .expect("typed form should match the manifest signature");
    assert_eq!(unsafe { f(20, 22) }, 42);

    let err = export
        .binding
        .typed::<unsafe extern "C" fn(f64, f64) -> f64>()
        .unwrap_err();
    assert!(matches!(err, LoadError::SignatureMismatch { .. }));
}
