//! Runtime CPU capability probing and specialization-target resolution.

use std::str::FromStr;

use log::trace;
use unicore::{error::UniError, features::FeatureSet};

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn probe() -> FeatureSet {
    let mut features = FeatureSet::empty();
    macro_rules! probe_flag {
        ($($flag:tt),+ $(,)?) => {$(
            if std::arch::is_x86_feature_detected!($flag) {
                features.insert($flag);
            }
        )+};
    }
    probe_flag!(
        "sse2", "sse3", "ssse3", "sse4.1", "sse4.2", "avx", "avx2", "fma", "bmi1", "bmi2",
        "avx512f", "avx512bw", "avx512dq", "avx512vl",
    );
    features
}

#[cfg(target_arch = "aarch64")]
fn probe() -> FeatureSet {
    let mut features = FeatureSet::empty();
    macro_rules! probe_flag {
        ($($flag:tt),+ $(,)?) => {$(
            if std::arch::is_aarch64_feature_detected!($flag) {
                features.insert($flag);
            }
        )+};
    }
    probe_flag!("neon", "dotprod", "fp16", "sve", "sve2");
    features
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
fn probe() -> FeatureSet {
    // No probing support for this architecture; everything runs baseline.
    FeatureSet::empty()
}

/// Query the executing hardware for its supported capability flags.
///
/// Deterministic for a given machine; legitimately differs between machines
/// executing the same artifact.
pub fn detect_host() -> FeatureSet {
    let features = probe();
    trace!("detected host features [{}]", features);
    features
}

/// A specialization target: the running host or an explicit feature set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TargetSpec {
    #[default]
    Host,
    Features(FeatureSet),
}

impl FromStr for TargetSpec {
    type Err = UniError;

    /// `"host"` names the running machine; any other value is parsed as an
    /// explicit comma-separated feature list.
    fn from_str(text: &str) -> Result<Self, UniError> {
        if text.trim().eq_ignore_ascii_case("host") {
            Ok(TargetSpec::Host)
        } else {
            Ok(TargetSpec::Features(text.parse()?))
        }
    }
}

/// Resolve a target spec to a concrete feature set, probing the host when
/// asked to.
pub fn resolve_target(spec: &TargetSpec) -> FeatureSet {
    match spec {
        TargetSpec::Host => detect_host(),
        TargetSpec::Features(features) => features.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_host_is_deterministic_within_a_process() {
        assert_eq!(detect_host(), detect_host());
    }

    #[test]
    fn host_spec_delegates_to_detection() {
        let spec: TargetSpec = "host".parse().unwrap();
        assert_eq!(spec, TargetSpec::Host);
        assert_eq!(resolve_target(&spec), detect_host());
    }

    #[test]
    fn explicit_spec_passes_features_through() {
        let spec: TargetSpec = "avx2,fma".parse().unwrap();
        let features = resolve_target(&spec);
        assert!(features.contains("avx2"));
        assert!(features.contains("fma"));
        assert_eq!(features.specificity(), 2);
    }

    #[test]
    fn malformed_spec_is_rejected() {
        assert!("avx2,,fma".parse::<TargetSpec>().is_err());
    }
}
