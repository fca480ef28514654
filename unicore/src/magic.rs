use std::path::{Path, PathBuf};

/// File extension used by packaged artifact containers.
pub const ARTIFACT_EXTENSION: &str = "ulib";

/// Stem suffix marking the specialized counterpart of an artifact.
pub const SPECIALIZED_SUFFIX: &str = "_specialized";

/// Name of the environment variable overriding the cache directory used to
/// materialize embedded native images before loading.
/// If not set, defaults to
///  (1) on Linux and macOS: `$XDG_CACHE_HOME/unilib` or `$HOME/.cache/unilib`
///  (2) on Windows: `%LOCALAPPDATA%\unilib`
pub const ENV_CACHE_PATH: &str = "UNILIB_CACHE_PATH";

/// The logical name of an artifact, derived from its container path.
pub fn logical_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Conventional location of the specialized counterpart of the artifact at
/// `path`: same directory, `<stem>_specialized.<ext>`. Deterministic, so a
/// later load can discover what an earlier specialization produced.
pub fn specialized_path(path: &Path) -> PathBuf {
    path.with_file_name(format!(
        "{}{}.{}",
        logical_name(path),
        SPECIALIZED_SUFFIX,
        ARTIFACT_EXTENSION
    ))
}
