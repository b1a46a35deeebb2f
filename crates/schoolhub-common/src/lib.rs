//! Centralized data-directory layout for SchoolHub
//!
//! Directory layout:
//! ```text
//! schoolhub_data/
//! ├── documents/       # One JSON file per collection (posts, messages, ...)
//! └── uploads/         # Blob store for uploaded files
//! ```

use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable that overrides the data root.
pub const ROOT_ENV: &str = "SCHOOLHUB_ROOT";

/// Data root used when `SCHOOLHUB_ROOT` is not set.
pub const DEFAULT_ROOT: &str = "schoolhub_data";

/// Document collections directory under `root`
pub fn documents_dir_in(root: &Path) -> PathBuf {
    root.join("documents")
}

/// Uploaded blobs directory under `root`
pub fn uploads_dir_in(root: &Path) -> PathBuf {
    root.join("uploads")
}

/// Ensure a single directory exists
pub fn ensure_dir(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
        info!("Created directory: {:?}", path);
    }
    Ok(())
}

/// Create the complete directory structure under `root`.
///
/// Returns the canonicalized root, or `root` itself if it cannot be
/// canonicalized.
pub fn init_structure(root: &Path) -> anyhow::Result<PathBuf> {
    ensure_dir(root)?;
    ensure_dir(&documents_dir_in(root))?;
    ensure_dir(&uploads_dir_in(root))?;

    let canonical = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    info!("SchoolHub directory structure initialized at: {:?}", canonical);

    Ok(canonical)
}
