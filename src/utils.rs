use anyhow::{Context, Result};
use std::path::Path;

/// Create a directory (and parents) if it does not exist yet.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Current time as an RFC3339 string, the format used for all timestamps.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
