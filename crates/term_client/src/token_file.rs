//! Session token kept between runs

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// `<data dir>/cellquest/token`, or `./.cellquest-token` when the platform has none
pub fn default_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("cellquest").join("token"))
        .unwrap_or_else(|| PathBuf::from(".cellquest-token"))
}

/// Stored token, if the file exists and holds something
pub fn load(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let token = text.trim();
            (!token.is_empty()).then(|| token.to_string())
        }
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to read token file {}: {}", path.display(), e);
            }
            None
        }
    }
}

pub fn save(path: &Path, token: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, format!("{}\n", token))
        .with_context(|| format!("Failed to write token file {}", path.display()))
}
