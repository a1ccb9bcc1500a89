//! # idv-cli — Command Line Interface for Identity Verification
//!
//! Provides the `idv` binary.
//!
//! ## Subcommands
//!
//! - `idv verify` — Run a verification from image files.
//! - `idv config` — Print the resolved configuration with secrets redacted.
//!
//! ```bash
//! IDV_BASE_URL=https://idv.example.com/v1/verifications \
//! IDV_API_TOKEN=... \
//!   idv verify --front passport.jpg --selfie me.jpg --json
//! ```
//!
//! ## Exit Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Verification succeeded |
//! | 1 | Verification failed, was cancelled, or the command errored |
//! | 2 | Verification failed; repeating a capture may succeed |

pub mod config;
pub mod verify;

use std::path::Path;

use anyhow::{bail, Context, Result};

/// Read an image file. Empty files are rejected.
pub fn load_image(path: &Path) -> Result<Vec<u8>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read image: {}", path.display()))?;
    if bytes.is_empty() {
        bail!("image file is empty: {}", path.display());
    }
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "loaded image");
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_image_reads_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("front.jpg");
        std::fs::write(&path, [0xFFu8, 0xD8, 0xFF]).unwrap();
        assert_eq!(load_image(&path).unwrap(), vec![0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn load_image_rejects_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.jpg");
        std::fs::write(&path, b"").unwrap();
        let err = load_image(&path).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn load_image_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_image(&dir.path().join("missing.jpg")).unwrap_err();
        assert!(err.to_string().contains("failed to read image"));
    }
}
