//! Utility functions for the enom-login crate.

use aes_gcm::aead::{OsRng, rand_core::RngCore};
use anyhow::{Context, Result};
use std::path::Path;

/// Mask a credential for log output: first few characters only.
pub fn safe_format_key(key: &str) -> String {
    if key.chars().count() <= 12 {
        return "***".to_string();
    }
    let prefix: String = key.chars().take(8).collect();
    format!("{prefix}***")
}

/// Set restrictive file permissions (0600 on Unix).
pub fn set_file_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    }

    #[cfg(not(unix))]
    {
        let _ = path;
    }

    Ok(())
}

/// Overwrite a file with random bytes, then remove it.
///
/// Returns `Ok(false)` when the file did not exist.
pub fn secure_delete(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }

    if let Ok(metadata) = std::fs::metadata(path) {
        let mut random_data = vec![0u8; metadata.len() as usize];
        OsRng.fill_bytes(&mut random_data);
        let _ = std::fs::write(path, &random_data);
    }

    std::fs::remove_file(path)
        .with_context(|| format!("Failed to delete {}", path.display()))?;
    Ok(true)
}
