//! Private on-disk storage helpers.
//!
//! Everything Keyward persists lives in a per-user directory that only the
//! owning account can read:
//! - Windows: `%APPDATA%\keyward\`
//! - macOS: `~/Library/Application Support/keyward/`
//! - Linux: `~/.local/share/keyward/`
//!
//! On Unix the directory is created `0700` and files are written `0600`.
//! Other platforms rely on the per-user location's default ACLs.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::config::StorageConfig;
use crate::encryption::random_bytes;
use crate::errors::{KeywardError, KeywardResult};

/// Resolve the data directory or fail with a storage error.
pub fn data_dir(config: &StorageConfig) -> KeywardResult<PathBuf> {
    config.resolve_data_dir().ok_or_else(|| {
        KeywardError::StorageError(std::io::Error::new(
            ErrorKind::NotFound,
            "Could not determine app data directory",
        ))
    })
}

/// Create `dir` (and parents) restricted to the current user.
pub async fn create_private_dir(dir: &Path) -> KeywardResult<()> {
    fs::create_dir_all(dir).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700)).await?;
    }

    Ok(())
}

/// Write `data` to `path`, replacing it, readable only by the current user.
pub async fn write_private(path: &Path, data: &[u8]) -> KeywardResult<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;

    restrict_file(path).await
}

/// Reapply owner-only permissions, e.g. after `fs::copy`.
pub async fn restrict_file(path: &Path) -> KeywardResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }
    #[cfg(not(unix))]
    let _ = path;

    Ok(())
}

/// Read a file, mapping "not found" to `None`.
pub async fn read_optional(path: &Path) -> KeywardResult<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(KeywardError::StorageError(e)),
    }
}

/// Overwrite a file in place with random bytes of its current length, flush
/// it, then remove it. Missing files are skipped.
pub async fn overwrite_and_remove(path: &Path) -> KeywardResult<()> {
    let len = match fs::metadata(path).await {
        Ok(meta) => meta.len() as usize,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(KeywardError::StorageError(e)),
    };

    let mut noise = vec![0u8; len];
    random_bytes(&mut noise);

    let mut file = fs::OpenOptions::new().write(true).open(path).await?;
    file.write_all(&noise).await?;
    file.sync_all().await?;
    drop(file);

    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(KeywardError::StorageError(e)),
    }
}
