// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Filesystem layout: profiles directory, examples directory, the "last
//! used profile" pointer, and the IPC socket path, all under a single
//! per-user application data root at `~/.midiflux` (§6 "Environment"), with
//! ownership/permission checks on every directory this process creates.

use crate::daemon::error::{DaemonError, Result};
use std::path::{Path, PathBuf};

/// Root of the per-user application data directory.
pub fn data_root() -> Result<PathBuf> {
    let dir = if cfg!(target_os = "macos") || cfg!(target_os = "linux") {
        dirs::home_dir()
            .ok_or_else(|| DaemonError::StatePersistence("no home directory".into()))?
            .join(".midiflux")
    } else if cfg!(target_os = "windows") {
        dirs::data_dir()
            .ok_or_else(|| DaemonError::StatePersistence("no AppData directory".into()))?
            .join("midiflux")
    } else {
        return Err(DaemonError::StatePersistence("unsupported platform".into()));
    };

    ensure_owned_secure_dir(&dir)?;
    Ok(dir)
}

pub fn profiles_dir() -> Result<PathBuf> {
    let dir = data_root()?.join("profiles");
    ensure_owned_secure_dir(&dir)?;
    Ok(dir)
}

pub fn examples_dir() -> Result<PathBuf> {
    let dir = data_root()?.join("examples");
    ensure_owned_secure_dir(&dir)?;
    Ok(dir)
}

/// Pointer file recording the name of the last profile switched to. The
/// only runtime state persisted across restarts (§6 "Persisted state").
pub fn last_profile_pointer() -> Result<PathBuf> {
    Ok(data_root()?.join("last_profile.txt"))
}

/// Atomic write: write to a `.tmp` sibling then rename, so a crash mid-write
/// never leaves a truncated pointer file behind.
pub async fn write_last_profile(name: &str) -> Result<()> {
    let path = last_profile_pointer()?;
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, name.as_bytes()).await?;
    tokio::fs::rename(&tmp, &path).await?;
    Ok(())
}

pub async fn read_last_profile() -> Result<Option<String>> {
    let path = last_profile_pointer()?;
    match tokio::fs::read_to_string(&path).await {
        Ok(s) => Ok(Some(s.trim().to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Unix-socket path for the management surface. Named pipe placeholder on
/// Windows; the transport itself only runs on the platforms `UnixListener`
/// supports (§13).
pub fn socket_path() -> Result<PathBuf> {
    if cfg!(target_os = "windows") {
        return Ok(PathBuf::from(r"\\.\pipe\midifluxd"));
    }
    let dir = runtime_dir()?;
    ensure_owned_secure_dir(&dir)?;
    Ok(dir.join("midifluxd.sock"))
}

fn runtime_dir() -> Result<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_RUNTIME_DIR") {
        return Ok(PathBuf::from(xdg).join("midiflux"));
    }
    Ok(data_root()?.join("run"))
}

/// Create a directory with `0700` permissions if missing, or validate an
/// existing one is owned by the current user and not group/world
/// accessible, tightening it if it is not (§13 "Unix Socket Permissions").
fn ensure_owned_secure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(dir)?.permissions();
            perms.set_mode(0o700);
            std::fs::set_permissions(dir, perms)?;
        }
        return Ok(());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        use std::os::unix::fs::PermissionsExt;

        let metadata = std::fs::metadata(dir)?;
        let current_uid = unsafe { libc::getuid() };
        if metadata.uid() != current_uid {
            return Err(DaemonError::StatePersistence(format!(
                "{dir:?} is owned by a different user (uid {}); refusing to use it",
                metadata.uid()
            )));
        }
        let mode = metadata.mode();
        if mode & 0o077 != 0 {
            let mut perms = metadata.permissions();
            perms.set_mode(0o700);
            std::fs::set_permissions(dir, perms)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_profile_pointer_lives_under_data_root() {
        if let (Ok(root), Ok(pointer)) = (data_root(), last_profile_pointer()) {
            assert_eq!(pointer.parent(), Some(root.as_path()));
        }
    }
}
