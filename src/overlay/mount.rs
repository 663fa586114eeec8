use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Result, UnionMountError};
use crate::fuse::UnionFuse;
use crate::overlay::OverlayFs;

/// A live mount. Dropping it (or calling [`MountSession::unmount`]) detaches
/// the filesystem from the mount point.
pub struct MountSession {
    session: fuser::BackgroundSession,
    mount_point: PathBuf,
}

impl MountSession {
    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    /// Unmount and wait for the session thread to finish.
    pub fn unmount(self) {
        tracing::info!("Unmounting {}", self.mount_point.display());
        self.session.join();
    }
}

impl std::fmt::Debug for MountSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountSession")
            .field("mount_point", &self.mount_point)
            .finish()
    }
}

/// Mount `fs` at `mount_point` on a background session thread.
///
/// The mount point directory is created when missing. Returns once the
/// kernel has accepted the mount and the mount point answers a directory
/// read.
pub fn mount_union(fs: Arc<OverlayFs>, mount_point: &Path, ttl_secs: u64) -> Result<MountSession> {
    fs::create_dir_all(mount_point).map_err(|e| {
        UnionMountError::Config(format!(
            "Failed to create mount directory {}: {}",
            mount_point.display(),
            e
        ))
    })?;

    let bridge = UnionFuse::new(fs, mount_point.to_path_buf(), ttl_secs);
    let mount_options = vec![
        fuser::MountOption::FSName("unionmount".to_string()),
        fuser::MountOption::AutoUnmount,
    ];

    tracing::info!("Mounting FUSE filesystem at {}", mount_point.display());

    let session = fuser::spawn_mount2(bridge, mount_point, &mount_options).map_err(|e| {
        tracing::error!("FUSE mount error: {}", e);
        UnionMountError::Fuse(format!("FUSE mount failed: {}", e))
    })?;

    let mount_timeout = std::time::Duration::from_millis(2000);
    let check_interval = std::time::Duration::from_millis(50);
    let start = std::time::Instant::now();

    while fs::read_dir(mount_point).is_err() {
        if start.elapsed() >= mount_timeout {
            return Err(UnionMountError::Fuse(
                "FUSE mount timed out - mount point not accessible after 2 seconds".to_string(),
            ));
        }
        std::thread::sleep(check_interval);
    }
    tracing::debug!("FUSE mount verified accessible");

    Ok(MountSession {
        session,
        mount_point: mount_point.to_path_buf(),
    })
}
