use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use unionmount::overlay::security::InMemorySecurityStore;
use unionmount::overlay::volume::VolumeInfo;
use unionmount::{OverlayFs, PathResolver};

/// Get the path to the unionmount binary for testing.
#[allow(dead_code)]
pub fn get_unionmount_path() -> PathBuf {
    assert_cmd::cargo::cargo_bin!("unionmount").to_path_buf()
}

/// Two empty layer directories inside one temp dir, plus the union over them.
/// Used by several test files - #[allow(dead_code)] because not all tests use all fields.
#[allow(dead_code)]
pub struct UnionFixture {
    pub temp_dir: TempDir,
    pub overlay: PathBuf,
    pub base: PathBuf,
    pub fs: OverlayFs,
}

#[allow(dead_code)]
impl UnionFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let overlay = temp_dir.path().join("overlay");
        let base = temp_dir.path().join("base");
        fs::create_dir(&overlay).expect("Failed to create overlay layer");
        fs::create_dir(&base).expect("Failed to create base layer");

        let fs = OverlayFs::new(
            PathResolver::new(overlay.clone(), base.clone()),
            VolumeInfo::default(),
        )
        .with_security_store(InMemorySecurityStore::new());

        UnionFixture {
            temp_dir,
            overlay,
            base,
            fs,
        }
    }

    pub fn write_overlay(&self, rel: &str, contents: &str) -> PathBuf {
        write_file(&self.overlay, rel, contents)
    }

    pub fn write_base(&self, rel: &str, contents: &str) -> PathBuf {
        write_file(&self.base, rel, contents)
    }

    pub fn mkdir_overlay(&self, rel: &str) -> PathBuf {
        let path = self.overlay.join(rel);
        fs::create_dir_all(&path).expect("Failed to create overlay dir");
        path
    }

    pub fn mkdir_base(&self, rel: &str) -> PathBuf {
        let path = self.base.join(rel);
        fs::create_dir_all(&path).expect("Failed to create base dir");
        path
    }
}

impl Default for UnionFixture {
    fn default() -> Self {
        Self::new()
    }
}

fn write_file(root: &Path, rel: &str, contents: &str) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    fs::write(&path, contents).expect("Failed to write file");
    path
}
