use bitflags::bitflags;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Extended attribute holding the descriptor blob.
pub const SECURITY_XATTR: &str = "user.unionmount.security";

bitflags! {
    /// Which parts of a security descriptor a get/set call addresses.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SecuritySections: u32 {
        const OWNER = 0x0000_0001;
        const GROUP = 0x0000_0002;
        const DACL = 0x0000_0004;
        const SACL = 0x0000_0008;
    }
}

/// Opaque security descriptor. Its encoding belongs to the host bridge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityDescriptor(pub Vec<u8>);

impl SecurityDescriptor {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Storage backend for per-entry security descriptors, addressed by
/// physical path.
pub trait SecurityStore: fmt::Debug + Send + Sync {
    fn read(&self, physical_path: &Path, sections: SecuritySections)
        -> io::Result<SecurityDescriptor>;

    fn write(
        &self,
        physical_path: &Path,
        sections: SecuritySections,
        descriptor: &SecurityDescriptor,
    ) -> io::Result<()>;
}

/// Keeps descriptors in a user extended attribute next to the data.
#[derive(Debug, Default, Clone, Copy)]
pub struct XattrSecurityStore;

impl SecurityStore for XattrSecurityStore {
    fn read(
        &self,
        physical_path: &Path,
        _sections: SecuritySections,
    ) -> io::Result<SecurityDescriptor> {
        // An entry that never had a descriptor set reports an empty one.
        let bytes = xattr::get(physical_path, SECURITY_XATTR)?.unwrap_or_default();
        Ok(SecurityDescriptor(bytes))
    }

    fn write(
        &self,
        physical_path: &Path,
        _sections: SecuritySections,
        descriptor: &SecurityDescriptor,
    ) -> io::Result<()> {
        xattr::set(physical_path, SECURITY_XATTR, descriptor.as_bytes())
    }
}

/// Process-local store, for hosts without user xattr support.
#[derive(Debug, Default)]
pub struct InMemorySecurityStore {
    descriptors: Mutex<HashMap<PathBuf, SecurityDescriptor>>,
}

impl InMemorySecurityStore {
    pub fn new() -> Self {
        InMemorySecurityStore::default()
    }
}

impl SecurityStore for InMemorySecurityStore {
    fn read(
        &self,
        physical_path: &Path,
        _sections: SecuritySections,
    ) -> io::Result<SecurityDescriptor> {
        fs::metadata(physical_path)?;
        Ok(self
            .descriptors
            .lock()
            .get(physical_path)
            .cloned()
            .unwrap_or_default())
    }

    fn write(
        &self,
        physical_path: &Path,
        _sections: SecuritySections,
        descriptor: &SecurityDescriptor,
    ) -> io::Result<()> {
        fs::metadata(physical_path)?;
        self.descriptors
            .lock()
            .insert(physical_path.to_path_buf(), descriptor.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_in_memory_store_requires_entry() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("file.txt");
        let store = InMemorySecurityStore::new();
        let descriptor = SecurityDescriptor(vec![1, 2, 3]);

        assert!(store.write(&path, SecuritySections::DACL, &descriptor).is_err());

        fs::write(&path, "x").unwrap();
        assert!(store.read(&path, SecuritySections::DACL).unwrap().is_empty());
        store.write(&path, SecuritySections::DACL, &descriptor).unwrap();
        assert_eq!(store.read(&path, SecuritySections::all()).unwrap(), descriptor);
    }

    #[test]
    fn test_xattr_store() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("file.txt");
        fs::write(&path, "x").unwrap();

        let store = XattrSecurityStore;
        let descriptor = SecurityDescriptor(b"O:BAG:BAD:(A;;FA;;;WD)".to_vec());
        match store.write(&path, SecuritySections::OWNER, &descriptor) {
            Ok(()) => {}
            Err(e) if e.raw_os_error() == Some(libc::EOPNOTSUPP) => {
                eprintln!("Skipping test: user xattrs unsupported on temp filesystem");
                return;
            }
            Err(e) => panic!("xattr write failed: {}", e),
        }

        assert_eq!(store.read(&path, SecuritySections::OWNER).unwrap(), descriptor);

        let missing = temp_dir.path().join("missing.txt");
        assert!(store.read(&missing, SecuritySections::OWNER).is_err());
    }
}
