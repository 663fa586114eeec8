use fuser::FUSE_ROOT_ID;
use fxhash::FxHashMap;
use parking_lot::{Mutex, RwLock};

use crate::overlay::path_resolver::SEPARATOR;

/// Bidirectional inode number ↔ virtual path map.
///
/// Inode numbers are handed out on first sight of a path and stay stable for
/// the life of the mount; the kernel's lookup counts are not tracked, so
/// `forget` never invalidates a number.
#[derive(Debug, Default)]
pub(crate) struct InodeTable {
    paths: FxHashMap<u64, String>,
    inodes: FxHashMap<String, u64>,
}

impl InodeTable {
    fn insert(&mut self, ino: u64, path: String) {
        self.inodes.insert(path.clone(), ino);
        self.paths.insert(ino, path);
    }

    /// Re-key `old` and everything below it to `new`.
    fn rename(&mut self, old: &str, new: &str) {
        let old_prefix = format!("{}{}", old.trim_end_matches(SEPARATOR), SEPARATOR);

        let moved: Vec<(String, u64)> = self
            .inodes
            .iter()
            .filter(|(path, _)| path.as_str() == old || path.starts_with(&old_prefix))
            .map(|(path, &ino)| (path.clone(), ino))
            .collect();

        for (path, ino) in moved {
            self.inodes.remove(&path);
            let renamed = format!("{}{}", new, &path[old.len()..]);
            self.insert(ino, renamed);
        }
    }
}

/// Thread-safe owner of the inode table and the inode counter.
#[derive(Debug)]
pub(crate) struct InodeManager {
    table: RwLock<InodeTable>,
    /// Next inode number to allocate
    next_ino: Mutex<u64>,
}

impl InodeManager {
    pub fn new() -> Self {
        let mut table = InodeTable::default();
        table.insert(FUSE_ROOT_ID, SEPARATOR.to_string());

        InodeManager {
            table: RwLock::new(table),
            // Start at 2 because FUSE reserves inode 1 (FUSE_ROOT_ID) for the root directory
            next_ino: Mutex::new(FUSE_ROOT_ID + 1),
        }
    }

    /// Virtual path for `ino`, if the kernel was ever told about it.
    pub fn path(&self, ino: u64) -> Option<String> {
        self.table.read().paths.get(&ino).cloned()
    }

    /// Inode number for `path`, allocating one on first sight.
    pub fn get_or_insert(&self, path: &str) -> u64 {
        if let Some(&ino) = self.table.read().inodes.get(path) {
            return ino;
        }

        let mut table = self.table.write();
        // Another thread may have raced us between the read and write lock.
        if let Some(&ino) = table.inodes.get(path) {
            return ino;
        }

        let ino = self.alloc_inode();
        table.insert(ino, path.to_string());
        ino
    }

    pub fn rename(&self, old: &str, new: &str) {
        self.table.write().rename(old, new);
    }

    fn alloc_inode(&self) -> u64 {
        let mut next = self.next_ino.lock();
        let ino = *next;
        *next = next.wrapping_add(1);
        ino
    }
}
