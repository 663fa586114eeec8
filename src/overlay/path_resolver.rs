use std::fs;
use std::path::{Path, PathBuf};

use crate::error::UnionMountError;
use crate::overlay::status::{FsError, FsResult};
use crate::overlay::types::{EntryKind, LayerType, ResolvedEntry};

/// Separator used by virtual paths.
pub const SEPARATOR: char = '/';

/// Characters that may never appear in a virtual path.
const RESERVED_CHARS: [char; 6] = ['<', '>', '"', '|', '?', '*'];

/// Maps virtual paths onto the two layer roots and decides which layer
/// holds an entry.
///
/// The roots are fixed at construction and never change afterwards, so a
/// single resolver is shared by reference across every concurrent call.
#[derive(Debug, Clone)]
pub struct PathResolver {
    /// The overlay layer directory (where writes go)
    overlay_root: PathBuf,
    /// The base layer directory (the read-mostly source)
    base_root: PathBuf,
}

impl PathResolver {
    pub fn new(overlay_root: PathBuf, base_root: PathBuf) -> Self {
        PathResolver {
            overlay_root,
            base_root,
        }
    }

    /// Build a resolver for a mount, applying the startup rules: the base
    /// root must already be a directory, the overlay root is created if
    /// absent.
    pub fn establish(overlay_root: PathBuf, base_root: PathBuf) -> crate::error::Result<Self> {
        if !base_root.is_dir() {
            return Err(UnionMountError::MissingBaseRoot(base_root));
        }

        if !overlay_root.exists() {
            tracing::info!("Creating overlay layer at {}", overlay_root.display());
            fs::create_dir_all(&overlay_root).map_err(|e| {
                UnionMountError::Config(format!(
                    "Failed to create overlay directory {}: {}",
                    overlay_root.display(),
                    e
                ))
            })?;
        } else if !overlay_root.is_dir() {
            return Err(UnionMountError::Config(format!(
                "Overlay path {} exists but is not a directory",
                overlay_root.display()
            )));
        }

        Ok(PathResolver::new(overlay_root, base_root))
    }

    pub fn layer_root(&self, layer: LayerType) -> &Path {
        match layer {
            LayerType::Overlay => &self.overlay_root,
            LayerType::Base => &self.base_root,
        }
    }

    /// Get the overlay layer path for a virtual path.
    pub fn overlay_path(&self, virtual_path: &str) -> PathBuf {
        self.layer_path(LayerType::Overlay, virtual_path)
    }

    /// Get the base layer path for a virtual path.
    pub fn base_path(&self, virtual_path: &str) -> PathBuf {
        self.layer_path(LayerType::Base, virtual_path)
    }

    pub fn layer_path(&self, layer: LayerType, virtual_path: &str) -> PathBuf {
        let relative = trim_separators(virtual_path);
        let root = self.layer_root(layer);
        if relative.is_empty() {
            root.to_path_buf()
        } else {
            root.join(relative)
        }
    }

    /// Resolve which layers hold `virtual_path`.
    ///
    /// The root never touches either layer. Anything else is probed in both
    /// layers independently; absence from both is `NotFound`.
    pub fn resolve(&self, virtual_path: &str) -> FsResult<ResolvedEntry> {
        if is_root(virtual_path) {
            return Ok(ResolvedEntry::Root);
        }

        let overlay = probe(&self.overlay_path(virtual_path));
        let base = probe(&self.base_path(virtual_path));

        tracing::trace!(
            "resolve: {:?} -> overlay={:?}, base={:?}",
            virtual_path,
            overlay,
            base
        );

        if overlay.is_none() && base.is_none() {
            return Err(self.absence(virtual_path));
        }

        Ok(ResolvedEntry::Layered { overlay, base })
    }

    /// Error for a path present in neither layer: `PathNotFound` when no
    /// layer even holds its parent directory, `NotFound` otherwise.
    pub fn absence(&self, virtual_path: &str) -> FsError {
        let parent_exists = LayerType::PRECEDENCE.into_iter().any(|layer| {
            self.layer_path(layer, virtual_path)
                .parent()
                .is_some_and(Path::is_dir)
        });

        if parent_exists {
            FsError::NotFound
        } else {
            FsError::PathNotFound
        }
    }

    /// Physical path of the layer that answers reads for `virtual_path`.
    pub fn winning_path(&self, virtual_path: &str) -> FsResult<(PathBuf, LayerType, EntryKind)> {
        let entry = self.resolve(virtual_path)?;
        match entry.winner() {
            Some((layer, kind)) => Ok((self.layer_path(layer, virtual_path), layer, kind)),
            None => Ok((
                self.overlay_root.clone(),
                LayerType::Overlay,
                EntryKind::Directory,
            )),
        }
    }
}

/// Kind of the entry at a physical path, following symlinks.
pub fn probe(path: &Path) -> Option<EntryKind> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Some(EntryKind::Directory),
        Ok(_) => Some(EntryKind::File),
        Err(_) => None,
    }
}

pub fn is_root(virtual_path: &str) -> bool {
    trim_separators(virtual_path).is_empty()
}

fn trim_separators(virtual_path: &str) -> &str {
    virtual_path.trim_start_matches(SEPARATOR)
}

/// Reject virtual paths that could escape a layer root or that carry
/// reserved characters. Mapping itself performs no normalization.
pub fn validate_virtual_path(virtual_path: &str) -> FsResult<()> {
    if virtual_path
        .chars()
        .any(|c| c.is_control() || RESERVED_CHARS.contains(&c))
    {
        return Err(FsError::InvalidName);
    }

    let has_dot_segment = trim_separators(virtual_path)
        .split(SEPARATOR)
        .any(|segment| segment == "." || segment == "..");
    if has_dot_segment {
        return Err(FsError::InvalidName);
    }

    Ok(())
}

/// Final component of a virtual path; empty for the root.
pub fn file_name(virtual_path: &str) -> &str {
    virtual_path
        .trim_end_matches(SEPARATOR)
        .rsplit(SEPARATOR)
        .next()
        .unwrap_or("")
}

/// Join a child name onto a virtual directory path.
pub fn join(parent: &str, name: &str) -> String {
    let parent = parent.trim_end_matches(SEPARATOR);
    format!("{}{}{}", parent, SEPARATOR, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn layered(temp: &Path) -> (PathResolver, PathBuf, PathBuf) {
        let overlay = temp.join("overlay");
        let base = temp.join("base");
        fs::create_dir_all(&overlay).unwrap();
        fs::create_dir_all(&base).unwrap();
        (
            PathResolver::new(overlay.clone(), base.clone()),
            overlay,
            base,
        )
    }

    #[test]
    fn test_layer_paths_strip_leading_separators() {
        let resolver = PathResolver::new(PathBuf::from("/ov"), PathBuf::from("/base"));

        assert_eq!(
            resolver.overlay_path("/docs/a.txt"),
            PathBuf::from("/ov/docs/a.txt")
        );
        assert_eq!(
            resolver.base_path("//docs/a.txt"),
            PathBuf::from("/base/docs/a.txt")
        );
        assert_eq!(resolver.overlay_path("/"), PathBuf::from("/ov"));
        assert_eq!(resolver.base_path(""), PathBuf::from("/base"));
    }

    #[test]
    fn test_resolve_precedence() {
        let temp_dir = tempdir().unwrap();
        let (resolver, overlay, base) = layered(temp_dir.path());

        fs::write(base.join("base_only.txt"), "base").unwrap();
        fs::write(overlay.join("both.txt"), "overlay").unwrap();
        fs::write(base.join("both.txt"), "base").unwrap();

        let entry = resolver.resolve("/base_only.txt").unwrap();
        assert_eq!(entry.winner(), Some((LayerType::Base, EntryKind::File)));

        let entry = resolver.resolve("/both.txt").unwrap();
        assert_eq!(entry.winner(), Some((LayerType::Overlay, EntryKind::File)));
        assert_eq!(entry.in_layer(LayerType::Base), Some(EntryKind::File));

        assert_eq!(resolver.resolve("/nonexistent.txt"), Err(FsError::NotFound));
        assert_eq!(
            resolver.resolve("/no_dir/nonexistent.txt"),
            Err(FsError::PathNotFound)
        );
    }

    #[test]
    fn test_resolve_kind_conflict_uses_overlay_kind() {
        let temp_dir = tempdir().unwrap();
        let (resolver, overlay, base) = layered(temp_dir.path());

        fs::create_dir(overlay.join("thing")).unwrap();
        fs::write(base.join("thing"), "file in base").unwrap();

        let entry = resolver.resolve("/thing").unwrap();
        assert_eq!(entry.kind(), EntryKind::Directory);
        assert_eq!(entry.in_layer(LayerType::Base), Some(EntryKind::File));
    }

    #[test]
    fn test_root_never_touches_layers() {
        let resolver = PathResolver::new(
            PathBuf::from("/definitely/not/here/overlay"),
            PathBuf::from("/definitely/not/here/base"),
        );
        assert_eq!(resolver.resolve("/"), Ok(ResolvedEntry::Root));
        assert_eq!(resolver.resolve(""), Ok(ResolvedEntry::Root));
    }

    #[test]
    fn test_establish_creates_overlay_and_requires_base() {
        let temp_dir = tempdir().unwrap();
        let overlay = temp_dir.path().join("new_overlay");
        let base = temp_dir.path().join("base");

        let err = PathResolver::establish(overlay.clone(), base.clone()).unwrap_err();
        assert!(matches!(err, UnionMountError::MissingBaseRoot(_)));
        assert!(!overlay.exists(), "overlay must not be created on refusal");

        fs::create_dir(&base).unwrap();
        PathResolver::establish(overlay.clone(), base).unwrap();
        assert!(overlay.is_dir());
    }

    #[test]
    fn test_validate_virtual_path() {
        assert!(validate_virtual_path("/docs/report.txt").is_ok());
        assert!(validate_virtual_path("/").is_ok());
        assert!(validate_virtual_path("/with space/ünïcode.md").is_ok());

        assert_eq!(validate_virtual_path("/a/../b"), Err(FsError::InvalidName));
        assert_eq!(validate_virtual_path("/./b"), Err(FsError::InvalidName));
        assert_eq!(validate_virtual_path("/bad|name"), Err(FsError::InvalidName));
        assert_eq!(validate_virtual_path("/wild*"), Err(FsError::InvalidName));
        assert_eq!(validate_virtual_path("/nul\0"), Err(FsError::InvalidName));
    }

    #[test]
    fn test_file_name_and_join() {
        assert_eq!(file_name("/docs/a.txt"), "a.txt");
        assert_eq!(file_name("/docs/"), "docs");
        assert_eq!(file_name("/"), "");
        assert_eq!(join("/", "a.txt"), "/a.txt");
        assert_eq!(join("/docs", "a.txt"), "/docs/a.txt");
    }

    proptest! {
        #[test]
        fn prop_mapping_stays_under_root(segments in proptest::collection::vec("[a-zA-Z0-9_ -]{1,12}", 0..5)) {
            let resolver = PathResolver::new(PathBuf::from("/ov"), PathBuf::from("/base"));
            let virtual_path = format!("/{}", segments.join("/"));

            prop_assert!(validate_virtual_path(&virtual_path).is_ok());
            prop_assert!(resolver.overlay_path(&virtual_path).starts_with("/ov"));
            prop_assert!(resolver.base_path(&virtual_path).starts_with("/base"));
            let overlay_path = resolver.overlay_path(&virtual_path);
            let base_path = resolver.base_path(&virtual_path);
            prop_assert_eq!(
                overlay_path.strip_prefix("/ov").unwrap(),
                base_path.strip_prefix("/base").unwrap()
            );
        }
    }
}
