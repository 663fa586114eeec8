use fxhash::FxHashMap;
use std::fs;
use std::path::Path;

use crate::overlay::convert::metadata_to_information;
use crate::overlay::path_resolver::{is_root, validate_virtual_path};
use crate::overlay::status::{FsError, FsResult};
use crate::overlay::types::{FileInformation, LayerType};
use crate::overlay::OverlayFs;

/// Merged children of one virtual directory.
///
/// Names are keyed case-insensitively; the first layer to report a name owns
/// its record. Built fresh for every enumeration.
#[derive(Debug, Default, Clone)]
pub struct DirectoryListing {
    entries: Vec<FileInformation>,
    index: FxHashMap<String, usize>,
}

impl DirectoryListing {
    pub fn new() -> Self {
        DirectoryListing::default()
    }

    /// Insert `info` unless a case-insensitively equal name is present.
    /// Returns whether the record was inserted.
    pub fn insert_if_absent(&mut self, info: FileInformation) -> bool {
        let key = info.file_name.to_lowercase();
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.entries.len());
        self.entries.push(info);
        true
    }

    pub fn get(&self, name: &str) -> Option<&FileInformation> {
        self.index
            .get(&name.to_lowercase())
            .map(|&idx| &self.entries[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileInformation> {
        self.entries.iter()
    }

    pub fn into_entries(self) -> Vec<FileInformation> {
        self.entries
    }

    fn retain(&mut self, mut keep: impl FnMut(&FileInformation) -> bool) {
        self.entries.retain(|info| keep(info));
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(idx, info)| (info.file_name.to_lowercase(), idx))
            .collect();
    }
}

/// Case-insensitive wildcard expression used by pattern-filtered
/// enumeration. Supports `*`, `?` and the DOS forms `<`, `>`, `"`.
#[derive(Debug, Clone)]
pub struct SearchPattern {
    pattern: Option<glob::Pattern>,
}

impl SearchPattern {
    pub fn new(expression: &str) -> FsResult<Self> {
        if expression.is_empty() || expression == "*" || expression == "*.*" {
            return Ok(SearchPattern { pattern: None });
        }

        let mut translated = String::with_capacity(expression.len());
        for c in expression.chars() {
            match c {
                '<' => translated.push('*'),
                '>' => translated.push('?'),
                '"' => translated.push('.'),
                '[' => translated.push_str("[[]"),
                ']' => translated.push_str("[]]"),
                other => translated.push(other),
            }
        }

        let pattern = glob::Pattern::new(&translated).map_err(|e| {
            tracing::debug!("Invalid search pattern {:?}: {}", expression, e);
            FsError::InvalidName
        })?;

        Ok(SearchPattern {
            pattern: Some(pattern),
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        const OPTIONS: glob::MatchOptions = glob::MatchOptions {
            case_sensitive: false,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };

        match &self.pattern {
            Some(pattern) => pattern.matches_with(name, OPTIONS),
            None => true,
        }
    }
}

impl OverlayFs {
    /// Merge the immediate children of `virtual_path` from both layers.
    ///
    /// The overlay is scanned first, so on a (case-insensitive) name
    /// collision the overlay record wins. Each record comes verbatim from the
    /// layer it was found in.
    pub fn list_children(&self, virtual_path: &str) -> FsResult<DirectoryListing> {
        validate_virtual_path(virtual_path)?;
        tracing::debug!("list_children({:?})", virtual_path);

        let overlay_dir = self.resolver.overlay_path(virtual_path);
        let base_dir = self.resolver.base_path(virtual_path);
        let overlay_is_dir = overlay_dir.is_dir();
        let base_is_dir = base_dir.is_dir();

        if !overlay_is_dir && !base_is_dir && !is_root(virtual_path) {
            return Err(FsError::NotFound);
        }

        let mut listing = DirectoryListing::new();
        if overlay_is_dir {
            scan_layer(&overlay_dir, LayerType::Overlay, &mut listing)?;
        }
        if base_is_dir {
            scan_layer(&base_dir, LayerType::Base, &mut listing)?;
        }

        tracing::debug!(
            "list_children: {:?} has {} merged entries",
            virtual_path,
            listing.len()
        );
        Ok(listing)
    }

    /// [`OverlayFs::list_children`] restricted to names matching `expression`.
    pub fn list_children_matching(
        &self,
        virtual_path: &str,
        expression: &str,
    ) -> FsResult<DirectoryListing> {
        let pattern = SearchPattern::new(expression)?;
        let mut listing = self.list_children(virtual_path)?;
        listing.retain(|info| pattern.matches(&info.file_name));
        Ok(listing)
    }
}

fn scan_layer(layer_dir: &Path, layer: LayerType, listing: &mut DirectoryListing) -> FsResult<()> {
    tracing::trace!(
        "scan_layer: scanning {} layer at {}",
        layer.name(),
        layer_dir.display()
    );

    let read_dir = fs::read_dir(layer_dir).map_err(|e| {
        tracing::warn!(
            "Failed to enumerate {} layer at {}: {}",
            layer.name(),
            layer_dir.display(),
            e
        );
        FsError::from_io(&e)
    })?;

    for entry in read_dir.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();

        // Follow symlinks like every other probe; a dangling link is still
        // listed using its own metadata.
        let metadata = match fs::metadata(entry.path()).or_else(|_| entry.metadata()) {
            Ok(m) => m,
            Err(_) => continue,
        };

        let inserted = listing.insert_if_absent(metadata_to_information(&metadata, &name));
        if !inserted {
            tracing::trace!("scan_layer: {:?} shadowed by overlay", name);
        }
    }

    Ok(())
}
