use std::fs::{self, File};
use std::os::unix::fs::PermissionsExt;

use crate::overlay::path_resolver::{is_root, probe, validate_virtual_path};
use crate::overlay::security::{SecurityDescriptor, SecuritySections};
use crate::overlay::status::{FsError, FsResult};
use crate::overlay::types::{
    EntryKind, FileAttributes, LayerType, RequestContext, ResolvedEntry, TimeUpdate,
};
use crate::overlay::OverlayFs;

impl OverlayFs {
    /// Delete a file from the overlay. Base entries are never deleted, so a
    /// file missing from the overlay is `AccessDenied`.
    pub fn delete_file(&self, virtual_path: &str) -> FsResult<()> {
        validate_virtual_path(virtual_path)?;
        tracing::debug!("delete_file({:?})", virtual_path);

        if is_root(virtual_path) {
            return Err(FsError::AccessDenied);
        }

        let physical = self.resolver.overlay_path(virtual_path);
        match probe(&physical) {
            Some(EntryKind::File) => fs::remove_file(&physical).map_err(|e| {
                tracing::warn!("delete_file: {} - {}", physical.display(), e);
                FsError::from_io(&e)
            }),
            Some(EntryKind::Directory) => Err(FsError::AccessDenied),
            None => {
                tracing::debug!(
                    "delete_file: {:?} not in overlay, refusing",
                    virtual_path
                );
                Err(FsError::AccessDenied)
            }
        }
    }

    /// Delete an empty directory from the overlay; same rules as
    /// [`OverlayFs::delete_file`].
    pub fn delete_directory(&self, virtual_path: &str) -> FsResult<()> {
        validate_virtual_path(virtual_path)?;
        tracing::debug!("delete_directory({:?})", virtual_path);

        if is_root(virtual_path) {
            return Err(FsError::AccessDenied);
        }

        let physical = self.resolver.overlay_path(virtual_path);
        match probe(&physical) {
            Some(EntryKind::Directory) => fs::remove_dir(&physical).map_err(|e| {
                tracing::warn!("delete_directory: {} - {}", physical.display(), e);
                FsError::from_io(&e)
            }),
            Some(EntryKind::File) => Err(FsError::AccessDenied),
            None => {
                tracing::debug!(
                    "delete_directory: {:?} not in overlay, refusing",
                    virtual_path
                );
                Err(FsError::AccessDenied)
            }
        }
    }

    /// Rename `old_path` to `new_path` inside the layer that holds the source.
    ///
    /// Any handle bound to `ctx` is released first. An existing destination
    /// is `FileExists` unless `replace` is set; directories are never
    /// replaced. The destination is only touched once the rename succeeded:
    /// an overlay rename replaces it directly, a base rename then drops the
    /// overlay copy that would shadow it.
    pub fn move_file(
        &self,
        old_path: &str,
        new_path: &str,
        replace: bool,
        ctx: RequestContext,
    ) -> FsResult<()> {
        tracing::debug!(
            "move_file({:?} -> {:?}, replace={}, {})",
            old_path,
            new_path,
            replace,
            ctx
        );

        self.cleanup(ctx);

        validate_virtual_path(old_path)?;
        validate_virtual_path(new_path)?;
        if is_root(old_path) || is_root(new_path) {
            return Err(FsError::AccessDenied);
        }

        let (source, source_layer, source_kind) = self.resolver.winning_path(old_path)?;

        let destination = match self.resolver.resolve(new_path) {
            Ok(entry) => Some(entry),
            Err(FsError::NotFound) => None,
            Err(e) => return Err(e),
        };

        let shadowing = match destination {
            Some(existing) => {
                if !replace {
                    return Err(FsError::FileExists);
                }
                if source_kind == EntryKind::Directory || existing.is_directory() {
                    tracing::debug!("move_file: refusing to replace with or onto a directory");
                    return Err(FsError::AccessDenied);
                }
                // An overlay copy of the destination would hide a base-layer
                // rename; an overlay-layer rename replaces it in place.
                (source_layer == LayerType::Base).then_some(existing)
            }
            None => None,
        };

        let target = self.resolver.layer_path(source_layer, new_path);
        if !target.parent().is_some_and(|parent| parent.is_dir()) {
            tracing::debug!(
                "move_file: {} has no parent directory in the {} layer",
                target.display(),
                source_layer.name()
            );
            return Err(FsError::PathNotFound);
        }

        tracing::debug!(
            "move_file: renaming {} -> {} ({} layer)",
            source.display(),
            target.display(),
            source_layer.name()
        );

        fs::rename(&source, &target).map_err(|e| {
            tracing::warn!("move_file: rename failed - {}", e);
            FsError::from_io_at(&e, &target)
        })?;

        match shadowing {
            Some(existing) => self.remove_overlay_destination(new_path, &existing),
            None => Ok(()),
        }
    }

    fn remove_overlay_destination(&self, new_path: &str, existing: &ResolvedEntry) -> FsResult<()> {
        if existing.in_layer(LayerType::Overlay).is_none() {
            return Ok(());
        }

        let physical = self.resolver.overlay_path(new_path);
        fs::remove_file(&physical).map_err(|e| {
            tracing::warn!(
                "move_file: removing destination {} failed - {}",
                physical.display(),
                e
            );
            FsError::from_io(&e)
        })
    }

    /// Apply attribute flags to the winning layer's entry.
    ///
    /// Only `READONLY` maps onto POSIX permissions; an empty set is a no-op.
    pub fn set_attributes(&self, virtual_path: &str, attributes: FileAttributes) -> FsResult<()> {
        validate_virtual_path(virtual_path)?;
        tracing::debug!("set_attributes({:?}, {:?})", virtual_path, attributes);

        if attributes.is_empty() {
            return Ok(());
        }

        let (physical, _layer, _kind) = self.resolver.winning_path(virtual_path)?;
        let metadata = fs::metadata(&physical).map_err(|e| FsError::from_io_at(&e, &physical))?;

        let mode = metadata.permissions().mode();
        let new_mode = if attributes.contains(FileAttributes::READONLY) {
            mode & !0o222
        } else {
            mode | 0o200
        };

        if new_mode == mode {
            return Ok(());
        }

        fs::set_permissions(&physical, fs::Permissions::from_mode(new_mode))
            .map_err(|e| FsError::from_io_at(&e, &physical))
    }

    /// Apply timestamps, through the descriptor bound to `ctx` when there is
    /// one, otherwise to the winning layer's entry.
    pub fn set_times(&self, virtual_path: &str, ctx: RequestContext, times: TimeUpdate) -> FsResult<()> {
        validate_virtual_path(virtual_path)?;
        tracing::debug!("set_times({:?}, {}, {:?})", virtual_path, ctx, times);

        if let Some(creation) = times.creation {
            tracing::debug!(
                "set_times: creation time {:?} for {:?} ignored, layers cannot set birth time",
                creation,
                virtual_path
            );
        }

        if times.is_empty() {
            return Ok(());
        }

        if let Some(file_arc) = self.handles.try_file(ctx) {
            let file = file_arc.lock();
            return file
                .set_times(times.to_file_times())
                .map_err(|e| FsError::from_io(&e));
        }

        let (physical, _layer, _kind) = self.resolver.winning_path(virtual_path)?;
        let file = File::open(&physical).map_err(|e| FsError::from_io_at(&e, &physical))?;
        file.set_times(times.to_file_times())
            .map_err(|e| FsError::from_io_at(&e, &physical))
    }

    /// Security descriptor of the winning layer's entry.
    pub fn get_security(
        &self,
        virtual_path: &str,
        sections: SecuritySections,
    ) -> FsResult<SecurityDescriptor> {
        validate_virtual_path(virtual_path)?;
        tracing::debug!("get_security({:?}, {:?})", virtual_path, sections);

        let (physical, _layer, _kind) = self.resolver.winning_path(virtual_path)?;
        self.security
            .read(&physical, sections)
            .map_err(|e| FsError::from_io_at(&e, &physical))
    }

    /// Store a security descriptor on every layer holding the entry.
    ///
    /// Succeeds when at least one layer accepted it; otherwise reports the
    /// first layer's failure.
    pub fn set_security(
        &self,
        virtual_path: &str,
        sections: SecuritySections,
        descriptor: &SecurityDescriptor,
    ) -> FsResult<()> {
        validate_virtual_path(virtual_path)?;
        tracing::debug!(
            "set_security({:?}, {:?}, {} bytes)",
            virtual_path,
            sections,
            descriptor.as_bytes().len()
        );

        let entry = self.resolver.resolve(virtual_path)?;

        let mut first_error = None;
        let mut applied = 0;
        for layer in entry.present_layers() {
            let physical = self.resolver.layer_path(layer, virtual_path);
            match self.security.write(&physical, sections, descriptor) {
                Ok(()) => applied += 1,
                Err(e) => {
                    tracing::warn!(
                        "set_security: {} layer rejected descriptor for {:?}: {}",
                        layer.name(),
                        virtual_path,
                        e
                    );
                    first_error.get_or_insert(FsError::from_io(&e));
                }
            }
        }

        match (applied, first_error) {
            (0, Some(e)) => Err(e),
            _ => Ok(()),
        }
    }
}
