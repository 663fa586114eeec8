use std::path::Path;

use crate::overlay::enumerate::DirectoryListing;
use crate::overlay::security::{SecurityDescriptor, SecuritySections};
use crate::overlay::status::{FsError, FsResult};
use crate::overlay::types::{
    FileAttributes, FileInformation, LayerType, OpenInfo, OpenRequest, RequestContext,
    TimeUpdate,
};
use crate::overlay::volume::{self, FreeSpace, VolumeInfo};
use crate::overlay::OverlayFs;

/// The operation catalogue a host bridge drives.
///
/// Paths are virtual (slash-delimited, root-relative); `ctx` is the
/// bridge's identity for one open → I/O → close sequence. Every method may
/// be called concurrently for different contexts.
pub trait FileSystemOperations: Send + Sync {
    fn open_or_create(
        &self,
        virtual_path: &str,
        ctx: RequestContext,
        request: OpenRequest,
    ) -> FsResult<OpenInfo>;

    fn read(
        &self,
        ctx: RequestContext,
        buffer: &mut [u8],
        offset: u64,
        paging_io: bool,
    ) -> FsResult<usize>;

    fn write(&self, ctx: RequestContext, data: &[u8], offset: u64) -> FsResult<usize>;

    fn flush(&self, ctx: RequestContext) -> FsResult<()>;

    fn cleanup(&self, ctx: RequestContext);

    fn close(&self, ctx: RequestContext);

    fn delete_file(&self, virtual_path: &str) -> FsResult<()>;

    fn delete_directory(&self, virtual_path: &str) -> FsResult<()>;

    fn list_children(&self, virtual_path: &str) -> FsResult<DirectoryListing>;

    fn list_children_matching(
        &self,
        virtual_path: &str,
        expression: &str,
    ) -> FsResult<DirectoryListing>;

    fn get_metadata(&self, virtual_path: &str) -> FsResult<FileInformation>;

    fn set_attributes(&self, virtual_path: &str, attributes: FileAttributes) -> FsResult<()>;

    fn set_times(&self, virtual_path: &str, ctx: RequestContext, times: TimeUpdate)
        -> FsResult<()>;

    fn move_file(
        &self,
        old_path: &str,
        new_path: &str,
        replace: bool,
        ctx: RequestContext,
    ) -> FsResult<()>;

    fn set_end_of_file(&self, ctx: RequestContext, length: u64) -> FsResult<()>;

    fn set_allocation_size(&self, ctx: RequestContext, length: u64) -> FsResult<()>;

    fn lock_range(&self, ctx: RequestContext, offset: u64, length: u64) -> FsResult<()>;

    fn unlock_range(&self, ctx: RequestContext, offset: u64, length: u64) -> FsResult<()>;

    fn get_free_space(&self) -> FsResult<FreeSpace>;

    fn get_volume_info(&self) -> VolumeInfo;

    fn get_security(
        &self,
        virtual_path: &str,
        sections: SecuritySections,
    ) -> FsResult<SecurityDescriptor>;

    fn set_security(
        &self,
        virtual_path: &str,
        sections: SecuritySections,
        descriptor: &SecurityDescriptor,
    ) -> FsResult<()>;

    fn mounted(&self, mount_point: &Path) -> FsResult<()>;

    fn unmounted(&self) -> FsResult<()>;

    /// Alternate data streams do not exist on either layer.
    fn find_streams(&self, _virtual_path: &str) -> FsResult<Vec<String>> {
        Err(FsError::NotImplemented)
    }
}

impl FileSystemOperations for OverlayFs {
    fn open_or_create(
        &self,
        virtual_path: &str,
        ctx: RequestContext,
        request: OpenRequest,
    ) -> FsResult<OpenInfo> {
        OverlayFs::open_or_create(self, virtual_path, ctx, request)
    }

    fn read(
        &self,
        ctx: RequestContext,
        buffer: &mut [u8],
        offset: u64,
        paging_io: bool,
    ) -> FsResult<usize> {
        OverlayFs::read(self, ctx, buffer, offset, paging_io)
    }

    fn write(&self, ctx: RequestContext, data: &[u8], offset: u64) -> FsResult<usize> {
        OverlayFs::write(self, ctx, data, offset)
    }

    fn flush(&self, ctx: RequestContext) -> FsResult<()> {
        OverlayFs::flush(self, ctx)
    }

    fn cleanup(&self, ctx: RequestContext) {
        OverlayFs::cleanup(self, ctx)
    }

    fn close(&self, ctx: RequestContext) {
        OverlayFs::close(self, ctx)
    }

    fn delete_file(&self, virtual_path: &str) -> FsResult<()> {
        OverlayFs::delete_file(self, virtual_path)
    }

    fn delete_directory(&self, virtual_path: &str) -> FsResult<()> {
        OverlayFs::delete_directory(self, virtual_path)
    }

    fn list_children(&self, virtual_path: &str) -> FsResult<DirectoryListing> {
        OverlayFs::list_children(self, virtual_path)
    }

    fn list_children_matching(
        &self,
        virtual_path: &str,
        expression: &str,
    ) -> FsResult<DirectoryListing> {
        OverlayFs::list_children_matching(self, virtual_path, expression)
    }

    fn get_metadata(&self, virtual_path: &str) -> FsResult<FileInformation> {
        OverlayFs::get_metadata(self, virtual_path)
    }

    fn set_attributes(&self, virtual_path: &str, attributes: FileAttributes) -> FsResult<()> {
        OverlayFs::set_attributes(self, virtual_path, attributes)
    }

    fn set_times(
        &self,
        virtual_path: &str,
        ctx: RequestContext,
        times: TimeUpdate,
    ) -> FsResult<()> {
        OverlayFs::set_times(self, virtual_path, ctx, times)
    }

    fn move_file(
        &self,
        old_path: &str,
        new_path: &str,
        replace: bool,
        ctx: RequestContext,
    ) -> FsResult<()> {
        OverlayFs::move_file(self, old_path, new_path, replace, ctx)
    }

    fn set_end_of_file(&self, ctx: RequestContext, length: u64) -> FsResult<()> {
        OverlayFs::set_end_of_file(self, ctx, length)
    }

    fn set_allocation_size(&self, ctx: RequestContext, length: u64) -> FsResult<()> {
        OverlayFs::set_allocation_size(self, ctx, length)
    }

    fn lock_range(&self, ctx: RequestContext, offset: u64, length: u64) -> FsResult<()> {
        OverlayFs::lock_range(self, ctx, offset, length)
    }

    fn unlock_range(&self, ctx: RequestContext, offset: u64, length: u64) -> FsResult<()> {
        OverlayFs::unlock_range(self, ctx, offset, length)
    }

    fn get_free_space(&self) -> FsResult<FreeSpace> {
        tracing::debug!("get_free_space()");
        volume::free_space(self.resolver.layer_root(LayerType::Overlay))
    }

    fn get_volume_info(&self) -> VolumeInfo {
        self.volume.clone()
    }

    fn get_security(
        &self,
        virtual_path: &str,
        sections: SecuritySections,
    ) -> FsResult<SecurityDescriptor> {
        OverlayFs::get_security(self, virtual_path, sections)
    }

    fn set_security(
        &self,
        virtual_path: &str,
        sections: SecuritySections,
        descriptor: &SecurityDescriptor,
    ) -> FsResult<()> {
        OverlayFs::set_security(self, virtual_path, sections, descriptor)
    }

    fn mounted(&self, mount_point: &Path) -> FsResult<()> {
        tracing::info!(
            "Union filesystem mounted at {} (overlay={}, base={})",
            mount_point.display(),
            self.resolver
                .layer_root(LayerType::Overlay)
                .display(),
            self.resolver
                .layer_root(LayerType::Base)
                .display()
        );
        Ok(())
    }

    fn unmounted(&self) -> FsResult<()> {
        let open = self.handles.len();
        if open > 0 {
            tracing::warn!("Union filesystem unmounted with {} open handles", open);
        } else {
            tracing::info!("Union filesystem unmounted");
        }
        Ok(())
    }
}
