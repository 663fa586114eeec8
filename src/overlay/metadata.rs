use crate::overlay::convert::{path_to_information, synthetic_root};
use crate::overlay::path_resolver::{file_name, is_root, validate_virtual_path};
use crate::overlay::status::{FsError, FsResult};
use crate::overlay::types::FileInformation;
use crate::overlay::OverlayFs;

impl OverlayFs {
    /// Metadata of `virtual_path` as seen through the union.
    ///
    /// The root gets a synthetic directory record; anything else reports the
    /// winning layer's attributes, times and size.
    pub fn get_metadata(&self, virtual_path: &str) -> FsResult<FileInformation> {
        validate_virtual_path(virtual_path)?;
        tracing::debug!("get_metadata({:?})", virtual_path);

        if is_root(virtual_path) {
            return Ok(synthetic_root());
        }

        let (physical, layer, _kind) = self.resolver.winning_path(virtual_path)?;
        tracing::trace!(
            "get_metadata: {:?} answered by {} layer",
            virtual_path,
            layer.name()
        );

        path_to_information(&physical, file_name(virtual_path))
            .map_err(|e| FsError::from_io_at(&e, &physical))
    }
}
