use std::sync::Arc;

use gpu_utils::device_loss_recoverable::DeviceLossRecoverable;
use log::warn;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::atlas::{
    AssetAtlas, AssetAtlasDescriptor, AssetAtlasError, Entry, InitOutcome, Placement,
};
use crate::external_image::GraphicBuffer;
use crate::source::SourceKey;

/// An [`AssetAtlas`] behind a read-write lock.
///
/// Lookups from any number of threads run concurrently; `init` and
/// `terminate` wait until every outstanding lookup has finished.
pub struct SharedAssetAtlas {
    atlas: RwLock<AssetAtlas>,
}

impl SharedAssetAtlas {
    pub fn new(descriptor: AssetAtlasDescriptor) -> Arc<Self> {
        Arc::new(Self {
            atlas: RwLock::new(AssetAtlas::new(descriptor)),
        })
    }

    pub fn read(&self) -> RwLockReadGuard<'_, AssetAtlas> {
        self.atlas.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, AssetAtlas> {
        self.atlas.write()
    }

    pub fn init(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        buffer: &dyn GraphicBuffer,
        placements: &[Placement],
    ) -> Result<InitOutcome, AssetAtlasError> {
        self.atlas.write().init(device, queue, buffer, placements)
    }

    pub fn terminate(&self) {
        self.atlas.write().terminate();
    }

    /// Run `f` on the entry for `key` under a single read lock.
    pub fn with_entry<R>(
        &self,
        key: impl Into<SourceKey>,
        f: impl FnOnce(&Entry) -> R,
    ) -> Option<R> {
        self.atlas.read().get_entry(key).map(f)
    }
}

impl DeviceLossRecoverable for SharedAssetAtlas {
    // The packer's buffer lived on the lost device, so there is nothing to
    // rebind here. Drop everything and let the owner call `init` again.
    fn recover(&self, _: &wgpu::Device, _: &wgpu::Queue) {
        let mut atlas = self.atlas.write();
        if atlas.is_initialized() {
            warn!(
                "SharedAssetAtlas::recover: device lost, dropping {} entries",
                atlas.len()
            );
        }
        atlas.terminate();
    }
}
