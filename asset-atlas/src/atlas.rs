use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use fxhash::FxBuildHasher;
use log::{debug, trace, warn};
use thiserror::Error;

use crate::external_image::{ExternalImage, ExternalImageError, GraphicBuffer};
use crate::source::{ImageSource, SourceKey};
use crate::texture::{Texture, TextureId};

mod entry;
mod uv_mapper;

pub use entry::{Entry, MergeId};
pub use uv_mapper::UvMapper;

use entry::MergeKeys;

/// Configuration shared by every init cycle of an [`AssetAtlas`].
#[derive(Debug, Clone)]
pub struct AssetAtlasDescriptor {
    /// Debug label of the view and sampler created for the bound buffer.
    pub label: String,
    pub mag_filter: wgpu::FilterMode,
    pub min_filter: wgpu::FilterMode,
    /// Applied to u, v and w.
    pub address_mode: wgpu::AddressMode,
}

impl Default for AssetAtlasDescriptor {
    fn default() -> Self {
        Self {
            label: "asset_atlas".to_string(),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            address_mode: wgpu::AddressMode::ClampToEdge,
        }
    }
}

impl AssetAtlasDescriptor {
    fn sampler_descriptor(&self) -> wgpu::SamplerDescriptor<'_> {
        wgpu::SamplerDescriptor {
            label: Some(&self.label),
            address_mode_u: self.address_mode,
            address_mode_v: self.address_mode,
            address_mode_w: self.address_mode,
            mag_filter: self.mag_filter,
            min_filter: self.min_filter,
            ..Default::default()
        }
    }
}

/// Where the packer wrote one image source, in atlas pixels.
#[derive(Clone)]
pub struct Placement {
    pub source: Arc<dyn ImageSource>,
    pub x: u32,
    pub y: u32,
}

impl Placement {
    pub fn new(source: Arc<dyn ImageSource>, x: u32, y: u32) -> Self {
        Self { source, x, y }
    }

    pub fn key(&self) -> SourceKey {
        SourceKey::of(&self.source)
    }
}

impl std::fmt::Debug for Placement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Placement")
            .field("key", &self.key())
            .field("size", &self.source.size())
            .field("x", &self.x)
            .field("y", &self.y)
            .finish()
    }
}

static GENERATION: AtomicU64 = AtomicU64::new(0);

/// Identifies one init cycle of one atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtlasGeneration {
    id: u64,
}

impl AtlasGeneration {
    pub(crate) fn new() -> Self {
        let id = GENERATION.fetch_add(1, Ordering::Relaxed);
        Self { id }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// The buffer was bound. `skipped` counts placements with a zero-sized source.
    Initialized { entries: usize, skipped: usize },
    /// The atlas was already initialized and has not been touched.
    AlreadyInitialized,
}

/// Registry of images packed into one shared atlas texture.
///
/// Lifecycle: [`init`](Self::init) binds the packer's buffer and builds one
/// [`Entry`] per placed image, [`terminate`](Self::terminate) releases
/// everything and makes the atlas ready for another `init`.
///
/// Lookups take `&self` and mutations take `&mut self`; an atlas shared
/// across threads needs an outside barrier such as
/// [`SharedAssetAtlas`](crate::SharedAssetAtlas).
pub struct AssetAtlas {
    descriptor: AssetAtlasDescriptor,

    texture: Option<Texture>,
    image: Option<ExternalImage>,
    merge_keys: Option<MergeKeys>,

    entries: HashMap<SourceKey, Entry, FxBuildHasher>,
}

impl Default for AssetAtlas {
    fn default() -> Self {
        Self::new(AssetAtlasDescriptor::default())
    }
}

/// Lifecycle.
impl AssetAtlas {
    pub fn new(descriptor: AssetAtlasDescriptor) -> Self {
        Self {
            descriptor,
            texture: None,
            image: None,
            merge_keys: None,
            entries: HashMap::default(),
        }
    }

    /// Bind `buffer` and index every placement.
    ///
    /// Returns immediately with [`InitOutcome::AlreadyInitialized`] if the
    /// atlas is already initialized; call [`terminate`](Self::terminate)
    /// first to re-initialize. On error the atlas stays uninitialized.
    pub fn init(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        buffer: &dyn GraphicBuffer,
        placements: &[Placement],
    ) -> Result<InitOutcome, AssetAtlasError> {
        if self.is_initialized() {
            trace!("AssetAtlas::init: already initialized, ignoring");
            return Ok(InitOutcome::AlreadyInitialized);
        }

        let size = buffer.size();
        if size[0] == 0 || size[1] == 0 {
            warn!("AssetAtlas::init: refusing empty graphic buffer {size:?}");
            return Err(AssetAtlasError::InvalidBuffer { size });
        }

        trace!(
            "AssetAtlas::init: binding {:?} buffer {size:?} with {} placements",
            buffer.format(),
            placements.len()
        );
        let image = buffer
            .bind(device, queue)
            .and_then(|bound| {
                ExternalImage::new(
                    device,
                    bound,
                    size,
                    &self.descriptor.label,
                    &self.descriptor.sampler_descriptor(),
                )
            })
            .inspect_err(|e| warn!("AssetAtlas::init: could not bind atlas image: {e}"))?;

        let texture = Texture::new(TextureId::new(), size, buffer.format());
        let merge_keys = MergeKeys::new(AtlasGeneration::new());
        let skipped = self.create_entries(&texture, merge_keys, placements);

        self.texture = Some(texture);
        self.image = Some(image);
        self.merge_keys = Some(merge_keys);

        debug!(
            "AssetAtlas::init: atlas {size:?} ready with {} entries ({skipped} skipped)",
            self.entries.len()
        );
        Ok(InitOutcome::Initialized {
            entries: self.entries.len(),
            skipped,
        })
    }

    /// Release the bound buffer and drop every entry.
    /// Safe to call on an uninitialized atlas.
    pub fn terminate(&mut self) {
        let was_initialized = self.is_initialized();

        // Entry handles only alias the atlas texture; the binding owns it.
        self.image = None;
        self.texture = None;
        self.merge_keys = None;
        self.entries.clear();

        if was_initialized {
            debug!("AssetAtlas::terminate: atlas released");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.image.is_some()
    }

    pub fn descriptor(&self) -> &AssetAtlasDescriptor {
        &self.descriptor
    }
}

/// Atlas-level queries. All of them report zero or `None` while uninitialized.
impl AssetAtlas {
    pub fn width(&self) -> u32 {
        self.texture.as_ref().map_or(0, Texture::width)
    }

    pub fn height(&self) -> u32 {
        self.texture.as_ref().map_or(0, Texture::height)
    }

    pub fn size(&self) -> [u32; 2] {
        [self.width(), self.height()]
    }

    pub fn texture_id(&self) -> TextureId {
        self.texture.as_ref().map_or(TextureId::NONE, Texture::id)
    }

    pub fn texture(&self) -> Option<&Texture> {
        self.texture.as_ref()
    }

    pub fn external_image(&self) -> Option<&ExternalImage> {
        self.image.as_ref()
    }

    pub fn texture_view(&self) -> Option<&wgpu::TextureView> {
        self.image.as_ref().map(ExternalImage::view)
    }

    pub fn sampler(&self) -> Option<&wgpu::Sampler> {
        self.image.as_ref().map(ExternalImage::sampler)
    }

    pub fn generation(&self) -> Option<AtlasGeneration> {
        self.merge_keys.map(|keys| keys.select(false).generation())
    }
}

/// Entry lookup.
impl AssetAtlas {
    /// The entry for exactly this source, by identity.
    ///
    /// `None` means the caller has to draw the source from its own texture.
    pub fn get_entry(&self, key: impl Into<SourceKey>) -> Option<&Entry> {
        self.entries.get(&key.into())
    }

    pub fn get_entry_texture(&self, key: impl Into<SourceKey>) -> Option<&Texture> {
        self.get_entry(key).map(Entry::texture)
    }

    pub fn contains(&self, key: impl Into<SourceKey>) -> bool {
        self.entries.contains_key(&key.into())
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// helper functions
impl AssetAtlas {
    /// Fills `self.entries` and returns the number of skipped placements.
    fn create_entries(
        &mut self,
        texture: &Texture,
        merge_keys: MergeKeys,
        placements: &[Placement],
    ) -> usize {
        let atlas_size = texture.size();
        let mut skipped = 0;

        self.entries.clear();
        self.entries.reserve(placements.len());

        for placement in placements {
            let source_size = placement.source.size();
            if source_size[0] == 0 || source_size[1] == 0 {
                trace!(
                    "AssetAtlas::create_entries: skipping zero-sized source {:?}",
                    placement.key()
                );
                skipped += 1;
                continue;
            }

            let position = [placement.x, placement.y];
            let blend = !placement.source.is_opaque();
            let entry = Entry::new(
                &placement.source,
                position,
                texture.alias(source_size, blend),
                UvMapper::from_placement(position, source_size, atlas_size),
                blend,
                merge_keys,
            );

            if let Some(previous) = self.entries.insert(entry.key(), entry) {
                warn!(
                    "AssetAtlas::create_entries: source {:?} placed twice, keeping the last placement (previous at {:?})",
                    previous.key(),
                    previous.position()
                );
            }
        }

        skipped
    }
}

impl Drop for AssetAtlas {
    fn drop(&mut self) {
        self.terminate();
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssetAtlasError {
    #[error("The graphic buffer has no pixels. size: {size:?}")]
    InvalidBuffer { size: [u32; 2] },
    #[error("Failed to bind the graphic buffer as a texture: {0}")]
    Import(#[from] ExternalImageError),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::external_image::HostGraphicBuffer;
    use gpu_utils::wgpu_utils::noop_wgpu;

    fn rgba_buffer(size: [u32; 2]) -> HostGraphicBuffer {
        HostGraphicBuffer::new(
            size,
            wgpu::TextureFormat::Rgba8Unorm,
            vec![0u8; (size[0] * size[1] * 4) as usize],
        )
    }

    #[test]
    fn uninitialized_atlas_reports_zero() {
        let atlas = AssetAtlas::default();
        assert!(!atlas.is_initialized());
        assert_eq!(atlas.size(), [0, 0]);
        assert_eq!(atlas.texture_id(), TextureId::NONE);
        assert!(atlas.texture().is_none());
        assert!(atlas.texture_view().is_none());
        assert!(atlas.sampler().is_none());
        assert!(atlas.generation().is_none());
        assert!(atlas.is_empty());
    }

    #[test]
    fn terminate_without_init_is_a_noop() {
        let mut atlas = AssetAtlas::default();
        atlas.terminate();
        atlas.terminate();
        assert!(!atlas.is_initialized());
    }

    #[tokio::test]
    async fn init_binds_buffer_and_reports_outcome() {
        let gpu = noop_wgpu().await.unwrap();
        let opaque: Arc<dyn ImageSource> = Arc::new(image::DynamicImage::new_rgb8(16, 16));
        let empty: Arc<dyn ImageSource> = Arc::new(image::RgbaImage::new(0, 8));

        let mut atlas = AssetAtlas::default();
        let outcome = atlas
            .init(
                &gpu.device,
                &gpu.queue,
                &rgba_buffer([128, 64]),
                &[
                    Placement::new(opaque.clone(), 0, 0),
                    Placement::new(empty.clone(), 16, 0),
                ],
            )
            .unwrap();

        assert_eq!(
            outcome,
            InitOutcome::Initialized {
                entries: 1,
                skipped: 1,
            }
        );
        assert!(atlas.is_initialized());
        assert_eq!(atlas.size(), [128, 64]);
        assert!(!atlas.texture_id().is_none());
        assert!(atlas.texture_view().is_some());
        assert!(atlas.sampler().is_some());
        assert!(atlas.external_image().unwrap().owns_texture());
        assert_eq!(atlas.texture().unwrap().format(), wgpu::TextureFormat::Rgba8Unorm);
        assert!(!atlas.texture().unwrap().blend());
        assert!(atlas.contains(&opaque));
        assert!(!atlas.contains(&empty));
    }

    #[tokio::test]
    async fn failed_import_leaves_atlas_uninitialized() {
        let gpu = noop_wgpu().await.unwrap();
        let source: Arc<dyn ImageSource> = Arc::new(image::RgbaImage::new(4, 4));
        let truncated =
            HostGraphicBuffer::new([32, 32], wgpu::TextureFormat::Rgba8Unorm, vec![0u8; 16]);

        let mut atlas = AssetAtlas::default();
        let result = atlas.init(
            &gpu.device,
            &gpu.queue,
            &truncated,
            &[Placement::new(source.clone(), 0, 0)],
        );

        assert!(matches!(
            result,
            Err(AssetAtlasError::Import(
                ExternalImageError::DataSizeMismatch { .. }
            ))
        ));
        assert!(!atlas.is_initialized());
        assert!(atlas.get_entry(&source).is_none());
        assert_eq!(atlas.texture_id(), TextureId::NONE);
    }

    #[tokio::test]
    async fn buffer_format_the_device_cannot_create_is_rejected() {
        let gpu = noop_wgpu().await.unwrap();
        let source: Arc<dyn ImageSource> = Arc::new(image::RgbaImage::new(4, 4));
        let mut atlas = AssetAtlas::default();

        let compressed =
            HostGraphicBuffer::new([8, 8], wgpu::TextureFormat::Bc1RgbaUnorm, vec![0u8; 32]);
        let result = atlas.init(
            &gpu.device,
            &gpu.queue,
            &compressed,
            &[Placement::new(source.clone(), 0, 0)],
        );
        assert!(matches!(
            result,
            Err(AssetAtlasError::Import(
                ExternalImageError::MissingFeatures { .. }
            ))
        ));
        assert!(!atlas.is_initialized());

        let depth =
            HostGraphicBuffer::new([4, 4], wgpu::TextureFormat::Depth32Float, vec![0u8; 64]);
        let result = atlas.init(
            &gpu.device,
            &gpu.queue,
            &depth,
            &[Placement::new(source.clone(), 0, 0)],
        );
        assert!(matches!(
            result,
            Err(AssetAtlasError::Import(ExternalImageError::NotCopyable { .. }))
        ));
        assert!(!atlas.is_initialized());
        assert!(atlas.get_entry(&source).is_none());
    }

    #[tokio::test]
    async fn empty_buffer_is_rejected_before_binding() {
        let gpu = noop_wgpu().await.unwrap();
        let mut atlas = AssetAtlas::default();
        let result = atlas.init(&gpu.device, &gpu.queue, &rgba_buffer([0, 0]), &[]);

        assert_eq!(
            result,
            Err(AssetAtlasError::InvalidBuffer { size: [0, 0] })
        );
        assert!(!atlas.is_initialized());
    }

    #[tokio::test]
    async fn duplicate_placement_keeps_the_last_one() {
        let gpu = noop_wgpu().await.unwrap();
        let source: Arc<dyn ImageSource> = Arc::new(image::DynamicImage::new_rgb8(8, 8));

        let mut atlas = AssetAtlas::default();
        let outcome = atlas
            .init(
                &gpu.device,
                &gpu.queue,
                &rgba_buffer([64, 64]),
                &[
                    Placement::new(source.clone(), 0, 0),
                    Placement::new(source.clone(), 32, 16),
                ],
            )
            .unwrap();

        assert_eq!(
            outcome,
            InitOutcome::Initialized {
                entries: 1,
                skipped: 0,
            }
        );
        assert_eq!(atlas.get_entry(&source).unwrap().position(), [32, 16]);
    }

    #[test]
    fn sampler_descriptor_follows_configuration() {
        let descriptor = AssetAtlasDescriptor {
            label: "icons".to_string(),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            address_mode: wgpu::AddressMode::Repeat,
        };
        let sampler = descriptor.sampler_descriptor();

        assert_eq!(sampler.label, Some("icons"));
        assert_eq!(sampler.mag_filter, wgpu::FilterMode::Nearest);
        assert_eq!(sampler.min_filter, wgpu::FilterMode::Nearest);
        assert_eq!(sampler.address_mode_u, wgpu::AddressMode::Repeat);
        assert_eq!(sampler.address_mode_v, wgpu::AddressMode::Repeat);
    }
}
