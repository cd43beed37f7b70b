use std::sync::atomic::{AtomicU64, Ordering};

// 0 is reserved for `TextureId::NONE`.
static TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique name of one bound GPU texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TextureId(u64);

impl TextureId {
    /// Reported while nothing is bound.
    pub const NONE: Self = Self(0);

    pub(crate) fn new() -> Self {
        Self(TEXTURE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }
}

/// Lightweight descriptor of a GPU texture.
///
/// A `Texture` never owns GPU memory. The atlas keeps one for the whole
/// atlas and one per entry; every per-entry handle carries the atlas id and
/// reports the entry's own dimensions, so dropping it leaves the shared
/// texture untouched.
#[derive(Debug, PartialEq, Eq)]
pub struct Texture {
    id: TextureId,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    blend: bool,
}

impl Texture {
    pub(crate) fn new(id: TextureId, size: [u32; 2], format: wgpu::TextureFormat) -> Self {
        Self {
            id,
            width: size[0],
            height: size[1],
            format,
            blend: false,
        }
    }

    /// A handle naming the same GPU texture with different reported dimensions.
    pub(crate) fn alias(&self, size: [u32; 2], blend: bool) -> Self {
        Self {
            id: self.id,
            width: size[0],
            height: size[1],
            format: self.format,
            blend,
        }
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> [u32; 2] {
        [self.width, self.height]
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn blend(&self) -> bool {
        self.blend
    }

    /// `true` if both handles name the same GPU texture.
    pub fn aliases(&self, other: &Texture) -> bool {
        self.id == other.id
    }
}
