use std::fmt;
use std::sync::{Arc, Weak};

use super::{AtlasGeneration, UvMapper};
use crate::source::{ImageSource, SourceKey};
use crate::texture::Texture;

/// Token a batching renderer compares to decide whether two draws that
/// sample the atlas can be merged.
///
/// Every entry of one initialized atlas yields one of exactly two values,
/// selected by whether the entry blends. Tokens from different atlases or
/// from different init cycles of the same atlas never compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MergeId {
    generation: AtlasGeneration,
    blend: bool,
}

impl MergeId {
    pub fn generation(&self) -> AtlasGeneration {
        self.generation
    }

    pub fn blend(&self) -> bool {
        self.blend
    }
}

/// The two merge tokens owned by one init cycle of the atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MergeKeys {
    blend: MergeId,
    opaque: MergeId,
}

impl MergeKeys {
    pub(crate) fn new(generation: AtlasGeneration) -> Self {
        Self {
            blend: MergeId {
                generation,
                blend: true,
            },
            opaque: MergeId {
                generation,
                blend: false,
            },
        }
    }

    pub(crate) fn select(&self, blend: bool) -> MergeId {
        if blend { self.blend } else { self.opaque }
    }
}

/// One image source placed in the atlas.
///
/// Entries are created and destroyed by [`AssetAtlas`](super::AssetAtlas)
/// only, and are borrowed from it, so an entry can never outlive the init
/// cycle that produced it.
pub struct Entry {
    key: SourceKey,
    // Keeps the allocation, and with it `key`, from being reused while the
    // entry exists. Does not keep the source itself alive.
    source: Weak<dyn ImageSource>,
    position: [u32; 2],
    texture: Texture,
    uv_mapper: UvMapper,
    blend: bool,
    merge_keys: MergeKeys,
}

impl Entry {
    pub(super) fn new(
        source: &Arc<dyn ImageSource>,
        position: [u32; 2],
        texture: Texture,
        uv_mapper: UvMapper,
        blend: bool,
        merge_keys: MergeKeys,
    ) -> Self {
        Self {
            key: SourceKey::of(source),
            source: Arc::downgrade(source),
            position,
            texture,
            uv_mapper,
            blend,
            merge_keys,
        }
    }

    pub fn key(&self) -> SourceKey {
        self.key
    }

    /// The image source, if anyone else still holds it.
    pub fn source(&self) -> Option<Arc<dyn ImageSource>> {
        self.source.upgrade()
    }

    /// Top-left corner of the entry in atlas pixels.
    pub fn position(&self) -> [u32; 2] {
        self.position
    }

    /// Handle aliasing the atlas texture, reporting the source's dimensions.
    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn uv_mapper(&self) -> &UvMapper {
        &self.uv_mapper
    }

    pub fn is_blended(&self) -> bool {
        self.blend
    }

    pub fn merge_id(&self) -> MergeId {
        self.merge_keys.select(self.blend)
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("key", &self.key)
            .field("position", &self.position)
            .field("texture", &self.texture)
            .field("uv_mapper", &self.uv_mapper)
            .field("blend", &self.blend)
            .finish()
    }
}
