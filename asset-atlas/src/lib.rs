//! Lookup from externally owned image sources to their sub-rectangles
//! inside one shared, GPU-resident atlas texture.
//!
//! The packing itself happens elsewhere: a producer writes every image into
//! a [`GraphicBuffer`] and hands over the resulting [`Placement`] list.
//! [`AssetAtlas`] binds that buffer once and answers per-frame queries
//! without allocating.

pub mod atlas;
pub mod external_image;
pub mod shared;
pub mod source;
pub mod texture;

pub use atlas::{
    AssetAtlas, AssetAtlasDescriptor, AssetAtlasError, AtlasGeneration, Entry, InitOutcome,
    MergeId, Placement, UvMapper,
};
pub use external_image::{
    BoundTexture, ExternalImage, ExternalImageError, GraphicBuffer, HostGraphicBuffer,
    TextureGraphicBuffer,
};
pub use shared::SharedAssetAtlas;
pub use source::{ImageSource, SourceKey};
pub use texture::{Texture, TextureId};

// re-exports
pub use euclid;
