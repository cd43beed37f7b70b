use std::sync::Arc;

use gpu_utils::wgpu_utils::{tightly_packed_bytes_per_row, tightly_packed_len};
use log::{trace, warn};
use thiserror::Error;

/// A pixel buffer produced by the packer that can be exposed to the GPU as a
/// sampleable texture.
pub trait GraphicBuffer: Send + Sync {
    /// Width and height in pixels.
    fn size(&self) -> [u32; 2];

    fn format(&self) -> wgpu::TextureFormat;

    /// Expose the buffer as a single-layer 2D texture with `TEXTURE_BINDING` usage.
    fn bind(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> Result<BoundTexture, ExternalImageError>;
}

/// Result of [`GraphicBuffer::bind`].
///
/// `owned` decides who destroys the texture: a texture created by the
/// binding itself is destroyed when the binding is released, a texture that
/// belongs to the producer is only dereferenced.
pub struct BoundTexture {
    texture: wgpu::Texture,
    owned: bool,
}

impl BoundTexture {
    pub fn owned(texture: wgpu::Texture) -> Self {
        Self {
            texture,
            owned: true,
        }
    }

    pub fn borrowed(texture: wgpu::Texture) -> Self {
        Self {
            texture,
            owned: false,
        }
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }
}

/// Zero-copy import of a texture the producer already keeps on the GPU.
#[derive(Debug, Clone)]
pub struct TextureGraphicBuffer {
    texture: wgpu::Texture,
}

impl TextureGraphicBuffer {
    pub fn new(texture: wgpu::Texture) -> Self {
        Self { texture }
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }
}

impl GraphicBuffer for TextureGraphicBuffer {
    fn size(&self) -> [u32; 2] {
        [self.texture.width(), self.texture.height()]
    }

    fn format(&self) -> wgpu::TextureFormat {
        self.texture.format()
    }

    fn bind(&self, _: &wgpu::Device, _: &wgpu::Queue) -> Result<BoundTexture, ExternalImageError> {
        let usage = self.texture.usage();
        if !usage.contains(wgpu::TextureUsages::TEXTURE_BINDING) {
            return Err(ExternalImageError::NotSampleable { usage });
        }
        if self.texture.dimension() != wgpu::TextureDimension::D2
            || self.texture.depth_or_array_layers() != 1
        {
            return Err(ExternalImageError::UnsupportedDimension {
                dimension: self.texture.dimension(),
                layers: self.texture.depth_or_array_layers(),
            });
        }

        trace!(
            "TextureGraphicBuffer::bind: aliasing producer texture {:?}",
            self.size()
        );
        Ok(BoundTexture::borrowed(self.texture.clone()))
    }
}

/// Pixels in host memory, uploaded once when bound.
///
/// Used where the platform offers no way to share the producer's memory with
/// the GPU directly. `data` must be tightly packed rows of `format` blocks.
#[derive(Debug, Clone)]
pub struct HostGraphicBuffer {
    label: String,
    size: [u32; 2],
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
    data: Arc<[u8]>,
}

impl HostGraphicBuffer {
    pub fn new(size: [u32; 2], format: wgpu::TextureFormat, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            label: "host_graphic_buffer".to_string(),
            size,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            data: data.into(),
        }
    }

    pub fn from_rgba_image(image: &image::RgbaImage) -> Self {
        Self::new(
            [image.width(), image.height()],
            wgpu::TextureFormat::Rgba8UnormSrgb,
            image.as_raw().as_slice(),
        )
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Extra usages for the uploaded texture.
    /// `TEXTURE_BINDING` and `COPY_DST` are always added.
    pub fn with_usage(mut self, usage: wgpu::TextureUsages) -> Self {
        self.usage =
            usage | wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl GraphicBuffer for HostGraphicBuffer {
    fn size(&self) -> [u32; 2] {
        self.size
    }

    fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    fn bind(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> Result<BoundTexture, ExternalImageError> {
        let [width, height] = self.size;
        if width == 0 || height == 0 {
            return Err(ExternalImageError::Empty { size: self.size });
        }

        let limit = device.limits().max_texture_dimension_2d;
        if width > limit || height > limit {
            warn!(
                "HostGraphicBuffer::bind: {:?} exceeds max_texture_dimension_2d={limit}",
                self.size
            );
            return Err(ExternalImageError::TooLarge {
                size: self.size,
                limit,
            });
        }

        let device_features = device.features();
        let missing = self.format.required_features() - device_features;
        if !missing.is_empty() {
            warn!(
                "HostGraphicBuffer::bind: {:?} needs {missing:?} which the device lacks",
                self.format
            );
            return Err(ExternalImageError::MissingFeatures {
                format: self.format,
                missing,
            });
        }

        // Depth and stencil textures cannot be written by a queue copy.
        if self.format.is_depth_stencil_format() {
            return Err(ExternalImageError::NotCopyable {
                format: self.format,
            });
        }

        // Adapter specific format features may allow more than the guaranteed usages.
        let usage = self.usage;
        if !device_features.contains(wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES) {
            let allowed = self
                .format
                .guaranteed_format_features(device_features)
                .allowed_usages;
            if !allowed.contains(usage) {
                return Err(ExternalImageError::UnsupportedUsage {
                    format: self.format,
                    usage: usage - allowed,
                });
            }
        }

        let unsupported = || ExternalImageError::UnsupportedFormat {
            format: self.format,
        };
        let expected = tightly_packed_len(self.format, self.size).ok_or_else(unsupported)?;
        if self.data.len() != expected {
            return Err(ExternalImageError::DataSizeMismatch {
                expected,
                actual: self.data.len(),
            });
        }
        let bytes_per_row =
            tightly_packed_bytes_per_row(self.format, width).ok_or_else(unsupported)?;

        let extent = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&self.label),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.format,
            usage,
            view_formats: &[],
        });

        trace!(
            "HostGraphicBuffer::bind: uploading {} bytes into {:?} texture {:?}",
            self.data.len(),
            self.format,
            self.size
        );
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &self.data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: None,
            },
            extent,
        );

        Ok(BoundTexture::owned(texture))
    }
}

/// A graphic buffer bound as a sampleable texture.
///
/// Holds the view and sampler renderers bind when drawing atlas entries.
/// Dropping the binding destroys the texture only if the binding created it.
pub struct ExternalImage {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    owned: bool,
}

impl ExternalImage {
    pub(crate) fn new(
        device: &wgpu::Device,
        bound: BoundTexture,
        expected_size: [u32; 2],
        label: &str,
        sampler: &wgpu::SamplerDescriptor<'_>,
    ) -> Result<Self, ExternalImageError> {
        let BoundTexture { texture, owned } = bound;

        let actual = [texture.width(), texture.height()];
        if actual != expected_size {
            if owned {
                texture.destroy();
            }
            return Err(ExternalImageError::SizeMismatch {
                expected: expected_size,
                actual,
            });
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(&format!("{label}_view")),
            dimension: Some(wgpu::TextureViewDimension::D2),
            ..Default::default()
        });
        let sampler = device.create_sampler(sampler);

        Ok(Self {
            texture,
            view,
            sampler,
            owned,
        })
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    pub fn owns_texture(&self) -> bool {
        self.owned
    }
}

impl Drop for ExternalImage {
    fn drop(&mut self) {
        if self.owned {
            trace!("ExternalImage::drop: destroying owned texture");
            self.texture.destroy();
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExternalImageError {
    #[error("The graphic buffer is empty. size: {size:?}")]
    Empty { size: [u32; 2] },
    #[error("The texture cannot be sampled. usage: {usage:?}")]
    NotSampleable { usage: wgpu::TextureUsages },
    #[error("Only single-layer 2D textures can be bound. dimension: {dimension:?} layers: {layers}")]
    UnsupportedDimension {
        dimension: wgpu::TextureDimension,
        layers: u32,
    },
    #[error("The format needs device features that are not enabled. format: {format:?} missing: {missing:?}")]
    MissingFeatures {
        format: wgpu::TextureFormat,
        missing: wgpu::Features,
    },
    #[error("Textures of this format cannot be written by a copy. format: {format:?}")]
    NotCopyable { format: wgpu::TextureFormat },
    #[error("The format does not support the requested usages. format: {format:?} usage: {usage:?}")]
    UnsupportedUsage {
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    },
    #[error("The format has no fixed block copy size. format: {format:?}")]
    UnsupportedFormat { format: wgpu::TextureFormat },
    #[error("Data size({actual}byte) does not match expected size({expected}byte)")]
    DataSizeMismatch { expected: usize, actual: usize },
    #[error("The graphic buffer exceeds the device limit. size: {size:?} limit: {limit}")]
    TooLarge { size: [u32; 2], limit: u32 },
    #[error("The bound texture does not match the buffer. expected: {expected:?} actual: {actual:?}")]
    SizeMismatch {
        expected: [u32; 2],
        actual: [u32; 2],
    },
}
