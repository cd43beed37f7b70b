use std::sync::Arc;

use image::GenericImageView;

/// An image whose pixels were already written into the atlas by the packer.
///
/// The atlas never reads pixels through this trait; it only needs the
/// dimensions the packer used and whether sampling must blend.
pub trait ImageSource: Send + Sync {
    /// Width and height in pixels.
    fn size(&self) -> [u32; 2];

    /// `true` if every pixel is fully opaque.
    fn is_opaque(&self) -> bool;
}

/// Identity of an image source inside the atlas.
///
/// The key is the address of the `Arc` allocation holding the source.
/// Two sources with identical pixels are still two different keys, and every
/// clone of one `Arc` (including unsized coercions such as
/// `Arc<DynamicImage>` to `Arc<dyn ImageSource>`) maps to the same key.
/// Hashing and equality only ever look at the address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceKey {
    address: usize,
}

impl SourceKey {
    pub fn of<T: ?Sized>(source: &Arc<T>) -> Self {
        Self {
            address: Arc::as_ptr(source).cast::<()>().addr(),
        }
    }

    pub fn address(&self) -> usize {
        self.address
    }
}

impl<T: ?Sized> From<&Arc<T>> for SourceKey {
    fn from(source: &Arc<T>) -> Self {
        Self::of(source)
    }
}

impl ImageSource for image::DynamicImage {
    fn size(&self) -> [u32; 2] {
        let (width, height) = self.dimensions();
        [width, height]
    }

    fn is_opaque(&self) -> bool {
        match self {
            image::DynamicImage::ImageRgba8(rgba) => rgba.is_opaque(),
            other => !other.color().has_alpha(),
        }
    }
}

impl ImageSource for image::RgbaImage {
    fn size(&self) -> [u32; 2] {
        [self.width(), self.height()]
    }

    fn is_opaque(&self) -> bool {
        self.pixels().all(|pixel| pixel.0[3] == u8::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_a_key() {
        let source = Arc::new(image::RgbaImage::new(4, 4));
        let clone = Arc::clone(&source);
        assert_eq!(SourceKey::of(&source), SourceKey::of(&clone));
    }

    #[test]
    fn unsized_coercion_keeps_the_key() {
        let source = Arc::new(image::RgbaImage::new(4, 4));
        let erased: Arc<dyn ImageSource> = source.clone();
        assert_eq!(SourceKey::of(&source), SourceKey::of(&erased));
    }

    #[test]
    fn equal_contents_are_different_keys() {
        let a = Arc::new(image::RgbaImage::new(4, 4));
        let b = Arc::new(image::RgbaImage::new(4, 4));
        assert_eq!(*a, *b);
        assert_ne!(SourceKey::of(&a), SourceKey::of(&b));
    }

    #[test]
    fn rgba_opacity_follows_alpha_samples() {
        let mut image = image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 255]));
        assert!(image.is_opaque());

        image.put_pixel(1, 1, image::Rgba([10, 20, 30, 128]));
        assert!(!image.is_opaque());
    }

    #[test]
    fn dynamic_image_without_alpha_is_opaque() {
        let rgb = image::DynamicImage::new_rgb8(3, 5);
        assert_eq!(rgb.size(), [3, 5]);
        assert!(rgb.is_opaque());

        let luma_alpha = image::DynamicImage::new_luma_a8(3, 5);
        assert!(!luma_alpha.is_opaque());
    }
}
