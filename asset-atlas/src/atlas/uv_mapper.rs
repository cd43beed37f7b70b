use std::fmt;

use euclid::{Box2D, Point2D, UnknownUnit};

/// Maps texture coordinates meant for a whole image into the sub-rectangle
/// that image occupies inside the atlas.
///
/// `(0, 0)` lands on the entry's top-left corner and `(1, 1)` on its
/// bottom-right corner. Rotation and mirroring are not modeled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvMapper {
    min_u: f32,
    max_u: f32,
    min_v: f32,
    max_v: f32,
}

impl Default for UvMapper {
    fn default() -> Self {
        Self::identity()
    }
}

impl UvMapper {
    pub const fn identity() -> Self {
        Self {
            min_u: 0.0,
            max_u: 1.0,
            min_v: 0.0,
            max_v: 1.0,
        }
    }

    pub const fn new(min_u: f32, max_u: f32, min_v: f32, max_v: f32) -> Self {
        Self {
            min_u,
            max_u,
            min_v,
            max_v,
        }
    }

    /// Mapper for an image of `source_size` pixels written at `position` in an
    /// atlas of `atlas_size` pixels. `atlas_size` must be non-zero.
    pub fn from_placement(position: [u32; 2], source_size: [u32; 2], atlas_size: [u32; 2]) -> Self {
        debug_assert!(atlas_size[0] > 0 && atlas_size[1] > 0);

        let atlas_width = atlas_size[0] as f32;
        let atlas_height = atlas_size[1] as f32;
        let x = position[0] as f32;
        let y = position[1] as f32;

        Self::new(
            x / atlas_width,
            (x + source_size[0] as f32) / atlas_width,
            y / atlas_height,
            (y + source_size[1] as f32) / atlas_height,
        )
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    pub fn map(&self, u: f32, v: f32) -> (f32, f32) {
        (
            lerp(self.min_u, self.max_u, u),
            lerp(self.min_v, self.max_v, v),
        )
    }

    pub fn map_point(&self, [u, v]: [f32; 2]) -> [f32; 2] {
        let (u, v) = self.map(u, v);
        [u, v]
    }

    pub fn map_uvs(&self, uvs: &[[f32; 2]]) -> Vec<[f32; 2]> {
        uvs.iter().map(|&uv| self.map_point(uv)).collect()
    }

    pub fn map_rect(&self, rect: Box2D<f32, UnknownUnit>) -> Box2D<f32, UnknownUnit> {
        let (min_u, min_v) = self.map(rect.min.x, rect.min.y);
        let (max_u, max_v) = self.map(rect.max.x, rect.max.y);
        Box2D::new(Point2D::new(min_u, min_v), Point2D::new(max_u, max_v))
    }

    /// The entry's rectangle in atlas UV space.
    pub fn uv_bounds(&self) -> Box2D<f32, UnknownUnit> {
        Box2D::new(
            Point2D::new(self.min_u, self.min_v),
            Point2D::new(self.max_u, self.max_v),
        )
    }
}

impl fmt::Display for UvMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "UvMapper(u: {}..{}, v: {}..{})",
            self.min_u, self.max_u, self.min_v, self.max_v
        )
    }
}

// Exact at both ends: t == 0 yields `a`, t == 1 yields `b`.
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}
