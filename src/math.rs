//! Geometry helpers on top of glam.
//!
//! Matrices are glam's column-major `Mat4`. Node geometry lives in a 2D plane
//! (z = 0) until a projection group lifts it into 3D, where [`project_2d`]
//! flattens it again using the group's far plane.

pub use glam::{Mat4, Vec2, Vec3, Vec4};

const PLANE_EPSILON: f32 = 1e-6;
/// Largest magnification [`project_2d`] applies is its inverse.
const MIN_Z_SCALE: f32 = 1e-3;

/// Axis-aligned rectangle given by its top-left and bottom-right corners.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect2D {
    pub tl: Vec2,
    pub br: Vec2,
}

impl Rect2D {
    /// Inverted rectangle; the identity for [`Rect2D::union`].
    pub const EMPTY: Self = Self {
        tl: Vec2::INFINITY,
        br: Vec2::NEG_INFINITY,
    };

    pub fn new(tl: Vec2, br: Vec2) -> Self {
        Self { tl, br }
    }

    pub fn from_xywh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            tl: Vec2::new(x, y),
            br: Vec2::new(x + width, y + height),
        }
    }

    /// Smallest rectangle containing both points, in any order.
    pub fn from_corners(a: Vec2, b: Vec2) -> Self {
        Self {
            tl: a.min(b),
            br: a.max(b),
        }
    }

    pub fn width(&self) -> f32 {
        self.br.x - self.tl.x
    }

    pub fn height(&self) -> f32 {
        self.br.y - self.tl.y
    }

    pub fn size(&self) -> Vec2 {
        self.br - self.tl
    }

    pub fn is_empty(&self) -> bool {
        !(self.br.x > self.tl.x && self.br.y > self.tl.y)
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.tl.x && p.x <= self.br.x && p.y >= self.tl.y && p.y <= self.br.y
    }

    pub fn include(&mut self, p: Vec2) {
        self.tl = self.tl.min(p);
        self.br = self.br.max(p);
    }

    pub fn union(self, other: Rect2D) -> Rect2D {
        Rect2D {
            tl: self.tl.min(other.tl),
            br: self.br.max(other.br),
        }
    }

    /// Grow by `amount` on every side.
    pub fn expanded(self, amount: f32) -> Rect2D {
        Rect2D {
            tl: self.tl - Vec2::splat(amount),
            br: self.br + Vec2::splat(amount),
        }
    }

    pub fn translated(self, offset: Vec2) -> Rect2D {
        Rect2D {
            tl: self.tl + offset,
            br: self.br + offset,
        }
    }

    /// Snap outwards to whole pixels.
    pub fn aligned(self) -> Rect2D {
        Rect2D {
            tl: self.tl.floor(),
            br: self.br.ceil(),
        }
    }

    /// Corners in quad order: top-left, bottom-left, top-right, bottom-right.
    pub fn corners(&self) -> [Vec2; 4] {
        [
            self.tl,
            Vec2::new(self.tl.x, self.br.y),
            Vec2::new(self.br.x, self.tl.y),
            self.br,
        ]
    }
}

pub fn translate_2d(dx: f32, dy: f32) -> Mat4 {
    Mat4::from_translation(Vec3::new(dx, dy, 0.0))
}

pub fn scale_2d(sx: f32, sy: f32) -> Mat4 {
    Mat4::from_scale(Vec3::new(sx, sy, 1.0))
}

/// Rotation in the screen plane.
pub fn rotate_2d(radians: f32) -> Mat4 {
    Mat4::from_rotation_z(radians)
}

/// Rotation out of the screen plane, around the vertical axis.
pub fn rotate_around_y(radians: f32) -> Mat4 {
    Mat4::from_rotation_y(radians)
}

/// Rotation out of the screen plane, around the horizontal axis.
pub fn rotate_around_x(radians: f32) -> Mat4 {
    Mat4::from_rotation_x(radians)
}

/// Whether `m` moves points out of the z = 0 plane, or depends on z, or
/// carries a perspective term.
pub fn is_out_of_plane(m: &Mat4) -> bool {
    [
        m.x_axis.z,
        m.y_axis.z,
        m.z_axis.x,
        m.z_axis.y,
        m.w_axis.z,
        m.x_axis.w,
        m.y_axis.w,
        m.z_axis.w,
    ]
    .iter()
    .any(|v| v.abs() > PLANE_EPSILON)
}

/// Map a point in the z = 0 plane through a 2D transform.
pub fn map_2d(m: &Mat4, p: Vec2) -> Vec2 {
    let v = *m * Vec4::new(p.x, p.y, 0.0, 1.0);
    Vec2::new(v.x, v.y)
}

/// Lift a point in the z = 0 plane through a 3D transform.
pub fn map_3d(m: &Mat4, p: Vec2) -> Vec3 {
    let v = *m * Vec4::new(p.x, p.y, 0.0, 1.0);
    if (v.w - 1.0).abs() > PLANE_EPSILON && v.w.abs() > PLANE_EPSILON {
        v.truncate() / v.w
    } else {
        v.truncate()
    }
}

/// Perspective-project a point with the eye at `far_plane` on the z axis.
///
/// Points with positive z move towards the viewer and grow away from the
/// origin; points at z = 0 are unchanged. Points at or behind the eye are
/// held just in front of it.
pub fn project_2d(p: Vec3, far_plane: f32) -> Vec2 {
    let z_scale = ((far_plane - p.z) / far_plane).max(MIN_Z_SCALE);
    Vec2::new(p.x / z_scale, p.y / z_scale)
}

/// Orthographic projection mapping `bounds` onto the full render target,
/// top-left corner first.
pub fn ortho_projection(bounds: Rect2D) -> Mat4 {
    Mat4::orthographic_rh(
        bounds.tl.x,
        bounds.br.x,
        bounds.br.y,
        bounds.tl.y,
        -1.0,
        1.0,
    )
}

/// Color matrices acting on premultiplied RGBA.
///
/// Offsets live in the alpha column so they scale with coverage.
pub mod color_matrix {
    use super::Mat4;

    fn from_rows(rows: [[f32; 4]; 4]) -> Mat4 {
        Mat4::from_cols_array_2d(&rows).transpose()
    }

    /// 0 is fully desaturated, 1 is unchanged, above 1 oversaturates.
    pub fn saturation(s: f32) -> Mat4 {
        from_rows([
            [0.213 + 0.787 * s, 0.715 - 0.715 * s, 0.072 - 0.072 * s, 0.0],
            [0.213 - 0.213 * s, 0.715 + 0.285 * s, 0.072 - 0.072 * s, 0.0],
            [0.213 - 0.213 * s, 0.715 - 0.715 * s, 0.072 + 0.928 * s, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    pub fn grayscale() -> Mat4 {
        saturation(0.0)
    }

    pub fn sepia(amount: f32) -> Mat4 {
        let inv = 1.0 - amount.clamp(0.0, 1.0);
        from_rows([
            [0.393 + 0.607 * inv, 0.769 - 0.769 * inv, 0.189 - 0.189 * inv, 0.0],
            [0.349 - 0.349 * inv, 0.686 + 0.314 * inv, 0.168 - 0.168 * inv, 0.0],
            [0.272 - 0.272 * inv, 0.534 - 0.534 * inv, 0.131 + 0.869 * inv, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    pub fn brightness(b: f32) -> Mat4 {
        from_rows([
            [b, 0.0, 0.0, 0.0],
            [0.0, b, 0.0, 0.0],
            [0.0, 0.0, b, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    pub fn contrast(c: f32) -> Mat4 {
        let offset = 0.5 - 0.5 * c;
        from_rows([
            [c, 0.0, 0.0, offset],
            [0.0, c, 0.0, offset],
            [0.0, 0.0, c, offset],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    pub fn invert(amount: f32) -> Mat4 {
        let a = amount.clamp(0.0, 1.0);
        let scale = 1.0 - 2.0 * a;
        from_rows([
            [scale, 0.0, 0.0, a],
            [0.0, scale, 0.0, a],
            [0.0, 0.0, scale, a],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// Rotate hue by `radians` around the luminance axis.
    pub fn hue(radians: f32) -> Mat4 {
        let (sin, cos) = radians.sin_cos();
        from_rows([
            [
                0.213 + cos * 0.787 - sin * 0.213,
                0.715 - cos * 0.715 - sin * 0.715,
                0.072 - cos * 0.072 + sin * 0.928,
                0.0,
            ],
            [
                0.213 - cos * 0.213 + sin * 0.143,
                0.715 + cos * 0.285 + sin * 0.140,
                0.072 - cos * 0.072 - sin * 0.283,
                0.0,
            ],
            [
                0.213 - cos * 0.213 - sin * 0.787,
                0.715 - cos * 0.715 + sin * 0.715,
                0.072 + cos * 0.928 + sin * 0.072,
                0.0,
            ],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }
}
