use crate::math::{Rect2D, Vec2, Vec4};

/// Values a [`KeyFrames`](super::KeyFrames) track can hold.
pub trait Animatable: Clone + PartialEq + 'static {
    /// Value a fraction `t` of the way from `self` to `to`. Eased progress
    /// may leave `0..=1`, in which case the value extrapolates.
    fn interpolate(&self, to: &Self, t: f32) -> Self;
}

impl Animatable for f32 {
    fn interpolate(&self, to: &Self, t: f32) -> Self {
        self + (to - self) * t
    }
}

impl Animatable for f64 {
    fn interpolate(&self, to: &Self, t: f32) -> Self {
        self + (to - self) * t as f64
    }
}

impl Animatable for Vec2 {
    fn interpolate(&self, to: &Self, t: f32) -> Self {
        self.lerp(*to, t)
    }
}

/// Per channel, straight or premultiplied alike.
impl Animatable for Vec4 {
    fn interpolate(&self, to: &Self, t: f32) -> Self {
        self.lerp(*to, t)
    }
}

/// Corner by corner.
impl Animatable for Rect2D {
    fn interpolate(&self, to: &Self, t: f32) -> Self {
        Rect2D::new(self.tl.lerp(to.tl, t), self.br.lerp(to.br, t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_extrapolates() {
        assert_eq!(2.0f32.interpolate(&12.0, 0.25), 4.5);
        assert_eq!(0.0f64.interpolate(&10.0, 1.5), 15.0);
        assert_eq!(1.0f32.interpolate(&0.0, -1.0), 2.0);
    }

    #[test]
    fn test_color_channels() {
        let black = Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert_eq!(black.interpolate(&Vec4::ONE, 0.5), Vec4::new(0.5, 0.5, 0.5, 1.0));
    }

    #[test]
    fn test_rect_corners() {
        let from = Rect2D::from_xywh(0.0, 0.0, 10.0, 10.0);
        let to = Rect2D::from_xywh(20.0, 10.0, 30.0, 10.0);
        assert_eq!(
            from.interpolate(&to, 0.5),
            Rect2D::new(Vec2::new(10.0, 5.0), Vec2::new(30.0, 15.0))
        );
    }
}
