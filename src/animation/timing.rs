//! Easing curves mapping linear progress to eased progress.
//!
//! The named curves are the CSS ones, all expressed as unit cubic beziers
//! through (0, 0) and (1, 1). [`TimingFunction::Steps`] holds each of `n`
//! equal intervals at its start value.
//!
//! ```ignore
//! let fade = KeyFrames::new(1.0, 0.0);
//! let anim = PropertyAnimation::new(node, NodeProperty::Opacity, fade)
//!     .timing(TimingFunction::EaseOut);
//! ```

use std::sync::Arc;

const NEWTON_ITERATIONS: usize = 8;
const BISECTION_ITERATIONS: usize = 24;
const EPSILON: f32 = 1e-6;

#[derive(Clone)]
pub enum TimingFunction {
    Linear,
    Ease,
    EaseIn,
    EaseOut,
    EaseInOut,
    /// Control points (x1, y1, x2, y2); x values are clamped to `0..=1`
    CubicBezier(f32, f32, f32, f32),
    /// Jumps at the end of each of `n` intervals
    Steps(u32),
    Custom(Arc<dyn Fn(f32) -> f32 + Send + Sync>),
}

impl TimingFunction {
    /// Eased progress for linear `progress`, which is clamped to `0..=1`.
    /// The endpoints always map to themselves except for custom curves.
    pub fn evaluate(&self, progress: f32) -> f32 {
        let t = progress.clamp(0.0, 1.0);
        match self {
            TimingFunction::Custom(f) => f(t),
            _ if t <= 0.0 || t >= 1.0 => t,
            TimingFunction::Linear => t,
            TimingFunction::Ease => UnitBezier::new(0.25, 0.1, 0.25, 1.0).solve(t),
            TimingFunction::EaseIn => UnitBezier::new(0.42, 0.0, 1.0, 1.0).solve(t),
            TimingFunction::EaseOut => UnitBezier::new(0.0, 0.0, 0.58, 1.0).solve(t),
            TimingFunction::EaseInOut => UnitBezier::new(0.42, 0.0, 0.58, 1.0).solve(t),
            TimingFunction::CubicBezier(x1, y1, x2, y2) => {
                UnitBezier::new(*x1, *y1, *x2, *y2).solve(t)
            }
            TimingFunction::Steps(0) => t,
            TimingFunction::Steps(n) => (t * *n as f32).floor() / *n as f32,
        }
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(f32) -> f32 + Send + Sync + 'static,
    {
        TimingFunction::Custom(Arc::new(f))
    }
}

impl std::fmt::Debug for TimingFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimingFunction::Linear => f.write_str("Linear"),
            TimingFunction::Ease => f.write_str("Ease"),
            TimingFunction::EaseIn => f.write_str("EaseIn"),
            TimingFunction::EaseOut => f.write_str("EaseOut"),
            TimingFunction::EaseInOut => f.write_str("EaseInOut"),
            TimingFunction::CubicBezier(x1, y1, x2, y2) => f
                .debug_tuple("CubicBezier")
                .field(x1)
                .field(y1)
                .field(x2)
                .field(y2)
                .finish(),
            TimingFunction::Steps(n) => f.debug_tuple("Steps").field(n).finish(),
            TimingFunction::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Cubic bezier from (0, 0) to (1, 1) in polynomial form, per axis
/// `((a * t + b) * t + c) * t`.
struct UnitBezier {
    ax: f32,
    bx: f32,
    cx: f32,
    ay: f32,
    by: f32,
    cy: f32,
}

impl UnitBezier {
    fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        let (x1, x2) = (x1.clamp(0.0, 1.0), x2.clamp(0.0, 1.0));
        let cx = 3.0 * x1;
        let bx = 3.0 * (x2 - x1) - cx;
        let cy = 3.0 * y1;
        let by = 3.0 * (y2 - y1) - cy;
        Self {
            ax: 1.0 - cx - bx,
            bx,
            cx,
            ay: 1.0 - cy - by,
            by,
            cy,
        }
    }

    fn x(&self, t: f32) -> f32 {
        ((self.ax * t + self.bx) * t + self.cx) * t
    }

    fn y(&self, t: f32) -> f32 {
        ((self.ay * t + self.by) * t + self.cy) * t
    }

    fn dx(&self, t: f32) -> f32 {
        (3.0 * self.ax * t + 2.0 * self.bx) * t + self.cx
    }

    /// Eased value at horizontal position `x`.
    fn solve(&self, x: f32) -> f32 {
        self.y(self.parameter_for(x))
    }

    /// Curve parameter whose x equals `x`. Newton first, bisection when the
    /// slope gets too flat to converge.
    fn parameter_for(&self, x: f32) -> f32 {
        let mut t = x;
        for _ in 0..NEWTON_ITERATIONS {
            let error = self.x(t) - x;
            if error.abs() < EPSILON {
                return t;
            }
            let slope = self.dx(t);
            if slope.abs() < EPSILON {
                break;
            }
            t -= error / slope;
        }

        let (mut lo, mut hi) = (0.0f32, 1.0f32);
        t = x;
        for _ in 0..BISECTION_ITERATIONS {
            let current = self.x(t);
            if (current - x).abs() < EPSILON {
                break;
            }
            if current < x {
                lo = t;
            } else {
                hi = t;
            }
            t = (lo + hi) / 2.0;
        }
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_endpoints_are_fixed() {
        for timing in [
            TimingFunction::Linear,
            TimingFunction::Ease,
            TimingFunction::EaseIn,
            TimingFunction::EaseOut,
            TimingFunction::EaseInOut,
            TimingFunction::CubicBezier(0.7, -0.5, 0.3, 1.5),
            TimingFunction::Steps(4),
        ] {
            assert_eq!(timing.evaluate(0.0), 0.0, "{:?}", timing);
            assert_eq!(timing.evaluate(1.0), 1.0, "{:?}", timing);
            assert_eq!(timing.evaluate(-2.0), 0.0, "{:?}", timing);
        }
    }

    #[test]
    fn test_ease_in_out_is_symmetric() {
        let timing = TimingFunction::EaseInOut;
        assert!(approx_eq(timing.evaluate(0.5), 0.5));
        for x in [0.1, 0.25, 0.4] {
            assert!(approx_eq(timing.evaluate(x) + timing.evaluate(1.0 - x), 1.0));
        }
        assert!(TimingFunction::EaseIn.evaluate(0.5) < 0.5);
        assert!(TimingFunction::EaseOut.evaluate(0.5) > 0.5);
    }

    #[test]
    fn test_straight_bezier_is_linear() {
        let timing = TimingFunction::CubicBezier(0.25, 0.25, 0.75, 0.75);
        for x in [0.1, 0.3, 0.5, 0.9] {
            assert!(approx_eq(timing.evaluate(x), x));
        }
    }

    #[test]
    fn test_steps() {
        let timing = TimingFunction::Steps(4);
        assert_eq!(timing.evaluate(0.2), 0.0);
        assert_eq!(timing.evaluate(0.25), 0.25);
        assert_eq!(timing.evaluate(0.99), 0.75);
    }

    #[test]
    fn test_custom() {
        let snap = TimingFunction::custom(|t| if t < 0.5 { 0.0 } else { 1.0 });
        assert_eq!(snap.evaluate(0.49), 0.0);
        assert_eq!(snap.evaluate(0.51), 1.0);
    }
}
