//! Retained-mode scene graph renderer with an animation timeline.
//!
//! Build a tree of [`Scene`] nodes (transforms, opacity, color filters,
//! blurs, shadows, rectangles and textures), animate their parameters with
//! [`Animation`]s, and draw it every frame with a wgpu [`Renderer`]. Subtrees
//! that need it are flattened into pooled offscreen layers; subtrees under
//! 3D transforms are perspective-projected and depth-sorted.
//!
//! ```ignore
//! let context = GpuContext::new(&RendererConfig::default())?;
//! let renderer = Renderer::from_context(&context, format, RendererConfig::default());
//! let mut engine = Engine::new(renderer);
//!
//! let scene = engine.scene_mut();
//! let root = scene.create_root();
//! let fade = scene.create_opacity(1.0);
//! let rect = scene.create_rectangle(Rect2D::from_xywh(10.0, 10.0, 100.0, 50.0), Vec4::ONE);
//! scene.append(fade, rect);
//! scene.append(root, fade);
//!
//! engine.animate(
//!     Animation::new(1.0, PropertyAnimation::new(fade, NodeProperty::Opacity, KeyFrames::new(1.0, 0.0))),
//!     0.0,
//! );
//! engine.frame(0.5, &mut surface);
//! ```

pub mod animation;
pub mod config;
pub mod engine;
pub mod error;
pub mod math;
pub mod render_stats;
pub mod renderer;
pub mod scene;

pub use animation::{
    ActiveDirection, Animation, AnimationId, AnimationManager, Apply, Direction, Iterations,
    KeyFrames, NodeProperty, PropertyAnimation, Sample, TimingFunction,
};
pub use config::RendererConfig;
pub use engine::Engine;
pub use error::{Error, Result};
pub use math::{Mat4, Rect2D, Vec2, Vec3, Vec4};
pub use render_stats::FrameStats;
pub use renderer::{GpuContext, OffscreenTarget, Renderer, SurfaceState, TextureId};
pub use scene::{NodeId, NodeKind, NodeType, Scene};
