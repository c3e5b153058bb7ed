//! Frame context tying the scene, its animations and the renderer together.

use crate::animation::{Animation, AnimationId, AnimationManager};
use crate::render_stats::FrameStats;
use crate::renderer::{OffscreenTarget, Renderer, SurfaceState};
use crate::scene::Scene;

/// Owns everything one frame touches. A frame is [`advance`](Engine::advance),
/// then [`render`](Engine::render), then [`frame_swapped`](Engine::frame_swapped)
/// once the result is on screen; [`Engine::frame`] does all three.
pub struct Engine {
    scene: Scene,
    animations: AnimationManager<Scene>,
    renderer: Renderer,
}

impl Engine {
    pub fn new(renderer: Renderer) -> Self {
        Self::with_scene(Scene::new(), renderer)
    }

    pub fn with_scene(scene: Scene, renderer: Renderer) -> Self {
        Self {
            scene,
            animations: AnimationManager::new(),
            renderer,
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    pub fn animations(&self) -> &AnimationManager<Scene> {
        &self.animations
    }

    pub fn animate(&mut self, animation: Animation<Scene>, now: f64) -> AnimationId {
        self.animations.start(animation, now)
    }

    pub fn stop_animation(&mut self, id: AnimationId) -> Option<Animation<Scene>> {
        self.animations.stop(id)
    }

    /// Tick running animations to clock time `now`.
    pub fn advance(&mut self, now: f64) {
        self.animations.tick(now, &mut self.scene);
    }

    pub fn render(&mut self, surface: &mut SurfaceState) -> bool {
        self.renderer.render(&self.scene, surface)
    }

    pub fn render_offscreen(&mut self, target: &OffscreenTarget) -> bool {
        self.renderer.render_offscreen(&self.scene, target)
    }

    pub fn frame_swapped(&mut self) {
        self.renderer.frame_swapped();
    }

    /// Advance, render and present one frame. Returns whether anything was
    /// drawn.
    pub fn frame(&mut self, now: f64, surface: &mut SurfaceState) -> bool {
        self.advance(now);
        let drawn = self.render(surface);
        if drawn {
            self.frame_swapped();
        }
        drawn
    }

    pub fn last_frame_stats(&self) -> FrameStats {
        self.renderer.last_frame_stats()
    }

    /// Whether animations are still running, i.e. another frame is needed.
    pub fn needs_frame(&self) -> bool {
        !self.animations.is_empty()
    }
}
