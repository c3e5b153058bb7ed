//! Issues draw calls for a frame's elements.
//!
//! Runs are walked in tree order. A projection group's run is depth-sorted
//! first; a layered element has its members rendered into a pooled texture
//! before it is composited into its parent's run. Layers nested inside a
//! layer are resolved while rendering the outer layer's members, so the
//! innermost layer is always ready before anything samples it.
//!
//! Programs are bound lazily and each program's projection is re-uploaded
//! only when its dirty bit says the render target changed since it was
//! last bound.

use crate::config::RendererConfig;
use crate::math::{ortho_projection, Mat4, Rect2D, Vec2, Vec4};
use crate::render_stats::FrameStats;
use crate::renderer::builder::{bounding_rect, Builder, Element, QUAD_VERTICES};
use crate::renderer::prepass::Prepass;
use crate::renderer::program::{ProgramKind, ProgramUpdate};
use crate::renderer::texture_pool::{TextureId, TexturePool, TextureStorage};
use crate::scene::{NodeId, NodeKind, Scene};

/// Parameters of one pass of the separable blur.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlurPass {
    pub radius: u32,
    pub sigma: f32,
    /// Size of the sampled texture in pixels
    pub texture_size: Vec2,
    /// Unit direction, (1, 0) or (0, 1)
    pub direction: Vec2,
}

impl BlurPass {
    fn new(radius: u32, bounds: Rect2D, direction: Vec2) -> Self {
        Self {
            radius,
            sigma: (radius as f32 / 2.0).max(0.5),
            texture_size: bounds.size(),
            direction,
        }
    }

    /// One texel along the blur direction, in texture coordinates.
    pub fn step(&self) -> Vec2 {
        self.direction / self.texture_size.max(Vec2::ONE)
    }
}

/// Drawing surface the executor talks to.
///
/// Draws use whatever program was bound last and the projection last
/// uploaded for it. Quads are addressed by their first vertex in the frame's
/// vertex data.
pub trait DrawBackend: TextureStorage {
    fn set_vertices(&mut self, vertices: &[Vec2]);
    fn bind_program(&mut self, program: ProgramKind);
    fn upload_projection(&mut self, program: ProgramKind, projection: &Mat4);
    /// Redirect drawing into `texture` until the matching `end_layer`.
    fn begin_layer(&mut self, texture: TextureId);
    fn end_layer(&mut self);
    fn draw_solid(&mut self, quad: u32, color: Vec4);
    fn draw_texture(&mut self, quad: u32, texture: TextureId, opacity: f32);
    fn draw_color_filter(&mut self, quad: u32, texture: TextureId, color_matrix: &Mat4);
    fn draw_blur(&mut self, quad: u32, texture: TextureId, pass: &BlurPass);
    fn draw_shadow(&mut self, quad: u32, texture: TextureId, pass: &BlurPass, color: Vec4);
}

pub struct Executor<'a, B: DrawBackend> {
    scene: &'a Scene,
    vertices: &'a [Vec2],
    backend: &'a mut B,
    pool: &'a mut TexturePool,
    max_blur_radius: u32,
    projections: Vec<Mat4>,
    active_program: Option<ProgramKind>,
    dirty: ProgramUpdate,
    stats: FrameStats,
}

impl<'a, B: DrawBackend> Executor<'a, B> {
    pub fn new(
        scene: &'a Scene,
        vertices: &'a [Vec2],
        backend: &'a mut B,
        pool: &'a mut TexturePool,
        viewport: Rect2D,
        max_blur_radius: u32,
    ) -> Self {
        Self {
            scene,
            vertices,
            backend,
            pool,
            max_blur_radius,
            projections: vec![ortho_projection(viewport)],
            active_program: None,
            dirty: ProgramUpdate::all(),
            stats: FrameStats::default(),
        }
    }

    /// Draw the top-level run.
    pub fn run(mut self, elements: &mut [Element]) -> FrameStats {
        self.stats.elements = elements.len() as u32;
        self.render_run(elements, false);
        self.stats
    }

    fn render_run(&mut self, run: &mut [Element], depth_sorted: bool) {
        if depth_sorted {
            self.render_sorted_run(run);
            return;
        }

        let mut i = 0;
        while i < run.len() {
            let element = run[i];
            let span = if element.is_group() {
                element.group_size as usize
            } else {
                0
            };

            if element.completed {
                // Already drawn as part of a resolved layer.
            } else if element.layered {
                let (head, tail) = run.split_at_mut(i + 1);
                self.resolve_layer(&mut head[i], &mut tail[..span]);
                self.composite_layer(&mut head[i]);
            } else if element.projection {
                self.stats.projection_groups += 1;
                self.render_run(&mut run[i + 1..i + 1 + span], true);
            } else {
                self.draw_element(&element);
            }

            i += 1 + span;
        }
    }

    fn render_sorted_run(&mut self, run: &mut [Element]) {
        // Flatten layers before sorting; sorting scatters their members.
        let mut i = 0;
        while i < run.len() {
            let span = if run[i].is_group() {
                run[i].group_size as usize
            } else {
                0
            };
            if run[i].layered && !run[i].completed {
                let (head, tail) = run.split_at_mut(i + 1);
                self.resolve_layer(&mut head[i], &mut tail[..span]);
            }
            i += 1 + span;
        }

        sort_run(run);

        for element in run.iter_mut() {
            if element.completed {
                break;
            }
            if element.layered {
                self.composite_layer(element);
            } else {
                self.draw_element(element);
            }
        }
    }

    /// Render `members` into a pooled texture sized to the layer's bounds
    /// and mark them completed. Blur and shadow layers also run the
    /// horizontal blur pass here.
    fn resolve_layer(&mut self, layer: &mut Element, members: &mut [Element]) {
        let bounds = bounding_rect(self.vertices, layer.vertex_offset);
        if bounds.is_empty() {
            log::trace!("Skipping layer {:?} with empty bounds", layer.node);
            mark_completed(members);
            return;
        }

        let content = self.acquire_texture(bounds);
        self.enter_layer(content, bounds);
        self.render_run(members, layer.projection);
        mark_completed(members);
        self.leave_layer();
        self.stats.layers += 1;

        let radius = match self.scene.kind(layer.node) {
            NodeKind::Blur(blur) => Some(blur.radius),
            NodeKind::Shadow(shadow) => Some(shadow.radius),
            _ => None,
        };

        let Some(radius) = radius else {
            layer.texture = Some(content);
            return;
        };

        let radius = radius.min(self.max_blur_radius);
        let blurred = self.acquire_texture(bounds);
        self.enter_layer(blurred, bounds);
        self.use_program(ProgramKind::Blur);
        self.backend.draw_blur(
            layer.vertex_offset,
            content,
            &BlurPass::new(radius, bounds, Vec2::X),
        );
        self.stats.draws += 1;
        self.leave_layer();

        layer.texture = Some(blurred);
        if matches!(self.scene.kind(layer.node), NodeKind::Shadow(_)) {
            layer.source_texture = Some(content);
        } else {
            self.pool.release(content);
        }
    }

    /// Draw a resolved layer into the current target and hand its textures
    /// back to the pool.
    fn composite_layer(&mut self, layer: &mut Element) {
        let Some(texture) = layer.texture.take() else {
            return;
        };
        let bounds = bounding_rect(self.vertices, layer.vertex_offset);
        let quad = layer.vertex_offset;

        match self.scene.kind(layer.node) {
            NodeKind::Opacity(opacity) => {
                self.use_program(ProgramKind::AlphaTexture);
                self.backend
                    .draw_texture(quad, texture, opacity.opacity * layer.opacity);
            }
            NodeKind::ColorFilter(filter) => {
                self.use_program(ProgramKind::ColorFilter);
                self.backend
                    .draw_color_filter(quad, texture, &filter.color_matrix);
            }
            NodeKind::Blur(blur) => {
                let pass = BlurPass::new(blur.radius.min(self.max_blur_radius), bounds, Vec2::Y);
                self.use_program(ProgramKind::Blur);
                self.backend.draw_blur(quad, texture, &pass);
            }
            NodeKind::Shadow(shadow) => {
                let pass =
                    BlurPass::new(shadow.radius.min(self.max_blur_radius), bounds, Vec2::Y);
                self.use_program(ProgramKind::Shadow);
                self.backend
                    .draw_shadow(quad + QUAD_VERTICES, texture, &pass, shadow.color);
                if let Some(source) = layer.source_texture.take() {
                    self.use_program(ProgramKind::Texture);
                    self.backend.draw_texture(quad, source, 1.0);
                    self.stats.draws += 1;
                    self.pool.release(source);
                }
            }
            other => {
                debug_assert!(false, "{:?} nodes are never layered", other.node_type());
            }
        }

        self.stats.draws += 1;
        self.pool.release(texture);
    }

    fn draw_element(&mut self, element: &Element) {
        let quad = element.vertex_offset;
        match self.scene.kind(element.node) {
            NodeKind::Rectangle(rect) => {
                let mut color = rect.color;
                color.w *= element.opacity;
                self.use_program(ProgramKind::Solid);
                self.backend.draw_solid(quad, color);
            }
            NodeKind::Texture(node) => {
                let Some(texture) = node.texture else {
                    return;
                };
                if element.opacity < 1.0 {
                    self.use_program(ProgramKind::AlphaTexture);
                } else {
                    self.use_program(ProgramKind::Texture);
                }
                self.backend.draw_texture(quad, texture, element.opacity);
            }
            _ => return,
        }
        self.stats.draws += 1;
    }

    fn use_program(&mut self, program: ProgramKind) {
        if self.active_program != Some(program) {
            self.backend.bind_program(program);
            self.active_program = Some(program);
            self.stats.program_switches += 1;
        }

        let bit = program.update_bit();
        if self.dirty.contains(bit) {
            let projection = self.projections.last().copied().unwrap_or(Mat4::IDENTITY);
            self.backend.upload_projection(program, &projection);
            self.dirty.remove(bit);
            self.stats.projection_uploads += 1;
        }
    }

    fn acquire_texture(&mut self, bounds: Rect2D) -> TextureId {
        let texture = self.pool.acquire(&mut *self.backend);
        self.backend
            .resize_texture(texture, bounds.width() as u32, bounds.height() as u32);
        self.stats.textures_acquired += 1;
        texture
    }

    // A render target switch starts a new pass: nothing stays bound and
    // every program needs the new projection.

    fn enter_layer(&mut self, texture: TextureId, bounds: Rect2D) {
        self.backend.begin_layer(texture);
        self.projections.push(ortho_projection(bounds));
        self.active_program = None;
        self.dirty = ProgramUpdate::all();
    }

    fn leave_layer(&mut self) {
        self.backend.end_layer();
        self.projections.pop();
        self.active_program = None;
        self.dirty = ProgramUpdate::all();
    }
}

/// Prepare and draw the tree under `root` onto a `viewport`-sized target.
pub fn execute_frame<B: DrawBackend>(
    scene: &Scene,
    root: NodeId,
    viewport: Vec2,
    backend: &mut B,
    pool: &mut TexturePool,
    config: &RendererConfig,
) -> FrameStats {
    let prepass = Prepass::run(scene, root, config.default_far_plane);
    let mut frame = Builder::new(scene, &prepass, config.max_blur_radius).build(root);
    backend.set_vertices(&frame.vertices);

    let viewport = Rect2D::new(Vec2::ZERO, viewport);
    Executor::new(
        scene,
        &frame.vertices,
        backend,
        pool,
        viewport,
        config.max_blur_radius,
    )
    .run(&mut frame.elements)
}

fn mark_completed(run: &mut [Element]) {
    for element in run {
        element.completed = true;
    }
}

/// Completed elements last, otherwise ascending depth. Stable, so equal
/// depths keep tree order.
pub fn sort_run(run: &mut [Element]) {
    run.sort_by(|a, b| {
        a.completed
            .cmp(&b.completed)
            .then_with(|| a.z.total_cmp(&b.z))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(node: NodeId, z: f32, completed: bool) -> Element {
        Element {
            node,
            vertex_offset: 0,
            z,
            opacity: 1.0,
            texture: None,
            source_texture: None,
            group_size: 0,
            projection: false,
            layered: false,
            completed,
        }
    }

    #[test]
    fn test_sort_completed_last_then_depth() {
        let mut scene = Scene::new();
        let ids: Vec<_> = (0..5).map(|_| scene.create_opacity(1.0)).collect();
        let mut run = vec![
            element(ids[0], 5.0, true),
            element(ids[1], 2.0, false),
            element(ids[2], -100.0, true),
            element(ids[3], -1.0, false),
            element(ids[4], 2.0, false),
        ];

        sort_run(&mut run);

        let order: Vec<_> = run.iter().map(|e| e.node).collect();
        assert_eq!(order, vec![ids[3], ids[1], ids[4], ids[2], ids[0]]);
    }

    #[test]
    fn test_blur_step() {
        let pass = BlurPass::new(
            4,
            Rect2D::from_xywh(0.0, 0.0, 200.0, 100.0),
            Vec2::Y,
        );
        assert_eq!(pass.step(), Vec2::new(0.0, 0.01));
        assert_eq!(pass.sigma, 2.0);
    }
}
