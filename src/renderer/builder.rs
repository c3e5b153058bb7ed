//! Second traversal of a frame: world transforms, quads and elements.
//!
//! Every drawable node gets a 4-vertex quad in screen space and an
//! [`Element`]. Layered and projection roots get an element placed before
//! their members, so a group always occupies one contiguous run:
//! `[root, member_0, .., member_{group_size-1}]`.
//!
//! Inside a projection group corners are lifted through the group's 3D
//! matrix, perspective-projected with the group's far plane and then mapped
//! through the enclosing 2D matrix.

use crate::math::{map_2d, map_3d, project_2d, Mat4, Rect2D, Vec2};
use crate::renderer::prepass::{GroupInfo, Prepass};
use crate::renderer::TextureId;
use crate::scene::{NodeId, NodeKind, Scene};

/// Vertices per quad.
pub const QUAD_VERTICES: u32 = 4;

/// Render descriptor for one drawable node or group root. Lives for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Element {
    pub node: NodeId,
    /// First vertex of the element's quad. Shadow layers own a second quad
    /// right after the first.
    pub vertex_offset: u32,
    /// Depth inside a projection group; zero elsewhere
    pub z: f32,
    /// Opacity folded in from enclosing non-layered opacity nodes
    pub opacity: f32,
    /// Layer backing texture, set while the layer is being composited
    pub texture: Option<TextureId>,
    /// Unblurred layer content of a shadow
    pub source_texture: Option<TextureId>,
    pub group_size: u32,
    pub projection: bool,
    pub layered: bool,
    pub completed: bool,
}

impl Element {
    fn new(node: NodeId, vertex_offset: u32, opacity: f32) -> Self {
        Self {
            node,
            vertex_offset,
            z: 0.0,
            opacity,
            texture: None,
            source_texture: None,
            group_size: 0,
            projection: false,
            layered: false,
            completed: false,
        }
    }

    /// Whether this element roots a run of members following it.
    pub fn is_group(&self) -> bool {
        self.layered || self.projection
    }
}

/// Geometry and elements of one frame.
#[derive(Debug, Default)]
pub struct FrameGeometry {
    pub vertices: Vec<Vec2>,
    pub elements: Vec<Element>,
}

impl FrameGeometry {
    /// Rectangle spanned by the first and last corner of a quad.
    pub fn bounding_rect(&self, vertex_offset: u32) -> Rect2D {
        bounding_rect(&self.vertices, vertex_offset)
    }
}

pub fn bounding_rect(vertices: &[Vec2], vertex_offset: u32) -> Rect2D {
    let offset = vertex_offset as usize;
    Rect2D::from_corners(vertices[offset], vertices[offset + 3])
}

/// Bounds and depth of the content gathered into an open layer.
#[derive(Clone, Copy)]
struct LayerContent {
    bounds: Rect2D,
    z_sum: f32,
    z_count: u32,
}

impl LayerContent {
    fn new() -> Self {
        Self {
            bounds: Rect2D::EMPTY,
            z_sum: 0.0,
            z_count: 0,
        }
    }

    fn mean_z(&self) -> f32 {
        if self.z_count == 0 {
            0.0
        } else {
            self.z_sum / self.z_count as f32
        }
    }
}

pub struct Builder<'a> {
    scene: &'a Scene,
    prepass: &'a Prepass,
    max_blur_radius: u32,
    vertices: Vec<Vec2>,
    elements: Vec<Element>,
    m2d: Mat4,
    m3d: Mat4,
    far_plane: f32,
    render_3d: bool,
    opacity: f32,
    layers: Vec<LayerContent>,
}

impl<'a> Builder<'a> {
    pub fn new(scene: &'a Scene, prepass: &'a Prepass, max_blur_radius: u32) -> Self {
        let stats = prepass.stats();
        Self {
            scene,
            prepass,
            max_blur_radius,
            vertices: Vec::with_capacity(stats.quad_count() * QUAD_VERTICES as usize),
            elements: Vec::with_capacity(stats.element_count()),
            m2d: Mat4::IDENTITY,
            m3d: Mat4::IDENTITY,
            far_plane: 0.0,
            render_3d: false,
            opacity: 1.0,
            layers: Vec::new(),
        }
    }

    pub fn build(mut self, root: NodeId) -> FrameGeometry {
        self.visit(root);
        debug_assert_eq!(self.elements.len(), self.prepass.stats().element_count());
        debug_assert_eq!(
            self.vertices.len(),
            self.prepass.stats().quad_count() * QUAD_VERTICES as usize
        );
        FrameGeometry {
            vertices: self.vertices,
            elements: self.elements,
        }
    }

    fn visit_children(&mut self, id: NodeId) {
        for &child in self.scene.children(id) {
            self.visit(child);
        }
    }

    fn visit(&mut self, id: NodeId) {
        let scene = self.scene;
        match scene.kind(id) {
            NodeKind::Transform(transform) => {
                let saved = (self.m2d, self.m3d, self.far_plane, self.render_3d);
                match self.prepass.group(id) {
                    Some(group) => {
                        self.push_group_root(id, group);
                        self.render_3d = true;
                        self.far_plane = group.far_plane;
                        if transform.projection_depth > 0.0 {
                            self.m2d *= transform.matrix;
                            self.m3d = Mat4::IDENTITY;
                        } else {
                            self.m3d = transform.matrix;
                        }
                    }
                    None if self.render_3d => self.m3d *= transform.matrix,
                    None => self.m2d *= transform.matrix,
                }
                self.visit_children(id);
                (self.m2d, self.m3d, self.far_plane, self.render_3d) = saved;
            }
            NodeKind::Opacity(opacity) if self.prepass.group(id).is_none() => {
                let saved = self.opacity;
                self.opacity *= opacity.opacity;
                self.visit_children(id);
                self.opacity = saved;
            }
            NodeKind::Opacity(_)
            | NodeKind::ColorFilter(_)
            | NodeKind::Blur(_)
            | NodeKind::Shadow(_) => match self.prepass.group(id) {
                Some(group) => self.visit_layer(id, group),
                None => self.visit_children(id),
            },
            NodeKind::Rectangle(rect) => {
                self.push_drawable(id, rect.geometry);
                self.visit_children(id);
            }
            NodeKind::Texture(texture) => {
                self.push_drawable(id, texture.geometry);
                self.visit_children(id);
            }
            NodeKind::Root => self.visit_children(id),
        }
    }

    fn push_group_root(&mut self, id: NodeId, group: GroupInfo) -> usize {
        let mut element = Element::new(id, 0, self.opacity);
        element.group_size = group.group_size;
        element.projection = group.projection;
        element.layered = group.layered;
        self.elements.push(element);
        self.elements.len() - 1
    }

    fn push_drawable(&mut self, id: NodeId, geometry: Rect2D) {
        let (vertex_offset, z) = self.project_quad(geometry);
        let mut element = Element::new(id, vertex_offset, self.opacity);
        element.z = z;
        self.elements.push(element);

        if let Some(layer) = self.layers.last_mut() {
            for v in &self.vertices[vertex_offset as usize..] {
                layer.bounds.include(*v);
            }
            layer.z_sum += z;
            layer.z_count += 1;
        }
    }

    fn visit_layer(&mut self, id: NodeId, group: GroupInfo) {
        let index = self.push_group_root(id, group);
        let (padding, shadow_offset) = match self.scene.kind(id) {
            NodeKind::Blur(blur) => (blur.radius.min(self.max_blur_radius), None),
            NodeKind::Shadow(shadow) => (
                shadow.radius.min(self.max_blur_radius),
                Some(shadow.offset),
            ),
            _ => (0, None),
        };

        let vertex_offset = self.allocate_quads(if shadow_offset.is_some() { 2 } else { 1 });
        self.elements[index].vertex_offset = vertex_offset;

        let saved_opacity = self.opacity;
        self.opacity = 1.0;
        self.layers.push(LayerContent::new());
        self.visit_children(id);
        let content = self.layers.pop().unwrap_or_else(LayerContent::new);
        self.opacity = saved_opacity;

        debug_assert_eq!(self.elements.len() - index - 1, group.group_size as usize);

        let bounds = if content.bounds.is_empty() {
            content.bounds
        } else {
            content.bounds.expanded(padding as f32).aligned()
        };
        self.write_quad(vertex_offset, bounds);
        let mut covered = bounds;
        if let Some(offset) = shadow_offset {
            let shadow_bounds = bounds.translated(offset);
            self.write_quad(vertex_offset + QUAD_VERTICES, shadow_bounds);
            covered = covered.union(shadow_bounds);
        }

        let z = content.mean_z();
        self.elements[index].z = z;

        if let Some(parent) = self.layers.last_mut() {
            if !covered.is_empty() {
                parent.bounds = parent.bounds.union(covered);
            }
            parent.z_sum += z;
            parent.z_count += 1;
        }
    }

    fn allocate_quads(&mut self, count: u32) -> u32 {
        let offset = self.vertices.len() as u32;
        self.vertices
            .resize(self.vertices.len() + (count * QUAD_VERTICES) as usize, Vec2::ZERO);
        offset
    }

    fn write_quad(&mut self, vertex_offset: u32, rect: Rect2D) {
        let offset = vertex_offset as usize;
        self.vertices[offset..offset + QUAD_VERTICES as usize].copy_from_slice(&rect.corners());
    }

    /// Append the four screen-space corners of `rect`. Returns the vertex
    /// offset and the mean depth of the corners.
    fn project_quad(&mut self, rect: Rect2D) -> (u32, f32) {
        let offset = self.vertices.len() as u32;
        let mut z = 0.0;
        for corner in rect.corners() {
            let p = if self.render_3d {
                let lifted = map_3d(&self.m3d, corner);
                z += lifted.z;
                map_2d(&self.m2d, project_2d(lifted, self.far_plane))
            } else {
                map_2d(&self.m2d, corner)
            };
            self.vertices.push(p);
        }
        (offset, z / QUAD_VERTICES as f32)
    }
}
