use crate::math::{color_matrix, Mat4, Rect2D, Vec2, Vec4};
use crate::renderer::TextureId;

/// Discriminant of a [`NodeKind`], used for counting and diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeType {
    Root,
    Transform,
    Opacity,
    ColorFilter,
    Blur,
    Shadow,
    Rectangle,
    Texture,
}

/// Kind-specific parameters of a node. The kind is fixed at creation.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    /// Plain grouping node with no drawing of its own
    Root,
    Transform(TransformNode),
    Opacity(OpacityNode),
    ColorFilter(ColorFilterNode),
    Blur(BlurNode),
    Shadow(ShadowNode),
    Rectangle(RectangleNode),
    Texture(TextureNode),
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Root => NodeType::Root,
            NodeKind::Transform(_) => NodeType::Transform,
            NodeKind::Opacity(_) => NodeType::Opacity,
            NodeKind::ColorFilter(_) => NodeType::ColorFilter,
            NodeKind::Blur(_) => NodeType::Blur,
            NodeKind::Shadow(_) => NodeType::Shadow,
            NodeKind::Rectangle(_) => NodeType::Rectangle,
            NodeKind::Texture(_) => NodeType::Texture,
        }
    }

    /// Whether the node produces a quad of its own.
    pub fn is_drawable(&self) -> bool {
        matches!(self, NodeKind::Rectangle(_) | NodeKind::Texture(_))
    }
}

/// Applies `matrix` to its subtree.
///
/// A positive `projection_depth` makes the node the root of a projection
/// group: descendants are composed in 3D and perspective-projected with the
/// depth as far plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformNode {
    pub matrix: Mat4,
    pub projection_depth: f32,
}

impl TransformNode {
    pub fn new(matrix: Mat4) -> Self {
        Self {
            matrix,
            projection_depth: 0.0,
        }
    }

    pub fn with_projection_depth(mut self, depth: f32) -> Self {
        self.projection_depth = depth;
        self
    }
}

impl Default for TransformNode {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OpacityNode {
    pub opacity: f32,
}

impl OpacityNode {
    pub fn new(opacity: f32) -> Self {
        Self { opacity }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorFilterNode {
    pub color_matrix: Mat4,
}

impl ColorFilterNode {
    pub fn new(color_matrix: Mat4) -> Self {
        Self { color_matrix }
    }
}

impl Default for ColorFilterNode {
    fn default() -> Self {
        Self::new(color_matrix::saturation(1.0))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlurNode {
    pub radius: u32,
}

impl BlurNode {
    pub fn new(radius: u32) -> Self {
        Self { radius }
    }
}

/// Draws a blurred, tinted copy of the subtree at `offset` beneath the
/// subtree itself.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadowNode {
    pub radius: u32,
    pub offset: Vec2,
    pub color: Vec4,
}

impl ShadowNode {
    pub fn new(radius: u32, offset: Vec2, color: Vec4) -> Self {
        Self {
            radius,
            offset,
            color,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RectangleNode {
    pub geometry: Rect2D,
    /// Straight (non-premultiplied) RGBA
    pub color: Vec4,
}

impl RectangleNode {
    pub fn new(geometry: Rect2D, color: Vec4) -> Self {
        Self { geometry, color }
    }
}

/// Draws `texture` stretched over `geometry`. Nothing is drawn while the
/// texture is unset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextureNode {
    pub geometry: Rect2D,
    pub texture: Option<TextureId>,
}

impl TextureNode {
    pub fn new(geometry: Rect2D, texture: Option<TextureId>) -> Self {
        Self { geometry, texture }
    }
}
