//! Retained scene graph.
//!
//! Nodes live in a single arena of tagged-variant slots addressed by
//! [`NodeId`]. Each id carries a generation so a stale id pointing at a
//! reused slot is detected instead of silently aliasing the new node.
//!
//! The tree contract:
//! - children are ordered; order is paint order
//! - a node has at most one parent and the graph has no cycles
//! - destroying a node destroys its whole subtree
//!
//! Wrong-kind access (asking a rectangle for its color matrix) and use of a
//! stale id are caller bugs and panic.

mod node;

pub use node::{
    BlurNode, ColorFilterNode, NodeKind, NodeType, OpacityNode, RectangleNode, ShadowNode,
    TextureNode, TransformNode,
};

use crate::math::{Mat4, Rect2D, Vec2, Vec4};
use crate::renderer::TextureId;

/// Identifier of a node in a [`Scene`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    /// Slot index, dense over the arena's capacity.
    pub fn index(self) -> usize {
        self.index as usize
    }
}

#[derive(Debug)]
pub struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    /// What this node is, with its parameters.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Parent node, `None` while detached or for the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in paint order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Arena owning every node of a scene.
#[derive(Default)]
pub struct Scene {
    slots: Vec<Slot>,
    free_indices: Vec<u32>,
    root: Option<NodeId>,
    len: usize,
}

impl Scene {
    /// An empty scene without a root.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached node.
    pub fn create(&mut self, kind: NodeKind) -> NodeId {
        let node = Node {
            kind,
            parent: None,
            children: Vec::new(),
        };
        self.len += 1;

        if let Some(index) = self.free_indices.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.node = Some(node);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId {
            index,
            generation: 0,
        }
    }

    /// Create a [`NodeKind::Root`] node and make it the scene root.
    pub fn create_root(&mut self) -> NodeId {
        let id = self.create(NodeKind::Root);
        self.set_root(Some(id));
        id
    }

    /// Create a detached transform node.
    pub fn create_transform(&mut self, matrix: Mat4) -> NodeId {
        self.create(NodeKind::Transform(TransformNode::new(matrix)))
    }

    /// Create a detached transform node that starts a projection group at `depth`.
    pub fn create_projection(&mut self, matrix: Mat4, depth: f32) -> NodeId {
        self.create(NodeKind::Transform(
            TransformNode::new(matrix).with_projection_depth(depth),
        ))
    }

    /// Create a detached opacity node.
    pub fn create_opacity(&mut self, opacity: f32) -> NodeId {
        self.create(NodeKind::Opacity(OpacityNode::new(opacity)))
    }

    /// Create a detached color filter node.
    pub fn create_color_filter(&mut self, color_matrix: Mat4) -> NodeId {
        self.create(NodeKind::ColorFilter(ColorFilterNode::new(color_matrix)))
    }

    /// Create a detached blur node.
    pub fn create_blur(&mut self, radius: u32) -> NodeId {
        self.create(NodeKind::Blur(BlurNode::new(radius)))
    }

    /// Create a detached drop shadow node.
    pub fn create_shadow(&mut self, radius: u32, offset: Vec2, color: Vec4) -> NodeId {
        self.create(NodeKind::Shadow(ShadowNode::new(radius, offset, color)))
    }

    /// Create a detached solid rectangle.
    pub fn create_rectangle(&mut self, geometry: Rect2D, color: Vec4) -> NodeId {
        self.create(NodeKind::Rectangle(RectangleNode::new(geometry, color)))
    }

    /// Create a detached textured rectangle. Without a texture it draws nothing.
    pub fn create_texture(&mut self, geometry: Rect2D, texture: Option<TextureId>) -> NodeId {
        self.create(NodeKind::Texture(TextureNode::new(geometry, texture)))
    }

    /// Node frames are rendered from.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Replace the scene root. Panics if `root` has a parent.
    pub fn set_root(&mut self, root: Option<NodeId>) {
        if let Some(id) = root {
            assert!(
                self.node(id).parent.is_none(),
                "scene root {:?} must not have a parent",
                id
            );
        }
        self.root = root;
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the scene has no live nodes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots ever allocated; every live [`NodeId::index`] is below it.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Whether `id` refers to a live node of this scene.
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// The node `id` refers to, or `None` when it is stale.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    /// Like [`Scene::get`], panicking on stale ids.
    pub fn node(&self, id: NodeId) -> &Node {
        match self.get(id) {
            Some(node) => node,
            None => panic!("stale or foreign node id {:?}", id),
        }
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        match self.get_mut(id) {
            Some(node) => node,
            None => panic!("stale or foreign node id {:?}", id),
        }
    }

    /// Kind and parameters of `id`.
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    /// Kind tag of `id`.
    pub fn node_type(&self, id: NodeId) -> NodeType {
        self.node(id).kind.node_type()
    }

    /// Parent of `id`.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Children of `id` in paint order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Append `child` as the last child of `parent`.
    ///
    /// Panics if `child` already has a parent or if the append would
    /// create a cycle.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        assert!(
            self.node(child).parent.is_none(),
            "node {:?} already has a parent",
            child
        );
        assert!(
            Some(child) != self.root,
            "the scene root {:?} cannot become a child",
            child
        );
        assert!(
            !self.is_ancestor_or_self(child, parent),
            "appending {:?} under {:?} would create a cycle",
            child,
            parent
        );

        self.node_mut(parent).children.push(child);
        self.node_mut(child).parent = Some(parent);
    }

    /// Append several children in order. Returns `parent` for chaining.
    pub fn append_children(
        &mut self,
        parent: NodeId,
        children: impl IntoIterator<Item = NodeId>,
    ) -> NodeId {
        for child in children {
            self.append(parent, child);
        }
        parent
    }

    /// Detach `child` from `parent`. The child and its subtree stay alive.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        assert_eq!(
            self.node(child).parent,
            Some(parent),
            "node {:?} is not a child of {:?}",
            child,
            parent
        );
        self.node_mut(parent).children.retain(|&c| c != child);
        self.node_mut(child).parent = None;
    }

    /// Destroy `id` and every node below it. Stale ids are ignored.
    pub fn destroy(&mut self, id: NodeId) {
        let Some(parent) = self.get(id).map(|n| n.parent) else {
            return;
        };
        if let Some(parent) = parent {
            self.node_mut(parent).children.retain(|&c| c != id);
        }
        if self.root == Some(id) {
            self.root = None;
        }

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let slot = &mut self.slots[current.index as usize];
            if let Some(node) = slot.node.take() {
                stack.extend(node.children);
                self.free_indices.push(current.index);
                self.len -= 1;
            }
        }
    }

    /// Depth-first, pre-order traversal starting at (and including) `root`.
    pub fn traverse(&self, root: NodeId) -> DepthFirst<'_> {
        DepthFirst {
            scene: self,
            stack: vec![root],
        }
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, mut id: NodeId) -> bool {
        loop {
            if id == ancestor {
                return true;
            }
            match self.node(id).parent {
                Some(parent) => id = parent,
                None => return false,
            }
        }
    }

    // Kind-specific setters

    /// Valid on transform nodes.
    pub fn set_matrix(&mut self, id: NodeId, matrix: Mat4) {
        self.transform_mut(id).matrix = matrix;
    }

    /// Valid on transform nodes. A depth of 0 ends the projection group.
    pub fn set_projection_depth(&mut self, id: NodeId, depth: f32) {
        self.transform_mut(id).projection_depth = depth;
    }

    /// Valid on opacity nodes.
    pub fn set_opacity(&mut self, id: NodeId, opacity: f32) {
        self.opacity_mut(id).opacity = opacity;
    }

    /// Valid on color filter nodes.
    pub fn set_color_matrix(&mut self, id: NodeId, color_matrix: Mat4) {
        self.color_filter_mut(id).color_matrix = color_matrix;
    }

    /// Valid on blur and shadow nodes.
    pub fn set_blur_radius(&mut self, id: NodeId, radius: u32) {
        match &mut self.node_mut(id).kind {
            NodeKind::Blur(blur) => blur.radius = radius,
            NodeKind::Shadow(shadow) => shadow.radius = radius,
            other => wrong_kind(id, "Blur or Shadow", other),
        }
    }

    /// Valid on shadow nodes.
    pub fn set_shadow_offset(&mut self, id: NodeId, offset: Vec2) {
        self.shadow_mut(id).offset = offset;
    }

    /// Valid on shadow nodes.
    pub fn set_shadow_color(&mut self, id: NodeId, color: Vec4) {
        self.shadow_mut(id).color = color;
    }

    /// Valid on rectangle and texture nodes.
    pub fn set_geometry(&mut self, id: NodeId, geometry: Rect2D) {
        match &mut self.node_mut(id).kind {
            NodeKind::Rectangle(rect) => rect.geometry = geometry,
            NodeKind::Texture(texture) => texture.geometry = geometry,
            other => wrong_kind(id, "Rectangle or Texture", other),
        }
    }

    /// Valid on rectangle nodes.
    pub fn set_color(&mut self, id: NodeId, color: Vec4) {
        self.rectangle_mut(id).color = color;
    }

    /// Valid on texture nodes.
    pub fn set_texture(&mut self, id: NodeId, texture: Option<TextureId>, geometry: Rect2D) {
        let node = self.texture_mut(id);
        node.texture = texture;
        node.geometry = geometry;
    }
}

fn wrong_kind(id: NodeId, expected: &str, found: &NodeKind) -> ! {
    panic!(
        "node {:?} is a {:?} node, expected {}",
        id,
        found.node_type(),
        expected
    )
}

macro_rules! kind_accessors {
    ($($get:ident, $get_mut:ident => $variant:ident($ty:ty);)*) => {
        impl Scene {
            $(
                #[doc = concat!("Parameters of a ", stringify!($variant), " node. Panics on any other kind.")]
                pub fn $get(&self, id: NodeId) -> &$ty {
                    match &self.node(id).kind {
                        NodeKind::$variant(inner) => inner,
                        other => wrong_kind(id, stringify!($variant), other),
                    }
                }

                #[doc = concat!("Mutable parameters of a ", stringify!($variant), " node.")]
                pub fn $get_mut(&mut self, id: NodeId) -> &mut $ty {
                    match &mut self.node_mut(id).kind {
                        NodeKind::$variant(inner) => inner,
                        other => wrong_kind(id, stringify!($variant), other),
                    }
                }
            )*
        }
    };
}

kind_accessors! {
    transform, transform_mut => Transform(TransformNode);
    opacity, opacity_mut => Opacity(OpacityNode);
    color_filter, color_filter_mut => ColorFilter(ColorFilterNode);
    blur, blur_mut => Blur(BlurNode);
    shadow, shadow_mut => Shadow(ShadowNode);
    rectangle, rectangle_mut => Rectangle(RectangleNode);
    texture, texture_mut => Texture(TextureNode);
}

/// Pre-order iterator returned by [`Scene::traverse`].
pub struct DepthFirst<'a> {
    scene: &'a Scene,
    stack: Vec<NodeId>,
}

impl Iterator for DepthFirst<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.scene.children(id).iter().rev().copied());
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect() -> Rect2D {
        Rect2D::from_xywh(0.0, 0.0, 10.0, 10.0)
    }

    #[test]
    fn test_create_and_append() {
        let mut scene = Scene::new();
        let root = scene.create_root();
        let a = scene.create_rectangle(rect(), Vec4::ONE);
        let b = scene.create_opacity(0.5);

        scene.append_children(root, [a, b]);

        assert_eq!(scene.children(root), &[a, b]);
        assert_eq!(scene.parent(a), Some(root));
        assert_eq!(scene.len(), 3);
        assert_eq!(scene.node_type(b), NodeType::Opacity);
    }

    #[test]
    fn test_traverse_is_pre_order() {
        let mut scene = Scene::new();
        let root = scene.create_root();
        let t = scene.create_transform(Mat4::IDENTITY);
        let r1 = scene.create_rectangle(rect(), Vec4::ONE);
        let r2 = scene.create_rectangle(rect(), Vec4::ONE);
        let r3 = scene.create_rectangle(rect(), Vec4::ONE);

        scene.append_children(t, [r1, r2]);
        scene.append_children(root, [t, r3]);

        let order: Vec<_> = scene.traverse(root).collect();
        assert_eq!(order, vec![root, t, r1, r2, r3]);
    }

    #[test]
    fn test_destroy_is_recursive() {
        let mut scene = Scene::new();
        let root = scene.create_root();
        let t = scene.create_transform(Mat4::IDENTITY);
        let r = scene.create_rectangle(rect(), Vec4::ONE);
        scene.append(t, r);
        scene.append(root, t);

        scene.destroy(t);

        assert!(!scene.contains(t));
        assert!(!scene.contains(r));
        assert!(scene.children(root).is_empty());
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn test_stale_id_detected_after_reuse() {
        let mut scene = Scene::new();
        let a = scene.create_opacity(1.0);
        scene.destroy(a);
        let b = scene.create_blur(3);

        assert_eq!(a.index(), b.index());
        assert!(!scene.contains(a));
        assert!(scene.contains(b));
    }

    #[test]
    fn test_remove_child_keeps_subtree() {
        let mut scene = Scene::new();
        let root = scene.create_root();
        let t = scene.create_transform(Mat4::IDENTITY);
        let r = scene.create_rectangle(rect(), Vec4::ONE);
        scene.append(t, r);
        scene.append(root, t);

        scene.remove_child(root, t);

        assert_eq!(scene.parent(t), None);
        assert_eq!(scene.children(t), &[r]);
        // Detached nodes can be appended again.
        scene.append(root, t);
        assert_eq!(scene.children(root), &[t]);
    }

    #[test]
    fn test_kind_setters() {
        let mut scene = Scene::new();
        let shadow = scene.create_shadow(2, Vec2::ZERO, Vec4::ONE);
        scene.set_blur_radius(shadow, 8);
        scene.set_shadow_offset(shadow, Vec2::new(3.0, 4.0));
        assert_eq!(scene.shadow(shadow).radius, 8);
        assert_eq!(scene.shadow(shadow).offset, Vec2::new(3.0, 4.0));

        let tex = scene.create_texture(rect(), None);
        let bounds = Rect2D::from_xywh(5.0, 5.0, 20.0, 20.0);
        scene.set_geometry(tex, bounds);
        assert_eq!(scene.texture(tex).geometry, bounds);
    }

    #[test]
    #[should_panic(expected = "already has a parent")]
    fn test_append_twice_panics() {
        let mut scene = Scene::new();
        let a = scene.create_root();
        let b = scene.create_opacity(1.0);
        let c = scene.create_opacity(1.0);
        scene.append(a, c);
        scene.append(b, c);
    }

    #[test]
    #[should_panic(expected = "cycle")]
    fn test_append_cycle_panics() {
        let mut scene = Scene::new();
        let a = scene.create_opacity(1.0);
        let b = scene.create_opacity(1.0);
        scene.append(a, b);
        scene.append(b, a);
    }

    #[test]
    #[should_panic(expected = "expected ColorFilter")]
    fn test_wrong_kind_panics() {
        let mut scene = Scene::new();
        let r = scene.create_rectangle(rect(), Vec4::ONE);
        scene.set_color_matrix(r, Mat4::IDENTITY);
    }
}
