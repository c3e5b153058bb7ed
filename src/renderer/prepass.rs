//! First traversal of a frame.
//!
//! Counts nodes per kind so the builder can size its storage up front, and
//! decides where projection groups start and which subtrees get flattened
//! into layers. Decisions are recorded per node and looked up by the builder
//! during its own traversal.

use crate::math::is_out_of_plane;
use crate::scene::{NodeId, NodeKind, Scene};

/// Per-kind counters gathered by the prepass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PrepassStats {
    pub rectangle_nodes: u32,
    pub texture_nodes: u32,
    pub transform_nodes: u32,
    pub transform_nodes_3d: u32,
    pub layered_nodes: u32,
    pub projection_groups: u32,
    /// Quads beyond one per element (shadow offsets)
    pub additional_quads: u32,
}

impl PrepassStats {
    pub fn element_count(&self) -> usize {
        (self.rectangle_nodes + self.texture_nodes + self.layered_nodes + self.projection_groups)
            as usize
    }

    pub fn quad_count(&self) -> usize {
        (self.rectangle_nodes + self.texture_nodes + self.layered_nodes + self.additional_quads)
            as usize
    }
}

/// How a node roots a group of elements.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroupInfo {
    /// Elements inside the group, excluding the root's own element
    pub group_size: u32,
    /// Members are depth-sorted. Set on projection roots and on layers
    /// inside a projection group.
    pub projection: bool,
    /// The subtree is flattened into an offscreen texture
    pub layered: bool,
    /// Far plane for perspective projection; zero outside projection roots
    pub far_plane: f32,
}

#[derive(Clone, Copy, Default)]
struct Subtree {
    elements: u32,
    out_of_plane: bool,
    layered: bool,
}

pub struct Prepass {
    stats: PrepassStats,
    groups: Vec<Option<GroupInfo>>,
    default_far_plane: f32,
}

impl Prepass {
    pub fn run(scene: &Scene, root: NodeId, default_far_plane: f32) -> Self {
        let mut prepass = Self {
            stats: PrepassStats::default(),
            groups: vec![None; scene.capacity()],
            default_far_plane,
        };
        prepass.visit(scene, root, false);
        log::trace!("Prepass: {:?}", prepass.stats);
        prepass
    }

    pub fn stats(&self) -> &PrepassStats {
        &self.stats
    }

    /// Group decision for `id`, if it roots a layer or projection group.
    pub fn group(&self, id: NodeId) -> Option<GroupInfo> {
        self.groups.get(id.index()).copied().flatten()
    }

    fn visit(&mut self, scene: &Scene, id: NodeId, in_projection: bool) -> Subtree {
        let kind = scene.kind(id);
        let mut here = Subtree::default();
        let mut projection_far_plane = None;

        match kind {
            NodeKind::Transform(transform) => {
                self.stats.transform_nodes += 1;
                let out_of_plane = is_out_of_plane(&transform.matrix);
                let explicit = transform.projection_depth > 0.0;
                if out_of_plane || explicit {
                    self.stats.transform_nodes_3d += 1;
                    here.out_of_plane = true;
                }
                if !in_projection && (out_of_plane || explicit) {
                    projection_far_plane = Some(if explicit {
                        transform.projection_depth
                    } else {
                        self.default_far_plane
                    });
                }
            }
            NodeKind::Rectangle(_) => self.stats.rectangle_nodes += 1,
            NodeKind::Texture(_) => self.stats.texture_nodes += 1,
            _ => {}
        }

        let children_in_projection = in_projection || projection_far_plane.is_some();
        let mut below = Subtree::default();
        for &child in scene.children(id) {
            let child = self.visit(scene, child, children_in_projection);
            below.elements += child.elements;
            below.out_of_plane |= child.out_of_plane;
            below.layered |= child.layered;
        }

        here.out_of_plane |= below.out_of_plane;
        here.layered = below.layered;
        here.elements = below.elements;

        // Nothing to flatten or sort in an empty subtree.
        if below.elements == 0 {
            if kind.is_drawable() {
                here.elements += 1;
            }
            return here;
        }

        let layered = match kind {
            // Folding opacity into each element is exact unless overlapping
            // 3D content or nested effects need the group flattened first.
            NodeKind::Opacity(opacity) => {
                opacity.opacity < 1.0 && (below.out_of_plane || below.layered)
            }
            NodeKind::ColorFilter(_) | NodeKind::Blur(_) | NodeKind::Shadow(_) => true,
            _ => false,
        };

        if layered {
            self.stats.layered_nodes += 1;
            if matches!(kind, NodeKind::Shadow(_)) {
                self.stats.additional_quads += 1;
            }
            self.groups[id.index()] = Some(GroupInfo {
                group_size: below.elements,
                projection: in_projection,
                layered: true,
                far_plane: 0.0,
            });
            here.layered = true;
            here.elements += 1;
        } else if let Some(far_plane) = projection_far_plane {
            self.stats.projection_groups += 1;
            self.groups[id.index()] = Some(GroupInfo {
                group_size: below.elements,
                projection: true,
                layered: false,
                far_plane,
            });
            here.elements += 1;
        } else if kind.is_drawable() {
            here.elements += 1;
        }

        here
    }
}
