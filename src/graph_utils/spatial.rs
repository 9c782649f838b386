//! Spatial index for viewport culling.
//!
//! Nodes are indexed by their world-space bounding boxes so the renderer can
//! ask which nodes fall inside (or near) the visible area with an R*-tree range
//! query instead of scanning every node.

use std::collections::BTreeSet;

use rstar::{AABB, RTree, RTreeObject};

use super::graph::{Node, NodeId, Viewport};

pub const DEFAULT_OVERSCAN: f64 = 500.0;

struct IndexedNode {
    envelope: AABB<[f64; 2]>,
    id: NodeId,
}

impl RTreeObject for IndexedNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Pixel size of the host's drawing surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisibleSize {
    pub width: f64,
    pub height: f64,
}

impl VisibleSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// R*-tree over node bounding boxes, rebuilt wholesale from a node snapshot.
pub struct SpatialIndex {
    tree: RTree<IndexedNode>,
    default_footprint: (f64, f64),
}

impl SpatialIndex {
    /// `default_footprint` sizes nodes the renderer has not measured.
    pub fn new(default_footprint: (f64, f64)) -> Self {
        Self { tree: RTree::new(), default_footprint }
    }

    pub fn build(nodes: &[Node], default_footprint: (f64, f64)) -> Self {
        let mut index = Self::new(default_footprint);
        index.rebuild(nodes);
        index
    }

    pub fn rebuild(&mut self, nodes: &[Node]) {
        let entries: Vec<_> = nodes
            .iter()
            .map(|node| {
                let (w, h) = node.footprint(self.default_footprint);
                IndexedNode {
                    envelope: AABB::from_corners(
                        [node.position.x, node.position.y],
                        [node.position.x + w, node.position.y + h],
                    ),
                    id: node.id.clone(),
                }
            })
            .collect();
        self.tree = RTree::bulk_load(entries);
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Ids of nodes intersecting the visible world rectangle grown by
    /// `overscan` on every side. A zero (or otherwise unusable) zoom yields
    /// an empty set.
    pub fn query(&self, viewport: &Viewport, visible: VisibleSize, overscan: f64) -> BTreeSet<NodeId> {
        if viewport.zoom <= 0.0 || !viewport.zoom.is_finite() {
            return BTreeSet::new();
        }
        let min_x = -viewport.x / viewport.zoom - overscan;
        let min_y = -viewport.y / viewport.zoom - overscan;
        let max_x = (-viewport.x + visible.width) / viewport.zoom + overscan;
        let max_y = (-viewport.y + visible.height) / viewport.zoom + overscan;
        let area = AABB::from_corners([min_x, min_y], [max_x, max_y]);
        self.tree
            .locate_in_envelope_intersecting(&area)
            .map(|n| n.id.clone())
            .collect()
    }
}
