//! Handle remapping for collapsing and expanding nodes.
//!
//! While a node is collapsed its attribute handles are hidden, so every edge
//! touching it is drawn from a single placeholder handle per side. The real
//! handle is parked in the edge's data and put back on expand.

use super::graph::{Edge, NodeId};

pub const OUTPUT_COLLAPSED: &str = "output-collapsed";
pub const INPUT_COLLAPSED: &str = "input-collapsed";

pub fn is_placeholder(handle: Option<&str>) -> bool {
    matches!(handle, Some(OUTPUT_COLLAPSED) | Some(INPUT_COLLAPSED))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Source,
    Target,
}

impl Side {
    pub fn placeholder(self) -> &'static str {
        match self {
            Side::Source => OUTPUT_COLLAPSED,
            Side::Target => INPUT_COLLAPSED,
        }
    }

    pub fn node_of(self, edge: &Edge) -> &NodeId {
        match self {
            Side::Source => &edge.source,
            Side::Target => &edge.target,
        }
    }

    pub fn handle_of(self, edge: &Edge) -> &Option<String> {
        match self {
            Side::Source => &edge.source_handle,
            Side::Target => &edge.target_handle,
        }
    }

    pub fn recorded_of(self, edge: &Edge) -> &Option<Option<String>> {
        match self {
            Side::Source => &edge.data.original_source_handle,
            Side::Target => &edge.data.original_target_handle,
        }
    }

    fn slots_mut(self, edge: &mut Edge) -> (&mut Option<String>, &mut Option<Option<String>>) {
        match self {
            Side::Source => (&mut edge.source_handle, &mut edge.data.original_source_handle),
            Side::Target => (&mut edge.target_handle, &mut edge.data.original_target_handle),
        }
    }
}

/// Build the re-routed copy of `edge` for `node_id` switching to `collapsed`.
///
/// Both sides are handled independently, so an edge between two collapsed
/// nodes carries both placeholders. Collapsing twice keeps the first recorded
/// handle; expanding without a record leaves the handle alone.
pub fn remap_edge(edge: &Edge, node_id: &str, collapsed: bool) -> Edge {
    let mut out = edge.clone();
    for side in [Side::Source, Side::Target] {
        if side.node_of(edge) != node_id {
            continue;
        }
        let (live, recorded) = side.slots_mut(&mut out);
        if collapsed {
            if recorded.is_none() {
                // A placeholder here means there was no real handle to begin with.
                let real = live.take().filter(|h| !is_placeholder(Some(h.as_str())));
                *recorded = Some(real);
            }
            *live = Some(side.placeholder().to_string());
        } else if let Some(real) = recorded.take() {
            *live = real;
        }
    }
    out
}

pub fn remap_edges(edges: &[Edge], node_id: &str, collapsed: bool) -> Vec<Edge> {
    edges
        .iter()
        .map(|e| if e.touches(node_id) { remap_edge(e, node_id, collapsed) } else { e.clone() })
        .collect()
}
