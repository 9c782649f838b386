use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::collapse::{self, Side};
use super::connect::{self, ConnectRules, Connection};
use super::errors::{ConnectRejection, InvariantViolation, ValidationError};

// Basic type aliases for clarity
pub type NodeId = String;
pub type EdgeId = String;

pub const DEFAULT_NODE_TYPE: &str = "custom";
pub const DEFAULT_EDGE_TYPE: &str = "custom";
pub const DEFAULT_NODE_DESCRIPTION: &str = "This is a new node.";

/// Screen point used to place new nodes when the host has not reported the
/// size of its drawing surface yet.
pub const FALLBACK_VIEW_CENTRE: (f64, f64) = (250.0, 150.0);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleKind {
    Input,
    Output,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    pub value: String,
    pub visible: bool,
    pub connectable: bool,
    #[serde(rename = "type")]
    pub kind: HandleKind,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>, kind: HandleKind) -> Self {
        Self { key: key.into(), value: value.into(), visible: true, connectable: true, kind }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handle {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: HandleKind,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub handles: Vec<Handle>,
    #[serde(default)]
    pub collapsed: bool,
}

impl NodeData {
    pub fn new(name: impl Into<String>, description: impl Into<String>, attributes: Vec<Attribute>) -> Self {
        let handles = derive_handles(&attributes);
        Self { name: name.into(), description: description.into(), attributes, handles, collapsed: false }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type", default = "default_node_type")]
    pub node_type: String,
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    pub data: NodeData,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub selected: bool,
}

impl Node {
    pub fn handle(&self, id: &str) -> Option<&Handle> {
        self.data.handles.iter().find(|h| h.id == id)
    }

    /// Width/height as measured by the renderer, else the given fallback.
    pub fn footprint(&self, fallback: (f64, f64)) -> (f64, f64) {
        (self.width.unwrap_or(fallback.0), self.height.unwrap_or(fallback.1))
    }
}

fn default_node_type() -> String {
    DEFAULT_NODE_TYPE.to_string()
}

/// Bookkeeping carried by an edge while one of its endpoints is collapsed.
///
/// The outer `Option` says whether a handle was recorded at all; the inner one
/// is the recorded handle, which may itself be absent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeData {
    #[serde(default, deserialize_with = "recorded_handle", skip_serializing_if = "Option::is_none")]
    pub original_source_handle: Option<Option<String>>,
    #[serde(default, deserialize_with = "recorded_handle", skip_serializing_if = "Option::is_none")]
    pub original_target_handle: Option<Option<String>>,
}

impl EdgeData {
    pub fn is_empty(&self) -> bool {
        self.original_source_handle.is_none() && self.original_target_handle.is_none()
    }
}

// A present-but-null field means "recorded, and the recorded handle was absent".
fn recorded_handle<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub edge_type: Option<String>,
    #[serde(default, skip_serializing_if = "EdgeData::is_empty")]
    pub data: EdgeData,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub selected: bool,
}

impl Edge {
    /// Created by a connect gesture and never touched by the edge editor: no
    /// type, and either no label or the generated `Edge N` one.
    pub fn is_provisional(&self) -> bool {
        self.edge_type.is_none() && (self.label.is_empty() || is_generated_label(&self.label))
    }

    pub fn touches(&self, node: &str) -> bool {
        self.source == node || self.target == node
    }
}

fn is_generated_label(label: &str) -> bool {
    label
        .strip_prefix("Edge ")
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// Label/type change coming back from the edge editor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EdgePatch {
    pub label: String,
    pub edge_type: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, zoom: 1.0 }
    }
}

impl Viewport {
    /// Every component finite and the zoom not negative.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let finite = self.x.is_finite() && self.y.is_finite() && self.zoom.is_finite();
        if !finite || self.zoom < 0.0 {
            return Err(ValidationError::InvalidViewport);
        }
        Ok(())
    }

    /// World coordinates of a screen point. A zero zoom is treated as 1.
    pub fn screen_to_world(&self, sx: f64, sy: f64) -> Position {
        let zoom = if self.zoom > 0.0 { self.zoom } else { 1.0 };
        Position::new((sx - self.x) / zoom, (sy - self.y) / zoom)
    }
}

/// World position at the centre of the visible area.
pub fn view_centre(viewport: &Viewport, visible: Option<(f64, f64)>) -> Position {
    let (cx, cy) = match visible {
        Some((w, h)) => (w / 2.0, h / 2.0),
        None => FALLBACK_VIEW_CENTRE,
    };
    viewport.screen_to_world(cx, cy)
}

/// Handles are exactly the connectable attributes, in attribute order.
pub fn derive_handles(attributes: &[Attribute]) -> Vec<Handle> {
    attributes
        .iter()
        .filter(|a| a.connectable)
        .map(|a| Handle { id: a.key.clone(), kind: a.kind })
        .collect()
}

/// Checks that do not depend on the rest of the graph.
pub fn validate_node_data(data: &NodeData) -> Result<(), ValidationError> {
    if data.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    let mut seen = HashSet::new();
    for attr in &data.attributes {
        if attr.key.trim().is_empty() {
            return Err(ValidationError::EmptyAttributeKey);
        }
        if !seen.insert(attr.key.as_str()) {
            return Err(ValidationError::DuplicateAttributeKey(attr.key.clone()));
        }
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RemovalSummary {
    pub nodes: usize,
    pub edges: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NodeMove {
    pub id: NodeId,
    pub before: Position,
    pub after: Position,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Neighborhood {
    pub nodes: BTreeSet<NodeId>,
    pub edges: BTreeSet<EdgeId>,
}

/// Owner of every node and edge. All mutation goes through its methods, each of
/// which either applies completely or leaves the graph untouched.
#[derive(Clone, Debug, Default)]
pub struct GraphDatabase {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    viewport: Viewport,
    // Per ordered (source, target) pair; only ever grows during a session.
    pair_counters: HashMap<(NodeId, NodeId), u64>,
    revision: u64,
}

impl GraphDatabase {
    // Instantiate a new, empty graph database
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Bumped once per successful mutation; read-side views compare it to
    /// decide whether to recompute.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn get_edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn find_node_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.data.name == name)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn selected_node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().filter(|n| n.selected).map(|n| n.id.clone()).collect()
    }

    fn node_index(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    fn commit(&mut self) {
        self.revision += 1;
        debug_assert!(
            self.check_invariants().is_empty(),
            "graph invariants broken: {:?}",
            self.check_invariants()
        );
    }

    /// Add a node with default data. Without a position it lands in the centre
    /// of the current view.
    pub fn add_node(&mut self, position: Option<Position>) -> Node {
        let id = Uuid::new_v4().to_string();
        let name = self.unique_default_name(&id);
        let position = position.unwrap_or_else(|| view_centre(&self.viewport, None));
        let node = Node {
            id,
            node_type: DEFAULT_NODE_TYPE.to_string(),
            position,
            width: None,
            height: None,
            data: NodeData::new(name, DEFAULT_NODE_DESCRIPTION, Vec::new()),
            selected: false,
        };
        self.nodes.push(node.clone());
        self.commit();
        node
    }

    fn unique_default_name(&self, id: &str) -> String {
        let compact: String = id.chars().filter(|c| *c != '-').collect();
        (4..=compact.len())
            .map(|len| format!("Node-{}", &compact[..len]))
            .find(|candidate| self.find_node_by_name(candidate).is_none())
            .unwrap_or_else(|| format!("Node-{}-{}", compact, self.nodes.len()))
    }

    /// Replace a node's data wholesale, as the node editor does on save.
    ///
    /// Handles are re-derived from the attributes and the collapsed flag is kept
    /// from the current node. Edges whose endpoint handle no longer exists on
    /// this node are dropped.
    pub fn replace_node(&mut self, id: &str, data: NodeData) -> Result<(), ValidationError> {
        let idx = self.node_index(id).ok_or_else(|| ValidationError::UnknownNode(id.to_string()))?;
        if data.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.nodes.iter().any(|n| n.id != id && n.data.name == data.name) {
            return Err(ValidationError::DuplicateName(data.name));
        }
        validate_node_data(&data)?;

        let mut data = data;
        data.handles = derive_handles(&data.attributes);
        data.collapsed = self.nodes[idx].data.collapsed;

        let handle_ids: HashSet<&str> = data.handles.iter().map(|h| h.id.as_str()).collect();
        let edges: Vec<Edge> = self
            .edges
            .iter()
            .filter(|e| {
                (e.source != id || handle_survives(e, Side::Source, &handle_ids))
                    && (e.target != id || handle_survives(e, Side::Target, &handle_ids))
            })
            .cloned()
            .collect();
        let dropped = self.edges.len() - edges.len();
        if dropped > 0 {
            log::debug!("node {} lost {} edge(s) whose handle was removed", id, dropped);
        }

        self.nodes[idx].data = data;
        self.edges = edges;
        self.commit();
        Ok(())
    }

    /// Delete nodes and every edge touching them. Unknown ids are ignored.
    pub fn remove_nodes(&mut self, ids: &[NodeId]) -> RemovalSummary {
        let doomed: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let nodes_before = self.nodes.len();
        let edges_before = self.edges.len();
        self.nodes.retain(|n| !doomed.contains(n.id.as_str()));
        self.edges
            .retain(|e| !doomed.contains(e.source.as_str()) && !doomed.contains(e.target.as_str()));
        let summary = RemovalSummary {
            nodes: nodes_before - self.nodes.len(),
            edges: edges_before - self.edges.len(),
        };
        if summary != RemovalSummary::default() {
            self.commit();
        }
        summary
    }

    pub fn remove_edges(&mut self, ids: &[EdgeId]) -> usize {
        let doomed: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let before = self.edges.len();
        self.edges.retain(|e| !doomed.contains(e.id.as_str()));
        let removed = before - self.edges.len();
        if removed > 0 {
            self.commit();
        }
        removed
    }

    /// Create an edge from a connect gesture.
    ///
    /// Any provisional edge already joining the same ordered pair is replaced.
    /// The label carries a per-pair counter; the id is an independent uuid.
    pub fn add_edge(&mut self, candidate: &Connection, rules: ConnectRules) -> Result<Edge, ConnectRejection> {
        let (source, target) = connect::validate_connection(self, candidate, rules)?;

        let mut edges: Vec<Edge> = self
            .edges
            .iter()
            .filter(|e| !(e.source == source && e.target == target && e.is_provisional()))
            .cloned()
            .collect();
        let parallel = edges.iter().filter(|e| e.source == source && e.target == target).count() as u64;
        let key = (source.clone(), target.clone());
        let count = self.pair_counters.get(&key).copied().unwrap_or(0).max(parallel) + 1;

        let mut edge = Edge {
            id: Uuid::new_v4().to_string(),
            source: source.clone(),
            target: target.clone(),
            source_handle: candidate.source_handle.clone(),
            target_handle: candidate.target_handle.clone(),
            label: format!("Edge {}", count),
            edge_type: None,
            data: EdgeData::default(),
            selected: false,
        };
        // Keep the new edge routed like its siblings when an endpoint is collapsed.
        for node_id in [&source, &target] {
            if self.get_node(node_id).is_some_and(|n| n.data.collapsed) {
                edge = collapse::remap_edge(&edge, node_id, true);
            }
        }

        edges.push(edge.clone());
        self.edges = edges;
        self.pair_counters.insert(key, count);
        self.commit();
        Ok(edge)
    }

    pub fn replace_edge(&mut self, id: &str, patch: EdgePatch) -> Result<(), ValidationError> {
        let edge = self
            .edges
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| ValidationError::UnknownEdge(id.to_string()))?;
        edge.label = patch.label;
        edge.edge_type = patch.edge_type;
        self.commit();
        Ok(())
    }

    pub fn set_viewport(&mut self, viewport: Viewport) -> Result<(), ValidationError> {
        viewport.validate()?;
        self.viewport = viewport;
        self.commit();
        Ok(())
    }

    /// Clear `selected` on every node and edge.
    pub fn clear_transient_flags(&mut self) {
        if self.nodes.iter().all(|n| !n.selected) && self.edges.iter().all(|e| !e.selected) {
            return;
        }
        self.nodes.iter_mut().for_each(|n| n.selected = false);
        self.edges.iter_mut().for_each(|e| e.selected = false);
        self.commit();
    }

    /// Make exactly the given nodes and edges selected.
    pub fn set_selection(&mut self, node_ids: &[NodeId], edge_ids: &[EdgeId]) {
        let nodes: HashSet<&str> = node_ids.iter().map(String::as_str).collect();
        let edges: HashSet<&str> = edge_ids.iter().map(String::as_str).collect();
        let unchanged = self.nodes.iter().all(|n| n.selected == nodes.contains(n.id.as_str()))
            && self.edges.iter().all(|e| e.selected == edges.contains(e.id.as_str()));
        if unchanged {
            return;
        }
        for n in self.nodes.iter_mut() {
            n.selected = nodes.contains(n.id.as_str());
        }
        for e in self.edges.iter_mut() {
            e.selected = edges.contains(e.id.as_str());
        }
        self.commit();
    }

    /// Set absolute positions. Unknown ids are skipped; the returned diff lists
    /// only nodes that were found.
    pub fn move_nodes(&mut self, moves: &[(NodeId, Position)]) -> Vec<NodeMove> {
        let mut diff = Vec::with_capacity(moves.len());
        for (id, after) in moves {
            if let Some(node) = self.nodes.iter_mut().find(|n| &n.id == id) {
                diff.push(NodeMove { id: id.clone(), before: node.position, after: *after });
                node.position = *after;
            }
        }
        if !diff.is_empty() {
            self.commit();
        }
        diff
    }

    pub fn set_node_dimensions(&mut self, id: &str, width: f64, height: f64) -> Result<(), ValidationError> {
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| ValidationError::UnknownNode(id.to_string()))?;
        node.width = Some(width);
        node.height = Some(height);
        self.commit();
        Ok(())
    }

    /// Set the collapsed flag and re-route every incident edge. Returns whether
    /// the flag actually changed.
    pub fn set_collapsed(&mut self, id: &str, collapsed: bool) -> Result<bool, ValidationError> {
        let idx = self.node_index(id).ok_or_else(|| ValidationError::UnknownNode(id.to_string()))?;
        let changed = self.nodes[idx].data.collapsed != collapsed;
        let edges = collapse::remap_edges(&self.edges, id, collapsed);
        self.nodes[idx].data.collapsed = collapsed;
        self.edges = edges;
        self.commit();
        Ok(changed)
    }

    /// Swap in new node/edge snapshots wholesale (layout output).
    pub(crate) fn replace_snapshots(&mut self, nodes: Vec<Node>, edges: Vec<Edge>) {
        self.nodes = nodes;
        self.edges = edges;
        self.commit();
    }

    /// Replace the whole graph with loaded content after normalising it.
    ///
    /// Node data and the viewport get the same checks as interactive edits.
    /// Handles are re-derived, collapsed nodes are re-routed (idempotent), and
    /// the candidate must satisfy every invariant or nothing changes.
    pub fn load(&mut self, nodes: Vec<Node>, edges: Vec<Edge>, viewport: Option<Viewport>) -> Result<(), ValidationError> {
        if let Some(viewport) = &viewport {
            viewport.validate()?;
        }
        let mut nodes = nodes;
        for node in nodes.iter_mut() {
            validate_node_data(&node.data)?;
            node.data.handles = derive_handles(&node.data.attributes);
        }
        let mut edges = edges;
        for node in nodes.iter().filter(|n| n.data.collapsed) {
            edges = collapse::remap_edges(&edges, &node.id, true);
        }
        let candidate = GraphDatabase {
            nodes,
            edges,
            viewport: viewport.unwrap_or(self.viewport),
            pair_counters: HashMap::new(),
            revision: self.revision,
        };
        let violations = candidate.check_invariants();
        if let Some(first) = violations.first() {
            return Err(ValidationError::MalformedDocument(format!(
                "The loaded graph is inconsistent: {} ({} problem(s) found).",
                first,
                violations.len()
            )));
        }
        *self = candidate;
        self.commit();
        Ok(())
    }

    /// Neighbouring nodes (excluding `id` itself) and the edges joining them.
    pub fn neighbors(&self, id: &str) -> Neighborhood {
        let mut out = Neighborhood::default();
        for edge in self.edges.iter().filter(|e| e.touches(id)) {
            out.edges.insert(edge.id.clone());
            for end in [&edge.source, &edge.target] {
                if end != id {
                    out.nodes.insert(end.clone());
                }
            }
        }
        out
    }

    /// Every broken structural invariant. Empty for any graph built through the
    /// public operations.
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        let mut out = Vec::new();
        let mut names = HashSet::new();
        let mut by_id: HashMap<&str, &Node> = HashMap::new();
        for node in &self.nodes {
            if by_id.contains_key(node.id.as_str()) {
                out.push(InvariantViolation::DuplicateNodeId(node.id.clone()));
            }
            if !names.insert(node.data.name.as_str()) {
                out.push(InvariantViolation::DuplicateName(node.data.name.clone()));
            }
            let mut keys = HashSet::new();
            for attr in &node.data.attributes {
                if !keys.insert(attr.key.as_str()) {
                    out.push(InvariantViolation::DuplicateAttributeKey {
                        node: node.id.clone(),
                        key: attr.key.clone(),
                    });
                }
            }
            if node.data.handles != derive_handles(&node.data.attributes) {
                out.push(InvariantViolation::StaleHandles(node.id.clone()));
            }
            by_id.insert(node.id.as_str(), node);
        }

        let mut edge_ids = HashSet::new();
        for edge in &self.edges {
            if !edge_ids.insert(edge.id.as_str()) {
                out.push(InvariantViolation::DuplicateEdgeId(edge.id.clone()));
            }
            for side in [Side::Source, Side::Target] {
                let node_id = side.node_of(edge);
                match by_id.get(node_id.as_str()) {
                    None => out.push(InvariantViolation::DanglingEdge {
                        edge: edge.id.clone(),
                        node: node_id.clone(),
                    }),
                    Some(node) => check_endpoint(edge, side, node, &mut out),
                }
            }
        }
        out
    }
}

fn check_endpoint(edge: &Edge, side: Side, node: &Node, out: &mut Vec<InvariantViolation>) {
    let live = side.handle_of(edge);
    let recorded = side.recorded_of(edge);
    let mismatch = || InvariantViolation::CollapseMismatch { edge: edge.id.clone(), node: node.id.clone() };

    if node.data.collapsed {
        if live.as_deref() != Some(side.placeholder()) || recorded.is_none() {
            out.push(mismatch());
            return;
        }
        if let Some(Some(real)) = recorded
            && node.handle(real).is_none()
        {
            out.push(InvariantViolation::DanglingHandle {
                edge: edge.id.clone(),
                node: node.id.clone(),
                handle: real.clone(),
            });
        }
        return;
    }

    if recorded.is_some() || collapse::is_placeholder(live.as_deref()) {
        out.push(mismatch());
        return;
    }
    if let Some(handle) = live
        && node.handle(handle).is_none()
    {
        out.push(InvariantViolation::DanglingHandle {
            edge: edge.id.clone(),
            node: node.id.clone(),
            handle: handle.clone(),
        });
    }
}

// The real handle is the recorded one while collapsed, else the live one.
fn handle_survives(edge: &Edge, side: Side, handle_ids: &HashSet<&str>) -> bool {
    let real = match side.recorded_of(edge) {
        Some(recorded) => recorded.as_deref(),
        None => side.handle_of(edge).as_deref(),
    };
    match real {
        None => true,
        Some(h) if collapse::is_placeholder(Some(h)) => true,
        Some(h) => handle_ids.contains(h),
    }
}
