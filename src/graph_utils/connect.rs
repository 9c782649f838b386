//! Rules deciding whether a proposed edge may be created.

use std::collections::{HashMap, HashSet};

use super::collapse::{self, Side};
use super::errors::ConnectRejection;
use super::graph::{GraphDatabase, HandleKind, Node, NodeId};

/// A connect gesture as reported by the canvas. Either end may be missing
/// while the user is still dragging.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Connection {
    pub source: Option<NodeId>,
    pub target: Option<NodeId>,
    pub source_handle: Option<String>,
    pub target_handle: Option<String>,
}

impl Connection {
    pub fn between(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self { source: Some(source.into()), target: Some(target.into()), ..Default::default() }
    }

    pub fn with_handles(mut self, source_handle: Option<&str>, target_handle: Option<&str>) -> Self {
        self.source_handle = source_handle.map(String::from);
        self.target_handle = target_handle.map(String::from);
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConnectRules {
    pub allow_self_loops: bool,
    pub detect_cycles: bool,
}

/// Source must be an output and target an input. When either type is unknown
/// (placeholder or absent handle) the pair is accepted.
pub fn is_compatible(source: Option<HandleKind>, target: Option<HandleKind>) -> bool {
    match (source, target) {
        (Some(s), Some(t)) => s == HandleKind::Output && t == HandleKind::Input,
        _ => true,
    }
}

/// Validate `candidate` against the graph; on success return the resolved
/// (source, target) ids.
pub fn validate_connection(
    db: &GraphDatabase,
    candidate: &Connection,
    rules: ConnectRules,
) -> Result<(NodeId, NodeId), ConnectRejection> {
    let (Some(source), Some(target)) = (&candidate.source, &candidate.target) else {
        return Err(ConnectRejection::MissingEndpoint);
    };
    let source_node = db.get_node(source).ok_or_else(|| ConnectRejection::UnknownNode(source.clone()))?;
    let target_node = db.get_node(target).ok_or_else(|| ConnectRejection::UnknownNode(target.clone()))?;
    if source == target && !rules.allow_self_loops {
        return Err(ConnectRejection::SelfLoop);
    }

    let source_kind = resolve_handle(source_node, candidate.source_handle.as_deref(), Side::Source)?;
    let target_kind = resolve_handle(target_node, candidate.target_handle.as_deref(), Side::Target)?;
    if !is_compatible(source_kind, target_kind) {
        return Err(ConnectRejection::IncompatibleHandles);
    }

    if rules.detect_cycles && source != target && reaches(db, target, source) {
        return Err(ConnectRejection::WouldCreateCycle);
    }
    Ok((source.clone(), target.clone()))
}

// Type of the attribute behind a handle, None when it cannot be known.
fn resolve_handle(node: &Node, handle: Option<&str>, side: Side) -> Result<Option<HandleKind>, ConnectRejection> {
    let Some(handle) = handle else {
        return Ok(None);
    };
    if collapse::is_placeholder(Some(handle)) {
        if node.data.collapsed && handle == side.placeholder() {
            return Ok(None);
        }
        return Err(ConnectRejection::PlaceholderOnExpanded {
            node: node.id.clone(),
            handle: handle.to_string(),
        });
    }
    node.handle(handle).map(|h| Some(h.kind)).ok_or_else(|| ConnectRejection::UnknownHandle {
        node: node.id.clone(),
        handle: handle.to_string(),
    })
}

// Depth-first search along edge direction.
fn reaches(db: &GraphDatabase, from: &str, to: &str) -> bool {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in db.edges() {
        adjacency.entry(edge.source.as_str()).or_default().push(edge.target.as_str());
    }
    let mut stack = vec![from];
    let mut seen = HashSet::new();
    while let Some(current) = stack.pop() {
        if current == to {
            return true;
        }
        if !seen.insert(current) {
            continue;
        }
        if let Some(next) = adjacency.get(current) {
            stack.extend(next.iter().copied());
        }
    }
    false
}
