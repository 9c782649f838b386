use thiserror::Error;

/// Recoverable user-facing rejection. The graph is left untouched whenever one
/// of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Node name must not be empty.")]
    EmptyName,
    #[error("Node name \"{0}\" already exists. Please choose a unique name.")]
    DuplicateName(String),
    #[error("Attribute keys must not be empty.")]
    EmptyAttributeKey,
    #[error("Duplicate attribute key \"{0}\" found. Please ensure all attribute keys are unique within the node.")]
    DuplicateAttributeKey(String),
    #[error("no node with id {0}")]
    UnknownNode(String),
    #[error("no edge with id {0}")]
    UnknownEdge(String),
    #[error("viewport values must be finite and zoom must not be negative")]
    InvalidViewport,
    #[error("the edge editor cannot change the endpoints of edge {0}")]
    EndpointChange(String),
    #[error("{0}")]
    MalformedDocument(String),
}

/// Reasons a proposed connection is refused. These come out of ordinary
/// exploratory dragging, so they are logged rather than shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectRejection {
    #[error("connection is missing its source or target")]
    MissingEndpoint,
    #[error("connection references unknown node {0}")]
    UnknownNode(String),
    #[error("self loops are disabled")]
    SelfLoop,
    #[error("node {node} has no handle {handle}")]
    UnknownHandle { node: String, handle: String },
    #[error("placeholder handle {handle} used on expanded node {node}")]
    PlaceholderOnExpanded { node: String, handle: String },
    #[error("handle types are incompatible: an output must connect to an input")]
    IncompatibleHandles,
    #[error("connection would create a cycle")]
    WouldCreateCycle,
}

/// A broken structural invariant. Only a defect can produce one of these;
/// `GraphDatabase::check_invariants` reports them and mutations assert on it
/// in debug builds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("node id {0} is used more than once")]
    DuplicateNodeId(String),
    #[error("edge id {0} is used more than once")]
    DuplicateEdgeId(String),
    #[error("node name \"{0}\" is used more than once")]
    DuplicateName(String),
    #[error("node {node} repeats attribute key \"{key}\"")]
    DuplicateAttributeKey { node: String, key: String },
    #[error("node {0} handles are out of sync with its attributes")]
    StaleHandles(String),
    #[error("edge {edge} references missing node {node}")]
    DanglingEdge { edge: String, node: String },
    #[error("edge {edge} references missing handle {handle} on node {node}")]
    DanglingHandle { edge: String, node: String, handle: String },
    #[error("edge {edge} is not routed consistently with the collapsed state of node {node}")]
    CollapseMismatch { edge: String, node: String },
}
