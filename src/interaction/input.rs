//! Input classification.
//!
//! Raw host events are sorted into [`InputEvent`] once, at the boundary; the
//! controller only ever sees these typed variants.

use crate::graph_utils::graph::{EdgeId, NodeId, Position};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerDevice {
    Mouse,
    Touch,
    Synthetic,
}

impl PointerDevice {
    /// Map a DOM-style `pointerType`. Pens count as mice.
    pub fn from_pointer_type(kind: &str) -> Self {
        match kind {
            "mouse" | "pen" => PointerDevice::Mouse,
            "touch" => PointerDevice::Touch,
            _ => PointerDevice::Synthetic,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PointerTarget {
    Node(NodeId),
    Edge(EdgeId),
    Pane,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArrowKey {
    Up,
    Down,
    Left,
    Right,
}

impl ArrowKey {
    pub fn offset(self, step: f64) -> (f64, f64) {
        match self {
            ArrowKey::Up => (0.0, -step),
            ArrowKey::Down => (0.0, step),
            ArrowKey::Left => (-step, 0.0),
            ArrowKey::Right => (step, 0.0),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Key {
    Escape,
    Arrow(ArrowKey),
    Other(String),
}

impl Key {
    /// Parse a key identity such as `"Escape"` or `"ArrowUp"`.
    pub fn from_identity(key: &str) -> Self {
        match key {
            "Escape" | "Esc" => Key::Escape,
            "ArrowUp" => Key::Arrow(ArrowKey::Up),
            "ArrowDown" => Key::Arrow(ArrowKey::Down),
            "ArrowLeft" => Key::Arrow(ArrowKey::Left),
            "ArrowRight" => Key::Arrow(ArrowKey::Right),
            other => Key::Other(other.to_string()),
        }
    }
}

/// Where keyboard focus was when a key arrived.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Focus {
    Canvas,
    TextInput,
}

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    Click { target: PointerTarget, device: PointerDevice },
    CollapseToggle { node: NodeId },
    DragStart { node: NodeId },
    /// `positions` holds the final position of every node moved by the drag.
    DragStop { node: NodeId, positions: Vec<(NodeId, Position)> },
    KeyDown { key: Key, focus: Focus },
    SelectionChanged { nodes: Vec<NodeId>, edges: Vec<EdgeId> },
}

impl InputEvent {
    /// Classify a raw click. `target_kind` is `"node"`, `"edge"` or anything
    /// else for the pane; `on_collapse_toggle` says whether the hit element sat
    /// inside a node's collapse control.
    pub fn classify_click(target_kind: &str, id: Option<&str>, pointer_type: &str, on_collapse_toggle: bool) -> Self {
        let device = PointerDevice::from_pointer_type(pointer_type);
        match (target_kind, id) {
            ("node", Some(id)) if on_collapse_toggle => InputEvent::CollapseToggle { node: id.to_string() },
            ("node", Some(id)) => InputEvent::Click { target: PointerTarget::Node(id.to_string()), device },
            ("edge", Some(id)) => InputEvent::Click { target: PointerTarget::Edge(id.to_string()), device },
            _ => InputEvent::Click { target: PointerTarget::Pane, device },
        }
    }

    pub fn key(identity: &str, input_focused: bool) -> Self {
        let focus = if input_focused { Focus::TextInput } else { Focus::Canvas };
        InputEvent::KeyDown { key: Key::from_identity(identity), focus }
    }
}
