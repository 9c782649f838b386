//! Everything the editor tells its host: user-facing notices, editor popups,
//! highlight changes and timestamped graph events.

use std::collections::BTreeSet;
use std::sync::mpsc::{Receiver, Sender};

use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::graph_utils::graph::{Edge, EdgeId, Node, NodeId};
use crate::interaction::confirm::ConfirmPrompt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A user-facing outcome the host may show as a dialog, a toast or a log line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, title: title.into(), message: message.into() }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, title: title.into(), message: message.into() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    Load,
    NodeSave,
    EdgeSave,
    Change,
    Delete,
    Selection,
    ViewportChange,
    NodeMove,
    SelectionClear,
    UiChange,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EventSource {
    Node,
    Edge,
    Pane,
    Keyboard,
    Editor,
    Layout,
    File,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEvent {
    pub kind: EventKind,
    pub source: EventSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<serde_json::Value>,
}

impl GraphEvent {
    pub fn new(kind: EventKind, source: EventSource) -> Self {
        let timestamp = OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| "unknown".to_string());
        Self { kind, source, source_id: None, target_id: None, timestamp, diff: None }
    }

    pub fn with_ids(mut self, source_id: Option<&str>, target_id: Option<&str>) -> Self {
        self.source_id = source_id.map(str::to_string);
        self.target_id = target_id.map(str::to_string);
        self
    }

    pub fn with_diff(mut self, diff: serde_json::Value) -> Self {
        self.diff = Some(diff);
        self
    }
}

/// Highlight sets the renderer draws. `searched` comes from the search box,
/// the others from clicking a node.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Highlights {
    pub nodes: BTreeSet<NodeId>,
    pub edges: BTreeSet<EdgeId>,
    pub searched: BTreeSet<NodeId>,
}

impl Highlights {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty() && self.searched.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum EditorEvent {
    /// Show the node editor seeded with this snapshot.
    OpenNodeEditor(Node),
    OpenEdgeEditor(Edge),
    CloseEditor,
    HighlightChanged(Highlights),
    ConfirmationRequested(ConfirmPrompt),
    ConfirmationCleared,
    Graph(GraphEvent),
}

pub trait HostSink {
    fn notify(&mut self, notification: Notification);
    fn emit(&mut self, event: EditorEvent);
}

/// Sink for headless use: everything goes to the `log` facade.
#[derive(Debug, Default)]
pub struct LogSink;

impl HostSink for LogSink {
    fn notify(&mut self, n: Notification) {
        match n.level {
            NoticeLevel::Info => log::info!("{}: {}", n.title, n.message),
            NoticeLevel::Error => log::warn!("{}: {}", n.title, n.message),
        }
    }

    fn emit(&mut self, event: EditorEvent) {
        log::trace!("editor event {:?}", event);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum HostMessage {
    Notice(Notification),
    Event(EditorEvent),
}

/// Forwards everything over an mpsc channel to the host's UI thread.
#[derive(Debug)]
pub struct ChannelSink {
    tx: Sender<HostMessage>,
}

impl ChannelSink {
    /// Create the sink and the receiving end the host drains each frame.
    pub fn channel() -> (Self, Receiver<HostMessage>) {
        let (tx, rx) = std::sync::mpsc::channel();
        (Self { tx }, rx)
    }
}

impl HostSink for ChannelSink {
    fn notify(&mut self, notification: Notification) {
        if self.tx.send(HostMessage::Notice(notification)).is_err() {
            log::debug!("host receiver dropped; notification discarded");
        }
    }

    fn emit(&mut self, event: EditorEvent) {
        if self.tx.send(HostMessage::Event(event)).is_err() {
            log::debug!("host receiver dropped; event discarded");
        }
    }
}
