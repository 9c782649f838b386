//! The per-instance editor context.
//!
//! [`GraphEditor`] owns the graph, every timer and flag the interaction needs,
//! and the host sink. Nothing is process-wide, so two editors never share
//! click timers or drag state.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde_json::json;

use crate::graph_utils::connect::Connection;
use crate::graph_utils::errors::{ConnectRejection, ValidationError};
use crate::graph_utils::graph::{
    DEFAULT_EDGE_TYPE, Edge, EdgeId, EdgePatch, FALLBACK_VIEW_CENTRE, GraphDatabase, Node, NodeData, NodeId,
    Position, RemovalSummary, Viewport, view_centre,
};
use crate::graph_utils::layout::{LayeredLayout, LayoutAlgorithm, LayoutDirection};
use crate::graph_utils::search::{SearchEngine, SearchUpdate};
use crate::graph_utils::spatial::{SpatialIndex, VisibleSize};
use crate::host::{EditorEvent, EventKind, EventSource, GraphEvent, Highlights, HostSink, Notification};
use crate::persistence::persist::{self, DEFAULT_FILE_NAME, FileSaver, GraphDocument, PersistError, SaveOutcome};
use crate::persistence::settings::EditorSettings;

use super::confirm::{ConfirmPrompt, Confirmation, ConfirmationFlow};
use super::input::{ArrowKey, Focus, InputEvent, Key, PointerDevice, PointerTarget};
use super::timers::Timer;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClickState {
    Idle,
    AwaitingSecondClick(PointerTarget),
    Dragging,
}

/// Which popup editor is open.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditSession {
    Node(NodeId),
    Edge(EdgeId),
}

#[derive(Clone, Debug, Default)]
struct StagedDelete {
    nodes: Vec<NodeId>,
    edges: Vec<EdgeId>,
}

pub struct GraphEditor {
    db: GraphDatabase,
    settings: EditorSettings,
    sink: Box<dyn HostSink>,
    layout: Box<dyn LayoutAlgorithm>,
    highlights: Highlights,
    // Pending single click and the target it belongs to
    click: Timer<PointerTarget>,
    dragging: bool,
    drag_settle: Timer<()>,
    deferred_layout: Timer<()>,
    search: SearchEngine,
    spatial: SpatialIndex,
    indexed_revision: Option<u64>,
    confirm: ConfirmationFlow,
    staged_delete: Option<StagedDelete>,
    editing: Option<EditSession>,
    visible_size: Option<VisibleSize>,
    closed: bool,
}

impl GraphEditor {
    pub fn new(db: GraphDatabase, settings: EditorSettings, sink: Box<dyn HostSink>) -> Self {
        let search = SearchEngine::new(settings.search_debounce());
        let spatial = SpatialIndex::new(settings.layout.default_footprint());
        Self {
            db,
            settings,
            sink,
            layout: Box::new(LayeredLayout::default()),
            highlights: Highlights::default(),
            click: Timer::new(),
            dragging: false,
            drag_settle: Timer::new(),
            deferred_layout: Timer::new(),
            search,
            spatial,
            indexed_revision: None,
            confirm: ConfirmationFlow::new(),
            staged_delete: None,
            editing: None,
            visible_size: None,
            closed: false,
        }
    }

    /// Swap in a different layout algorithm.
    pub fn with_layout(mut self, algorithm: Box<dyn LayoutAlgorithm>) -> Self {
        self.layout = algorithm;
        self
    }

    pub fn graph(&self) -> &GraphDatabase {
        &self.db
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    pub fn highlights(&self) -> &Highlights {
        &self.highlights
    }

    pub fn search_query(&self) -> &str {
        self.search.query()
    }

    pub fn editing(&self) -> Option<&EditSession> {
        self.editing.as_ref()
    }

    pub fn pending_confirmation(&self) -> Option<&ConfirmPrompt> {
        self.confirm.prompt()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn click_state(&self) -> ClickState {
        if self.dragging {
            return ClickState::Dragging;
        }
        match self.click.payload() {
            Some(target) => ClickState::AwaitingSecondClick(target.clone()),
            None => ClickState::Idle,
        }
    }

    /// Earliest instant at which [`poll_timers`](Self::poll_timers) has work.
    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.click.deadline(),
            self.drag_settle.deadline(),
            self.deferred_layout.deadline(),
            self.search.deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    fn graph_event(&mut self, event: GraphEvent) {
        self.sink.emit(EditorEvent::Graph(event));
    }

    fn publish_highlights(&mut self) {
        self.sink.emit(EditorEvent::HighlightChanged(self.highlights.clone()));
    }

    fn clear_highlights(&mut self) {
        if self.highlights.is_empty() {
            return;
        }
        self.highlights = Highlights::default();
        self.publish_highlights();
    }

    fn clear_pointer_highlights(&mut self) {
        if self.highlights.nodes.is_empty() && self.highlights.edges.is_empty() {
            return;
        }
        self.highlights.nodes.clear();
        self.highlights.edges.clear();
        self.publish_highlights();
    }

    fn highlight_neighbors(&mut self, id: &str) {
        if !self.settings.interactive {
            return;
        }
        let around = self.db.neighbors(id);
        self.highlights = Highlights { nodes: around.nodes, edges: around.edges, searched: BTreeSet::new() };
        self.publish_highlights();
    }

    // ---- input ----

    pub fn handle_input(&mut self, event: InputEvent, now: Instant) {
        if self.closed {
            return;
        }
        match event {
            InputEvent::Click { target: PointerTarget::Pane, .. } => self.pane_click(),
            InputEvent::Click { target, device } => self.target_click(target, device, now),
            InputEvent::CollapseToggle { node } => self.toggle_collapse(&node, now),
            InputEvent::DragStart { node } => {
                log::trace!("drag start on {}", node);
                self.dragging = true;
                self.drag_settle.cancel();
            }
            InputEvent::DragStop { node, positions } => self.drag_stop(&node, &positions, now),
            InputEvent::KeyDown { focus: Focus::TextInput, .. } => {}
            InputEvent::KeyDown { key: Key::Escape, .. } => self.escape(),
            InputEvent::KeyDown { key: Key::Arrow(arrow), .. } => self.nudge_selection(arrow),
            InputEvent::KeyDown { key: Key::Other(_), .. } => {}
            InputEvent::SelectionChanged { nodes, edges } => {
                self.db.set_selection(&nodes, &edges);
                let event = GraphEvent::new(EventKind::Selection, EventSource::Pane)
                    .with_diff(json!({ "nodes": nodes, "edges": edges }));
                self.graph_event(event);
            }
        }
    }

    fn target_click(&mut self, target: PointerTarget, device: PointerDevice, now: Instant) {
        if self.dragging {
            log::trace!("click on {:?} ignored while dragging", target);
            return;
        }
        let known = match &target {
            PointerTarget::Node(id) => self.db.get_node(id).is_some(),
            PointerTarget::Edge(id) => self.db.get_edge(id).is_some(),
            PointerTarget::Pane => true,
        };
        if !known {
            log::debug!("click on unknown {:?}", target);
            return;
        }
        if self.click.payload() == Some(&target) {
            self.click.cancel();
            self.double_click(target, device);
            return;
        }
        if let Some(previous) = self.click.start(now, self.settings.click_delay(), target) {
            log::trace!("pending click on {:?} superseded", previous);
        }
    }

    fn single_click(&mut self, target: PointerTarget) {
        if self.dragging {
            return;
        }
        match target {
            PointerTarget::Node(id) => self.highlight_neighbors(&id),
            // Edges have no single-click action yet.
            PointerTarget::Edge(_) | PointerTarget::Pane => {}
        }
    }

    fn double_click(&mut self, target: PointerTarget, device: PointerDevice) {
        if !self.settings.interactive || device != PointerDevice::Mouse {
            log::debug!("double click on {:?} from {:?} does not open an editor", target, device);
            return;
        }
        match target {
            PointerTarget::Node(id) => {
                if let Some(node) = self.db.get_node(&id).cloned() {
                    let event = GraphEvent::new(EventKind::UiChange, EventSource::Node).with_ids(Some(id.as_str()), None);
                    self.editing = Some(EditSession::Node(id));
                    self.sink.emit(EditorEvent::OpenNodeEditor(node));
                    self.graph_event(event);
                }
            }
            PointerTarget::Edge(id) => {
                if let Some(edge) = self.db.get_edge(&id).cloned() {
                    let event = GraphEvent::new(EventKind::UiChange, EventSource::Edge)
                        .with_ids(Some(edge.source.as_str()), Some(edge.target.as_str()));
                    self.editing = Some(EditSession::Edge(id));
                    self.sink.emit(EditorEvent::OpenEdgeEditor(edge));
                    self.graph_event(event);
                }
            }
            PointerTarget::Pane => {}
        }
    }

    fn pane_click(&mut self) {
        self.click.cancel();
        self.clear_highlights();
        self.db.clear_transient_flags();
    }

    fn toggle_collapse(&mut self, id: &str, now: Instant) {
        if self.dragging {
            return;
        }
        self.click.cancel();
        let Some(collapsed) = self.db.get_node(id).map(|n| !n.data.collapsed) else {
            log::debug!("collapse toggle on unknown node {}", id);
            return;
        };
        match self.db.set_collapsed(id, collapsed) {
            Ok(_) => {
                let event = GraphEvent::new(EventKind::Change, EventSource::Node)
                    .with_ids(Some(id), None)
                    .with_diff(json!({ "collapsed": collapsed }));
                self.graph_event(event);
                if self.settings.features.auto_layout_on_collapse {
                    // Runs on the next poll rather than inside this event.
                    self.deferred_layout.start(now, Duration::ZERO, ());
                }
            }
            Err(e) => log::warn!("collapse toggle failed: {}", e),
        }
    }

    fn drag_stop(&mut self, node: &str, positions: &[(NodeId, Position)], now: Instant) {
        let moved = self.db.move_nodes(positions);
        if !moved.is_empty() {
            let event = GraphEvent::new(EventKind::NodeMove, EventSource::Node)
                .with_ids(Some(node), None)
                .with_diff(json!(moved));
            self.graph_event(event);
        }
        if self.db.get_node(node).is_some() {
            self.highlight_neighbors(node);
        }
        self.drag_settle.start(now, self.settings.drag_settle(), ());
    }

    fn escape(&mut self) {
        self.click.cancel();
        self.db.clear_transient_flags();
        self.search.clear();
        self.clear_highlights();
        self.graph_event(GraphEvent::new(EventKind::SelectionClear, EventSource::Keyboard));
    }

    fn nudge_selection(&mut self, arrow: ArrowKey) {
        let selected = self.db.selected_node_ids();
        if selected.is_empty() {
            return;
        }
        let (dx, dy) = arrow.offset(self.settings.arrow_distance());
        let targets: Vec<_> = selected
            .iter()
            .filter_map(|id| self.db.get_node(id))
            .map(|n| {
                let mut p = n.position;
                p.x += dx;
                p.y += dy;
                (n.id.clone(), p)
            })
            .collect();
        let moved = self.db.move_nodes(&targets);
        for m in &moved {
            log::debug!("moved {} from ({}, {}) to ({}, {})", m.id, m.before.x, m.before.y, m.after.x, m.after.y);
        }
        let event = GraphEvent::new(EventKind::NodeMove, EventSource::Keyboard).with_diff(json!(moved));
        self.graph_event(event);
    }

    /// Run every timer that is due at `now`.
    pub fn poll_timers(&mut self, now: Instant) {
        if self.closed {
            return;
        }
        if let Some(target) = self.click.fire_if_due(now) {
            self.single_click(target);
        }
        if self.drag_settle.fire_if_due(now).is_some() {
            self.dragging = false;
        }
        if self.deferred_layout.fire_if_due(now).is_some() {
            self.apply_layout(None);
        }
        if let Some(hits) = self.search.poll(now, self.db.nodes()) {
            self.highlights.searched = hits;
            self.publish_highlights();
        }
    }

    // ---- graph operations ----

    /// Add a default node in the middle of the visible area.
    pub fn add_node(&mut self) -> Node {
        let visible = self.visible_size.map(|s| (s.width, s.height));
        let position = view_centre(&self.db.viewport(), visible);
        let node = self.db.add_node(Some(position));
        let event = GraphEvent::new(EventKind::Change, EventSource::Pane).with_ids(Some(node.id.as_str()), None);
        self.graph_event(event);
        node
    }

    /// Finish a connect gesture. Rejections are routine while dragging a
    /// wire around, so they are only logged.
    pub fn connect(&mut self, candidate: &Connection) -> Result<Edge, ConnectRejection> {
        match self.db.add_edge(candidate, self.settings.connect_rules()) {
            Ok(edge) => {
                let event = GraphEvent::new(EventKind::Change, EventSource::Edge)
                    .with_ids(Some(edge.source.as_str()), Some(edge.target.as_str()));
                self.graph_event(event);
                Ok(edge)
            }
            Err(rejection) => {
                log::debug!("connection rejected: {}", rejection);
                Err(rejection)
            }
        }
    }

    pub fn apply_layout(&mut self, direction: Option<LayoutDirection>) {
        if let Some(direction) = direction {
            self.settings.layout.direction = direction;
        }
        self.db.apply_layout(&self.settings.layout, self.layout.as_ref());
        let event = GraphEvent::new(EventKind::Change, EventSource::Layout)
            .with_diff(json!({ "direction": self.settings.layout.direction }));
        self.graph_event(event);
    }

    pub fn set_viewport(&mut self, viewport: Viewport) -> Result<(), ValidationError> {
        self.db.set_viewport(viewport)?;
        let event = GraphEvent::new(EventKind::ViewportChange, EventSource::Pane).with_diff(json!(viewport));
        self.graph_event(event);
        Ok(())
    }

    pub fn measure_node(&mut self, id: &str, width: f64, height: f64) -> Result<(), ValidationError> {
        self.db.set_node_dimensions(id, width, height)
    }

    pub fn set_visible_size(&mut self, width: f64, height: f64) {
        self.visible_size = Some(VisibleSize::new(width, height));
    }

    /// Ids of nodes inside the viewport plus the overscan margin. Nothing is
    /// visible until the host has reported its size.
    pub fn visible_nodes(&mut self) -> BTreeSet<NodeId> {
        let Some(visible) = self.visible_size else {
            return BTreeSet::new();
        };
        if self.indexed_revision != Some(self.db.revision()) {
            self.spatial.rebuild(self.db.nodes());
            self.indexed_revision = Some(self.db.revision());
        }
        self.spatial.query(&self.db.viewport(), visible, self.settings.overscan)
    }

    /// Centre the node with this name in the visible area at `zoom`.
    pub fn zoom_to_node(&mut self, name: &str, zoom: f64) -> Result<Viewport, ValidationError> {
        if !(zoom.is_finite() && zoom > 0.0) {
            return Err(ValidationError::InvalidViewport);
        }
        let node = self.db.find_node_by_name(name).ok_or_else(|| ValidationError::UnknownNode(name.to_string()))?;
        let (w, h) = node.footprint(self.settings.layout.default_footprint());
        let (cx, cy) = (node.position.x + w / 2.0, node.position.y + h / 2.0);
        let (sx, sy) = match self.visible_size {
            Some(v) => (v.width / 2.0, v.height / 2.0),
            None => FALLBACK_VIEW_CENTRE,
        };
        let viewport = Viewport { x: sx - cx * zoom, y: sy - cy * zoom, zoom };
        self.set_viewport(viewport)?;
        Ok(viewport)
    }

    // ---- search ----

    pub fn set_search_query(&mut self, query: &str, now: Instant) {
        self.clear_pointer_highlights();
        if self.search.set_query(query, now) == SearchUpdate::Cleared && !self.highlights.searched.is_empty() {
            self.highlights.searched.clear();
            self.publish_highlights();
        }
    }

    // ---- editors ----

    fn close_editor(&mut self) {
        self.editing = None;
        self.clear_highlights();
        self.sink.emit(EditorEvent::CloseEditor);
        self.graph_event(GraphEvent::new(EventKind::UiChange, EventSource::Editor));
    }

    /// Apply the node editor's replacement data. On rejection the user is told
    /// why and the editor stays open.
    pub fn commit_node_edit(&mut self, id: &str, data: NodeData) -> Result<(), ValidationError> {
        if let Err(e) = self.db.replace_node(id, data) {
            log::warn!("node edit rejected: {}", e);
            self.sink.notify(Notification::error("Validation Error", e.to_string()));
            return Err(e);
        }
        self.close_editor();
        let event = GraphEvent::new(EventKind::NodeSave, EventSource::Editor).with_ids(Some(id), None);
        self.graph_event(event);
        Ok(())
    }

    /// Apply the edge editor's replacement value. Only label and type may
    /// change; a missing type becomes the default one.
    pub fn commit_edge_edit(&mut self, edited: Edge) -> Result<(), ValidationError> {
        let endpoints = self.db.get_edge(&edited.id).map(|e| (e.source.clone(), e.target.clone()));
        let result = match endpoints {
            None => Err(ValidationError::UnknownEdge(edited.id.clone())),
            Some((source, target)) if source != edited.source || target != edited.target => {
                Err(ValidationError::EndpointChange(edited.id.clone()))
            }
            Some(_) => {
                let patch = EdgePatch {
                    label: edited.label,
                    edge_type: Some(edited.edge_type.unwrap_or_else(|| DEFAULT_EDGE_TYPE.to_string())),
                };
                self.db.replace_edge(&edited.id, patch)
            }
        };
        if let Err(e) = result {
            log::warn!("edge edit rejected: {}", e);
            self.sink.notify(Notification::error("Validation Error", e.to_string()));
            return Err(e);
        }
        self.close_editor();
        let event = GraphEvent::new(EventKind::EdgeSave, EventSource::Editor).with_ids(Some(edited.id.as_str()), None);
        self.graph_event(event);
        Ok(())
    }

    pub fn cancel_edit(&mut self) {
        if self.editing.is_some() {
            self.close_editor();
        }
    }

    // ---- delete ----

    /// Ask to delete whatever is currently selected.
    pub fn request_delete_selection(&mut self) -> Confirmation {
        let nodes = self.db.selected_node_ids();
        let edges = self.db.edges().iter().filter(|e| e.selected).map(|e| e.id.clone()).collect();
        self.request_delete(nodes, edges)
    }

    /// Stage a delete and open the confirmation prompt. Resolves `false`
    /// right away when nothing is staged or another prompt is open.
    pub fn request_delete(&mut self, nodes: Vec<NodeId>, edges: Vec<EdgeId>) -> Confirmation {
        let nodes: Vec<NodeId> = nodes.into_iter().filter(|id| self.db.get_node(id).is_some()).collect();
        let edges: Vec<EdgeId> = edges.into_iter().filter(|id| self.db.get_edge(id).is_some()).collect();
        if self.closed || (nodes.is_empty() && edges.is_empty()) {
            return Confirmation::resolved(false);
        }
        if self.confirm.is_pending() {
            log::debug!("delete requested while a confirmation is open");
            return Confirmation::resolved(false);
        }

        let names: Vec<&str> = nodes
            .iter()
            .filter_map(|id| self.db.get_node(id))
            .map(|n| n.data.name.as_str())
            .collect();
        let mut parts = Vec::new();
        if !names.is_empty() {
            parts.push(format!("node(s) {}", names.join(", ")));
        }
        if !edges.is_empty() {
            parts.push(format!("edge(s) {}", edges.join(", ")));
        }
        let prompt = ConfirmPrompt {
            title: "Delete Confirmation".to_string(),
            message: format!("Are you sure you want to delete {}?", parts.join(" and ")),
        };

        self.staged_delete = Some(StagedDelete { nodes, edges });
        let confirmation = self.confirm.request(prompt.clone());
        self.sink.emit(EditorEvent::ConfirmationRequested(prompt));
        confirmation
    }

    /// The user's answer to the open prompt. Returns what was removed, or
    /// `None` if there was no prompt or the answer was no.
    pub fn resolve_confirmation(&mut self, confirmed: bool) -> Option<RemovalSummary> {
        if !self.confirm.respond(confirmed) {
            return None;
        }
        self.sink.emit(EditorEvent::ConfirmationCleared);
        let staged = self.staged_delete.take()?;
        if !confirmed {
            return None;
        }

        let edges = self.db.remove_edges(&staged.edges);
        let mut summary = self.db.remove_nodes(&staged.nodes);
        summary.edges += edges;
        self.clear_highlights();
        self.search.clear();
        let event = GraphEvent::new(EventKind::Delete, EventSource::Pane)
            .with_diff(json!({ "nodes": staged.nodes, "edges": staged.edges }));
        self.graph_event(event);
        Some(summary)
    }

    // ---- persistence ----

    pub fn snapshot(&self) -> GraphDocument {
        GraphDocument::from_graph(&self.db)
    }

    /// Offer the current graph to the host's file-save capability.
    pub fn save_with(&mut self, saver: &mut dyn FileSaver) -> Result<PathBuf, PersistError> {
        let text = self.snapshot().to_json()?;
        match saver.save(DEFAULT_FILE_NAME, &text) {
            Ok(SaveOutcome::Saved(path)) => {
                log::info!("saved graph to {}", path.display());
                Ok(path)
            }
            Ok(SaveOutcome::Cancelled) => {
                log::debug!("save cancelled by user");
                Err(PersistError::Cancelled)
            }
            Err(e) => {
                log::warn!("save failed: {}", e);
                self.sink.notify(Notification::error("Save Error", "Failed to save the graph. Please try again."));
                Err(PersistError::Io(e))
            }
        }
    }

    /// Replace the graph with a serialized document. Nothing changes unless
    /// the whole document is valid.
    pub fn load_document(&mut self, text: &str) -> Result<(usize, usize), PersistError> {
        let loaded = persist::parse_document(text)
            .and_then(|doc| doc.apply_to(&mut self.db).map_err(PersistError::from));
        match loaded {
            Ok((nodes, edges)) => {
                self.click.cancel();
                self.search.clear();
                self.editing = None;
                self.clear_highlights();
                self.indexed_revision = None;
                let message = format!("Successfully loaded {} nodes and {} edges.", nodes, edges);
                log::info!("{}", message);
                self.sink.notify(Notification::info("Graph Loaded", message));
                self.graph_event(GraphEvent::new(EventKind::Load, EventSource::File));
                Ok((nodes, edges))
            }
            Err(e) => {
                let title = match &e {
                    PersistError::Parse(_) => "Invalid JSON",
                    PersistError::Invalid(_) => "Invalid Graph",
                    _ => "Load Error",
                };
                log::warn!("load rejected: {}", e);
                self.sink.notify(Notification::error(title, e.to_string()));
                Err(e)
            }
        }
    }

    pub fn load_from_path(&mut self, path: &Path) -> Result<(usize, usize), PersistError> {
        match std::fs::read_to_string(path) {
            Ok(text) => self.load_document(&text),
            Err(e) => {
                log::warn!("could not read {}: {}", path.display(), e);
                self.sink.notify(Notification::error("File Read Error", "Failed to read the file. Please try again."));
                Err(PersistError::Io(e))
            }
        }
    }

    // ---- teardown ----

    /// Cancel every timer and any open prompt. Later input is ignored.
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.click.cancel();
        self.drag_settle.cancel();
        self.deferred_layout.cancel();
        self.search.cancel();
        self.confirm.cancel();
        self.staged_delete = None;
        self.dragging = false;
    }
}

impl Drop for GraphEditor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
