use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use flow_loom::graph_utils::collapse::{INPUT_COLLAPSED, OUTPUT_COLLAPSED};
use flow_loom::graph_utils::connect::{ConnectRules, Connection};
use flow_loom::graph_utils::errors::{ConnectRejection, ValidationError};
use flow_loom::graph_utils::graph::{Attribute, Edge, GraphDatabase, HandleKind, NodeData, NodeId, Position, Viewport};
use flow_loom::graph_utils::spatial::{SpatialIndex, VisibleSize};
use flow_loom::host::{ChannelSink, EditorEvent, HostMessage, NoticeLevel};
use flow_loom::interaction::input::{InputEvent, PointerDevice, PointerTarget};
use flow_loom::persistence::persist::{self, DirectorySaver, FileSaver, GraphDocument, PersistError, SaveOutcome};
use flow_loom::persistence::settings::EditorSettings;
use flow_loom::GraphEditor;
use uuid::Uuid;

const MS: Duration = Duration::from_millis(1);

fn new_db() -> GraphDatabase {
    GraphDatabase::new()
}

fn named(db: &mut GraphDatabase, name: &str, attrs: Vec<Attribute>) -> NodeId {
    let id = db.add_node(None).id;
    db.replace_node(&id, NodeData::new(name, "", attrs)).expect("fresh name should be accepted");
    id
}

fn ports() -> Vec<Attribute> {
    vec![Attribute::new("in", "", HandleKind::Input), Attribute::new("out", "", HandleKind::Output)]
}

fn editor() -> (GraphEditor, Receiver<HostMessage>) {
    let (sink, rx) = ChannelSink::channel();
    (GraphEditor::new(new_db(), EditorSettings::default(), Box::new(sink)), rx)
}

fn notices(rx: &Receiver<HostMessage>) -> Vec<(NoticeLevel, String)> {
    rx.try_iter()
        .filter_map(|m| match m {
            HostMessage::Notice(n) => Some((n.level, n.title)),
            HostMessage::Event(_) => None,
        })
        .collect()
}

#[test]
fn graphdb_names_stay_unique() {
    let mut db = new_db();
    for _ in 0..50 {
        db.add_node(None);
    }
    let a = named(&mut db, "Alpha", vec![]);
    let b = db.add_node(None).id;
    let before = db.get_node(&b).cloned();

    let err = db.replace_node(&b, NodeData::new("Alpha", "", vec![])).unwrap_err();
    assert_eq!(err, ValidationError::DuplicateName("Alpha".into()));
    assert_eq!(db.get_node(&b).cloned(), before);
    // Saving a node under its own name is fine
    assert!(db.replace_node(&a, NodeData::new("Alpha", "changed", vec![])).is_ok());
    // Case-sensitive
    assert!(db.replace_node(&b, NodeData::new("alpha", "", vec![])).is_ok());

    let mut names: Vec<_> = db.nodes().iter().map(|n| n.data.name.clone()).collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), db.node_count());
}

#[test]
fn graphdb_duplicate_attribute_keys_rejected() {
    let mut db = new_db();
    let id = db.add_node(None).id;
    let attrs = vec![Attribute::new("a", "1", HandleKind::Input), Attribute::new("a", "2", HandleKind::Output)];
    let err = db.replace_node(&id, NodeData::new("N", "", attrs)).unwrap_err();
    assert_eq!(err, ValidationError::DuplicateAttributeKey("a".into()));
    assert!(db.get_node(&id).unwrap().data.name.starts_with("Node-"));
}

#[test]
fn graphdb_handles_follow_connectable_attributes() {
    let mut db = new_db();
    let mut hidden = Attribute::new("note", "x", HandleKind::Input);
    hidden.connectable = false;
    let id = named(&mut db, "N", vec![Attribute::new("out", "", HandleKind::Output), hidden]);
    let handles: Vec<_> = db.get_node(&id).unwrap().data.handles.iter().map(|h| h.id.clone()).collect();
    assert_eq!(handles, vec!["out".to_string()]);
}

#[test]
fn graphdb_removing_a_handle_drops_its_edges() {
    let mut db = new_db();
    let a = named(&mut db, "A", ports());
    let b = named(&mut db, "B", ports());
    db.add_edge(&Connection::between(a.clone(), b.clone()).with_handles(Some("out"), Some("in")), ConnectRules::default())
        .unwrap();
    db.replace_node(&b, NodeData::new("B", "", vec![Attribute::new("out", "", HandleKind::Output)]))
        .unwrap();
    assert_eq!(db.edge_count(), 0);
    assert!(db.check_invariants().is_empty());
}

#[test]
fn collapse_round_trip_restores_handles() {
    let mut db = new_db();
    let a = named(&mut db, "A", ports());
    let b = named(&mut db, "B", ports());
    let rules = ConnectRules::default();
    db.add_edge(&Connection::between(a.clone(), b.clone()).with_handles(Some("out"), Some("in")), rules).unwrap();
    db.add_edge(&Connection::between(b.clone(), a.clone()).with_handles(None, Some("in")), rules).unwrap();
    db.add_edge(&Connection::between(b.clone(), a.clone()).with_handles(Some("out"), None), rules).unwrap();
    let original: Vec<Edge> = db.edges().to_vec();

    db.set_collapsed(&a, true).unwrap();
    for e in db.edges() {
        if e.source == a {
            assert_eq!(e.source_handle.as_deref(), Some(OUTPUT_COLLAPSED));
        }
        if e.target == a {
            assert_eq!(e.target_handle.as_deref(), Some(INPUT_COLLAPSED));
        }
    }
    db.set_collapsed(&a, false).unwrap();
    assert_eq!(db.edges(), original.as_slice());
}

#[test]
fn collapse_twice_is_idempotent() {
    let mut db = new_db();
    let a = named(&mut db, "A", ports());
    let b = named(&mut db, "B", ports());
    db.add_edge(&Connection::between(a.clone(), b.clone()).with_handles(Some("out"), Some("in")), ConnectRules::default())
        .unwrap();
    db.set_collapsed(&a, true).unwrap();
    let once = db.edges().to_vec();
    assert!(!db.set_collapsed(&a, true).unwrap());
    assert_eq!(db.edges(), once.as_slice());
}

#[test]
fn collapsed_on_both_ends_carries_both_placeholders() {
    let mut db = new_db();
    let a = named(&mut db, "A", ports());
    let b = named(&mut db, "B", ports());
    db.add_edge(&Connection::between(a.clone(), b.clone()).with_handles(Some("out"), Some("in")), ConnectRules::default())
        .unwrap();
    db.set_collapsed(&a, true).unwrap();
    db.set_collapsed(&b, true).unwrap();
    let e = &db.edges()[0];
    assert_eq!(e.source_handle.as_deref(), Some(OUTPUT_COLLAPSED));
    assert_eq!(e.target_handle.as_deref(), Some(INPUT_COLLAPSED));
    db.set_collapsed(&b, false).unwrap();
    db.set_collapsed(&a, false).unwrap();
    let e = &db.edges()[0];
    assert_eq!((e.source_handle.as_deref(), e.target_handle.as_deref()), (Some("out"), Some("in")));
}

#[test]
fn connect_three_times_leaves_edge_3() {
    let mut db = new_db();
    let a = named(&mut db, "A", vec![]);
    let b = named(&mut db, "B", vec![]);
    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(db.add_edge(&Connection::between(a.clone(), b.clone()), ConnectRules::default()).unwrap().id);
    }
    assert_eq!(db.edge_count(), 1);
    assert_eq!(db.edges()[0].label, "Edge 3");
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3, "edge ids are independent of the label counter");
}

#[test]
fn connect_keeps_user_labelled_untyped_edge() {
    let mut db = new_db();
    let doc = r#"{"nodes":[
        {"id":"a","position":{"x":0,"y":0},"data":{"name":"A","description":"","attributes":[]}},
        {"id":"b","position":{"x":0,"y":0},"data":{"name":"B","description":"","attributes":[]}}
    ],"edges":[{"id":"e1","source":"a","target":"b","label":"owns"}]}"#;
    persist::parse_document(doc).unwrap().apply_to(&mut db).unwrap();
    assert!(!db.get_edge("e1").unwrap().is_provisional());

    db.add_edge(&Connection::between("a", "b"), ConnectRules::default()).unwrap();
    db.add_edge(&Connection::between("a", "b"), ConnectRules::default()).unwrap();
    let mut labels: Vec<&str> = db.edges().iter().map(|e| e.label.as_str()).collect();
    labels.sort();
    assert_eq!(labels, vec!["Edge 3", "owns"]);
}

#[test]
fn connect_rejections() {
    let mut db = new_db();
    let a = named(&mut db, "A", ports());
    let b = named(&mut db, "B", ports());
    let rules = ConnectRules::default();
    assert_eq!(
        db.add_edge(&Connection { source: Some(a.clone()), ..Default::default() }, rules).unwrap_err(),
        ConnectRejection::MissingEndpoint
    );
    assert_eq!(db.add_edge(&Connection::between(a.clone(), a.clone()), rules).unwrap_err(), ConnectRejection::SelfLoop);
    assert_eq!(
        db.add_edge(&Connection::between(a.clone(), b.clone()).with_handles(Some("in"), Some("out")), rules)
            .unwrap_err(),
        ConnectRejection::IncompatibleHandles
    );
    assert!(matches!(
        db.add_edge(&Connection::between(a.clone(), "ghost"), rules).unwrap_err(),
        ConnectRejection::UnknownNode(_)
    ));
    assert_eq!(db.edge_count(), 0);
    let loops = ConnectRules { allow_self_loops: true, ..rules };
    assert!(db.add_edge(&Connection::between(a.clone(), a), loops).is_ok());
}

#[test]
fn cycle_detection_behind_flag() {
    let mut db = new_db();
    let a = named(&mut db, "A", vec![]);
    let b = named(&mut db, "B", vec![]);
    let rules = ConnectRules { detect_cycles: true, ..Default::default() };
    db.add_edge(&Connection::between(a.clone(), b.clone()), rules).unwrap();
    assert_eq!(
        db.add_edge(&Connection::between(b.clone(), a.clone()), rules).unwrap_err(),
        ConnectRejection::WouldCreateCycle
    );
    assert!(db.add_edge(&Connection::between(b, a), ConnectRules::default()).is_ok());
}

#[test]
fn delete_node_cascades_to_edges() {
    let mut db = new_db();
    let a = named(&mut db, "A", vec![]);
    let b = named(&mut db, "B", vec![]);
    let c = named(&mut db, "C", vec![]);
    let rules = ConnectRules::default();
    db.add_edge(&Connection::between(a.clone(), b.clone()), rules).unwrap();
    let bc = db.add_edge(&Connection::between(b.clone(), c.clone()), rules).unwrap();

    let summary = db.remove_nodes(&[a]);
    assert_eq!((summary.nodes, summary.edges), (1, 1));
    assert_eq!(db.edges(), &[bc][..]);
}

#[test]
fn load_invalid_document_leaves_graph_unchanged() {
    let (mut ed, rx) = editor();
    ed.add_node();
    let before = ed.snapshot();
    let bad = r#"{"nodes":[{"position":{"x":0,"y":0},"data":{"name":"x","description":"","attributes":[]}}],"edges":[]}"#;
    let err = ed.load_document(bad).unwrap_err();
    assert!(matches!(err, PersistError::Invalid(ValidationError::MalformedDocument(_))));
    assert!(err.to_string().contains("nodes[0].id"));
    assert_eq!(ed.snapshot(), before);
    assert_eq!(notices(&rx), vec![(NoticeLevel::Error, "Invalid Graph".to_string())]);
}

#[test]
fn load_rejects_inconsistent_graph() {
    let (mut ed, _rx) = editor();
    let doc = r#"{"nodes":[
        {"id":"a","position":{"x":0,"y":0},"data":{"name":"same","description":"","attributes":[]}},
        {"id":"b","position":{"x":0,"y":0},"data":{"name":"same","description":"","attributes":[]}}
    ],"edges":[]}"#;
    assert!(ed.load_document(doc).is_err());
    assert_eq!(ed.graph().node_count(), 0);
}

#[test]
fn load_rejects_duplicate_ids() {
    let mut db = new_db();
    let nodes = r#"{"nodes":[
        {"id":"a","position":{"x":0,"y":0},"data":{"name":"A","description":"","attributes":[]}},
        {"id":"a","position":{"x":0,"y":0},"data":{"name":"B","description":"","attributes":[]}}
    ],"edges":[]}"#;
    let err = persist::parse_document(nodes).unwrap().apply_to(&mut db).unwrap_err();
    assert!(err.to_string().contains("node id a is used more than once"));

    let edges = r#"{"nodes":[
        {"id":"a","position":{"x":0,"y":0},"data":{"name":"A","description":"","attributes":[]}},
        {"id":"b","position":{"x":0,"y":0},"data":{"name":"B","description":"","attributes":[]}}
    ],"edges":[
        {"id":"e","source":"a","target":"b"},
        {"id":"e","source":"b","target":"a"}
    ]}"#;
    let err = persist::parse_document(edges).unwrap().apply_to(&mut db).unwrap_err();
    assert!(err.to_string().contains("edge id e is used more than once"));
    assert_eq!(db.node_count(), 0);
}

#[test]
fn load_rejects_empty_names_and_keys() {
    let (mut ed, rx) = editor();
    let empty_name = r#"{"nodes":[
        {"id":"a","position":{"x":0,"y":0},"data":{"name":"","description":"","attributes":[]}}
    ],"edges":[]}"#;
    let err = ed.load_document(empty_name).unwrap_err();
    assert!(matches!(err, PersistError::Invalid(ValidationError::EmptyName)));

    let empty_key = r#"{"nodes":[
        {"id":"a","position":{"x":0,"y":0},"data":{"name":"A","description":"","attributes":[
            {"key":"","value":"v","visible":true,"connectable":false,"type":"input"}
        ]}}
    ],"edges":[]}"#;
    let err = ed.load_document(empty_key).unwrap_err();
    assert!(matches!(err, PersistError::Invalid(ValidationError::EmptyAttributeKey)));
    assert_eq!(ed.graph().node_count(), 0);
    assert_eq!(notices(&rx).len(), 2);
}

#[test]
fn load_rejects_negative_zoom() {
    let mut db = new_db();
    let doc = r#"{"nodes":[],"edges":[],"viewport":{"x":0,"y":0,"zoom":-1}}"#;
    let err = persist::parse_document(doc).unwrap().apply_to(&mut db).unwrap_err();
    assert_eq!(err, ValidationError::InvalidViewport);
    assert_eq!(db.viewport(), Viewport::default());
}

#[test]
fn unchanged_selection_keeps_revision() {
    let mut db = new_db();
    let a = named(&mut db, "A", vec![]);
    db.set_selection(&[a.clone()], &[]);
    let revision = db.revision();
    db.set_selection(&[a.clone()], &[]);
    assert_eq!(db.revision(), revision);
    db.set_selection(&[], &[]);
    assert!(db.revision() > revision);
}

#[test]
fn save_then_load_round_trip() {
    let mut db = new_db();
    let a = named(&mut db, "A", ports());
    let b = named(&mut db, "B", ports());
    let c = named(&mut db, "C", vec![]);
    let rules = ConnectRules::default();
    db.add_edge(&Connection::between(a.clone(), b.clone()).with_handles(Some("out"), Some("in")), rules).unwrap();
    db.add_edge(&Connection::between(b.clone(), c.clone()), rules).unwrap();
    db.set_collapsed(&b, true).unwrap();
    db.set_node_dimensions(&c, 220.0, 80.0).unwrap();
    db.move_nodes(&[(a, Position::new(-40.5, 12.25))]);
    db.set_viewport(Viewport { x: 10.0, y: -20.0, zoom: 1.5 }).unwrap();

    let text = GraphDocument::from_graph(&db).to_json().unwrap();
    let mut restored = new_db();
    let counts = persist::parse_document(&text).unwrap().apply_to(&mut restored).unwrap();
    assert_eq!(counts, (3, 2));
    assert_eq!(restored.nodes(), db.nodes());
    assert_eq!(restored.edges(), db.edges());
    assert_eq!(restored.viewport(), db.viewport());
}

#[test]
fn save_reports_outcomes() {
    struct Dismissed;
    impl FileSaver for Dismissed {
        fn save(&mut self, _: &str, _: &str) -> std::io::Result<SaveOutcome> {
            Ok(SaveOutcome::Cancelled)
        }
    }
    struct Broken;
    impl FileSaver for Broken {
        fn save(&mut self, _: &str, _: &str) -> std::io::Result<SaveOutcome> {
            Err(std::io::Error::other("disk full"))
        }
    }

    let (mut ed, rx) = editor();
    ed.add_node();
    assert!(matches!(ed.save_with(&mut Dismissed), Err(PersistError::Cancelled)));
    assert!(notices(&rx).is_empty(), "cancelling is not an error");
    assert!(matches!(ed.save_with(&mut Broken), Err(PersistError::Io(_))));
    assert_eq!(notices(&rx), vec![(NoticeLevel::Error, "Save Error".to_string())]);

    let dir = std::env::temp_dir().join(format!("flow-loom-{}", Uuid::new_v4()));
    let path = ed.save_with(&mut DirectorySaver::new(&dir)).unwrap();
    let (mut other, rx2) = editor();
    assert_eq!(other.load_from_path(&path).unwrap(), (1, 0));
    assert_eq!(notices(&rx2), vec![(NoticeLevel::Info, "Graph Loaded".to_string())]);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn spatial_query_culls_offscreen_nodes() {
    let mut db = new_db();
    let id = db.add_node(Some(Position::new(1000.0, 1000.0))).id;
    db.set_node_dimensions(&id, 180.0, 100.0).unwrap();
    let viewport = Viewport { x: 0.0, y: 0.0, zoom: 1.0 };
    let size = VisibleSize::new(800.0, 600.0);

    let index = SpatialIndex::build(db.nodes(), (180.0, 100.0));
    assert!(index.query(&viewport, size, 0.0).is_empty());

    db.move_nodes(&[(id.clone(), Position::new(400.0, 300.0))]);
    let index = SpatialIndex::build(db.nodes(), (180.0, 100.0));
    assert!(index.query(&viewport, size, 0.0).contains(&id));
    assert!(index.query(&Viewport { zoom: 0.0, ..viewport }, size, 0.0).is_empty());
}

#[test]
fn editor_visible_nodes_track_moves() {
    let (mut ed, _rx) = editor();
    ed.set_visible_size(800.0, 600.0);
    let id = ed.add_node().id;
    assert!(ed.visible_nodes().contains(&id));
    ed.set_viewport(Viewport { x: -5000.0, y: 0.0, zoom: 1.0 }).unwrap();
    assert!(!ed.visible_nodes().contains(&id));
}

#[test]
fn search_debounce_and_clear() {
    let (mut ed, _rx) = editor();
    ed.add_node();
    let t0 = Instant::now();
    ed.set_search_query("zzz", t0);
    ed.poll_timers(t0 + 299 * MS);
    assert_eq!(ed.next_deadline(), Some(t0 + 300 * MS));
    ed.poll_timers(t0 + 300 * MS);
    assert!(ed.highlights().searched.is_empty());
    assert_eq!(ed.next_deadline(), None);

    ed.set_search_query("node", t0 + 400 * MS);
    ed.poll_timers(t0 + 700 * MS);
    assert_eq!(ed.highlights().searched.len(), 1);
    ed.set_search_query("", t0 + 800 * MS);
    assert!(ed.highlights().searched.is_empty());
    assert_eq!(ed.next_deadline(), None);
}

#[test]
fn double_click_runs_exactly_one_edit_action() {
    let (mut ed, rx) = editor();
    let a = ed.add_node().id;
    let b = ed.add_node().id;
    ed.connect(&Connection::between(a.clone(), b)).unwrap();
    let _ = rx.try_iter().count();

    let t0 = Instant::now();
    let click = InputEvent::Click { target: PointerTarget::Node(a.clone()), device: PointerDevice::Mouse };
    ed.handle_input(click.clone(), t0);
    ed.handle_input(click, t0 + 120 * MS);
    ed.poll_timers(t0 + 1000 * MS);

    let events: Vec<EditorEvent> = rx
        .try_iter()
        .filter_map(|m| match m {
            HostMessage::Event(e) => Some(e),
            HostMessage::Notice(_) => None,
        })
        .collect();
    let opened = events.iter().filter(|e| matches!(e, EditorEvent::OpenNodeEditor(n) if n.id == a)).count();
    let highlighted = events.iter().filter(|e| matches!(e, EditorEvent::HighlightChanged(_))).count();
    assert_eq!(opened, 1);
    assert_eq!(highlighted, 0);
    assert!(ed.highlights().is_empty());
}

#[test]
fn pane_click_clears_highlights() {
    let (mut ed, _rx) = editor();
    let a = ed.add_node().id;
    let b = ed.add_node().id;
    ed.connect(&Connection::between(a.clone(), b)).unwrap();
    let t0 = Instant::now();
    ed.handle_input(InputEvent::Click { target: PointerTarget::Node(a), device: PointerDevice::Mouse }, t0);
    ed.poll_timers(t0 + 250 * MS);
    assert_eq!(ed.highlights().nodes.len(), 1);
    assert_eq!(ed.highlights().edges.len(), 1);
    ed.handle_input(InputEvent::Click { target: PointerTarget::Pane, device: PointerDevice::Mouse }, t0 + 300 * MS);
    assert!(ed.highlights().is_empty());
}

#[test]
fn node_editor_rejection_keeps_editor_open() {
    let (mut ed, rx) = editor();
    let a = ed.add_node().id;
    let b = ed.add_node().id;
    let taken = ed.graph().get_node(&b).unwrap().data.name.clone();
    let t0 = Instant::now();
    let click = InputEvent::Click { target: PointerTarget::Node(a.clone()), device: PointerDevice::Mouse };
    ed.handle_input(click.clone(), t0);
    ed.handle_input(click, t0 + 10 * MS);
    assert!(ed.editing().is_some());

    assert!(ed.commit_node_edit(&a, NodeData::new(taken, "", vec![])).is_err());
    assert!(ed.editing().is_some());
    assert_eq!(notices(&rx), vec![(NoticeLevel::Error, "Validation Error".to_string())]);
    assert!(ed.commit_node_edit(&a, NodeData::new("Renamed", "", vec![])).is_ok());
    assert!(ed.editing().is_none());
    assert!(ed.graph().find_node_by_name("Renamed").is_some());
}

#[test]
fn edge_editor_assigns_type_and_keeps_endpoints() {
    let (mut ed, _rx) = editor();
    let a = ed.add_node().id;
    let b = ed.add_node().id;
    let edge = ed.connect(&Connection::between(a.clone(), b.clone())).unwrap();
    assert!(edge.is_provisional());

    let mut moved = edge.clone();
    moved.target = a.clone();
    assert_eq!(ed.commit_edge_edit(moved), Err(ValidationError::EndpointChange(edge.id.clone())));

    let mut relabelled = edge.clone();
    relabelled.label = "owns".into();
    ed.commit_edge_edit(relabelled).unwrap();
    let stored = ed.graph().get_edge(&edge.id).unwrap();
    assert_eq!(stored.edge_type.as_deref(), Some("custom"));
    assert!(!stored.is_provisional());

    // A typed edge is no longer superseded by the next connect.
    ed.connect(&Connection::between(a, b)).unwrap();
    assert_eq!(ed.graph().edge_count(), 2);
}

#[tokio::test]
async fn delete_waits_for_confirmation() {
    let (mut ed, _rx) = editor();
    let a = ed.add_node().id;
    let b = ed.add_node().id;
    ed.connect(&Connection::between(a.clone(), b.clone())).unwrap();

    let pending = ed.request_delete(vec![a.clone()], vec![]);
    let prompt = ed.pending_confirmation().cloned().unwrap();
    assert_eq!(prompt.title, "Delete Confirmation");
    assert!(prompt.message.starts_with("Are you sure you want to delete node(s)"));
    assert_eq!(ed.graph().node_count(), 2, "nothing happens before the answer");

    let summary = ed.resolve_confirmation(true).unwrap();
    assert!(pending.wait().await);
    assert_eq!((summary.nodes, summary.edges), (1, 1));
    assert!(ed.pending_confirmation().is_none());
    assert!(ed.graph().get_node(&b).is_some());
}

#[tokio::test]
async fn declined_delete_changes_nothing() {
    let (mut ed, _rx) = editor();
    let a = ed.add_node().id;
    let pending = ed.request_delete(vec![a.clone()], vec![]);
    assert!(ed.resolve_confirmation(false).is_none());
    assert!(!pending.wait().await);
    assert!(ed.pending_confirmation().is_none());
    assert_eq!(ed.graph().node_count(), 1);
}

#[tokio::test]
async fn second_delete_while_pending_resolves_false() {
    let (mut ed, _rx) = editor();
    let a = ed.add_node().id;
    let b = ed.add_node().id;
    let first = ed.request_delete(vec![a], vec![]);
    let second = ed.request_delete(vec![b], vec![]);
    assert!(!second.wait().await);
    ed.resolve_confirmation(true);
    assert!(first.wait().await);
    assert_eq!(ed.graph().node_count(), 1);
}

#[tokio::test]
async fn empty_delete_short_circuits() {
    let (mut ed, _rx) = editor();
    let nothing = ed.request_delete_selection();
    assert!(!nothing.wait().await);
    assert!(ed.pending_confirmation().is_none());
}

#[tokio::test]
async fn dropping_editor_resolves_pending_confirmation() {
    let (mut ed, _rx) = editor();
    let a = ed.add_node().id;
    let pending = ed.request_delete(vec![a], vec![]);
    drop(ed);
    assert!(!pending.wait().await);
}

#[test]
fn editors_do_not_share_timers() {
    let (mut one, _r1) = editor();
    let (mut two, _r2) = editor();
    let a = one.add_node().id;
    let t0 = Instant::now();
    one.handle_input(InputEvent::Click { target: PointerTarget::Node(a), device: PointerDevice::Mouse }, t0);
    assert!(one.next_deadline().is_some());
    assert!(two.next_deadline().is_none());
    two.handle_input(InputEvent::DragStart { node: "x".into() }, t0);
    assert!(two.next_deadline().is_none());
    assert!(!matches!(one.click_state(), flow_loom::interaction::controller::ClickState::Dragging));
}
