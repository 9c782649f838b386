use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use time::macros::format_description;

use crate::graph_utils::errors::ValidationError;
use crate::graph_utils::graph::{Edge, GraphDatabase, Node, Viewport};

pub const DEFAULT_FILE_NAME: &str = "graph.json";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("file access failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("The file contains invalid JSON and cannot be parsed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    /// The user dismissed the save dialog. Not a failure.
    #[error("save cancelled")]
    Cancelled,
}

/// On-disk shape: `{nodes, edges, viewport?}` with no version field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
}

impl GraphDocument {
    pub fn from_graph(db: &GraphDatabase) -> Self {
        Self { nodes: db.nodes().to_vec(), edges: db.edges().to_vec(), viewport: Some(db.viewport()) }
    }

    pub fn to_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Replace the graph with this document. Returns (nodes, edges) loaded.
    pub fn apply_to(self, db: &mut GraphDatabase) -> Result<(usize, usize), ValidationError> {
        let counts = (self.nodes.len(), self.edges.len());
        db.load(self.nodes, self.edges, self.viewport)?;
        Ok(counts)
    }
}

/// Parse and shape-check a document without touching any graph.
pub fn parse_document(text: &str) -> Result<GraphDocument, PersistError> {
    let value: Value = serde_json::from_str(text)?;
    validate_structure(&value).map_err(ValidationError::MalformedDocument)?;
    serde_json::from_value(value)
        .map_err(|e| PersistError::Invalid(ValidationError::MalformedDocument(format!("Invalid graph: {}", e))))
}

fn invalid(path: &str, expected: &str) -> String {
    format!("Invalid graph: {} must be {}.", path, expected)
}

fn require<'a>(v: &'a Value, field: &str, path: &str) -> Result<&'a Value, String> {
    v.get(field).ok_or_else(|| format!("Invalid graph: {}.{} is missing.", path, field))
}

fn require_str(v: &Value, field: &str, path: &str) -> Result<(), String> {
    match require(v, field, path)? {
        Value::String(_) => Ok(()),
        _ => Err(invalid(&format!("{}.{}", path, field), "a string")),
    }
}

fn require_number(v: &Value, field: &str, path: &str) -> Result<(), String> {
    match require(v, field, path)? {
        Value::Number(_) => Ok(()),
        _ => Err(invalid(&format!("{}.{}", path, field), "a number")),
    }
}

fn require_bool(v: &Value, field: &str, path: &str) -> Result<(), String> {
    match require(v, field, path)? {
        Value::Bool(_) => Ok(()),
        _ => Err(invalid(&format!("{}.{}", path, field), "a boolean")),
    }
}

/// Structural check of a parsed document. The message names the first
/// offending path, e.g. `nodes[2].data.attributes[0].type`.
pub fn validate_structure(doc: &Value) -> Result<(), String> {
    if !doc.is_object() {
        return Err("Invalid graph: the document must be an object with nodes and edges arrays.".to_string());
    }
    let nodes = doc.get("nodes").and_then(Value::as_array).ok_or_else(|| invalid("nodes", "an array"))?;
    let edges = doc.get("edges").and_then(Value::as_array).ok_or_else(|| invalid("edges", "an array"))?;

    for (i, node) in nodes.iter().enumerate() {
        let path = format!("nodes[{}]", i);
        if !node.is_object() {
            return Err(invalid(&path, "an object"));
        }
        require_str(node, "id", &path)?;
        let position = require(node, "position", &path)?;
        let pos_path = format!("{}.position", path);
        require_number(position, "x", &pos_path)?;
        require_number(position, "y", &pos_path)?;

        let data = require(node, "data", &path)?;
        let data_path = format!("{}.data", path);
        if !data.is_object() {
            return Err(invalid(&data_path, "an object"));
        }
        require_str(data, "name", &data_path)?;
        require_str(data, "description", &data_path)?;
        let attrs = require(data, "attributes", &data_path)?
            .as_array()
            .ok_or_else(|| invalid(&format!("{}.attributes", data_path), "an array"))?;
        for (j, attr) in attrs.iter().enumerate() {
            let attr_path = format!("{}.attributes[{}]", data_path, j);
            if !attr.is_object() {
                return Err(invalid(&attr_path, "an object"));
            }
            require_str(attr, "key", &attr_path)?;
            require_str(attr, "value", &attr_path)?;
            require_bool(attr, "visible", &attr_path)?;
            require_bool(attr, "connectable", &attr_path)?;
            match attr.get("type").and_then(Value::as_str) {
                Some("input") | Some("output") => {}
                _ => return Err(invalid(&format!("{}.type", attr_path), "\"input\" or \"output\"")),
            }
        }
    }

    for (i, edge) in edges.iter().enumerate() {
        let path = format!("edges[{}]", i);
        if !edge.is_object() {
            return Err(invalid(&path, "an object"));
        }
        require_str(edge, "id", &path)?;
        require_str(edge, "source", &path)?;
        require_str(edge, "target", &path)?;
    }

    if let Some(viewport) = doc.get("viewport") {
        if !viewport.is_object() {
            return Err(invalid("viewport", "an object"));
        }
        for field in ["x", "y", "zoom"] {
            require_number(viewport, field, "viewport")?;
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(PathBuf),
    Cancelled,
}

/// The host's file-save capability: a native dialog, a download, or a plain
/// directory.
pub trait FileSaver {
    fn save(&mut self, suggested_name: &str, contents: &str) -> std::io::Result<SaveOutcome>;
}

/// Writes straight into a directory without asking.
#[derive(Debug, Clone)]
pub struct DirectorySaver {
    dir: PathBuf,
}

impl DirectorySaver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl FileSaver for DirectorySaver {
    fn save(&mut self, suggested_name: &str, contents: &str) -> std::io::Result<SaveOutcome> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(suggested_name);
        atomic_write(&path, contents.as_bytes())?;
        Ok(SaveOutcome::Saved(path))
    }
}

fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    {
        let mut f = File::create(&tmp_path)?;
        f.write_all(data)?;
        f.flush()?;
    }
    fs::rename(tmp_path, path)?;
    Ok(())
}

pub fn save_to_path(path: &Path, doc: &GraphDocument) -> Result<(), PersistError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    atomic_write(path, doc.to_json()?.as_bytes())?;
    Ok(())
}

pub fn load_from_path(path: &Path) -> Result<GraphDocument, PersistError> {
    let mut f = File::open(path)?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    parse_document(&buf)
}

pub fn versioned_path_now(dir: &Path) -> PathBuf {
    let now = OffsetDateTime::now_utc();
    let fmt = format_description!("[year][month][day]_[hour][minute][second]");
    let stamp = now.format(fmt).unwrap_or_else(|_| "unknown".to_string());
    dir.join(format!("graph_{}.json", stamp))
}

pub fn save_versioned(dir: &Path, doc: &GraphDocument) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = versioned_path_now(dir);
    atomic_write(&path, doc.to_json()?.as_bytes())?;
    log::info!("wrote snapshot {}", path.display());
    Ok(path)
}

/// Versioned snapshots in `dir`, newest first.
pub fn list_versions(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut entries: Vec<PathBuf> = Vec::new();
    if dir.exists() {
        for e in fs::read_dir(dir)? {
            let p = e?.path();
            if let Some(name) = p.file_name().and_then(|s| s.to_str())
                && name.starts_with("graph_") && name.ends_with(".json")
            {
                entries.push(p);
            }
        }
    }
    // sort descending by filename (timestamp)
    entries.sort();
    entries.reverse();
    Ok(entries)
}
