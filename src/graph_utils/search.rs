use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use crate::interaction::timers::Debouncer;

use super::graph::{Node, NodeId};

pub const DEFAULT_SEARCH_DELAY: Duration = Duration::from_millis(300);

/// Case-insensitive substring match over node names. An empty query matches
/// nothing.
pub fn matching_node_ids(nodes: &[Node], query: &str) -> BTreeSet<NodeId> {
    if query.is_empty() {
        return BTreeSet::new();
    }
    let needle = query.to_lowercase();
    nodes
        .iter()
        .filter(|n| n.data.name.to_lowercase().contains(&needle))
        .map(|n| n.id.clone())
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchUpdate {
    /// Query went empty; highlights should be dropped right away.
    Cleared,
    /// A recomputation is pending until the debounce delay passes.
    Scheduled,
}

/// Debounced search box state.
#[derive(Debug)]
pub struct SearchEngine {
    query: String,
    debounce: Debouncer<String>,
}

impl SearchEngine {
    pub fn new(delay: Duration) -> Self {
        Self { query: String::new(), debounce: Debouncer::new(delay) }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, query: &str, now: Instant) -> SearchUpdate {
        self.query = query.to_string();
        if query.is_empty() {
            self.debounce.cancel();
            return SearchUpdate::Cleared;
        }
        self.debounce.call(self.query.clone(), now);
        SearchUpdate::Scheduled
    }

    /// Matches for the settled query, once the quiet period has elapsed.
    pub fn poll(&mut self, now: Instant, nodes: &[Node]) -> Option<BTreeSet<NodeId>> {
        let query = self.debounce.poll(now)?;
        let hits = matching_node_ids(nodes, &query);
        log::debug!("search '{}' matched {} node(s)", query, hits.len());
        Some(hits)
    }

    pub fn clear(&mut self) {
        self.query.clear();
        self.debounce.cancel();
    }

    pub fn cancel(&mut self) {
        self.debounce.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_DELAY)
    }
}
