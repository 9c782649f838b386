//! Auto-layout: a layered (Sugiyama style) drawing of the directed graph.
//!
//! The algorithm sits behind [`LayoutAlgorithm`] so hosts can plug in their
//! own. It only ever hands back node centroids; the adapter turns those into
//! top-left positions and swaps new snapshots into the graph.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::graph::{Edge, GraphDatabase, Node, Position};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayoutDirection {
    #[serde(rename = "TB")]
    TopBottom,
    #[default]
    #[serde(rename = "LR")]
    LeftRight,
}

impl FromStr for LayoutDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TB" => Ok(LayoutDirection::TopBottom),
            "LR" => Ok(LayoutDirection::LeftRight),
            other => Err(format!("unknown layout direction '{}', expected TB or LR", other)),
        }
    }
}

impl fmt::Display for LayoutDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutDirection::TopBottom => write!(f, "TB"),
            LayoutDirection::LeftRight => write!(f, "LR"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub direction: LayoutDirection,
    // Footprint for nodes the renderer has not measured yet.
    pub node_width: f64,
    pub node_height: f64,
    // Gap between adjacent ranks.
    pub rank_sep: f64,
    // Gap between neighbours within a rank.
    pub node_sep: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            direction: LayoutDirection::LeftRight,
            node_width: 180.0,
            node_height: 100.0,
            rank_sep: 200.0,
            node_sep: 100.0,
        }
    }
}

impl LayoutConfig {
    pub fn default_footprint(&self) -> (f64, f64) {
        (self.node_width, self.node_height)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutBox {
    pub width: f64,
    pub height: f64,
}

pub trait LayoutAlgorithm {
    /// Return one centroid per entry of `boxes`, in the same order. `edges`
    /// index into `boxes`; self loops and duplicates may be present.
    fn centroids(&self, boxes: &[LayoutBox], edges: &[(usize, usize)], config: &LayoutConfig) -> Vec<Position>;
}

/// Longest-path ranking with barycentric crossing reduction.
#[derive(Clone, Debug)]
pub struct LayeredLayout {
    pub ordering_sweeps: usize,
}

impl Default for LayeredLayout {
    fn default() -> Self {
        Self { ordering_sweeps: 4 }
    }
}

impl LayoutAlgorithm for LayeredLayout {
    fn centroids(&self, boxes: &[LayoutBox], edges: &[(usize, usize)], config: &LayoutConfig) -> Vec<Position> {
        let n = boxes.len();
        if n == 0 {
            return Vec::new();
        }
        let dag = acyclic_edges(n, edges);
        let ranks = longest_path_ranks(n, &dag);
        let layers = order_layers(n, &dag, &ranks, self.ordering_sweeps);
        assign_coordinates(boxes, &layers, config)
    }
}

// Drop self loops and duplicates, then reverse DFS back edges so the rest of
// the pipeline sees a DAG.
fn acyclic_edges(n: usize, edges: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let mut unique = Vec::new();
    let mut seen = HashSet::new();
    for &(s, t) in edges {
        if s != t && s < n && t < n && seen.insert((s, t)) {
            unique.push((s, t));
        }
    }

    let mut out_edges: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, &(s, _)) in unique.iter().enumerate() {
        out_edges[s].push(i);
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        OnStack,
        Done,
    }
    let mut mark = vec![Mark::Unvisited; n];
    let mut reversed = HashSet::new();
    for root in 0..n {
        if mark[root] != Mark::Unvisited {
            continue;
        }
        // Iterative DFS: (node, next outgoing edge position)
        let mut stack = vec![(root, 0usize)];
        mark[root] = Mark::OnStack;
        while let Some(top) = stack.last_mut() {
            let node = top.0;
            if let Some(&edge_idx) = out_edges[node].get(top.1) {
                top.1 += 1;
                let target = unique[edge_idx].1;
                match mark[target] {
                    Mark::OnStack => {
                        reversed.insert(edge_idx);
                    }
                    Mark::Unvisited => {
                        mark[target] = Mark::OnStack;
                        stack.push((target, 0));
                    }
                    Mark::Done => {}
                }
            } else {
                mark[node] = Mark::Done;
                stack.pop();
            }
        }
    }

    let mut dag = Vec::with_capacity(unique.len());
    let mut dag_seen = HashSet::new();
    for (i, &(s, t)) in unique.iter().enumerate() {
        let e = if reversed.contains(&i) { (t, s) } else { (s, t) };
        if dag_seen.insert(e) {
            dag.push(e);
        }
    }
    dag
}

fn longest_path_ranks(n: usize, dag: &[(usize, usize)]) -> Vec<usize> {
    let mut indegree = vec![0usize; n];
    let mut succ: Vec<Vec<usize>> = vec![Vec::new(); n];
    for &(s, t) in dag {
        indegree[t] += 1;
        succ[s].push(t);
    }
    let mut rank = vec![0usize; n];
    let mut queue: VecDeque<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
    while let Some(node) = queue.pop_front() {
        for &next in &succ[node] {
            rank[next] = rank[next].max(rank[node] + 1);
            indegree[next] -= 1;
            if indegree[next] == 0 {
                queue.push_back(next);
            }
        }
    }
    rank
}

fn order_layers(n: usize, dag: &[(usize, usize)], ranks: &[usize], sweeps: usize) -> Vec<Vec<usize>> {
    let depth = ranks.iter().copied().max().unwrap_or(0) + 1;
    let mut layers: Vec<Vec<usize>> = vec![Vec::new(); depth];
    for node in 0..n {
        layers[ranks[node]].push(node);
    }

    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut succs: Vec<Vec<usize>> = vec![Vec::new(); n];
    for &(s, t) in dag {
        preds[t].push(s);
        succs[s].push(t);
    }

    let mut best = layers.clone();
    let mut best_crossings = count_crossings(&layers, dag, ranks);
    for sweep in 0..sweeps {
        if sweep % 2 == 0 {
            for r in 1..depth {
                reorder(&mut layers, r, &preds);
            }
        } else {
            for r in (0..depth.saturating_sub(1)).rev() {
                reorder(&mut layers, r, &succs);
            }
        }
        let crossings = count_crossings(&layers, dag, ranks);
        if crossings < best_crossings {
            best_crossings = crossings;
            best = layers.clone();
        }
    }
    best
}

// Sort one layer by the mean position of each node's neighbours. Nodes without
// neighbours keep their slot.
fn reorder(layers: &mut [Vec<usize>], rank: usize, neighbours: &[Vec<usize>]) {
    let mut slot: HashMap<usize, f64> = HashMap::new();
    for layer in layers.iter() {
        let len = layer.len().max(1) as f64;
        for (i, &node) in layer.iter().enumerate() {
            slot.insert(node, i as f64 / len);
        }
    }
    let layer = &layers[rank];
    let len = layer.len().max(1) as f64;
    let mut keyed: Vec<(f64, usize)> = layer
        .iter()
        .enumerate()
        .map(|(i, &node)| {
            let around: Vec<f64> = neighbours[node].iter().filter_map(|m| slot.get(m).copied()).collect();
            let key = if around.is_empty() {
                i as f64 / len
            } else {
                around.iter().sum::<f64>() / around.len() as f64
            };
            (key, node)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
    layers[rank] = keyed.into_iter().map(|(_, node)| node).collect();
}

// Crossings between edges that join adjacent ranks.
fn count_crossings(layers: &[Vec<usize>], dag: &[(usize, usize)], ranks: &[usize]) -> usize {
    let mut pos = HashMap::new();
    for layer in layers {
        for (i, &node) in layer.iter().enumerate() {
            pos.insert(node, i);
        }
    }
    let mut by_rank: HashMap<usize, Vec<(usize, usize)>> = HashMap::new();
    for &(s, t) in dag {
        if ranks[t] == ranks[s] + 1 {
            by_rank.entry(ranks[s]).or_default().push((pos[&s], pos[&t]));
        }
    }
    let mut total = 0;
    for segment in by_rank.values() {
        for (i, a) in segment.iter().enumerate() {
            for b in &segment[i + 1..] {
                if (a.0 < b.0 && a.1 > b.1) || (a.0 > b.0 && a.1 < b.1) {
                    total += 1;
                }
            }
        }
    }
    total
}

fn assign_coordinates(boxes: &[LayoutBox], layers: &[Vec<usize>], config: &LayoutConfig) -> Vec<Position> {
    let horizontal = config.direction == LayoutDirection::LeftRight;
    // (extent along the rank axis, extent across it)
    let extent = |b: &LayoutBox| if horizontal { (b.width, b.height) } else { (b.height, b.width) };

    let breadths: Vec<f64> = layers
        .iter()
        .map(|layer| {
            let sum: f64 = layer.iter().map(|&i| extent(&boxes[i]).1).sum();
            sum + config.node_sep * layer.len().saturating_sub(1) as f64
        })
        .collect();
    let widest = breadths.iter().copied().fold(0.0, f64::max);

    let mut out = vec![Position::default(); boxes.len()];
    let mut rank_start = 0.0;
    for (layer, breadth) in layers.iter().zip(&breadths) {
        let thickness = layer.iter().map(|&i| extent(&boxes[i]).0).fold(0.0, f64::max);
        let mut cursor = (widest - breadth) / 2.0;
        for &i in layer {
            let (_, across) = extent(&boxes[i]);
            let main = rank_start + thickness / 2.0;
            let cross = cursor + across / 2.0;
            out[i] = if horizontal { Position::new(main, cross) } else { Position::new(cross, main) };
            cursor += across + config.node_sep;
        }
        rank_start += thickness + config.rank_sep;
    }
    out
}

/// Run `algorithm` over the given snapshot and return fresh node/edge
/// collections. Only node positions differ from the input.
pub fn layout_elements(
    nodes: &[Node],
    edges: &[Edge],
    config: &LayoutConfig,
    algorithm: &dyn LayoutAlgorithm,
) -> (Vec<Node>, Vec<Edge>) {
    let fallback = config.default_footprint();
    let index: HashMap<&str, usize> = nodes.iter().enumerate().map(|(i, n)| (n.id.as_str(), i)).collect();
    let boxes: Vec<LayoutBox> = nodes
        .iter()
        .map(|n| {
            let (width, height) = n.footprint(fallback);
            LayoutBox { width, height }
        })
        .collect();
    let pairs: Vec<(usize, usize)> = edges
        .iter()
        .filter_map(|e| Some((*index.get(e.source.as_str())?, *index.get(e.target.as_str())?)))
        .collect();

    let centres = algorithm.centroids(&boxes, &pairs, config);
    let laid_out = nodes
        .iter()
        .zip(&boxes)
        .enumerate()
        .map(|(i, (node, b))| {
            let mut node = node.clone();
            if let Some(c) = centres.get(i) {
                node.position = Position::new(c.x - b.width / 2.0, c.y - b.height / 2.0);
            }
            node
        })
        .collect();
    (laid_out, edges.to_vec())
}

impl GraphDatabase {
    /// Lay the graph out and swap the result in as one update.
    pub fn apply_layout(&mut self, config: &LayoutConfig, algorithm: &dyn LayoutAlgorithm) {
        let (nodes, edges) = layout_elements(self.nodes(), self.edges(), config, algorithm);
        log::debug!("layout {} placed {} node(s)", config.direction, nodes.len());
        self.replace_snapshots(nodes, edges);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_utils::connect::{ConnectRules, Connection};

    fn boxes(n: usize) -> Vec<LayoutBox> {
        vec![LayoutBox { width: 180.0, height: 100.0 }; n]
    }

    #[test]
    fn chain_is_ranked_left_to_right() {
        let config = LayoutConfig::default();
        let out = LayeredLayout::default().centroids(&boxes(3), &[(0, 1), (1, 2)], &config);
        assert!(out[0].x < out[1].x && out[1].x < out[2].x);
        assert_eq!(out[1].x - out[0].x, 180.0 + config.rank_sep);
        assert_eq!(out[0].y, out[1].y);
    }

    #[test]
    fn chain_is_ranked_top_to_bottom() {
        let config = LayoutConfig { direction: LayoutDirection::TopBottom, ..Default::default() };
        let out = LayeredLayout::default().centroids(&boxes(2), &[(0, 1)], &config);
        assert_eq!(out[1].y - out[0].y, 100.0 + config.rank_sep);
        assert_eq!(out[0].x, out[1].x);
    }

    #[test]
    fn siblings_share_a_rank_and_are_separated() {
        let config = LayoutConfig { direction: LayoutDirection::TopBottom, ..Default::default() };
        let out = LayeredLayout::default().centroids(&boxes(3), &[(0, 1), (0, 2)], &config);
        assert_eq!(out[1].y, out[2].y);
        assert_eq!((out[1].x - out[2].x).abs(), 180.0 + config.node_sep);
    }

    #[test]
    fn cycles_and_self_loops_still_terminate() {
        let config = LayoutConfig::default();
        let out = LayeredLayout::default().centroids(&boxes(3), &[(0, 1), (1, 2), (2, 0), (1, 1)], &config);
        assert_eq!(out.len(), 3);
        let xs: HashSet<i64> = out.iter().map(|p| p.x as i64).collect();
        assert_eq!(xs.len(), 3);
    }

    #[test]
    fn barycenter_removes_simple_crossing() {
        // 0 -> 3, 1 -> 2 starts crossed when ranks are filled in input order.
        let dag = vec![(0, 3), (1, 2)];
        let ranks = longest_path_ranks(4, &dag);
        let layers = order_layers(4, &dag, &ranks, 4);
        assert_eq!(count_crossings(&layers, &dag, &ranks), 0);
    }

    // `a` is measured at 300x60, `b` falls back to the 180x100 default.
    fn measured_pair() -> GraphDatabase {
        let mut db = GraphDatabase::new();
        let a = db.add_node(Some(Position::new(-5.0, -5.0))).id;
        let b = db.add_node(Some(Position::new(7.0, 7.0))).id;
        db.set_node_dimensions(&a, 300.0, 60.0).unwrap();
        db.add_edge(&Connection::between(a, b), ConnectRules::default()).unwrap();
        db
    }

    #[test]
    fn adapter_turns_centroids_into_top_left_positions() {
        let db = measured_pair();
        let cases = [
            (LayoutDirection::LeftRight, Position::new(0.0, 20.0), Position::new(500.0, 0.0)),
            (LayoutDirection::TopBottom, Position::new(0.0, 0.0), Position::new(60.0, 260.0)),
        ];
        for (direction, a_pos, b_pos) in cases {
            let config = LayoutConfig { direction, ..Default::default() };
            let (nodes, edges) = layout_elements(db.nodes(), db.edges(), &config, &LayeredLayout::default());
            assert_eq!(nodes[0].position, a_pos, "{}", direction);
            assert_eq!(nodes[1].position, b_pos, "{}", direction);
            assert_eq!(edges, db.edges());
            for (after, before) in nodes.iter().zip(db.nodes()) {
                assert_eq!(Node { position: before.position, ..after.clone() }, *before);
            }
        }
    }

    #[test]
    fn empty_graph_is_fine() {
        assert!(LayeredLayout::default().centroids(&[], &[], &LayoutConfig::default()).is_empty());
    }

    #[test]
    fn direction_parses() {
        assert_eq!("tb".parse::<LayoutDirection>(), Ok(LayoutDirection::TopBottom));
        assert!("XY".parse::<LayoutDirection>().is_err());
    }
}
