//! Graph algorithms over a [`GraphBackend`]: breadth/depth-first search,
//! unweighted shortest path, PageRank, and Brandes' betweenness centrality.
//!
//! The traverser borrows the backend rather than owning it, so it always
//! runs over the database's current state and never takes a write lock of
//! its own.

use crate::error::Result;
use graphdb_api::{Direction, Edge, EdgeId, GraphBackend, NodeId};
use std::collections::{HashMap, HashSet, VecDeque};

/// The result of a BFS or DFS walk: visit order, the edges traversed to
/// reach each newly-visited node, and each node's depth from `start`.
#[derive(Debug, Clone, PartialEq)]
pub struct WalkResult {
    pub nodes: Vec<NodeId>,
    pub edges: Vec<EdgeId>,
    pub hops: HashMap<NodeId, usize>,
}

/// An unweighted path between two nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct PathResult {
    pub nodes: Vec<NodeId>,
    pub edges: Vec<EdgeId>,
}

pub struct Traverser<'a> {
    backend: &'a dyn GraphBackend,
}

impl<'a> Traverser<'a> {
    pub fn new(backend: &'a dyn GraphBackend) -> Self {
        Traverser { backend }
    }

    /// Breadth-first walk from `start`. `edge_types` empty means any type.
    pub fn bfs(
        &self,
        start: NodeId,
        direction: Direction,
        edge_types: &[String],
        max_depth: usize,
        max_results: usize,
    ) -> Result<WalkResult> {
        self.backend.get_node(start)?;

        let mut visited = HashSet::new();
        let mut hops = HashMap::new();
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        let mut queue = VecDeque::new();

        visited.insert(start);
        hops.insert(start, 0);
        nodes.push(start);
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            let depth = hops[&current];
            if depth >= max_depth {
                continue;
            }
            for (edge, neighbor) in self.neighbors(current, direction, edge_types)? {
                if nodes.len() >= max_results {
                    return Ok(WalkResult { nodes, edges, hops });
                }
                if visited.insert(neighbor) {
                    hops.insert(neighbor, depth + 1);
                    nodes.push(neighbor);
                    edges.push(edge.id);
                    queue.push_back(neighbor);
                }
            }
        }
        Ok(WalkResult { nodes, edges, hops })
    }

    /// Depth-first walk from `start`, using an explicit stack rather than
    /// recursion so depth is bounded only by `max_depth`. Same contract as
    /// [`Traverser::bfs`] but visits in depth-first order.
    pub fn dfs(
        &self,
        start: NodeId,
        direction: Direction,
        edge_types: &[String],
        max_depth: usize,
        max_results: usize,
    ) -> Result<WalkResult> {
        self.backend.get_node(start)?;

        struct Frame {
            node: NodeId,
            depth: usize,
            via_edge: Option<EdgeId>,
        }

        let mut visited = HashSet::new();
        let mut hops = HashMap::new();
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        let mut stack = vec![Frame { node: start, depth: 0, via_edge: None }];

        while let Some(frame) = stack.pop() {
            if visited.contains(&frame.node) {
                continue;
            }
            visited.insert(frame.node);
            hops.insert(frame.node, frame.depth);
            nodes.push(frame.node);
            if let Some(edge_id) = frame.via_edge {
                edges.push(edge_id);
            }
            if nodes.len() >= max_results {
                break;
            }
            if frame.depth >= max_depth {
                continue;
            }
            let neighbors = self.neighbors(frame.node, direction, edge_types)?;
            for (edge, neighbor) in neighbors.into_iter().rev() {
                if !visited.contains(&neighbor) {
                    stack.push(Frame { node: neighbor, depth: frame.depth + 1, via_edge: Some(edge.id) });
                }
            }
        }
        Ok(WalkResult { nodes, edges, hops })
    }

    /// Unweighted shortest path from `start` to `end`, restricted to
    /// `edge_types` (empty = any), always following outgoing edges — the
    /// natural reading direction of a directed property graph.
    /// `max_depth` defaults to the node count when `None`.
    pub fn shortest_path(
        &self,
        start: NodeId,
        end: NodeId,
        edge_types: &[String],
        max_depth: Option<usize>,
    ) -> Result<PathResult> {
        self.backend.get_node(start)?;
        self.backend.get_node(end)?;
        if start == end {
            return Ok(PathResult { nodes: vec![start], edges: Vec::new() });
        }

        let max_depth = max_depth.unwrap_or(self.backend.statistics().node_count as usize);
        let mut visited = HashSet::new();
        let mut parent: HashMap<NodeId, (NodeId, EdgeId)> = HashMap::new();
        let mut queue = VecDeque::new();

        visited.insert(start);
        queue.push_back((start, 0usize));

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for (edge, neighbor) in self.neighbors(current, Direction::Out, edge_types)? {
                if visited.insert(neighbor) {
                    parent.insert(neighbor, (current, edge.id));
                    if neighbor == end {
                        return Ok(reconstruct_path(start, end, &parent));
                    }
                    queue.push_back((neighbor, depth + 1));
                }
            }
        }
        Err(graphdb_api::Error::not_found("node", end).into())
    }

    /// Standard iterative PageRank: uniform initial distribution, dangling
    /// nodes redistribute their score across every node, fixed iteration
    /// count.
    pub fn page_rank(&self, damping: f64, iterations: usize) -> Result<HashMap<NodeId, f64>> {
        let nodes = self.backend.all_nodes();
        let n = nodes.len();
        if n == 0 {
            return Ok(HashMap::new());
        }
        let n_f = n as f64;

        let mut out_targets: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for node in &nodes {
            let targets = self.backend.outgoing_edges(node.id)?.into_iter().map(|e| e.to_id).collect();
            out_targets.insert(node.id, targets);
        }

        let mut rank: HashMap<NodeId, f64> = nodes.iter().map(|n| (n.id, 1.0 / n_f)).collect();
        for _ in 0..iterations {
            let mut next: HashMap<NodeId, f64> = nodes.iter().map(|n| (n.id, (1.0 - damping) / n_f)).collect();
            let mut dangling_mass = 0.0;
            for node in &nodes {
                let targets = &out_targets[&node.id];
                let score = rank[&node.id];
                if targets.is_empty() {
                    dangling_mass += score;
                } else {
                    let share = damping * score / targets.len() as f64;
                    for target in targets {
                        *next.get_mut(target).expect("target is a known node") += share;
                    }
                }
            }
            let dangling_share = damping * dangling_mass / n_f;
            for node in &nodes {
                *next.get_mut(&node.id).unwrap() += dangling_share;
            }
            rank = next;
        }
        Ok(rank)
    }

    /// Brandes' algorithm. `directed` selects the normalization convention:
    /// `1/((n-1)(n-2))` directed, `2/((n-1)(n-2))` undirected. Centrality is
    /// zero for every node when fewer than 3 nodes exist (the normalizer is
    /// undefined there).
    pub fn betweenness_centrality(&self, directed: bool) -> Result<HashMap<NodeId, f64>> {
        let nodes = self.backend.all_nodes();
        let node_ids: Vec<NodeId> = nodes.iter().map(|n| n.id).collect();
        let n = node_ids.len();
        let mut centrality: HashMap<NodeId, f64> = node_ids.iter().map(|&id| (id, 0.0)).collect();
        if n < 3 {
            return Ok(centrality);
        }

        let mut adjacency: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for &id in &node_ids {
            let mut out: Vec<NodeId> = self.backend.outgoing_edges(id)?.into_iter().map(|e| e.to_id).collect();
            if !directed {
                out.extend(self.backend.incoming_edges(id)?.into_iter().map(|e| e.from_id));
            }
            adjacency.insert(id, out);
        }

        for &source in &node_ids {
            let mut stack = Vec::new();
            let mut predecessors: HashMap<NodeId, Vec<NodeId>> = node_ids.iter().map(|&id| (id, Vec::new())).collect();
            let mut sigma: HashMap<NodeId, f64> = node_ids.iter().map(|&id| (id, 0.0)).collect();
            let mut dist: HashMap<NodeId, i64> = node_ids.iter().map(|&id| (id, -1)).collect();
            *sigma.get_mut(&source).unwrap() = 1.0;
            *dist.get_mut(&source).unwrap() = 0;

            let mut queue = VecDeque::new();
            queue.push_back(source);
            while let Some(v) = queue.pop_front() {
                stack.push(v);
                for &w in &adjacency[&v] {
                    if dist[&w] < 0 {
                        *dist.get_mut(&w).unwrap() = dist[&v] + 1;
                        queue.push_back(w);
                    }
                    if dist[&w] == dist[&v] + 1 {
                        let sigma_v = sigma[&v];
                        *sigma.get_mut(&w).unwrap() += sigma_v;
                        predecessors.get_mut(&w).unwrap().push(v);
                    }
                }
            }

            let mut delta: HashMap<NodeId, f64> = node_ids.iter().map(|&id| (id, 0.0)).collect();
            while let Some(w) = stack.pop() {
                for &v in &predecessors[&w] {
                    let contribution = (sigma[&v] / sigma[&w]) * (1.0 + delta[&w]);
                    *delta.get_mut(&v).unwrap() += contribution;
                }
                if w != source {
                    *centrality.get_mut(&w).unwrap() += delta[&w];
                }
            }
        }

        let n_f = n as f64;
        let norm = if directed { 1.0 / ((n_f - 1.0) * (n_f - 2.0)) } else { 2.0 / ((n_f - 1.0) * (n_f - 2.0)) };
        for value in centrality.values_mut() {
            *value *= norm;
        }
        Ok(centrality)
    }

    fn neighbors(&self, node: NodeId, direction: Direction, edge_types: &[String]) -> Result<Vec<(Edge, NodeId)>> {
        let mut result = Vec::new();
        if matches!(direction, Direction::Out | Direction::Both) {
            for edge in self.backend.outgoing_edges(node)? {
                if edge_types.is_empty() || edge_types.iter().any(|t| *t == edge.edge_type) {
                    let to = edge.to_id;
                    result.push((edge, to));
                }
            }
        }
        if matches!(direction, Direction::In | Direction::Both) {
            for edge in self.backend.incoming_edges(node)? {
                if edge_types.is_empty() || edge_types.iter().any(|t| *t == edge.edge_type) {
                    let from = edge.from_id;
                    result.push((edge, from));
                }
            }
        }
        Ok(result)
    }
}

fn reconstruct_path(start: NodeId, end: NodeId, parent: &HashMap<NodeId, (NodeId, EdgeId)>) -> PathResult {
    let mut nodes = vec![end];
    let mut edges = Vec::new();
    let mut current = end;
    while current != start {
        let (prev, edge_id) = parent[&current];
        edges.push(edge_id);
        nodes.push(prev);
        current = prev;
    }
    nodes.reverse();
    edges.reverse();
    PathResult { nodes, edges }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphdb_api::GraphWriter;
    use graphdb_storage::{Config, Engine};
    use std::collections::BTreeMap;

    fn linear_chain(len: usize) -> (tempfile::TempDir, Engine) {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::open(&Config::new(dir.path())).unwrap();
        let mut prev = None;
        for _ in 0..len {
            let node = engine.create_node(vec!["Node".into()], BTreeMap::new()).unwrap();
            if let Some(prev_id) = prev {
                engine.create_edge(prev_id, node.id, "NEXT".into(), BTreeMap::new(), 1.0).unwrap();
            }
            prev = Some(node.id);
        }
        (dir, engine)
    }

    #[test]
    fn bfs_visits_each_node_once_in_breadth_order() {
        let (_dir, backend) = linear_chain(4);
        let traverser = Traverser::new(&backend);
        let result = traverser.bfs(1, Direction::Out, &[], 10, 100).unwrap();
        assert_eq!(result.nodes, vec![1, 2, 3, 4]);
        assert_eq!(result.hops[&4], 3);
    }

    #[test]
    fn bfs_respects_max_depth_and_max_results() {
        let (_dir, backend) = linear_chain(5);
        let traverser = Traverser::new(&backend);
        let result = traverser.bfs(1, Direction::Out, &[], 2, 100).unwrap();
        assert_eq!(result.nodes, vec![1, 2, 3]);

        let capped = traverser.bfs(1, Direction::Out, &[], 10, 2).unwrap();
        assert_eq!(capped.nodes.len(), 2);
    }

    #[test]
    fn dfs_visits_each_node_at_most_once() {
        let (_dir, backend) = linear_chain(4);
        let traverser = Traverser::new(&backend);
        let result = traverser.dfs(1, Direction::Out, &[], 10, 100).unwrap();
        let unique: HashSet<NodeId> = result.nodes.iter().copied().collect();
        assert_eq!(unique.len(), result.nodes.len());
        assert_eq!(unique, HashSet::from([1, 2, 3, 4]));
    }

    #[test]
    fn shortest_path_finds_the_chain() {
        let (_dir, backend) = linear_chain(3);
        let traverser = Traverser::new(&backend);
        let path = traverser.shortest_path(1, 3, &[], None).unwrap();
        assert_eq!(path.nodes, vec![1, 2, 3]);
        assert_eq!(path.edges.len(), 2);
    }

    #[test]
    fn shortest_path_reports_not_found_when_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Engine::open(&Config::new(dir.path())).unwrap();
        let a = backend.create_node(vec!["Node".into()], BTreeMap::new()).unwrap();
        let b = backend.create_node(vec!["Node".into()], BTreeMap::new()).unwrap();
        let traverser = Traverser::new(&backend);
        let err = traverser.shortest_path(a.id, b.id, &[], None).unwrap_err();
        assert!(matches!(err, crate::Error::Backend(graphdb_api::Error::NotFound { .. })));
    }

    #[test]
    fn page_rank_distributes_score_across_a_chain() {
        let (_dir, backend) = linear_chain(3);
        let traverser = Traverser::new(&backend);
        let rank = traverser.page_rank(0.85, 50).unwrap();
        let total: f64 = rank.values().sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn betweenness_centrality_is_highest_for_the_middle_of_a_chain() {
        let (_dir, backend) = linear_chain(3);
        let traverser = Traverser::new(&backend);
        let centrality = traverser.betweenness_centrality(true).unwrap();
        assert!(centrality[&2] > centrality[&1]);
        assert!(centrality[&2] > centrality[&3]);
    }
}
