//! Immutable in-memory snapshot of the campus map used for lookups and routing.

use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::warn;

use crate::astar::{AStar, Route};
use crate::cost::CostModel;
use crate::errors::{NavError, NavResult};
use crate::geo;
use crate::models::{EdgeId, Location, MapEdge, MapNode, NodeId};

#[derive(Debug, Default, Clone)]
pub struct MapGraph {
    nodes: Vec<MapNode>,
    edges: Vec<MapEdge>,
    index: FxHashMap<NodeId, usize>,
    // per node: (neighbor index, edge index)
    adjacency: Vec<Vec<(usize, usize)>>,
}

/// A node annotated with its distance (m) and travel time (minutes) from a query point.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NodeEta {
    #[serde(flatten)]
    pub node: MapNode,
    pub distance: f64,
    pub eta: f64,
}

impl MapGraph {
    pub fn new(nodes: Vec<MapNode>, edges: Vec<MapEdge>) -> Self {
        let index: FxHashMap<NodeId, usize> = nodes.iter().enumerate().map(|(i, n)| (n.id, i)).collect();
        let mut adjacency = vec![Vec::new(); nodes.len()];
        let mut kept = Vec::with_capacity(edges.len());
        for edge in edges {
            let (Some(&a), Some(&b)) = (index.get(&edge.node_a), index.get(&edge.node_b)) else {
                warn!(edge_id = edge.id, node_a = edge.node_a, node_b = edge.node_b, "skipping path with missing endpoint");
                continue;
            };
            if a == b {
                warn!(edge_id = edge.id, node = edge.node_a, "skipping self-loop path");
                continue;
            }
            let e = kept.len();
            adjacency[a].push((b, e));
            adjacency[b].push((a, e));
            kept.push(edge);
        }
        Self { nodes, edges: kept, index, adjacency }
    }

    pub fn nodes(&self) -> &[MapNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[MapEdge] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&MapNode> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn edge(&self, id: EdgeId) -> Option<&MapEdge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn edges_touching(&self, id: NodeId) -> impl Iterator<Item = &MapEdge> + '_ {
        self.edges.iter().filter(move |e| e.touches(id))
    }

    /// Nodes reachable over exactly one path, once per connecting path.
    pub fn neighbors(&self, id: NodeId) -> Vec<NodeId> {
        match self.index.get(&id) {
            Some(&i) => self.adjacency[i].iter().map(|&(n, _)| self.nodes[n].id).collect(),
            None => Vec::new(),
        }
    }

    pub(crate) fn index_of(&self, id: NodeId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub(crate) fn node_at_index(&self, idx: usize) -> &MapNode {
        &self.nodes[idx]
    }

    pub(crate) fn edge_at_index(&self, idx: usize) -> &MapEdge {
        &self.edges[idx]
    }

    pub(crate) fn adjacent(&self, idx: usize) -> &[(usize, usize)] {
        &self.adjacency[idx]
    }

    /// Closest node by haversine distance. Ties keep the lowest-indexed node.
    pub fn nearest_node(&self, location: Location) -> NavResult<&MapNode> {
        let mut best: Option<(&MapNode, f64)> = None;
        for node in &self.nodes {
            let d = geo::distance(node.location, location);
            if best.map(|(_, bd)| d < bd).unwrap_or(true) {
                best = Some((node, d));
            }
        }
        best.map(|(n, _)| n).ok_or_else(NavError::empty_map)
    }

    /// Closest node strictly within `meters` of `location`.
    pub fn node_within(&self, location: Location, meters: f64) -> Option<&MapNode> {
        nearest_within(&self.nodes, location, meters)
    }

    pub fn node_exactly_at(&self, location: Location) -> Option<&MapNode> {
        self.nodes.iter().find(|n| n.location == location)
    }

    /// Routes between two graph nodes, returning every waypoint from start to goal.
    pub fn route(&self, start: NodeId, goal: NodeId, cost_model: &CostModel) -> NavResult<Route> {
        AStar::new(self, cost_model).find_route(start, goal)
    }

    /// Resolves both coordinates to their nearest nodes and routes between them.
    pub fn route_between(&self, from: Location, to: Location, cost_model: &CostModel) -> NavResult<Route> {
        let start = self.nearest_node(from)?.id;
        let goal = self.nearest_node(to)?.id;
        self.route(start, goal, cost_model)
    }

    pub fn nodes_with_eta(&self, location: Location, speed_mps: f64) -> NavResult<Vec<NodeEta>> {
        if !speed_mps.is_finite() || speed_mps <= 0.0 {
            return Err(NavError::invalid("bot speed must be a positive number of m/s"));
        }
        Ok(self
            .nodes
            .iter()
            .map(|node| {
                let distance = geo::distance(node.location, location);
                NodeEta { node: node.clone(), distance, eta: distance / speed_mps / 60.0 }
            })
            .collect())
    }
}

pub(crate) fn nearest_within(nodes: &[MapNode], location: Location, meters: f64) -> Option<&MapNode> {
    nodes
        .iter()
        .map(|n| (n, geo::distance(n.location, location)))
        .filter(|&(_, d)| d < meters)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(n, _)| n)
}
