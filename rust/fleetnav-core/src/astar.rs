use std::cmp::Ordering;
use std::collections::BinaryHeap;

use itertools::Itertools;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::cost::CostModel;
use crate::errors::{NavError, NavResult};
use crate::graph::MapGraph;
use crate::models::{EdgeId, Location, NodeId};

/// A routed leg through the map graph.
#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    /// Node ids visited, start and goal included.
    pub nodes: Vec<NodeId>,
    /// Path ids taken between consecutive nodes.
    pub edges: Vec<EdgeId>,
    /// Start location, every interior polyline point in travel order, goal location.
    pub points: Vec<Location>,
    pub cost: f64,
    pub expanded: u64,
}

#[derive(Clone, Copy, Debug)]
struct QueueNode {
    idx: usize,
    f: f64,
    g: f64,
    seq: u64,
}

impl PartialEq for QueueNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for QueueNode {}
impl PartialOrd for QueueNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for QueueNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is max-heap; invert for smallest f first, then insertion order
        other.f.total_cmp(&self.f).then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Best-first search over the map graph.
///
/// Edge cost and heuristic come from the [`CostModel`]. With the default
/// point-count cost the geodesic heuristic is not admissible, so the result is
/// a connected route but not necessarily the cheapest one.
pub struct AStar<'a> {
    graph: &'a MapGraph,
    cost_model: &'a CostModel,
}

impl<'a> AStar<'a> {
    pub fn new(graph: &'a MapGraph, cost_model: &'a CostModel) -> Self {
        Self { graph, cost_model }
    }

    pub fn find_route(&self, start: NodeId, goal: NodeId) -> NavResult<Route> {
        let start_idx = self.graph.index_of(start).ok_or_else(|| NavError::node_not_found(start))?;
        let goal_idx = self.graph.index_of(goal).ok_or_else(|| NavError::node_not_found(goal))?;
        let goal_loc = self.graph.node_at_index(goal_idx).location;

        let mut open = BinaryHeap::new();
        let mut g_score: FxHashMap<usize, f64> = FxHashMap::default();
        let mut came_from: FxHashMap<usize, (usize, usize)> = FxHashMap::default();
        let mut expanded: u64 = 0;
        let mut seq: u64 = 0;

        let h0 = self.cost_model.heuristic(self.graph.node_at_index(start_idx).location, goal_loc);
        g_score.insert(start_idx, 0.0);
        open.push(QueueNode { idx: start_idx, f: h0, g: 0.0, seq });

        while let Some(qn) = open.pop() {
            // Discard stale
            if let Some(&best_g) = g_score.get(&qn.idx) {
                if qn.g > best_g {
                    continue;
                }
            }
            expanded += 1;

            if qn.idx == goal_idx {
                let route = self.reconstruct(&came_from, start_idx, goal_idx, qn.g, expanded);
                debug!(start, goal, expanded, hops = route.edges.len(), cost = route.cost, "route found");
                return Ok(route);
            }

            let here_node = self.graph.node_at_index(qn.idx);
            let (here_id, here) = (here_node.id, here_node.location);
            for &(nb, e) in self.graph.adjacent(qn.idx) {
                let there = self.graph.node_at_index(nb).location;
                let tentative_g = qn.g + self.cost_model.edge_cost(self.graph.edge_at_index(e), here_id, here, there);
                let improves = g_score.get(&nb).map(|&bg| tentative_g < bg).unwrap_or(true);
                if improves {
                    g_score.insert(nb, tentative_g);
                    came_from.insert(nb, (qn.idx, e));
                    seq += 1;
                    let f = tentative_g + self.cost_model.heuristic(there, goal_loc);
                    open.push(QueueNode { idx: nb, f, g: tentative_g, seq });
                }
            }
        }

        debug!(start, goal, expanded, "frontier exhausted");
        Err(NavError::NoRouteFound { from: start, to: goal })
    }

    fn reconstruct(
        &self,
        came_from: &FxHashMap<usize, (usize, usize)>,
        start_idx: usize,
        goal_idx: usize,
        cost: f64,
        expanded: u64,
    ) -> Route {
        let mut chain = vec![goal_idx];
        let mut steps = Vec::new();
        let mut current = goal_idx;
        while current != start_idx {
            // every node but the start was reached through a relaxed edge
            let Some(&(prev, edge)) = came_from.get(&current) else { break };
            steps.push(edge);
            chain.push(prev);
            current = prev;
        }
        chain.reverse();
        steps.reverse();

        let mut points = vec![self.graph.node_at_index(start_idx).location];
        for ((&from, &to), &e) in chain.iter().tuple_windows().zip(steps.iter()) {
            let edge = self.graph.edge_at_index(e);
            let from_id = self.graph.node_at_index(from).id;
            points.extend(edge.points_from(from_id));
            points.push(self.graph.node_at_index(to).location);
        }

        Route {
            nodes: chain.iter().map(|&i| self.graph.node_at_index(i).id).collect(),
            edges: steps.iter().map(|&e| self.graph.edge_at_index(e).id).collect(),
            points,
            cost,
            expanded,
        }
    }
}
