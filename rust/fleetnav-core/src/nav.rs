//! Per-bot navigation state machine: Idle <-> InTransit.
//!
//! Every transition mutates a [`Bot`] in place. Callers work on a copy and
//! persist it only when the transition returns `Ok`, so a failed call never
//! leaves a half-written path/status pair behind.

use serde::Serialize;
use tracing::{info, warn};

use crate::astar::Route;
use crate::cost::CostModel;
use crate::errors::{NavError, NavResult};
use crate::geo;
use crate::graph::MapGraph;
use crate::models::{Bot, BotStatus, Location, NodeId};

/// What a location report did to the bot.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReportOutcome {
    /// Position stored; the active leg (if any) is still in progress.
    Moved,
    /// The leg finished and the next queued destination was routed.
    LegStarted { destination: Location, skipped: Vec<Location> },
    /// The leg finished with nothing reachable left in the queue; the bot is Idle.
    Arrived { skipped: Vec<Location> },
}

impl ReportOutcome {
    pub fn describe(&self) -> &'static str {
        match self {
            ReportOutcome::Moved => "location updated",
            ReportOutcome::LegStarted { .. } => "path finished and bot is now moving to the next destination",
            ReportOutcome::Arrived { .. } => "path finished and bot is now idle",
        }
    }
}

/// Routes an Idle bot from its nearest map node to `destination`.
///
/// The bot's new path is the current position followed by the route's waypoints;
/// the route itself is returned for callers that want its nodes or cost.
pub fn assign_destination(
    bot: &mut Bot,
    graph: &MapGraph,
    destination: NodeId,
    cost_model: &CostModel,
) -> NavResult<Route> {
    if bot.status != BotStatus::Idle {
        return Err(NavError::AlreadyNavigating(bot.id));
    }
    let goal = graph.node(destination).ok_or_else(|| NavError::node_not_found(destination))?;
    let start = graph.nearest_node(bot.location)?;
    let route = graph.route(start.id, goal.id, cost_model)?;

    bot.path = leg_from(bot.location, &route);
    bot.status = BotStatus::InTransit;
    info!(bot_id = bot.id, destination, waypoints = bot.path.len(), "bot assigned destination");
    Ok(route)
}

/// Stores a position report and, when the active leg is complete, advances the queue.
pub fn report_location(
    bot: &mut Bot,
    location: Location,
    graph: &MapGraph,
    vicinity_m: f64,
    cost_model: &CostModel,
) -> NavResult<ReportOutcome> {
    let location = location.validate()?;
    bot.location = location;

    if bot.status != BotStatus::InTransit {
        return Ok(ReportOutcome::Moved);
    }
    let arrived = match bot.path.last() {
        Some(tail) => geo::distance(location, *tail) < vicinity_m,
        None => true,
    };
    if !arrived {
        return Ok(ReportOutcome::Moved);
    }

    let mut skipped = Vec::new();
    while !bot.queue.is_empty() {
        let next = bot.queue.remove(0);
        match plan_leg(graph, location, next, cost_model) {
            Ok(route) => {
                bot.path = leg_from(location, &route);
                info!(bot_id = bot.id, lat = next.latitude, lon = next.longitude, waypoints = bot.path.len(), "bot started next queued leg");
                return Ok(ReportOutcome::LegStarted { destination: next, skipped });
            }
            Err(e) => {
                warn!(bot_id = bot.id, lat = next.latitude, lon = next.longitude, error = %e, "dropping unreachable queued destination");
                skipped.push(next);
            }
        }
    }

    bot.path.clear();
    bot.status = BotStatus::Idle;
    info!(bot_id = bot.id, "bot finished its path and is idle");
    Ok(ReportOutcome::Arrived { skipped })
}

/// Overwrites the pending destinations. Legs are routed lazily as each one completes.
pub fn replace_queue(bot: &mut Bot, destinations: Vec<Location>) -> NavResult<()> {
    let destinations = destinations.into_iter().map(Location::validate).collect::<NavResult<Vec<_>>>()?;
    bot.queue = destinations;
    Ok(())
}

/// Nearest bot to `location`, or `None` for an empty fleet.
pub fn closest_bot(bots: &[Bot], location: Location) -> Option<&Bot> {
    bots.iter()
        .map(|b| (b, geo::distance(b.location, location)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(b, _)| b)
}

fn plan_leg(graph: &MapGraph, from: Location, to: Location, cost_model: &CostModel) -> NavResult<Route> {
    graph.route_between(from, to, cost_model)
}

// The literal position goes first so the bot drives straight onto the graph.
fn leg_from(position: Location, route: &Route) -> Vec<Location> {
    let mut path = Vec::with_capacity(route.points.len() + 1);
    path.push(position);
    path.extend_from_slice(&route.points);
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MapEdge, MapNode};

    const VICINITY: f64 = 0.5;

    fn loc(lat: f64, lon: f64) -> Location {
        Location::new(lat, lon)
    }

    // A(0,0) - B(0,0.001) - C(0,0.002), plus an island D-E far away.
    fn campus() -> MapGraph {
        let nodes = vec![
            MapNode { id: 1, location: loc(0.0, 0.0), name: Some("A".into()) },
            MapNode { id: 2, location: loc(0.0, 0.001), name: Some("B".into()) },
            MapNode { id: 3, location: loc(0.0, 0.002), name: Some("C".into()) },
            MapNode { id: 4, location: loc(1.0, 1.0), name: None },
            MapNode { id: 5, location: loc(1.0, 1.001), name: None },
        ];
        let edges = vec![
            MapEdge { id: 10, node_a: 1, node_b: 2, points: vec![] },
            MapEdge { id: 11, node_a: 2, node_b: 3, points: vec![] },
            MapEdge { id: 12, node_a: 4, node_b: 5, points: vec![] },
        ];
        MapGraph::new(nodes, edges)
    }

    #[test]
    fn assign_prepends_current_position() {
        let g = campus();
        let mut bot = Bot::new(7, "teddy", loc(0.0, 0.0));
        let route = assign_destination(&mut bot, &g, 3, &CostModel::default()).unwrap();
        assert_eq!(route.nodes, vec![1, 2, 3]);
        assert_eq!(bot.path, vec![loc(0.0, 0.0), loc(0.0, 0.0), loc(0.0, 0.001), loc(0.0, 0.002)]);
        assert_eq!(bot.status, BotStatus::InTransit);
    }

    #[test]
    fn assign_to_busy_bot_is_rejected_without_changes() {
        let g = campus();
        let mut bot = Bot::new(7, "teddy", loc(0.0, 0.0));
        assign_destination(&mut bot, &g, 2, &CostModel::default()).unwrap();
        let before = bot.clone();
        let err = assign_destination(&mut bot, &g, 3, &CostModel::default()).unwrap_err();
        assert!(matches!(err, NavError::AlreadyNavigating(7)));
        assert_eq!(bot, before);
    }

    #[test]
    fn assign_errors() {
        let g = campus();
        let mut bot = Bot::new(7, "teddy", loc(0.0, 0.0));
        assert!(matches!(assign_destination(&mut bot, &g, 99, &CostModel::default()), Err(NavError::NotFound(_))));
        assert!(matches!(
            assign_destination(&mut bot, &g, 5, &CostModel::default()),
            Err(NavError::NoRouteFound { from: 1, to: 5 })
        ));
        assert_eq!(bot.status, BotStatus::Idle);
        assert!(bot.path.is_empty());

        let empty = MapGraph::default();
        assert!(matches!(assign_destination(&mut bot, &empty, 1, &CostModel::default()), Err(NavError::NotFound(_))));
    }

    #[test]
    fn report_far_from_tail_only_moves() {
        let g = campus();
        let mut bot = Bot::new(7, "teddy", loc(0.0, 0.0));
        assign_destination(&mut bot, &g, 3, &CostModel::default()).unwrap();
        let out = report_location(&mut bot, loc(0.0, 0.001), &g, VICINITY, &CostModel::default()).unwrap();
        assert_eq!(out, ReportOutcome::Moved);
        assert_eq!(bot.location, loc(0.0, 0.001));
        assert_eq!(bot.status, BotStatus::InTransit);
        assert_eq!(bot.path.len(), 4);
    }

    #[test]
    fn arrival_with_empty_queue_goes_idle() {
        let g = campus();
        let mut bot = Bot::new(7, "teddy", loc(0.0, 0.0));
        assign_destination(&mut bot, &g, 3, &CostModel::default()).unwrap();
        let out = report_location(&mut bot, loc(0.0, 0.002), &g, VICINITY, &CostModel::default()).unwrap();
        assert_eq!(out, ReportOutcome::Arrived { skipped: vec![] });
        assert_eq!(bot.status, BotStatus::Idle);
        assert!(bot.path.is_empty());
    }

    #[test]
    fn arrival_within_vicinity_counts() {
        let g = campus();
        let mut bot = Bot::new(7, "teddy", loc(0.0, 0.0));
        assign_destination(&mut bot, &g, 3, &CostModel::default()).unwrap();
        // ~0.33 m short of C
        let near_c = loc(0.0, 0.002 - 0.000_003);
        let out = report_location(&mut bot, near_c, &g, VICINITY, &CostModel::default()).unwrap();
        assert!(matches!(out, ReportOutcome::Arrived { .. }));
    }

    #[test]
    fn arrival_with_queue_routes_next_leg() {
        let g = campus();
        let mut bot = Bot::new(7, "teddy", loc(0.0, 0.0));
        assign_destination(&mut bot, &g, 3, &CostModel::default()).unwrap();
        replace_queue(&mut bot, vec![loc(0.0, 0.0), loc(0.0, 0.001)]).unwrap();

        let out = report_location(&mut bot, loc(0.0, 0.002), &g, VICINITY, &CostModel::default()).unwrap();
        assert_eq!(out, ReportOutcome::LegStarted { destination: loc(0.0, 0.0), skipped: vec![] });
        assert_eq!(bot.status, BotStatus::InTransit);
        assert_eq!(bot.path, vec![loc(0.0, 0.002), loc(0.0, 0.002), loc(0.0, 0.001), loc(0.0, 0.0)]);
        assert_eq!(bot.queue, vec![loc(0.0, 0.001)]);
    }

    #[test]
    fn unreachable_queue_entries_are_skipped() {
        let g = campus();
        let mut bot = Bot::new(7, "teddy", loc(0.0, 0.0));
        assign_destination(&mut bot, &g, 2, &CostModel::default()).unwrap();
        replace_queue(&mut bot, vec![loc(1.0, 1.001), loc(0.0, 0.002)]).unwrap();

        let out = report_location(&mut bot, loc(0.0, 0.001), &g, VICINITY, &CostModel::default()).unwrap();
        assert_eq!(out, ReportOutcome::LegStarted { destination: loc(0.0, 0.002), skipped: vec![loc(1.0, 1.001)] });
        assert!(bot.queue.is_empty());

        replace_queue(&mut bot, vec![loc(1.0, 1.0)]).unwrap();
        let out = report_location(&mut bot, loc(0.0, 0.002), &g, VICINITY, &CostModel::default()).unwrap();
        assert_eq!(out, ReportOutcome::Arrived { skipped: vec![loc(1.0, 1.0)] });
        assert_eq!(bot.status, BotStatus::Idle);
    }

    #[test]
    fn idle_reports_never_start_queued_legs() {
        let g = campus();
        let mut bot = Bot::new(7, "teddy", loc(0.0, 0.0));
        replace_queue(&mut bot, vec![loc(0.0, 0.002)]).unwrap();
        let out = report_location(&mut bot, loc(0.0, 0.0005), &g, VICINITY, &CostModel::default()).unwrap();
        assert_eq!(out, ReportOutcome::Moved);
        assert_eq!(bot.status, BotStatus::Idle);
        assert_eq!(bot.queue.len(), 1);
    }

    #[test]
    fn malformed_reports_leave_bot_untouched() {
        let g = campus();
        let mut bot = Bot::new(7, "teddy", loc(0.0, 0.0));
        let before = bot.clone();
        assert!(report_location(&mut bot, loc(120.0, 0.0), &g, VICINITY, &CostModel::default()).is_err());
        assert!(replace_queue(&mut bot, vec![loc(0.0, 0.0), loc(f64::NAN, 0.0)]).is_err());
        assert_eq!(bot, before);
    }

    #[test]
    fn closest_bot_by_distance() {
        let bots = vec![
            Bot::new(1, "far", loc(0.0, 0.01)),
            Bot::new(2, "near", loc(0.0, 0.001)),
        ];
        assert_eq!(closest_bot(&bots, loc(0.0, 0.0)).map(|b| b.id), Some(2));
        assert!(closest_bot(&[], loc(0.0, 0.0)).is_none());
    }
}
