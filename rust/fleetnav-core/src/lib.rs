pub mod astar;
pub mod cost;
pub mod db;
pub mod errors;
pub mod geo;
pub mod graph;
pub mod models;
pub mod nav;

pub use cost::{CostModel, EdgeCost, HeuristicMode};
pub use db::{Database, NodeMatch};
pub use errors::{NavError, NavResult};
pub use graph::MapGraph;
pub use models::{Bot, BotId, BotStatus, EdgeId, Location, MapEdge, MapNode, NodeId, PathRecord};
pub use nav::ReportOutcome;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
