use std::path::Path;

use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use tracing::{debug, info};

use crate::db::open::DbOpenConfig;
use crate::db::queries::*;
use crate::db::rows::*;
use crate::errors::{NavError, NavResult};
use crate::geo;
use crate::graph::{nearest_within, MapGraph};
use crate::models::{Bot, BotId, EdgeId, Location, MapEdge, MapNode, NodeId, PathRecord};

pub mod open;
pub mod queries;
pub mod rows;

/// How path endpoints are matched against existing nodes when a path is created.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NodeMatch {
    /// Reuse a node only when its coordinates are identical.
    Exact,
    /// Reuse the closest node strictly within this many meters.
    Within(f64),
}

impl NodeMatch {
    fn resolve<'n>(&self, nodes: &'n [MapNode], at: Location) -> Option<&'n MapNode> {
        match *self {
            NodeMatch::Exact => nodes.iter().find(|n| n.location == at),
            NodeMatch::Within(m) => nearest_within(nodes, at, m),
        }
    }

    fn same_spot(&self, a: Location, b: Location) -> bool {
        match *self {
            NodeMatch::Exact => a == b,
            NodeMatch::Within(m) => geo::distance(a, b) < m,
        }
    }
}

pub struct Database {
    conn: Connection,
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation)
}

fn query_nodes(conn: &Connection) -> rusqlite::Result<Vec<MapNode>> {
    let mut stmt = conn.prepare_cached(ALL_NODES)?;
    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(r) = rows.next()? { out.push(map_node_row(r)?); }
    Ok(out)
}

fn query_paths(conn: &Connection) -> rusqlite::Result<Vec<MapEdge>> {
    let mut stmt = conn.prepare_cached(ALL_PATHS)?;
    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(r) = rows.next()? { out.push(map_path_row(r)?); }
    Ok(out)
}

fn insert_node_with(conn: &Connection, location: Location, name: Option<&str>) -> rusqlite::Result<MapNode> {
    let name = name.map(str::trim).filter(|n| !n.is_empty());
    conn.prepare_cached(INSERT_NODE)?.execute(params![location.latitude, location.longitude, name])?;
    Ok(MapNode { id: conn.last_insert_rowid(), location, name: name.map(str::to_string) })
}

impl Database {
    /// Open (or create) the database at `path` and make sure the schema exists.
    pub fn open<P: AsRef<Path>>(path: P, cfg: &DbOpenConfig) -> NavResult<Self> {
        let conn = open::open_with_config(path, cfg)?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> NavResult<Self> {
        let conn = Connection::open_in_memory()?;
        let _ = conn.pragma_update(None, "foreign_keys", 1i32);
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Construct from an existing connection (useful for tests).
    pub fn from_connection(conn: Connection) -> Self { Self { conn } }

    pub fn init_schema(&self) -> NavResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ---- map nodes ----

    pub fn list_nodes(&self) -> NavResult<Vec<MapNode>> {
        Ok(query_nodes(&self.conn)?)
    }

    pub fn fetch_node(&self, id: NodeId) -> NavResult<Option<MapNode>> {
        let mut stmt = self.conn.prepare_cached(NODE_BY_ID)?;
        Ok(stmt.query_row(params![id], |r| map_node_row(r)).optional()?)
    }

    pub fn find_node_at(&self, location: Location) -> NavResult<Option<MapNode>> {
        let mut stmt = self.conn.prepare_cached(NODE_BY_COORD)?;
        Ok(stmt.query_row(params![location.latitude, location.longitude], |r| map_node_row(r)).optional()?)
    }

    /// Closest node strictly within `meters` of `location`.
    pub fn find_node_near(&self, location: Location, meters: f64) -> NavResult<Option<MapNode>> {
        let nodes = self.list_nodes()?;
        Ok(nearest_within(&nodes, location, meters).cloned())
    }

    pub fn insert_node(&self, location: Location, name: Option<&str>) -> NavResult<MapNode> {
        let location = location.validate()?;
        Ok(insert_node_with(&self.conn, location, name)?)
    }

    /// Deletes a node and every path touching it in one transaction.
    /// Returns the removed node and the number of removed paths.
    pub fn delete_node(&mut self, id: NodeId) -> NavResult<(MapNode, usize)> {
        let tx = self.conn.transaction()?;
        let node = tx
            .prepare_cached(NODE_BY_ID)?
            .query_row(params![id], |r| map_node_row(r))
            .optional()?
            .ok_or_else(|| NavError::node_not_found(id))?;
        let removed = tx.prepare_cached(DELETE_PATHS_TOUCHING)?.execute(params![id])?;
        tx.prepare_cached(DELETE_NODE)?.execute(params![id])?;
        tx.commit()?;
        info!(node_id = id, removed_paths = removed, "deleted map node");
        Ok((node, removed))
    }

    // ---- map paths ----

    pub fn list_paths(&self) -> NavResult<Vec<MapEdge>> {
        Ok(query_paths(&self.conn)?)
    }

    pub fn fetch_path(&self, id: EdgeId) -> NavResult<Option<MapEdge>> {
        let mut stmt = self.conn.prepare_cached(PATH_BY_ID)?;
        Ok(stmt.query_row(params![id], |r| map_path_row(r)).optional()?)
    }

    pub fn paths_touching(&self, node: NodeId) -> NavResult<Vec<MapEdge>> {
        let mut stmt = self.conn.prepare_cached(PATHS_TOUCHING)?;
        let mut rows = stmt.query(params![node])?;
        let mut out = Vec::new();
        while let Some(r) = rows.next()? { out.push(map_path_row(r)?); }
        Ok(out)
    }

    /// Paths with their endpoint nodes inlined.
    pub fn list_paths_populated(&self) -> NavResult<Vec<PathRecord>> {
        let graph = self.load_graph()?;
        let mut out = Vec::with_capacity(graph.edges().len());
        for e in graph.edges() {
            let (Some(a), Some(b)) = (graph.node(e.node_a), graph.node(e.node_b)) else { continue };
            out.push(PathRecord { id: e.id, node_a: a.clone(), node_b: b.clone(), points: e.points.clone() });
        }
        Ok(out)
    }

    /// Creates a path from a client polyline. The first and last points become
    /// terminal nodes (reusing existing nodes per `policy`); the rest are stored as
    /// interior points in submitted order.
    pub fn create_path(
        &mut self,
        polyline: &[Location],
        start_name: Option<&str>,
        end_name: Option<&str>,
        policy: NodeMatch,
    ) -> NavResult<PathRecord> {
        if polyline.len() < 2 {
            return Err(NavError::invalid("a path needs at least two coordinates"));
        }
        let polyline = polyline.iter().map(|p| p.validate()).collect::<NavResult<Vec<_>>>()?;
        let first = polyline[0];
        let last = polyline[polyline.len() - 1];

        let tx = self.conn.transaction()?;
        let existing = query_nodes(&tx)?;
        let found_a = policy.resolve(&existing, first).cloned();
        let found_b = policy.resolve(&existing, last).cloned();
        let self_loop = match (&found_a, &found_b) {
            (Some(a), Some(b)) => a.id == b.id,
            (None, None) => policy.same_spot(first, last),
            _ => false,
        };
        if self_loop {
            return Err(NavError::invalid("path endpoints resolve to the same map node"));
        }

        let reused = usize::from(found_a.is_some()) + usize::from(found_b.is_some());
        let node_a = match found_a {
            Some(n) => n,
            None => insert_node_with(&tx, first, start_name)?,
        };
        let node_b = match found_b {
            Some(n) => n,
            None => insert_node_with(&tx, last, end_name)?,
        };
        let points = polyline[1..polyline.len() - 1].to_vec();
        let encoded = serde_json::to_string(&points)?;
        tx.prepare_cached(INSERT_PATH)?.execute(params![node_a.id, node_b.id, encoded])?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        info!(path_id = id, node_a = node_a.id, node_b = node_b.id, interior = points.len(), reused_nodes = reused, "created map path");
        Ok(PathRecord { id, node_a, node_b, points })
    }

    /// Deletes one path; its endpoint nodes stay.
    pub fn delete_path(&self, id: EdgeId) -> NavResult<MapEdge> {
        let edge = self.fetch_path(id)?.ok_or_else(|| NavError::edge_not_found(id))?;
        self.conn.prepare_cached(DELETE_PATH)?.execute(params![id])?;
        info!(path_id = id, "deleted map path");
        Ok(edge)
    }

    /// Loads every node and path inside one read transaction.
    pub fn load_graph(&self) -> NavResult<MapGraph> {
        let tx = self.conn.unchecked_transaction()?;
        let nodes = query_nodes(&tx)?;
        let edges = query_paths(&tx)?;
        tx.finish()?;
        debug!(nodes = nodes.len(), paths = edges.len(), "loaded map graph");
        Ok(MapGraph::new(nodes, edges))
    }

    // ---- bots ----

    pub fn insert_bot(&self, name: &str, location: Location) -> NavResult<Bot> {
        let name = name.trim();
        if name.is_empty() {
            return Err(NavError::invalid("bot name must not be empty"));
        }
        let location = location.validate()?;
        match self.conn.prepare_cached(INSERT_BOT)?.execute(params![name, location.latitude, location.longitude]) {
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => {
                return Err(NavError::invalid(format!("a bot named '{name}' already exists")));
            }
            Err(e) => return Err(e.into()),
        }
        let bot = Bot::new(self.conn.last_insert_rowid(), name, location);
        info!(bot_id = bot.id, name = %bot.name, "added bot");
        Ok(bot)
    }

    pub fn list_bots(&self) -> NavResult<Vec<Bot>> {
        let mut stmt = self.conn.prepare_cached(ALL_BOTS)?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(r) = rows.next()? { out.push(map_bot_row(r)?); }
        Ok(out)
    }

    pub fn fetch_bot(&self, id: BotId) -> NavResult<Option<Bot>> {
        let mut stmt = self.conn.prepare_cached(BOT_BY_ID)?;
        Ok(stmt.query_row(params![id], |r| map_bot_row(r)).optional()?)
    }

    pub fn delete_bot(&self, id: BotId) -> NavResult<Bot> {
        let bot = self.fetch_bot(id)?.ok_or_else(|| NavError::bot_not_found(id))?;
        self.conn.prepare_cached(DELETE_BOT)?.execute(params![id])?;
        info!(bot_id = id, "deleted bot");
        Ok(bot)
    }

    /// Writes the fields owned by navigation: location, status, path and queue.
    pub fn save_bot_navigation(&self, bot: &Bot) -> NavResult<()> {
        let path = serde_json::to_string(&bot.path)?;
        let queue = serde_json::to_string(&bot.queue)?;
        let updated = self.conn.prepare_cached(UPDATE_BOT_NAVIGATION)?.execute(params![
            bot.id,
            bot.location.latitude,
            bot.location.longitude,
            bot.status.as_str(),
            path,
            queue
        ])?;
        if updated == 0 {
            return Err(NavError::bot_not_found(bot.id));
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn conn(&self) -> &Connection { &self.conn }
}
