//! Navigation service shared by the HTTP handlers and the live channel.
//!
//! Bot mutations are serialized per bot id: each one takes that bot's async lock,
//! reads the stored bot, runs the state machine on a copy and persists the copy
//! only when the transition succeeded. Different bots never wait on each other
//! beyond the short database critical sections.
//!
//! Routing runs against a cached [`MapGraph`] snapshot. Topology writes drop the
//! snapshot while still holding the database lock, and snapshots are only ever
//! loaded under that lock, so a search never sees a graph older than the last
//! completed write.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwapOption;
use fleetnav_core::graph::NodeEta;
use fleetnav_core::nav;
use fleetnav_core::{
    Bot, BotId, CostModel, Database, EdgeId, Location, MapEdge, MapGraph, MapNode, NavError, NavResult, NodeId,
    NodeMatch, PathRecord, ReportOutcome,
};
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NavSettings {
    /// Arrival tolerance in meters.
    pub vicinity_m: f64,
    /// Used for node ETAs.
    pub bot_speed_mps: f64,
    pub node_match: NodeMatch,
    pub cost_model: CostModel,
}

impl Default for NavSettings {
    fn default() -> Self {
        Self { vicinity_m: 0.5, bot_speed_mps: 0.5, node_match: NodeMatch::Within(0.5), cost_model: CostModel::default() }
    }
}

#[derive(Clone)]
pub struct Fleet {
    inner: Arc<Inner>,
}

struct Inner {
    db: Mutex<Database>,
    graph: ArcSwapOption<MapGraph>,
    bot_locks: Mutex<HashMap<BotId, Arc<tokio::sync::Mutex<()>>>>,
    settings: NavSettings,
}

impl Fleet {
    pub fn new(db: Database, settings: NavSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                db: Mutex::new(db),
                graph: ArcSwapOption::empty(),
                bot_locks: Mutex::new(HashMap::new()),
                settings,
            }),
        }
    }

    pub fn settings(&self) -> &NavSettings {
        &self.inner.settings
    }

    fn db(&self) -> MutexGuard<'_, Database> {
        self.inner.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bot_lock(&self, id: BotId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.inner.bot_locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(id).or_default())
    }

    /// Drops the lock entry for a bot that no longer exists, unless another task still waits on it.
    fn forget_lock(&self, id: BotId, lock: &Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.inner.bot_locks.lock().unwrap_or_else(PoisonError::into_inner);
        // one reference in the map, one held by the caller
        if locks.get(&id).is_some_and(|held| Arc::ptr_eq(held, lock) && Arc::strong_count(held) == 2) {
            locks.remove(&id);
        }
    }

    /// Current graph snapshot, loading it if a topology write dropped the last one.
    pub fn graph(&self) -> NavResult<Arc<MapGraph>> {
        if let Some(g) = self.inner.graph.load_full() {
            return Ok(g);
        }
        let db = self.db();
        if let Some(g) = self.inner.graph.load_full() {
            return Ok(g);
        }
        let g = Arc::new(db.load_graph()?);
        self.inner.graph.store(Some(Arc::clone(&g)));
        debug!(nodes = g.nodes().len(), paths = g.edges().len(), "graph snapshot cached");
        Ok(g)
    }

    fn topology_write<T>(&self, f: impl FnOnce(&mut Database) -> NavResult<T>) -> NavResult<T> {
        let mut db = self.db();
        let out = f(&mut db)?;
        self.inner.graph.store(None);
        Ok(out)
    }

    // ---- map ----

    pub fn nodes(&self) -> NavResult<Vec<MapNode>> {
        self.db().list_nodes()
    }

    pub fn nodes_with_eta(&self, location: Location) -> NavResult<Vec<NodeEta>> {
        let location = location.validate()?;
        self.graph()?.nodes_with_eta(location, self.settings().bot_speed_mps)
    }

    pub fn paths(&self) -> NavResult<Vec<PathRecord>> {
        self.db().list_paths_populated()
    }

    pub fn create_path(&self, polyline: &[Location], start: Option<&str>, end: Option<&str>) -> NavResult<PathRecord> {
        let policy = self.settings().node_match;
        self.topology_write(|db| db.create_path(polyline, start, end, policy))
    }

    pub fn delete_path(&self, id: EdgeId) -> NavResult<MapEdge> {
        self.topology_write(|db| db.delete_path(id))
    }

    /// Removes a node and its incident paths; returns the node and the removed path count.
    pub fn delete_node(&self, id: NodeId) -> NavResult<(MapNode, usize)> {
        self.topology_write(|db| db.delete_node(id))
    }

    /// Waypoints between the nodes nearest to `from` and `to`.
    pub fn route_between(&self, from: Location, to: Location) -> NavResult<Vec<Location>> {
        let (from, to) = (from.validate()?, to.validate()?);
        let route = self.graph()?.route_between(from, to, &self.settings().cost_model)?;
        debug!(hops = route.edges.len(), expanded = route.expanded, cost = route.cost, "route between coordinates");
        Ok(route.points)
    }

    // ---- bots ----

    pub fn create_bot(&self, name: &str, location: Location) -> NavResult<Bot> {
        self.db().insert_bot(name, location)
    }

    pub fn bots(&self) -> NavResult<Vec<Bot>> {
        self.db().list_bots()
    }

    pub fn bot(&self, id: BotId) -> NavResult<Bot> {
        self.db().fetch_bot(id)?.ok_or_else(|| NavError::bot_not_found(id))
    }

    pub fn closest_bot(&self, location: Location) -> NavResult<Bot> {
        let location = location.validate()?;
        let bots = self.bots()?;
        nav::closest_bot(&bots, location)
            .cloned()
            .ok_or_else(|| NavError::NotFound("bot (the fleet is empty)".to_string()))
    }

    pub async fn delete_bot(&self, id: BotId) -> NavResult<Bot> {
        let lock = self.bot_lock(id);
        let guard = lock.lock().await;
        let deleted = self.db().delete_bot(id);
        drop(guard);
        self.forget_lock(id, &lock);
        deleted
    }

    // Read, transition a copy, persist on success. Runs under the bot's lock.
    async fn update_bot<T, F>(&self, id: BotId, transition: F) -> NavResult<(Bot, T)>
    where
        F: FnOnce(&mut Bot, &Fleet) -> NavResult<T> + Send,
    {
        let lock = self.bot_lock(id);
        let guard = lock.lock().await;
        let current = match self.bot(id) {
            Ok(bot) => bot,
            Err(e) => {
                drop(guard);
                self.forget_lock(id, &lock);
                return Err(e);
            }
        };
        let mut next = current.clone();
        let out = transition(&mut next, self)?;
        if next != current {
            self.db().save_bot_navigation(&next)?;
        }
        Ok((next, out))
    }

    pub async fn assign_destination(&self, bot: BotId, node: NodeId) -> NavResult<Bot> {
        let (bot, route) = self
            .update_bot(bot, |b, fleet| {
                let graph = fleet.graph()?;
                nav::assign_destination(b, &graph, node, &fleet.settings().cost_model)
            })
            .await?;
        debug!(bot_id = bot.id, hops = route.edges.len(), cost = route.cost, expanded = route.expanded, "destination routed");
        Ok(bot)
    }

    pub async fn report_location(&self, bot: BotId, location: Location) -> NavResult<ReportOutcome> {
        let (bot, outcome) = self
            .update_bot(bot, |b, fleet| {
                let graph = fleet.graph()?;
                let s = fleet.settings();
                nav::report_location(b, location, &graph, s.vicinity_m, &s.cost_model)
            })
            .await?;
        if !matches!(outcome, ReportOutcome::Moved) {
            info!(bot_id = bot.id, status = %bot.status, queued = bot.queue.len(), "{}", outcome.describe());
        }
        Ok(outcome)
    }

    pub async fn replace_queue(&self, bot: BotId, destinations: Vec<Location>) -> NavResult<Bot> {
        let (bot, ()) = self.update_bot(bot, move |b, _| nav::replace_queue(b, destinations)).await?;
        info!(bot_id = bot.id, queued = bot.queue.len(), "bot queue replaced");
        Ok(bot)
    }
}
