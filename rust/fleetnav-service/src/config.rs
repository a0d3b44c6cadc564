use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use fleetnav_core::db::open::DbOpenConfig;
use fleetnav_core::{CostModel, EdgeCost, HeuristicMode, NodeMatch};
use tracing::warn;

use crate::fleet::NavSettings;

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub db_open: DbOpenConfig,
    pub vicinity_m: f64,
    pub bot_speed_mps: f64,
    /// `None` disables the periodic tick.
    pub tick_interval: Option<Duration>,
    pub tick_target: Option<String>,
    pub node_match: NodeMatch,
    pub cost_model: CostModel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            db_path: PathBuf::from("fleetnav.db"),
            db_open: DbOpenConfig::default(),
            vicinity_m: 0.5,
            bot_speed_mps: 0.5,
            tick_interval: Some(Duration::from_secs(10)),
            tick_target: None,
            node_match: NodeMatch::Within(0.5),
            cost_model: CostModel::default(),
        }
    }
}

// Positive finite number, or None.
fn positive(v: f64) -> Option<f64> {
    (v.is_finite() && v > 0.0).then_some(v)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let mut cfg = Self::from_lookup(|name| env::var(name).ok());
        cfg.db_open = DbOpenConfig::from_env();
        Ok(cfg)
    }

    /// Builds a config from an arbitrary variable source. Unparseable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |name: &str| -> Option<String> {
            lookup(name).map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        };
        fn number<T: FromStr>(name: &str, raw: Option<String>) -> Option<T> {
            let raw = raw?;
            match raw.parse::<T>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(var = name, value = %raw, "ignoring unparseable setting");
                    None
                }
            }
        }

        let host = parsed("FLEETNAV_HOST").unwrap_or(defaults.host);
        let port = number::<u16>("FLEETNAV_PORT", parsed("FLEETNAV_PORT")).unwrap_or(defaults.port);
        let db_path = parsed("FLEETNAV_DB").map(PathBuf::from).unwrap_or(defaults.db_path);
        let vicinity_m = number::<f64>("FLEETNAV_VICINITY_M", parsed("FLEETNAV_VICINITY_M"))
            .and_then(positive)
            .unwrap_or(defaults.vicinity_m);
        let bot_speed_mps = number::<f64>("FLEETNAV_BOT_SPEED_MPS", parsed("FLEETNAV_BOT_SPEED_MPS"))
            .and_then(positive)
            .unwrap_or(defaults.bot_speed_mps);
        let tick_interval = match number::<u64>("FLEETNAV_TICK_SECS", parsed("FLEETNAV_TICK_SECS")) {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.tick_interval,
        };
        let tick_target = parsed("FLEETNAV_TICK_TARGET");

        let node_match = match parsed("FLEETNAV_NODE_MATCH").map(|s| s.to_ascii_lowercase()).as_deref() {
            Some("exact") => NodeMatch::Exact,
            Some("vicinity") | None => NodeMatch::Within(vicinity_m),
            Some(other) => {
                warn!(var = "FLEETNAV_NODE_MATCH", value = other, "unknown node match policy; using vicinity");
                NodeMatch::Within(vicinity_m)
            }
        };
        let edge_cost = parsed("FLEETNAV_EDGE_COST")
            .and_then(|s| EdgeCost::from_name(&s).or_else(|| {
                warn!(var = "FLEETNAV_EDGE_COST", value = %s, "unknown edge cost; using points");
                None
            }))
            .unwrap_or_default();
        let heuristic = parsed("FLEETNAV_HEURISTIC")
            .and_then(|s| HeuristicMode::from_name(&s).or_else(|| {
                warn!(var = "FLEETNAV_HEURISTIC", value = %s, "unknown heuristic; using geodesic");
                None
            }))
            .unwrap_or_default();

        Self {
            host,
            port,
            db_path,
            db_open: defaults.db_open,
            vicinity_m,
            bot_speed_mps,
            tick_interval,
            tick_target,
            node_match,
            cost_model: CostModel::new(edge_cost, heuristic),
        }
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }

    pub fn nav_settings(&self) -> NavSettings {
        NavSettings {
            vicinity_m: self.vicinity_m,
            bot_speed_mps: self.bot_speed_mps,
            node_match: self.node_match,
            cost_model: self.cost_model,
        }
    }
}
