use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{NavError, NavResult};

pub type NodeId = i64;
pub type EdgeId = i64;
pub type BotId = i64;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Rejects non-finite values and coordinates outside the WGS84 ranges.
    pub fn validated(latitude: f64, longitude: f64) -> NavResult<Self> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(NavError::invalid("coordinates must be finite numbers"));
        }
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(NavError::invalid(format!(
                "coordinate ({latitude}, {longitude}) out of range"
            )));
        }
        Ok(Self { latitude, longitude })
    }

    /// Parses a client `[lat, lon]` pair.
    pub fn from_pair(pair: &[f64]) -> NavResult<Self> {
        match pair {
            [lat, lon] => Self::validated(*lat, *lon),
            _ => Err(NavError::invalid("each coordinate must be a [latitude, longitude] pair")),
        }
    }

    pub fn validate(self) -> NavResult<Self> {
        Self::validated(self.latitude, self.longitude)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapNode {
    pub id: NodeId,
    pub location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A bidirectional polyline between two nodes. `points` holds only the interior
/// vertices, ordered from `node_a` towards `node_b`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapEdge {
    pub id: EdgeId,
    pub node_a: NodeId,
    pub node_b: NodeId,
    pub points: Vec<Location>,
}

impl MapEdge {
    pub fn touches(&self, node: NodeId) -> bool {
        self.node_a == node || self.node_b == node
    }

    pub fn other_end(&self, node: NodeId) -> Option<NodeId> {
        if node == self.node_a {
            Some(self.node_b)
        } else if node == self.node_b {
            Some(self.node_a)
        } else {
            None
        }
    }

    /// Interior points in traversal order when leaving `from`.
    pub fn points_from(&self, from: NodeId) -> impl Iterator<Item = Location> + '_ {
        let reversed = from == self.node_b && from != self.node_a;
        let n = self.points.len();
        (0..n).map(move |i| if reversed { self.points[n - 1 - i] } else { self.points[i] })
    }
}

/// Edge with its endpoint nodes inlined, as returned to clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathRecord {
    pub id: EdgeId,
    pub node_a: MapNode,
    pub node_b: MapNode,
    pub points: Vec<Location>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BotStatus {
    #[default]
    Idle,
    InTransit,
}

impl BotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BotStatus::Idle => "Idle",
            BotStatus::InTransit => "InTransit",
        }
    }
}

impl fmt::Display for BotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BotStatus {
    type Err = NavError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Idle" => Ok(BotStatus::Idle),
            "InTransit" => Ok(BotStatus::InTransit),
            other => Err(NavError::invalid(format!("unknown bot status '{other}'"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bot {
    pub id: BotId,
    pub name: String,
    pub location: Location,
    pub status: BotStatus,
    /// Active leg, starting at the bot's position when the leg was assigned.
    #[serde(default)]
    pub path: Vec<Location>,
    /// Destinations not routed yet, visited in order.
    #[serde(default)]
    pub queue: Vec<Location>,
}

impl Bot {
    pub fn new(id: BotId, name: impl Into<String>, location: Location) -> Self {
        Self {
            id,
            name: name.into(),
            location,
            status: BotStatus::Idle,
            path: Vec::new(),
            queue: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn location_validation() {
        assert!(Location::validated(34.0, -118.0).is_ok());
        assert!(Location::validated(91.0, 0.0).is_err());
        assert!(Location::validated(0.0, -180.5).is_err());
        assert!(Location::validated(f64::NAN, 0.0).is_err());
        assert!(Location::from_pair(&[1.0]).is_err());
        assert!(Location::from_pair(&[1.0, 2.0, 3.0]).is_err());
        assert_eq!(Location::from_pair(&[1.0, 2.0]).unwrap(), Location::new(1.0, 2.0));
    }

    #[test]
    fn edge_points_follow_traversal_direction() {
        let e = MapEdge {
            id: 1,
            node_a: 10,
            node_b: 20,
            points: vec![Location::new(0.0, 1.0), Location::new(0.0, 2.0)],
        };
        let forward: Vec<_> = e.points_from(10).collect();
        let backward: Vec<_> = e.points_from(20).collect();
        assert_eq!(forward, e.points);
        assert_eq!(backward, vec![Location::new(0.0, 2.0), Location::new(0.0, 1.0)]);
        assert_eq!(e.other_end(10), Some(20));
        assert_eq!(e.other_end(20), Some(10));
        assert_eq!(e.other_end(30), None);
    }

    #[test]
    fn node_name_is_omitted_when_absent() {
        let n = MapNode { id: 3, location: Location::new(1.0, 2.0), name: None };
        let v = serde_json::to_value(&n).unwrap();
        assert!(v.get("name").is_none());
        assert_eq!(v["location"], json!({"latitude": 1.0, "longitude": 2.0}));
    }

    #[test]
    fn status_round_trips_through_text() {
        for s in [BotStatus::Idle, BotStatus::InTransit] {
            assert_eq!(s.as_str().parse::<BotStatus>().unwrap(), s);
        }
        assert!("Parked".parse::<BotStatus>().is_err());
        assert_eq!(serde_json::to_value(BotStatus::InTransit).unwrap(), json!("InTransit"));
    }
}
