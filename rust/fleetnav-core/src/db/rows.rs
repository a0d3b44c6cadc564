use rusqlite::types::Type;
use rusqlite::Row;
use serde::de::DeserializeOwned;

use crate::models::{Bot, BotStatus, Location, MapEdge, MapNode};

// JSON text column decoded into `T`; malformed documents surface as conversion failures.
fn json_column<T: DeserializeOwned>(r: &Row, idx: usize) -> rusqlite::Result<T> {
    let text: String = r.get(idx)?;
    serde_json::from_str(&text).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub fn map_node_row(r: &Row) -> rusqlite::Result<MapNode> {
    let name: Option<String> = r.get(3)?;
    Ok(MapNode {
        id: r.get(0)?,
        location: Location::new(r.get(1)?, r.get(2)?),
        name: name.filter(|n| !n.is_empty()),
    })
}

pub fn map_path_row(r: &Row) -> rusqlite::Result<MapEdge> {
    Ok(MapEdge {
        id: r.get(0)?,
        node_a: r.get(1)?,
        node_b: r.get(2)?,
        points: json_column(r, 3)?,
    })
}

pub fn map_bot_row(r: &Row) -> rusqlite::Result<Bot> {
    let status: String = r.get(4)?;
    let status = status
        .parse::<BotStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
    Ok(Bot {
        id: r.get(0)?,
        name: r.get(1)?,
        location: Location::new(r.get(2)?, r.get(3)?),
        status,
        path: json_column(r, 5)?,
        queue: json_column(r, 6)?,
    })
}
