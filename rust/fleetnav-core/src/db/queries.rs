pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS map_nodes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    name TEXT
);
CREATE TABLE IF NOT EXISTS map_paths (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    node_a INTEGER NOT NULL REFERENCES map_nodes(id),
    node_b INTEGER NOT NULL REFERENCES map_nodes(id),
    points TEXT NOT NULL DEFAULT '[]',
    CHECK (node_a <> node_b)
);
CREATE INDEX IF NOT EXISTS map_paths_node_a ON map_paths(node_a);
CREATE INDEX IF NOT EXISTS map_paths_node_b ON map_paths(node_b);
CREATE TABLE IF NOT EXISTS bots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    status TEXT NOT NULL DEFAULT 'Idle',
    path TEXT NOT NULL DEFAULT '[]',
    queue TEXT NOT NULL DEFAULT '[]'
);
"#;

pub const ALL_NODES: &str = "SELECT id, latitude, longitude, name FROM map_nodes ORDER BY id";
pub const NODE_BY_ID: &str = "SELECT id, latitude, longitude, name FROM map_nodes WHERE id = ?1";
pub const NODE_BY_COORD: &str =
    "SELECT id, latitude, longitude, name FROM map_nodes WHERE latitude = ?1 AND longitude = ?2 ORDER BY id LIMIT 1";
pub const INSERT_NODE: &str = "INSERT INTO map_nodes (latitude, longitude, name) VALUES (?1, ?2, ?3)";
pub const DELETE_NODE: &str = "DELETE FROM map_nodes WHERE id = ?1";

pub const ALL_PATHS: &str = "SELECT id, node_a, node_b, points FROM map_paths ORDER BY id";
pub const PATH_BY_ID: &str = "SELECT id, node_a, node_b, points FROM map_paths WHERE id = ?1";
pub const PATHS_TOUCHING: &str =
    "SELECT id, node_a, node_b, points FROM map_paths WHERE node_a = ?1 OR node_b = ?1 ORDER BY id";
pub const INSERT_PATH: &str = "INSERT INTO map_paths (node_a, node_b, points) VALUES (?1, ?2, ?3)";
pub const DELETE_PATH: &str = "DELETE FROM map_paths WHERE id = ?1";
pub const DELETE_PATHS_TOUCHING: &str = "DELETE FROM map_paths WHERE node_a = ?1 OR node_b = ?1";

pub const ALL_BOTS: &str = "SELECT id, name, latitude, longitude, status, path, queue FROM bots ORDER BY id";
pub const BOT_BY_ID: &str = "SELECT id, name, latitude, longitude, status, path, queue FROM bots WHERE id = ?1";
pub const INSERT_BOT: &str = "INSERT INTO bots (name, latitude, longitude) VALUES (?1, ?2, ?3)";
pub const DELETE_BOT: &str = "DELETE FROM bots WHERE id = ?1";
pub const UPDATE_BOT_NAVIGATION: &str =
    "UPDATE bots SET latitude = ?2, longitude = ?3, status = ?4, path = ?5, queue = ?6 WHERE id = ?1";
