use std::env;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

/// PRAGMA toggles applied when opening the fleet database.
#[derive(Clone, Debug)]
pub struct DbOpenConfig {
    /// If Some(ms) and ms > 0, wait this long on a locked database before failing.
    pub busy_timeout_ms: Option<u64>,
    /// If Some, set PRAGMA journal_mode accordingly.
    pub journal_mode: Option<JournalMode>,
    /// If Some(kb) and kb > 0, set PRAGMA cache_size = -kb (KB units).
    pub cache_size_kb: Option<i64>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum JournalMode { Wal, Delete, Memory }

impl Display for JournalMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            JournalMode::Wal => write!(f, "WAL"),
            JournalMode::Delete => write!(f, "DELETE"),
            JournalMode::Memory => write!(f, "MEMORY"),
        }
    }
}

impl Default for DbOpenConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: Some(5_000),
            journal_mode: Some(JournalMode::Wal),
            cache_size_kb: None,
        }
    }
}

impl DbOpenConfig {
    /// Load toggles from environment variables. Missing/invalid values fall back to defaults.
    ///
    /// Variables:
    /// - FLEETNAV_SQLITE_BUSY_TIMEOUT_MS: integer ms; 0 disables
    /// - FLEETNAV_SQLITE_JOURNAL_MODE: "WAL", "DELETE" or "MEMORY"; empty disables
    /// - FLEETNAV_SQLITE_CACHE_SIZE_KB: integer KB; 0 disables
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = env::var("FLEETNAV_SQLITE_BUSY_TIMEOUT_MS") {
            match v.parse::<u64>() { Ok(n) if n > 0 => cfg.busy_timeout_ms = Some(n), _ => cfg.busy_timeout_ms = None }
        }
        if let Ok(v) = env::var("FLEETNAV_SQLITE_JOURNAL_MODE") {
            cfg.journal_mode = match v.trim().to_ascii_uppercase().as_str() {
                "WAL" => Some(JournalMode::Wal),
                "DELETE" => Some(JournalMode::Delete),
                "MEMORY" => Some(JournalMode::Memory),
                _ => None,
            };
        }
        if let Ok(v) = env::var("FLEETNAV_SQLITE_CACHE_SIZE_KB") {
            match v.parse::<i64>() { Ok(n) if n > 0 => cfg.cache_size_kb = Some(n), _ => cfg.cache_size_kb = None }
        }
        cfg
    }
}

/// Open (creating if needed) a read-write database and apply PRAGMAs from `cfg`.
/// PRAGMA errors are ignored; open errors are returned.
pub fn open_with_config<P: AsRef<Path>>(path: P, cfg: &DbOpenConfig) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    apply_pragmas(&conn, cfg);
    Ok(conn)
}

pub(crate) fn apply_pragmas(conn: &Connection, cfg: &DbOpenConfig) {
    let _ = conn.pragma_update(None, "foreign_keys", 1i32);
    if let Some(ms) = cfg.busy_timeout_ms { if ms > 0 { let _ = conn.busy_timeout(Duration::from_millis(ms)); } }
    if let Some(mode) = cfg.journal_mode {
        // journal_mode answers with the mode actually in effect
        let _ = conn.pragma_update_and_check(None, "journal_mode", mode.to_string(), |r| r.get::<_, String>(0));
    }
    if let Some(kb) = cfg.cache_size_kb { if kb > 0 { let _ = conn.pragma_update(None, "cache_size", -kb); } }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_file_and_enables_foreign_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet.db");
        let conn = open_with_config(&path, &DbOpenConfig::default()).unwrap();
        let fk: i64 = conn.query_row("PRAGMA foreign_keys", [], |r| r.get(0)).unwrap();
        assert_eq!(fk, 1);
        let mode: String = conn.query_row("PRAGMA journal_mode", [], |r| r.get(0)).unwrap();
        assert_eq!(mode.to_ascii_uppercase(), "WAL");
        assert!(path.exists());
    }

    #[test]
    fn journal_mode_display() {
        assert_eq!(JournalMode::Wal.to_string(), "WAL");
        assert_eq!(JournalMode::Memory.to_string(), "MEMORY");
    }
}
