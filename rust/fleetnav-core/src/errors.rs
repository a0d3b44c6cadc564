use thiserror::Error;

use crate::models::{BotId, EdgeId, NodeId};

#[derive(Error, Debug)]
pub enum NavError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("no route between node {from} and node {to}")]
    NoRouteFound { from: NodeId, to: NodeId },
    #[error("bot {0} is already on a path; wait for it to finish first")]
    AlreadyNavigating(BotId),
    #[error(transparent)]
    Storage(#[from] rusqlite::Error),
    #[error("stored document is malformed: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub type NavResult<T> = Result<T, NavError>;

impl NavError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        NavError::InvalidInput(msg.into())
    }

    pub fn bot_not_found(id: BotId) -> Self {
        NavError::NotFound(format!("bot {id}"))
    }

    pub fn node_not_found(id: NodeId) -> Self {
        NavError::NotFound(format!("map node {id}"))
    }

    pub fn edge_not_found(id: EdgeId) -> Self {
        NavError::NotFound(format!("path {id}"))
    }

    pub fn empty_map() -> Self {
        NavError::NotFound("map node (the map has no nodes)".to_string())
    }
}
