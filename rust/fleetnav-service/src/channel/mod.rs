//! Live Channel: long-lived text connections from bots and simulators.
//!
//! Connections register under an identity; the rest of the service pushes
//! commands to an identity through [`ChannelRegistry::send`] without knowing
//! anything about the socket behind it.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fleetnav_core::NavError;
use indexmap::IndexMap;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

pub mod protocol;
pub mod session;
pub mod ticker;

/// Manual steering command for a bot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = NavError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            _ => Err(NavError::invalid(format!("direction must be one of up, down, left, right (got '{s}')"))),
        }
    }
}

/// Result of pushing a message to an identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    Delivered,
    /// No live connection under that identity.
    Dropped,
}

struct Handle {
    serial: u64,
    tx: UnboundedSender<String>,
}

/// Identity -> live connection. Cloning shares the same registry.
#[derive(Clone, Default)]
pub struct ChannelRegistry {
    inner: Arc<Mutex<IndexMap<String, Handle>>>,
    next_serial: Arc<AtomicU64>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, IndexMap<String, Handle>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Binds `identity` to a connection, replacing any previous binding.
    /// Returns the serial the connection must present to unregister.
    pub(crate) fn register(&self, identity: &str, tx: UnboundedSender<String>) -> u64 {
        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        let previous = self.entries().insert(identity.to_string(), Handle { serial, tx });
        if previous.is_some() {
            info!(identity, serial, "channel identity re-bound to a new connection");
        } else {
            info!(identity, serial, "channel registered");
        }
        serial
    }

    /// Removes the binding only if it still belongs to the connection holding `serial`.
    pub(crate) fn unregister(&self, identity: &str, serial: u64) -> bool {
        let mut entries = self.entries();
        if entries.get(identity).map(|h| h.serial) != Some(serial) {
            return false;
        }
        entries.shift_remove(identity);
        info!(identity, serial, "channel unregistered");
        true
    }

    /// Pushes `text` to `identity`, warning when nobody is listening.
    pub fn send(&self, identity: &str, text: &str) -> Delivery {
        let delivery = self.push(identity, text);
        if delivery == Delivery::Dropped {
            warn!(identity, "no live channel; message dropped");
        }
        delivery
    }

    /// Like [`send`](Self::send) but only logs at debug; for periodic traffic.
    pub fn push(&self, identity: &str, text: &str) -> Delivery {
        let mut entries = self.entries();
        let Some(handle) = entries.get(identity) else {
            debug!(identity, "no live channel");
            return Delivery::Dropped;
        };
        if handle.tx.send(text.to_string()).is_ok() {
            debug!(identity, text, "channel message queued");
            return Delivery::Delivered;
        }
        // writer side is gone; forget the stale binding
        entries.shift_remove(identity);
        debug!(identity, "channel closed");
        Delivery::Dropped
    }

    pub fn send_command(&self, identity: &str, direction: Direction) -> Delivery {
        let delivery = self.send(identity, direction.as_str());
        info!(identity, direction = %direction, ?delivery, "move command");
        delivery
    }

    /// Registered identities in registration order.
    pub fn identities(&self) -> Vec<String> {
        self.entries().keys().cloned().collect()
    }

    pub fn is_registered(&self, identity: &str) -> bool {
        self.entries().contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
