//! Identifiers and protocol constants shared by every simulated node.
//!
//! A face is the id of the neighbor a message is exchanged with, so node ids
//! double as face ids throughout the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Initial TTL carried by a freshly built Interest.
pub const DEFAULT_INTEREST_TTL: u32 = 20;

/// Nominal size of a Data object synthesized by a producer.
pub const DEFAULT_DATA_SIZE: usize = 1024;

/// Lifetime assigned to a dynamic FIB face on every add or erase.
pub const FIB_FACE_LIFETIME: u32 = 10;

/// Minimum distance gap before a cache hit asks for a further copy downstream.
pub const DEFAULT_CACHE_THRESHOLD: i32 = 1;

/// Upper bound of caching/current distance ratio for re-caching a hit.
pub const DEFAULT_GOLDEN_RATIO: f64 = 0.618;

/// Number of chunks a file is split into unless configured otherwise.
pub const DEFAULT_CHUNKS_PER_FILE: u32 = 100;

/// Unique identifier for a simulated node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Position of the node in the registry arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<usize> for NodeId {
    fn from(index: usize) -> Self {
        NodeId(index as u32)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Faces are addressed by the id of the neighbor on the other end.
pub type FaceId = NodeId;

/// Identifier shared by an Interest and every Data produced in answer to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PacketId(pub u64);

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PacketId({})", self.0)
    }
}

/// Role a node plays in the simulated network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    /// Origin of every Data object under one top-level prefix.
    Producer,
    /// Forwards, aggregates and caches.
    Router,
    /// Issues Interests and consumes Data.
    User,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeRole::Producer => "producer",
            NodeRole::Router => "router",
            NodeRole::User => "user",
        };
        f.write_str(s)
    }
}
