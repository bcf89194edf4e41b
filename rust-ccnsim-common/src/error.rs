//! Error types for the ccnsim implementation.

use thiserror::Error;

use crate::types::NodeId;

/// All possible errors that can occur while building or addressing a simulated network.
///
/// Protocol outcomes (NACKs, loop resolution, over-capacity stores) are never
/// reported through this type.
#[derive(Error, Debug)]
pub enum Error {
    /// A name could not be parsed or is too short for the requested operation.
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// The supplied topology is inconsistent.
    #[error("Topology error: {0}")]
    Topology(String),

    /// A configuration value is out of range.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A registry operation addressed a node that does not exist.
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Other error: {0}")]
    Other(String),
}
