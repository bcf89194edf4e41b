//! Common types and utilities for the ccnsim content-centric network simulator.
//!
//! This crate provides the message records exchanged between simulated nodes,
//! the identifiers used to address them, and the metric primitives shared by
//! the engine and the command-line front end.

pub mod ndn;
pub mod metrics;
pub mod types;
pub mod error;

/// Reexport of common types
pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
