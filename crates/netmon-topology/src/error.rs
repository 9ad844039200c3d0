//! Error types for the netmon-topology crate.
//!
//! Every variant is an invariant violation: a graph that would break the
//! published-snapshot contract. Source failures never reach this type.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error("Duplicate node id in topology: {id}")]
    DuplicateNode { id: String },

    #[error("Backbone node missing from topology: {id}")]
    MissingBackbone { id: String },

    #[error("Edge references unknown node: {id}")]
    UnknownNode { id: String },
}

pub type Result<T> = std::result::Result<T, TopologyError>;
