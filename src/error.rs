use thiserror::Error;

use crate::node::{NodeId, NodeRole};

/// Errors produced by the dependency graph engine.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A node with a non-indexable role was offered to the lookup, or an
    /// operation required a specific role the node does not have.
    #[error("node {name} has role {role}, which is not valid here")]
    InvalidNodeRole { name: String, role: NodeRole },

    #[error("duplicate {slot} entry in lookup for package {name}")]
    DuplicateLookup { name: String, slot: &'static str },

    #[error("invalid version interval for package {name}: {reason}")]
    InvalidInterval { name: String, reason: String },

    /// A build node has no matching run node, either at insert time or when
    /// an orphaned entry is hit during a query.
    #[error("orphaned build node: no run node for package {name}")]
    MissingRunNode { name: String },

    #[error("failed to add edge from {from} to {to}: {reason}")]
    Edge {
        from: String,
        to: String,
        reason: String,
    },

    #[error("node {id} is not in the graph")]
    NodeNotFound { id: NodeId },

    #[error("cycle contains build dependencies, unresolvable")]
    BuildDependencyCycle,

    #[error("cycle contains no pre-built SRPMs, unresolvable")]
    NoPrebuiltSrpms,

    #[error("unresolvable dependency cycle: {chain}")]
    UnresolvableCycle {
        chain: String,
        #[source]
        source: Box<GraphError>,
    },

    #[error("goal {name} already exists")]
    GoalAlreadyExists { name: String },

    #[error("goal {name} could not find packages: {missing}")]
    GoalMissingPackages { name: String, missing: String },

    #[error("invalid graph description at line {line}: {message}")]
    ParseGraph { line: usize, message: String },

    #[error("failed to encode node {name}")]
    EncodeNode {
        name: String,
        #[source]
        source: rmp_serde::encode::Error,
    },

    #[error("failed to decode node payload: {reason}")]
    DecodeNode { reason: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
