//! Dependency graph engine for a source-package build pipeline: typed
//! package nodes, version-aware lookup, cycle repair, and a persistent
//! graph-description format.

mod dag;
pub mod dot;
pub mod error;
pub mod graph;
pub mod lookup;
pub mod node;
pub mod prebuilt;
pub mod tracing;
pub mod version;

pub use error::GraphError;
pub use graph::PackageGraph;
pub use lookup::LookupEntry;
pub use node::{
    NodeId, NodeRole, NodeSources, NodeState, PkgNode, NO_REPO, NO_RPM_PATH, NO_SRPM_PATH,
};
pub use prebuilt::{is_srpm_prebuilt, ArtifactChecker, FsArtifacts};
pub use version::{Version, VersionCondition, VersionInterval, VersionedPackage};
