//! Graph nodes and their state/role classification.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::version::{VersionCondition, VersionedPackage};

/// Unique node identifier, assigned by the graph and never reused.
pub type NodeId = u64;

/// Placeholder for goal nodes, which have no source archive.
pub const NO_SRPM_PATH: &str = "<NO_SRPM_PATH>";
/// Placeholder for goal nodes, which have no built artifact.
pub const NO_RPM_PATH: &str = "<NO_RPM_PATH>";
/// Placeholder for goal nodes, which come from no repository.
pub const NO_REPO: &str = "<NO_REPO>";

/// Build progress of the package a node stands for.
///
/// The integer form is the wire encoding; it starts at 1 so that 0 stays
/// reserved for "unknown" and is never emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum NodeState {
    Meta = 1,
    Build = 2,
    UpToDate = 3,
    Unresolved = 4,
    Cached = 5,
    BuildError = 6,
}

impl From<NodeState> for u8 {
    fn from(state: NodeState) -> Self {
        state as u8
    }
}

impl TryFrom<u8> for NodeState {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Meta),
            2 => Ok(Self::Build),
            3 => Ok(Self::UpToDate),
            4 => Ok(Self::Unresolved),
            5 => Ok(Self::Cached),
            6 => Ok(Self::BuildError),
            other => Err(format!("unknown node state {other}")),
        }
    }
}

/// What a node stands for: the act of building a package, its runtime
/// presence, or one of the synthetic aggregation nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum NodeRole {
    Build = 1,
    Run = 2,
    Goal = 3,
    Remote = 4,
    PureMeta = 5,
    PreBuilt = 6,
}

impl From<NodeRole> for u8 {
    fn from(role: NodeRole) -> Self {
        role as u8
    }
}

impl TryFrom<u8> for NodeRole {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Build),
            2 => Ok(Self::Run),
            3 => Ok(Self::Goal),
            4 => Ok(Self::Remote),
            5 => Ok(Self::PureMeta),
            6 => Ok(Self::PreBuilt),
            other => Err(format!("unknown node role {other}")),
        }
    }
}

/// Where a package node's inputs and outputs live on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSources {
    pub srpm_path: String,
    pub rpm_path: String,
    pub spec_path: String,
    pub source_dir: String,
    pub architecture: String,
    pub source_repo: String,
}

/// A single node of the dependency graph.
///
/// Field order below is the wire order of the node payload; `id` is skipped
/// because ids are graph-local and reassigned on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PkgNode {
    #[serde(skip)]
    pub id: NodeId,
    pub versioned_pkg: Option<VersionedPackage>,
    pub state: NodeState,
    pub role: NodeRole,
    pub srpm_path: String,
    pub rpm_path: String,
    pub spec_path: String,
    pub source_dir: String,
    pub architecture: String,
    pub source_repo: String,
    pub goal_name: String,
    pub implicit: bool,
}

impl PkgNode {
    /// A node for a local or remote package. The id is assigned when the
    /// node is inserted into a graph.
    pub fn new_pkg(
        pkg: VersionedPackage,
        state: NodeState,
        role: NodeRole,
        sources: NodeSources,
    ) -> Self {
        let implicit = pkg.is_implicit();
        Self {
            id: 0,
            versioned_pkg: Some(pkg),
            state,
            role,
            srpm_path: sources.srpm_path,
            rpm_path: sources.rpm_path,
            spec_path: sources.spec_path,
            source_dir: sources.source_dir,
            architecture: sources.architecture,
            source_repo: sources.source_repo,
            goal_name: String::new(),
            implicit,
        }
    }

    /// An edge-only aggregation node.
    pub fn new_meta() -> Self {
        Self {
            id: 0,
            versioned_pkg: None,
            state: NodeState::Meta,
            role: NodeRole::PureMeta,
            srpm_path: String::new(),
            rpm_path: String::new(),
            spec_path: String::new(),
            source_dir: String::new(),
            architecture: String::new(),
            source_repo: String::new(),
            goal_name: String::new(),
            implicit: false,
        }
    }

    /// A user-declared target node.
    pub fn new_goal(goal_name: impl Into<String>) -> Self {
        Self {
            id: 0,
            versioned_pkg: None,
            state: NodeState::Meta,
            role: NodeRole::Goal,
            srpm_path: NO_SRPM_PATH.to_owned(),
            rpm_path: NO_RPM_PATH.to_owned(),
            spec_path: String::new(),
            source_dir: String::new(),
            architecture: String::new(),
            source_repo: NO_REPO.to_owned(),
            goal_name: goal_name.into(),
            implicit: false,
        }
    }

    /// A short human-readable identifier used in logs and error messages.
    pub fn friendly_name(&self) -> String {
        match self.role {
            NodeRole::Build | NodeRole::Run | NodeRole::PreBuilt => {
                let kind = match self.role {
                    NodeRole::Build => "BUILD",
                    NodeRole::Run => "RUN",
                    _ => "PREBUILT",
                };
                let (name, version) = self
                    .versioned_pkg
                    .as_ref()
                    .map(|pkg| (pkg.name.as_str(), pkg.version.as_str()))
                    .unwrap_or_default();
                format!("{name}-{version}-{kind}<{}>", self.state)
            }
            NodeRole::Remote => {
                let Some(pkg) = &self.versioned_pkg else {
                    return format!("-REMOTE<{}>", self.state);
                };
                let mut constraint = format!("{}{}", pkg.condition, pkg.version);
                if pkg.secondary_condition != VersionCondition::Any
                    || !pkg.secondary_version.is_empty()
                {
                    constraint.push(',');
                    constraint.push_str(&pkg.secondary_condition.to_string());
                    constraint.push_str(pkg.secondary_version.as_str());
                }
                format!("{}-{constraint}-REMOTE<{}>", pkg.name, self.state)
            }
            NodeRole::Goal => self.goal_name.clone(),
            NodeRole::PureMeta => format!("Meta({})", self.id),
        }
    }

    /// The graphviz fill color shown for this node, keyed on state with two
    /// role-specific overrides.
    pub fn fill_color(&self) -> &'static str {
        match self.state {
            NodeState::Meta => {
                if self.role == NodeRole::Goal {
                    "deeppink"
                } else {
                    "aquamarine"
                }
            }
            NodeState::Build => "gold",
            NodeState::UpToDate => {
                if self.role == NodeRole::PreBuilt {
                    "greenyellow"
                } else {
                    "forestgreen"
                }
            }
            NodeState::Unresolved => "crimson",
            NodeState::Cached => "darkorchid",
            NodeState::BuildError => "darkred",
        }
    }
}

/// Equality is semantic: two nodes are equal when their version intervals
/// match (or both lack a package) and every other field except the id does.
impl PartialEq for PkgNode {
    fn eq(&self, other: &Self) -> bool {
        let pkgs_match = match (&self.versioned_pkg, &other.versioned_pkg) {
            (None, None) => true,
            (Some(a), Some(b)) => match (a.interval(), b.interval()) {
                (Ok(left), Ok(right)) => left == right,
                _ => false,
            },
            _ => false,
        };
        pkgs_match
            && self.state == other.state
            && self.role == other.role
            && self.srpm_path == other.srpm_path
            && self.rpm_path == other.rpm_path
            && self.spec_path == other.spec_path
            && self.source_dir == other.source_dir
            && self.architecture == other.architecture
            && self.source_repo == other.source_repo
            && self.goal_name == other.goal_name
            && self.implicit == other.implicit
    }
}
