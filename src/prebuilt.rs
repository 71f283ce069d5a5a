//! Presence checks for artifacts that already exist on disk.

use std::path::Path;
use std::sync::RwLock;

use crate::graph::PackageGraph;
use crate::node::{NodeRole, NO_RPM_PATH};

/// Answers whether a built artifact exists at a path.
pub trait ArtifactChecker {
    fn rpm_exists(&self, path: &str) -> bool;
}

/// Checks the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsArtifacts;

impl ArtifactChecker for FsArtifacts {
    fn rpm_exists(&self, path: &str) -> bool {
        Path::new(path).is_file()
    }
}

/// Whether every run node built from `srpm_path` already has its artifact
/// on disk. Returns the expected artifact paths and the missing subset;
/// the archive counts as pre-built when nothing is missing.
///
/// When a guard is passed it is held for shared read access while the
/// node set is enumerated.
pub fn is_srpm_prebuilt(
    srpm_path: &str,
    graph: &PackageGraph,
    artifacts: &dyn ArtifactChecker,
    guard: Option<&RwLock<()>>,
) -> (bool, Vec<String>, Vec<String>) {
    let _shared = guard.map(|lock| lock.read().unwrap_or_else(|poisoned| poisoned.into_inner()));

    let mut expected = Vec::new();
    let mut missing = Vec::new();
    for node in graph.nodes() {
        if node.role != NodeRole::Run || node.srpm_path != srpm_path {
            continue;
        }
        if node.rpm_path.is_empty() || node.rpm_path == NO_RPM_PATH {
            continue;
        }
        expected.push(node.rpm_path.clone());
        if !artifacts.rpm_exists(&node.rpm_path) {
            missing.push(node.rpm_path.clone());
        }
    }
    (missing.is_empty(), expected, missing)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::node::{NodeSources, NodeState};
    use crate::version::VersionedPackage;

    /// Test stand-in reporting a fixed set of paths as present.
    #[derive(Debug, Default)]
    pub(crate) struct FixedArtifacts {
        present: HashSet<String>,
    }

    impl FixedArtifacts {
        pub(crate) fn with_paths<const N: usize>(paths: [&str; N]) -> Self {
            Self {
                present: paths.iter().map(|path| (*path).to_owned()).collect(),
            }
        }
    }

    impl ArtifactChecker for FixedArtifacts {
        fn rpm_exists(&self, path: &str) -> bool {
            self.present.contains(path)
        }
    }

    fn graph_with_runs(rpms: &[&str]) -> PackageGraph {
        let mut graph = PackageGraph::new();
        for (position, rpm) in rpms.iter().enumerate() {
            graph
                .add_pkg_node(
                    VersionedPackage::exact(format!("pkg{position}"), "1.0"),
                    NodeState::Build,
                    NodeRole::Run,
                    NodeSources {
                        srpm_path: "shared.src.rpm".to_owned(),
                        rpm_path: (*rpm).to_owned(),
                        ..Default::default()
                    },
                )
                .unwrap();
        }
        graph
    }

    #[test]
    fn prebuilt_when_every_artifact_exists() {
        let graph = graph_with_runs(&["a.rpm", "b.rpm"]);
        let artifacts = FixedArtifacts::with_paths(["a.rpm", "b.rpm"]);
        let (prebuilt, expected, missing) =
            is_srpm_prebuilt("shared.src.rpm", &graph, &artifacts, None);
        assert!(prebuilt);
        assert_eq!(expected.len(), 2);
        assert!(missing.is_empty());
    }

    #[test]
    fn missing_artifacts_are_reported() {
        let graph = graph_with_runs(&["a.rpm", "b.rpm"]);
        let artifacts = FixedArtifacts::with_paths(["a.rpm"]);
        let (prebuilt, expected, missing) =
            is_srpm_prebuilt("shared.src.rpm", &graph, &artifacts, None);
        assert!(!prebuilt);
        assert_eq!(expected, vec!["a.rpm".to_owned(), "b.rpm".to_owned()]);
        assert_eq!(missing, vec!["b.rpm".to_owned()]);
    }

    #[test]
    fn sentinel_and_empty_paths_are_skipped() {
        let graph = graph_with_runs(&[NO_RPM_PATH, ""]);
        let (prebuilt, expected, missing) = is_srpm_prebuilt(
            "shared.src.rpm",
            &graph,
            &FixedArtifacts::default(),
            None,
        );
        assert!(prebuilt);
        assert!(expected.is_empty());
        assert!(missing.is_empty());
    }

    #[test]
    fn guard_is_taken_shared() {
        let graph = graph_with_runs(&["a.rpm"]);
        let guard = RwLock::new(());
        // a second reader must not block the enumeration
        let _outer = guard.read().unwrap();
        let (prebuilt, _, _) = is_srpm_prebuilt(
            "shared.src.rpm",
            &graph,
            &FixedArtifacts::with_paths(["a.rpm"]),
            Some(&guard),
        );
        assert!(prebuilt);
    }
}
