//! Breaking dependency cycles so the graph can be scheduled topologically.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::RwLock;

use itertools::Itertools;
use petgraph::stable_graph::NodeIndex;
use petgraph::Direction;

use crate::error::GraphError;
use crate::graph::PackageGraph;
use crate::node::{NodeId, NodeRole, NodeState};
use crate::prebuilt::{is_srpm_prebuilt, ArtifactChecker};

impl PackageGraph {
    /// Find any directed cycle. The returned path starts and ends at the
    /// same node. Which cycle is found is unspecified.
    pub fn find_any_directed_cycle(&self) -> Option<Vec<NodeId>> {
        let components = petgraph::algo::tarjan_scc(&self.graph);
        // self loops are forbidden, so only components with more than one
        // node can contain a cycle
        let component = components.into_iter().find(|component| component.len() > 1)?;
        let members: HashSet<NodeIndex> = component.iter().copied().collect();
        let start = component[0];

        // BFS inside the component until an edge leads back to the start
        let mut came_from: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut queue = VecDeque::from([start]);
        let mut seen = HashSet::from([start]);
        while let Some(index) = queue.pop_front() {
            for successor in self.graph.neighbors_directed(index, Direction::Outgoing) {
                if !members.contains(&successor) {
                    continue;
                }
                if successor == start {
                    let mut path = vec![self.graph[index].id];
                    let mut current = index;
                    while current != start {
                        current = came_from[&current];
                        path.push(self.graph[current].id);
                    }
                    path.reverse();
                    path.push(self.graph[start].id);
                    return Some(path);
                }
                if seen.insert(successor) {
                    came_from.insert(successor, index);
                    queue.push_back(successor);
                }
            }
        }
        None
    }

    /// Repair directed cycles until none remain.
    ///
    /// Each cycle is first treated as packages of a single spec file and
    /// collapsed behind a meta node; when that is not applicable the
    /// pre-built break is tried. An unresolvable cycle aborts with the full
    /// arrow chain.
    pub fn make_dag(
        &mut self,
        artifacts: &dyn ArtifactChecker,
        guard: Option<&RwLock<()>>,
    ) -> Result<(), GraphError> {
        while let Some(cycle) = self.find_any_directed_cycle() {
            if let Err(err) = self.fix_cycle(&cycle, artifacts, guard) {
                let chain = cycle.iter().map(|&id| self.display_name(id)).join(" --> ");
                tracing::error!("Unfixable dependency cycle: {chain}");
                tracing::error!(
                    "Re-prime the toolchain with the packages above before retrying the build"
                );
                return Err(GraphError::UnresolvableCycle {
                    chain,
                    source: Box::new(err),
                });
            }
        }
        Ok(())
    }

    fn fix_cycle(
        &mut self,
        cycle: &[NodeId],
        artifacts: &dyn ArtifactChecker,
        guard: Option<&RwLock<()>>,
    ) -> Result<(), GraphError> {
        // the cycle starts and ends at the same node; repairs work on the
        // trimmed sequence
        let trimmed = &cycle[1..];
        match self.fix_cycle_with_meta_node(trimmed) {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::debug!("Meta node repair not applicable: {err}");
                self.fix_cycle_with_prebuilt(trimmed, artifacts, guard)
            }
        }
    }

    /// Collapse a build-free cycle behind a fresh meta node: drop every
    /// edge between cycle members, re-point external dependents at the meta
    /// node, and make the meta node depend on every member.
    fn fix_cycle_with_meta_node(&mut self, cycle: &[NodeId]) -> Result<(), GraphError> {
        let has_build = cycle
            .iter()
            .any(|&id| self.node(id).map(|node| node.role) == Some(NodeRole::Build));
        if has_build {
            return Err(GraphError::BuildDependencyCycle);
        }

        let members: HashSet<NodeId> = cycle.iter().copied().collect();
        for &from in cycle {
            for &to in cycle {
                if from != to && self.has_edge(from, to) {
                    self.remove_edge(from, to)?;
                }
            }
        }

        let mut dependents = BTreeSet::new();
        for &member in cycle {
            for dependent in self.predecessors(member) {
                if members.contains(&dependent) {
                    continue;
                }
                dependents.insert(dependent);
                self.remove_edge(dependent, member)?;
            }
        }

        let dependents: Vec<NodeId> = dependents.into_iter().collect();
        let meta = self.add_meta_node(&dependents, cycle)?;
        tracing::debug!(
            "Resolved cycle of {} nodes behind {}",
            cycle.len(),
            self.display_name(meta)
        );
        Ok(())
    }

    /// Break a build/run cycle at a run node whose source archive is
    /// already fully built: clone it into a pre-built node and re-point the
    /// build dependents from the offending archive at the clone.
    fn fix_cycle_with_prebuilt(
        &mut self,
        cycle: &[NodeId],
        artifacts: &dyn ArtifactChecker,
        guard: Option<&RwLock<()>>,
    ) -> Result<(), GraphError> {
        let count = cycle.len();
        for position in 0..count {
            let previous = cycle[(position + count - 1) % count];
            let current = cycle[position];
            let previous_is_build =
                self.node(previous).map(|node| node.role) == Some(NodeRole::Build);
            let Some(current_node) = self.node(current) else {
                continue;
            };
            if !previous_is_build || current_node.role != NodeRole::Run {
                continue;
            }

            let srpm_path = current_node.srpm_path.clone();
            let (prebuilt, _expected, missing) =
                is_srpm_prebuilt(&srpm_path, self, artifacts, guard);
            if !prebuilt {
                tracing::debug!("{srpm_path} is not fully built, missing artifacts: {missing:?}");
                continue;
            }

            let clone = self.clone_node(current)?;
            if let Some(node) = self.node_mut(clone) {
                node.state = NodeState::UpToDate;
                node.role = NodeRole::PreBuilt;
            }
            tracing::debug!(
                "Breaking cycle with pre-built artifacts of {}",
                self.display_name(current)
            );

            let previous_srpm = self
                .node(previous)
                .map(|node| node.srpm_path.clone())
                .unwrap_or_default();
            for dependent in self.predecessors(current) {
                let redirect = self.node(dependent).is_some_and(|node| {
                    node.role == NodeRole::Build && node.srpm_path == previous_srpm
                });
                if redirect {
                    self.remove_edge(dependent, current)?;
                    self.add_edge(dependent, clone)?;
                }
            }
            return Ok(());
        }
        Err(GraphError::NoPrebuiltSrpms)
    }
}
