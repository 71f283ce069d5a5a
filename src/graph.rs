//! The package dependency graph: an arena of typed nodes with directed
//! edges from dependent to dependency, plus the mutation API the build
//! pipeline drives it with.

use std::collections::{BTreeSet, HashMap};

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::Dfs;
use petgraph::Direction;

use crate::error::GraphError;
use crate::lookup::{LookupEntry, LookupIndex};
use crate::node::{NodeId, NodeRole, NodeSources, NodeState, PkgNode};
use crate::version::VersionedPackage;

/// Directed graph of package nodes with unique, monotonically assigned ids.
///
/// The graph owns its nodes; the lookup index and all [`LookupEntry`] values
/// hold plain ids into it. The index is built lazily on first use and kept
/// in lockstep by every mutation.
pub struct PackageGraph {
    pub(crate) graph: StableDiGraph<PkgNode, ()>,
    pub(crate) node_indices: HashMap<NodeId, NodeIndex>,
    next_id: NodeId,
    lookup: Option<LookupIndex>,
}

impl Default for PackageGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageGraph {
    pub fn new() -> Self {
        Self {
            graph: StableDiGraph::new(),
            node_indices: HashMap::new(),
            next_id: 0,
            lookup: None,
        }
    }

    fn index_of(&self, id: NodeId) -> Result<NodeIndex, GraphError> {
        self.node_indices
            .get(&id)
            .copied()
            .ok_or(GraphError::NodeNotFound { id })
    }

    /// Insert a node record, assigning the next free id. Does not touch the
    /// lookup index.
    pub(crate) fn insert_node(&mut self, mut node: PkgNode) -> NodeId {
        self.next_id += 1;
        node.id = self.next_id;
        let id = node.id;
        let index = self.graph.add_node(node);
        self.node_indices.insert(id, index);
        id
    }

    fn remove_node_raw(&mut self, id: NodeId) {
        if let Some(index) = self.node_indices.remove(&id) {
            self.graph.remove_node(index);
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&PkgNode> {
        self.node_indices.get(&id).map(|index| &self.graph[*index])
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut PkgNode> {
        self.node_indices
            .get(&id)
            .map(|index| &mut self.graph[*index])
    }

    pub fn has_node(&self, id: NodeId) -> bool {
        self.node_indices.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All nodes, in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &PkgNode> {
        self.graph.node_indices().map(|index| &self.graph[index])
    }

    /// All edges as `(from, to)` id pairs.
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        self.graph
            .edge_indices()
            .filter_map(|edge| self.graph.edge_endpoints(edge))
            .map(|(from, to)| (self.graph[from].id, self.graph[to].id))
            .collect()
    }

    pub fn has_edge(&self, from: NodeId, to: NodeId) -> bool {
        match (self.index_of(from), self.index_of(to)) {
            (Ok(from), Ok(to)) => self.graph.find_edge(from, to).is_some(),
            _ => false,
        }
    }

    /// The friendly name of a node, or a placeholder for ids that are not
    /// (or no longer) in the graph.
    pub(crate) fn display_name(&self, id: NodeId) -> String {
        self.node(id)
            .map(PkgNode::friendly_name)
            .unwrap_or_else(|| format!("#{id}"))
    }

    fn edge_error(&self, from: NodeId, to: NodeId, reason: &str) -> GraphError {
        GraphError::Edge {
            from: self.display_name(from),
            to: self.display_name(to),
            reason: reason.to_owned(),
        }
    }

    /// Add a directed dependency edge. Duplicate edges, self loops, and
    /// unknown endpoints are rejected without touching the graph.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        if from == to {
            return Err(self.edge_error(from, to, "self loops are not allowed"));
        }
        let (Ok(from_index), Ok(to_index)) = (self.index_of(from), self.index_of(to)) else {
            return Err(self.edge_error(from, to, "endpoint is not in the graph"));
        };
        if self.graph.find_edge(from_index, to_index).is_some() {
            return Err(self.edge_error(from, to, "edge already exists"));
        }
        self.graph.add_edge(from_index, to_index, ());
        Ok(())
    }

    pub fn remove_edge(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        let from_index = self.index_of(from)?;
        let to_index = self.index_of(to)?;
        let edge = self
            .graph
            .find_edge(from_index, to_index)
            .ok_or_else(|| self.edge_error(from, to, "edge does not exist"))?;
        self.graph.remove_edge(edge);
        Ok(())
    }

    /// Ids of the nodes depending on `id`.
    pub fn predecessors(&self, id: NodeId) -> Vec<NodeId> {
        let Ok(index) = self.index_of(id) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(index, Direction::Incoming)
            .map(|neighbor| self.graph[neighbor].id)
            .collect()
    }

    /// Ids of the nodes `id` depends on.
    pub fn successors(&self, id: NodeId) -> Vec<NodeId> {
        let Ok(index) = self.index_of(id) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(index, Direction::Outgoing)
            .map(|neighbor| self.graph[neighbor].id)
            .collect()
    }

    /// Build the lookup index if it does not exist yet: run and remote
    /// nodes first so every build node has an entry to attach to, then
    /// builds, then purge entries that never got a run reference by
    /// removing the orphaned build node from the graph.
    fn ensure_lookup(&mut self) -> Result<(), GraphError> {
        if self.lookup.is_some() {
            return Ok(());
        }
        let mut runs = Vec::new();
        let mut builds = Vec::new();
        for node in self.nodes() {
            match node.role {
                NodeRole::Run | NodeRole::Remote => runs.push(node.id),
                NodeRole::Build => builds.push(node.id),
                _ => {}
            }
        }
        let mut index = LookupIndex::default();
        for id in runs.into_iter().chain(builds) {
            let Some(node) = self.node(id) else { continue };
            let role = node.role;
            let Some(pkg) = &node.versioned_pkg else {
                tracing::warn!(
                    "Skipping {} in lookup: node has no package",
                    node.friendly_name()
                );
                continue;
            };
            let interval = match pkg.interval() {
                Ok(interval) => interval,
                Err(err) => {
                    tracing::warn!("Skipping {} in lookup: {err}", node.friendly_name());
                    continue;
                }
            };
            index.insert(&pkg.name, id, role, interval, true)?;
        }
        for orphan in index.purge_orphan_builds() {
            tracing::debug!("Removing orphaned build node {}", self.display_name(orphan));
            self.remove_node_raw(orphan);
        }
        index.sort_buckets();
        self.lookup = Some(index);
        Ok(())
    }

    /// Create a package node and index it. On a lookup failure, including a
    /// malformed interval, the node stays in the graph unindexed and the
    /// error is returned.
    pub fn add_pkg_node(
        &mut self,
        pkg: VersionedPackage,
        state: NodeState,
        role: NodeRole,
        sources: NodeSources,
    ) -> Result<NodeId, GraphError> {
        self.ensure_lookup()?;
        let interval = pkg.interval();
        let name = pkg.name.clone();
        let id = self.insert_node(PkgNode::new_pkg(pkg, state, role, sources));
        let interval = interval?;
        if let Some(lookup) = self.lookup.as_mut() {
            lookup.insert(&name, id, role, interval, false)?;
        }
        Ok(id)
    }

    /// Delete a node and splice it out of the lookup index.
    pub fn remove_pkg_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        self.index_of(id)?;
        self.remove_node_raw(id);
        if let Some(lookup) = self.lookup.as_mut() {
            lookup.remove_node(id);
        }
        Ok(())
    }

    /// Copy a node into a fresh id. The clone carries no edges and is not
    /// indexed.
    pub fn clone_node(&mut self, id: NodeId) -> Result<NodeId, GraphError> {
        let node = self
            .node(id)
            .ok_or(GraphError::NodeNotFound { id })?
            .clone();
        Ok(self.insert_node(node))
    }

    /// Create an edge-only meta node aggregating `to` behind it: every node
    /// in `from` waits for the meta node, the meta node waits for every
    /// node in `to`.
    pub fn add_meta_node(&mut self, from: &[NodeId], to: &[NodeId]) -> Result<NodeId, GraphError> {
        let meta = self.insert_node(PkgNode::new_meta());
        for &dependent in from {
            if let Err(err) = self.add_edge(dependent, meta) {
                self.remove_node_raw(meta);
                return Err(err);
            }
        }
        for &dependency in to {
            if let Err(err) = self.add_edge(meta, dependency) {
                self.remove_node_raw(meta);
                return Err(err);
            }
        }
        Ok(meta)
    }

    pub fn find_goal_node(&self, goal_name: &str) -> Option<NodeId> {
        self.nodes()
            .find(|node| node.role == NodeRole::Goal && node.goal_name == goal_name)
            .map(|node| node.id)
    }

    /// Create a goal node depending on the run nodes of the given packages,
    /// or on every indexed run node when `packages` is empty.
    ///
    /// With `strict`, unmatched packages fail the call; otherwise they are
    /// logged and skipped.
    pub fn add_goal_node(
        &mut self,
        goal_name: &str,
        packages: &[VersionedPackage],
        strict: bool,
    ) -> Result<NodeId, GraphError> {
        if self.find_goal_node(goal_name).is_some() {
            return Err(GraphError::GoalAlreadyExists {
                name: goal_name.to_owned(),
            });
        }
        self.ensure_lookup()?;

        let mut targets = BTreeSet::new();
        let mut missing = Vec::new();
        if packages.is_empty() {
            targets.extend(self.all_run_nodes()?);
        } else {
            for pkg in packages {
                let entry = match self.find_exact_pkg(pkg)? {
                    Some(entry) => Some(entry),
                    None => self.find_best_pkg(pkg)?,
                };
                match entry.and_then(|entry| entry.run) {
                    Some(run) => {
                        targets.insert(run);
                    }
                    None if strict => missing.push(pkg.name.clone()),
                    None => {
                        tracing::warn!("Goal {goal_name} could not find package {}", pkg.name);
                    }
                }
            }
        }
        if !missing.is_empty() {
            return Err(GraphError::GoalMissingPackages {
                name: goal_name.to_owned(),
                missing: missing.join(", "),
            });
        }

        let goal = self.insert_node(PkgNode::new_goal(goal_name));
        for target in targets {
            if let Err(err) = self.add_edge(goal, target) {
                self.remove_node_raw(goal);
                return Err(err);
            }
        }
        Ok(goal)
    }

    /// The entry whose run interval equals the query's interval exactly.
    pub fn find_exact_pkg(
        &mut self,
        pkg: &VersionedPackage,
    ) -> Result<Option<LookupEntry>, GraphError> {
        self.ensure_lookup()?;
        let interval = pkg.interval()?;
        let Some(bucket) = self.lookup.as_ref().and_then(|l| l.bucket(&pkg.name)) else {
            return Ok(None);
        };
        for entry in bucket {
            if entry.interval == interval {
                if entry.run.is_none() {
                    return Err(GraphError::MissingRunNode {
                        name: pkg.name.clone(),
                    });
                }
                return Ok(Some(entry.clone()));
            }
        }
        Ok(None)
    }

    /// The highest-version entry whose run interval satisfies the query's
    /// interval. When a remote-only entry wins over a locally buildable
    /// candidate, that resolution is logged.
    pub fn find_best_pkg(
        &mut self,
        pkg: &VersionedPackage,
    ) -> Result<Option<LookupEntry>, GraphError> {
        self.ensure_lookup()?;
        let interval = pkg.interval()?;
        let mut best: Option<LookupEntry> = None;
        let mut local_satisfies = false;
        {
            let Some(bucket) = self.lookup.as_ref().and_then(|l| l.bucket(&pkg.name)) else {
                return Ok(None);
            };
            for entry in bucket {
                if entry.run.is_none() {
                    return Err(GraphError::MissingRunNode {
                        name: pkg.name.clone(),
                    });
                }
                if entry.interval.satisfies(&interval) {
                    if entry.build.is_some() {
                        local_satisfies = true;
                    }
                    best = Some(entry.clone());
                }
            }
        }
        if let Some(entry) = &best {
            if local_satisfies && entry.build.is_none() {
                let is_remote = entry
                    .run
                    .and_then(|run| self.node(run))
                    .is_some_and(|node| node.role == NodeRole::Remote);
                if is_remote {
                    tracing::warn!(
                        "Resolving {} to a remote node over locally buildable candidates",
                        pkg.name
                    );
                }
            }
        }
        Ok(best)
    }

    /// Range-form alias of [`Self::find_best_pkg`].
    pub fn find_double_conditional_pkg(
        &mut self,
        pkg: &VersionedPackage,
    ) -> Result<Option<LookupEntry>, GraphError> {
        self.find_best_pkg(pkg)
    }

    pub fn all_nodes(&self) -> Vec<NodeId> {
        self.nodes().map(|node| node.id).collect()
    }

    /// Every indexed run (or remote) node, in name and version order.
    pub fn all_run_nodes(&mut self) -> Result<Vec<NodeId>, GraphError> {
        self.ensure_lookup()?;
        Ok(self
            .lookup
            .iter()
            .flat_map(|lookup| lookup.entries())
            .filter_map(|entry| entry.run)
            .collect())
    }

    /// Every indexed build node, in name and version order.
    pub fn all_build_nodes(&mut self) -> Result<Vec<NodeId>, GraphError> {
        self.ensure_lookup()?;
        Ok(self
            .lookup
            .iter()
            .flat_map(|lookup| lookup.entries())
            .filter_map(|entry| entry.build)
            .collect())
    }

    /// Merge several nodes into one replacement that inherits everything
    /// from `parent` except the package version. Dependents of the victims
    /// are re-pointed at the new node, the new node depends on the parent,
    /// and the victims leave the graph and the lookup. A failure along the
    /// way restores the lookup to its previous state.
    pub fn create_collapsed_node(
        &mut self,
        pkg: VersionedPackage,
        parent: NodeId,
        victims: &[NodeId],
    ) -> Result<NodeId, GraphError> {
        let parent_node = self
            .node(parent)
            .ok_or(GraphError::NodeNotFound { id: parent })?
            .clone();
        if parent_node.role != NodeRole::Run {
            return Err(GraphError::InvalidNodeRole {
                name: parent_node.friendly_name(),
                role: parent_node.role,
            });
        }
        self.ensure_lookup()?;

        let mut victim_records = Vec::with_capacity(victims.len());
        for &victim in victims {
            let node = self
                .node(victim)
                .ok_or(GraphError::NodeNotFound { id: victim })?;
            victim_records.push((victim, node.versioned_pkg.clone(), node.role));
        }

        // dependents to re-point, collected before any mutation
        let mut dependents: BTreeSet<NodeId> = victims
            .iter()
            .flat_map(|&victim| self.predecessors(victim))
            .collect();
        for victim in victims {
            dependents.remove(victim);
        }

        // clear the victims' lookup slots first so the new entry cannot
        // collide with them
        if let Some(lookup) = self.lookup.as_mut() {
            for &victim in victims {
                lookup.remove_node(victim);
            }
        }

        let interval = match pkg.interval() {
            Ok(interval) => interval,
            Err(err) => {
                self.restore_victims(&victim_records);
                return Err(err);
            }
        };
        let name = pkg.name.clone();
        let mut node = parent_node;
        node.implicit = pkg.is_implicit();
        node.versioned_pkg = Some(pkg);
        let role = node.role;
        let new_id = self.insert_node(node);

        if let Some(lookup) = self.lookup.as_mut() {
            if let Err(err) = lookup.insert(&name, new_id, role, interval, false) {
                self.remove_node_raw(new_id);
                self.restore_victims(&victim_records);
                return Err(err);
            }
        }
        for &dependent in &dependents {
            if let Err(err) = self.add_edge(dependent, new_id) {
                self.rollback_collapse(new_id, &victim_records);
                return Err(err);
            }
        }
        if let Err(err) = self.add_edge(new_id, parent) {
            self.rollback_collapse(new_id, &victim_records);
            return Err(err);
        }

        for &victim in victims {
            self.remove_node_raw(victim);
        }
        Ok(new_id)
    }

    fn rollback_collapse(
        &mut self,
        new_id: NodeId,
        victim_records: &[(NodeId, Option<VersionedPackage>, NodeRole)],
    ) {
        self.remove_node_raw(new_id);
        if let Some(lookup) = self.lookup.as_mut() {
            lookup.remove_node(new_id);
        }
        self.restore_victims(victim_records);
    }

    fn restore_victims(&mut self, victim_records: &[(NodeId, Option<VersionedPackage>, NodeRole)]) {
        let Some(lookup) = self.lookup.as_mut() else {
            return;
        };
        for (id, pkg, role) in victim_records {
            let Some(pkg) = pkg else { continue };
            let Ok(interval) = pkg.interval() else {
                continue;
            };
            if lookup.insert(&pkg.name, *id, *role, interval, false).is_err() {
                tracing::warn!("Could not restore lookup entry for {}", pkg.name);
            }
        }
    }

    /// A new graph holding every node reachable from `root` and the edges
    /// among them. Node records are copied with their ids preserved; the
    /// subgraph starts with an empty lookup index and rebuilds it on first
    /// use.
    pub fn create_subgraph(&self, root: NodeId) -> Result<PackageGraph, GraphError> {
        let root_index = self.index_of(root)?;
        let mut subgraph = PackageGraph::new();
        let mut visited = Vec::new();
        let mut dfs = Dfs::new(&self.graph, root_index);
        while let Some(index) = dfs.next(&self.graph) {
            visited.push(index);
        }

        let mut index_map = HashMap::new();
        for &index in &visited {
            let node = self.graph[index].clone();
            let id = node.id;
            subgraph.next_id = subgraph.next_id.max(id);
            let new_index = subgraph.graph.add_node(node);
            subgraph.node_indices.insert(id, new_index);
            index_map.insert(index, new_index);
        }
        for &index in &visited {
            for successor in self.graph.neighbors_directed(index, Direction::Outgoing) {
                if let Some(&target) = index_map.get(&successor) {
                    subgraph.graph.add_edge(index_map[&index], target, ());
                }
            }
        }
        Ok(subgraph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::VersionCondition;

    fn add_run(graph: &mut PackageGraph, name: &str, version: &str) -> NodeId {
        graph
            .add_pkg_node(
                VersionedPackage::exact(name, version),
                NodeState::Build,
                NodeRole::Run,
                NodeSources::default(),
            )
            .unwrap()
    }

    fn add_build(graph: &mut PackageGraph, name: &str, version: &str) -> NodeId {
        graph
            .add_pkg_node(
                VersionedPackage::exact(name, version),
                NodeState::Build,
                NodeRole::Build,
                NodeSources::default(),
            )
            .unwrap()
    }

    #[test]
    fn node_ids_are_monotonic_and_unique() {
        let mut graph = PackageGraph::new();
        let a = add_run(&mut graph, "a", "1");
        let b = add_run(&mut graph, "b", "1");
        graph.remove_pkg_node(b).unwrap();
        let c = add_run(&mut graph, "c", "1");
        assert!(a < b && b < c);
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn edge_validation() {
        let mut graph = PackageGraph::new();
        let a = add_run(&mut graph, "a", "1");
        let b = add_run(&mut graph, "b", "1");
        graph.add_edge(a, b).unwrap();
        assert!(graph.has_edge(a, b));
        assert!(!graph.has_edge(b, a));

        assert!(matches!(
            graph.add_edge(a, b),
            Err(GraphError::Edge { .. })
        ));
        assert!(matches!(
            graph.add_edge(a, a),
            Err(GraphError::Edge { .. })
        ));
        assert!(matches!(
            graph.add_edge(a, 999),
            Err(GraphError::Edge { .. })
        ));

        graph.remove_edge(a, b).unwrap();
        assert!(!graph.has_edge(a, b));
        assert!(matches!(
            graph.remove_edge(a, b),
            Err(GraphError::Edge { .. })
        ));
    }

    #[test]
    fn add_and_look_up_run_and_build_pair() {
        let mut graph = PackageGraph::new();
        let run = add_run(&mut graph, "foo", "1.0");
        let build = add_build(&mut graph, "foo", "1.0");

        let query = VersionedPackage::exact("foo", "1.0");
        let entry = graph.find_exact_pkg(&query).unwrap().unwrap();
        assert_eq!(entry.run, Some(run));
        assert_eq!(entry.build, Some(build));

        // the second build for the same version collides; the node stays in
        // the graph but is not indexed
        let result = graph.add_pkg_node(
            VersionedPackage::exact("foo", "1.0"),
            NodeState::Build,
            NodeRole::Build,
            NodeSources::default(),
        );
        assert!(matches!(result, Err(GraphError::DuplicateLookup { .. })));
        assert_eq!(graph.node_count(), 3);
    }

    #[test]
    fn remote_and_local_best_match() {
        let mut graph = PackageGraph::new();
        let remote = graph
            .add_pkg_node(
                VersionedPackage::ranged(
                    "foo",
                    VersionCondition::GreaterOrEqual,
                    "1",
                    VersionCondition::Less,
                    "2",
                ),
                NodeState::Unresolved,
                NodeRole::Remote,
                NodeSources::default(),
            )
            .unwrap();
        let run = add_run(&mut graph, "foo", "1.5");

        let query = VersionedPackage::ranged(
            "foo",
            VersionCondition::GreaterOrEqual,
            "1",
            VersionCondition::Less,
            "2",
        );
        let best = graph.find_best_pkg(&query).unwrap().unwrap();
        assert_eq!(best.run, Some(run));

        // an exact query only matches the identical interval
        let exact = graph.find_exact_pkg(&query).unwrap().unwrap();
        assert_eq!(exact.run, Some(remote));
    }

    #[test]
    fn best_match_prefers_highest_version() {
        let mut graph = PackageGraph::new();
        add_run(&mut graph, "foo", "1.0");
        let highest = add_run(&mut graph, "foo", "2.0");
        add_run(&mut graph, "foo", "1.5");

        let best = graph
            .find_best_pkg(&VersionedPackage::unconstrained("foo"))
            .unwrap()
            .unwrap();
        assert_eq!(best.run, Some(highest));
    }

    #[test]
    fn remote_can_win_over_local() {
        let mut graph = PackageGraph::new();
        add_run(&mut graph, "foo", "1.0");
        add_build(&mut graph, "foo", "1.0");
        let remote = graph
            .add_pkg_node(
                VersionedPackage::ranged(
                    "foo",
                    VersionCondition::GreaterOrEqual,
                    "2",
                    VersionCondition::Less,
                    "3",
                ),
                NodeState::Unresolved,
                NodeRole::Remote,
                NodeSources::default(),
            )
            .unwrap();

        let best = graph
            .find_best_pkg(&VersionedPackage::unconstrained("foo"))
            .unwrap()
            .unwrap();
        assert_eq!(best.run, Some(remote));
        assert_eq!(best.build, None);
    }

    #[test]
    fn removed_package_is_gone_from_lookup() {
        let mut graph = PackageGraph::new();
        let run = add_run(&mut graph, "foo", "1.0");
        add_build(&mut graph, "foo", "1.0");
        graph.remove_pkg_node(run).unwrap();
        let found = graph
            .find_exact_pkg(&VersionedPackage::exact("foo", "1.0"))
            .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn lazy_rebuild_purges_orphaned_builds() {
        let mut graph = PackageGraph::new();
        let build_node = |name: &str, role| {
            PkgNode::new_pkg(
                VersionedPackage::exact(name, "1.0"),
                NodeState::Build,
                role,
                NodeSources::default(),
            )
        };
        // raw inserts, as the graph-description reader does: no index yet
        let run = graph.insert_node(build_node("foo", NodeRole::Run));
        let build = graph.insert_node(build_node("foo", NodeRole::Build));
        let orphan = graph.insert_node(build_node("bar", NodeRole::Build));

        // first lookup access rebuilds the index and drops the orphan
        let entry = graph
            .find_exact_pkg(&VersionedPackage::exact("foo", "1.0"))
            .unwrap()
            .unwrap();
        assert_eq!(entry.run, Some(run));
        assert_eq!(entry.build, Some(build));
        assert!(!graph.has_node(orphan));
    }

    #[test]
    fn malformed_interval_leaves_node_unindexed() {
        let mut graph = PackageGraph::new();
        let result = graph.add_pkg_node(
            VersionedPackage::ranged(
                "foo",
                VersionCondition::GreaterOrEqual,
                "2",
                VersionCondition::Less,
                "1",
            ),
            NodeState::Build,
            NodeRole::Run,
            NodeSources::default(),
        );
        assert!(matches!(result, Err(GraphError::InvalidInterval { .. })));
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn lazy_rebuild_skips_malformed_intervals() {
        let mut graph = PackageGraph::new();
        let good = graph.insert_node(PkgNode::new_pkg(
            VersionedPackage::exact("foo", "1.0"),
            NodeState::Build,
            NodeRole::Run,
            NodeSources::default(),
        ));
        let bad = graph.insert_node(PkgNode::new_pkg(
            VersionedPackage::ranged(
                "bar",
                VersionCondition::GreaterOrEqual,
                "2",
                VersionCondition::Less,
                "1",
            ),
            NodeState::Build,
            NodeRole::Run,
            NodeSources::default(),
        ));

        // the malformed node is skipped, not allowed to poison the rebuild
        let entry = graph
            .find_exact_pkg(&VersionedPackage::exact("foo", "1.0"))
            .unwrap()
            .unwrap();
        assert_eq!(entry.run, Some(good));
        assert!(graph.has_node(bad));
    }

    #[test]
    fn meta_node_wires_both_edge_sets() {
        let mut graph = PackageGraph::new();
        let a = add_run(&mut graph, "a", "1");
        let b = add_run(&mut graph, "b", "1");
        let c = add_run(&mut graph, "c", "1");
        let meta = graph.add_meta_node(&[a], &[b, c]).unwrap();
        assert!(graph.has_edge(a, meta));
        assert!(graph.has_edge(meta, b));
        assert!(graph.has_edge(meta, c));
        let node = graph.node(meta).unwrap();
        assert_eq!(node.role, NodeRole::PureMeta);
        assert_eq!(node.state, NodeState::Meta);
    }

    #[test]
    fn goal_node_targets_requested_packages() {
        let mut graph = PackageGraph::new();
        let foo = add_run(&mut graph, "foo", "1.0");
        let bar = add_run(&mut graph, "bar", "2.0");
        add_run(&mut graph, "baz", "3.0");

        let goal = graph
            .add_goal_node(
                "tools",
                &[
                    VersionedPackage::exact("foo", "1.0"),
                    VersionedPackage::unconstrained("bar"),
                ],
                true,
            )
            .unwrap();
        let mut targets = graph.successors(goal);
        targets.sort_unstable();
        let mut expected = vec![foo, bar];
        expected.sort_unstable();
        assert_eq!(targets, expected);

        assert!(matches!(
            graph.add_goal_node("tools", &[], true),
            Err(GraphError::GoalAlreadyExists { .. })
        ));
        assert!(matches!(
            graph.add_goal_node("broken", &[VersionedPackage::unconstrained("nope")], true),
            Err(GraphError::GoalMissingPackages { .. })
        ));
        // non-strict goals skip unmatched packages
        graph
            .add_goal_node("loose", &[VersionedPackage::unconstrained("nope")], false)
            .unwrap();
    }

    #[test]
    fn empty_goal_targets_every_run_node() {
        let mut graph = PackageGraph::new();
        let foo = add_run(&mut graph, "foo", "1.0");
        let bar = add_run(&mut graph, "bar", "2.0");
        add_build(&mut graph, "foo", "1.0");
        let goal = graph.add_goal_node("ALL", &[], false).unwrap();
        let mut targets = graph.successors(goal);
        targets.sort_unstable();
        let mut expected = vec![foo, bar];
        expected.sort_unstable();
        assert_eq!(targets, expected);
    }

    #[test]
    fn clone_copies_everything_but_id_and_edges() {
        let mut graph = PackageGraph::new();
        let a = add_run(&mut graph, "a", "1");
        let b = add_run(&mut graph, "b", "1");
        graph.add_edge(a, b).unwrap();

        let clone = graph.clone_node(a).unwrap();
        assert_ne!(clone, a);
        assert_eq!(graph.node(a).unwrap(), graph.node(clone).unwrap());
        assert!(graph.successors(clone).is_empty());
        assert!(graph.predecessors(clone).is_empty());
    }

    #[test]
    fn collapse_redirects_dependents() {
        let mut graph = PackageGraph::new();
        let parent = add_run(&mut graph, "foo", "1.0");
        let victim_a = add_run(&mut graph, "foo-a", "1.0");
        let victim_b = add_run(&mut graph, "foo-b", "1.0");
        let x = add_run(&mut graph, "x", "1");
        let y = add_run(&mut graph, "y", "1");
        graph.add_edge(x, victim_a).unwrap();
        graph.add_edge(y, victim_b).unwrap();

        let merged = graph
            .create_collapsed_node(
                VersionedPackage::exact("foo-merged", "1.0"),
                parent,
                &[victim_a, victim_b],
            )
            .unwrap();

        assert!(graph.has_edge(merged, parent));
        assert!(graph.has_edge(x, merged));
        assert!(graph.has_edge(y, merged));
        assert!(!graph.has_node(victim_a));
        assert!(!graph.has_node(victim_b));

        assert!(graph
            .find_exact_pkg(&VersionedPackage::exact("foo-a", "1.0"))
            .unwrap()
            .is_none());
        assert!(graph
            .find_exact_pkg(&VersionedPackage::exact("foo-b", "1.0"))
            .unwrap()
            .is_none());
        let entry = graph
            .find_exact_pkg(&VersionedPackage::exact("foo-merged", "1.0"))
            .unwrap()
            .unwrap();
        assert_eq!(entry.run, Some(merged));

        // the new node inherits the parent's fields except the package
        let merged_node = graph.node(merged).unwrap();
        assert_eq!(
            merged_node.versioned_pkg.as_ref().unwrap().name,
            "foo-merged"
        );
        assert_eq!(merged_node.role, NodeRole::Run);
    }

    #[test]
    fn collapse_requires_a_run_parent() {
        let mut graph = PackageGraph::new();
        add_run(&mut graph, "foo", "1.0");
        let build = add_build(&mut graph, "foo", "1.0");
        let victim = add_run(&mut graph, "bar", "1.0");
        assert!(matches!(
            graph.create_collapsed_node(
                VersionedPackage::exact("merged", "1.0"),
                build,
                &[victim]
            ),
            Err(GraphError::InvalidNodeRole { .. })
        ));
        // nothing was removed
        assert!(graph.has_node(victim));
        assert!(graph
            .find_exact_pkg(&VersionedPackage::exact("bar", "1.0"))
            .unwrap()
            .is_some());
    }

    #[test]
    fn collapse_failure_restores_lookup() {
        let mut graph = PackageGraph::new();
        let parent = add_run(&mut graph, "foo", "1.0");
        let victim = add_run(&mut graph, "bar", "1.0");
        // a collapsed package colliding with an existing entry fails
        let result = graph.create_collapsed_node(
            VersionedPackage::exact("foo", "1.0"),
            parent,
            &[victim],
        );
        assert!(matches!(result, Err(GraphError::DuplicateLookup { .. })));
        assert!(graph.has_node(victim));
        let entry = graph
            .find_exact_pkg(&VersionedPackage::exact("bar", "1.0"))
            .unwrap()
            .unwrap();
        assert_eq!(entry.run, Some(victim));
    }

    #[test]
    fn subgraph_contains_reachable_nodes_only() {
        let mut graph = PackageGraph::new();
        let a = add_run(&mut graph, "a", "1");
        let b = add_run(&mut graph, "b", "1");
        let c = add_run(&mut graph, "c", "1");
        let d = add_run(&mut graph, "d", "1");
        graph.add_edge(a, b).unwrap();
        graph.add_edge(b, c).unwrap();
        graph.add_edge(d, a).unwrap();

        let subgraph = graph.create_subgraph(a).unwrap();
        assert_eq!(subgraph.node_count(), 3);
        assert!(subgraph.has_node(a));
        assert!(subgraph.has_node(b));
        assert!(subgraph.has_node(c));
        assert!(!subgraph.has_node(d));
        assert!(subgraph.has_edge(a, b));
        assert!(subgraph.has_edge(b, c));
        assert_eq!(subgraph.edge_count(), 2);
    }
}
