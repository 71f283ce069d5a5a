//! The per-name lookup index over run, remote, and build nodes.
//!
//! The index is a view of the graph, not a source of truth: it is built
//! lazily from the node set and kept in lockstep by the mutation API.

use std::collections::BTreeMap;

use crate::error::GraphError;
use crate::node::{NodeId, NodeRole};
use crate::version::VersionInterval;

/// One indexed package version: the run (or remote) node that provides it
/// and the build node that produces it, when there is one.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupEntry {
    pub run: Option<NodeId>,
    pub build: Option<NodeId>,
    pub interval: VersionInterval,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct LookupIndex {
    buckets: BTreeMap<String, Vec<LookupEntry>>,
}

impl LookupIndex {
    /// Index a node under its package name.
    ///
    /// With `defer_sort` the bucket is left unsorted and a build node may
    /// temporarily create an entry without a run reference; bulk rebuilds
    /// insert all run nodes first and purge leftovers afterwards. Without
    /// it, a build node that matches no run entry is an error and the
    /// bucket is re-sorted after the insert.
    pub fn insert(
        &mut self,
        name: &str,
        id: NodeId,
        role: NodeRole,
        interval: VersionInterval,
        defer_sort: bool,
    ) -> Result<(), GraphError> {
        if !matches!(role, NodeRole::Build | NodeRole::Run | NodeRole::Remote) {
            return Err(GraphError::InvalidNodeRole {
                name: name.to_owned(),
                role,
            });
        }
        // local provides are single versions; only remote nodes may carry a
        // two-sided range
        if role != NodeRole::Remote
            && !(interval.lower_inclusive && interval.is_single_version_or_open())
        {
            return Err(GraphError::InvalidInterval {
                name: name.to_owned(),
                reason: "local nodes require an inclusive single-version interval".to_owned(),
            });
        }

        let bucket = self.buckets.entry(name.to_owned()).or_default();
        let slot = bucket
            .iter()
            .position(|entry| entry.interval == interval);
        match (role, slot) {
            (NodeRole::Build, Some(position)) => {
                let entry = &mut bucket[position];
                if entry.build.is_some() {
                    return Err(GraphError::DuplicateLookup {
                        name: name.to_owned(),
                        slot: "build",
                    });
                }
                entry.build = Some(id);
            }
            (NodeRole::Build, None) => {
                if !defer_sort {
                    return Err(GraphError::MissingRunNode {
                        name: name.to_owned(),
                    });
                }
                bucket.push(LookupEntry {
                    run: None,
                    build: Some(id),
                    interval,
                });
            }
            (_, Some(position)) => {
                let entry = &mut bucket[position];
                if entry.run.is_some() {
                    return Err(GraphError::DuplicateLookup {
                        name: name.to_owned(),
                        slot: "run",
                    });
                }
                entry.run = Some(id);
            }
            (_, None) => bucket.push(LookupEntry {
                run: Some(id),
                build: None,
                interval,
            }),
        }

        if !defer_sort {
            bucket.sort_by(|a, b| a.interval.compare(&b.interval));
        }
        Ok(())
    }

    /// Sort every bucket by ascending run interval. Stable, so entries with
    /// equal intervals keep their insertion order.
    pub fn sort_buckets(&mut self) {
        for bucket in self.buckets.values_mut() {
            bucket.sort_by(|a, b| a.interval.compare(&b.interval));
        }
    }

    /// Drop entries that never received a run reference and report the
    /// orphaned build nodes they pointed at.
    pub fn purge_orphan_builds(&mut self) -> Vec<NodeId> {
        let mut orphans = Vec::new();
        for bucket in self.buckets.values_mut() {
            bucket.retain(|entry| {
                if entry.run.is_some() {
                    return true;
                }
                if let Some(build) = entry.build {
                    orphans.push(build);
                }
                false
            });
        }
        self.buckets.retain(|_, bucket| !bucket.is_empty());
        orphans
    }

    /// Splice out any slot referencing the node. An entry losing its run
    /// reference is dropped entirely; a build node it may still hold stays
    /// in the graph unindexed.
    pub fn remove_node(&mut self, id: NodeId) {
        for bucket in self.buckets.values_mut() {
            for entry in bucket.iter_mut() {
                if entry.build == Some(id) {
                    entry.build = None;
                }
                if entry.run == Some(id) {
                    entry.run = None;
                }
            }
            bucket.retain(|entry| entry.run.is_some());
        }
        self.buckets.retain(|_, bucket| !bucket.is_empty());
    }

    pub fn bucket(&self, name: &str) -> Option<&[LookupEntry]> {
        self.buckets.get(name).map(Vec::as_slice)
    }

    /// All entries, in name order and ascending interval order per name.
    pub fn entries(&self) -> impl Iterator<Item = &LookupEntry> {
        self.buckets.values().flatten()
    }
}
