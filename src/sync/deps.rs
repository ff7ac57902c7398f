//! Reference-aware ordering of plan entries.

use crate::error::{PlanningError, Result};
use crate::resource::{DiffEntry, ResourceType, SyncAction, TypeProfile};
use std::collections::{BTreeSet, HashMap};

/// Orders plan entries so every cross-resource reference resolves by the
/// time the entry that holds it executes.
///
/// Deletes run first, dependents ahead of the resources they reference.
/// Creates and updates follow, referenced resources ahead of the entries
/// that point at them. References to resources outside the plan are left to
/// the target store to resolve.
#[derive(Debug, Clone)]
pub struct DependencyAnalyzer {
    profiles: HashMap<ResourceType, TypeProfile>,
}

impl DependencyAnalyzer {
    /// Creates an analyzer over the given type profiles.
    #[must_use]
    pub fn new(profiles: Vec<TypeProfile>) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|profile| (profile.resource_type, profile))
                .collect(),
        }
    }

    /// Reorders entries for execution.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningError::DependencyCycle`] when entries reference each
    /// other in a loop.
    pub fn order(&self, entries: Vec<DiffEntry>) -> Result<Vec<DiffEntry>> {
        let (deletes, writes): (Vec<DiffEntry>, Vec<DiffEntry>) = entries
            .into_iter()
            .partition(|entry| entry.action == SyncAction::Delete);

        let mut ordered = self.sort_partition(deletes, true)?;
        ordered.extend(self.sort_partition(writes, false)?);
        Ok(ordered)
    }

    /// Topologically sorts one partition of the plan.
    ///
    /// With `dependents_first` set, an entry runs before every entry it
    /// references; otherwise referenced entries run first. Ties break by
    /// promotion order of the type, then business key, so the output is
    /// stable across runs.
    fn sort_partition(
        &self,
        entries: Vec<DiffEntry>,
        dependents_first: bool,
    ) -> Result<Vec<DiffEntry>> {
        let edges = self.collect_edges(&entries, dependents_first);

        let mut in_degree = vec![0_usize; entries.len()];
        let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); entries.len()];
        let mut incoming: Vec<Vec<usize>> = vec![Vec::new(); entries.len()];
        for &(before, after) in &edges {
            outgoing[before].push(after);
            incoming[after].push(before);
            in_degree[after] += 1;
        }

        let type_rank = |entry: &DiffEntry| -> usize {
            let position = entry.resource_type.order_index();
            if dependents_first {
                ResourceType::promotion_order().len() - position
            } else {
                position
            }
        };

        let mut ready: BTreeSet<(usize, String, usize)> = entries
            .iter()
            .enumerate()
            .filter(|(index, _)| in_degree[*index] == 0)
            .map(|(index, entry)| (type_rank(entry), entry.business_key.clone(), index))
            .collect();

        let mut emitted: Vec<usize> = Vec::with_capacity(entries.len());
        while let Some((_, _, index)) = ready.pop_first() {
            emitted.push(index);
            for &after in &outgoing[index] {
                in_degree[after] -= 1;
                if in_degree[after] == 0 {
                    ready.insert((
                        type_rank(&entries[after]),
                        entries[after].business_key.clone(),
                        after,
                    ));
                }
            }
        }

        if emitted.len() != entries.len() {
            let mut remaining = vec![true; entries.len()];
            for &index in &emitted {
                remaining[index] = false;
            }
            return Err(PlanningError::DependencyCycle {
                cycle: describe_cycle(&entries, &incoming, &remaining),
            }
            .into());
        }

        let mut slots: Vec<Option<DiffEntry>> = entries.into_iter().map(Some).collect();
        Ok(emitted
            .iter()
            .filter_map(|&index| slots[index].take())
            .collect())
    }

    /// Collects deduplicated ordering edges; `(before, after)` means the
    /// entry at `before` must execute first.
    fn collect_edges(
        &self,
        entries: &[DiffEntry],
        dependents_first: bool,
    ) -> BTreeSet<(usize, usize)> {
        let index: HashMap<(ResourceType, &str), usize> = entries
            .iter()
            .enumerate()
            .map(|(position, entry)| {
                (
                    (entry.resource_type.canonical(), entry.business_key.as_str()),
                    position,
                )
            })
            .collect();

        let mut edges = BTreeSet::new();
        for (from, entry) in entries.iter().enumerate() {
            let Some(profile) = self.profiles.get(&entry.resource_type.canonical()) else {
                continue;
            };
            let Some(snapshot) = entry.reference_snapshot() else {
                continue;
            };
            for (path, value) in &snapshot.fields {
                let Some(target_type) = profile.reference_target(path) else {
                    continue;
                };
                let Some(key) = value.as_str() else {
                    continue;
                };
                let Some(&to) = index.get(&(target_type, key)) else {
                    continue;
                };
                if to == from {
                    continue;
                }
                if dependents_first {
                    edges.insert((from, to));
                } else {
                    edges.insert((to, from));
                }
            }
        }
        edges
    }
}

/// Renders one cycle among the unsortable entries as
/// `type:key -> type:key -> type:key`, closing on the first member.
///
/// Every unsortable entry has a predecessor among the unsortable entries, so
/// walking predecessors revisits a node within `remaining` steps.
fn describe_cycle(entries: &[DiffEntry], incoming: &[Vec<usize>], remaining: &[bool]) -> String {
    let label = |index: usize| {
        format!(
            "{}:{}",
            entries[index].resource_type, entries[index].business_key
        )
    };

    let Some(start) = remaining.iter().position(|stuck| *stuck) else {
        return String::from("unknown");
    };

    let mut path = vec![start];
    let mut current = start;
    loop {
        let Some(&previous) = incoming[current].iter().find(|&&node| remaining[node]) else {
            break;
        };
        if let Some(position) = path.iter().position(|&node| node == previous) {
            // Predecessor edges were walked backwards; reverse for display.
            let mut nodes: Vec<usize> = path[position..].to_vec();
            nodes.reverse();
            let mut names: Vec<String> = nodes.into_iter().map(label).collect();
            if let Some(first) = names.first().cloned() {
                names.push(first);
            }
            return names.join(" -> ");
        }
        path.push(previous);
        current = previous;
    }
    path.into_iter().map(label).collect::<Vec<_>>().join(" -> ")
}
