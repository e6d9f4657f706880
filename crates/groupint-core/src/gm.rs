use crate::{Cascade, GroupHierarchy, GroupId, TimedState, UNGROUPED};
use log::debug;
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap};

/// Distinct groups visited by one causal path
type PathGroups = BTreeSet<GroupId>;

/// GM of a single cascade: the largest number of distinct groups touched by
/// any one infection path.
///
/// Edges are replayed in log order, so the log must list each cascade's
/// edges in simulated-time order. An out-of-order log is not detected and
/// undercounts.
///
/// Seeds are states at time 0 that start an edge. The sentinel group never
/// contributes to a path's group set.
pub fn gm_per_cascade(cascade: &Cascade, tree: &GroupHierarchy) -> usize {
    let dag = cascade.dag();
    let mut gm = 0;
    let mut path_groups: HashMap<TimedState, BTreeSet<PathGroups>> = HashMap::new();

    // Initiate seeds
    for edge in dag.edges() {
        let Some(&source) = dag.node(edge.u) else { continue };
        if source.time != 0 || path_groups.contains_key(&source) {
            continue;
        }
        let mut seed = PathGroups::new();
        let group = tree.group_of(source.entity);
        if group != UNGROUPED {
            seed.insert(group);
        }
        path_groups.insert(source, BTreeSet::from([seed]));
    }

    for edge in dag.edges() {
        let (Some(&source), Some(&target)) = (dag.node(edge.u), dag.node(edge.v)) else {
            continue;
        };
        let Some(incoming) = path_groups.get(&source).cloned() else {
            debug!(
                "simulation {}: {} reached before any path arrived; edge skipped",
                cascade.simulation_step, source
            );
            continue;
        };

        // Same-entity transitions inherit the source's path groups unchanged
        if source.entity == target.entity {
            path_groups.entry(target).or_default().extend(incoming);
            continue;
        }

        let group = tree.group_of(target.entity);
        let merged = path_groups.entry(target).or_default();
        for mut pg in incoming {
            if group != UNGROUPED {
                pg.insert(group);
            }
            gm = gm.max(pg.len());
            merged.insert(pg);
        }
    }

    gm
}

/// GM over the whole ensemble (max over cascades).
///
/// Cascades are independent, so they are evaluated in parallel; each one
/// is still replayed sequentially.
pub fn gm_bound<I, E>(cascades: I, tree: &GroupHierarchy) -> Result<usize, E>
where
    I: Iterator<Item = Result<Cascade, E>> + Send,
    E: Send,
{
    cascades
        .par_bridge()
        .map(|cascade| cascade.map(|c| gm_per_cascade(&c, tree)))
        .try_reduce(|| 0, |a, b| Ok(a.max(b)))
}
