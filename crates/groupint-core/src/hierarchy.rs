use crate::{EntityId, GroupId, UNGROUPED};
use log::warn;
use std::collections::{BTreeSet, HashMap};

/// Static entity -> group lookup.
///
/// Also used as the child -> parent tree of the GM bound, where the child
/// is an entity and the parent is the group it belongs to.
#[derive(Clone, Debug, Default)]
pub struct GroupHierarchy {
    groups: HashMap<EntityId, GroupId>,
}

impl GroupHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(group, entity)` membership pairs
    pub fn from_memberships(pairs: impl IntoIterator<Item = (GroupId, EntityId)>) -> Self {
        let mut h = Self::new();
        for (group, entity) in pairs {
            h.insert(entity, group);
        }
        h
    }

    /// Build from `(child, parent)` tree edges
    pub fn from_tree_edges(edges: impl IntoIterator<Item = (EntityId, GroupId)>) -> Self {
        let mut h = Self::new();
        for (child, parent) in edges {
            h.insert(child, parent);
        }
        h
    }

    /// Assign `entity` to `group`. A later assignment replaces an earlier one.
    pub fn insert(&mut self, entity: EntityId, group: GroupId) {
        if let Some(previous) = self.groups.insert(entity, group) {
            if previous != group {
                warn!(
                    "entity {} listed in groups {} and {}; keeping {}",
                    entity, previous, group, group
                );
            }
        }
    }

    pub fn lookup(&self, entity: EntityId) -> Option<GroupId> {
        self.groups.get(&entity).copied()
    }

    /// Group of `entity`, or `UNGROUPED` when it is not mapped
    pub fn group_of(&self, entity: EntityId) -> GroupId {
        self.lookup(entity).unwrap_or(UNGROUPED)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Distinct intervenable groups
    pub fn groups(&self) -> BTreeSet<GroupId> {
        self.groups
            .values()
            .copied()
            .filter(|&g| g != UNGROUPED)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmapped_entity_is_ungrouped() {
        let h = GroupHierarchy::from_memberships(vec![(10, 1), (20, 2)]);
        assert_eq!(h.group_of(1), 10);
        assert_eq!(h.group_of(2), 20);
        assert_eq!(h.group_of(3), UNGROUPED);
        assert_eq!(h.lookup(3), None);
    }

    #[test]
    fn test_groups_exclude_sentinel() {
        let h = GroupHierarchy::from_tree_edges(vec![(1, 10), (2, -1), (3, 10), (4, 30)]);
        assert_eq!(h.len(), 4);
        assert_eq!(h.groups().into_iter().collect::<Vec<_>>(), vec![10, 30]);
    }
}
