use crate::{GroupId, Time};
use log::{info, warn};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// One row of a rounding audit table
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AuditRow {
    pub group: GroupId,
    pub intervene: bool,
    pub val: f64,
}

/// Identifies the run that produced an audit table
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariantKey {
    pub family: String,
    pub delay: Time,
    pub budget: u32,
}

/// A previously emitted audit table and the run it came from
#[derive(Clone, Debug)]
pub struct Variant {
    pub key: VariantKey,
    pub rows: Vec<AuditRow>,
}

impl Variant {
    pub fn new(family: impl Into<String>, delay: Time, budget: u32, rows: Vec<AuditRow>) -> Self {
        Self {
            key: VariantKey { family: family.into(), delay, budget },
            rows,
        }
    }
}

/// Repaired intervention set for one `(family, delay, budget)`
#[derive(Clone, Debug, PartialEq)]
pub struct FilledSolution {
    pub key: VariantKey,
    /// Selected groups, ascending
    pub groups: Vec<GroupId>,
    /// How many groups short of the requested budget the result is
    pub deficit: usize,
}

/// Per-budget view of one family's variants
#[derive(Default)]
struct BudgetEntry {
    size: usize,
    selected: BTreeSet<GroupId>,
}

/// Reconcile rounded solutions across budgets so that a larger budget never
/// selects fewer groups.
///
/// For each requested budget the largest realized solution that fits is
/// taken as the base, then topped up with the best-ranked unselected groups.
/// Ranking sums `val / budget` over every budget of the same
/// `(family, delay)`. Ties go to the smaller group id (candidates) and the
/// smaller budget (bases). Families are independent and processed in
/// parallel; output is ordered by key.
pub fn fill_gaps(variants: &[Variant]) -> Vec<FilledSolution> {
    let mut families: BTreeMap<(&str, Time), Vec<&Variant>> = BTreeMap::new();
    for v in variants {
        families
            .entry((v.key.family.as_str(), v.key.delay))
            .or_default()
            .push(v);
    }
    let families: Vec<((&str, Time), Vec<&Variant>)> = families.into_iter().collect();

    let filled: Vec<Vec<FilledSolution>> = families
        .par_iter()
        .map(|((family, delay), members)| fill_family(family, *delay, members))
        .collect();

    let filled: Vec<FilledSolution> = filled.into_iter().flatten().collect();
    info!("gap-filled {} solutions", filled.len());
    filled
}

fn fill_family(family: &str, delay: Time, members: &[&Variant]) -> Vec<FilledSolution> {
    let mut scores: BTreeMap<GroupId, f64> = BTreeMap::new();
    let mut budgets: BTreeMap<u32, BudgetEntry> = BTreeMap::new();

    for v in members {
        let entry = budgets.entry(v.key.budget).or_default();
        for row in &v.rows {
            let score = if v.key.budget == 0 {
                0.0
            } else {
                row.val / v.key.budget as f64
            };
            *scores.entry(row.group).or_insert(0.0) += score;
            if row.intervene {
                entry.size += 1;
                entry.selected.insert(row.group);
            }
        }
    }

    let mut ranked: Vec<(GroupId, f64)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    budgets
        .keys()
        .map(|&budget| {
            // Largest realized solution that fits; ascending budgets keep the
            // smaller one on ties
            let mut base: Option<&BudgetEntry> = None;
            for entry in budgets.values() {
                if entry.size <= budget as usize && base.map_or(true, |b| entry.size > b.size) {
                    base = Some(entry);
                }
            }
            let mut selected = base.map(|b| b.selected.clone()).unwrap_or_default();

            let mut remaining = (budget as usize).saturating_sub(selected.len());
            for (group, _) in &ranked {
                if remaining == 0 {
                    break;
                }
                if selected.insert(*group) {
                    remaining -= 1;
                }
            }
            if remaining > 0 {
                warn!(
                    "{} I{}-B{}: only {} candidate groups, {} short of budget",
                    family,
                    delay,
                    budget,
                    selected.len(),
                    remaining
                );
            }

            FilledSolution {
                key: VariantKey { family: family.to_string(), delay, budget },
                groups: selected.into_iter().collect(),
                deficit: remaining,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(group: GroupId, intervene: bool, val: f64) -> AuditRow {
        AuditRow { group, intervene, val }
    }

    fn family() -> Vec<Variant> {
        vec![
            // budget 1 rounded to two groups (over budget)
            Variant::new("a/", 2, 1, vec![row(1, true, 0.6), row(2, true, 0.4), row(3, false, 0.0)]),
            // budget 2 rounded to a single group
            Variant::new("a/", 2, 2, vec![row(1, false, 0.1), row(2, true, 1.0), row(3, false, 0.9)]),
            Variant::new("a/", 2, 3, vec![row(1, true, 1.0), row(2, true, 1.0), row(3, true, 1.0)]),
        ]
    }

    #[test]
    fn test_sizes_are_monotone_in_budget() {
        let filled = fill_gaps(&family());
        assert_eq!(filled.len(), 3);
        let sizes: Vec<usize> = filled.iter().map(|f| f.groups.len()).collect();
        assert_eq!(sizes, vec![1, 2, 3]);
        for f in &filled {
            assert!(f.groups.len() <= f.key.budget as usize);
            assert_eq!(f.deficit, 0);
        }
    }

    #[test]
    fn test_base_is_largest_fitting_solution() {
        let filled = fill_gaps(&family());
        // budget 1: budget-2 run (size 1) is the only fitting base
        assert_eq!(filled[0].groups, vec![2]);
        // budget 2: the budget-1 run realized exactly two groups
        assert_eq!(filled[1].groups, vec![1, 2]);
        assert_eq!(filled[2].groups, vec![1, 2, 3]);
    }

    #[test]
    fn test_short_candidate_list_is_deficient() {
        let variants = vec![Variant::new("b/", 0, 5, vec![row(1, false, 0.2), row(2, false, 0.1)])];
        let filled = fill_gaps(&variants);
        assert_eq!(filled[0].groups, vec![1, 2]);
        assert_eq!(filled[0].deficit, 3);
    }

    #[test]
    fn test_families_are_independent() {
        let mut variants = family();
        variants.push(Variant::new("a/", 5, 1, vec![row(9, true, 1.0)]));
        variants.push(Variant::new("b/", 2, 1, vec![row(7, false, 0.3), row(8, false, 0.2)]));

        let filled = fill_gaps(&variants);
        let keys: Vec<(String, Time, u32)> = filled
            .iter()
            .map(|f| (f.key.family.clone(), f.key.delay, f.key.budget))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("a/".to_string(), 2, 1),
                ("a/".to_string(), 2, 2),
                ("a/".to_string(), 2, 3),
                ("a/".to_string(), 5, 1),
                ("b/".to_string(), 2, 1),
            ]
        );
        assert_eq!(filled[3].groups, vec![9]);
        assert_eq!(filled[4].groups, vec![7]);
    }

    #[test]
    fn test_deterministic() {
        let a = fill_gaps(&family());
        let b = fill_gaps(&family());
        assert_eq!(a, b);
    }
}
