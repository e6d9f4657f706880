use groupint_core::{gm_bound, Cascade, EventRecord, EventType, GroupHierarchy};
use groupint_lp::{
    run_intervention, MicroLpSolver, RoundingStrategy, RunParams, SolverConfig,
};
use approx::assert_abs_diff_eq;
use std::convert::Infallible;

fn record(sim: i64, src: (i64, i64), dst: (i64, i64), kind: EventType) -> EventRecord {
    EventRecord {
        simulation_step: sim,
        source_id: src.0,
        source_time: src.1,
        source_subindex: -1,
        target_id: dst.0,
        target_time: dst.1,
        target_subindex: -1,
        pathway: "0".to_string(),
        event_type: kind,
    }
}

/// Two identical cascades: source(t=0) -> mid(t=1) -> end(t=2)
fn two_chains() -> Vec<Cascade> {
    (0..2)
        .map(|sim| {
            let records = [
                record(sim, (1, 0), (2, 1), EventType::SusceptibleToExposed),
                record(sim, (2, 1), (3, 2), EventType::ExposedToInfectious),
            ];
            Cascade::from_records(sim as usize, sim, &records)
        })
        .collect()
}

fn hierarchy() -> GroupHierarchy {
    GroupHierarchy::from_memberships(vec![(10, 1), (20, 2), (30, 3)])
}

fn ok(cascades: Vec<Cascade>) -> impl Iterator<Item = Result<Cascade, Infallible>> {
    cascades.into_iter().map(Ok)
}

#[test]
fn blocks_the_middle_group() {
    let h = hierarchy();
    let gm = gm_bound(ok(two_chains()), &h).unwrap();
    assert_eq!(gm, 3);

    let params = RunParams {
        budget: 1,
        intervention_time: 1,
        rounding: RoundingStrategy::default(),
    };
    let outcome = run_intervention(
        ok(two_chains()),
        &h,
        &params,
        Some(gm),
        &MicroLpSolver,
        &SolverConfig::with_threads(1),
    )
    .unwrap();

    assert_eq!(outcome.num_cascades, 2);
    assert_eq!(outcome.num_groups, 3);
    assert_eq!(outcome.selected, vec![20]);
    assert_eq!(outcome.gm, Some(3));
    assert_abs_diff_eq!(outcome.threshold.unwrap(), 1.0 / 6.0, epsilon = 1e-12);
    assert_abs_diff_eq!(outcome.lp_objective, 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(outcome.lp_budget, 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(outcome.objective, 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(outcome.no_action, 3.0, epsilon = 1e-12);

    let audited: Vec<i64> = outcome.audit.iter().map(|r| r.group).collect();
    assert_eq!(audited, vec![10, 20, 30]);
}

#[test]
fn fixed_budget_picks_the_same_group() {
    let h = hierarchy();
    let params = RunParams {
        budget: 1,
        intervention_time: 1,
        rounding: RoundingStrategy { use_gm: false, fixed_budget: true },
    };
    let outcome = run_intervention(ok(two_chains()), &h, &params, None, &MicroLpSolver, &SolverConfig::default())
        .unwrap();

    assert_eq!(outcome.selected, vec![20]);
    assert_eq!(outcome.threshold, None);
    assert_eq!(outcome.audit.len(), 3);
}

#[test]
fn zero_budget_leaves_everyone_infected() {
    let h = hierarchy();
    let params = RunParams {
        budget: 0,
        intervention_time: 1,
        rounding: RoundingStrategy { use_gm: false, fixed_budget: false },
    };
    let outcome = run_intervention(ok(two_chains()), &h, &params, None, &MicroLpSolver, &SolverConfig::default())
        .unwrap();

    assert!(outcome.selected.is_empty());
    assert_abs_diff_eq!(outcome.lp_objective, 3.0, epsilon = 1e-6);
    assert_abs_diff_eq!(outcome.objective, 3.0, epsilon = 1e-12);
}
