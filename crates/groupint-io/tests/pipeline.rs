use approx::assert_abs_diff_eq;
use groupint_core::{gm_bound, Cascade, EventType};
use groupint_io::{
    audit_path, decision_path, read_audit, run_fill_gaps_command, run_gm_command, run_solve_command,
    EventLog, RunManifest, SolveArgs,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const CHAIN_LOG: &str = "\
simulation_step,source_id,source_time,source_subindex,target_id,target_time,target_subindex,pathway,event_type
0,1,0,-1,2,1,-1,0,SusceptibleToExposed
0,2,1,-1,3,2,-1,0,ExposedToInfectious
1,1,0,-1,2,1,-1,0,SusceptibleToExposed
1,2,1,-1,3,2,-1,0,ExposedToInfectious
";

const HIERARCHY: &str = "group_id,entity_id\n10,1\n20,2\n30,3\n";

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn solve_args(dir: &Path, budgets: Vec<u32>) -> SolveArgs {
    SolveArgs {
        input_file: write(dir, "log.csv", CHAIN_LOG),
        hierarchy_file: write(dir, "hierarchy.csv", HIERARCHY),
        budgets,
        intervention_times: vec![1],
        gm_tree: None,
        no_gm: false,
        fixed_budget: false,
        threads: 1,
        input_code: "chain".to_string(),
        summary_path: dir.join("summaries"),
        intervention_path: dir.join("interventions"),
        out_filename: "summary.csv".to_string(),
    }
}

#[test]
fn solve_writes_the_middle_group() {
    let dir = TempDir::new().unwrap();
    let args = solve_args(dir.path(), vec![1]);
    run_solve_command(&args).unwrap();

    let decision = decision_path(&args, 1, 1);
    assert!(decision.ends_with("chain/I1-B1.csv"));
    let text = fs::read_to_string(&decision).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines, vec!["group,time,xval", "20,1"]);

    let audit = read_audit(audit_path(&args, 1, 1)).unwrap();
    let groups: Vec<i64> = audit.iter().map(|r| r.group).collect();
    assert_eq!(groups, vec![10, 20, 30]);
    assert!(audit.iter().all(|r| r.intervene == (r.group == 20)));

    let summaries = dir.path().join("summaries");
    assert!(summaries.join("0header.csv").is_file());
    let row = fs::read_to_string(summaries.join("chain_I1B1_summary.csv")).unwrap();
    assert!(row.starts_with("chain,2,1,1,1,"));

    let manifest = RunManifest::load_from_file(summaries.join("chain_I1B1_manifest.json")).unwrap();
    assert_eq!(manifest.gm, Some(3));
    assert_eq!(manifest.selected, vec![20]);
    assert_eq!(manifest.num_cascades, 2);
    assert_abs_diff_eq!(manifest.lp_objective, 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(manifest.objective, 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(manifest.no_action, 3.0, epsilon = 1e-12);

    // input_code,num_sims,budget,delay,budget_used,lp_budget,obj_value,lp_obj_value,...
    let fields: Vec<&str> = row.trim_end().split(',').collect();
    let lp_budget: f64 = fields[5].parse().unwrap();
    let lp_obj_value: f64 = fields[7].parse().unwrap();
    assert_abs_diff_eq!(lp_budget, 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(lp_obj_value, 1.0, epsilon = 1e-6);
    assert_eq!(fields[8], "3");
}

#[test]
fn fixed_budget_run_still_reports_gm() {
    let dir = TempDir::new().unwrap();
    let mut args = solve_args(dir.path(), vec![1]);
    args.fixed_budget = true;
    run_solve_command(&args).unwrap();

    let text = fs::read_to_string(decision_path(&args, 1, 1)).unwrap();
    assert_eq!(text.lines().collect::<Vec<_>>(), vec!["group,time,xval", "20,1"]);

    let summaries = dir.path().join("summaries");
    let manifest = RunManifest::load_from_file(summaries.join("chain_I1B1_manifest.json")).unwrap();
    assert_eq!(manifest.gm, Some(3));
    assert_eq!(manifest.threshold, None);

    let row = fs::read_to_string(summaries.join("chain_I1B1_summary.csv")).unwrap();
    assert_eq!(row.trim_end().split(',').nth(8), Some("3"));
}

#[test]
fn empty_log_is_fatal_and_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let mut args = solve_args(dir.path(), vec![1]);
    args.no_gm = true;
    fs::write(
        &args.input_file,
        "simulation_step,source_id,source_time,source_subindex,target_id,target_time,target_subindex,pathway,event_type\n",
    )
    .unwrap();

    assert!(run_solve_command(&args).is_err());
    assert!(!decision_path(&args, 1, 1).exists());
}

#[test]
fn native_simulator_headers_are_accepted() {
    let dir = TempDir::new().unwrap();
    let log = write(
        dir.path(),
        "native.csv",
        "simulation_step,source,source_time_step,source_index,target,target_time_step,target_index,level_0_intervention,level_1_intervention,pathway,event\n\
         3,1,0,-1,2,1,0,0,0,home,StoE\n\
         3,2,1,0,2,1,1,0,0,home,EtoE\n\
         3,2,1,1,2,2,-1,0,0,home,EtoI\n",
    );

    let cascades: Vec<Cascade> = EventLog::open(&log)
        .unwrap()
        .cascades()
        .unwrap()
        .map(|c| c.unwrap())
        .collect();
    assert_eq!(cascades.len(), 1);
    let cascade = &cascades[0];
    assert_eq!(cascade.simulation_step, 3);
    assert_eq!(cascade.num_discarded(), 1);
    assert_eq!(cascade.dag().num_edges(), 2);
    assert!(cascade.dag().edges().iter().any(|e| e.kind == EventType::ExposedToInfectious));
}

#[test]
fn event_log_can_be_replayed() {
    let dir = TempDir::new().unwrap();
    let log = EventLog::open(write(dir.path(), "log.csv", CHAIN_LOG)).unwrap();
    let tree = groupint_core::GroupHierarchy::from_memberships(vec![(10, 1), (20, 2), (30, 3)]);

    let first = gm_bound(log.cascades().unwrap(), &tree).unwrap();
    let second = gm_bound(log.cascades().unwrap(), &tree).unwrap();
    assert_eq!(first, 3);
    assert_eq!(first, second);
    assert_eq!(log.cascades().unwrap().count(), 2);
}

#[test]
fn gm_command_reads_a_named_tree() {
    let dir = TempDir::new().unwrap();
    let log = write(dir.path(), "log.csv", CHAIN_LOG);
    // entity 2 is left out of the tree
    let tree = write(dir.path(), "tree.csv", "parent_group,child_group\n10,1\n30,3\n");
    assert_eq!(run_gm_command(&log, &tree).unwrap(), 2);
}

#[test]
fn fill_gaps_is_monotone_and_deterministic() {
    let dir = TempDir::new().unwrap();
    let family = dir.path().join("interventions").join("fam");
    fs::create_dir_all(&family).unwrap();
    // budget 2 rounded to a single group, budget 1 picked a different one
    fs::write(family.join("comp_I1-B1.csv"), "group,intervene,val\n1,1,0.9\n2,0,0.1\n3,0,0.0\n").unwrap();
    fs::write(family.join("comp_I1-B2.csv"), "group,intervene,val\n1,0,0.2\n2,1,1.6\n3,0,0.2\n").unwrap();

    let root = dir.path().join("interventions");
    run_fill_gaps_command(&root).unwrap();
    let b1 = fs::read(family.join("new_I1-B1.csv")).unwrap();
    let b2 = fs::read(family.join("new_I1-B2.csv")).unwrap();

    let text = String::from_utf8(b2.clone()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines, vec!["group,time", "1,1", "2,1"]);

    run_fill_gaps_command(&root).unwrap();
    assert_eq!(fs::read(family.join("new_I1-B1.csv")).unwrap(), b1);
    assert_eq!(fs::read(family.join("new_I1-B2.csv")).unwrap(), b2);
}
