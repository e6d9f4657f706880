use crate::formats::{
    discover_variants, read_gm_tree, read_hierarchy, write_audit, write_decision, write_gap_filled,
    EventLog,
};
use crate::summary::{
    ensure_summary_header, summary_path, write_summary, ManifestInputs, RunManifest, SummaryRow,
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use groupint_core::{fill_gaps, gm_bound, GroupHierarchy};
use groupint_lp::{
    build_model, solve_and_round, LpSolver, MicroLpSolver, RoundingStrategy, RunParams,
    SolverConfig,
};
use log::info;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "groupint")]
#[command(about = "Group intervention planning over simulated contagion cascades")]
#[command(long_about = "Builds an LP relaxation over an ensemble of cascades, rounds it to a \
                        per-group intervention decision and repairs decisions across budgets")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Solve and round every (budget, intervention time) pair
    Solve(SolveArgs),

    /// Compute the GM bound of an event log
    Gm {
        /// Event log CSV
        #[arg(short = 'i', long)]
        input: PathBuf,

        /// GM tree CSV (child, parent)
        #[arg(short = 't', long)]
        tree: PathBuf,
    },

    /// Make decisions monotone in the budget
    FillGaps {
        /// Directory searched recursively for comp_I*-B*.csv audit files
        #[arg(long)]
        interventions_dir: PathBuf,
    },
}

#[derive(Args, Clone, Debug)]
pub struct SolveArgs {
    /// Event log CSV
    pub input_file: PathBuf,

    /// Group hierarchy CSV (group, entity)
    pub hierarchy_file: PathBuf,

    /// Budgets to sweep
    #[arg(long, value_delimiter = ',', num_args = 1.., required = true)]
    pub budgets: Vec<u32>,

    /// Intervention times to sweep
    #[arg(long, value_delimiter = ',', num_args = 1.., required = true)]
    pub intervention_times: Vec<i64>,

    /// Separate GM tree (defaults to the hierarchy)
    #[arg(long)]
    pub gm_tree: Option<PathBuf>,

    /// Round with the group count instead of GM
    #[arg(long)]
    pub no_gm: bool,

    /// Pick exactly `budget` groups by fractional value
    #[arg(long)]
    pub fixed_budget: bool,

    /// Solver threads
    #[arg(long, default_value = "1")]
    pub threads: usize,

    /// Label for this input in output paths and summaries
    #[arg(long, default_value = "run")]
    pub input_code: String,

    /// Directory for summary rows and manifests
    #[arg(long, default_value = "summaries")]
    pub summary_path: PathBuf,

    /// Directory for decision and audit files
    #[arg(long, default_value = "interventions")]
    pub intervention_path: PathBuf,

    /// Suffix of summary file names
    #[arg(long, default_value = "summary.csv")]
    pub out_filename: String,
}

impl SolveArgs {
    pub fn rounding(&self) -> RoundingStrategy {
        RoundingStrategy {
            use_gm: !self.no_gm,
            fixed_budget: self.fixed_budget,
        }
    }
}

/// `{intervention_path}/{input_code}/I{tau}-B{budget}.csv`
pub fn decision_path(args: &SolveArgs, tau: i64, budget: u32) -> PathBuf {
    args.intervention_path
        .join(&args.input_code)
        .join(format!("I{}-B{}.csv", tau, budget))
}

/// `{intervention_path}/{input_code}/comp_I{tau}-B{budget}.csv`
pub fn audit_path(args: &SolveArgs, tau: i64, budget: u32) -> PathBuf {
    args.intervention_path
        .join(&args.input_code)
        .join(format!("comp_I{}-B{}.csv", tau, budget))
}

fn load_gm_tree(args: &SolveArgs, hierarchy: &GroupHierarchy) -> Result<GroupHierarchy> {
    match &args.gm_tree {
        Some(path) => read_gm_tree(path),
        None => Ok(hierarchy.clone()),
    }
}

pub fn run_solve_command(args: &SolveArgs) -> Result<()> {
    println!("Group Intervention Solve");
    println!("========================");
    println!("Input: {:?}", args.input_file);
    println!("Hierarchy: {:?}", args.hierarchy_file);
    println!("Budgets: {:?}", args.budgets);
    println!("Intervention times: {:?}", args.intervention_times);
    println!("Rounding: {:?}", args.rounding());
    println!("Threads: {}", args.threads);

    let hierarchy = read_hierarchy(&args.hierarchy_file)?;
    let log = EventLog::open(&args.input_file)?;
    let rounding = args.rounding();
    let solver = MicroLpSolver;
    let config = SolverConfig::with_threads(args.threads);

    // Fixed-budget runs still report GM
    let gm = if rounding.use_gm {
        let tree = load_gm_tree(args, &hierarchy)?;
        let gm = gm_bound(log.cascades()?, &tree)
            .with_context(|| format!("reading {}", log.path().display()))?;
        println!("GM: {}", gm);
        Some(gm)
    } else {
        None
    };

    ensure_summary_header(&args.summary_path)?;

    for &tau in &args.intervention_times {
        for &budget in &args.budgets {
            let params = RunParams { budget, intervention_time: tau, rounding };
            info!("Run: budget {} intervention time {}", budget, tau);

            let model = build_model(log.cascades()?, &hierarchy, tau, budget)?;
            let (outcome, _) = solve_and_round(model, &params, gm, &solver, &config)?;

            let decision = decision_path(args, tau, budget);
            write_decision(&decision, &outcome.selected, tau)?;
            write_audit(audit_path(args, tau, budget), &outcome.audit)?;

            let row = SummaryRow::from_outcome(&outcome, &args.input_code, &args.input_file, &decision);
            write_summary(
                &summary_path(&args.summary_path, &args.input_code, tau, budget, &args.out_filename),
                &row,
            )?;

            let inputs = ManifestInputs {
                input_file: &args.input_file,
                hierarchy_file: &args.hierarchy_file,
                gm_tree: args.gm_tree.as_deref(),
                input_code: &args.input_code,
                solver: solver.name(),
                solver_config: &config,
            };
            let manifest_file = args
                .summary_path
                .join(format!("{}_I{}B{}_manifest.json", args.input_code, tau, budget));
            RunManifest::new(&inputs, &outcome).save_to_file(&manifest_file)?;

            println!(
                "I{} B{}: LP {:.4} (budget used {:.3}), rounded {:.4}, no action {:.4}, {} groups -> {:?}",
                tau,
                budget,
                outcome.lp_objective,
                outcome.lp_budget,
                outcome.objective,
                outcome.no_action,
                outcome.selected.len(),
                decision
            );
        }
    }

    Ok(())
}

pub fn run_gm_command(input: &Path, tree: &Path) -> Result<usize> {
    println!("GM Bound");
    println!("========");
    println!("Input: {:?}", input);
    println!("Tree: {:?}", tree);

    let tree = read_gm_tree(tree)?;
    let log = EventLog::open(input)?;
    let gm = gm_bound(log.cascades()?, &tree)
        .with_context(|| format!("reading {}", input.display()))?;
    println!("GM: {}", gm);
    Ok(gm)
}

pub fn run_fill_gaps_command(interventions_dir: &Path) -> Result<()> {
    println!("Gap Filling");
    println!("===========");
    println!("Interventions: {:?}", interventions_dir);

    let variants = discover_variants(interventions_dir)?;
    let filled = fill_gaps(&variants);
    for solution in &filled {
        let path = write_gap_filled(solution)?;
        println!(
            "{} groups (short by {}) -> {:?}",
            solution.groups.len(),
            solution.deficit,
            path
        );
    }
    println!("Wrote {} gap-filled files", filled.len());
    Ok(())
}
