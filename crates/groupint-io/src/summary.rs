use anyhow::{Context, Result};
use csv::WriterBuilder;
use groupint_lp::{RoundingStrategy, RunOutcome, SolverConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Name of the shared header file in a summary directory
pub const SUMMARY_HEADER_FILE: &str = "0header.csv";

/// One row of a run summary; field order is the column order
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub input_code: String,
    pub num_sims: usize,
    pub budget: u32,
    pub delay: i64,
    /// Groups actually intervened after rounding
    pub budget_used: usize,
    pub lp_budget: f64,
    pub obj_value: f64,
    pub lp_obj_value: f64,
    /// `-1` when GM rounding is off
    pub gm_value: i64,
    /// Seconds
    pub lp_runtime: f64,
    /// Effort proxy: constraint-matrix nonzeros handed to the solver, not a
    /// counter reported by the backend
    pub lp_work: f64,
    pub input_file: String,
    pub int_filename: String,
}

impl SummaryRow {
    pub fn from_outcome(
        outcome: &RunOutcome,
        input_code: &str,
        input_file: &Path,
        decision_file: &Path,
    ) -> Self {
        Self {
            input_code: input_code.to_string(),
            num_sims: outcome.num_cascades,
            budget: outcome.params.budget,
            delay: outcome.params.intervention_time,
            budget_used: outcome.selected.len(),
            lp_budget: outcome.lp_budget,
            obj_value: outcome.objective,
            lp_obj_value: outcome.lp_objective,
            gm_value: outcome.gm.map(|g| g as i64).unwrap_or(-1),
            lp_runtime: outcome.wall_time.as_secs_f64(),
            lp_work: outcome.work_units,
            input_file: input_file.display().to_string(),
            int_filename: decision_file.display().to_string(),
        }
    }

    pub fn header() -> [&'static str; 13] {
        [
            "input_code",
            "num_sims",
            "budget",
            "delay",
            "budget_used",
            "lp_budget",
            "obj_value",
            "lp_obj_value",
            "gm_value",
            "lp_runtime",
            "lp_work",
            "input_file",
            "int_filename",
        ]
    }
}

/// `{dir}/{input_code}_I{tau}B{budget}_{out_filename}`
pub fn summary_path(dir: &Path, input_code: &str, tau: i64, budget: u32, out_filename: &str) -> PathBuf {
    dir.join(format!("{}_I{}B{}_{}", input_code, tau, budget, out_filename))
}

/// Write a header-less one-row summary
pub fn write_summary(path: &Path, row: &SummaryRow) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("creating summary {}", path.display()))?;
    writer.serialize(row)?;
    writer.flush()?;
    Ok(())
}

/// Write `0header.csv` into `dir` unless it is already there
pub fn ensure_summary_header(dir: &Path) -> Result<PathBuf> {
    let path = dir.join(SUMMARY_HEADER_FILE);
    if path.exists() {
        return Ok(path);
    }
    std::fs::create_dir_all(dir)?;
    let mut writer = WriterBuilder::new()
        .from_path(&path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(SummaryRow::header())?;
    writer.flush()?;
    Ok(path)
}

/// Everything needed to reproduce one solve run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub timestamp: String,
    pub version: String,
    pub input_file: String,
    pub hierarchy_file: String,
    pub gm_tree: Option<String>,
    pub input_code: String,
    pub budget: u32,
    pub intervention_time: i64,
    pub rounding: RoundingStrategy,
    pub solver: String,
    pub solver_config: SolverConfig,
    pub num_cascades: usize,
    pub num_groups: usize,
    pub gm: Option<usize>,
    pub threshold: Option<f64>,
    pub no_action: f64,
    pub lp_objective: f64,
    pub objective: f64,
    pub selected: Vec<i64>,
    pub commit_hash: Option<String>,
    pub rust_version: String,
}

/// Inputs of a run that the outcome does not carry
pub struct ManifestInputs<'a> {
    pub input_file: &'a Path,
    pub hierarchy_file: &'a Path,
    pub gm_tree: Option<&'a Path>,
    pub input_code: &'a str,
    pub solver: &'a str,
    pub solver_config: &'a SolverConfig,
}

impl RunManifest {
    pub fn new(inputs: &ManifestInputs<'_>, outcome: &RunOutcome) -> Self {
        let mut selected = outcome.selected.clone();
        selected.sort_unstable();
        Self {
            run_id: Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            input_file: inputs.input_file.display().to_string(),
            hierarchy_file: inputs.hierarchy_file.display().to_string(),
            gm_tree: inputs.gm_tree.map(|p| p.display().to_string()),
            input_code: inputs.input_code.to_string(),
            budget: outcome.params.budget,
            intervention_time: outcome.params.intervention_time,
            rounding: outcome.params.rounding,
            solver: inputs.solver.to_string(),
            solver_config: inputs.solver_config.clone(),
            num_cascades: outcome.num_cascades,
            num_groups: outcome.num_groups,
            gm: outcome.gm,
            threshold: outcome.threshold,
            no_action: outcome.no_action,
            lp_objective: outcome.lp_objective,
            objective: outcome.objective,
            selected,
            commit_hash: get_git_commit(),
            rust_version: get_rust_version(),
        }
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let manifest = serde_json::from_str(&json)?;
        Ok(manifest)
    }
}

fn command_output(program: &str, args: &[&str]) -> Option<String> {
    std::process::Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
}

fn get_git_commit() -> Option<String> {
    command_output("git", &["rev-parse", "HEAD"])
}

fn get_rust_version() -> String {
    command_output("rustc", &["--version"]).unwrap_or_else(|| "unknown".to_string())
}
