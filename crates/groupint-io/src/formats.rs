use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use groupint_core::{
    AuditRow, CascadeStream, EntityId, EventRecord, FilledSolution, GroupHierarchy, GroupId, Time,
    Variant,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};

pub const DECISION_HEADER: [&str; 3] = ["group", "time", "xval"];
pub const AUDIT_HEADER: [&str; 3] = ["group", "intervene", "val"];
pub const GAP_FILLED_HEADER: [&str; 2] = ["group", "time"];

/// Record iterator over an event log file
pub type RecordIter = csv::DeserializeRecordsIntoIter<File, EventRecord>;

/// Event log on disk.
///
/// Each call to [`EventLog::cascades`] reopens the file, so the cascade
/// sequence can be replayed as often as needed without holding it in
/// memory.
#[derive(Clone, Debug)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            anyhow::bail!("event log {} does not exist", path.display());
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fresh streaming pass over the log
    pub fn cascades(&self) -> Result<CascadeStream<RecordIter>> {
        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .from_path(&self.path)
            .with_context(|| format!("opening event log {}", self.path.display()))?;
        debug!("streaming cascades from {}", self.path.display());
        Ok(CascadeStream::new(reader.into_deserialize()))
    }
}

/// Read an entity -> group mapping.
///
/// Columns are positional: group first, entity second. The header row is
/// skipped whatever its names are.
pub fn read_hierarchy(path: impl AsRef<Path>) -> Result<GroupHierarchy> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_path(path)
        .with_context(|| format!("opening group hierarchy {}", path.display()))?;

    let mut pairs = Vec::new();
    for row in reader.deserialize::<(GroupId, EntityId)>() {
        let row = row.with_context(|| format!("parsing group hierarchy {}", path.display()))?;
        pairs.push(row);
    }
    let hierarchy = GroupHierarchy::from_memberships(pairs);
    info!(
        "Loaded {} entities in {} groups from {}",
        hierarchy.len(),
        hierarchy.groups().len(),
        path.display()
    );
    Ok(hierarchy)
}

#[derive(Debug, Deserialize)]
struct TreeRow {
    #[serde(alias = "child_group")]
    child: i64,
    #[serde(alias = "parent_group")]
    parent: i64,
}

/// Read a GM tree by column name (`child`/`child_group`,
/// `parent`/`parent_group`), in any column order.
pub fn read_gm_tree(path: impl AsRef<Path>) -> Result<GroupHierarchy> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_path(path)
        .with_context(|| format!("opening GM tree {}", path.display()))?;

    let mut edges = Vec::new();
    for row in reader.deserialize::<TreeRow>() {
        let row = row.with_context(|| format!("parsing GM tree {}", path.display()))?;
        edges.push((row.child, row.parent));
    }
    Ok(GroupHierarchy::from_tree_edges(edges))
}

fn create_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
    }
    Ok(())
}

/// Write the intervention decision: one `group,time` row per selected
/// group, in ascending group order. The header keeps its `xval` column,
/// which the rows leave out.
pub fn write_decision(path: impl AsRef<Path>, groups: &[GroupId], time: Time) -> Result<()> {
    let path = path.as_ref();
    create_parent_dir(path)?;
    let mut writer = WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("creating decision file {}", path.display()))?;

    let mut sorted = groups.to_vec();
    sorted.sort_unstable();
    writer.write_record(DECISION_HEADER)?;
    for g in sorted {
        writer.write_record([g.to_string(), time.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

/// Row of an audit file as stored on disk
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub group: GroupId,
    pub intervene: u8,
    pub val: f64,
}

impl From<&AuditRow> for AuditRecord {
    fn from(row: &AuditRow) -> Self {
        Self {
            group: row.group,
            intervene: u8::from(row.intervene),
            val: row.val,
        }
    }
}

impl From<AuditRecord> for AuditRow {
    fn from(rec: AuditRecord) -> Self {
        Self {
            group: rec.group,
            intervene: rec.intervene != 0,
            val: rec.val,
        }
    }
}

pub fn write_audit(path: impl AsRef<Path>, rows: &[AuditRow]) -> Result<()> {
    let path = path.as_ref();
    create_parent_dir(path)?;
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("creating audit file {}", path.display()))?;

    writer.write_record(AUDIT_HEADER)?;
    for row in rows {
        writer.serialize(AuditRecord::from(row))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_audit(path: impl AsRef<Path>) -> Result<Vec<AuditRow>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_path(path)
        .with_context(|| format!("opening audit file {}", path.display()))?;

    reader
        .deserialize::<AuditRecord>()
        .map(|rec| {
            rec.map(AuditRow::from)
                .with_context(|| format!("parsing audit file {}", path.display()))
        })
        .collect()
}

/// Delay and budget encoded in an audit file name (`comp_I{delay}-B{budget}.csv`)
pub fn parse_variant_name(file_name: &str) -> Option<(Time, u32)> {
    let stem = file_name.strip_prefix("comp_I")?.strip_suffix(".csv")?;
    let (delay, budget) = stem.split_once("-B")?;
    Some((delay.parse().ok()?, budget.parse().ok()?))
}

/// Collect every audit file under `root`. The family of a variant is the
/// directory holding its file.
pub fn discover_variants(root: impl AsRef<Path>) -> Result<Vec<Variant>> {
    let root = root.as_ref();
    let pattern = root.join("**").join("comp_I*-B*.csv");
    let pattern = pattern.to_string_lossy();

    let mut variants = Vec::new();
    for entry in glob::glob(&pattern).with_context(|| format!("bad glob pattern {}", pattern))? {
        let path = entry?;
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some((delay, budget)) = parse_variant_name(name) else {
            warn!("skipping {}: cannot parse delay and budget", path.display());
            continue;
        };
        let family = path
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        let rows = read_audit(&path)?;
        debug!("{}: family {} delay {} budget {} ({} rows)", name, family, delay, budget, rows.len());
        variants.push(Variant::new(family, delay, budget, rows));
    }
    info!("Found {} audit files under {}", variants.len(), root.display());
    Ok(variants)
}

/// Location of the repaired file for a filled solution
pub fn gap_filled_path(solution: &FilledSolution) -> PathBuf {
    Path::new(&solution.key.family).join(format!(
        "new_I{}-B{}.csv",
        solution.key.delay, solution.key.budget
    ))
}

/// Write a repaired intervention set next to the audit files it came from
pub fn write_gap_filled(solution: &FilledSolution) -> Result<PathBuf> {
    let path = gap_filled_path(solution);
    create_parent_dir(&path)?;
    let mut writer = WriterBuilder::new()
        .from_path(&path)
        .with_context(|| format!("creating {}", path.display()))?;

    writer.write_record(GAP_FILLED_HEADER)?;
    for g in &solution.groups {
        writer.write_record([g.to_string(), solution.key.delay.to_string()])?;
    }
    writer.flush()?;
    Ok(path)
}
