pub mod formats;
pub mod summary;
pub mod cli;

pub use formats::{
    discover_variants, gap_filled_path, parse_variant_name, read_audit, read_gm_tree,
    read_hierarchy, write_audit, write_decision, write_gap_filled, AuditRecord, EventLog,
};
pub use summary::{RunManifest, ManifestInputs, SummaryRow, ensure_summary_header, summary_path, write_summary};
pub use cli::*;
