//! Chart injection engine.
//!
//! The engine applies a catalog of policy fragments to a Helm chart without
//! disturbing the chart's formatting:
//!
//! - [`values`] patches keys that templates read from `.Values`
//! - [`inline`] writes keys straight into workload templates
//! - [`root_values`] deep-merges new root-level values
//! - [`process`] drives all of the above for a chart directory

pub mod backup;
pub mod catalog;
pub mod equivalence;
pub mod inline;
pub mod parser;
pub mod process;
pub mod root_values;
pub mod subtree;
pub mod values;

pub use backup::{backup_path, create_backup, restore_backup, write_atomic};
pub use catalog::{BlockCatalog, BlockCategory, InjectionBlock, MergeKind, PodProfile};
pub use inline::{InlineOutcome, inject_container_spec, inject_pod_spec, inject_template};
pub use process::{
    ChartScan, ImageStatus, ProcessOptions, ProcessReport, TemplateReport, TemplateScan,
    inject_chart, process_chart, scan_chart,
};
pub use root_values::{RootValuesReport, inject_root_values};
pub use values::{MergeMode, ValuesPatch, ValuesReport, Wrapper, patch_target, patch_values};
