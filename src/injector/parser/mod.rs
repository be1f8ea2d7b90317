//! Parsers for values files and chart templates.

pub mod line;
pub mod node;
pub mod path;
pub mod template;

pub use line::{Document, Line, LineWriter, parse_line};
pub use node::{Node, indent_lines, render_entry, render_items};
pub use path::{PathLevel, PathStack};
pub use template::{
    ControlStructure, TargetReference, detect_kind, scan_value_references,
};
