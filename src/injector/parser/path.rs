//! Indentation-derived key paths.

/// Marker pushed for sequence items so keys below them never match a mapping path.
pub const LIST_ITEM_MARKER: &str = "-";

/// One nesting level seen while walking a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathLevel {
    pub indent: usize,
    pub key: String,
}

/// Stack of keys enclosing the current line.
#[derive(Debug, Clone, Default)]
pub struct PathStack {
    levels: Vec<PathLevel>,
}

impl PathStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pop every level at or deeper than `indent`.
    pub fn pop_to_indent(&mut self, indent: usize) {
        while self.levels.last().is_some_and(|l| l.indent >= indent) {
            self.levels.pop();
        }
    }

    /// Pop levels at or deeper than `indent`, then push `key` at `indent`.
    pub fn push(&mut self, indent: usize, key: &str) {
        self.pop_to_indent(indent);
        self.levels.push(PathLevel {
            indent,
            key: key.to_string(),
        });
    }

    /// Push a sequence item level.
    pub fn push_list_item(&mut self, indent: usize) {
        self.push(indent, LIST_ITEM_MARKER);
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Keys from the root to the current level.
    pub fn keys(&self) -> Vec<&str> {
        self.levels.iter().map(|l| l.key.as_str()).collect()
    }

    /// Dotted form of the current path.
    pub fn dotted(&self) -> String {
        self.keys().join(".")
    }

    /// Whether the current path equals `path` exactly.
    pub fn matches<S: AsRef<str>>(&self, path: &[S]) -> bool {
        self.levels.len() == path.len()
            && self
                .levels
                .iter()
                .zip(path)
                .all(|(level, key)| level.key == key.as_ref())
    }
}
