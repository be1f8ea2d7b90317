//! Line-oriented document model.
//!
//! A [`Document`] keeps every input line verbatim next to the little structure
//! the engines need (indentation, key, value, list marker). Rendering an
//! unmodified document reproduces its input byte for byte.

/// One classified line of a YAML or template document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// Original text without the line terminator
    pub raw: String,
    /// Number of leading spaces
    pub indent: usize,
    /// Blank or `#` comment line
    pub blank_or_comment: bool,
    /// Starts with a `- ` sequence marker
    pub list_item: bool,
    /// Mapping key on this line (after the list marker, if any)
    pub key: Option<String>,
    /// Scalar text after the key, inline comment stripped
    pub value: Option<String>,
    /// Body line of a `|` or `>` block scalar
    pub block_scalar: bool,
}

impl Line {
    /// Trimmed text of the line.
    pub fn trimmed(&self) -> &str {
        self.raw.trim()
    }

    /// Template action line such as `{{- with .Values.x }}`.
    pub fn is_directive(&self) -> bool {
        !self.block_scalar && self.trimmed().starts_with("{{")
    }

    /// Line that carries YAML content (not blank, comment or directive).
    pub fn is_content(&self) -> bool {
        !self.blank_or_comment && !self.is_directive()
    }

    /// Key usable for structure decisions (never set inside block scalars).
    pub fn key(&self) -> Option<&str> {
        if self.block_scalar {
            None
        } else {
            self.key.as_deref()
        }
    }

    /// Value with surrounding whitespace removed, empty when absent.
    pub fn value_str(&self) -> &str {
        self.value.as_deref().map(str::trim).unwrap_or("")
    }

    /// True when the key has no inline value, an empty flow collection,
    /// an empty quoted string or an explicit null.
    pub fn has_empty_value(&self) -> bool {
        matches!(
            self.value_str(),
            "" | "[]" | "{}" | "\"\"" | "''" | "~" | "null"
        )
    }

    /// Column where the content of a list item starts (`- name: x` -> indent + 2).
    pub fn item_content_indent(&self) -> usize {
        if !self.list_item {
            return self.indent;
        }
        // Leading whitespace may hold multi-byte characters; count from the marker
        let marker = self.raw.len() - self.raw.trim_start().len();
        let after_marker = &self.raw[marker + 1..];
        let spaces = after_marker.len() - after_marker.trim_start().len();
        self.indent + 1 + spaces.max(1)
    }

    fn opens_block_scalar(&self) -> bool {
        let value = self.value_str();
        value.starts_with('|') || value.starts_with('>')
    }
}

/// Parse a single line of text. Total: every input yields a [`Line`].
pub fn parse_line(text: &str) -> Line {
    let indent = text.len() - text.trim_start_matches(' ').len();
    let trimmed = text.trim();

    let mut line = Line {
        raw: text.to_string(),
        indent,
        blank_or_comment: trimmed.is_empty() || trimmed.starts_with('#'),
        list_item: false,
        key: None,
        value: None,
        block_scalar: false,
    };
    if line.blank_or_comment || trimmed.starts_with("{{") {
        return line;
    }

    let mut body = trimmed;
    if body == "-" || body.starts_with("- ") {
        line.list_item = true;
        body = body[1..].trim_start();
    }

    if let Some((key, value)) = split_key_value(body) {
        line.key = Some(key);
        line.value = Some(value);
    }
    line
}

/// Split `key: value` text. Returns `None` when the text is not a mapping entry.
fn split_key_value(body: &str) -> Option<(String, String)> {
    let (key_text, rest) = if body.starts_with('"') || body.starts_with('\'') {
        let quote = body.chars().next()?;
        let close = body[1..].find(quote)? + 1;
        let rest = &body[close + 1..];
        (&body[..=close], rest.strip_prefix(':')?)
    } else {
        let colon = find_key_colon(body)?;
        (&body[..colon], &body[colon + 1..])
    };

    if !(rest.is_empty() || rest.starts_with(' ') || rest.starts_with('\t')) {
        return None;
    }

    let key = key_text
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();
    if key.is_empty() || key.starts_with('{') || key.starts_with('[') {
        return None;
    }
    if !key_text.starts_with(['"', '\'']) && key.contains(char::is_whitespace) {
        return None;
    }

    Some((key, strip_inline_comment(rest.trim()).to_string()))
}

/// First `:` followed by whitespace or end of text.
fn find_key_colon(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    (0..bytes.len()).find(|&i| {
        bytes[i] == b':' && (i + 1 == bytes.len() || bytes[i + 1] == b' ' || bytes[i + 1] == b'\t')
    })
}

/// Remove a trailing ` # comment` that is not inside quotes.
fn strip_inline_comment(value: &str) -> &str {
    let mut in_single = false;
    let mut in_double = false;
    let mut prev_space = true;
    for (i, c) in value.char_indices() {
        match c {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            '#' if !in_single && !in_double && prev_space => return value[..i].trim_end(),
            _ => {}
        }
        prev_space = c == ' ' || c == '\t';
    }
    value
}

/// Ordered lines of a document plus its trailing newline state.
///
/// Lines of a CRLF document keep their `\r` in `raw`; `crlf` tells writers to
/// terminate new lines the same way.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    lines: Vec<Line>,
    trailing_newline: bool,
    crlf: bool,
}

impl Document {
    /// Parse a document, marking block scalar bodies.
    pub fn parse(content: &str) -> Self {
        let trailing_newline = content.ends_with('\n');
        let crlf = content
            .find('\n')
            .is_some_and(|i| content[..i].ends_with('\r'));
        let body = content.strip_suffix('\n').unwrap_or(content);
        let mut lines: Vec<Line> = if content.is_empty() {
            Vec::new()
        } else {
            body.split('\n').map(parse_line).collect()
        };

        let mut scalar_owner: Option<usize> = None;
        for line in lines.iter_mut() {
            if let Some(owner_indent) = scalar_owner {
                if line.raw.trim().is_empty() || line.indent > owner_indent {
                    line.block_scalar = true;
                    line.key = None;
                    line.value = None;
                    line.list_item = false;
                    line.blank_or_comment = line.raw.trim().is_empty();
                    continue;
                }
                scalar_owner = None;
            }
            if line.key.is_some() && line.opens_block_scalar() {
                scalar_owner = Some(if line.list_item {
                    line.item_content_indent()
                } else {
                    line.indent
                });
            }
        }

        Self {
            lines,
            trailing_newline,
            crlf,
        }
    }

    /// Build a document from raw text lines.
    pub fn from_raw_lines<I, S>(raw: I, trailing_newline: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let text: Vec<String> = raw.into_iter().map(|s| s.as_ref().to_string()).collect();
        let mut content = text.join("\n");
        if trailing_newline && !text.is_empty() {
            content.push('\n');
        }
        Self::parse(&content)
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn trailing_newline(&self) -> bool {
        self.trailing_newline
    }

    /// Lines end in `\r\n`, judged by the first line.
    pub fn crlf(&self) -> bool {
        self.crlf
    }

    /// Render the document back to text.
    pub fn render(&self) -> String {
        let mut out = self
            .lines
            .iter()
            .map(|l| l.raw.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        if self.trailing_newline && !self.lines.is_empty() {
            out.push('\n');
        }
        out
    }
}

/// Append-only output buffer used while a read cursor walks the input.
#[derive(Debug, Default)]
pub struct LineWriter {
    out: Vec<String>,
    crlf: bool,
}

impl LineWriter {
    /// Writer that ends new lines the way `doc` does.
    pub fn for_document(doc: &Document) -> Self {
        Self {
            out: Vec::new(),
            crlf: doc.crlf(),
        }
    }

    /// Copy an input line verbatim.
    pub fn copy(&mut self, line: &Line) {
        self.out.push(line.raw.clone());
    }

    /// Copy a run of input lines verbatim.
    pub fn copy_all(&mut self, lines: &[Line]) {
        self.out.extend(lines.iter().map(|l| l.raw.clone()));
    }

    /// Emit new text.
    pub fn emit(&mut self, text: impl Into<String>) {
        self.out.push(text.into());
    }

    pub fn emit_all<I: IntoIterator<Item = String>>(&mut self, lines: I) {
        self.out.extend(lines);
    }

    /// Whether the last emitted line is blank.
    pub fn ends_blank(&self) -> bool {
        self.out.last().is_some_and(|l| l.trim().is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    pub fn finish(mut self, trailing_newline: bool) -> Document {
        if self.crlf {
            // Every line but an unterminated last one ends in `\r`
            let last = self.out.len().saturating_sub(1);
            for (i, line) in self.out.iter_mut().enumerate() {
                let terminated = i < last || trailing_newline;
                if terminated && !line.ends_with('\r') {
                    line.push('\r');
                } else if !terminated && line.ends_with('\r') {
                    line.pop();
                }
            }
        }
        let mut doc = Document::from_raw_lines(self.out, trailing_newline);
        doc.crlf = self.crlf;
        doc
    }
}
