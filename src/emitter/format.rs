//! LookML formatting utilities.
//!
//! Provides string escaping, block/property helpers, and indentation
//! management.

/// First line of every generated file.
pub const GENERATED_HEADER: &str =
    "# Generated by semantic-patterns. Do not edit: changes are overwritten on the next compile.";

/// Escape a string for use in a LookML string literal.
#[must_use]
pub fn escape_lookml_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push(' '),
            '\r' => {}
            c => result.push(c),
        }
    }
    result
}

/// Quote a string literal with double quotes.
#[must_use]
pub fn quote_string(s: &str) -> String {
    format!("\"{}\"", escape_lookml_string(s))
}

/// Check if a string is a plain LookML/SQL identifier: a letter or
/// underscore followed by letters, digits, or underscores.
#[must_use]
pub fn is_plain_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Indentation style for emitted LookML.
#[derive(Debug, Clone)]
pub enum Indent {
    Tabs,
    Spaces(usize),
}

impl Default for Indent {
    fn default() -> Self {
        Indent::Spaces(2)
    }
}

impl Indent {
    /// Get the indent string.
    #[must_use]
    pub fn to_string_owned(&self) -> String {
        match self {
            Indent::Tabs => "\t".to_string(),
            Indent::Spaces(n) => " ".repeat(*n),
        }
    }
}

/// A writer that manages indentation for LookML output.
pub struct IndentWriter {
    buffer: String,
    indent_str: String,
    current_indent: usize,
    at_line_start: bool,
}

impl IndentWriter {
    /// Create a new indent writer with the specified indentation style.
    #[must_use]
    pub fn new(indent: Indent) -> Self {
        Self {
            buffer: String::new(),
            indent_str: indent.to_string_owned(),
            current_indent: 0,
            at_line_start: true,
        }
    }

    /// Writer for a generated file: header comment and a blank line.
    #[must_use]
    pub fn for_file() -> Self {
        let mut w = Self::default();
        w.write_comment(GENERATED_HEADER.trim_start_matches("# "));
        w.blank_line();
        w
    }

    /// Increase indentation level.
    pub fn indent(&mut self) {
        self.current_indent += 1;
    }

    /// Decrease indentation level.
    pub fn dedent(&mut self) {
        self.current_indent = self.current_indent.saturating_sub(1);
    }

    fn write_indent_if_needed(&mut self) {
        if self.at_line_start && self.current_indent > 0 {
            for _ in 0..self.current_indent {
                self.buffer.push_str(&self.indent_str);
            }
            self.at_line_start = false;
        }
    }

    /// Write a complete line (with newline at end).
    pub fn write_line(&mut self, s: &str) {
        self.write_indent_if_needed();
        self.buffer.push_str(s);
        self.buffer.push('\n');
        self.at_line_start = true;
    }

    /// Write a blank line.
    pub fn blank_line(&mut self) {
        self.buffer.push('\n');
        self.at_line_start = true;
    }

    /// Write a comment line.
    pub fn write_comment(&mut self, comment: &str) {
        self.write_line(&format!("# {}", comment));
    }

    /// Open a named block: `keyword: name {`.
    pub fn open_block(&mut self, keyword: &str, name: &str) {
        self.write_line(&format!("{}: {} {{", keyword, name));
        self.indent();
    }

    /// Open an anonymous block: `keyword: {`.
    pub fn open_anonymous_block(&mut self, keyword: &str) {
        self.write_line(&format!("{}: {{", keyword));
        self.indent();
    }

    /// Close the innermost block.
    pub fn close_block(&mut self) {
        self.dedent();
        self.write_line("}");
    }

    /// `key: value` with the value written verbatim.
    pub fn property(&mut self, key: &str, value: &str) {
        self.write_line(&format!("{}: {}", key, value));
    }

    /// `key: "value"`.
    pub fn string_property(&mut self, key: &str, value: &str) {
        self.property(key, &quote_string(value));
    }

    /// `key: yes|no`.
    pub fn yesno_property(&mut self, key: &str, value: bool) {
        self.property(key, if value { "yes" } else { "no" });
    }

    /// `key: [a, b, c]`.
    pub fn list_property<S: AsRef<str>>(&mut self, key: &str, items: &[S]) {
        let items: Vec<&str> = items.iter().map(AsRef::as_ref).collect();
        self.property(key, &format!("[{}]", items.join(", ")));
    }

    /// `key: <sql> ;;`.
    pub fn sql_property(&mut self, key: &str, sql: &str) {
        if sql.is_empty() {
            self.write_line(&format!("{}: ;;", key));
        } else {
            self.write_line(&format!("{}: {} ;;", key, sql));
        }
    }

    /// Consume the writer and return the final string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.buffer
    }

    /// Get a reference to the current buffer.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.buffer
    }
}

impl Default for IndentWriter {
    fn default() -> Self {
        Self::new(Indent::default())
    }
}
