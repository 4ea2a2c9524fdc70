//! The capability shared by every definition in a grammar file.

use crate::schema::ParseError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("Line is not a properly formed {0} header: {1:?}")]
    Header(&'static str, String),
    #[error("Size range is inverted: {min}:{max}")]
    InvertedSize { min: usize, max: usize },
    #[error("Row level not understood: {0:?}")]
    Level(String),
    #[error("Row count not understood: {0:?}")]
    Count(String),
    #[error("Row has nothing between its level and its count: {0:?}")]
    EmptyRow(String),
}

/// A PRIMITIVE, TAG or STRUCTURE definition.
///
/// Elements are created from their header line and then grow one
/// continuation line at a time until the next header is seen.
pub trait SchemaElement: Sized {
    /// Human readable kind, used in error messages.
    const KIND: &'static str;

    fn from_header(line: &str) -> Result<Self, FormatError>;

    fn identifier(&self) -> &str;

    fn ingest_line(&mut self, line: &str) -> Result<(), ParseError>;

    /// Canonical grammar text of this element, without a trailing newline.
    fn to_text(&self) -> String;
}

/// Appends one line to a newline-joined description.
pub(crate) fn push_description(description: &mut String, line: &str) {
    if !description.is_empty() {
        description.push('\n');
    }
    description.push_str(line);
}
