//! The registry of every definition in a grammar, and the line dispatcher
//! that builds it.

use crate::element::{FormatError, SchemaElement};
use crate::primitive::{PatternError, Primitive, ValidationError};
use crate::structure::{RowError, Structure};
use crate::tag::Tag;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Marker present in every header line, and in no continuation line.
const HEADER_MARKER: &str = ":=";

static NEXT_REVISION: AtomicU64 = AtomicU64::new(1);

/// A stamp no other schema state in this process has carried.
fn next_revision() -> u64 {
    NEXT_REVISION.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Format error: {0}")]
    Format(#[from] FormatError),
    #[error("Row error: {0}")]
    Row(#[from] RowError),
    #[error("Continuation line before any definition: {0:?}")]
    OrphanLine(String),
    #[error("line {line}: {source}")]
    AtLine {
        line: usize,
        #[source]
        source: Box<ParseError>,
    },
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct SchemaOptions {
    /// How many primitive references may nest while building a pattern.
    /// Cyclic definitions fail once this is exceeded.
    pub max_reference_depth: usize,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            max_reference_depth: 32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Primitive,
    Tag,
    Structure,
}

/// Insertion-ordered, keyed by identifier; re-inserting replaces in place.
#[derive(Debug)]
struct Registry<T> {
    entries: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: SchemaElement> Registry<T> {
    /// Returns the slot of the element and whether the identifier is new.
    fn insert(&mut self, element: T) -> (usize, bool) {
        if let Some(&slot) = self.index.get(element.identifier()) {
            self.entries[slot] = element;
            return (slot, false);
        }
        let slot = self.entries.len();
        self.index.insert(element.identifier().to_string(), slot);
        self.entries.push(element);
        (slot, true)
    }

    fn get(&self, identifier: &str) -> Option<&T> {
        self.index.get(identifier).map(|&slot| &self.entries[slot])
    }
}

/// All PRIMITIVE, TAG and STRUCTURE definitions of a grammar.
#[derive(Debug, Default)]
pub struct Schema {
    options: SchemaOptions,
    primitives: Registry<Primitive>,
    tags: Registry<Tag>,
    structures: Registry<Structure>,
    /// Declaration order across all three kinds.
    order: Vec<(ElementKind, usize)>,
    /// The element receiving continuation lines.
    open: Option<(ElementKind, usize)>,
    /// Blank lines seen since the last content line of the open element.
    /// They only reach the element if more of its text follows.
    pending_blanks: usize,
    /// Changes whenever any definition changes; keys the matcher caches.
    revision: u64,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: SchemaOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &SchemaOptions {
        &self.options
    }

    pub(crate) fn revision(&self) -> u64 {
        self.revision
    }

    fn close(&mut self) {
        self.open = None;
        self.pending_blanks = 0;
    }

    /// Builds a schema from the text of one grammar file.
    pub fn load_str(text: &str) -> Result<Self, ParseError> {
        let mut schema = Self::new();
        schema.ingest_str(text)?;
        Ok(schema)
    }

    /// Builds a schema from several grammar files, in order.
    pub fn load_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self, ParseError> {
        let mut schema = Self::new();
        for path in paths {
            let path = path.as_ref();
            let text = fs::read_to_string(path).map_err(|source| ParseError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            tracing::debug!(path = %path.display(), "loading grammar file");
            schema.ingest_str(&text)?;
        }
        Ok(schema)
    }

    /// Feeds every line of `text`; no element stays open across calls.
    pub fn ingest_str(&mut self, text: &str) -> Result<(), ParseError> {
        self.close();
        for (i, line) in text.lines().enumerate() {
            self.ingest_line(line).map_err(|e| ParseError::AtLine {
                line: i + 1,
                source: Box::new(e),
            })?;
        }
        self.close();
        Ok(())
    }

    /// Applies one raw grammar line. Blank lines are kept inside an
    /// element's text and dropped at its end, so they also separate
    /// definitions.
    pub fn ingest_line(&mut self, line: &str) -> Result<(), ParseError> {
        let line = line.trim_end_matches(['\n', '\r']);
        if line.is_empty() {
            if self.open.is_some() {
                self.pending_blanks += 1;
            }
            return Ok(());
        }
        self.revision = next_revision();

        if !line.contains(HEADER_MARKER) {
            let blanks = std::mem::take(&mut self.pending_blanks);
            for _ in 0..blanks {
                self.feed_open("")?;
            }
            return self.feed_open(line);
        }

        self.pending_blanks = 0;
        let (kind, (slot, fresh)) = if line.ends_with('}') {
            (
                ElementKind::Primitive,
                self.primitives.insert(Primitive::from_header(line)?),
            )
        } else if line.ends_with("}:=") {
            (ElementKind::Tag, self.tags.insert(Tag::from_header(line)?))
        } else {
            (
                ElementKind::Structure,
                self.structures.insert(Structure::from_header(line)?),
            )
        };

        if fresh {
            self.order.push((kind, slot));
        } else {
            tracing::debug!(?kind, header = line, "replacing earlier definition");
        }
        self.open = Some((kind, slot));
        Ok(())
    }

    fn feed_open(&mut self, line: &str) -> Result<(), ParseError> {
        match self.open {
            Some((ElementKind::Primitive, slot)) => self.primitives.entries[slot].ingest_line(line),
            Some((ElementKind::Tag, slot)) => self.tags.entries[slot].ingest_line(line),
            Some((ElementKind::Structure, slot)) => self.structures.entries[slot].ingest_line(line),
            None => Err(ParseError::OrphanLine(line.to_string())),
        }
    }

    pub fn primitive(&self, identifier: &str) -> Option<&Primitive> {
        self.primitives.get(identifier)
    }

    pub fn tag(&self, identifier: &str) -> Option<&Tag> {
        self.tags.get(identifier)
    }

    pub fn structure(&self, identifier: &str) -> Option<&Structure> {
        self.structures.get(identifier)
    }

    pub fn primitives(&self) -> impl Iterator<Item = &Primitive> {
        self.primitives.entries.iter()
    }

    pub fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.tags.entries.iter()
    }

    pub fn structures(&self) -> impl Iterator<Item = &Structure> {
        self.structures.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Validates `value` against the primitive named `label`.
    pub fn validate(&self, label: &str, value: &str) -> Result<(), ValidationError> {
        self.primitive(label)
            .ok_or_else(|| PatternError::UnknownPrimitive(label.to_string()))?
            .validate(value, self)
    }

    /// The whole grammar, one blank line between definitions.
    pub fn to_text(&self) -> String {
        self.order
            .iter()
            .map(|&(kind, slot)| match kind {
                ElementKind::Primitive => self.primitives.entries[slot].to_text(),
                ElementKind::Tag => self.tags.entries[slot].to_text(),
                ElementKind::Structure => self.structures.entries[slot].to_text(),
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::RowKind;

    #[test]
    fn test_dispatch_by_header() {
        let schema = Schema::load_str(
            "SEX_VALUE:= {Size=1:7}\n[M|F|U]\nINDI {INDIVIDUAL}:=\nA person.\nINDIVIDUAL_RECORD:=\nn @<XREF:INDI>@ INDI {1:1}\n",
        )
        .unwrap();
        assert_eq!(schema.len(), 3);
        assert_eq!(schema.primitive("SEX_VALUE").unwrap().optional_values.len(), 3);
        assert_eq!(schema.tag("INDI").unwrap().description, "A person.");
        let record = schema.structure("INDIVIDUAL_RECORD").unwrap();
        assert_eq!(record.rows().next().unwrap().kind(), RowKind::NewRecord);
        assert!(schema.primitive("INDI").is_none());
    }

    #[test]
    fn test_last_definition_wins_in_place() {
        let schema = Schema::load_str("A:= {Size=1}\nB:= {Size=2}\nA:= {Size=3}\nSecond A.\n").unwrap();
        assert_eq!(schema.len(), 2);
        let a = schema.primitive("A").unwrap();
        assert_eq!(a.size_min, 3);
        assert_eq!(a.description, "Second A.");
        let labels: Vec<_> = schema.primitives().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, ["A", "B"]);
    }

    #[test]
    fn test_orphan_line() {
        let err = Schema::load_str("\nstray text\n").unwrap_err();
        match err {
            ParseError::AtLine { line, source } => {
                assert_eq!(line, 2);
                assert!(matches!(*source, ParseError::OrphanLine(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_headers() {
        assert!(matches!(
            Schema::new().ingest_line("bad:= {Size=1}"),
            Err(ParseError::Format(FormatError::Header("PRIMITIVE", _)))
        ));
        assert!(matches!(
            Schema::new().ingest_line("BAD RECORD:="),
            Err(ParseError::Format(FormatError::Header("STRUCTURE", _)))
        ));
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let schema = Schema::load_str("MONTH:= {Size=3}\r\n[JAN|FEB]\r\n\r\nNUMBER:= {Size=1:9}\r\n").unwrap();
        assert_eq!(schema.primitive("MONTH").unwrap().optional_values.to_text(), "JAN|FEB");
        assert!(schema.primitive("MONTH").unwrap().description.is_empty());
        assert!(schema.primitive("NUMBER").is_some());
    }

    #[test]
    fn test_validate_by_label() {
        let schema = Schema::load_str("MONTH:= {Size=3}\n[JAN|FEB]\n").unwrap();
        assert!(schema.validate("MONTH", "FEB").is_ok());
        assert!(matches!(
            schema.validate("MONTH", "MAR"),
            Err(ValidationError::Value { .. })
        ));
        assert!(matches!(
            schema.validate("DAY", "1"),
            Err(ValidationError::Pattern(PatternError::UnknownPrimitive(_)))
        ));
    }

    #[test]
    fn test_redefinition_reaches_referencing_primitives() {
        let mut schema = Schema::load_str("CODE:= {Size=1:5}\n[<INNER>]\nINNER:= {Size=1:5}\n[A]\n").unwrap();
        assert!(schema.validate("CODE", "A").is_ok());

        schema.ingest_str("INNER:= {Size=1:5}\n[B]").unwrap();
        assert!(schema.validate("CODE", "B").is_ok());
        assert!(matches!(
            schema.validate("CODE", "A"),
            Err(ValidationError::Value { .. })
        ));
    }

    #[test]
    fn test_depth_option() {
        let mut schema = Schema::with_options(SchemaOptions {
            max_reference_depth: 1,
        });
        schema
            .ingest_str("A:= {Size=1:9}\n[<B>]\nB:= {Size=1:9}\n[<C>]\nC:= {Size=1:9}\n[<NUMBER>]\n")
            .unwrap();
        let a = schema.primitive("A").unwrap();
        assert!(matches!(
            a.match_pattern(None, &schema),
            Err(PatternError::RecursionLimit(1))
        ));
        assert!(schema.primitive("B").unwrap().match_pattern(None, &schema).is_ok());
    }

    #[test]
    fn test_missing_file() {
        let err = Schema::load_files(&["/nonexistent/grammar.txt"]).unwrap_err();
        assert!(matches!(err, ParseError::Io { .. }));
    }
}
