//! STRUCTURE definitions and the classifier for their body rows.

use crate::element::{FormatError, SchemaElement, push_description};
use crate::schema::ParseError;
use std::fmt;
use std::str::FromStr;

/// Prefix of the type name inside an `@<XREF:TYPE>@` pointer.
const XREF_PREFIX: &str = "XREF:";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("Row has a conflicting definition: {0:?}")]
    ConflictingDefinition(String),
    #[error("{kind:?} rows require {facet}")]
    MissingFacet { kind: RowKind, facet: Facet },
    #[error("{kind:?} rows cannot have {facet}")]
    ForbiddenFacet { kind: RowKind, facet: Facet },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facet {
    Xref,
    Tags,
    Value,
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Facet::Xref => "an XREF",
            Facet::Tags => "a list of TAGS",
            Facet::Value => "a VALUE",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    NoValue,            // +1 DATA {0:1}
    Substructure,       // +1 <<NOTE_STRUCTURE>> {0:M}
    NewRecord,          // n @<XREF:OBJE>@ OBJE {1:1}
    NewRecordWithValue, // n @<XREF:NOTE>@ NOTE <SUBMITTER_TEXT> {1:1}
    PointerValue,       // +1 HUSB @<XREF:INDI>@ {0:1}
    PrimitiveValue,     // +1 SEX <SEX_VALUE> {0:1}
}

impl RowKind {
    /// Whether the kind carries an xref, tags and a value, in that order.
    pub fn facets(self) -> (bool, bool, bool) {
        match self {
            RowKind::NoValue => (false, true, false),
            RowKind::Substructure => (false, false, true),
            RowKind::NewRecord => (true, true, false),
            RowKind::NewRecordWithValue => (true, true, true),
            RowKind::PointerValue => (false, true, true),
            RowKind::PrimitiveValue => (false, true, true),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// `0`
    Root,
    /// `n` is depth 0, `+N` is depth N.
    Relative(u32),
}

impl FromStr for Level {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0" => Ok(Level::Root),
            "n" => Ok(Level::Relative(0)),
            _ => s
                .strip_prefix('+')
                .and_then(|depth| depth.parse().ok())
                .map(Level::Relative)
                .ok_or_else(|| FormatError::Level(s.to_string())),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Root => f.write_str("0"),
            Level::Relative(0) => f.write_str("n"),
            Level::Relative(depth) => write!(f, "+{}", depth),
        }
    }
}

/// Upper bound of a row's occurrence count.
///
/// `Unlimited` orders after every finite count, so range checks need no
/// special case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Count {
    Finite(u32),
    Unlimited,
}

impl From<u32> for Count {
    fn from(n: u32) -> Self {
        Count::Finite(n)
    }
}

impl FromStr for Count {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "M" {
            return Ok(Count::Unlimited);
        }
        s.parse()
            .map(Count::Finite)
            .map_err(|_| FormatError::Count(s.to_string()))
    }
}

impl fmt::Display for Count {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Count::Finite(n) => write!(f, "{}", n),
            Count::Unlimited => f.write_str("M"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    kind: RowKind,
    level: Level,
    xref: Option<String>,
    tags: Vec<String>,
    value: Option<String>,
    count_min: u32,
    count_max: Count,
    /// Whether the pointer was spelled `@<XREF:T>@` rather than `@<T>@`.
    xref_prefixed: bool,
}

impl Row {
    /// Builds a row, checking the facets against what `kind` allows.
    pub fn new(
        kind: RowKind,
        level: Level,
        xref: Option<String>,
        tags: Vec<String>,
        value: Option<String>,
        count_min: u32,
        count_max: Count,
    ) -> Result<Self, RowError> {
        let (wants_xref, wants_tags, wants_value) = kind.facets();
        for (facet, wanted, present) in [
            (Facet::Xref, wants_xref, xref.is_some()),
            (Facet::Tags, wants_tags, !tags.is_empty()),
            (Facet::Value, wants_value, value.is_some()),
        ] {
            match (wanted, present) {
                (true, false) => return Err(RowError::MissingFacet { kind, facet }),
                (false, true) => return Err(RowError::ForbiddenFacet { kind, facet }),
                _ => {}
            }
        }

        Ok(Self {
            kind,
            level,
            xref,
            tags,
            value,
            count_min,
            count_max,
            xref_prefixed: true,
        })
    }

    /// Sets how the row's pointer is spelled by [`Row::to_text`].
    pub fn with_xref_prefix(mut self, prefixed: bool) -> Self {
        self.xref_prefixed = prefixed;
        self
    }

    /// Classifies one body line such as `+1 SEX <SEX_VALUE> {0:1}`.
    pub fn parse(line: &str) -> Result<Self, RowError> {
        let items: Vec<&str> = line.split(' ').collect();
        if items.len() < 3 {
            return Err(FormatError::EmptyRow(line.to_string()).into());
        }
        let level: Level = items[0].parse()?;
        let (count_min, count_max) = parse_counts(items[items.len() - 1])?;
        let body = &items[1..items.len() - 1];

        let conflict = || RowError::ConflictingDefinition(line.to_string());

        if body.iter().any(|item| item.starts_with("<<")) {
            if body.len() != 1 {
                return Err(conflict());
            }
            let value = body[0].trim_matches(|c| c == '<' || c == '>').to_string();
            return Row::new(
                RowKind::Substructure,
                level,
                None,
                Vec::new(),
                Some(value),
                count_min,
                count_max,
            );
        }

        let mut kind = None;
        let mut xref = None;
        let mut tags = Vec::new();
        let mut value = None;
        let mut prefixed = true;

        let mut rest = body;
        if let Some((first, tail)) = body.split_first() {
            if first.starts_with('@') {
                kind = Some(RowKind::NewRecord);
                let (name, has_prefix) = pointer_type(first);
                xref = Some(name);
                prefixed = has_prefix;
                rest = tail;
            }
        }

        for item in rest {
            if item.starts_with('<') {
                kind = match kind {
                    None => Some(RowKind::PrimitiveValue),
                    Some(RowKind::NewRecord) => Some(RowKind::NewRecordWithValue),
                    Some(_) => return Err(conflict()),
                };
                value = Some(item.trim_matches(|c| c == '<' || c == '>').to_string());
            } else if item.starts_with('@') {
                if kind.is_some() {
                    return Err(conflict());
                }
                kind = Some(RowKind::PointerValue);
                let (name, has_prefix) = pointer_type(item);
                value = Some(name);
                prefixed = has_prefix;
            } else {
                tags = item
                    .trim_matches(|c| c == '[' || c == ']')
                    .split('|')
                    .map(str::to_string)
                    .collect();
            }
        }

        Ok(Row::new(
            kind.unwrap_or(RowKind::NoValue),
            level,
            xref,
            tags,
            value,
            count_min,
            count_max,
        )?
        .with_xref_prefix(prefixed))
    }

    pub fn kind(&self) -> RowKind {
        self.kind
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn xref(&self) -> Option<&str> {
        self.xref.as_deref()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Substructure, primitive or pointer type name, depending on the kind.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn count_min(&self) -> u32 {
        self.count_min
    }

    pub fn count_max(&self) -> Count {
        self.count_max
    }

    pub fn xref_prefixed(&self) -> bool {
        self.xref_prefixed
    }

    fn pointer_text(&self, name: &str) -> String {
        let prefix = if self.xref_prefixed { XREF_PREFIX } else { "" };
        format!("@<{}{}>@", prefix, name)
    }

    /// Whether `count` occurrences of this row are allowed.
    pub fn accepts(&self, count: u32) -> bool {
        count >= self.count_min && Count::Finite(count) <= self.count_max
    }

    pub fn to_text(&self) -> String {
        let mut parts = vec![self.level.to_string()];
        if let Some(xref) = &self.xref {
            parts.push(self.pointer_text(xref));
        }
        match self.tags.as_slice() {
            [] => {}
            [tag] => parts.push(tag.clone()),
            tags => parts.push(format!("[{}]", tags.join("|"))),
        }
        if let Some(value) = &self.value {
            parts.push(match self.kind {
                RowKind::Substructure => format!("<<{}>>", value),
                RowKind::PointerValue => self.pointer_text(value),
                _ => format!("<{}>", value),
            });
        }
        parts.push(format!("{{{}:{}}}", self.count_min, self.count_max));
        parts.join(" ")
    }
}

/// `@<XREF:INDI>@` -> `INDI`, and whether the prefix was there.
fn pointer_type(item: &str) -> (String, bool) {
    let inner = item.trim_matches(|c| c == '@' || c == '<' || c == '>');
    match inner.strip_prefix(XREF_PREFIX) {
        Some(name) => (name.to_string(), true),
        None => (inner.to_string(), false),
    }
}

fn parse_counts(item: &str) -> Result<(u32, Count), FormatError> {
    let malformed = || FormatError::Count(item.to_string());
    let inner = item.trim_matches(|c| c == '{' || c == '}');
    let (min, max) = inner.split_once(':').ok_or_else(malformed)?;
    let min = min.parse().map_err(|_| malformed())?;
    let max = max.parse().map_err(|_| malformed())?;
    Ok((min, max))
}

/// A STRUCTURE definition: alternative groups of rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Structure {
    pub label: String,
    pub description: String,
    pub definitions: Vec<Vec<Row>>,
}

impl Structure {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: String::new(),
            definitions: vec![Vec::new()],
        }
    }

    /// Closes the current alternation group and opens a new one.
    pub fn add_definition(&mut self) {
        self.definitions.push(Vec::new());
    }

    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.definitions.iter().flatten()
    }

    fn push_row(&mut self, row: Row) {
        match self.definitions.last_mut() {
            Some(group) => group.push(row),
            None => self.definitions.push(vec![row]),
        }
    }
}

impl SchemaElement for Structure {
    const KIND: &'static str = "STRUCTURE";

    fn from_header(line: &str) -> Result<Self, FormatError> {
        match line.strip_suffix(":=") {
            Some(label) if !line.contains(' ') => Ok(Self::new(label)),
            _ => Err(FormatError::Header(Self::KIND, line.to_string())),
        }
    }

    fn identifier(&self) -> &str {
        &self.label
    }

    fn ingest_line(&mut self, line: &str) -> Result<(), ParseError> {
        if line.starts_with(['n', '0', '+']) {
            self.push_row(Row::parse(line)?);
        } else if line == "|" {
            self.add_definition();
        } else if line.is_empty() && self.rows().next().is_some() {
            // Blank lines between rows carry nothing.
        } else if line != "[" && line != "]" {
            push_description(&mut self.description, line);
        }
        Ok(())
    }

    fn to_text(&self) -> String {
        let mut text = format!("{}:=", self.label);
        if !self.description.is_empty() {
            text.push('\n');
            text.push_str(&self.description);
        }
        if self.rows().next().is_none() {
            return text;
        }

        let groups: Vec<String> = self
            .definitions
            .iter()
            .map(|rows| rows.iter().map(Row::to_text).collect::<Vec<_>>().join("\n"))
            .collect();
        if groups.len() > 1 {
            text.push_str("\n[\n");
            text.push_str(&groups.join("\n|\n"));
            text.push_str("\n]");
        } else {
            text.push('\n');
            text.push_str(&groups.join(""));
        }
        text
    }
}
