use crate::element::{FormatError, SchemaElement, push_description};
use crate::schema::ParseError;
use once_cell::sync::Lazy;
use regex::Regex;

static HEADER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z0-9]+) \{([A-Z0-9_\-]+)\}:=").expect("tag header pattern"));

/// A TAG definition: `INDI {INDIVIDUAL}:=` followed by description lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub code: String,
    pub label: String,
    pub description: String,
}

impl SchemaElement for Tag {
    const KIND: &'static str = "TAG";

    fn from_header(line: &str) -> Result<Self, FormatError> {
        let caps = HEADER_REGEX
            .captures(line)
            .ok_or_else(|| FormatError::Header(Self::KIND, line.to_string()))?;
        Ok(Self {
            code: caps[1].to_string(),
            label: caps[2].to_string(),
            description: String::new(),
        })
    }

    fn identifier(&self) -> &str {
        &self.code
    }

    fn ingest_line(&mut self, line: &str) -> Result<(), ParseError> {
        push_description(&mut self.description, line);
        Ok(())
    }

    fn to_text(&self) -> String {
        let mut text = format!("{} {{{}}}:=", self.code, self.label);
        if !self.description.is_empty() {
            text.push('\n');
            text.push_str(&self.description);
        }
        text
    }
}
