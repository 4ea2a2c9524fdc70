//! PRIMITIVE definitions: size-bounded value types and their match patterns.

use crate::component::TokenizeError;
use crate::element::{FormatError, SchemaElement, push_description};
use crate::optional_value::{OptionalValue, OptionalValues};
use crate::schema::{ParseError, Schema};
use once_cell::sync::Lazy;
use regex::Regex;

static HEADER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Z0-9_:]+?):= \{Size=(\d+|\d+:\d+)\}$").expect("primitive header pattern")
});

pub const TEXT: &str = "TEXT";
pub const NUMBER: &str = "NUMBER";
pub const DIGIT: &str = "DIGIT";
pub const NULL: &str = "NULL";

const TERMS_MARKER: &str = "Where:";

/// Hand-written fragment for the four leaf primitives.
///
/// TEXT excludes control characters and a lone `@`; `@@` is the escape for
/// one literal `@`.
pub fn builtin_fragment(label: &str, max: usize) -> Option<String> {
    // A `{1,0}` repetition does not compile; the caller's length check rejects
    // such values anyway.
    let max = max.max(1);
    match label {
        NUMBER => Some(format!("[0-9]{{1,{}}}", max)),
        DIGIT => Some("[0-9]".to_string()),
        NULL => Some(String::new()),
        TEXT => Some(format!(r"(?:[^\x00-\x1F\x7F@]|@@){{1,{}}}", max)),
        _ => None,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error(transparent)]
    Tokenize(#[from] TokenizeError),
    #[error("Unknown primitive: {0}")]
    UnknownPrimitive(String),
    #[error("Primitive references nest deeper than {0} levels")]
    RecursionLimit(usize),
    #[error("Generated pattern does not compile: {0}")]
    Regex(#[from] regex::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("{label}: {len} characters is below the minimum size of {min}")]
    MinSize { label: String, len: usize, min: usize },
    #[error("{label}: {len} characters is above the maximum size of {max}")]
    MaxSize { label: String, len: usize, max: usize },
    #[error("{label}: {value:?} is not an allowed value")]
    Value { label: String, value: String },
    #[error(transparent)]
    Pattern(#[from] PatternError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    pub label: String,
    pub size_min: usize,
    pub size_max: usize,
    pub description: String,
    /// `name = gloss` lines, present once a `Where:` line was seen.
    pub terms: Option<Vec<(String, String)>>,
    pub optional_values: OptionalValues,
}

impl Primitive {
    pub fn new(label: impl Into<String>, size_min: usize, size_max: usize) -> Self {
        Self {
            label: label.into(),
            size_min,
            size_max,
            description: String::new(),
            terms: None,
            optional_values: OptionalValues::default(),
        }
    }

    pub fn term(&self, name: &str) -> Option<&str> {
        self.terms
            .as_ref()?
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn insert_term(&mut self, line: &str) {
        let (key, gloss) = line.split_once(" = ").unwrap_or((line, ""));
        let terms = self.terms.get_or_insert_with(Vec::new);
        match terms.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = gloss.to_string(),
            None => terms.push((key.to_string(), gloss.to_string())),
        }
    }

    pub fn validate(&self, test: &str, schema: &Schema) -> Result<(), ValidationError> {
        self.validate_detailed(test, schema).map(|_| ())
    }

    /// Like [`Primitive::validate`], reporting which alternative matched.
    /// `NULL` has no alternative to report.
    pub fn validate_detailed(
        &self,
        test: &str,
        schema: &Schema,
    ) -> Result<Option<&OptionalValue>, ValidationError> {
        let len = test.chars().count();
        if len < self.size_min {
            return Err(ValidationError::MinSize {
                label: self.label.clone(),
                len,
                min: self.size_min,
            });
        }
        if len > self.size_max {
            return Err(ValidationError::MaxSize {
                label: self.label.clone(),
                len,
                max: self.size_max,
            });
        }

        let value_error = || ValidationError::Value {
            label: self.label.clone(),
            value: test.to_string(),
        };

        if self.label == NULL {
            return if test.is_empty() { Ok(None) } else { Err(value_error()) };
        }

        match self.optional_values.is_valid(test, self.size_max, schema)? {
            Some(optional_value) => Ok(Some(optional_value)),
            None => Err(value_error()),
        }
    }

    /// Anchored pattern matching a complete value of this primitive.
    pub fn match_pattern(&self, cap: Option<usize>, schema: &Schema) -> Result<String, PatternError> {
        Ok(format!("^(?:{})$", self.pattern_fragment(cap, schema)?))
    }

    /// Unanchored pattern, suitable for embedding in a parent pattern.
    pub fn pattern_fragment(&self, cap: Option<usize>, schema: &Schema) -> Result<String, PatternError> {
        self.fragment_at(cap, schema, 0)
    }

    pub(crate) fn fragment_at(
        &self,
        cap: Option<usize>,
        schema: &Schema,
        depth: usize,
    ) -> Result<String, PatternError> {
        let limit = schema.options().max_reference_depth;
        if depth > limit {
            return Err(PatternError::RecursionLimit(limit));
        }

        let effective_max = cap.map_or(self.size_max, |cap| cap.min(self.size_max));
        if let Some(fragment) = builtin_fragment(&self.label, effective_max) {
            return Ok(fragment);
        }

        let alternatives = self
            .optional_values
            .iter()
            .map(|ov| ov.pattern_at(effective_max, schema, depth + 1))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(format!("({})", alternatives.join("|")))
    }
}

impl SchemaElement for Primitive {
    const KIND: &'static str = "PRIMITIVE";

    fn from_header(line: &str) -> Result<Self, FormatError> {
        let malformed = || FormatError::Header(Self::KIND, line.to_string());
        let caps = HEADER_REGEX.captures(line).ok_or_else(malformed)?;

        let (min, max) = match caps[2].split_once(':') {
            Some((min, max)) => (min, max),
            None => (&caps[2], &caps[2]),
        };
        let size_min: usize = min.parse().map_err(|_| malformed())?;
        let size_max: usize = max.parse().map_err(|_| malformed())?;
        if size_max < size_min {
            return Err(FormatError::InvertedSize {
                min: size_min,
                max: size_max,
            });
        }

        Ok(Self::new(&caps[1], size_min, size_max))
    }

    fn identifier(&self) -> &str {
        &self.label
    }

    fn ingest_line(&mut self, line: &str) -> Result<(), ParseError> {
        if let Some(rest) = line.strip_prefix('[') {
            // Only the outer brackets go; `[BC]` style content must survive.
            let body = rest.strip_suffix(']').unwrap_or(rest);
            self.optional_values = OptionalValues::parse(body);
        } else if line == TERMS_MARKER {
            self.terms = Some(Vec::new());
        } else if self.terms.is_some() {
            if line.is_empty() {
                return Ok(());
            }
            self.insert_term(line);
        } else {
            push_description(&mut self.description, line);
        }
        Ok(())
    }

    fn to_text(&self) -> String {
        let mut text = if self.size_max != self.size_min {
            format!("{}:= {{Size={}:{}}}", self.label, self.size_min, self.size_max)
        } else {
            format!("{}:= {{Size={}}}", self.label, self.size_min)
        };

        if !self.optional_values.is_default() {
            text.push_str(&format!("\n[{}]", self.optional_values.to_text()));
        }
        if !self.description.is_empty() {
            text.push('\n');
            text.push_str(&self.description);
        }
        if let Some(terms) = self.terms.as_ref().filter(|t| !t.is_empty()) {
            text.push('\n');
            text.push_str(TERMS_MARKER);
            for (name, gloss) in terms {
                text.push_str(&format!("\n{} = {}", name, gloss));
            }
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRAMMAR: &str = "\
TEXT:= {Size=1:248}
NUMBER:= {Size=1:9}
DIGIT:= {Size=1}
NULL:= {Size=0}
YEAR:= {Size=3:4}
[<NUMBER>]
MONTH:= {Size=3}
[JAN|FEB|MAR]
DATE_SIMPLE:= {Size=8:9}
[<MONTH> <YEAR>]
AGE_VALUE:= {Size=1:6}
[<NUMBER>y|INFANT|<NULL>]
NUMBER_OR_NA:= {Size=1:3}
[<NUMBER>|N/A]
";

    fn schema() -> Schema {
        Schema::load_str(GRAMMAR).unwrap()
    }

    fn primitive<'a>(schema: &'a Schema, label: &str) -> &'a Primitive {
        schema.primitive(label).unwrap()
    }

    #[test]
    fn test_parse_header() {
        let p = Primitive::from_header("AGE_VALUE:= {Size=1:6}").unwrap();
        assert_eq!(p.label, "AGE_VALUE");
        assert_eq!((p.size_min, p.size_max), (1, 6));

        let p = Primitive::from_header("MONTH:= {Size=3}").unwrap();
        assert_eq!((p.size_min, p.size_max), (3, 3));
        assert!(p.optional_values.is_default());
    }

    #[test]
    fn test_malformed_header() {
        assert!(matches!(
            Primitive::from_header("month:= {Size=3}"),
            Err(FormatError::Header("PRIMITIVE", _))
        ));
        assert!(matches!(
            Primitive::from_header("MONTH:= {Size=5:3}"),
            Err(FormatError::InvertedSize { min: 5, max: 3 })
        ));
    }

    #[test]
    fn test_ingest_lines() {
        let mut p = Primitive::from_header("SEX_VALUE:= {Size=1:7}").unwrap();
        p.ingest_line("[M|F|U]").unwrap();
        p.ingest_line("A code that indicates the sex.").unwrap();
        p.ingest_line("Second line.").unwrap();
        p.ingest_line("Where:").unwrap();
        p.ingest_line("M = Male").unwrap();
        p.ingest_line("F = Female").unwrap();

        assert_eq!(p.optional_values.len(), 3);
        assert_eq!(p.description, "A code that indicates the sex.\nSecond line.");
        assert_eq!(p.term("F"), Some("Female"));
        assert_eq!(p.term("U"), None);
    }

    #[test]
    fn test_blank_lines() {
        let mut p = Primitive::from_header("SEX_VALUE:= {Size=1:7}").unwrap();
        for line in ["", "First.", "", "Second.", "Where:", "M = Male", "", "F = Female"] {
            p.ingest_line(line).unwrap();
        }
        // Leading blanks carry no text; blanks inside the term list are not terms.
        assert_eq!(p.description, "First.\n\nSecond.");
        assert_eq!(p.terms.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn test_alternatives_replace_default() {
        let mut p = Primitive::from_header("X:= {Size=1}").unwrap();
        p.ingest_line("[A|B]").unwrap();
        p.ingest_line("[C]").unwrap();
        assert_eq!(p.optional_values.to_text(), "C");
    }

    #[test]
    fn test_inner_brackets_survive() {
        let mut p = Primitive::from_header("X:= {Size=1:4}").unwrap();
        p.ingest_line("[[BC]]").unwrap();
        assert_eq!(p.optional_values.to_text(), "[BC]");
    }

    #[test]
    fn test_to_text() {
        let mut p = Primitive::from_header("SEX_VALUE:= {Size=1:7}").unwrap();
        for line in ["[M|F]", "The sex.", "Where:", "M = Male", "F = Female"] {
            p.ingest_line(line).unwrap();
        }
        assert_eq!(
            p.to_text(),
            "SEX_VALUE:= {Size=1:7}\n[M|F]\nThe sex.\nWhere:\nM = Male\nF = Female"
        );
        assert_eq!(Primitive::new("DIGIT", 1, 1).to_text(), "DIGIT:= {Size=1}");
    }

    #[test]
    fn test_size_errors() {
        let schema = schema();
        let date = primitive(&schema, "DATE_SIMPLE");
        assert!(matches!(
            date.validate("JAN 1", &schema),
            Err(ValidationError::MinSize { len: 5, min: 8, .. })
        ));
        assert!(matches!(
            date.validate("JAN 190000", &schema),
            Err(ValidationError::MaxSize { len: 10, max: 9, .. })
        ));
    }

    #[test]
    fn test_composite_validation() {
        let schema = schema();
        let date = primitive(&schema, "DATE_SIMPLE");
        assert!(date.validate("JAN 1900", &schema).is_ok());
        assert!(date.validate("MAR 2024", &schema).is_ok());
        assert!(matches!(
            date.validate("APR 1900", &schema),
            Err(ValidationError::Value { .. })
        ));
    }

    #[test]
    fn test_null() {
        let schema = schema();
        let null = primitive(&schema, NULL);
        assert!(null.validate("", &schema).is_ok());
        assert!(null.validate_detailed("", &schema).unwrap().is_none());

        let mut loose = Primitive::new(NULL, 0, 4);
        loose.ingest_line("[<TEXT>]").unwrap();
        assert!(matches!(
            loose.validate("x", &schema),
            Err(ValidationError::Value { .. })
        ));
    }

    #[test]
    fn test_first_matching_alternative_reported() {
        let schema = schema();
        let p = primitive(&schema, "NUMBER_OR_NA");
        let matched = p.validate_detailed("N/A", &schema).unwrap().unwrap();
        assert_eq!(matched.definition(), "N/A");

        let age = primitive(&schema, "AGE_VALUE");
        let matched = age.validate_detailed("12y", &schema).unwrap().unwrap();
        assert_eq!(matched.definition(), "<NUMBER>y");
        let matched = age.validate_detailed("INFANT", &schema).unwrap().unwrap();
        assert_eq!(matched.definition(), "INFANT");
    }

    #[test]
    fn test_text_doubled_at() {
        let schema = schema();
        let pattern = primitive(&schema, TEXT).match_pattern(None, &schema).unwrap();
        let re = Regex::new(&pattern).unwrap();
        assert!(re.is_match("AB@@CD"));
        assert!(!re.is_match("AB@CD"));
        assert!(!re.is_match("AB@@@CD"));
        assert!(!re.is_match("AB\u{7}CD"));
        assert!(!re.is_match("AB\u{7f}CD"));
        assert!(re.is_match("Zoë Ålander"));
    }

    #[test]
    fn test_leaf_patterns() {
        let schema = schema();
        assert_eq!(
            primitive(&schema, NUMBER).pattern_fragment(None, &schema).unwrap(),
            "[0-9]{1,9}"
        );
        assert_eq!(
            primitive(&schema, NUMBER).pattern_fragment(Some(4), &schema).unwrap(),
            "[0-9]{1,4}"
        );
        // The cap never raises the primitive's own maximum.
        assert_eq!(
            primitive(&schema, NUMBER).pattern_fragment(Some(20), &schema).unwrap(),
            "[0-9]{1,9}"
        );
        assert_eq!(
            primitive(&schema, DIGIT).pattern_fragment(Some(9), &schema).unwrap(),
            "[0-9]"
        );
        assert_eq!(primitive(&schema, NULL).match_pattern(None, &schema).unwrap(), "^(?:)$");
    }

    #[test]
    fn test_composite_pattern() {
        let schema = schema();
        let pattern = primitive(&schema, "DATE_SIMPLE")
            .pattern_fragment(None, &schema)
            .unwrap();
        assert_eq!(pattern, "((JAN|FEB|MAR) ([0-9]{1,4}))");
    }

    #[test]
    fn test_cyclic_references_hit_the_limit() {
        let schema = Schema::load_str("A:= {Size=1:5}\n[<B>]\nB:= {Size=1:5}\n[x<A>]\n").unwrap();
        let err = primitive(&schema, "A").match_pattern(None, &schema).unwrap_err();
        assert!(matches!(err, PatternError::RecursionLimit(_)));
        assert!(matches!(
            primitive(&schema, "A").validate("xx", &schema),
            Err(ValidationError::Pattern(PatternError::RecursionLimit(_)))
        ));
    }

    #[test]
    fn test_builtin_leaf_without_definition() {
        // `<TEXT>` resolves even when the grammar never defines TEXT.
        let schema = Schema::load_str("NAME:= {Size=1:5}\n").unwrap();
        let name = primitive(&schema, "NAME");
        assert!(name.validate("Ann", &schema).is_ok());
        assert!(name.validate("A@B", &schema).is_err());
    }
}
