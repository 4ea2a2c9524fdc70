//! The alternatives listed on a PRIMITIVE's `[a|b|c]` line.

use crate::component::{Component, ComponentKinds, TokenizeError, Tokenized, tokenize};
use crate::primitive::{PatternError, builtin_fragment};
use crate::schema::Schema;
use once_cell::sync::OnceCell;
use regex::Regex;
use std::sync::RwLock;

/// Alternatives of a primitive that has no `[...]` line.
pub const DEFAULT_DEFINITION: &str = "<TEXT>";

/// A compiled alternative, valid for one schema revision and one size cap.
#[derive(Debug, Clone)]
struct Matcher {
    revision: u64,
    size_max: usize,
    regex: Regex,
}

/// One admissible shape of a primitive value.
#[derive(Debug)]
pub struct OptionalValue {
    definition: String,
    tokenized: OnceCell<Tokenized>,
    matcher: RwLock<Option<Matcher>>,
}

impl Clone for OptionalValue {
    fn clone(&self) -> Self {
        let matcher = self.matcher.read().ok().and_then(|slot| slot.clone());
        Self {
            definition: self.definition.clone(),
            tokenized: self.tokenized.clone(),
            matcher: RwLock::new(matcher),
        }
    }
}

impl PartialEq for OptionalValue {
    fn eq(&self, other: &Self) -> bool {
        self.definition == other.definition
    }
}

impl OptionalValue {
    pub fn new(definition: impl Into<String>) -> Self {
        Self {
            definition: definition.into(),
            tokenized: OnceCell::new(),
            matcher: RwLock::new(None),
        }
    }

    pub fn definition(&self) -> &str {
        &self.definition
    }

    fn tokenized(&self) -> Result<&Tokenized, TokenizeError> {
        self.tokenized.get_or_try_init(|| tokenize(&self.definition))
    }

    pub fn components(&self) -> Result<&[Component], TokenizeError> {
        Ok(&self.tokenized()?.components)
    }

    pub fn kinds(&self) -> Result<ComponentKinds, TokenizeError> {
        Ok(self.tokenized()?.kinds)
    }

    /// Whether `test` satisfies this alternative for a primitive capped at `size_max`.
    pub fn is_valid(&self, test: &str, size_max: usize, schema: &Schema) -> Result<bool, PatternError> {
        let tokenized = self.tokenized()?;
        if !tokenized.kinds.primitives {
            return Ok(self.matches_literally(tokenized, test));
        }

        let revision = schema.revision();
        if let Some(regex) = self.cached_matcher(revision, size_max) {
            return Ok(regex.is_match(test));
        }

        let regex = Regex::new(&format!("^(?:{})$", self.pattern_at(size_max, schema, 0)?))?;
        let matched = regex.is_match(test);
        if let Ok(mut slot) = self.matcher.write() {
            tracing::debug!(definition = %self.definition, size_max, revision, "cached alternative matcher");
            *slot = Some(Matcher {
                revision,
                size_max,
                regex,
            });
        }
        Ok(matched)
    }

    /// The cached regex, if it was built for this schema revision and cap.
    fn cached_matcher(&self, revision: u64, size_max: usize) -> Option<Regex> {
        let slot = self.matcher.read().ok()?;
        slot.as_ref()
            .filter(|m| m.revision == revision && m.size_max == size_max)
            .map(|m| m.regex.clone())
    }

    /// Term and tag references stand for their own spelling here.
    fn matches_literally(&self, tokenized: &Tokenized, test: &str) -> bool {
        if tokenized.kinds.primitives {
            tracing::warn!(
                definition = %self.definition,
                "literal comparison requested for an alternative with primitive references"
            );
            return false;
        }
        let expected: String = tokenized.components.iter().map(Component::value).collect();
        expected == test
    }

    /// Unanchored pattern of this alternative, with every primitive capped at `size_max`.
    pub(crate) fn pattern_at(
        &self,
        size_max: usize,
        schema: &Schema,
        depth: usize,
    ) -> Result<String, PatternError> {
        let mut pattern = String::new();
        for component in self.components()? {
            match component {
                Component::Primitive(name) => {
                    let fragment = match schema.primitive(name) {
                        Some(primitive) => primitive.fragment_at(Some(size_max), schema, depth)?,
                        None => builtin_fragment(name, size_max)
                            .ok_or_else(|| PatternError::UnknownPrimitive(name.clone()))?,
                    };
                    pattern.push_str(&fragment);
                }
                other => pattern.push_str(&regex::escape(other.value())),
            }
        }
        Ok(pattern)
    }
}

/// Ordered alternatives; the first one that validates wins.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionalValues(Vec<OptionalValue>);

impl Default for OptionalValues {
    fn default() -> Self {
        Self(vec![OptionalValue::new(DEFAULT_DEFINITION)])
    }
}

impl OptionalValues {
    /// Parses the body of an alternatives line, without its brackets.
    pub fn parse(body: &str) -> Self {
        Self(body.split('|').map(OptionalValue::new).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &OptionalValue> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_default(&self) -> bool {
        self.to_text() == DEFAULT_DEFINITION
    }

    pub fn kinds(&self) -> Result<ComponentKinds, TokenizeError> {
        self.iter()
            .try_fold(ComponentKinds::default(), |acc, ov| {
                ov.kinds().map(|kinds| acc.union(kinds))
            })
    }

    /// The first alternative, in declaration order, that accepts `test`.
    pub fn is_valid(
        &self,
        test: &str,
        size_max: usize,
        schema: &Schema,
    ) -> Result<Option<&OptionalValue>, PatternError> {
        for optional_value in self.iter() {
            if optional_value.is_valid(test, size_max, schema)? {
                return Ok(Some(optional_value));
            }
        }
        Ok(None)
    }

    pub fn to_text(&self) -> String {
        self.iter()
            .map(OptionalValue::definition)
            .collect::<Vec<_>>()
            .join("|")
    }
}
