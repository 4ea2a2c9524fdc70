//! Tokenizer for the definition of a single PRIMITIVE alternative.
//!
//! An alternative such as `<MONTH> <YEAR>` or `{CHIL}` is a sequence of four
//! component kinds. At every position the kinds are tried in a fixed order:
//! primitive reference, term reference, tag reference, literal run.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    Primitive(String), // <NAME>
    Term(String),      // {NAME}
    Tag(String),       // %NAME%
    Literal(String),
}

impl Component {
    /// The referenced name, or the literal text.
    pub fn value(&self) -> &str {
        match self {
            Component::Primitive(v)
            | Component::Term(v)
            | Component::Tag(v)
            | Component::Literal(v) => v,
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, Component::Primitive(_))
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Primitive(v) => write!(f, "<{}>", v),
            Component::Term(v) => write!(f, "{{{}}}", v),
            Component::Tag(v) => write!(f, "%{}%", v),
            Component::Literal(v) => f.write_str(v),
        }
    }
}

/// Which component kinds occur at least once in a definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComponentKinds {
    pub primitives: bool,
    pub terms: bool,
    pub tags: bool,
    pub literals: bool,
}

impl ComponentKinds {
    fn record(&mut self, component: &Component) {
        match component {
            Component::Primitive(_) => self.primitives = true,
            Component::Term(_) => self.terms = true,
            Component::Tag(_) => self.tags = true,
            Component::Literal(_) => self.literals = true,
        }
    }

    pub fn union(self, other: Self) -> Self {
        Self {
            primitives: self.primitives || other.primitives,
            terms: self.terms || other.terms,
            tags: self.tags || other.tags,
            literals: self.literals || other.literals,
        }
    }
}

/// Components of a definition together with the kinds seen while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokenized {
    pub components: Vec<Component>,
    pub kinds: ComponentKinds,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenizeError {
    #[error("No component matches at offset {offset} of {definition:?}")]
    Unmatched { definition: String, offset: usize },
}

pub struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Body of `open … close` at the start of `rest`; empty bodies do not count.
    fn delimited(rest: &'a str, open: char, close: char) -> Option<&'a str> {
        let body = rest.strip_prefix(open)?;
        match body.find(close) {
            Some(0) | None => None,
            Some(end) => Some(&body[..end]),
        }
    }

    fn literal(rest: &'a str) -> Option<&'a str> {
        let end = rest
            .find(|c| matches!(c, '<' | '{' | '%'))
            .unwrap_or(rest.len());
        if end == 0 { None } else { Some(&rest[..end]) }
    }

    pub fn next_component(&mut self) -> Result<Option<Component>, TokenizeError> {
        let input = self.input;
        let rest = &input[self.pos..];
        if rest.is_empty() {
            return Ok(None);
        }

        // Delimiters are ASCII, so a delimited body always consumes two extra bytes.
        let (component, consumed) = if let Some(name) = Self::delimited(rest, '<', '>') {
            (Component::Primitive(name.to_string()), name.len() + 2)
        } else if let Some(name) = Self::delimited(rest, '{', '}') {
            (Component::Term(name.to_string()), name.len() + 2)
        } else if let Some(name) = Self::delimited(rest, '%', '%') {
            (Component::Tag(name.to_string()), name.len() + 2)
        } else if let Some(text) = Self::literal(rest) {
            (Component::Literal(text.to_string()), text.len())
        } else {
            return Err(TokenizeError::Unmatched {
                definition: self.input.to_string(),
                offset: self.pos,
            });
        };

        self.pos += consumed;
        Ok(Some(component))
    }

    pub fn tokenize(mut self) -> Result<Tokenized, TokenizeError> {
        let mut components = Vec::new();
        let mut kinds = ComponentKinds::default();
        while let Some(component) = self.next_component()? {
            kinds.record(&component);
            components.push(component);
        }
        Ok(Tokenized { components, kinds })
    }
}

pub fn tokenize(definition: &str) -> Result<Tokenized, TokenizeError> {
    Tokenizer::new(definition).tokenize()
}
