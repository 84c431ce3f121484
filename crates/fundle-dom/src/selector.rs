//! CSS selector subset used by queries and bindings.
//!
//! Supported syntax:
//!
//! | Form | Example |
//! |------|---------|
//! | type / universal | `li`, `*` |
//! | id / class | `#main`, `.done` |
//! | attribute | `[data-id]`, `[type=checkbox]`, `[title="a b"]` |
//! | structural | `:first-child`, `:last-child`, `:nth-child(2n+1)` |
//! | scope | `:scope` (the element the query runs from) |
//! | combinators | descendant (whitespace), child (`>`) |
//! | lists | `a, b` |
//!
//! A complex selector starting with `>` is relative to the scope, so
//! `> li` means `:scope > li`.
//!
//! Matching runs right to left. Ancestors are not limited to the scope,
//! mirroring `querySelectorAll`: `div li` queried from a `ul` matches the
//! `ul`'s `li` descendants when some `div` encloses them, inside or outside
//! the scope.

use std::fmt;
use std::str::FromStr;

use crate::error::SelectorError;
use crate::node::Element;

/// A parsed, comma-separated selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    selectors: Vec<Complex>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    /// `compounds[i]` and `compounds[i + 1]` are joined by `combinators[i]`.
    compounds: Vec<Compound>,
    combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    simple: Vec<Simple>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Simple {
    Id(String),
    Class(String),
    Attribute { name: String, value: Option<String> },
    Scope,
    FirstChild,
    LastChild,
    NthChild { step: i64, offset: i64 },
}

impl SelectorList {
    /// Parse a selector list.
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        Parser::new(source).parse_list()
    }

    /// Number of comma-separated selectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    /// Whether `element` matches any selector, with `:scope` bound to `scope`.
    #[must_use]
    pub fn matches(&self, element: &Element, scope: &Element) -> bool {
        self.selectors
            .iter()
            .any(|complex| complex.matches_at(element, complex.compounds.len() - 1, scope))
    }
}

impl FromStr for SelectorList {
    type Err = SelectorError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        Self::parse(source)
    }
}

impl fmt::Display for SelectorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, complex) in self.selectors.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{complex}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Complex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, compound) in self.compounds.iter().enumerate() {
            if i > 0 {
                match self.combinators[i - 1] {
                    Combinator::Descendant => f.write_str(" ")?,
                    Combinator::Child => f.write_str(" > ")?,
                }
            }
            write!(f, "{compound}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Compound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => f.write_str(tag)?,
            None if self.simple.is_empty() => f.write_str("*")?,
            None => {}
        }
        for simple in &self.simple {
            match simple {
                Simple::Id(id) => write!(f, "#{id}")?,
                Simple::Class(class) => write!(f, ".{class}")?,
                Simple::Attribute { name, value: None } => write!(f, "[{name}]")?,
                Simple::Attribute {
                    name,
                    value: Some(value),
                } if value.contains('"') => write!(f, "[{name}='{value}']")?,
                Simple::Attribute {
                    name,
                    value: Some(value),
                } => write!(f, "[{name}=\"{value}\"]")?,
                Simple::Scope => f.write_str(":scope")?,
                Simple::FirstChild => f.write_str(":first-child")?,
                Simple::LastChild => f.write_str(":last-child")?,
                Simple::NthChild { step, offset } => write!(f, ":nth-child({step}n{offset:+})")?,
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

impl Complex {
    fn matches_at(&self, element: &Element, index: usize, scope: &Element) -> bool {
        if !self.compounds[index].matches(element, scope) {
            return false;
        }
        if index == 0 {
            return true;
        }
        match self.combinators[index - 1] {
            Combinator::Child => element
                .parent()
                .is_some_and(|parent| self.matches_at(&parent, index - 1, scope)),
            Combinator::Descendant => {
                let mut cursor = element.parent();
                while let Some(ancestor) = cursor {
                    if self.matches_at(&ancestor, index - 1, scope) {
                        return true;
                    }
                    cursor = ancestor.parent();
                }
                false
            }
        }
    }
}

impl Compound {
    fn scope() -> Self {
        Self {
            tag: None,
            simple: vec![Simple::Scope],
        }
    }

    fn matches(&self, element: &Element, scope: &Element) -> bool {
        if element.is_fragment() && !self.simple.contains(&Simple::Scope) {
            return false;
        }
        if let Some(tag) = &self.tag
            && element.tag() != tag.as_str()
        {
            return false;
        }
        self.simple.iter().all(|simple| simple.matches(element, scope))
    }
}

impl Simple {
    fn matches(&self, element: &Element, scope: &Element) -> bool {
        match self {
            Self::Id(id) => element.id().as_deref() == Some(id.as_str()),
            Self::Class(class) => element.has_class(class),
            Self::Attribute { name, value: None } => element.has_attribute(name),
            Self::Attribute {
                name,
                value: Some(expected),
            } => element.get_attribute(name).as_ref() == Some(expected),
            Self::Scope => element == scope,
            Self::FirstChild => element.index_in_parent() == Some(0),
            Self::LastChild => match (element.index_in_parent(), element.parent()) {
                (Some(index), Some(parent)) => index + 1 == parent.child_count(),
                _ => false,
            },
            Self::NthChild { step, offset } => element
                .index_in_parent()
                .and_then(|index| i64::try_from(index + 1).ok())
                .is_some_and(|position| nth_matches(*step, *offset, position)),
        }
    }
}

/// Whether 1-based `position` equals `step * n + offset` for some `n >= 0`.
fn nth_matches(step: i64, offset: i64, position: i64) -> bool {
    let distance = position - offset;
    if step == 0 {
        return distance == 0;
    }
    distance % step == 0 && distance / step >= 0
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    /// Skip whitespace; report whether any was skipped.
    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos != start
    }

    fn error_here(&self) -> SelectorError {
        match self.peek() {
            Some(found) => SelectorError::Unexpected {
                selector: self.source.to_owned(),
                found,
                position: self.pos,
            },
            None => SelectorError::UnexpectedEnd {
                selector: self.source.to_owned(),
            },
        }
    }

    fn expect(&mut self, wanted: char) -> Result<(), SelectorError> {
        if self.peek() == Some(wanted) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error_here())
        }
    }

    fn ident(&mut self) -> Result<String, SelectorError> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error_here());
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_list(mut self) -> Result<SelectorList, SelectorError> {
        self.skip_ws();
        if self.peek().is_none() {
            return Err(SelectorError::Empty);
        }
        let mut selectors = Vec::new();
        loop {
            selectors.push(self.parse_complex()?);
            match self.peek() {
                None => break,
                Some(',') => {
                    self.bump();
                    self.skip_ws();
                }
                Some(_) => return Err(self.error_here()),
            }
        }
        Ok(SelectorList { selectors })
    }

    fn parse_complex(&mut self) -> Result<Complex, SelectorError> {
        let mut compounds = Vec::new();
        let mut combinators = Vec::new();

        if self.peek() == Some('>') {
            self.bump();
            self.skip_ws();
            compounds.push(Compound::scope());
            combinators.push(Combinator::Child);
        }
        compounds.push(self.parse_compound()?);

        loop {
            let spaced = self.skip_ws();
            let combinator = match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.bump();
                    self.skip_ws();
                    Combinator::Child
                }
                Some(_) if spaced => Combinator::Descendant,
                Some(_) => return Err(self.error_here()),
            };
            combinators.push(combinator);
            compounds.push(self.parse_compound()?);
        }

        Ok(Complex {
            compounds,
            combinators,
        })
    }

    fn parse_compound(&mut self) -> Result<Compound, SelectorError> {
        let start = self.pos;
        let mut compound = Compound::default();

        match self.peek() {
            Some('*') => {
                self.bump();
            }
            Some(c) if is_ident_char(c) => {
                compound.tag = Some(self.ident()?.to_ascii_lowercase());
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.bump();
                    compound.simple.push(Simple::Id(self.ident()?));
                }
                Some('.') => {
                    self.bump();
                    compound.simple.push(Simple::Class(self.ident()?));
                }
                Some('[') => {
                    self.bump();
                    compound.simple.push(self.parse_attribute()?);
                }
                Some(':') => {
                    self.bump();
                    compound.simple.push(self.parse_pseudo()?);
                }
                _ => break,
            }
        }

        if self.pos == start {
            return Err(self.error_here());
        }
        Ok(compound)
    }

    fn parse_attribute(&mut self) -> Result<Simple, SelectorError> {
        self.skip_ws();
        let name = self.ident()?;
        self.skip_ws();
        let value = if self.peek() == Some('=') {
            self.bump();
            self.skip_ws();
            let value = match self.peek() {
                Some(quote @ ('"' | '\'')) => {
                    self.bump();
                    let start = self.pos;
                    while self.peek().is_some_and(|c| c != quote) {
                        self.pos += 1;
                    }
                    let value: String = self.chars[start..self.pos].iter().collect();
                    self.expect(quote)?;
                    value
                }
                _ => self.ident()?,
            };
            self.skip_ws();
            Some(value)
        } else {
            None
        };
        self.expect(']')?;
        Ok(Simple::Attribute { name, value })
    }

    fn parse_pseudo(&mut self) -> Result<Simple, SelectorError> {
        let name = self.ident()?.to_ascii_lowercase();
        match name.as_str() {
            "scope" => Ok(Simple::Scope),
            "first-child" => Ok(Simple::FirstChild),
            "last-child" => Ok(Simple::LastChild),
            "nth-child" => {
                self.expect('(')?;
                let start = self.pos;
                while self.peek().is_some_and(|c| c != ')') {
                    self.pos += 1;
                }
                let formula: String = self.chars[start..self.pos].iter().collect();
                self.expect(')')?;
                let (step, offset) =
                    parse_nth(&formula).ok_or_else(|| SelectorError::InvalidNth {
                        selector: self.source.to_owned(),
                        formula: formula.trim().to_owned(),
                    })?;
                Ok(Simple::NthChild { step, offset })
            }
            _ => Err(SelectorError::UnsupportedPseudo {
                selector: self.source.to_owned(),
                pseudo: name,
            }),
        }
    }
}

/// Parse an `an+b` formula (or `odd` / `even`) into `(a, b)`.
fn parse_nth(formula: &str) -> Option<(i64, i64)> {
    let compact: String = formula
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    match compact.as_str() {
        "" => return None,
        "odd" => return Some((2, 1)),
        "even" => return Some((2, 0)),
        _ => {}
    }

    let Some(n_at) = compact.find('n') else {
        return compact.parse().ok().map(|offset| (0, offset));
    };
    let (coefficient, rest) = (&compact[..n_at], &compact[n_at + 1..]);
    let step = match coefficient {
        "" | "+" => 1,
        "-" => -1,
        digits => digits.parse().ok()?,
    };
    let offset = match rest {
        "" => 0,
        signed if signed.starts_with('+') || signed.starts_with('-') => {
            signed.trim_start_matches('+').parse().ok()?
        }
        _ => return None,
    };
    Some((step, offset))
}
