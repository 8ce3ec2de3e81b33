//! Extension dependency expressions
//!
//! The registry writes dependencies as a small boolean language:
//! `VK_KHR_surface+VK_KHR_get_surface_capabilities2,VK_VERSION_1_1`.
//! `+` is conjunction, `,` is disjunction, `+` binds tighter than `,` and
//! parentheses group. Older registries use a plain comma-separated
//! `requires` list where every name is mandatory.

use crate::ir::ApiVersion;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Parsed dependency expression
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DependencyExpr {
    /// Another extension must be available
    Extension(String),
    /// A core API version must be reachable
    Version(ApiVersion),
    /// Every sub-expression must hold
    All(Vec<DependencyExpr>),
    /// At least one sub-expression must hold
    Any(Vec<DependencyExpr>),
}

/// Error produced when a dependency expression is malformed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid dependency expression {input:?}: {message}")]
pub struct DependencyParseError {
    pub input: String,
    pub message: String,
}

impl DependencyExpr {
    /// Parse a `depends` attribute
    pub fn parse(input: &str) -> Result<Self, DependencyParseError> {
        let tokens = tokenize(input)?;
        let mut parser = Parser {
            input,
            tokens,
            pos: 0,
        };
        let expr = parser.parse_any()?;
        if parser.pos != parser.tokens.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(expr)
    }

    /// Build an expression from a legacy `requires` attribute
    pub fn from_requires(list: &str) -> Option<Self> {
        let terms: Vec<DependencyExpr> = list
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(term)
            .collect();
        match terms.len() {
            0 => None,
            1 => terms.into_iter().next(),
            _ => Some(DependencyExpr::All(terms)),
        }
    }

    /// Evaluate against the API version the device is known to report and
    /// an availability predicate for extension names
    ///
    /// With no known version every version term is unsatisfied.
    pub fn evaluate<F>(&self, api_version: Option<ApiVersion>, extension_available: &F) -> bool
    where
        F: Fn(&str) -> bool,
    {
        match self {
            DependencyExpr::Extension(name) => extension_available(name),
            DependencyExpr::Version(version) => api_version.is_some_and(|v| *version <= v),
            DependencyExpr::All(terms) => terms
                .iter()
                .all(|t| t.evaluate(api_version, extension_available)),
            DependencyExpr::Any(terms) => terms
                .iter()
                .any(|t| t.evaluate(api_version, extension_available)),
        }
    }

    /// The lowest core version every way of satisfying this expression needs,
    /// if any
    pub fn minimum_core_version(&self) -> Option<ApiVersion> {
        match self {
            DependencyExpr::Extension(_) => None,
            DependencyExpr::Version(version) => Some(*version),
            DependencyExpr::All(terms) => terms
                .iter()
                .filter_map(DependencyExpr::minimum_core_version)
                .max(),
            DependencyExpr::Any(terms) => {
                let floors: Option<Vec<ApiVersion>> =
                    terms.iter().map(DependencyExpr::minimum_core_version).collect();
                floors.and_then(|f| f.into_iter().min())
            }
        }
    }
}

fn term(name: &str) -> DependencyExpr {
    match ApiVersion::from_feature_name(name) {
        Some(version) => DependencyExpr::Version(version),
        None => DependencyExpr::Extension(name.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Name(String),
    And,
    Or,
    Open,
    Close,
}

fn tokenize(input: &str) -> Result<Vec<Token>, DependencyParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        match c {
            '+' => tokens.push(Token::And),
            ',' => tokens.push(Token::Or),
            '(' => tokens.push(Token::Open),
            ')' => tokens.push(Token::Close),
            c if c.is_whitespace() => {}
            c if c.is_ascii_alphanumeric() || c == '_' => {
                let mut end = start + c.len_utf8();
                while let Some(&(idx, next)) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        end = idx + next.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Name(input[start..end].to_string()));
            }
            other => {
                return Err(DependencyParseError {
                    input: input.to_string(),
                    message: format!("unexpected character {:?}", other),
                })
            }
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, message: &str) -> DependencyParseError {
        DependencyParseError {
            input: self.input.to_string(),
            message: message.to_string(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn parse_any(&mut self) -> Result<DependencyExpr, DependencyParseError> {
        let mut terms = vec![self.parse_all()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            terms.push(self.parse_all()?);
        }
        Ok(collapse(terms, DependencyExpr::Any))
    }

    fn parse_all(&mut self) -> Result<DependencyExpr, DependencyParseError> {
        let mut terms = vec![self.parse_term()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            terms.push(self.parse_term()?);
        }
        Ok(collapse(terms, DependencyExpr::All))
    }

    fn parse_term(&mut self) -> Result<DependencyExpr, DependencyParseError> {
        match self.tokens.get(self.pos).cloned() {
            Some(Token::Name(name)) => {
                self.pos += 1;
                Ok(term(&name))
            }
            Some(Token::Open) => {
                self.pos += 1;
                let inner = self.parse_any()?;
                if self.peek() != Some(&Token::Close) {
                    return Err(self.error("missing closing parenthesis"));
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(_) => Err(self.error("expected a name or '('")),
            None => Err(self.error("unexpected end of expression")),
        }
    }
}

fn collapse(mut terms: Vec<DependencyExpr>, wrap: fn(Vec<DependencyExpr>) -> DependencyExpr) -> DependencyExpr {
    if terms.len() == 1 {
        terms.remove(0)
    } else {
        wrap(terms)
    }
}

impl fmt::Display for DependencyExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyExpr::Extension(name) => f.write_str(name),
            DependencyExpr::Version(version) => f.write_str(&version.feature_name()),
            DependencyExpr::All(terms) => {
                for (i, t) in terms.iter().enumerate() {
                    if i > 0 {
                        f.write_str("+")?;
                    }
                    match t {
                        DependencyExpr::Any(_) => write!(f, "({})", t)?,
                        _ => write!(f, "{}", t)?,
                    }
                }
                Ok(())
            }
            DependencyExpr::Any(terms) => {
                for (i, t) in terms.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", t)?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for DependencyExpr {
    type Err = DependencyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DependencyExpr {
    type Error = DependencyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DependencyExpr> for String {
    fn from(expr: DependencyExpr) -> Self {
        expr.to_string()
    }
}
