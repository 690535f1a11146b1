//! Condition language
//!
//! A small boolean filter language used by collection queries:
//!
//! ```text
//! status == 'active' && (age >= 18 || role == "admin")
//! ```
//!
//! - `compiler.rs` - single-pass compiler from text to a [`Condition`] tree
//! - `eval.rs` - evaluation of a tree against a JSON record
//! - `pattern.rs` - matching for the `~` operator
//! - `error.rs` - compile errors

mod compiler;
mod error;
mod eval;
mod pattern;

pub use compiler::compile;
pub use error::ConditionError;
pub use pattern::like_match;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operator of a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "~")]
    Like,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Like => "~",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Right-hand side of a predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    /// Rendered in single quotes, or double quotes when it contains `'`.
    /// The language has no escapes, so text holding both quote kinds has no source form.
    Text(String),
}

impl Literal {
    /// Whether [`Display`](fmt::Display) output compiles back to this literal.
    pub fn has_source_form(&self) -> bool {
        match self {
            Literal::Float(x) => x.is_finite(),
            Literal::Text(s) => !(s.contains('\'') && s.contains('"')),
            _ => true,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Integer(i) => write!(f, "{}", i),
            // Debug keeps the fractional part so the text reads back as a float
            Literal::Float(x) => write!(f, "{:?}", x),
            Literal::Text(s) if s.contains('\'') => write!(f, "\"{}\"", s),
            Literal::Text(s) => write!(f, "'{}'", s),
        }
    }
}

/// A single `field OP value` comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub name: String,
    pub op: Operator,
    pub value: Literal,
}

impl Predicate {
    pub fn new(name: impl Into<String>, op: Operator, value: Literal) -> Self {
        Self {
            name: name.into(),
            op,
            value,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.op, self.value)
    }
}

/// Combinator of a group node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
}

impl Combinator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Combinator::And => "&&",
            Combinator::Or => "||",
        }
    }
}

/// Predicate tree. Serializes as `{name, op, value}`, `{and: [...]}` or `{or: [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    Predicate(Predicate),
    And { and: Vec<Condition> },
    Or { or: Vec<Condition> },
}

impl Condition {
    pub fn predicate(name: impl Into<String>, op: Operator, value: Literal) -> Self {
        Condition::Predicate(Predicate::new(name, op, value))
    }

    pub fn group(combinator: Combinator, children: Vec<Condition>) -> Self {
        match combinator {
            Combinator::And => Condition::And { and: children },
            Combinator::Or => Condition::Or { or: children },
        }
    }

    /// Leaves in left-to-right order.
    pub fn predicates(&self) -> Vec<&Predicate> {
        let mut out = Vec::new();
        self.collect_predicates(&mut out);
        out
    }

    fn collect_predicates<'a>(&'a self, out: &mut Vec<&'a Predicate>) {
        match self {
            Condition::Predicate(p) => out.push(p),
            Condition::And { and: children } | Condition::Or { or: children } => {
                for child in children {
                    child.collect_predicates(out);
                }
            }
        }
    }

    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Predicate(p) => write!(f, "{}", p),
            _ => write!(f, "({})", self),
        }
    }
}

/// Renders back into the condition language; nested groups are parenthesised.
impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (combinator, children) = match self {
            Condition::Predicate(p) => return write!(f, "{}", p),
            Condition::And { and } => (Combinator::And, and),
            Condition::Or { or } => (Combinator::Or, or),
        };
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                write!(f, " {} ", combinator.as_str())?;
            }
            child.fmt_nested(f)?;
        }
        Ok(())
    }
}
