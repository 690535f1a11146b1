use super::pattern::like_match;
use super::{Condition, Literal, Operator, Predicate};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;

impl Condition {
    /// Evaluate against a JSON record.
    pub fn matches(&self, record: &JsonValue) -> bool {
        match self {
            Condition::Predicate(p) => p.matches(record),
            Condition::And { and } => and.iter().all(|c| c.matches(record)),
            Condition::Or { or } => or.iter().any(|c| c.matches(record)),
        }
    }
}

impl Predicate {
    /// Missing fields compare as `null`.
    pub fn matches(&self, record: &JsonValue) -> bool {
        let field = lookup(record, &self.name).unwrap_or(&JsonValue::Null);
        match self.op {
            Operator::Eq => literal_eq(field, &self.value),
            Operator::Ne => !literal_eq(field, &self.value),
            Operator::Gt => compare(field, &self.value) == Some(Ordering::Greater),
            Operator::Gte => matches!(
                compare(field, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::Lt => compare(field, &self.value) == Some(Ordering::Less),
            Operator::Lte => matches!(
                compare(field, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::Like => like(field, &self.value),
        }
    }
}

/// Resolve a dotted path; numeric segments index into arrays.
fn lookup<'a>(record: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    path.split('.').try_fold(record, |current, segment| match current {
        JsonValue::Object(map) => map.get(segment),
        JsonValue::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn literal_eq(field: &JsonValue, literal: &Literal) -> bool {
    match (field, literal) {
        (JsonValue::Null, Literal::Null) => true,
        (JsonValue::Bool(a), Literal::Bool(b)) => a == b,
        (JsonValue::String(a), Literal::Text(b)) => a == b,
        (JsonValue::Number(_), Literal::Integer(_) | Literal::Float(_)) => {
            compare(field, literal) == Some(Ordering::Equal)
        }
        _ => false,
    }
}

/// Numbers compare numerically, strings lexically; anything else is unordered.
fn compare(field: &JsonValue, literal: &Literal) -> Option<Ordering> {
    match (field, literal) {
        (JsonValue::Number(n), Literal::Integer(b)) => match n.as_i64() {
            Some(a) => Some(a.cmp(b)),
            None => n.as_f64()?.partial_cmp(&(*b as f64)),
        },
        (JsonValue::Number(n), Literal::Float(b)) => n.as_f64()?.partial_cmp(b),
        (JsonValue::String(a), Literal::Text(b)) => Some(a.as_str().cmp(b.as_str())),
        _ => None,
    }
}

fn like(field: &JsonValue, literal: &Literal) -> bool {
    let pattern = match literal {
        Literal::Text(s) => s.clone(),
        Literal::Null => return false,
        other => other.to_string(),
    };
    match field {
        JsonValue::String(s) => like_match(s, &pattern),
        JsonValue::Number(n) => like_match(&n.to_string(), &pattern),
        JsonValue::Array(items) => items.iter().any(|item| like(item, literal)),
        _ => false,
    }
}
