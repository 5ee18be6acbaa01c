//! Boolean predicates over an execution context mapping.
//!
//! Everything here is a pure function of its inputs. Lookups of absent fields
//! resolve to [`Resolved::Undefined`] instead of failing, and ordering between
//! values of unrelated types is simply `false`.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::str::FromStr;
use thiserror::Error;

fn default_operator() -> String {
    "=".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),
    #[error("Unknown condition type: {0}")]
    UnknownConditionType(String),
    #[error("condition group has no conditions")]
    EmptyConditions,
}

impl From<ConditionError> for AppError {
    fn from(err: ConditionError) -> Self {
        let category = match &err {
            ConditionError::UnsupportedOperator(_) => ErrorCategory::UnsupportedOperator,
            ConditionError::UnknownConditionType(_) => ErrorCategory::UnknownConditionType,
            ConditionError::EmptyConditions => ErrorCategory::InvalidProperties,
        };
        AppError::new(category, err.to_string())
    }
}

/// `{field, operator, value}` predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    #[serde(default = "default_operator")]
    pub operator: String,
    #[serde(default)]
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Equal,
    LessThan,
    GreaterThan,
    LessOrEqual,
    GreaterOrEqual,
}

impl FromStr for ComparisonOperator {
    type Err = ConditionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "=" | "==" => Ok(ComparisonOperator::Equal),
            "<" => Ok(ComparisonOperator::LessThan),
            ">" => Ok(ComparisonOperator::GreaterThan),
            "<=" => Ok(ComparisonOperator::LessOrEqual),
            ">=" => Ok(ComparisonOperator::GreaterOrEqual),
            other => Err(ConditionError::UnsupportedOperator(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionType {
    If,
    IfElseIf,
    Switch,
}

impl FromStr for ConditionType {
    type Err = ConditionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "if" => Ok(ConditionType::If),
            "if-elseif" | "else-if" => Ok(ConditionType::IfElseIf),
            "switch" => Ok(ConditionType::Switch),
            other => Err(ConditionError::UnknownConditionType(other.to_string())),
        }
    }
}

/// Result of looking a field up in the context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolved<'a> {
    Undefined,
    Value(&'a Value),
}

/// First-match outcome of a condition group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConditionMatch {
    pub matched: bool,
    pub index: Option<usize>,
}

impl ConditionMatch {
    fn miss() -> Self {
        Self {
            matched: false,
            index: None,
        }
    }

    fn hit(index: usize) -> Self {
        Self {
            matched: true,
            index: Some(index),
        }
    }
}

/// Resolve `field` as an exact key first, then as a dotted path.
pub fn resolve<'a>(context: &'a Map<String, Value>, field: &str) -> Resolved<'a> {
    if let Some(value) = context.get(field) {
        return Resolved::Value(value);
    }
    let mut segments = field.split('.');
    let Some(first) = segments.next() else {
        return Resolved::Undefined;
    };
    let mut current = match context.get(first) {
        Some(value) => value,
        None => return Resolved::Undefined,
    };
    for segment in segments {
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return Resolved::Undefined,
        }
    }
    Resolved::Value(current)
}

/// Evaluate a single condition against `context`.
pub fn evaluate(condition: &Condition, context: &Map<String, Value>) -> Result<bool, ConditionError> {
    let operator = condition.operator.parse::<ComparisonOperator>()?;
    Ok(compare(
        operator,
        resolve(context, &condition.field),
        &condition.value,
    ))
}

/// Scan left to right and report the lowest matching index.
pub fn evaluate_elseif(
    conditions: &[Condition],
    context: &Map<String, Value>,
) -> Result<ConditionMatch, ConditionError> {
    for (index, condition) in conditions.iter().enumerate() {
        if evaluate(condition, context)? {
            return Ok(ConditionMatch::hit(index));
        }
    }
    Ok(ConditionMatch::miss())
}

/// Like [`evaluate_elseif`] but every entry is compared for equality,
/// whatever operator it declares.
pub fn evaluate_switch(
    conditions: &[Condition],
    context: &Map<String, Value>,
) -> Result<ConditionMatch, ConditionError> {
    for (index, condition) in conditions.iter().enumerate() {
        let actual = resolve(context, &condition.field);
        if compare(ComparisonOperator::Equal, actual, &condition.value) {
            return Ok(ConditionMatch::hit(index));
        }
    }
    Ok(ConditionMatch::miss())
}

/// Evaluate a condition group tagged with its `condition_type`.
pub fn evaluate_group(
    condition_type: &str,
    conditions: &[Condition],
    context: &Map<String, Value>,
) -> Result<ConditionMatch, ConditionError> {
    let condition_type = condition_type.parse::<ConditionType>()?;
    match condition_type {
        ConditionType::If => {
            let first = conditions.first().ok_or(ConditionError::EmptyConditions)?;
            if evaluate(first, context)? {
                Ok(ConditionMatch::hit(0))
            } else {
                Ok(ConditionMatch::miss())
            }
        }
        ConditionType::IfElseIf => evaluate_elseif(conditions, context),
        ConditionType::Switch => evaluate_switch(conditions, context),
    }
}

fn compare(operator: ComparisonOperator, actual: Resolved<'_>, expected: &Value) -> bool {
    if operator == ComparisonOperator::Equal {
        return match actual {
            Resolved::Undefined => expected.is_null(),
            Resolved::Value(value) => values_equal(value, expected),
        };
    }
    let ordering = match actual {
        Resolved::Undefined => None,
        Resolved::Value(value) => order_values(value, expected),
    };
    match (operator, ordering) {
        (_, None) => false,
        (ComparisonOperator::LessThan, Some(ord)) => ord == Ordering::Less,
        (ComparisonOperator::GreaterThan, Some(ord)) => ord == Ordering::Greater,
        (ComparisonOperator::LessOrEqual, Some(ord)) => ord != Ordering::Greater,
        (ComparisonOperator::GreaterOrEqual, Some(ord)) => ord != Ordering::Less,
        (ComparisonOperator::Equal, Some(ord)) => ord == Ordering::Equal,
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        _ => left == right,
    }
}

fn order_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
