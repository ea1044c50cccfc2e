//! Evaluation of declared input/output schemas and validation rules.
//!
//! A violation here is a configuration defect, not a transient fault: the
//! node runtime fails the node without retrying.

use serde_json::Value;
use std::fmt;

use crate::dsl::model::{ConfigMap, IoDeclaration, ValidationRule};

/// One failed schema or rule check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleViolation {
    /// The declared field that failed.
    pub field: String,
    /// What failed.
    pub detail: String,
}

impl RuleViolation {
    fn new(field: &str, detail: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for RuleViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.detail)
    }
}

/// Checks every declaration against a value map, collecting all violations.
pub fn check_declarations(
    declarations: &[IoDeclaration],
    values: &ConfigMap,
) -> Result<(), Vec<RuleViolation>> {
    let mut violations = Vec::new();
    for decl in declarations {
        check_declaration(decl, values.get(&decl.name), &mut violations);
    }
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

fn check_declaration(
    decl: &IoDeclaration,
    value: Option<&Value>,
    violations: &mut Vec<RuleViolation>,
) {
    if let (Some(schema), Some(value)) = (&decl.schema, value) {
        if let Some(detail) = check_schema(schema, value) {
            violations.push(RuleViolation::new(&decl.name, detail));
        }
    }

    for rule in &decl.rules {
        if let Some(detail) = check_rule(rule, value) {
            violations.push(RuleViolation::new(&decl.name, detail));
        }
    }
}

/// Checks a `{"type": ...}` schema. Returns the violation detail, if any.
fn check_schema(schema: &Value, value: &Value) -> Option<String> {
    let expected = schema.get("type").and_then(Value::as_str)?;
    let actual = json_type_name(value);

    let matches = match expected {
        "integer" => value.as_i64().is_some() || value.as_u64().is_some(),
        other => other == actual,
    };

    if matches {
        None
    } else {
        Some(format!("expected type '{expected}', got '{actual}'"))
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Checks one rule. Absent values only violate `Required`; every other rule
/// passes vacuously so optional fields stay optional.
fn check_rule(rule: &ValidationRule, value: Option<&Value>) -> Option<String> {
    let Some(value) = value else {
        return match rule {
            ValidationRule::Required => Some("required value is missing".to_string()),
            _ => None,
        };
    };

    match rule {
        ValidationRule::Required => None,
        ValidationRule::NonEmpty => {
            let empty = match value {
                Value::String(s) => s.is_empty(),
                Value::Array(a) => a.is_empty(),
                Value::Object(o) => o.is_empty(),
                Value::Null => true,
                _ => false,
            };
            empty.then(|| "value is empty".to_string())
        }
        ValidationRule::Pattern { pattern } => {
            let Some(text) = value.as_str() else {
                return Some("pattern rule applies only to strings".to_string());
            };
            match regex::Regex::new(pattern) {
                Ok(re) => (!re.is_match(text))
                    .then(|| format!("value does not match pattern '{pattern}'")),
                Err(_) => Some(format!("invalid pattern '{pattern}'")),
            }
        }
        ValidationRule::Range { min, max } => {
            let Some(number) = value.as_f64() else {
                return Some("range rule applies only to numbers".to_string());
            };
            if min.is_some_and(|m| number < m) {
                return Some(format!("value {number} is below minimum {}", min.unwrap_or(0.0)));
            }
            if max.is_some_and(|m| number > m) {
                return Some(format!("value {number} is above maximum {}", max.unwrap_or(0.0)));
            }
            None
        }
        ValidationRule::OneOf { values } => (!values.contains(value))
            .then(|| format!("value is not one of the {} accepted values", values.len())),
    }
}
