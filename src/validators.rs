/// Input validators module
///
/// Generic rule-driven validation over the untyped body map the router
/// hands to handlers. Handlers declare rules per field and consume the
/// result as pass/fail plus per-field messages; the first failing rule for
/// a field wins.
///
/// Supported rules: `required`, `alpha`, `email`, `min_length:N`,
/// `max_length:N`, `match:other_field`.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::ValidationErrors;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();

    // Letters and spaces; display names, not identifiers
    static ref ALPHA_REGEX: Regex = Regex::new(r"^[A-Za-z ]+$").unwrap();
}

pub struct Validator {
    errors: BTreeMap<String, String>,
    validated: BTreeMap<String, String>,
}

impl Validator {
    /// Run the given rules against the body map
    pub fn set_rules(data: &Map<String, Value>, rules: &[(&str, &[&str])]) -> Self {
        let mut errors = BTreeMap::new();
        let mut validated = BTreeMap::new();

        for (field, field_rules) in rules {
            let value = data.get(*field).and_then(value_as_string);

            let mut failure = None;
            for rule in *field_rules {
                if let Some(message) = apply_rule(field, rule, value.as_deref(), data) {
                    failure = Some(message);
                    break;
                }
            }

            match failure {
                Some(message) => {
                    errors.insert(field.to_string(), message);
                }
                None => {
                    if let Some(value) = value {
                        validated.insert(field.to_string(), value);
                    }
                }
            }
        }

        Self { errors, validated }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn into_errors(self) -> ValidationErrors {
        ValidationErrors(self.errors)
    }

    /// A validated field's value; empty string when absent
    pub fn validated(&self, field: &str) -> &str {
        self.validated.get(field).map(String::as_str).unwrap_or("")
    }
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn apply_rule(
    field: &str,
    rule: &str,
    value: Option<&str>,
    data: &Map<String, Value>,
) -> Option<String> {
    let (name, arg) = match rule.split_once(':') {
        Some((name, arg)) => (name, Some(arg)),
        None => (rule, None),
    };

    if name == "required" {
        return match value {
            Some(v) if !v.is_empty() => None,
            _ => Some(format!("{} field is required.", field)),
        };
    }

    // Other rules only apply to present, non-empty values
    let value = match value {
        Some(v) if !v.is_empty() => v,
        _ => return None,
    };

    match name {
        "alpha" => {
            if ALPHA_REGEX.is_match(value) {
                None
            } else {
                Some(format!("{} must only contain letters.", field))
            }
        }
        "email" => {
            if EMAIL_REGEX.is_match(value) {
                None
            } else {
                Some(format!("{} input must be a valid email address.", field))
            }
        }
        "min_length" => {
            let min: usize = arg.and_then(|a| a.parse().ok()).unwrap_or(0);
            if value.chars().count() < min {
                Some(format!("{} must be at least {} characters.", field, min))
            } else {
                None
            }
        }
        "max_length" => {
            let max: usize = arg.and_then(|a| a.parse().ok()).unwrap_or(usize::MAX);
            if value.chars().count() > max {
                Some(format!(
                    "{} may not be greater than {} characters.",
                    field, max
                ))
            } else {
                None
            }
        }
        "match" => {
            let other = arg
                .and_then(|other| data.get(other))
                .and_then(value_as_string);
            if other.as_deref() == Some(value) {
                None
            } else {
                Some(format!("{} doesn't match.", field))
            }
        }
        unknown => {
            tracing::warn!(rule = unknown, field = field, "Unknown validation rule");
            None
        }
    }
}
