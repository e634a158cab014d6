//! Declarative per-field constraint tables.
//!
//! Drafts describe their fields as a static `&[FieldRule]` table and hand the
//! raw values to [`validate_fields`], which reports every violated field at
//! once so a form can highlight all of them.

use std::fmt;

use regex::Regex;
use thiserror::Error;

/// Constraint set for one named field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub field: &'static str,
    pub required: bool,
    pub min_len: Option<usize>,
    pub max_len: Option<usize>,
    pub pattern: Option<&'static str>,
}

impl FieldRule {
    #[must_use]
    pub const fn required(field: &'static str) -> Self {
        Self {
            field,
            required: true,
            min_len: None,
            max_len: None,
            pattern: None,
        }
    }

    #[must_use]
    pub const fn optional(field: &'static str) -> Self {
        Self {
            field,
            required: false,
            min_len: None,
            max_len: None,
            pattern: None,
        }
    }

    #[must_use]
    pub const fn min_len(mut self, min: usize) -> Self {
        self.min_len = Some(min);
        self
    }

    #[must_use]
    pub const fn max_len(mut self, max: usize) -> Self {
        self.max_len = Some(max);
        self
    }

    #[must_use]
    pub const fn pattern(mut self, pattern: &'static str) -> Self {
        self.pattern = Some(pattern);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldViolation {
    Missing,
    TooShort { min: usize },
    TooLong { max: usize },
    PatternMismatch,
    /// The rule's own pattern does not compile.
    InvalidRule,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldViolation::Missing => f.write_str("is required"),
            FieldViolation::TooShort { min } => write!(f, "must have at least {min} characters"),
            FieldViolation::TooLong { max } => write!(f, "must have at most {max} characters"),
            FieldViolation::PatternMismatch => f.write_str("has an invalid format"),
            FieldViolation::InvalidRule => f.write_str("has a broken validation rule"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub violation: FieldViolation,
}

/// Every field that failed validation, in rule order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid fields: {}", describe(.errors))]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    #[must_use]
    pub fn violation_for(&self, field: &str) -> Option<&FieldViolation> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| &e.violation)
    }
}

fn describe(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{} {}", e.field, e.violation))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Checks `values` against `rules`.
///
/// Values are trimmed before checking; a blank value counts as absent. Fields
/// that have a rule but no entry in `values` are treated as absent too.
///
/// # Errors
///
/// Returns `ValidationErrors` listing every violated rule.
pub fn validate_fields(
    rules: &[FieldRule],
    values: &[(&str, Option<&str>)],
) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();

    for rule in rules {
        let value = values
            .iter()
            .find(|(name, _)| *name == rule.field)
            .and_then(|(_, v)| *v)
            .map(str::trim)
            .filter(|v| !v.is_empty());

        let Some(value) = value else {
            if rule.required {
                errors.push(FieldError {
                    field: rule.field,
                    violation: FieldViolation::Missing,
                });
            }
            continue;
        };

        if let Some(violation) = check_value(rule, value) {
            errors.push(FieldError {
                field: rule.field,
                violation,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors { errors })
    }
}

fn check_value(rule: &FieldRule, value: &str) -> Option<FieldViolation> {
    let len = value.chars().count();
    if let Some(min) = rule.min_len
        && len < min
    {
        return Some(FieldViolation::TooShort { min });
    }
    if let Some(max) = rule.max_len
        && len > max
    {
        return Some(FieldViolation::TooLong { max });
    }
    if let Some(pattern) = rule.pattern {
        return match Regex::new(pattern) {
            Ok(re) if re.is_match(value) => None,
            Ok(_) => Some(FieldViolation::PatternMismatch),
            Err(_) => Some(FieldViolation::InvalidRule),
        };
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: &[FieldRule] = &[
        FieldRule::required("name").min_len(3).max_len(10),
        FieldRule::optional("code").pattern(r"^[A-Z]{2}\d+$"),
    ];

    #[test]
    fn accepts_valid_values() {
        validate_fields(RULES, &[("name", Some("Vendas")), ("code", Some("AB12"))]).unwrap();
        validate_fields(RULES, &[("name", Some("Vendas")), ("code", None)]).unwrap();
    }

    #[test]
    fn reports_every_violation() {
        let err = validate_fields(RULES, &[("name", Some("ab")), ("code", Some("x"))]).unwrap_err();
        assert_eq!(err.errors().len(), 2);
        assert_eq!(
            err.violation_for("name"),
            Some(&FieldViolation::TooShort { min: 3 })
        );
        assert_eq!(
            err.violation_for("code"),
            Some(&FieldViolation::PatternMismatch)
        );
    }

    #[test]
    fn blank_required_value_is_missing() {
        let err = validate_fields(RULES, &[("name", Some("   "))]).unwrap_err();
        assert_eq!(err.violation_for("name"), Some(&FieldViolation::Missing));
        assert_eq!(err.to_string(), "invalid fields: name is required");
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        validate_fields(RULES, &[("name", Some("Gestão"))]).unwrap();
    }

    #[test]
    fn broken_pattern_is_reported() {
        let rules = [FieldRule::required("x").pattern("(")];
        let err = validate_fields(&rules, &[("x", Some("a"))]).unwrap_err();
        assert_eq!(err.violation_for("x"), Some(&FieldViolation::InvalidRule));
    }
}
