use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("slug regex"));

/// A single violated rule, addressed by the field that broke it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

/// Accumulates every violated rule instead of failing on the first, so a
/// caller sees the complete list in one round trip.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ValidationErrors {
    violations: Vec<Violation>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.violations.push(Violation {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        self.violations.extend(other.violations);
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Ok when no rule was violated, otherwise the full list.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .violations
            .iter()
            .map(|v| format!("{}: {}", v.field, v.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

pub fn is_valid_slug(value: &str) -> bool {
    SLUG_RE.is_match(value)
}

pub fn validate_slug(errors: &mut ValidationErrors, field: &str, value: &str) {
    if !is_valid_slug(value) {
        errors.add(
            field,
            "must be lowercase alphanumeric with single hyphen separators",
        );
    }
}

pub fn validate_non_empty(errors: &mut ValidationErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.add(field, "must not be empty");
    }
}

pub fn validate_positive(errors: &mut ValidationErrors, field: &str, value: f64) {
    if value <= 0.0 {
        errors.add(field, "must be greater than zero");
    }
}

pub fn validate_non_negative(errors: &mut ValidationErrors, field: &str, value: f64) {
    if value < 0.0 {
        errors.add(field, "must not be negative");
    }
}

pub fn validate_min(errors: &mut ValidationErrors, field: &str, value: i32, min: i32) {
    if value < min {
        errors.add(field, format!("must be at least {min}"));
    }
}

pub fn validate_max_len(errors: &mut ValidationErrors, field: &str, value: &str, max: usize) {
    if value.chars().count() > max {
        errors.add(field, format!("must be at most {max} characters"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_accepts_lowercase_alnum_hyphens() {
        assert!(is_valid_slug("squat"));
        assert!(is_valid_slug("close-grip-bench-press"));
        assert!(is_valid_slug("5x5-day-1"));
    }

    #[test]
    fn slug_rejects_bad_shapes() {
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("Squat"));
        assert!(!is_valid_slug("front squat"));
        assert!(!is_valid_slug("-leading"));
        assert!(!is_valid_slug("trailing-"));
        assert!(!is_valid_slug("double--hyphen"));
    }

    #[test]
    fn collects_every_violation() {
        let mut errors = ValidationErrors::new();
        validate_slug(&mut errors, "slug", "Bad Slug");
        validate_positive(&mut errors, "percentage", 0.0);
        validate_min(&mut errors, "sets", 0, 1);
        assert_eq!(errors.violations().len(), 3);
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn empty_errors_convert_to_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
    }
}
