use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::validation::{validate_min, validate_non_empty, validate_positive, validate_slug, ValidationErrors};

/// A single training session template. Prescription order is dense and
/// significant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Day {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub prescription_order: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Week {
    pub id: Uuid,
    pub cycle_id: Uuid,
    pub week_number: i32,
    pub day_order: Vec<Uuid>,
}

/// The repeating macro-unit of a program.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Cycle {
    pub id: Uuid,
    pub name: String,
    pub length_weeks: i32,
}

/// One row of a lookup table: parallel percentage/rep lists plus an optional
/// multiplicative modifier. Keys are unique within a lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LookupEntry {
    pub percentages: Vec<f64>,
    pub reps: Vec<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier: Option<f64>,
}

/// Varies load by the effective week; consulted through a strategy's
/// `lookup_key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyLookup {
    pub id: Uuid,
    pub name: String,
    pub entries: HashMap<String, LookupEntry>,
}

/// Varies load by (effective week, day index) or by day slug.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyLookup {
    pub id: Uuid,
    pub name: String,
    pub entries: HashMap<String, LookupEntry>,
}

impl Day {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        validate_non_empty(&mut errors, "name", &self.name);
        validate_slug(&mut errors, "slug", &self.slug);
        errors.into_result()
    }
}

impl Week {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        validate_min(&mut errors, "week_number", self.week_number, 1);
        if self.day_order.is_empty() {
            errors.add("day_order", "must contain at least one day");
        }
        errors.into_result()
    }
}

impl Cycle {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        validate_non_empty(&mut errors, "name", &self.name);
        validate_min(&mut errors, "length_weeks", self.length_weeks, 1);
        errors.into_result()
    }
}

impl LookupEntry {
    pub fn validate(&self, errors: &mut ValidationErrors, key: &str) {
        if self.percentages.len() != self.reps.len() {
            errors.add(
                format!("entries.{key}"),
                "percentages and reps must have equal length",
            );
        }
        for (i, pct) in self.percentages.iter().enumerate() {
            validate_positive(errors, &format!("entries.{key}.percentages[{i}]"), *pct);
        }
    }

    /// The top percentage of the entry; used as the week's working
    /// percentage when a load strategy consults this lookup.
    pub fn top_percentage(&self) -> Option<f64> {
        self.percentages.last().copied()
    }
}

pub fn validate_lookup_entries(
    entries: &HashMap<String, LookupEntry>,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    for (key, entry) in entries {
        entry.validate(&mut errors, key);
    }
    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_entry_lengths_must_match() {
        let mut entries = HashMap::new();
        entries.insert(
            "1".to_string(),
            LookupEntry {
                percentages: vec![65.0, 75.0, 85.0],
                reps: vec![5, 5],
                modifier: None,
            },
        );
        assert!(validate_lookup_entries(&entries).is_err());
    }

    #[test]
    fn top_percentage_is_last_element() {
        let entry = LookupEntry {
            percentages: vec![65.0, 75.0, 85.0],
            reps: vec![5, 5, 5],
            modifier: None,
        };
        assert_eq!(entry.top_percentage(), Some(85.0));
    }

    #[test]
    fn week_requires_days() {
        let week = Week {
            id: Uuid::new_v4(),
            cycle_id: Uuid::new_v4(),
            week_number: 1,
            day_order: vec![],
        };
        assert!(week.validate().is_err());
    }
}
