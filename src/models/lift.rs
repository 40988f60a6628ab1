use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::validation::{validate_non_empty, validate_slug, ValidationErrors};

/// An exercise in the catalog. Variations point at a parent lift; parent
/// chains must be acyclic. Lifts are immutable once referenced.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Lift {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub is_competition_lift: bool,
    pub parent_lift_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// The compact lift reference attached to resolved prescriptions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LiftSummary {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

impl Lift {
    pub fn new(name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            slug: slug.into(),
            is_competition_lift: false,
            parent_lift_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        validate_non_empty(&mut errors, "name", &self.name);
        validate_slug(&mut errors, "slug", &self.slug);
        if self.parent_lift_id == Some(self.id) {
            errors.add("parent_lift_id", "lift cannot be its own parent");
        }
        errors.into_result()
    }

    pub fn summary(&self) -> LiftSummary {
        LiftSummary {
            id: self.id,
            name: self.name.clone(),
            slug: self.slug.clone(),
        }
    }
}

/// Walks every parent chain in the set and rejects cycles and dangling
/// parent references.
pub fn validate_parent_chains(lifts: &[Lift]) -> Result<(), ValidationErrors> {
    let by_id: HashMap<Uuid, &Lift> = lifts.iter().map(|l| (l.id, l)).collect();
    let mut errors = ValidationErrors::new();

    for lift in lifts {
        let mut seen = HashSet::new();
        seen.insert(lift.id);
        let mut cursor = lift.parent_lift_id;
        while let Some(parent_id) = cursor {
            if !seen.insert(parent_id) {
                errors.add("parent_lift_id", format!("cycle through lift {}", lift.slug));
                break;
            }
            match by_id.get(&parent_id) {
                Some(parent) => cursor = parent.parent_lift_id,
                None => {
                    errors.add(
                        "parent_lift_id",
                        format!("lift {} references unknown parent {parent_id}", lift.slug),
                    );
                    break;
                }
            }
        }
    }

    errors.into_result()
}
