use serde::{Deserialize, Serialize};

use super::max::MaxType;
use super::validation::{validate_non_negative, validate_positive, ValidationErrors};

/// Default rounding increment when a strategy does not carry its own.
pub const DEFAULT_ROUND_TO: f64 = 5.0;

/// How a prescription derives its base weight for a (user, lift).
///
/// Stored inline with its prescription as a tagged value; the variant set is
/// closed and new variants are additive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadStrategy {
    PercentOf {
        max_type: MaxType,
        percentage: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lookup_key: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        round_to: Option<f64>,
    },
    FixedWeight {
        weight: f64,
    },
}

/// A per-week or per-day value resolved from a lookup table. The percentage
/// replaces the strategy's base; a modifier scales whichever percentage is
/// in effect.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LookupValue {
    pub percentage: Option<f64>,
    pub modifier: Option<f64>,
}

impl LoadStrategy {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        match self {
            LoadStrategy::PercentOf {
                percentage,
                round_to,
                ..
            } => {
                validate_positive(&mut errors, "percentage", *percentage);
                if let Some(round_to) = round_to {
                    validate_positive(&mut errors, "round_to", *round_to);
                }
            }
            LoadStrategy::FixedWeight { weight } => {
                validate_non_negative(&mut errors, "weight", *weight);
            }
        }
        errors.into_result()
    }

    /// The rounding increment this strategy applies to computed weights.
    pub fn round_increment(&self) -> f64 {
        match self {
            LoadStrategy::PercentOf { round_to, .. } => round_to.unwrap_or(DEFAULT_ROUND_TO),
            LoadStrategy::FixedWeight { .. } => DEFAULT_ROUND_TO,
        }
    }

    pub fn lookup_key(&self) -> Option<&str> {
        match self {
            LoadStrategy::PercentOf { lookup_key, .. } => lookup_key.as_deref(),
            LoadStrategy::FixedWeight { .. } => None,
        }
    }

    pub fn max_type(&self) -> Option<MaxType> {
        match self {
            LoadStrategy::PercentOf { max_type, .. } => Some(*max_type),
            LoadStrategy::FixedWeight { .. } => None,
        }
    }

    /// Pure weight computation given the current max and any lookup value.
    /// `PERCENT_OF` applies `max * pct / 100` and rounds; `FIXED_WEIGHT`
    /// passes the weight through unchanged.
    pub fn apply(&self, max_value: f64, lookup: LookupValue) -> f64 {
        match self {
            LoadStrategy::PercentOf { percentage, .. } => {
                let mut pct = lookup.percentage.unwrap_or(*percentage);
                if let Some(modifier) = lookup.modifier {
                    pct *= modifier;
                }
                round_to_increment(max_value * pct / 100.0, self.round_increment())
            }
            LoadStrategy::FixedWeight { weight } => *weight,
        }
    }
}

/// Round to the nearest multiple of `increment`; ties round up. A
/// non-positive increment leaves the value untouched.
pub fn round_to_increment(value: f64, increment: f64) -> f64 {
    if increment <= 0.0 {
        return value;
    }
    (value / increment).round() * increment
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rounds_ties_up() {
        assert_eq!(round_to_increment(142.5, 5.0), 145.0);
    }

    #[test]
    fn rounds_to_quarter_increments() {
        assert_eq!(round_to_increment(141.24, 0.25), 141.25);
        assert_eq!(round_to_increment(141.24, 2.5), 140.0);
    }

    #[test]
    fn zero_rounds_to_zero() {
        for increment in [0.25, 2.5, 5.0, 10.0] {
            assert_eq!(round_to_increment(0.0, increment), 0.0);
        }
    }

    #[test]
    fn percent_of_applies_and_rounds() {
        let strategy = LoadStrategy::PercentOf {
            max_type: MaxType::OneRm,
            percentage: 85.0,
            lookup_key: None,
            round_to: Some(5.0),
        };
        assert_eq!(strategy.apply(200.0, LookupValue::default()), 170.0);
    }

    #[test]
    fn lookup_percentage_replaces_base() {
        let strategy = LoadStrategy::PercentOf {
            max_type: MaxType::TrainingMax,
            percentage: 85.0,
            lookup_key: Some("weekly".to_string()),
            round_to: Some(5.0),
        };
        let lookup = LookupValue {
            percentage: Some(95.0),
            modifier: None,
        };
        assert_eq!(strategy.apply(300.0, lookup), 285.0);
    }

    #[test]
    fn lookup_modifier_scales_percentage() {
        let strategy = LoadStrategy::PercentOf {
            max_type: MaxType::TrainingMax,
            percentage: 80.0,
            lookup_key: Some("weekly".to_string()),
            round_to: Some(2.5),
        };
        let lookup = LookupValue {
            percentage: None,
            modifier: Some(0.9),
        };
        // 300 * 80% * 0.9 = 216, rounded to 2.5 -> 215
        assert_eq!(strategy.apply(300.0, lookup), 215.0);
    }

    #[test]
    fn fixed_weight_passes_through() {
        let strategy = LoadStrategy::FixedWeight { weight: 45.0 };
        assert_eq!(strategy.apply(0.0, LookupValue::default()), 45.0);
    }

    #[test]
    fn validation_rejects_bad_values() {
        assert!(LoadStrategy::PercentOf {
            max_type: MaxType::OneRm,
            percentage: 0.0,
            lookup_key: None,
            round_to: None,
        }
        .validate()
        .is_err());
        assert!(LoadStrategy::PercentOf {
            max_type: MaxType::OneRm,
            percentage: 85.0,
            lookup_key: None,
            round_to: Some(0.0),
        }
        .validate()
        .is_err());
        assert!(LoadStrategy::FixedWeight { weight: -1.0 }.validate().is_err());
    }

    #[test]
    fn serde_tag_round_trips() {
        let strategy = LoadStrategy::PercentOf {
            max_type: MaxType::OneRm,
            percentage: 85.0,
            lookup_key: None,
            round_to: Some(5.0),
        };
        let json = serde_json::to_value(&strategy).unwrap();
        assert_eq!(json["type"], "PERCENT_OF");
        assert_eq!(json["max_type"], "ONE_RM");
        let back: LoadStrategy = serde_json::from_value(json).unwrap();
        assert_eq!(back, strategy);
    }
}
