use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{LoadStrategy, LookupValue};
use crate::repository::MaxRepository;

use super::schedule::LookupContext;

/// Computes a base weight for a (user, lift) from a strategy descriptor.
/// The arithmetic itself is pure; only the max lookup touches the store.
#[derive(Clone)]
pub struct LoadCalculator {
    maxes: Arc<dyn MaxRepository>,
}

impl LoadCalculator {
    pub fn new(maxes: Arc<dyn MaxRepository>) -> Self {
        Self { maxes }
    }

    pub async fn calculate_load(
        &self,
        user_id: Uuid,
        lift_id: Uuid,
        strategy: &LoadStrategy,
        context: &LookupContext,
    ) -> Result<f64> {
        match strategy {
            LoadStrategy::PercentOf { max_type, .. } => {
                let max = self
                    .maxes
                    .current_max(user_id, lift_id, *max_type)
                    .await?
                    .ok_or(Error::MaxNotFound {
                        user_id,
                        lift_id,
                        max_type: *max_type,
                    })?;
                let lookup = strategy
                    .lookup_key()
                    .map(|key| context.value_for(key))
                    .unwrap_or_else(LookupValue::default);
                Ok(strategy.apply(max.value, lookup))
            }
            LoadStrategy::FixedWeight { weight } => Ok(*weight),
        }
    }
}
