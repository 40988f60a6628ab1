use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    LoadStrategy, LookupValue, MaxType, Prescription, ResolvedPrescription,
};
use crate::repository::{CatalogRepository, MaxRepository};

use super::schedule::LookupContext;

/// One prescription that could not be resolved in a batch.
#[derive(Debug)]
pub struct ResolutionFailure {
    pub prescription_id: Uuid,
    pub error: Error,
}

/// Outcome of a batch resolve: the prescriptions that resolved, in request
/// order, plus the per-prescription failures.
#[derive(Debug, Default)]
pub struct BatchResolution {
    pub resolved: Vec<ResolvedPrescription>,
    pub failures: Vec<ResolutionFailure>,
}

/// Composes load strategy and set scheme into concrete sets, attaching the
/// lift summary and carrying through notes and rest.
#[derive(Clone)]
pub struct PrescriptionResolver {
    catalog: Arc<dyn CatalogRepository>,
    maxes: Arc<dyn MaxRepository>,
}

impl PrescriptionResolver {
    pub fn new(catalog: Arc<dyn CatalogRepository>, maxes: Arc<dyn MaxRepository>) -> Self {
        Self { catalog, maxes }
    }

    pub async fn resolve(
        &self,
        user_id: Uuid,
        prescription: &Prescription,
        context: &LookupContext,
    ) -> Result<ResolvedPrescription> {
        let mut max_cache = HashMap::new();
        self.resolve_cached(user_id, prescription, context, &mut max_cache)
            .await
    }

    /// Resolve a batch of prescription ids. Max lookups are shared across
    /// the batch (one per (lift, max type) tuple) and a failing prescription
    /// does not sink the rest.
    pub async fn resolve_batch(
        &self,
        user_id: Uuid,
        prescription_ids: &[Uuid],
        context: &LookupContext,
    ) -> Result<BatchResolution> {
        let mut outcome = BatchResolution::default();
        let mut max_cache = HashMap::new();

        for &prescription_id in prescription_ids {
            let prescription = match self.catalog.prescription(prescription_id).await? {
                Some(prescription) => prescription,
                None => {
                    outcome.failures.push(ResolutionFailure {
                        prescription_id,
                        error: Error::not_found("prescription", prescription_id),
                    });
                    continue;
                }
            };
            match self
                .resolve_cached(user_id, &prescription, context, &mut max_cache)
                .await
            {
                Ok(resolved) => outcome.resolved.push(resolved),
                Err(error) => outcome.failures.push(ResolutionFailure {
                    prescription_id,
                    error,
                }),
            }
        }

        Ok(outcome)
    }

    async fn resolve_cached(
        &self,
        user_id: Uuid,
        prescription: &Prescription,
        context: &LookupContext,
        max_cache: &mut HashMap<(Uuid, MaxType), Option<f64>>,
    ) -> Result<ResolvedPrescription> {
        let lift = self
            .catalog
            .lift(prescription.lift_id)
            .await?
            .ok_or_else(|| Error::not_found("lift", prescription.lift_id))?;

        let base_weight = match &prescription.load_strategy {
            LoadStrategy::PercentOf { max_type, .. } => {
                let cached = match max_cache.entry((prescription.lift_id, *max_type)) {
                    std::collections::hash_map::Entry::Occupied(entry) => *entry.get(),
                    std::collections::hash_map::Entry::Vacant(entry) => {
                        let value = self
                            .maxes
                            .current_max(user_id, prescription.lift_id, *max_type)
                            .await?
                            .map(|max| max.value);
                        *entry.insert(value)
                    }
                };
                let max_value = cached.ok_or(Error::MaxNotFound {
                    user_id,
                    lift_id: prescription.lift_id,
                    max_type: *max_type,
                })?;
                let lookup = prescription
                    .load_strategy
                    .lookup_key()
                    .map(|key| context.value_for(key))
                    .unwrap_or_else(LookupValue::default);
                prescription.load_strategy.apply(max_value, lookup)
            }
            LoadStrategy::FixedWeight { weight } => *weight,
        };

        let sets = prescription
            .set_scheme
            .generate_sets(base_weight, prescription.load_strategy.round_increment());

        Ok(ResolvedPrescription {
            prescription_id: prescription.id,
            lift: lift.summary(),
            sets,
            notes: prescription.notes.clone(),
            rest_seconds: prescription.rest_seconds,
        })
    }
}
