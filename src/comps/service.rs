// src/comps/service.rs

//! Freshness-aware coordinator for a lead's comparables.
//!
//! A refresh either serves the stored snapshot (non-empty and younger than the freshness
//! window) or fetches, scores and aggregates a new set and swaps it in wholesale. When the
//! source fails, the stored snapshot is never touched.

use std::sync::PoisonError;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::comps::clock::{Clock, SystemClock};
use crate::comps::locks::LeadLocks;
use crate::comps::result::{AggregateResult, LeadRental, RefreshRequest};
use crate::config::Config;
use crate::db::PersistenceAdapter;
use crate::domain::aggregate::{round2, summarize};
use crate::domain::comparable::ComparableSale;
use crate::domain::confidence::score_comparable;
use crate::domain::lead::{Lead, Snapshot};
use crate::domain::rental::{
    rent_per_floor_area, RentalEstimate, RentalEstimator, RentalInputs, RentalSource,
};
use crate::errors::CompsError;
use crate::gateway::{ComparableSource, CompsQuery};

const MAX_RADIUS_MILES: f64 = 10.0;
const MAX_RESULTS_LIMIT: u32 = 100;
const MAX_AGE_MONTHS_LIMIT: u32 = 120;

#[derive(Debug, Clone, Copy)]
struct SearchDefaults {
    radius_miles: f64,
    max_results: u32,
    max_age_months: u32,
}

pub struct ComparablesService<S, P> {
    source: S,
    store: P,
    clock: Box<dyn Clock>,
    estimator: RentalEstimator,
    locks: LeadLocks,
    defaults: SearchDefaults,
    freshness_window: chrono::Duration,
}

impl<S, P> ComparablesService<S, P>
where
    S: ComparableSource,
    P: PersistenceAdapter,
{
    pub fn new(source: S, store: P, config: &Config) -> Self {
        Self {
            source,
            store,
            clock: Box::new(SystemClock),
            estimator: RentalEstimator::default(),
            locks: LeadLocks::new(),
            defaults: SearchDefaults {
                radius_miles: config.default_radius_miles,
                max_results: config.default_max_results,
                max_age_months: config.default_max_age_months,
            },
            freshness_window: config.freshness_window,
        }
    }

    /// Returns the lead's comparables aggregate, refetching from the source unless a fresh
    /// non-empty snapshot exists (or `force_refresh` is set).
    ///
    /// On source failure the previous snapshot is served with `stale: true`; only a lead
    /// with no stored snapshot gets `SourceUnavailable`.
    pub fn refresh_comparables(
        &self,
        lead_id: i64,
        request: &RefreshRequest,
    ) -> Result<AggregateResult, CompsError> {
        let defaults = self.resolve_search(request)?;
        let lead = self.require_lead(lead_id)?;
        validate_lead(&lead)?;

        let lock = self.locks.lock_for(lead_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        debug!(lead_id, active = self.locks.active_count(), "Acquired lead refresh lock");

        let now = self.clock.now();
        let meta = self.store.read_snapshot_meta(lead_id)?;

        if !request.force_refresh && meta.is_fresh(now.timestamp(), self.freshness_window) {
            info!(lead_id, count = meta.count, "Serving comparables from cache");
            return self.cached_result(lead_id, now);
        }

        let query = CompsQuery {
            postcode: lead.postcode.trim().to_string(),
            bedrooms: lead.bedrooms,
            property_type: lead.property_type.clone(),
            radius_miles: defaults.radius_miles,
            max_results: defaults.max_results,
            max_age_months: defaults.max_age_months,
        };

        info!(lead_id, force = request.force_refresh, postcode = %query.postcode, "Fetching comparables");

        let fetched = match self.source.fetch(&query) {
            Ok(fetched) => fetched,
            Err(e) if meta.count > 0 => {
                warn!(lead_id, error = %e, "Comparable source unavailable, serving stale snapshot");
                let mut result = self.cached_result(lead_id, now)?;
                result.stale = true;
                return Ok(result);
            }
            Err(e) => {
                warn!(lead_id, error = %e, "Comparable source unavailable and no snapshot stored");
                return Err(CompsError::SourceUnavailable(e));
            }
        };

        let fetched_at = now.timestamp();
        let (scored, rejected) = score_batch(&lead, &fetched.comparables, now, fetched_at);
        let excluded = fetched.malformed + rejected;
        if excluded > 0 {
            warn!(lead_id, excluded, "Excluded malformed comparables from the aggregate");
        }

        let summary = summarize(&scored);

        self.store.replace_comparables(
            lead_id,
            &scored,
            &summary,
            fetched_at,
            defaults.radius_miles,
            excluded,
        )?;

        let mut result = AggregateResult::new(
            scored,
            summary,
            Some(defaults.radius_miles),
            Some(fetched_at),
            excluded,
        );
        result.credits_used = fetched.credits_used;

        if result.is_no_data() {
            info!(lead_id, "Search succeeded with no comparables");
        } else {
            info!(
                lead_id,
                count = result.count,
                confidence = %result.confidence,
                credits = result.credits_used,
                "Replaced comparables snapshot"
            );
        }
        Ok(result)
    }

    /// Stored aggregate only; never calls the source.
    pub fn get_comparables(&self, lead_id: i64) -> Result<AggregateResult, CompsError> {
        self.cached_result(lead_id, self.clock.now())
    }

    /// Heuristic rent for arbitrary inputs.
    pub fn estimate_rental(
        &self,
        asking_price: i64,
        property_type: Option<&str>,
        bedrooms: Option<u32>,
        postcode: Option<&str>,
    ) -> Result<RentalEstimate, CompsError> {
        if asking_price <= 0 {
            return Err(CompsError::InvalidInput(
                "asking price must be positive".to_string(),
            ));
        }
        Ok(self.estimator.estimate_rental(&RentalInputs {
            asking_price,
            property_type,
            bedrooms,
            postcode: postcode.filter(|p| !p.trim().is_empty()),
        }))
    }

    pub fn estimate_floor_area(&self, property_type: Option<&str>, bedrooms: Option<u32>) -> Option<i64> {
        self.estimator.estimate_floor_area(property_type, bedrooms)
    }

    /// Computes and stores the lead's rental estimate: the comparables' rent when the stored
    /// set has any, the heuristic otherwise.
    pub fn estimate_lead_rental(&self, lead_id: i64) -> Result<LeadRental, CompsError> {
        let lead = self.require_lead(lead_id)?;
        validate_lead(&lead)?;

        let snapshot = self.store.load_snapshot(lead_id)?;
        let summary = summarize(&snapshot.comparables);

        let estimate = match summary.avg_monthly_rent {
            Some(monthly_rent) => {
                let annual_rent = monthly_rent * 12;
                debug!(lead_id, monthly_rent, "Using comparable-derived rent");
                RentalEstimate {
                    monthly_rent,
                    annual_rent,
                    estimated_yield: round2(annual_rent as f64 / lead.asking_price as f64 * 100.0),
                    confidence: summary.confidence,
                    source: RentalSource::Comparables,
                }
            }
            None => self.estimate_rental(
                lead.asking_price,
                lead.property_type.as_deref(),
                lead.bedrooms,
                Some(lead.postcode.as_str()),
            )?,
        };

        let floor_area = self.estimate_floor_area(lead.property_type.as_deref(), lead.bedrooms);
        self.store.write_rental_estimate(lead_id, &estimate, floor_area)?;

        info!(
            lead_id,
            monthly_rent = estimate.monthly_rent,
            source = estimate.source.as_str(),
            "Stored rental estimate"
        );

        Ok(LeadRental {
            estimate,
            floor_area,
            rent_per_sqft: rent_per_floor_area(
                estimate.monthly_rent,
                floor_area.map(|a| a as f64).unwrap_or(0.0),
            ),
        })
    }

    fn require_lead(&self, lead_id: i64) -> Result<Lead, CompsError> {
        self.store
            .read_lead(lead_id)?
            .ok_or(CompsError::NotFound(lead_id))
    }

    fn cached_result(&self, lead_id: i64, now: DateTime<Utc>) -> Result<AggregateResult, CompsError> {
        let Snapshot {
            meta,
            search_radius,
            comparables,
        } = self.store.load_snapshot(lead_id)?;

        let expired = meta
            .fetched_at
            .is_some_and(|ts| now.timestamp() - ts >= self.freshness_window.num_seconds());

        let summary = summarize(&comparables);
        let mut result =
            AggregateResult::new(comparables, summary, search_radius, meta.fetched_at, meta.excluded);
        result.cached = true;
        result.stale = expired;
        Ok(result)
    }

    fn resolve_search(&self, request: &RefreshRequest) -> Result<SearchDefaults, CompsError> {
        let radius_miles = request.radius_miles.unwrap_or(self.defaults.radius_miles);
        if !radius_miles.is_finite() || radius_miles <= 0.0 || radius_miles > MAX_RADIUS_MILES {
            return Err(CompsError::InvalidInput(format!(
                "radius must be within (0, {MAX_RADIUS_MILES}] miles, got {radius_miles}"
            )));
        }

        let max_results = request.max_results.unwrap_or(self.defaults.max_results);
        if !(1..=MAX_RESULTS_LIMIT).contains(&max_results) {
            return Err(CompsError::InvalidInput(format!(
                "max results must be within 1..={MAX_RESULTS_LIMIT}, got {max_results}"
            )));
        }

        let max_age_months = request.max_age_months.unwrap_or(self.defaults.max_age_months);
        if !(1..=MAX_AGE_MONTHS_LIMIT).contains(&max_age_months) {
            return Err(CompsError::InvalidInput(format!(
                "max age must be within 1..={MAX_AGE_MONTHS_LIMIT} months, got {max_age_months}"
            )));
        }

        Ok(SearchDefaults {
            radius_miles,
            max_results,
            max_age_months,
        })
    }
}

#[cfg(test)]
impl<S, P> ComparablesService<S, P> {
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_estimator(mut self, estimator: RentalEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn store(&self) -> &P {
        &self.store
    }
}

fn validate_lead(lead: &Lead) -> Result<(), CompsError> {
    if lead.postcode.trim().is_empty() {
        return Err(CompsError::InvalidInput(format!("lead {} has no postcode", lead.id)));
    }
    if lead.asking_price <= 0 {
        return Err(CompsError::InvalidInput(format!(
            "lead {} has no asking price",
            lead.id
        )));
    }
    Ok(())
}

/// Normalizes and scores a raw batch, highest confidence first.
/// Returns the scored set and how many records were rejected.
fn score_batch(
    lead: &Lead,
    raw: &[crate::gateway::RawComparable],
    now: DateTime<Utc>,
    fetched_at: i64,
) -> (Vec<ComparableSale>, usize) {
    let today = now.date_naive();
    let mut rejected = 0;
    let mut scored = Vec::with_capacity(raw.len());

    for record in raw {
        match ComparableSale::from_raw(record, fetched_at) {
            Ok(mut sale) => {
                sale.confidence_score = score_comparable(lead, &sale, today);
                scored.push(sale);
            }
            Err(reason) => {
                debug!(lead_id = lead.id, reason = %reason, "Skipping comparable");
                rejected += 1;
            }
        }
    }

    scored.sort_by(|a, b| b.confidence_score.total_cmp(&a.confidence_score));
    (scored, rejected)
}
