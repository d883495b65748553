use crate::domain::aggregate::{ComparablesSummary, Confidence, Range};
use crate::domain::comparable::ComparableSale;
use crate::domain::rental::RentalEstimate;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Caller options for a refresh; `None` fields fall back to the configured defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RefreshRequest {
    pub force_refresh: bool,
    pub radius_miles: Option<f64>,
    pub max_results: Option<u32>,
    pub max_age_months: Option<u32>,
}

/// A stored comparable plus display-only derived fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparableView {
    #[serde(flatten)]
    pub sale: ComparableSale,
    pub price_per_sqft: Option<i64>,
}

impl From<ComparableSale> for ComparableView {
    fn from(sale: ComparableSale) -> Self {
        let price_per_sqft = sale.price_per_sqft();
        Self {
            sale,
            price_per_sqft,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub comparables: Vec<ComparableView>,
    pub count: usize,
    pub avg_price: Option<i64>,
    pub avg_rental_yield: Option<f64>,
    pub price_range: Option<Range<i64>>,
    pub rental_yield_range: Option<Range<f64>>,
    pub avg_monthly_rent: Option<i64>,
    pub confidence: Confidence,
    pub search_radius: Option<f64>,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub credits_used: u32,
    /// Source records dropped as malformed during the last successful fetch.
    pub excluded: usize,
    pub cached: bool,
    pub stale: bool,
}

impl AggregateResult {
    pub(crate) fn new(
        comparables: Vec<ComparableSale>,
        summary: ComparablesSummary,
        search_radius: Option<f64>,
        fetched_at: Option<i64>,
        excluded: usize,
    ) -> Self {
        Self {
            comparables: comparables.into_iter().map(ComparableView::from).collect(),
            count: summary.count,
            avg_price: summary.avg_price,
            avg_rental_yield: summary.avg_rental_yield,
            price_range: summary.price_range,
            rental_yield_range: summary.rental_yield_range,
            avg_monthly_rent: summary.avg_monthly_rent,
            confidence: summary.confidence,
            search_radius,
            last_fetched_at: fetched_at.and_then(|ts| DateTime::from_timestamp(ts, 0)),
            credits_used: 0,
            excluded,
            cached: false,
            stale: false,
        }
    }

    /// True when the search succeeded but matched nothing.
    pub fn is_no_data(&self) -> bool {
        self.count == 0
    }
}

/// Rental figures written back to a lead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LeadRental {
    pub estimate: RentalEstimate,
    pub floor_area: Option<i64>,
    /// Monthly rent per square foot, 0 when the floor area is unknown or not positive.
    pub rent_per_sqft: f64,
}
