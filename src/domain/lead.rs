// src/domain/lead.rs

use crate::domain::rental::RentalEstimate;

/// A candidate property being evaluated, as stored in the `leads` table.
#[derive(Debug, Clone, PartialEq)]
pub struct Lead {
    pub id: i64,
    pub postcode: String,
    pub bedrooms: Option<u32>,
    pub property_type: Option<String>,
    pub asking_price: i64,
    /// Radius of the last successful comparables search.
    pub search_radius: Option<f64>,
    pub rental_estimate: Option<RentalEstimate>,
    pub estimated_floor_area: Option<i64>,
}

/// Fields needed to create a lead.
#[derive(Debug, Clone)]
pub struct NewLead {
    pub postcode: String,
    pub bedrooms: Option<u32>,
    pub property_type: Option<String>,
    pub asking_price: i64,
}

impl NewLead {
    pub fn validate(&self) -> Result<(), String> {
        if self.postcode.trim().is_empty() {
            return Err("postcode is required".to_string());
        }
        if self.asking_price <= 0 {
            return Err("asking price must be positive".to_string());
        }
        Ok(())
    }
}

/// Metadata about a lead's stored comparable snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SnapshotMeta {
    pub count: usize,
    /// Unix seconds of the last successful fetch.
    pub fetched_at: Option<i64>,
    /// Raw records rejected during the last successful fetch.
    pub excluded: usize,
}

impl SnapshotMeta {
    /// A snapshot is fresh when it is non-empty and younger than `window`.
    pub fn is_fresh(&self, now: i64, window: chrono::Duration) -> bool {
        match self.fetched_at {
            Some(fetched_at) if self.count > 0 => now - fetched_at < window.num_seconds(),
            _ => false,
        }
    }
}

/// A lead's stored comparable set, read as one consistent unit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub meta: SnapshotMeta,
    pub search_radius: Option<f64>,
    pub comparables: Vec<crate::domain::comparable::ComparableSale>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freshness_requires_rows_and_recent_fetch() {
        let window = chrono::Duration::hours(24);
        let now = 1_700_000_000;

        let fresh = SnapshotMeta {
            count: 3,
            fetched_at: Some(now - 3600),
            excluded: 0,
        };
        assert!(fresh.is_fresh(now, window));

        let empty = SnapshotMeta {
            count: 0,
            ..fresh
        };
        assert!(!empty.is_fresh(now, window));

        let expired = SnapshotMeta {
            fetched_at: Some(now - 24 * 3600),
            ..fresh
        };
        assert!(!expired.is_fresh(now, window));

        assert!(!SnapshotMeta::default().is_fresh(now, window));
    }

    #[test]
    fn new_lead_needs_postcode_and_price() {
        let lead = NewLead {
            postcode: " ".to_string(),
            bedrooms: Some(2),
            property_type: None,
            asking_price: 100_000,
        };
        assert!(lead.validate().is_err());

        let lead = NewLead {
            postcode: "M1 1AE".to_string(),
            asking_price: 0,
            ..lead
        };
        assert!(lead.validate().is_err());
    }
}
