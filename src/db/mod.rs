pub mod comparables;
pub mod connection;
pub mod leads;

use crate::domain::aggregate::ComparablesSummary;
use crate::domain::comparable::ComparableSale;
use crate::domain::lead::{Lead, NewLead, Snapshot, SnapshotMeta};
use crate::domain::rental::RentalEstimate;
use crate::errors::CompsError;
use connection::Database;

/// Narrow storage contract consumed by the comparables coordinator.
///
/// `replace_comparables` writes the rows, the fetch metadata and the lead summary as one
/// unit, atomic with respect to `load_snapshot`: a reader sees either the complete
/// previous set or the complete new one.
pub trait PersistenceAdapter: Send + Sync {
    fn read_lead(&self, lead_id: i64) -> Result<Option<Lead>, CompsError>;

    fn read_snapshot_meta(&self, lead_id: i64) -> Result<SnapshotMeta, CompsError>;

    fn load_snapshot(&self, lead_id: i64) -> Result<Snapshot, CompsError>;

    fn replace_comparables(
        &self,
        lead_id: i64,
        comparables: &[ComparableSale],
        summary: &ComparablesSummary,
        fetched_at: i64,
        search_radius: f64,
        excluded: usize,
    ) -> Result<(), CompsError>;

    fn write_rental_estimate(
        &self,
        lead_id: i64,
        estimate: &RentalEstimate,
        floor_area: Option<i64>,
    ) -> Result<(), CompsError>;
}

/// SQLite-backed persistence.
#[derive(Clone, Debug)]
pub struct SqlitePersistence {
    db: Database,
}

impl SqlitePersistence {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn insert_lead(&self, lead: &NewLead, now: i64) -> Result<i64, CompsError> {
        lead.validate().map_err(CompsError::InvalidInput)?;
        self.db.with_conn(|conn| leads::insert_lead(conn, lead, now))
    }
}

impl PersistenceAdapter for SqlitePersistence {
    fn read_lead(&self, lead_id: i64) -> Result<Option<Lead>, CompsError> {
        self.db.with_conn(|conn| leads::get_lead(conn, lead_id))
    }

    fn read_snapshot_meta(&self, lead_id: i64) -> Result<SnapshotMeta, CompsError> {
        self.db
            .with_conn(|conn| leads::read_snapshot_meta(conn, lead_id))?
            .ok_or(CompsError::NotFound(lead_id))
    }

    fn load_snapshot(&self, lead_id: i64) -> Result<Snapshot, CompsError> {
        self.db
            .with_conn(|conn| comparables::load_snapshot(conn, lead_id))?
            .ok_or(CompsError::NotFound(lead_id))
    }

    fn replace_comparables(
        &self,
        lead_id: i64,
        comps: &[ComparableSale],
        summary: &ComparablesSummary,
        fetched_at: i64,
        search_radius: f64,
        excluded: usize,
    ) -> Result<(), CompsError> {
        self.db.with_conn(|conn| {
            comparables::replace_comparables(
                conn,
                lead_id,
                comps,
                summary,
                fetched_at,
                search_radius,
                excluded,
            )
        })
    }

    fn write_rental_estimate(
        &self,
        lead_id: i64,
        estimate: &RentalEstimate,
        floor_area: Option<i64>,
    ) -> Result<(), CompsError> {
        self.db
            .with_conn(|conn| leads::write_rental_estimate(conn, lead_id, estimate, floor_area))
    }
}
