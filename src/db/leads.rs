// src/db/leads.rs
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::domain::aggregate::{ComparablesSummary, Confidence};
use crate::domain::lead::{Lead, NewLead, SnapshotMeta};
use crate::domain::rental::{RentalEstimate, RentalSource};
use crate::errors::CompsError;

pub fn insert_lead(conn: &Connection, lead: &NewLead, now: i64) -> Result<i64, CompsError> {
    conn.execute(
        r#"
        INSERT INTO leads (postcode, bedrooms, property_type, asking_price, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![
            lead.postcode.trim(),
            lead.bedrooms,
            lead.property_type,
            lead.asking_price,
            now
        ],
    )
    .map_err(|e| CompsError::DbError(format!("insert lead failed: {e}")))?;
    Ok(conn.last_insert_rowid())
}

pub fn get_lead(conn: &Connection, lead_id: i64) -> Result<Option<Lead>, CompsError> {
    conn.query_row(
        r#"
        SELECT
            id, postcode, bedrooms, property_type, asking_price, search_radius,
            estimated_monthly_rent, estimated_annual_rent, estimated_yield,
            rental_confidence, rental_source, estimated_floor_area
        FROM leads
        WHERE id = ?1
        "#,
        params![lead_id],
        lead_from_row,
    )
    .optional()
    .map_err(|e| CompsError::DbError(format!("select lead failed: {e}")))
}

fn lead_from_row(row: &Row<'_>) -> rusqlite::Result<Lead> {
    let monthly: Option<i64> = row.get("estimated_monthly_rent")?;
    let annual: Option<i64> = row.get("estimated_annual_rent")?;
    let estimated_yield: Option<f64> = row.get("estimated_yield")?;
    let confidence: Option<String> = row.get("rental_confidence")?;
    let source: Option<String> = row.get("rental_source")?;

    // All rental fields are written together; a partial row reads as no estimate.
    let rental_estimate = match (monthly, annual, estimated_yield, confidence) {
        (Some(monthly_rent), Some(annual_rent), Some(estimated_yield), Some(confidence)) => {
            Some(RentalEstimate {
                monthly_rent,
                annual_rent,
                estimated_yield,
                confidence: confidence.parse().unwrap_or(Confidence::Low),
                source: match source.as_deref() {
                    Some("comparables") => RentalSource::Comparables,
                    _ => RentalSource::Heuristic,
                },
            })
        }
        _ => None,
    };

    Ok(Lead {
        id: row.get("id")?,
        postcode: row.get("postcode")?,
        bedrooms: row.get("bedrooms")?,
        property_type: row.get("property_type")?,
        asking_price: row.get("asking_price")?,
        search_radius: row.get("search_radius")?,
        rental_estimate,
        estimated_floor_area: row.get("estimated_floor_area")?,
    })
}

/// Snapshot metadata; `None` when the lead doesn't exist.
pub fn read_snapshot_meta(conn: &Connection, lead_id: i64) -> Result<Option<SnapshotMeta>, CompsError> {
    conn.query_row(
        r#"
        SELECT
            l.comparables_fetched_at,
            l.comparables_excluded,
            (SELECT COUNT(*) FROM comparable_sales c WHERE c.lead_id = l.id) AS n
        FROM leads l
        WHERE l.id = ?1
        "#,
        params![lead_id],
        |row| {
            Ok(SnapshotMeta {
                fetched_at: row.get(0)?,
                excluded: row.get::<_, i64>(1)?.max(0) as usize,
                count: row.get::<_, i64>(2)?.max(0) as usize,
            })
        },
    )
    .optional()
    .map_err(|e| CompsError::DbError(format!("select snapshot meta failed: {e}")))
}

/// Writes the comparables summary fields. These are rewritten on every refresh.
pub fn write_lead_summary(
    conn: &Connection,
    lead_id: i64,
    summary: &ComparablesSummary,
) -> Result<(), CompsError> {
    let updated = conn.execute(
        r#"
        UPDATE leads SET
            comparables_count = ?1,
            comparables_avg_price = ?2,
            comparables_price_min = ?3,
            comparables_price_max = ?4,
            comparables_avg_yield = ?5,
            comparables_yield_min = ?6,
            comparables_yield_max = ?7,
            comparables_avg_rent = ?8,
            comparables_confidence = ?9
        WHERE id = ?10
        "#,
        params![
            summary.count as i64,
            summary.avg_price,
            summary.price_range.map(|r| r.min),
            summary.price_range.map(|r| r.max),
            summary.avg_rental_yield,
            summary.rental_yield_range.map(|r| r.min),
            summary.rental_yield_range.map(|r| r.max),
            summary.avg_monthly_rent,
            summary.confidence.as_str(),
            lead_id,
        ],
    )?;

    if updated == 0 {
        return Err(CompsError::NotFound(lead_id));
    }
    Ok(())
}

pub fn write_rental_estimate(
    conn: &Connection,
    lead_id: i64,
    estimate: &RentalEstimate,
    floor_area: Option<i64>,
) -> Result<(), CompsError> {
    let updated = conn.execute(
        r#"
        UPDATE leads SET
            estimated_monthly_rent = ?1,
            estimated_annual_rent = ?2,
            estimated_yield = ?3,
            rental_confidence = ?4,
            rental_source = ?5,
            estimated_floor_area = COALESCE(?6, estimated_floor_area)
        WHERE id = ?7
        "#,
        params![
            estimate.monthly_rent,
            estimate.annual_rent,
            estimate.estimated_yield,
            estimate.confidence.as_str(),
            estimate.source.as_str(),
            floor_area,
            lead_id,
        ],
    )?;

    if updated == 0 {
        return Err(CompsError::NotFound(lead_id));
    }
    Ok(())
}
