// src/db/comparables.rs
use rusqlite::{params, Connection, Row, TransactionBehavior};

use crate::domain::aggregate::ComparablesSummary;
use crate::domain::comparable::ComparableSale;
use crate::domain::lead::Snapshot;
use crate::errors::CompsError;

use super::leads::{read_snapshot_meta, write_lead_summary};

/// Replaces a lead's comparable set: the old rows are deleted and the new set inserted in
/// a single transaction, together with the fetch metadata and the lead's summary columns.
/// Concurrent readers see either the complete old set or the complete new one.
pub fn replace_comparables(
    conn: &mut Connection,
    lead_id: i64,
    comparables: &[ComparableSale],
    summary: &ComparablesSummary,
    fetched_at: i64,
    search_radius: f64,
    excluded: usize,
) -> Result<(), CompsError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let updated = tx.execute(
        r#"
        UPDATE leads SET
            comparables_fetched_at = ?1,
            search_radius = ?2,
            comparables_excluded = ?3
        WHERE id = ?4
        "#,
        params![fetched_at, search_radius, excluded as i64, lead_id],
    )?;
    if updated == 0 {
        // dropping `tx` rolls back
        return Err(CompsError::NotFound(lead_id));
    }

    tx.execute(
        "DELETE FROM comparable_sales WHERE lead_id = ?1",
        params![lead_id],
    )?;

    {
        let mut stmt = tx.prepare(
            r#"
            INSERT INTO comparable_sales (
                lead_id, address, postcode, sale_price, sale_date, bedrooms, bathrooms,
                property_type, floor_area, distance_miles, days_on_market, price_reductions,
                monthly_rent, weekly_rent, rental_yield, rental_yield_min, rental_yield_max,
                area_avg_rent, listing_source, listing_url, confidence_score, fetched_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                      ?17, ?18, ?19, ?20, ?21, ?22)
            "#,
        )?;

        for comp in comparables {
            stmt.execute(params![
                lead_id,
                &comp.address,
                &comp.postcode,
                comp.sale_price,
                comp.sale_date,
                comp.bedrooms,
                comp.bathrooms,
                &comp.property_type,
                comp.floor_area,
                comp.distance_miles,
                comp.days_on_market,
                comp.price_reductions,
                comp.monthly_rent,
                comp.weekly_rent,
                comp.rental_yield,
                comp.rental_yield_min,
                comp.rental_yield_max,
                comp.area_avg_rent,
                &comp.listing_source,
                &comp.listing_url,
                comp.confidence_score,
                comp.fetched_at,
            ])?;
        }
    }

    write_lead_summary(&tx, lead_id, summary)?;

    tx.commit()
        .map_err(|e| CompsError::DbError(format!("commit comparables failed: {e}")))
}

/// Reads the snapshot metadata and rows inside one read transaction.
/// `None` when the lead doesn't exist.
pub fn load_snapshot(conn: &mut Connection, lead_id: i64) -> Result<Option<Snapshot>, CompsError> {
    let tx = conn.transaction()?;

    let Some(meta) = read_snapshot_meta(&tx, lead_id)? else {
        return Ok(None);
    };

    let search_radius: Option<f64> = tx.query_row(
        "SELECT search_radius FROM leads WHERE id = ?1",
        params![lead_id],
        |row| row.get(0),
    )?;

    let comparables = {
        let mut stmt = tx.prepare(
            r#"
            SELECT
                address, postcode, sale_price, sale_date, bedrooms, bathrooms, property_type,
                floor_area, distance_miles, days_on_market, price_reductions, monthly_rent,
                weekly_rent, rental_yield, rental_yield_min, rental_yield_max, area_avg_rent,
                listing_source, listing_url, confidence_score, fetched_at
            FROM comparable_sales
            WHERE lead_id = ?1
            ORDER BY id ASC
            "#,
        )?;
        let rows = stmt.query_map(params![lead_id], comparable_from_row)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        out
    };

    tx.commit()?;

    Ok(Some(Snapshot {
        meta,
        search_radius,
        comparables,
    }))
}

fn comparable_from_row(row: &Row<'_>) -> rusqlite::Result<ComparableSale> {
    Ok(ComparableSale {
        address: row.get("address")?,
        postcode: row.get("postcode")?,
        sale_price: row.get("sale_price")?,
        sale_date: row.get("sale_date")?,
        bedrooms: row.get("bedrooms")?,
        bathrooms: row.get("bathrooms")?,
        property_type: row.get("property_type")?,
        floor_area: row.get("floor_area")?,
        distance_miles: row.get("distance_miles")?,
        days_on_market: row.get("days_on_market")?,
        price_reductions: row.get("price_reductions")?,
        monthly_rent: row.get("monthly_rent")?,
        weekly_rent: row.get("weekly_rent")?,
        rental_yield: row.get("rental_yield")?,
        rental_yield_min: row.get("rental_yield_min")?,
        rental_yield_max: row.get("rental_yield_max")?,
        area_avg_rent: row.get("area_avg_rent")?,
        listing_source: row.get("listing_source")?,
        listing_url: row.get("listing_url")?,
        confidence_score: row.get("confidence_score")?,
        fetched_at: row.get("fetched_at")?,
    })
}
