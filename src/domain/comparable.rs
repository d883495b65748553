// src/domain/comparable.rs

use crate::gateway::RawComparable;
use chrono::{DateTime, NaiveDate};
use serde::Serialize;

/// A recently sold property, flattened and validated, owned by exactly one lead.
/// This acts as an anti-corruption layer between the raw source payload and our tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparableSale {
    pub address: String,
    pub postcode: Option<String>,
    pub sale_price: i64,
    pub sale_date: NaiveDate,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub property_type: Option<String>,
    /// Square feet.
    pub floor_area: Option<f64>,
    /// Miles from the subject property.
    pub distance_miles: Option<f64>,
    pub days_on_market: Option<i64>,
    pub price_reductions: Option<i64>,
    pub monthly_rent: Option<i64>,
    pub weekly_rent: Option<i64>,
    pub rental_yield: Option<f64>,
    pub rental_yield_min: Option<f64>,
    pub rental_yield_max: Option<f64>,
    pub area_avg_rent: Option<i64>,
    pub listing_source: Option<String>,
    pub listing_url: Option<String>,
    /// Always within [0, 1].
    pub confidence_score: f64,
    /// Unix seconds.
    pub fetched_at: i64,
}

impl ComparableSale {
    /// Creates a clean, unscored `ComparableSale` from a raw source record.
    /// Records without a usable sale price or sale date are rejected.
    pub fn from_raw(raw: &RawComparable, fetched_at: i64) -> Result<Self, String> {
        let sale_price = raw
            .price
            .filter(|p| *p > 0)
            .ok_or("Missing or non-positive sale price")?;

        let date_str = raw
            .date
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or("Missing sale date")?;
        let sale_date =
            parse_sale_date(date_str).ok_or_else(|| format!("Unparseable sale date: {date_str}"))?;

        let non_empty = |s: &Option<String>| {
            s.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Ok(ComparableSale {
            address: non_empty(&raw.address).unwrap_or_else(|| "unknown".to_string()),
            postcode: non_empty(&raw.postcode),
            sale_price,
            sale_date,
            bedrooms: raw.bedrooms,
            bathrooms: raw.bathrooms,
            property_type: non_empty(&raw.property_type),
            floor_area: raw.sqft.filter(|a| a.is_finite()),
            distance_miles: raw.distance.filter(|d| d.is_finite() && *d >= 0.0),
            days_on_market: raw.days_on_market,
            price_reductions: raw.price_reductions,
            monthly_rent: raw.rent_pcm,
            weekly_rent: raw.rent_pw,
            rental_yield: raw.rental_yield.filter(|y| y.is_finite()),
            rental_yield_min: raw.yield_min.filter(|y| y.is_finite()),
            rental_yield_max: raw.yield_max.filter(|y| y.is_finite()),
            area_avg_rent: raw.area_avg_rent,
            listing_source: non_empty(&raw.source),
            listing_url: non_empty(&raw.url),
            confidence_score: 0.0,
            fetched_at,
        })
    }

    /// Price per square foot for display; `None` without a positive floor area.
    pub fn price_per_sqft(&self) -> Option<i64> {
        self.floor_area
            .filter(|a| *a > 0.0)
            .map(|a| (self.sale_price as f64 / a).round() as i64)
    }

    /// Monthly rent, derived from the weekly figure when only that is known.
    pub fn monthly_rent_estimate(&self) -> Option<i64> {
        self.monthly_rent
            .or_else(|| self.weekly_rent.map(|w| (w as f64 * 52.0 / 12.0).round() as i64))
    }
}

/// Accepts plain ISO dates, RFC 3339 timestamps and `YYYY-MM-DD HH:MM:SS`.
fn parse_sale_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawComparable {
        RawComparable {
            address: Some("12 High Street".to_string()),
            postcode: Some("M1 1AE".to_string()),
            price: Some(250_000),
            date: Some("2024-03-15".to_string()),
            bedrooms: Some(2),
            property_type: Some("Flat".to_string()),
            sqft: Some(800.0),
            distance: Some(0.4),
            ..Default::default()
        }
    }

    #[test]
    fn normalizes_a_complete_record() {
        let sale = ComparableSale::from_raw(&raw(), 1_700_000_000).unwrap();
        assert_eq!(sale.address, "12 High Street");
        assert_eq!(sale.sale_date, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        assert_eq!(sale.sale_price, 250_000);
        assert_eq!(sale.fetched_at, 1_700_000_000);
        assert_eq!(sale.price_per_sqft(), Some(313));
    }

    #[test]
    fn rejects_bad_price_and_date() {
        let mut no_price = raw();
        no_price.price = Some(0);
        assert!(ComparableSale::from_raw(&no_price, 0).is_err());

        let mut bad_date = raw();
        bad_date.date = Some("15/03/2024".to_string());
        assert!(ComparableSale::from_raw(&bad_date, 0).is_err());

        let mut no_date = raw();
        no_date.date = None;
        assert!(ComparableSale::from_raw(&no_date, 0).is_err());
    }

    #[test]
    fn accepts_timestamp_dates() {
        let mut timestamped = raw();
        timestamped.date = Some("2024-03-15T10:00:00Z".to_string());
        let sale = ComparableSale::from_raw(&timestamped, 0).unwrap();
        assert_eq!(sale.sale_date, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
    }

    #[test]
    fn missing_optional_fields_stay_absent() {
        let mut sparse = raw();
        sparse.address = None;
        sparse.sqft = Some(0.0);
        sparse.distance = None;
        let sale = ComparableSale::from_raw(&sparse, 0).unwrap();
        assert_eq!(sale.address, "unknown");
        assert_eq!(sale.price_per_sqft(), None);
        assert_eq!(sale.distance_miles, None);
    }

    #[test]
    fn weekly_rent_converts_to_monthly() {
        let mut weekly = raw();
        weekly.rent_pw = Some(300);
        let sale = ComparableSale::from_raw(&weekly, 0).unwrap();
        assert_eq!(sale.monthly_rent_estimate(), Some(1300));
    }
}
