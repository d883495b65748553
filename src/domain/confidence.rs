// src/domain/confidence.rs

//! Scores how trustworthy a single comparable is as a value signal for a lead.
//!
//! The score is the product of five factors, each 1.0 when its inputs are unknown, so any
//! single weak factor drags the whole score down.

use crate::domain::comparable::ComparableSale;
use crate::domain::lead::Lead;
use crate::domain::property_type;
use chrono::NaiveDate;

const DAYS_PER_MONTH: f64 = 365.25 / 12.0;

/// Scores `comp` against `lead` as of `today`. Always within [0, 1].
pub fn score_comparable(lead: &Lead, comp: &ComparableSale, today: NaiveDate) -> f64 {
    let months_since_sale = (today - comp.sale_date).num_days() as f64 / DAYS_PER_MONTH;

    let score = recency_factor(months_since_sale)
        * distance_factor(comp.distance_miles)
        * bedroom_factor(lead.bedrooms, comp.bedrooms)
        * property_type_factor(lead.property_type.as_deref(), comp.property_type.as_deref())
        * completeness_factor(comp);

    score.clamp(0.0, 1.0)
}

pub fn recency_factor(months_since_sale: f64) -> f64 {
    if months_since_sale <= 6.0 {
        1.0
    } else if months_since_sale <= 12.0 {
        0.9
    } else if months_since_sale <= 18.0 {
        0.8
    } else {
        0.7
    }
}

pub fn distance_factor(distance_miles: Option<f64>) -> f64 {
    match distance_miles {
        None => 1.0,
        Some(d) if d <= 0.5 => 1.0,
        Some(d) if d <= 1.0 => 0.95,
        Some(d) if d <= 2.0 => 0.90,
        Some(d) if d <= 3.0 => 0.85,
        Some(_) => 0.70,
    }
}

pub fn bedroom_factor(target: Option<u32>, comp: Option<u32>) -> f64 {
    match (target, comp) {
        (Some(t), Some(c)) => match t.abs_diff(c) {
            0 => 1.0,
            1 => 0.9,
            _ => 0.8,
        },
        _ => 1.0,
    }
}

pub fn property_type_factor(target: Option<&str>, comp: Option<&str>) -> f64 {
    let (Some(target), Some(comp)) = (target, comp) else {
        return 1.0;
    };

    if property_type::matches(target, comp) {
        return 1.0;
    }

    match (property_type::category(target), property_type::category(comp)) {
        (Some(a), Some(b)) if a == b => 0.95,
        _ => 0.85,
    }
}

/// 0.9 baseline, topped up by half a point each for a known distance and floor area.
pub fn completeness_factor(comp: &ComparableSale) -> f64 {
    let mut completeness = 0.0;
    if comp.distance_miles.is_some() {
        completeness += 0.5;
    }
    if comp.floor_area.is_some_and(|a| a > 0.0) {
        completeness += 0.5;
    }
    0.9 + 0.1 * completeness
}
