// src/domain/aggregate.rs

use crate::domain::comparable::ComparableSale;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Confidence classification shared by aggregates and rental estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "HIGH",
            Confidence::Medium => "MEDIUM",
            Confidence::Low => "LOW",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HIGH" => Ok(Confidence::High),
            "MEDIUM" => Ok(Confidence::Medium),
            "LOW" => Ok(Confidence::Low),
            other => Err(format!("unknown confidence level: {other}")),
        }
    }
}

/// One row of the overall-confidence rule table.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceRule {
    pub min_count: usize,
    pub min_mean_score: f64,
    pub level: Confidence,
}

/// Evaluated top to bottom; the first satisfied rule wins, LOW otherwise.
pub const CONFIDENCE_RULES: &[ConfidenceRule] = &[
    ConfidenceRule {
        min_count: 5,
        min_mean_score: 0.8,
        level: Confidence::High,
    },
    ConfidenceRule {
        min_count: 3,
        min_mean_score: 0.6,
        level: Confidence::Medium,
    },
];

// Absorbs float noise from summing scores, e.g. five 0.8s.
const SCORE_EPSILON: f64 = 1e-9;

pub fn classify_confidence(rules: &[ConfidenceRule], count: usize, mean_score: f64) -> Confidence {
    rules
        .iter()
        .find(|rule| count >= rule.min_count && mean_score + SCORE_EPSILON >= rule.min_mean_score)
        .map(|rule| rule.level)
        .unwrap_or(Confidence::Low)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Range<T> {
    pub min: T,
    pub max: T,
}

/// Summary statistics over a scored comparable set.
/// Every numeric field is `None` when there is nothing to summarize.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparablesSummary {
    pub count: usize,
    pub avg_price: Option<i64>,
    pub price_range: Option<Range<i64>>,
    pub avg_rental_yield: Option<f64>,
    pub rental_yield_range: Option<Range<f64>>,
    pub avg_monthly_rent: Option<i64>,
    pub mean_score: Option<f64>,
    pub confidence: Confidence,
}

pub fn summarize(comps: &[ComparableSale]) -> ComparablesSummary {
    if comps.is_empty() {
        return ComparablesSummary {
            count: 0,
            avg_price: None,
            price_range: None,
            avg_rental_yield: None,
            rental_yield_range: None,
            avg_monthly_rent: None,
            mean_score: None,
            confidence: Confidence::Low,
        };
    }

    let prices: Vec<f64> = comps.iter().map(|c| c.sale_price as f64).collect();
    let yields: Vec<f64> = comps.iter().filter_map(|c| c.rental_yield).collect();
    let rents: Vec<f64> = comps
        .iter()
        .filter_map(|c| c.monthly_rent_estimate())
        .map(|r| r as f64)
        .collect();
    let scores: Vec<f64> = comps.iter().map(|c| c.confidence_score).collect();

    let mean_score = mean(&scores);

    ComparablesSummary {
        count: comps.len(),
        avg_price: mean(&prices).map(|p| p.round() as i64),
        price_range: range(&prices).map(|r| Range {
            min: r.min as i64,
            max: r.max as i64,
        }),
        avg_rental_yield: mean(&yields).map(round2),
        rental_yield_range: range(&yields),
        avg_monthly_rent: mean(&rents).map(|r| r.round() as i64),
        mean_score,
        confidence: classify_confidence(CONFIDENCE_RULES, comps.len(), mean_score.unwrap_or(0.0)),
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn range(values: &[f64]) -> Option<Range<f64>> {
    let mut iter = values.iter().copied();
    let first = iter.next()?;
    Some(iter.fold(Range { min: first, max: first }, |acc, v| Range {
        min: acc.min.min(v),
        max: acc.max.max(v),
    }))
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
