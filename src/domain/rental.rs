// src/domain/rental.rs

//! Rule-based fallback for monthly rent and floor area when comparables carry no rent.
//!
//! The yield estimate runs through an ordered list of named stages, each a pure function
//! over a `YieldState`. Later stages may override earlier ones:
//! the postcode bucket replaces the property-type yield, and an unknown bedroom count
//! forces LOW confidence whatever came before.

use crate::domain::aggregate::{round2, Confidence};
use crate::domain::property_type;
use serde::Serialize;
use tracing::debug;

/// Where a rental estimate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RentalSource {
    Heuristic,
    Comparables,
}

impl RentalSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RentalSource::Heuristic => "heuristic",
            RentalSource::Comparables => "comparables",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RentalEstimate {
    pub monthly_rent: i64,
    pub annual_rent: i64,
    /// Percent of the asking price.
    pub estimated_yield: f64,
    pub confidence: Confidence,
    pub source: RentalSource,
}

#[derive(Debug, Clone, Copy)]
pub struct RentalInputs<'a> {
    pub asking_price: i64,
    pub property_type: Option<&'a str>,
    pub bedrooms: Option<u32>,
    pub postcode: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YieldState {
    pub yield_pct: f64,
    pub confidence: Confidence,
}

/// A keyword rule; the first rule with a keyword contained in the property type applies.
#[derive(Debug, Clone, Copy)]
pub struct TypeRule {
    pub keywords: &'static [&'static str],
    pub value: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct PostcodeBucket {
    pub name: &'static str,
    pub prefixes: &'static [&'static str],
    pub yield_pct: f64,
    pub confidence: Confidence,
}

/// Lookup tables driving the estimator, injectable for tests and other regions.
#[derive(Debug, Clone, Copy)]
pub struct RentalTables {
    pub base_yield: f64,
    pub type_yields: &'static [TypeRule],
    pub postcode_buckets: &'static [PostcodeBucket],
    /// Applied when a postcode is given but no bucket matches.
    pub default_bucket: PostcodeBucket,
    pub bedroom_base_sizes: &'static [(u32, i64)],
    pub sqft_per_bedroom_fallback: i64,
    pub type_area_factors: &'static [TypeRule],
}

const UK_TYPE_YIELDS: &[TypeRule] = &[
    TypeRule {
        keywords: &["flat", "apartment"],
        value: 6.5,
    },
    TypeRule {
        keywords: &["detached"],
        value: 5.0,
    },
    TypeRule {
        keywords: &["terraced"],
        value: 6.5,
    },
    TypeRule {
        keywords: &["semi"],
        value: 5.5,
    },
];

const UK_POSTCODE_BUCKETS: &[PostcodeBucket] = &[
    PostcodeBucket {
        name: "inner_city",
        prefixes: &[
            "EC", "WC", "SW1", "SW3", "SW5", "SW7", "SW10", "W1", "W2", "W8", "W11", "NW1",
            "NW3", "NW8", "SE1", "E1", "N1",
        ],
        yield_pct: 4.0,
        confidence: Confidence::Medium,
    },
    PostcodeBucket {
        name: "regional_city",
        prefixes: &[
            "M", "B", "L", "LS", "S", "BS", "NE", "NG", "G", "EH", "CF", "SO", "PO",
        ],
        yield_pct: 6.0,
        confidence: Confidence::Medium,
    },
];

const UK_BEDROOM_BASE_SIZES: &[(u32, i64)] = &[(1, 500), (2, 750), (3, 1000), (4, 1400), (5, 1800)];

const UK_TYPE_AREA_FACTORS: &[TypeRule] = &[
    TypeRule {
        keywords: &["flat", "apartment"],
        value: 0.8,
    },
    TypeRule {
        keywords: &["detached"],
        value: 1.3,
    },
    TypeRule {
        keywords: &["semi"],
        value: 1.1,
    },
    TypeRule {
        keywords: &["terraced"],
        value: 0.9,
    },
];

impl RentalTables {
    pub const UK: RentalTables = RentalTables {
        base_yield: 6.0,
        type_yields: UK_TYPE_YIELDS,
        postcode_buckets: UK_POSTCODE_BUCKETS,
        default_bucket: PostcodeBucket {
            name: "other",
            prefixes: &[],
            yield_pct: 6.5,
            confidence: Confidence::Medium,
        },
        bedroom_base_sizes: UK_BEDROOM_BASE_SIZES,
        sqft_per_bedroom_fallback: 400,
        type_area_factors: UK_TYPE_AREA_FACTORS,
    };

    /// The bucket a postcode falls into, `None` when no postcode is given.
    pub fn postcode_bucket(&self, postcode: &str) -> Option<&PostcodeBucket> {
        let outward = outward_code(postcode)?;
        Some(
            self.postcode_buckets
                .iter()
                .find(|bucket| bucket.prefixes.iter().any(|p| prefix_matches(&outward, p)))
                .unwrap_or(&self.default_bucket),
        )
    }
}

impl Default for RentalTables {
    fn default() -> Self {
        Self::UK
    }
}

/// A named step in the yield pipeline.
pub struct Stage {
    pub name: &'static str,
    pub apply: fn(&RentalTables, &RentalInputs<'_>, YieldState) -> YieldState,
}

/// Stages in evaluation order.
pub const RENTAL_STAGES: &[Stage] = &[
    Stage {
        name: "property_type",
        apply: property_type_stage,
    },
    Stage {
        name: "postcode_bucket",
        apply: postcode_stage,
    },
    Stage {
        name: "bedrooms",
        apply: bedroom_stage,
    },
];

fn property_type_stage(tables: &RentalTables, inputs: &RentalInputs<'_>, state: YieldState) -> YieldState {
    match inputs.property_type.and_then(|t| lookup_type_rule(tables.type_yields, t)) {
        Some(yield_pct) => YieldState { yield_pct, ..state },
        None => state,
    }
}

fn postcode_stage(tables: &RentalTables, inputs: &RentalInputs<'_>, state: YieldState) -> YieldState {
    match inputs.postcode.and_then(|p| tables.postcode_bucket(p)) {
        Some(bucket) => {
            debug!(bucket = bucket.name, yield_pct = bucket.yield_pct, "Matched postcode bucket");
            YieldState {
                yield_pct: bucket.yield_pct,
                confidence: bucket.confidence,
            }
        }
        None => state,
    }
}

fn bedroom_stage(_tables: &RentalTables, inputs: &RentalInputs<'_>, state: YieldState) -> YieldState {
    match inputs.bedrooms {
        None => YieldState {
            confidence: Confidence::Low,
            ..state
        },
        Some(1) => YieldState {
            yield_pct: state.yield_pct + 0.5,
            confidence: Confidence::High,
        },
        Some(2) => YieldState {
            confidence: Confidence::High,
            ..state
        },
        Some(n) if n >= 4 => YieldState {
            yield_pct: state.yield_pct - 0.5,
            confidence: Confidence::Medium,
        },
        Some(_) => state,
    }
}

fn lookup_type_rule(rules: &[TypeRule], property_type: &str) -> Option<f64> {
    let normalized = property_type::normalize(property_type);
    rules
        .iter()
        .find(|rule| rule.keywords.iter().any(|k| normalized.contains(k)))
        .map(|rule| rule.value)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RentalEstimator {
    tables: RentalTables,
}

impl RentalEstimator {
    #[cfg(test)]
    pub fn new(tables: RentalTables) -> Self {
        Self { tables }
    }

    /// Runs the stage pipeline and returns the final yield state.
    pub fn estimate_yield(&self, inputs: &RentalInputs<'_>) -> YieldState {
        let start = YieldState {
            yield_pct: self.tables.base_yield,
            confidence: Confidence::Medium,
        };
        RENTAL_STAGES.iter().fold(start, |state, stage| {
            let next = (stage.apply)(&self.tables, inputs, state);
            if next != state {
                debug!(
                    stage = stage.name,
                    yield_pct = next.yield_pct,
                    confidence = %next.confidence,
                    "Rental stage adjusted yield"
                );
            }
            next
        })
    }

    /// Callers validate `asking_price > 0` beforehand.
    pub fn estimate_rental(&self, inputs: &RentalInputs<'_>) -> RentalEstimate {
        let state = self.estimate_yield(inputs);
        let annual_rent = (inputs.asking_price as f64 * state.yield_pct / 100.0).round() as i64;
        let monthly_rent = (annual_rent as f64 / 12.0).round() as i64;

        RentalEstimate {
            monthly_rent,
            annual_rent,
            estimated_yield: state.yield_pct,
            confidence: state.confidence,
            source: RentalSource::Heuristic,
        }
    }

    /// Square feet from the bedroom base-size table scaled by a property-type factor.
    pub fn estimate_floor_area(&self, property_type: Option<&str>, bedrooms: Option<u32>) -> Option<i64> {
        let bedrooms = bedrooms?;
        let base = self
            .tables
            .bedroom_base_sizes
            .iter()
            .find(|(beds, _)| *beds == bedrooms)
            .map(|(_, size)| *size)
            .unwrap_or(i64::from(bedrooms) * self.tables.sqft_per_bedroom_fallback);
        let factor = property_type
            .and_then(|t| lookup_type_rule(self.tables.type_area_factors, t))
            .unwrap_or(1.0);

        Some((base as f64 * factor).round() as i64)
    }
}

/// Monthly rent per square foot, 0 when the floor area is not positive.
pub fn rent_per_floor_area(monthly_rent: i64, floor_area: f64) -> f64 {
    if floor_area <= 0.0 {
        return 0.0;
    }
    round2(monthly_rent as f64 / floor_area)
}

/// Uppercased outward code: the part before the space, or everything but the
/// three-character inward code when the postcode is written without one.
pub fn outward_code(postcode: &str) -> Option<String> {
    let upper = postcode.trim().to_ascii_uppercase();
    let outward: String = match upper.split_once(char::is_whitespace) {
        Some((outward, _)) => outward.to_string(),
        None if upper.chars().count() > 4 => {
            let chars: Vec<char> = upper.chars().collect();
            chars[..chars.len() - 3].iter().collect()
        }
        None => upper.clone(),
    };
    let outward: String = outward.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    (!outward.is_empty()).then_some(outward)
}

/// Prefix match at an area/district boundary, so "B" doesn't claim "BS1"
/// and "SW1" doesn't claim "SW19".
pub fn prefix_matches(outward: &str, prefix: &str) -> bool {
    let Some(rest) = outward.strip_prefix(prefix) else {
        return false;
    };
    match (prefix.chars().last(), rest.chars().next()) {
        (_, None) => true,
        (Some(p), Some(n)) if p.is_ascii_alphabetic() => n.is_ascii_digit(),
        (Some(p), Some(n)) if p.is_ascii_digit() => !n.is_ascii_digit(),
        _ => false,
    }
}
