use serde::{Deserialize, Serialize};
use serde_json::Value;

// response
//  ├── status            "success" | "error"
//  ├── message           error detail
//  ├── credits_used
//  └── data[]
//       ├── address, postcode
//       ├── price, date
//       ├── bedrooms, bathrooms, type, sqft
//       ├── distance
//       ├── days_on_market, price_reductions
//       ├── rent_pcm, rent_pw, yield, yield_min, yield_max, area_avg_rent
//       └── source, url

/// Search parameters sent to the comparable source.
#[derive(Debug, Clone, PartialEq)]
pub struct CompsQuery {
    pub postcode: String,
    pub bedrooms: Option<u32>,
    pub property_type: Option<String>,
    pub radius_miles: f64,
    pub max_results: u32,
    pub max_age_months: u32,
}

/// One comparable exactly as the source reports it. Every field is optional;
/// validation happens when it is converted to a `ComparableSale`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RawComparable {
    pub address: Option<String>,
    pub postcode: Option<String>,
    pub price: Option<i64>,
    pub date: Option<String>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    #[serde(rename = "type")]
    pub property_type: Option<String>,
    pub sqft: Option<f64>,
    pub distance: Option<f64>,
    pub days_on_market: Option<i64>,
    pub price_reductions: Option<i64>,
    pub rent_pcm: Option<i64>,
    pub rent_pw: Option<i64>,
    #[serde(rename = "yield")]
    pub rental_yield: Option<f64>,
    pub yield_min: Option<f64>,
    pub yield_max: Option<f64>,
    pub area_avg_rent: Option<i64>,
    pub source: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SourceResponse {
    pub status: Option<String>,
    pub message: Option<String>,
    pub credits_used: Option<u32>,
    #[serde(default)]
    pub data: Vec<Value>,
}

/// A page of raw comparables plus the API credits it cost.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedComparables {
    pub comparables: Vec<RawComparable>,
    /// Records whose JSON shape couldn't be read at all.
    pub malformed: usize,
    pub credits_used: u32,
}
