mod client;
mod gateway_error;
mod models;

pub use client::HttpComparableSource;
pub use gateway_error::GatewayError;
pub use models::{CompsQuery, FetchedComparables, RawComparable};

/// Outbound contract to the third-party comparable-sales source.
pub trait ComparableSource: Send + Sync {
    fn fetch(&self, query: &CompsQuery) -> Result<FetchedComparables, GatewayError>;
}
