pub mod aggregate;
pub mod comparable;
pub mod confidence;
pub mod lead;
pub mod property_type;
pub mod rental;
