// src/domain/property_type.rs

/// Broad property category used when two descriptions don't match literally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyCategory {
    House,
    Flat,
}

const FLAT_KEYWORDS: &[&str] = &["flat", "apartment", "maisonette", "studio", "penthouse"];
const HOUSE_KEYWORDS: &[&str] = &[
    "house",
    "detached",
    "semi",
    "terrace",
    "bungalow",
    "cottage",
    "villa",
];

pub fn normalize(property_type: &str) -> String {
    property_type.trim().to_lowercase()
}

/// Flat keywords are checked first so "flat in a converted house" stays a flat.
pub fn category(property_type: &str) -> Option<PropertyCategory> {
    let normalized = normalize(property_type);
    if FLAT_KEYWORDS.iter().any(|k| normalized.contains(k)) {
        Some(PropertyCategory::Flat)
    } else if HOUSE_KEYWORDS.iter().any(|k| normalized.contains(k)) {
        Some(PropertyCategory::House)
    } else {
        None
    }
}

/// Equal, or one description contains the other ("semi-detached" / "semi-detached house").
pub fn matches(a: &str, b: &str) -> bool {
    let (a, b) = (normalize(a), normalize(b));
    if a.is_empty() || b.is_empty() {
        return a == b;
    }
    a == b || a.contains(&b) || b.contains(&a)
}
