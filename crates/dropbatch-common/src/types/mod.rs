//! Common types used across dropbatch

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{DropbatchError, Result};

/// One delimited line as read from a dropped file.
///
/// Both fields are kept as text; numeric validation happens in [`transform`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDiscount {
    pub name: String,
    pub percentage: String,
}

impl RawDiscount {
    pub fn new(name: impl Into<String>, percentage: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            percentage: percentage.into(),
        }
    }
}

impl std::fmt::Display for RawDiscount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "name={}, percentage={}", self.name, self.percentage)
    }
}

/// Normalized discount ready to be written to the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discount {
    /// Upper-cased name
    pub name: String,
    pub percentage: f64,
}

impl Discount {
    pub fn new(name: impl Into<String>, percentage: f64) -> Self {
        Self {
            name: name.into(),
            percentage,
        }
    }
}

impl std::fmt::Display for Discount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "name={}, percentage={}", self.name, self.percentage)
    }
}

/// Normalize a raw record.
///
/// The name is upper-cased with Unicode default case mapping, so the result
/// does not depend on the process locale. The percentage is parsed as `f64`
/// after trimming; anything else is an [`DropbatchError::InvalidPercentage`].
pub fn transform(raw: &RawDiscount) -> Result<Discount> {
    let percentage = raw
        .percentage
        .trim()
        .parse::<f64>()
        .map_err(|source| DropbatchError::InvalidPercentage {
            name: raw.name.clone(),
            value: raw.percentage.clone(),
            source,
        })?;

    let discount = Discount::new(raw.name.to_uppercase(), percentage);

    info!(before = %raw, after = %discount, "Converted discount record");

    Ok(discount)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_uppercases_and_parses() {
        let raw = RawDiscount::new("spring", "10.5");
        let discount = transform(&raw).unwrap();

        assert_eq!(discount, Discount::new("SPRING", 10.5));
    }

    #[test]
    fn test_transform_is_fixed_point_on_name() {
        let once = transform(&RawDiscount::new("Gadget", "3")).unwrap();
        let twice = transform(&RawDiscount::new(once.name.clone(), "3")).unwrap();

        assert_eq!(once.name, "GADGET");
        assert_eq!(twice.name, once.name);
    }

    #[test]
    fn test_transform_integer_percentage() {
        let discount = transform(&RawDiscount::new("widget", "5")).unwrap();
        assert_eq!(discount.percentage, 5.0);
    }

    #[test]
    fn test_transform_trims_percentage() {
        let discount = transform(&RawDiscount::new("widget", " 7.25 ")).unwrap();
        assert_eq!(discount.percentage, 7.25);
    }

    #[test]
    fn test_transform_non_ascii_name() {
        let discount = transform(&RawDiscount::new("straße", "1")).unwrap();
        assert_eq!(discount.name, "STRASSE");
    }

    #[test]
    fn test_transform_rejects_malformed_percentage() {
        let err = transform(&RawDiscount::new("broken", "ten")).unwrap_err();

        match err {
            DropbatchError::InvalidPercentage { name, value, .. } => {
                assert_eq!(name, "broken");
                assert_eq!(value, "ten");
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_transform_rejects_empty_percentage() {
        assert!(transform(&RawDiscount::new("empty", "")).is_err());
    }
}
