//! Field comparators and weighted comparator specs.
//!
//! A [`FieldComparator`] scores two single attribute values, usually in
//! `[0, 1]`. Weighting is applied by the matcher through [`ComparatorSpec`],
//! never by the comparator itself.
//!
//! Built-in comparators score empty values as 0.

use std::fmt;
use std::sync::Arc;

use crate::error::{ComparatorError, ValidationError};

/// Scores the similarity of two attribute values.
pub trait FieldComparator: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Compares two values.
    ///
    /// # Errors
    /// Returns `ComparatorError` if the values cannot be compared.
    fn compare(&self, a: &str, b: &str) -> Result<f64, ComparatorError>;
}

/// One weighted contribution to a pairwise score: compare `field_a` of the
/// left record with `field_b` of the right record.
#[derive(Clone)]
pub struct ComparatorSpec {
    /// Scoring function.
    pub comparator: Arc<dyn FieldComparator>,
    /// Predicate read from the left record.
    pub field_a: String,
    /// Predicate read from the right record.
    pub field_b: String,
    /// Multiplier applied to the comparator's score.
    pub weight: f64,
}

impl ComparatorSpec {
    /// Creates a spec owning `comparator`.
    #[must_use]
    pub fn new(
        comparator: impl FieldComparator + 'static,
        field_a: impl Into<String>,
        field_b: impl Into<String>,
        weight: f64,
    ) -> Self {
        Self {
            comparator: Arc::new(comparator),
            field_a: field_a.into(),
            field_b: field_b.into(),
            weight,
        }
    }

    /// Checks that the weight is usable.
    ///
    /// # Errors
    /// Returns `ValidationError::NonFiniteWeight` for NaN or infinite weights.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.weight.is_finite() {
            Ok(())
        } else {
            Err(ValidationError::NonFiniteWeight {
                field_a: self.field_a.clone(),
                field_b: self.field_b.clone(),
            })
        }
    }
}

impl fmt::Debug for ComparatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComparatorSpec")
            .field("comparator", &self.comparator.name())
            .field("field_a", &self.field_a)
            .field("field_b", &self.field_b)
            .field("weight", &self.weight)
            .finish()
    }
}

/// 1 if the values are identical, else 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactString;

impl FieldComparator for ExactString {
    fn name(&self) -> &str {
        "exact"
    }

    fn compare(&self, a: &str, b: &str) -> Result<f64, ComparatorError> {
        if a.is_empty() || b.is_empty() {
            return Ok(0.0);
        }
        Ok(if a == b { 1.0 } else { 0.0 })
    }
}

/// 1 if either value contains the other, else 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainsString;

impl FieldComparator for ContainsString {
    fn name(&self) -> &str {
        "contains"
    }

    fn compare(&self, a: &str, b: &str) -> Result<f64, ComparatorError> {
        if a.is_empty() || b.is_empty() {
            return Ok(0.0);
        }
        Ok(if a.contains(b) || b.contains(a) { 1.0 } else { 0.0 })
    }
}

/// Jaro similarity; scores below `threshold` count as 0.
#[derive(Debug, Clone, Copy)]
pub struct Jaro {
    threshold: f64,
}

impl Jaro {
    /// Creates a Jaro comparator.
    ///
    /// # Errors
    /// Returns `ComparatorError` if `threshold` is outside `[0, 1]`.
    pub fn new(threshold: f64) -> Result<Self, ComparatorError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ComparatorError::new(
                "jaro",
                format!("threshold {threshold} is outside [0, 1]"),
            ));
        }
        Ok(Self { threshold })
    }

    /// Minimum similarity that scores above 0.
    #[must_use]
    pub const fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl FieldComparator for Jaro {
    fn name(&self) -> &str {
        "jaro"
    }

    fn compare(&self, a: &str, b: &str) -> Result<f64, ComparatorError> {
        let sim = jaro_similarity(a, b);
        Ok(if sim >= self.threshold { sim } else { 0.0 })
    }
}

/// Jaro similarity of two strings; empty input scores 0.
#[must_use]
pub fn jaro_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::jaro(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_exact() {
        assert_eq!(ExactString.compare("iann", "iann").unwrap(), 1.0);
        assert_eq!(ExactString.compare("iann", "Iann").unwrap(), 0.0);
        assert_eq!(ExactString.compare("", "").unwrap(), 0.0);
    }

    #[test]
    fn test_contains_either_direction() {
        assert_eq!(ContainsString.compare("armstrong", "neil armstrong").unwrap(), 1.0);
        assert_eq!(ContainsString.compare("neil armstrong", "armstrong").unwrap(), 1.0);
        assert_eq!(ContainsString.compare("aldrin", "armstrong").unwrap(), 0.0);
        assert_eq!(ContainsString.compare("", "armstrong").unwrap(), 0.0);
    }

    #[test]
    fn test_jaro_known_values() {
        assert!(approx(jaro_similarity("martha", "marhta"), 0.944));
        assert!(approx(jaro_similarity("dixon", "dicksonx"), 0.767));
        assert_eq!(jaro_similarity("abc", "xyz"), 0.0);
        assert_eq!(jaro_similarity("same", "same"), 1.0);
        assert_eq!(jaro_similarity("", ""), 0.0);
        assert_eq!(jaro_similarity("", "same"), 0.0);
    }

    #[test]
    fn test_jaro_threshold_cuts_low_scores() {
        let jaro = Jaro::new(0.9).unwrap();
        assert!(approx(jaro.compare("martha", "marhta").unwrap(), 0.944));
        assert_eq!(jaro.compare("dixon", "dicksonx").unwrap(), 0.0);
    }

    #[test]
    fn test_jaro_rejects_bad_threshold() {
        assert!(Jaro::new(1.5).is_err());
        assert!(Jaro::new(-0.1).is_err());
        assert!(Jaro::new(f64::NAN).is_err());
    }

    #[test]
    fn test_spec_weight_validation() {
        let spec = ComparatorSpec::new(ExactString, "a", "b", 10.0);
        assert!(spec.validate().is_ok());

        let spec = ComparatorSpec::new(ExactString, "a", "b", f64::INFINITY);
        assert!(matches!(
            spec.validate(),
            Err(ValidationError::NonFiniteWeight { .. })
        ));
    }

    #[test]
    fn test_comparators_are_object_safe() {
        let comparators: Vec<Arc<dyn FieldComparator>> =
            vec![Arc::new(ExactString), Arc::new(ContainsString)];
        let names: Vec<_> = comparators.iter().map(|c| c.name()).collect();
        assert_eq!(names, ["exact", "contains"]);
    }
}
