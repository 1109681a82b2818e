pub mod cuckoo;

use std::fmt;

/// Byte-keyed approximate membership filter: no false negatives for accepted
/// keys, false positives allowed.
pub trait Filter {
    fn insert(&mut self, key: &[u8]) -> InsertResult;

    fn contains(&self, key: &[u8]) -> bool;
}

/// Outcome of a single insert.
///
/// `Duplicate` means the key (or a fingerprint colliding with it) was already
/// present, `Overflow` means placement failed within the eviction bound and
/// the filter was left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    Success,
    Duplicate,
    Overflow,
}

/// Rejected construction parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    InvalidParameter {
        param: &'static str,
        value: String,
        constraint: &'static str,
    },
}

impl FilterError {
    pub(crate) fn invalid(
        param: &'static str,
        value: impl fmt::Display,
        constraint: &'static str,
    ) -> Self {
        FilterError::InvalidParameter {
            param,
            value: value.to_string(),
            constraint,
        }
    }
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::InvalidParameter {
                param,
                value,
                constraint,
            } => {
                write!(
                    f,
                    "invalid parameter '{}': value '{}' {}",
                    param, value, constraint
                )
            }
        }
    }
}

impl std::error::Error for FilterError {}

#[cfg(test)]
pub(crate) mod correctness_tests {
    use super::Filter;
    use std::ops::Range;

    pub fn fill_from_range(filter: &mut impl Filter, range: Range<u64>) {
        for key in range {
            filter.insert(&key.to_le_bytes());
        }
    }

    pub fn check_false_negatives(filter: &impl Filter, range: Range<u64>) {
        for key in range {
            assert!(
                filter.contains(&key.to_le_bytes()),
                "false negative for key {}",
                key
            );
        }
    }

    pub fn estimate_false_positive_rate(filter: &impl Filter, range: Range<u64>) -> f64 {
        let total = range.end - range.start;
        let positives = range
            .filter(|key| filter.contains(&key.to_le_bytes()))
            .count();
        positives as f64 / total as f64
    }
}
