//! Condition string grammar and severity classification.
//!
//! A condition string carries exactly three flags in a fixed order:
//!
//! ```text
//! is_dirty=<bool>,is_overweight=<bool>,is_broken=<bool>
//! ```
//!
//! Validation is a positional scan against that sequence. Anything else,
//! including whitespace, reordered keys or trailing bytes, is rejected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{
    SCORE_CONDITION_LEVEL_CRITICAL, SCORE_CONDITION_LEVEL_INFO, SCORE_CONDITION_LEVEL_WARNING,
};

/// Flag keys in the order they must appear
pub const CONDITION_KEYS: [&str; 3] = ["is_dirty", "is_overweight", "is_broken"];

const VALUE_TRUE: &str = "true";
const VALUE_FALSE: &str = "false";

/// Severity derived from the number of raised flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionLevel {
    Info,
    Warning,
    Critical,
}

impl ConditionLevel {
    pub const ALL: [ConditionLevel; 3] = [
        ConditionLevel::Info,
        ConditionLevel::Warning,
        ConditionLevel::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionLevel::Info => "info",
            ConditionLevel::Warning => "warning",
            ConditionLevel::Critical => "critical",
        }
    }

    /// Weight of one record of this level in the hourly graph score
    pub fn score(&self) -> i64 {
        match self {
            ConditionLevel::Info => SCORE_CONDITION_LEVEL_INFO,
            ConditionLevel::Warning => SCORE_CONDITION_LEVEL_WARNING,
            ConditionLevel::Critical => SCORE_CONDITION_LEVEL_CRITICAL,
        }
    }

    /// Map a raised-flag count to a level
    pub fn from_true_count(count: usize) -> Result<Self, ClassifyError> {
        match count {
            0 => Ok(ConditionLevel::Info),
            1 | 2 => Ok(ConditionLevel::Warning),
            3 => Ok(ConditionLevel::Critical),
            other => Err(ClassifyError::UnexpectedTrueCount(other)),
        }
    }
}

impl fmt::Display for ConditionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConditionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(ConditionLevel::Info),
            "warning" => Ok(ConditionLevel::Warning),
            "critical" => Ok(ConditionLevel::Critical),
            _ => Err(format!("Unknown condition level '{}'", s)),
        }
    }
}

/// Parsed flag values of a well-formed condition string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConditionFlags {
    pub is_dirty: bool,
    pub is_overweight: bool,
    pub is_broken: bool,
}

impl ConditionFlags {
    pub fn true_count(&self) -> usize {
        [self.is_dirty, self.is_overweight, self.is_broken]
            .iter()
            .filter(|flag| **flag)
            .count()
    }
}

/// Reasons a condition string fails the grammar check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionFormatError {
    /// Expected key (with its `=`) not found at this byte offset
    MissingKey { key: &'static str, offset: usize },
    /// Value after `key=` is neither `true` nor `false`
    InvalidValue { key: &'static str, offset: usize },
    /// No `,` between two flags
    MissingSeparator { offset: usize },
    /// Bytes remain after the last flag
    TrailingCharacters { offset: usize },
}

impl fmt::Display for ConditionFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionFormatError::MissingKey { key, offset } => {
                write!(f, "expected '{}=' at offset {}", key, offset)
            }
            ConditionFormatError::InvalidValue { key, offset } => {
                write!(
                    f,
                    "value of '{}' at offset {} must be 'true' or 'false'",
                    key, offset
                )
            }
            ConditionFormatError::MissingSeparator { offset } => {
                write!(f, "expected ',' at offset {}", offset)
            }
            ConditionFormatError::TrailingCharacters { offset } => {
                write!(f, "unexpected trailing characters at offset {}", offset)
            }
        }
    }
}

impl std::error::Error for ConditionFormatError {}

/// Classification failed on an otherwise accepted string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    UnexpectedTrueCount(usize),
}

impl fmt::Display for ClassifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassifyError::UnexpectedTrueCount(count) => {
                write!(f, "unexpected warn count: {}", count)
            }
        }
    }
}

impl std::error::Error for ClassifyError {}

/// Scan a condition string against the fixed key sequence and return its flags
pub fn parse_condition(condition: &str) -> Result<ConditionFlags, ConditionFormatError> {
    let mut rest = condition;
    let mut values = [false; 3];

    for (idx, key) in CONDITION_KEYS.iter().copied().enumerate() {
        let offset = condition.len() - rest.len();
        rest = rest
            .strip_prefix(key)
            .and_then(|r| r.strip_prefix('='))
            .ok_or(ConditionFormatError::MissingKey { key, offset })?;

        let offset = condition.len() - rest.len();
        if let Some(r) = rest.strip_prefix(VALUE_TRUE) {
            values[idx] = true;
            rest = r;
        } else if let Some(r) = rest.strip_prefix(VALUE_FALSE) {
            rest = r;
        } else {
            return Err(ConditionFormatError::InvalidValue { key, offset });
        }

        if idx < CONDITION_KEYS.len() - 1 {
            let offset = condition.len() - rest.len();
            rest = rest
                .strip_prefix(',')
                .ok_or(ConditionFormatError::MissingSeparator { offset })?;
        }
    }

    if !rest.is_empty() {
        return Err(ConditionFormatError::TrailingCharacters {
            offset: condition.len() - rest.len(),
        });
    }

    Ok(ConditionFlags {
        is_dirty: values[0],
        is_overweight: values[1],
        is_broken: values[2],
    })
}

pub fn is_valid_condition_format(condition: &str) -> bool {
    parse_condition(condition).is_ok()
}

/// Severity of a condition string by counting raised flags
///
/// Callers validate the grammar first; this only counts `=true` occurrences,
/// so a malformed string can yield a count the level table does not cover.
pub fn calculate_condition_level(condition: &str) -> Result<ConditionLevel, ClassifyError> {
    ConditionLevel::from_true_count(condition.matches("=true").count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_condition() {
        let flags = parse_condition("is_dirty=true,is_overweight=false,is_broken=true").unwrap();
        assert_eq!(
            flags,
            ConditionFlags {
                is_dirty: true,
                is_overweight: false,
                is_broken: true,
            }
        );
        assert_eq!(flags.true_count(), 2);
    }

    #[test]
    fn test_level_by_true_count() {
        let cases = [
            ("is_dirty=false,is_overweight=false,is_broken=false", ConditionLevel::Info),
            ("is_dirty=true,is_overweight=false,is_broken=false", ConditionLevel::Warning),
            ("is_dirty=false,is_overweight=true,is_broken=true", ConditionLevel::Warning),
            ("is_dirty=true,is_overweight=true,is_broken=true", ConditionLevel::Critical),
        ];
        for (condition, expected) in cases {
            assert!(is_valid_condition_format(condition));
            assert_eq!(calculate_condition_level(condition).unwrap(), expected);
            let flags = parse_condition(condition).unwrap();
            assert_eq!(ConditionLevel::from_true_count(flags.true_count()).unwrap(), expected);
        }
    }

    #[test]
    fn test_every_flag_combination_classifies() {
        for bits in 0u8..8 {
            let values: Vec<&str> = (0..3)
                .map(|i| if bits & (1 << i) != 0 { "true" } else { "false" })
                .collect();
            let condition = format!(
                "is_dirty={},is_overweight={},is_broken={}",
                values[0], values[1], values[2]
            );
            let level = calculate_condition_level(&condition).unwrap();
            let expected = ConditionLevel::from_true_count(bits.count_ones() as usize).unwrap();
            assert_eq!(level, expected, "{}", condition);
        }
    }

    #[test]
    fn test_missing_key() {
        assert_eq!(
            parse_condition("is_overweight=true,is_dirty=true,is_broken=true"),
            Err(ConditionFormatError::MissingKey {
                key: "is_dirty",
                offset: 0
            })
        );
        assert!(!is_valid_condition_format(""));
        assert!(!is_valid_condition_format("is_dirty=true,is_overweight=true"));
    }

    #[test]
    fn test_invalid_value() {
        assert_eq!(
            parse_condition("is_dirty=yes,is_overweight=true,is_broken=true"),
            Err(ConditionFormatError::InvalidValue {
                key: "is_dirty",
                offset: 9
            })
        );
        assert!(!is_valid_condition_format("is_dirty=TRUE,is_overweight=true,is_broken=true"));
    }

    #[test]
    fn test_missing_separator() {
        assert_eq!(
            parse_condition("is_dirty=trueis_overweight=true,is_broken=true"),
            Err(ConditionFormatError::MissingSeparator { offset: 13 })
        );
        assert!(!is_valid_condition_format("is_dirty=true;is_overweight=true,is_broken=true"));
    }

    #[test]
    fn test_trailing_characters() {
        assert_eq!(
            parse_condition("is_dirty=true,is_overweight=true,is_broken=true,"),
            Err(ConditionFormatError::TrailingCharacters { offset: 47 })
        );
        assert!(!is_valid_condition_format(" is_dirty=true,is_overweight=true,is_broken=true"));
        assert!(!is_valid_condition_format("is_dirty=true,is_overweight=true,is_broken=truex"));
    }

    #[test]
    fn test_unexpected_true_count() {
        assert_eq!(
            ConditionLevel::from_true_count(4),
            Err(ClassifyError::UnexpectedTrueCount(4))
        );
        assert!(calculate_condition_level("a=true,b=true,c=true,d=true").is_err());
    }

    #[test]
    fn test_level_round_trip_through_str() {
        for level in ConditionLevel::ALL {
            assert_eq!(level.as_str().parse::<ConditionLevel>().unwrap(), level);
        }
        assert!("fatal".parse::<ConditionLevel>().is_err());
    }
}
