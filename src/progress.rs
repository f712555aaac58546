//! # Progress snapshots.
//!
//! [`Progress`] is an immutable `(message, percentage)` pair. Updating progress means
//! building a new value and publishing it through the owning task's read path; there
//! are no mutators.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RuntimeError;

/// Immutable progress snapshot: a human-readable message plus a percentage in `0..=100`.
///
/// # Example
/// ```
/// use taskmon::Progress;
///
/// let p = Progress::new("Restoring attachments", 40).unwrap();
/// assert_eq!(p.percentage(), 40);
/// assert_eq!(p.to_string(), "Restoring attachments (40%)");
///
/// assert!(Progress::new("bad", 101).is_err());
/// assert!(Progress::new("bad", -1).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawProgress")]
pub struct Progress {
    message: String,
    percentage: u8,
}

impl Progress {
    /// Creates a snapshot, failing with [`RuntimeError::InvalidPercentage`] outside `0..=100`.
    pub fn new(message: impl Into<String>, percentage: i64) -> Result<Self, RuntimeError> {
        if !(0..=100).contains(&percentage) {
            return Err(RuntimeError::InvalidPercentage { percentage });
        }
        Ok(Self {
            message: message.into(),
            percentage: percentage as u8,
        })
    }

    /// Snapshot at 0%.
    pub fn initial(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            percentage: 0,
        }
    }

    /// Snapshot at 100%.
    pub fn completed(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            percentage: 100,
        }
    }

    /// Snapshot with the percentage capped at 100.
    pub(crate) fn clamped(message: impl Into<String>, percentage: u8) -> Self {
        Self {
            message: message.into(),
            percentage: percentage.min(100),
        }
    }

    /// The human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The percentage, always within `0..=100`.
    pub fn percentage(&self) -> u8 {
        self.percentage
    }

    /// Returns `true` at 100%.
    pub fn is_complete(&self) -> bool {
        self.percentage == 100
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::initial("")
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}%)", self.message, self.percentage)
    }
}

#[derive(Deserialize)]
struct RawProgress {
    message: String,
    percentage: i64,
}

impl TryFrom<RawProgress> for Progress {
    type Error = RuntimeError;

    fn try_from(raw: RawProgress) -> Result<Self, Self::Error> {
        Progress::new(raw.message, raw.percentage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_inclusive() {
        assert_eq!(Progress::new("a", 0).unwrap().percentage(), 0);
        assert_eq!(Progress::new("a", 100).unwrap().percentage(), 100);
    }

    #[test]
    fn out_of_range_is_invalid_argument() {
        let err = Progress::new("a", 250).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidArgument);
        assert!(matches!(
            err,
            RuntimeError::InvalidPercentage { percentage: 250 }
        ));
    }

    #[test]
    fn deserialize_revalidates() {
        let ok: Progress =
            serde_json::from_str(r#"{"message":"indexing","percentage":12}"#).unwrap();
        assert_eq!(ok, Progress::new("indexing", 12).unwrap());

        let bad = serde_json::from_str::<Progress>(r#"{"message":"x","percentage":140}"#);
        assert!(bad.is_err());
    }
}
