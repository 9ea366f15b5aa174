use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Highest day number a routine template can prescribe (one per weekday).
pub const MAX_DAY_NUMBER: u8 = 7;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DayError {
    #[error("day number must be between 1 and {MAX_DAY_NUMBER}, got {0}")]
    OutOfRange(u8),
}

/// A day slot within a routine template, always in `1..=7`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DayNumber(u8);

impl DayNumber {
    pub const FIRST: DayNumber = DayNumber(1);

    /// # Errors
    ///
    /// Returns `DayError::OutOfRange` when `value` is 0 or greater than 7.
    pub fn new(value: u8) -> Result<Self, DayError> {
        if (1..=MAX_DAY_NUMBER).contains(&value) {
            Ok(Self(value))
        } else {
            Err(DayError::OutOfRange(value))
        }
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    /// Every day slot a template can hold, in ascending order.
    pub fn all() -> impl Iterator<Item = DayNumber> {
        (1..=MAX_DAY_NUMBER).map(DayNumber)
    }
}

impl TryFrom<u8> for DayNumber {
    type Error = DayError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DayNumber> for u8 {
    fn from(day: DayNumber) -> Self {
        day.0
    }
}

impl fmt::Debug for DayNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DayNumber({})", self.0)
    }
}

impl fmt::Display for DayNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
