use thiserror::Error;

use crate::model::{DayError, ParseIdError, RecordError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Day(#[from] DayError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    ParseId(#[from] ParseIdError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DayNumber, ExerciseId, PerSetRepLog};

    #[test]
    fn domain_errors_convert() {
        let err: Error = DayNumber::new(8).unwrap_err().into();
        assert!(matches!(err, Error::Day(DayError::OutOfRange(8))));

        let err: Error = PerSetRepLog::new(ExerciseId::new(1))
            .record(0, Some(5))
            .unwrap_err()
            .into();
        assert_eq!(err.to_string(), "set index must start at 1");

        let err: Error = "abc".parse::<ExerciseId>().unwrap_err().into();
        assert!(matches!(err, Error::ParseId(_)));
    }
}
