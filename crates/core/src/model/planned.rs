use serde::{Deserialize, Serialize};

/// The free-form "reps or duration" text a coach writes for an exercise.
///
/// Coaches write values like `"12"`, `"12-10-8"` (a descending pyramid),
/// `"10 / 8"`, or `"30s/lado"` (a timed hold per side). When a set has no
/// logged rep count, the history falls back to the first token of this text
/// if that token is a whole number, otherwise to the raw text itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlannedValue(String);

/// Characters that separate tokens in a planned value.
const TOKEN_SEPARATORS: &[char] = &['-', '/', ',', ';', 'x', 'X'];

impl PlannedValue {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn raw(&self) -> &str {
        &self.0
    }

    /// The leading integer token, if the value starts with one.
    ///
    /// `"12-10-8"` yields `Some(12)`, `"30s/lado"` yields `None` because its
    /// first token (`"30s"`) is not a whole number.
    #[must_use]
    pub fn leading_integer(&self) -> Option<u32> {
        leading_integer(&self.0)
    }

    /// Rep count to record for a set with no logged value.
    #[must_use]
    pub fn fallback_reps(&self) -> String {
        match self.leading_integer() {
            Some(reps) => reps.to_string(),
            None => self.0.clone(),
        }
    }
}

impl From<&str> for PlannedValue {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for PlannedValue {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

/// Parse the first token of `raw` as an unsigned integer.
///
/// Tokens are split on whitespace and on `- / , ; x`. The token must consist
/// only of ASCII digits.
#[must_use]
pub fn leading_integer(raw: &str) -> Option<u32> {
    let token = raw
        .trim()
        .split(|c: char| c.is_whitespace() || TOKEN_SEPARATORS.contains(&c))
        .next()?;
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pyramid_takes_first_step() {
        assert_eq!(leading_integer("12-10-8"), Some(12));
        assert_eq!(PlannedValue::from("12-10-8").fallback_reps(), "12");
    }

    #[test]
    fn timed_hold_falls_back_to_raw() {
        let planned = PlannedValue::from("30s/lado");
        assert_eq!(planned.leading_integer(), None);
        assert_eq!(planned.fallback_reps(), "30s/lado");
    }

    #[test]
    fn plain_number_and_padding() {
        assert_eq!(leading_integer("  15 "), Some(15));
        assert_eq!(leading_integer("10 reps"), Some(10));
        assert_eq!(leading_integer("8x3"), Some(8));
    }

    #[test]
    fn non_numeric_or_empty() {
        assert_eq!(leading_integer(""), None);
        assert_eq!(leading_integer("max"), None);
        assert_eq!(leading_integer("-5"), None);
        assert_eq!(PlannedValue::from("").fallback_reps(), "");
    }

    #[test]
    fn overflow_is_not_an_integer() {
        assert_eq!(leading_integer("99999999999"), None);
    }
}
