//! Typed parsing of raw form fields.
//!
//! Clients submit forms as loose strings (or numbers). Every field goes through
//! this module before any figure is computed, under one of two policies:
//! [`FieldPolicy::Strict`] surfaces the first bad field as a
//! [`ValidationError`]; [`FieldPolicy::Fallback`] coerces bad input to a
//! documented default instead.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Levenshtein distance under which an unknown option gets a suggestion.
const SUGGESTION_MAX_DISTANCE: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldPolicy {
    #[default]
    Strict,
    Fallback,
}

impl FieldPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "strict" => Some(Self::Strict),
            "fallback" => Some(Self::Fallback),
            _ => None,
        }
    }
}

/// A raw form value. Browsers send strings; API clients often send numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Number(n) => Cow::Owned(n.to_string()),
            Self::Text(s) => Cow::Borrowed(s.trim()),
        }
    }

    fn is_blank(&self) -> bool {
        matches!(self, Self::Text(s) if s.trim().is_empty())
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// An enumerated form option with a fixed set of wire names.
pub trait FormOption: Sized + Copy + 'static {
    const FIELD: &'static str;
    const OPTIONS: &'static [(&'static str, Self)];

    fn from_name(raw: &str) -> Option<Self> {
        let needle = raw.trim().to_ascii_lowercase();
        Self::OPTIONS
            .iter()
            .find(|(name, _)| *name == needle)
            .map(|(_, value)| *value)
    }
}

fn present(value: Option<&FieldValue>) -> Option<&FieldValue> {
    value.filter(|v| !v.is_blank())
}

/// Closest wire name to `raw`, if any is near enough to be a plausible typo.
pub fn suggest(raw: &str, options: &[&'static str]) -> Option<&'static str> {
    let needle = raw.trim().to_ascii_lowercase();
    options
        .iter()
        .map(|opt| (strsim::levenshtein(&needle, opt), *opt))
        .filter(|(distance, _)| *distance <= SUGGESTION_MAX_DISTANCE)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, opt)| opt)
}

fn unknown<T: FormOption>(raw: &str) -> ValidationError {
    let names: Vec<&'static str> = T::OPTIONS.iter().map(|(name, _)| *name).collect();
    ValidationError::UnknownOption {
        field: T::FIELD,
        value: raw.to_string(),
        suggestion: suggest(raw, &names),
    }
}

/// Parses an optional enumerated field. Blank and absent values are `None`.
///
/// Under `Fallback`, unrecognized values also become `None`.
pub fn optional_option<T: FormOption>(
    value: Option<&FieldValue>,
    policy: FieldPolicy,
) -> Result<Option<T>, ValidationError> {
    let Some(value) = present(value) else {
        return Ok(None);
    };
    let raw = value.as_text();
    match T::from_name(&raw) {
        Some(parsed) => Ok(Some(parsed)),
        None if policy == FieldPolicy::Fallback => Ok(None),
        None => Err(unknown::<T>(&raw)),
    }
}

/// Parses a required enumerated field, substituting `default` under `Fallback`.
pub fn required_option<T: FormOption>(
    value: Option<&FieldValue>,
    policy: FieldPolicy,
    default: T,
) -> Result<T, ValidationError> {
    match optional_option::<T>(value, policy)? {
        Some(parsed) => Ok(parsed),
        None if policy == FieldPolicy::Fallback => Ok(default),
        None => Err(ValidationError::Missing { field: T::FIELD }),
    }
}

/// Longest numeric prefix of `raw`, the way browsers read loose number input:
/// `"15km"` is 15, `"-5"` is -5, `"km"` is nothing.
fn leading_number(raw: &str) -> Option<f64> {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let digits_from = |mut at: usize| {
        while bytes.get(at).is_some_and(u8::is_ascii_digit) {
            at += 1;
        }
        at
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_end = digits_from(end);
    let mut digit_count = int_end - end;
    end = int_end;
    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        digit_count += frac_end - (end + 1);
        end = frac_end;
    }
    if digit_count == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
        let exp_end = digits_from(end + 1 + sign);
        if exp_end > end + 1 + sign {
            end = exp_end;
        }
    }
    s[..end].parse().ok()
}

/// Parses a quantity.
///
/// Absent values take `default` when one is given. Otherwise `Strict` reports
/// the field as missing and `Fallback` coerces it to zero.
///
/// `Strict` wants the whole value to be a non-negative number. `Fallback`
/// reads the leading number of the text, sign included, and coerces anything
/// without one to zero.
pub fn quantity(
    field: &'static str,
    value: Option<&FieldValue>,
    policy: FieldPolicy,
    default: Option<f64>,
) -> Result<f64, ValidationError> {
    let Some(value) = present(value) else {
        return match (default, policy) {
            (Some(d), _) => Ok(d),
            (None, FieldPolicy::Fallback) => Ok(0.0),
            (None, FieldPolicy::Strict) => Err(ValidationError::Missing { field }),
        };
    };

    let parsed = match (value, policy) {
        (FieldValue::Number(n), _) => Some(*n),
        (FieldValue::Text(s), FieldPolicy::Strict) => s.trim().parse::<f64>().ok(),
        (FieldValue::Text(s), FieldPolicy::Fallback) => leading_number(s),
    }
    .filter(|n| n.is_finite());

    match (parsed, policy) {
        (Some(n), FieldPolicy::Fallback) => Ok(n),
        (None, FieldPolicy::Fallback) => Ok(0.0),
        (Some(n), FieldPolicy::Strict) if n >= 0.0 => Ok(n),
        (Some(n), FieldPolicy::Strict) => Err(ValidationError::Negative { field, value: n }),
        (None, FieldPolicy::Strict) => Err(ValidationError::NotANumber {
            field,
            value: value.as_text().into_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Colour {
        Red,
        Green,
    }

    impl FormOption for Colour {
        const FIELD: &'static str = "colour";
        const OPTIONS: &'static [(&'static str, Self)] = &[("red", Self::Red), ("green", Self::Green)];
    }

    #[test]
    fn options_match_case_insensitively() {
        let value = FieldValue::from(" Green ");
        let parsed = optional_option::<Colour>(Some(&value), FieldPolicy::Strict).unwrap();
        assert_eq!(parsed, Some(Colour::Green));
    }

    #[test]
    fn blank_option_is_absent_under_both_policies() {
        let blank = FieldValue::from("  ");
        for policy in [FieldPolicy::Strict, FieldPolicy::Fallback] {
            assert_eq!(optional_option::<Colour>(Some(&blank), policy).unwrap(), None);
            assert_eq!(optional_option::<Colour>(None, policy).unwrap(), None);
        }
    }

    #[test]
    fn strict_rejects_unknown_option_with_suggestion() {
        let value = FieldValue::from("gren");
        let err = optional_option::<Colour>(Some(&value), FieldPolicy::Strict).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownOption {
                field: "colour",
                value: "gren".to_string(),
                suggestion: Some("green"),
            }
        );
    }

    #[test]
    fn far_off_values_get_no_suggestion() {
        assert_eq!(suggest("purple", &["red", "green"]), None);
    }

    #[test]
    fn required_option_falls_back_to_default() {
        let value = FieldValue::from("blue");
        let parsed = required_option(Some(&value), FieldPolicy::Fallback, Colour::Red).unwrap();
        assert_eq!(parsed, Colour::Red);

        let err = required_option(None, FieldPolicy::Strict, Colour::Red).unwrap_err();
        assert_eq!(err, ValidationError::Missing { field: "colour" });
    }

    #[test]
    fn quantity_accepts_numbers_and_numeric_text() {
        let text = FieldValue::from("15");
        let number = FieldValue::from(2.5);
        assert_eq!(quantity("distance", Some(&text), FieldPolicy::Strict, None).unwrap(), 15.0);
        assert_eq!(quantity("distance", Some(&number), FieldPolicy::Strict, None).unwrap(), 2.5);
    }

    #[test]
    fn quantity_policies_differ_on_bad_input() {
        let junk = FieldValue::from("far");
        let negative = FieldValue::from("-3");

        assert!(matches!(
            quantity("distance", Some(&junk), FieldPolicy::Strict, None),
            Err(ValidationError::NotANumber { .. })
        ));
        assert!(matches!(
            quantity("distance", Some(&negative), FieldPolicy::Strict, None),
            Err(ValidationError::Negative { .. })
        ));
        assert_eq!(quantity("distance", Some(&junk), FieldPolicy::Fallback, None).unwrap(), 0.0);
        assert_eq!(quantity("distance", Some(&negative), FieldPolicy::Fallback, None).unwrap(), -3.0);
        assert_eq!(quantity("distance", None, FieldPolicy::Fallback, None).unwrap(), 0.0);
    }

    #[test]
    fn fallback_reads_the_leading_number() {
        let read = |raw: &str| {
            quantity("distance", Some(&FieldValue::from(raw)), FieldPolicy::Fallback, None).unwrap()
        };
        assert_eq!(read("15km"), 15.0);
        assert_eq!(read("-5"), -5.0);
        assert_eq!(read(" 2.5 miles"), 2.5);
        assert_eq!(read(".5"), 0.5);
        assert_eq!(read("1e3m"), 1000.0);
        assert_eq!(read("3e"), 3.0);
        assert_eq!(read("km15"), 0.0);
        assert_eq!(read("-"), 0.0);
        assert_eq!(read("."), 0.0);

        let err = quantity("distance", Some(&FieldValue::from("15km")), FieldPolicy::Strict, None)
            .unwrap_err();
        assert!(matches!(err, ValidationError::NotANumber { .. }));
    }

    #[test]
    fn quantity_default_applies_only_when_absent() {
        assert_eq!(quantity("servings", None, FieldPolicy::Strict, Some(1.0)).unwrap(), 1.0);
        let two = FieldValue::from("2");
        assert_eq!(quantity("servings", Some(&two), FieldPolicy::Strict, Some(1.0)).unwrap(), 2.0);
    }

    #[test]
    fn policy_parses_from_config_text() {
        assert_eq!(FieldPolicy::parse("Fallback"), Some(FieldPolicy::Fallback));
        assert_eq!(FieldPolicy::parse("strict"), Some(FieldPolicy::Strict));
        assert_eq!(FieldPolicy::parse("lenient"), None);
    }
}
