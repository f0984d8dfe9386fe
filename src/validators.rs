//! Attribute validation rules.
//!
//! Records expose their state as a JSON attribute bag so that values arriving
//! from the wire (or from a partial `set`) can be checked before they are
//! committed into typed fields. Each [`Rule`] inspects one attribute; [`validate`]
//! runs a rule list in order and stops at the first failure.

use serde_json::{Map, Value};

use crate::error::{ValidationError, ValidationErrorKind};

/// Attribute bag shared by every record.
pub type Attributes = Map<String, Value>;

/// A single check against one attribute of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// The attribute must be a string and one of `values`.
    OneOf {
        attr: &'static str,
        values: &'static [&'static str],
    },
    /// The attribute must be a JSON boolean.
    IsBool { attr: &'static str },
    /// The attribute must be a JSON string.
    IsString { attr: &'static str },
    /// The attribute must be a string whose character count lies in `min..=max`.
    StringLength {
        attr: &'static str,
        min: usize,
        max: usize,
    },
}

impl Rule {
    pub const fn one_of(attr: &'static str, values: &'static [&'static str]) -> Self {
        Rule::OneOf { attr, values }
    }

    pub const fn is_bool(attr: &'static str) -> Self {
        Rule::IsBool { attr }
    }

    pub const fn is_string(attr: &'static str) -> Self {
        Rule::IsString { attr }
    }

    pub const fn string_length(attr: &'static str, min: usize, max: usize) -> Self {
        Rule::StringLength { attr, min, max }
    }

    /// The attribute this rule inspects.
    pub fn attr(&self) -> &'static str {
        match self {
            Rule::OneOf { attr, .. }
            | Rule::IsBool { attr }
            | Rule::IsString { attr }
            | Rule::StringLength { attr, .. } => attr,
        }
    }

    /// Run the rule. A missing attribute is treated like JSON `null`.
    pub fn check(&self, attrs: &Attributes) -> Result<(), ValidationError> {
        let value = attrs.get(self.attr()).unwrap_or(&Value::Null);
        let fail = |kind| Err(ValidationError::new(kind, self.attr()));

        match self {
            Rule::OneOf { values, .. } => match value.as_str() {
                Some(s) if values.iter().any(|v| *v == s) => Ok(()),
                _ => fail(ValidationErrorKind::InvalidOption),
            },
            Rule::IsBool { .. } => {
                if value.is_boolean() {
                    Ok(())
                } else {
                    fail(ValidationErrorKind::NotBoolean)
                }
            }
            Rule::IsString { .. } => {
                if value.is_string() {
                    Ok(())
                } else {
                    fail(ValidationErrorKind::NotString)
                }
            }
            Rule::StringLength { min, max, .. } => {
                let Some(s) = value.as_str() else {
                    return fail(ValidationErrorKind::NotString);
                };
                let len = s.chars().count();
                if len < *min || len > *max {
                    fail(ValidationErrorKind::LengthOutOfRange)
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Run `rules` in order against `attrs`, returning the first failure.
pub fn validate(attrs: &Attributes, rules: &[Rule]) -> Result<(), ValidationError> {
    rules.iter().try_for_each(|rule| rule.check(attrs))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    const COLORS: &[&str] = &["red", "green"];

    fn attrs(v: Value) -> Attributes {
        v.as_object().cloned().unwrap()
    }

    // -- OneOf ---------------------------------------------------------------

    #[rstest]
    #[case(json!({"color": "red"}), true)]
    #[case(json!({"color": "green"}), true)]
    #[case(json!({"color": "blue"}), false)]
    #[case(json!({"color": "RED"}), false)]
    #[case(json!({"color": 3}), false)]
    #[case(json!({}), false)]
    fn test_one_of(#[case] input: Value, #[case] ok: bool) {
        let rule = Rule::one_of("color", COLORS);
        let res = rule.check(&attrs(input));
        assert_eq!(res.is_ok(), ok);
        if let Err(e) = res {
            assert_eq!(e.kind, ValidationErrorKind::InvalidOption);
            assert_eq!(e.attr, "color");
        }
    }

    // -- IsBool / IsString ---------------------------------------------------

    #[rstest]
    #[case(json!({"flag": true}), true)]
    #[case(json!({"flag": false}), true)]
    #[case(json!({"flag": "true"}), false)]
    #[case(json!({"flag": 0}), false)]
    #[case(json!({"flag": null}), false)]
    fn test_is_bool(#[case] input: Value, #[case] ok: bool) {
        let res = Rule::is_bool("flag").check(&attrs(input));
        assert_eq!(res.is_ok(), ok);
        if let Err(e) = res {
            assert_eq!(e.kind, ValidationErrorKind::NotBoolean);
        }
    }

    #[test]
    fn test_is_string_rejects_null_name() {
        let err = Rule::is_string("name")
            .check(&attrs(json!({"name": null})))
            .unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::NotString);
    }

    #[test]
    fn test_is_string_accepts_empty_string() {
        assert!(Rule::is_string("name").check(&attrs(json!({"name": ""}))).is_ok());
    }

    // -- StringLength --------------------------------------------------------

    #[rstest]
    #[case("", false)]
    #[case("a", true)]
    #[case("abc", true)]
    #[case("abcd", false)]
    fn test_string_length_bounds(#[case] text: &str, #[case] ok: bool) {
        let res = Rule::string_length("message", 1, 3).check(&attrs(json!({"message": text})));
        assert_eq!(res.is_ok(), ok);
        if let Err(e) = res {
            assert_eq!(e.kind, ValidationErrorKind::LengthOutOfRange);
        }
    }

    #[test]
    fn test_string_length_counts_chars_not_bytes() {
        let rule = Rule::string_length("message", 1, 3);
        assert!(rule.check(&attrs(json!({"message": "héé"}))).is_ok());
    }

    #[test]
    fn test_string_length_non_string_is_not_string() {
        let err = Rule::string_length("message", 1, 3)
            .check(&attrs(json!({"message": 12})))
            .unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::NotString);
    }

    // -- validate ------------------------------------------------------------

    #[test]
    fn test_validate_returns_first_failure_only() {
        let rules = [
            Rule::is_string("name"),
            Rule::one_of("color", COLORS),
            Rule::is_bool("flag"),
        ];
        let err = validate(&attrs(json!({"name": "x", "color": "blue", "flag": 1})), &rules)
            .unwrap_err();
        assert_eq!(err.attr, "color");
        assert_eq!(err.kind, ValidationErrorKind::InvalidOption);
    }

    #[test]
    fn test_validate_all_pass() {
        let rules = [Rule::is_string("name"), Rule::is_bool("flag")];
        assert!(validate(&attrs(json!({"name": "x", "flag": true})), &rules).is_ok());
    }

    #[test]
    fn test_validate_empty_rules_pass() {
        assert!(validate(&Attributes::new(), &[]).is_ok());
    }
}
