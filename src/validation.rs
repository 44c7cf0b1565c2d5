//! Field validation driven by per-entity rule tables.
//!
//! Each entity input declares an ordered table of [`FieldRule`]s and exposes its field
//! values by name. [`validate`] walks the table and collects the first failing message
//! for every field into a [`FieldErrors`] map.

use indexmap::IndexMap;
use regex::Regex;
use rust_decimal::Decimal;
use validator::{ValidateEmail, ValidateLength};

/// Field name → message, in rule-table order
pub type FieldErrors = IndexMap<String, String>;

/// A single constraint applied to one field
#[derive(Debug)]
pub enum Check {
    /// Present and not blank
    Required,
    /// Character count within `min..=max`
    Length { min: u64, max: u64 },
    /// Whole value matches the expression
    Pattern(Regex),
    /// Syntactically valid e-mail address
    Email,
    /// Decimal within `min..=max`
    Range { min: Decimal, max: Decimal },
    /// At most this many digits after the decimal point
    Scale(u32),
}

#[derive(Debug)]
pub struct FieldRule {
    pub field: &'static str,
    pub check: Check,
    pub message: &'static str,
}

impl FieldRule {
    pub fn new(field: &'static str, check: Check, message: &'static str) -> Self {
        Self { field, check, message }
    }
}

/// Value of a field as seen by the rule table
#[derive(Debug, Clone, Copy)]
pub enum FieldValue<'a> {
    Text(Option<&'a str>),
    Number(Decimal),
}

/// Implemented by every input that carries a rule table
pub trait Validated {
    fn rules() -> &'static [FieldRule];

    fn value(&self, field: &str) -> FieldValue<'_>;
}

/// Run the rule table of `subject`. Only non-required checks on an absent or blank
/// value are skipped, so optional fields are validated only when filled in.
pub fn validate<T: Validated>(subject: &T) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    for rule in T::rules() {
        if errors.contains_key(rule.field) {
            continue;
        }
        if !passes(&rule.check, subject.value(rule.field)) {
            errors.insert(rule.field.to_string(), rule.message.to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn passes(check: &Check, value: FieldValue<'_>) -> bool {
    match (check, value) {
        (Check::Required, FieldValue::Text(text)) => {
            text.map(|t| !t.trim().is_empty()).unwrap_or(false)
        }
        (Check::Required, FieldValue::Number(_)) => true,
        (_, FieldValue::Text(None)) => true,
        (_, FieldValue::Text(Some(t))) if t.is_empty() => true,
        (Check::Length { min, max }, FieldValue::Text(Some(t))) => {
            t.to_string().validate_length(Some(*min), Some(*max), None)
        }
        (Check::Pattern(re), FieldValue::Text(Some(t))) => re.is_match(t),
        (Check::Email, FieldValue::Text(Some(t))) => t.to_string().validate_email(),
        (Check::Range { min, max }, FieldValue::Number(n)) => n >= *min && n <= *max,
        (Check::Scale(scale), FieldValue::Number(n)) => n.normalize().scale() <= *scale,
        // A check that does not apply to the value's kind never fails
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;

    struct Sample {
        name: Option<String>,
        code: String,
        amount: Decimal,
    }

    static SAMPLE_RULES: Lazy<Vec<FieldRule>> = Lazy::new(|| {
        vec![
            FieldRule::new("name", Check::Required, "name required"),
            FieldRule::new("name", Check::Length { min: 2, max: 4 }, "name length"),
            FieldRule::new(
                "code",
                Check::Pattern(Regex::new(r"^\d{3}$").expect("static pattern")),
                "code pattern",
            ),
            FieldRule::new(
                "amount",
                Check::Range {
                    min: Decimal::new(1, 2),
                    max: Decimal::new(500, 0),
                },
                "amount range",
            ),
        ]
    });

    impl Validated for Sample {
        fn rules() -> &'static [FieldRule] {
            &SAMPLE_RULES
        }

        fn value(&self, field: &str) -> FieldValue<'_> {
            match field {
                "name" => FieldValue::Text(self.name.as_deref()),
                "code" => FieldValue::Text(Some(&self.code)),
                "amount" => FieldValue::Number(self.amount),
                _ => FieldValue::Text(None),
            }
        }
    }

    #[test]
    fn valid_sample_passes() {
        let sample = Sample {
            name: Some("abc".into()),
            code: "123".into(),
            amount: Decimal::new(1, 2),
        };
        assert!(validate(&sample).is_ok());
    }

    #[test]
    fn first_failing_rule_wins_per_field() {
        let sample = Sample {
            name: None,
            code: "12a".into(),
            amount: Decimal::new(50001, 2),
        };
        let errors = validate(&sample).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors["name"], "name required");
        assert_eq!(errors["code"], "code pattern");
        assert_eq!(errors["amount"], "amount range");
    }

    #[test]
    fn length_counts_characters() {
        let sample = Sample {
            name: Some("ăîșț".into()),
            code: "000".into(),
            amount: Decimal::ONE,
        };
        assert!(validate(&sample).is_ok());

        let sample = Sample {
            name: Some("abcde".into()),
            ..sample
        };
        assert_eq!(validate(&sample).unwrap_err()["name"], "name length");
    }
}
