//! Member model and its validation rules

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{ser::SerializeStruct, Deserialize, Serialize, Serializer};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::borrowing::Borrowing;
use crate::validation::{Check, FieldRule, FieldValue, Validated};

/// Library member. `email` is written once at creation and never updated.
#[derive(Debug, Clone, PartialEq, FromRow, ToSchema)]
pub struct Member {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub address: Option<String>,
    pub email: String,
    pub phone: String,
    pub identity_id: Option<i32>,
    pub version: i32,
    #[sqlx(skip)]
    pub borrowings: Option<Vec<Borrowing>>,
}

impl Member {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl Serialize for Member {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.borrowings.is_some() { 10 } else { 9 };
        let mut state = serializer.serialize_struct("Member", len)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("first_name", &self.first_name)?;
        state.serialize_field("last_name", &self.last_name)?;
        state.serialize_field("full_name", &self.full_name())?;
        state.serialize_field("address", &self.address)?;
        state.serialize_field("email", &self.email)?;
        state.serialize_field("phone", &self.phone)?;
        state.serialize_field("identity_id", &self.identity_id)?;
        state.serialize_field("version", &self.version)?;
        if let Some(ref borrowings) = self.borrowings {
            state.serialize_field("borrowings", borrowings)?;
        }
        state.end()
    }
}

/// Create/edit member request. `email` is required on create and must be omitted
/// or unchanged on edit.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct MemberInput {
    pub first_name: String,
    pub last_name: String,
    pub address: Option<String>,
    pub email: Option<String>,
    pub phone: String,
    pub version: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMember {
    pub first_name: String,
    pub last_name: String,
    pub address: Option<String>,
    pub email: String,
    pub phone: String,
    pub identity_id: Option<i32>,
}

impl NewMember {
    /// Build from a validated input; `email` must already be present.
    pub fn from_input(input: MemberInput, email: String, identity_id: Option<i32>) -> Self {
        Self {
            first_name: input.first_name,
            last_name: input.last_name,
            address: input
                .address
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty()),
            email,
            phone: input.phone,
            identity_id,
        }
    }
}

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][a-zA-Z\s-]{2,29}$").expect("valid name pattern"));

static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}[-. ]\d{3}[-. ]\d{3}$").expect("valid phone pattern"));

static MEMBER_RULES: Lazy<Vec<FieldRule>> = Lazy::new(|| {
    vec![
        FieldRule::new("first_name", Check::Required, "The First Name field is required."),
        FieldRule::new(
            "first_name",
            Check::Pattern(NAME_PATTERN.clone()),
            "The First Name must start with a capital letter and contain 3 to 30 letters, spaces or hyphens.",
        ),
        FieldRule::new("last_name", Check::Required, "The Last Name field is required."),
        FieldRule::new(
            "last_name",
            Check::Pattern(NAME_PATTERN.clone()),
            "The Last Name must start with a capital letter and contain 3 to 30 letters, spaces or hyphens.",
        ),
        FieldRule::new(
            "address",
            Check::Length { min: 0, max: 70 },
            "The Address cannot exceed 70 characters.",
        ),
        FieldRule::new("email", Check::Required, "The Email field is required."),
        FieldRule::new(
            "email",
            Check::Email,
            "The Email field is not a valid e-mail address.",
        ),
        FieldRule::new("phone", Check::Required, "The Phone field is required."),
        FieldRule::new(
            "phone",
            Check::Pattern(PHONE_PATTERN.clone()),
            "The Phone must look like 0722-123-123, 0722.123.123 or 0722 123 123.",
        ),
    ]
});

impl Validated for MemberInput {
    fn rules() -> &'static [FieldRule] {
        &MEMBER_RULES
    }

    fn value(&self, field: &str) -> FieldValue<'_> {
        match field {
            "first_name" => FieldValue::Text(Some(&self.first_name)),
            "last_name" => FieldValue::Text(Some(&self.last_name)),
            "address" => FieldValue::Text(self.address.as_deref()),
            "email" => FieldValue::Text(self.email.as_deref()),
            "phone" => FieldValue::Text(Some(&self.phone)),
            _ => FieldValue::Text(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate;

    fn input(first: &str, last: &str, phone: &str) -> MemberInput {
        MemberInput {
            first_name: first.into(),
            last_name: last.into(),
            address: Some("Str. Lunga 12, Brasov".into()),
            email: Some("ana.pop@example.com".into()),
            phone: phone.into(),
            version: None,
        }
    }

    #[test]
    fn accepts_well_formed_member() {
        assert!(validate(&input("Ana", "Pop", "0722-123-123")).is_ok());
        assert!(validate(&input("Ana-Maria", "Pop Ionescu", "0722.123.123")).is_ok());
        assert!(validate(&input("Ana", "Pop", "0722 123 123")).is_ok());
    }

    #[test]
    fn phone_without_separators_fails() {
        let errors = validate(&input("Ana", "Pop", "0722123123")).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.contains_key("phone"));
    }

    #[test]
    fn names_must_be_capitalized_and_long_enough() {
        let errors = validate(&input("ana", "Po", "0722-123-123")).unwrap_err();
        assert_eq!(
            errors["first_name"],
            "The First Name must start with a capital letter and contain 3 to 30 letters, spaces or hyphens."
        );
        assert!(errors.contains_key("last_name"));
    }

    #[test]
    fn address_and_email_limits() {
        let mut member = input("Ana", "Pop", "0722-123-123");
        member.address = Some("a".repeat(71));
        member.email = Some("not-an-email".into());
        let errors = validate(&member).unwrap_err();
        assert_eq!(errors["address"], "The Address cannot exceed 70 characters.");
        assert_eq!(errors["email"], "The Email field is not a valid e-mail address.");

        member.address = None;
        member.email = None;
        let errors = validate(&member).unwrap_err();
        assert_eq!(errors["email"], "The Email field is required.");
        assert!(!errors.contains_key("address"));
    }

    #[test]
    fn full_name_is_serialized() {
        let member = Member {
            id: 4,
            first_name: "Ana".into(),
            last_name: "Pop".into(),
            address: None,
            email: "ana.pop@example.com".into(),
            phone: "0722-123-123".into(),
            identity_id: None,
            version: 1,
            borrowings: None,
        };
        let json = serde_json::to_value(&member).unwrap();
        assert_eq!(json["full_name"], "Ana Pop");
    }
}
