//! Declarative form descriptors plus the one routine that validates and
//! clears any form built from them.

use crate::error::ValidationError;
use crate::models::{BookStatus, MembershipType, UserStatus};

/// How a field's raw text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    /// One of a fixed set of labels.
    Choice(&'static [&'static str]),
    /// Non-negative integer typed as digits.
    Integer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    /// Value placed in the field when the form is cleared.
    pub default: &'static str,
}

impl FieldSpec {
    const fn text(name: &'static str, label: &'static str, required: bool) -> Self {
        Self {
            name,
            label,
            kind: FieldKind::Text,
            required,
            default: "",
        }
    }

    const fn choice(
        name: &'static str,
        label: &'static str,
        options: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            label,
            kind: FieldKind::Choice(options),
            required: true,
            default: options[0],
        }
    }
}

pub const BOOK_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "book_number",
        label: "Book Number",
        kind: FieldKind::Integer,
        required: true,
        default: "",
    },
    FieldSpec::text("title", "Title", true),
    FieldSpec::text("author", "Author", true),
    FieldSpec::text("translator", "Translator", false),
    FieldSpec::text("pub_date", "Publication Date", false),
    FieldSpec::text("isbn", "ISBN", false),
    FieldSpec::text("language", "Language", false),
    FieldSpec::text("genre", "Genre", false),
    FieldSpec::text("edition", "Edition", false),
    FieldSpec::choice("status", "Status", BookStatus::LABELS),
];

pub const USER_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("name", "Full Name", true),
    FieldSpec::text("email", "Email", true),
    FieldSpec::text("phone", "Phone", false),
    FieldSpec::choice("membership_type", "Membership Type", MembershipType::LABELS),
    FieldSpec::choice("status", "Status", UserStatus::LABELS),
];

/// A cleaned field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Integer(Option<i64>),
}

/// Cleaned values keyed by field name, in descriptor order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanedForm {
    values: Vec<(&'static str, FieldValue)>,
}

impl CleanedForm {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
    }

    /// Trimmed text of a field, or "" when the field is absent or numeric.
    pub fn text(&self, name: &str) -> &str {
        match self.get(name) {
            Some(FieldValue::Text(value)) => value,
            _ => "",
        }
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(FieldValue::Integer(value)) => *value,
            _ => None,
        }
    }
}

/// Outcome of a validation pass: cleaned data plus every failing field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    pub cleaned: CleanedForm,
    pub errors: Vec<&'static str>,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn ensure_valid(&self) -> Result<(), ValidationError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(ValidationError::new(self.errors.clone()))
        }
    }
}

/// Parse a trimmed string of ASCII digits. Anything else, including
/// overflow, yields `None`.
pub fn parse_non_negative(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    trimmed.parse().ok()
}

/// Validate raw text against a descriptor list. `raw` is positional; missing
/// trailing entries are treated as empty input.
pub fn validate(specs: &[FieldSpec], raw: &[String]) -> Validation {
    let mut validation = Validation::default();

    for (idx, spec) in specs.iter().enumerate() {
        let input = raw.get(idx).map(|value| value.trim()).unwrap_or("");
        let (value, ok) = match spec.kind {
            FieldKind::Text => (
                FieldValue::Text(input.to_string()),
                !(spec.required && input.is_empty()),
            ),
            FieldKind::Integer => {
                let parsed = parse_non_negative(input);
                (
                    FieldValue::Integer(parsed),
                    !(spec.required && parsed.is_none()),
                )
            }
            FieldKind::Choice(options) => {
                let chosen = if input.is_empty() { spec.default } else { input };
                (
                    FieldValue::Text(chosen.to_string()),
                    options.contains(&chosen),
                )
            }
        };

        if !ok {
            validation.errors.push(spec.name);
        }
        validation.cleaned.values.push((spec.name, value));
    }

    validation
}

/// Default raw values for a freshly cleared form.
pub fn blank_values(specs: &[FieldSpec]) -> Vec<String> {
    specs.iter().map(|spec| spec.default.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookDraft, UserDraft};

    fn raw(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn complete_book_form_has_no_errors() {
        let input = raw(&[
            " 1001 ",
            "  Alice in Wonderland ",
            "Lewis Carroll",
            "",
            "1865",
            "",
            "English",
            "Fiction",
            "1st",
            "Available",
        ]);
        let validation = validate(BOOK_FIELDS, &input);
        assert!(validation.is_valid());
        assert_eq!(validation.cleaned.integer("book_number"), Some(1001));
        assert_eq!(validation.cleaned.text("title"), "Alice in Wonderland");

        let draft = BookDraft::from_validation(&validation).unwrap();
        assert_eq!(draft.book_number, 1001);
        assert_eq!(draft.status, BookStatus::Available);
    }

    #[test]
    fn missing_required_fields_are_all_reported() {
        let input = raw(&["abc", "  ", "", "someone"]);
        let validation = validate(BOOK_FIELDS, &input);
        assert_eq!(validation.errors, vec!["book_number", "title", "author"]);
        assert_eq!(validation.cleaned.integer("book_number"), None);

        let err = BookDraft::from_validation(&validation).unwrap_err();
        assert_eq!(err.fields, vec!["book_number", "title", "author"]);
    }

    #[test]
    fn negative_or_fractional_numbers_are_rejected() {
        assert_eq!(parse_non_negative("-3"), None);
        assert_eq!(parse_non_negative("3.5"), None);
        assert_eq!(parse_non_negative("99999999999999999999999"), None);
        assert_eq!(parse_non_negative(" 42 "), Some(42));
    }

    #[test]
    fn empty_choice_falls_back_to_default() {
        let validation = validate(USER_FIELDS, &raw(&["Ada", "ada@example.com"]));
        assert!(validation.is_valid());
        let draft = UserDraft::from_validation(&validation).unwrap();
        assert_eq!(draft.membership_type, MembershipType::Regular);
        assert_eq!(draft.status, UserStatus::Active);
    }

    #[test]
    fn unknown_choice_is_an_error() {
        let validation = validate(
            USER_FIELDS,
            &raw(&["Ada", "ada@example.com", "", "Gold", "Active"]),
        );
        assert_eq!(validation.errors, vec!["membership_type"]);
    }

    #[test]
    fn user_requires_name_and_email() {
        let validation = validate(USER_FIELDS, &raw(&["", " ", "555"]));
        assert_eq!(validation.errors, vec!["name", "email"]);
    }

    #[test]
    fn blank_values_use_defaults() {
        let blank = blank_values(USER_FIELDS);
        assert_eq!(blank, raw(&["", "", "", "Regular", "Active"]));
    }
}
