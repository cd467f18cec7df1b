//! Form-field rules for the employee and registration forms. Only field presence
//! and shape are checked here; everything else is the backend's call.

mod reference;

pub use reference::{COUNTRIES, US_STATES};

use crate::api::{EmployeeInput, EmployeePatch, Employer};
use regex::Regex;
use std::fmt;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

/// Every failing field of one form submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    fn push(&mut self, field: &'static str, message: &'static str) {
        self.errors.push(FieldError { field, message });
    }

    fn into_result(self) -> Result<(), Self> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.errors.iter().any(|error| error.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.errors.iter().map(|error| error.message).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").map_or(false, |re| re.is_match(email))
}

const EMPLOYEE_RULES: [(&str, &str); 7] = [
    ("name", "Enter employee name"),
    ("ssn", "Enter SSN"),
    ("address1", "Enter address"),
    ("city", "Enter city"),
    ("state", "Enter state"),
    ("zip", "Enter zip code"),
    ("country", "Enter country"),
];

fn employee_field<'a>(input: &'a EmployeeInput, field: &str) -> &'a str {
    match field {
        "name" => &input.name,
        "ssn" => &input.ssn,
        "address1" => &input.address1,
        "city" => &input.city,
        "state" => &input.state,
        "zip" => &input.zip,
        "country" => &input.country,
        _ => "",
    }
}

// state and country are picked from fixed lists
fn check_choice(errors: &mut ValidationErrors, field: &'static str, value: &str) {
    let (choices, message): (&[&str], _) = match field {
        "state" => (&US_STATES[..], "Select a state from the list"),
        "country" => (&COUNTRIES[..], "Select a country from the list"),
        _ => return,
    };

    if !blank(value) && !choices.contains(&value.trim()) {
        errors.push(field, message);
    }
}

/// Checks the add-employee form. `address2` is optional.
///
/// # Errors
/// Returns every required field left blank and any state or country not in
/// [`US_STATES`] or [`COUNTRIES`].
pub fn validate_employee(input: &EmployeeInput) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    for (field, message) in EMPLOYEE_RULES {
        let value = employee_field(input, field);
        if blank(value) {
            errors.push(field, message);
        } else {
            check_choice(&mut errors, field, value);
        }
    }
    errors.into_result()
}

/// Checks the edit-employee form: fields being changed must not be cleared, and a
/// changed state or country must come from its list.
///
/// # Errors
/// Returns every failing field.
pub fn validate_employee_patch(patch: &EmployeePatch) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let fields = [
        ("name", &patch.name),
        ("ssn", &patch.ssn),
        ("address1", &patch.address1),
        ("city", &patch.city),
        ("state", &patch.state),
        ("zip", &patch.zip),
        ("country", &patch.country),
    ];

    for (field, value) in fields {
        let Some(value) = value.as_deref() else {
            continue;
        };
        if blank(value) {
            if let Some(&(_, message)) = EMPLOYEE_RULES.iter().find(|(name, _)| *name == field) {
                errors.push(field, message);
            }
        } else {
            check_choice(&mut errors, field, value);
        }
    }
    errors.into_result()
}

/// Checks the registration form, including the password confirmation.
///
/// # Errors
/// Returns every failing field.
pub fn validate_registration(employer: &Employer, confirm_password: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    if blank(&employer.name) {
        errors.push("name", "Enter company name");
    }

    if blank(&employer.email) {
        errors.push("email", "Enter work email");
    } else if !valid_email(employer.email.trim()) {
        errors.push("email", "Enter a valid email address");
    }

    let password = employer.password.as_deref().unwrap_or_default();
    if password != confirm_password {
        errors.push("password", "Passwords do not match");
    } else if password.len() < MIN_PASSWORD_LEN {
        errors.push("password", "Password must be at least 6 characters long");
    }

    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee() -> EmployeeInput {
        EmployeeInput {
            name: "Ann".to_string(),
            ssn: "123-45-6789".to_string(),
            address1: "1 Main St".to_string(),
            address2: String::new(),
            city: "Springfield".to_string(),
            state: "Illinois".to_string(),
            zip: "62701".to_string(),
            country: "USA".to_string(),
        }
    }

    fn employer(password: &str) -> Employer {
        Employer {
            id: None,
            name: "Acme".to_string(),
            email: "boss@acme.tld".to_string(),
            password: Some(password.to_string()),
        }
    }

    #[test]
    fn complete_employee_passes_without_address2() {
        assert!(validate_employee(&employee()).is_ok());
    }

    #[test]
    fn blank_fields_are_all_reported() {
        let input = EmployeeInput {
            name: "  ".to_string(),
            zip: String::new(),
            ..employee()
        };
        let errors = validate_employee(&input).unwrap_err();
        assert_eq!(errors.errors().len(), 2);
        assert!(errors.has("name"));
        assert!(errors.has("zip"));
        assert_eq!(errors.to_string(), "Enter employee name; Enter zip code");
    }

    #[test]
    fn empty_form_reports_every_required_field() {
        let errors = validate_employee(&EmployeeInput::default()).unwrap_err();
        assert_eq!(errors.errors().len(), EMPLOYEE_RULES.len());
        assert!(!errors.has("address2"));
    }

    #[test]
    fn patch_rejects_cleared_required_field() {
        let patch = EmployeePatch {
            city: Some(" ".to_string()),
            address2: Some(String::new()),
            ..EmployeePatch::default()
        };
        let errors = validate_employee_patch(&patch).unwrap_err();
        assert_eq!(
            errors.errors(),
            &[FieldError {
                field: "city",
                message: "Enter city"
            }]
        );

        assert!(validate_employee_patch(&EmployeePatch::default()).is_ok());
    }

    #[test]
    fn unknown_state_and_country_are_rejected() {
        let input = EmployeeInput {
            state: "Atlantis".to_string(),
            country: "Narnia".to_string(),
            ..employee()
        };
        let errors = validate_employee(&input).unwrap_err();
        assert_eq!(
            errors.to_string(),
            "Select a state from the list; Select a country from the list"
        );

        let patch = EmployeePatch {
            state: Some("Atlantis".to_string()),
            ..EmployeePatch::default()
        };
        let errors = validate_employee_patch(&patch).unwrap_err();
        assert!(errors.has("state"));

        let patch = EmployeePatch {
            state: Some(" Texas ".to_string()),
            country: Some("Mexico".to_string()),
            ..EmployeePatch::default()
        };
        assert!(validate_employee_patch(&patch).is_ok());
    }

    #[test]
    fn registration_password_rules() {
        assert!(validate_registration(&employer("hunter22"), "hunter22").is_ok());

        let mismatch = validate_registration(&employer("hunter22"), "hunter23").unwrap_err();
        assert_eq!(mismatch.to_string(), "Passwords do not match");

        let short = validate_registration(&employer("abc"), "abc").unwrap_err();
        assert_eq!(
            short.to_string(),
            "Password must be at least 6 characters long"
        );
    }

    #[test]
    fn registration_email_rules() {
        let mut bad = employer("hunter22");
        bad.email = "not-an-email".to_string();
        assert!(validate_registration(&bad, "hunter22").unwrap_err().has("email"));

        bad.email = String::new();
        bad.name = String::new();
        let errors = validate_registration(&bad, "hunter22").unwrap_err();
        assert!(errors.has("email"));
        assert!(errors.has("name"));
    }

    #[test]
    fn reference_lists() {
        assert_eq!(US_STATES.len(), 50);
        assert!(US_STATES.contains(&"New Hampshire"));
        assert_eq!(COUNTRIES, ["USA", "Canada", "Mexico"]);
    }
}
