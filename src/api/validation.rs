//! Registration form validation
//!
//! Runs before the gateway is called; the gateway itself trusts its input.

use crate::error::{GatewayError, Result};
use crate::patient::{parse_date_of_birth, Gender, NewPatient};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Raw form submission. Missing required fields arrive as empty strings so
/// they can be reported per field instead of as a malformed body.
#[derive(Debug, Default, Deserialize)]
pub struct RegistrationForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub date_of_birth: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub medical_notes: Option<String>,
    #[serde(default)]
    pub insurance_provider: Option<String>,
    #[serde(default)]
    pub insurance_id: Option<String>,
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"))
}

pub fn validate_registration(form: RegistrationForm) -> Result<NewPatient> {
    let mut errors = BTreeMap::new();

    if form.first_name.trim().is_empty() {
        errors.insert("first_name".to_string(), "First name is required".to_string());
    }

    if form.last_name.trim().is_empty() {
        errors.insert("last_name".to_string(), "Last name is required".to_string());
    }

    if form.date_of_birth.trim().is_empty() {
        errors.insert(
            "date_of_birth".to_string(),
            "Date of birth is required".to_string(),
        );
    } else if parse_date_of_birth(&form.date_of_birth).is_none() {
        errors.insert(
            "date_of_birth".to_string(),
            "Date of birth must be a date (YYYY-MM-DD)".to_string(),
        );
    }

    let gender = if form.gender.is_empty() {
        errors.insert("gender".to_string(), "Gender is required".to_string());
        None
    } else {
        let parsed = form.gender.parse::<Gender>().ok();
        if parsed.is_none() {
            errors.insert("gender".to_string(), "Invalid gender".to_string());
        }
        parsed
    };

    if let Some(email) = form.email.as_deref().filter(|e| !e.is_empty()) {
        if !email_pattern().is_match(email) {
            errors.insert("email".to_string(), "Invalid email format".to_string());
        }
    }

    let gender = match gender {
        Some(gender) if errors.is_empty() => gender,
        _ => return Err(GatewayError::Validation { errors }),
    };

    Ok(NewPatient {
        first_name: form.first_name.trim().to_string(),
        last_name: form.last_name.trim().to_string(),
        date_of_birth: form.date_of_birth.trim().to_string(),
        gender: gender.as_str().to_string(),
        email: form.email,
        phone: form.phone,
        address: form.address,
        medical_notes: form.medical_notes,
        insurance_provider: form.insurance_provider,
        insurance_id: form.insurance_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_form() -> RegistrationForm {
        RegistrationForm {
            first_name: " Jane ".to_string(),
            last_name: "Doe".to_string(),
            date_of_birth: "1990-01-01".to_string(),
            gender: "female".to_string(),
            ..Default::default()
        }
    }

    fn field_errors(form: RegistrationForm) -> BTreeMap<String, String> {
        match validate_registration(form) {
            Err(GatewayError::Validation { errors }) => errors,
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_form_trims_required_fields() {
        let patient = validate_registration(valid_form()).unwrap();
        assert_eq!(patient.first_name, "Jane");
        assert_eq!(patient.gender, "female");
        assert_eq!(patient.email, None);
    }

    #[test]
    fn test_missing_required_fields() {
        let errors = field_errors(RegistrationForm::default());
        assert_eq!(errors.len(), 4);
        assert_eq!(errors["first_name"], "First name is required");
        assert_eq!(errors["last_name"], "Last name is required");
        assert_eq!(errors["date_of_birth"], "Date of birth is required");
        assert_eq!(errors["gender"], "Gender is required");
    }

    #[test]
    fn test_whitespace_name_is_missing() {
        let errors = field_errors(RegistrationForm {
            last_name: "   ".to_string(),
            ..valid_form()
        });
        assert_eq!(errors.keys().collect::<Vec<_>>(), vec!["last_name"]);
    }

    #[test]
    fn test_bad_date_and_gender() {
        let errors = field_errors(RegistrationForm {
            date_of_birth: "31/12/1990".to_string(),
            gender: "unknown".to_string(),
            ..valid_form()
        });
        assert!(errors.contains_key("date_of_birth"));
        assert_eq!(errors["gender"], "Invalid gender");
    }

    #[test]
    fn test_email_format() {
        let errors = field_errors(RegistrationForm {
            email: Some("not-an-email".to_string()),
            ..valid_form()
        });
        assert_eq!(errors["email"], "Invalid email format");

        let ok = validate_registration(RegistrationForm {
            email: Some("jane@example.com".to_string()),
            ..valid_form()
        });
        assert!(ok.is_ok());
    }

    #[test]
    fn test_empty_email_is_allowed() {
        let patient = validate_registration(RegistrationForm {
            email: Some(String::new()),
            ..valid_form()
        })
        .unwrap();
        // Normalization to NULL happens at the gateway.
        assert_eq!(patient.email.as_deref(), Some(""));
    }
}
