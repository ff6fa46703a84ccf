//! Patient endpoints
//!
//! - POST /patients - Register a patient from a form submission
//! - GET /patients - List patients, optionally filtered by name and sorted
//! - GET /patients/export - Download the same listing as JSON

use crate::api::validation::{validate_registration, RegistrationForm};
use crate::api::{json_attachment, AppState};
use crate::error::Result;
use crate::export::{to_pretty_json, PATIENT_EXPORT_FILENAME};
use crate::patient::Patient;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::cmp::Ordering;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Id,
    FirstName,
    LastName,
    DateOfBirth,
    Gender,
    Email,
    Phone,
    Address,
    MedicalNotes,
    InsuranceProvider,
    InsuranceId,
    CreatedAt,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub search: Option<String>,
    pub sort: Option<SortField>,
    #[serde(default)]
    pub order: SortOrder,
}

pub async fn register_patient(
    State(state): State<AppState>,
    Json(form): Json<RegistrationForm>,
) -> Result<impl IntoResponse> {
    let patient = validate_registration(form)?;
    let stored = state.gateway.register(patient).await?;

    Ok((StatusCode::CREATED, Json(stored)))
}

pub async fn list_patients(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Patient>>> {
    Ok(Json(load_patients(&state, &params).await?))
}

pub async fn export_patients(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Response> {
    let patients = load_patients(&state, &params).await?;
    let body = to_pretty_json(&patients)?;

    Ok(json_attachment(PATIENT_EXPORT_FILENAME, body))
}

async fn load_patients(state: &AppState, params: &ListParams) -> Result<Vec<Patient>> {
    let term = params.search.as_deref().map(str::trim).unwrap_or_default();

    let mut patients = if term.is_empty() {
        state.gateway.list_all().await?
    } else {
        state.gateway.search_by_name(term).await?
    };

    if let Some(field) = params.sort {
        debug!("Sorting {} patients by {:?} {:?}", patients.len(), field, params.order);
        sort_patients(&mut patients, field, params.order);
    }

    Ok(patients)
}

/// Stable sort on one field. Text compares without regard to case; missing
/// values sort after present ones when ascending.
pub fn sort_patients(patients: &mut [Patient], field: SortField, order: SortOrder) {
    patients.sort_by(|a, b| {
        let ordering = compare(a, b, field);
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

fn compare(a: &Patient, b: &Patient, field: SortField) -> Ordering {
    let text = |x: &str, y: &str| compare_text(Some(x), Some(y));
    match field {
        SortField::Id => a.id.cmp(&b.id),
        SortField::CreatedAt => missing_last(a.created_at, b.created_at),
        SortField::FirstName => text(&a.first_name, &b.first_name),
        SortField::LastName => text(&a.last_name, &b.last_name),
        SortField::DateOfBirth => text(&a.date_of_birth, &b.date_of_birth),
        SortField::Gender => text(&a.gender, &b.gender),
        SortField::Email => compare_text(a.email.as_deref(), b.email.as_deref()),
        SortField::Phone => compare_text(a.phone.as_deref(), b.phone.as_deref()),
        SortField::Address => compare_text(a.address.as_deref(), b.address.as_deref()),
        SortField::MedicalNotes => {
            compare_text(a.medical_notes.as_deref(), b.medical_notes.as_deref())
        }
        SortField::InsuranceProvider => compare_text(
            a.insurance_provider.as_deref(),
            b.insurance_provider.as_deref(),
        ),
        SortField::InsuranceId => {
            compare_text(a.insurance_id.as_deref(), b.insurance_id.as_deref())
        }
    }
}

fn compare_text(a: Option<&str>, b: Option<&str>) -> Ordering {
    missing_last(a.map(str::to_lowercase), b.map(str::to_lowercase))
}

fn missing_last<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn patient(id: i64, first: &str, last: &str, email: Option<&str>) -> Patient {
        Patient {
            id,
            first_name: first.to_string(),
            last_name: last.to_string(),
            date_of_birth: "1990-01-01".to_string(),
            gender: "other".to_string(),
            email: email.map(str::to_string),
            phone: None,
            address: None,
            medical_notes: None,
            insurance_provider: None,
            insurance_id: None,
            created_at: NaiveDate::from_ymd_opt(2024, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, id as u32)),
        }
    }

    fn ids(patients: &[Patient]) -> Vec<i64> {
        patients.iter().map(|p| p.id).collect()
    }

    #[test]
    fn test_sort_text_ignores_case() {
        let mut patients = vec![
            patient(1, "bob", "x", None),
            patient(2, "Alice", "x", None),
            patient(3, "carol", "x", None),
        ];
        sort_patients(&mut patients, SortField::FirstName, SortOrder::Asc);
        assert_eq!(ids(&patients), vec![2, 1, 3]);

        sort_patients(&mut patients, SortField::FirstName, SortOrder::Desc);
        assert_eq!(ids(&patients), vec![3, 1, 2]);
    }

    #[test]
    fn test_sort_missing_values_last() {
        let mut patients = vec![
            patient(1, "a", "x", None),
            patient(2, "b", "x", Some("zed@example.com")),
            patient(3, "c", "x", Some("amy@example.com")),
        ];
        sort_patients(&mut patients, SortField::Email, SortOrder::Asc);
        assert_eq!(ids(&patients), vec![3, 2, 1]);
    }

    #[test]
    fn test_sort_by_id_and_created_at() {
        let mut patients = vec![
            patient(3, "a", "x", None),
            patient(1, "b", "x", None),
            patient(2, "c", "x", None),
        ];
        sort_patients(&mut patients, SortField::Id, SortOrder::Desc);
        assert_eq!(ids(&patients), vec![3, 2, 1]);

        sort_patients(&mut patients, SortField::CreatedAt, SortOrder::Asc);
        assert_eq!(ids(&patients), vec![1, 2, 3]);
    }

    #[test]
    fn test_sort_missing_created_at_last() {
        let mut patients = vec![
            patient(2, "a", "x", None),
            patient(1, "b", "x", None),
            patient(3, "c", "x", None),
        ];
        patients[1].created_at = None;

        sort_patients(&mut patients, SortField::CreatedAt, SortOrder::Asc);
        assert_eq!(ids(&patients), vec![2, 3, 1]);
    }

    #[test]
    fn test_list_params_parse() {
        let params: ListParams =
            serde_json::from_value(serde_json::json!({"sort": "date_of_birth", "order": "desc"}))
                .unwrap();
        assert_eq!(params.sort, Some(SortField::DateOfBirth));
        assert_eq!(params.order, SortOrder::Desc);
        assert!(params.search.is_none());
    }
}
