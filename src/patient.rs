//! Patient records
//!
//! `NewPatient` is what a registration form submits; `Patient` is what the
//! store hands back. Records are append-only: there is no update or delete.

use crate::store::Row;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Column list in the order the gateway reads and writes them.
pub const PATIENT_COLUMNS: &str = "\
    id, first_name, last_name, date_of_birth, gender, email, phone, address, \
    medical_notes, insurance_provider, insurance_id, created_at";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
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

impl NewPatient {
    /// Convert blank optional fields to `None` so they are stored as NULL,
    /// never as empty strings. Required fields are left untouched.
    pub fn normalized(mut self) -> Self {
        for field in [
            &mut self.email,
            &mut self.phone,
            &mut self.address,
            &mut self.medical_notes,
            &mut self.insurance_provider,
            &mut self.insurance_id,
        ] {
            if field.as_deref().is_some_and(|s| s.trim().is_empty()) {
                *field = None;
            }
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
    pub gender: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub medical_notes: Option<String>,
    pub insurance_provider: Option<String>,
    pub insurance_id: Option<String>,
    /// NULL when a row was written without the column default.
    pub created_at: Option<NaiveDateTime>,
}

/// Why a result row could not be read as a [`Patient`].
#[derive(Debug, Clone, PartialEq)]
pub struct RowShapeError {
    pub column: &'static str,
    pub problem: &'static str,
}

impl fmt::Display for RowShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "column '{}' {}", self.column, self.problem)
    }
}

impl TryFrom<&Row> for Patient {
    type Error = RowShapeError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(Patient {
            id: required_int(row, "id")?,
            first_name: required_text(row, "first_name")?,
            last_name: required_text(row, "last_name")?,
            date_of_birth: required_text(row, "date_of_birth")?,
            gender: required_text(row, "gender")?,
            email: optional_text(row, "email")?,
            phone: optional_text(row, "phone")?,
            address: optional_text(row, "address")?,
            medical_notes: optional_text(row, "medical_notes")?,
            insurance_provider: optional_text(row, "insurance_provider")?,
            insurance_id: optional_text(row, "insurance_id")?,
            created_at: timestamp(row, "created_at")?,
        })
    }
}

fn column<'a>(row: &'a Row, name: &'static str) -> Result<&'a Value, RowShapeError> {
    row.get(name).ok_or(RowShapeError {
        column: name,
        problem: "is missing",
    })
}

fn required_int(row: &Row, name: &'static str) -> Result<i64, RowShapeError> {
    column(row, name)?.as_i64().ok_or(RowShapeError {
        column: name,
        problem: "is not an integer",
    })
}

fn required_text(row: &Row, name: &'static str) -> Result<String, RowShapeError> {
    match column(row, name)? {
        Value::String(s) => Ok(s.clone()),
        _ => Err(RowShapeError {
            column: name,
            problem: "is not text",
        }),
    }
}

fn optional_text(row: &Row, name: &'static str) -> Result<Option<String>, RowShapeError> {
    match column(row, name)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        _ => Err(RowShapeError {
            column: name,
            problem: "is not text",
        }),
    }
}

fn timestamp(row: &Row, name: &'static str) -> Result<Option<NaiveDateTime>, RowShapeError> {
    let bad = RowShapeError {
        column: name,
        problem: "is not a timestamp",
    };
    let s = match column(row, name)? {
        Value::Null => return Ok(None),
        Value::String(s) => s,
        _ => return Err(bad),
    };
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(Some)
        .ok_or(bad)
}

/// Genders offered by the registration form. The store keeps plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
    PreferNotToSay,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
            Gender::PreferNotToSay => "prefer_not_to_say",
        }
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            "prefer_not_to_say" => Ok(Gender::PreferNotToSay),
            _ => Err(format!("Unknown gender: {}", s)),
        }
    }
}

/// Parse a calendar date in `YYYY-MM-DD` form.
pub fn parse_date_of_birth(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}
