//! Patient data access gateway
//!
//! The single point of contact between request handlers and the store. It is
//! constructed once at startup and shared as `Arc<Gateway>`; the store itself
//! is opened lazily on first use (see [`handle`]).
//!
//! `register`, `list_all` and `search_by_name` propagate failures.
//! `execute` is the query console's conduit for free-form SQL and always
//! answers with a [`QueryEnvelope`] instead.

mod handle;
#[cfg(test)]
pub(crate) mod testing;

pub use handle::HandleStatus;

use crate::error::{GatewayError, Result};
use crate::patient::{NewPatient, Patient, PATIENT_COLUMNS};
use crate::store::{contains_pattern, QueryResult, Row, SqlValue, StoreConnector};
use handle::StoreHandle;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const EXECUTE_FALLBACK_ERROR: &str = "An error occurred while executing the query";

/// Result wrapper for free-form queries. Exactly one of `rows` (possibly
/// empty) or `error` is meaningful, as told by `success`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryEnvelope {
    pub success: bool,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub error: Option<String>,
}

impl QueryEnvelope {
    fn success(result: QueryResult) -> Self {
        Self {
            success: true,
            columns: result.columns,
            rows: result.rows,
            error: None,
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            columns: Vec::new(),
            rows: Vec::new(),
            error: Some(if message.trim().is_empty() {
                EXECUTE_FALLBACK_ERROR.to_string()
            } else {
                message
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayStatus {
    pub backend: &'static str,
    #[serde(flatten)]
    pub handle: HandleStatus,
}

pub struct Gateway {
    store: StoreHandle,
}

impl Gateway {
    pub fn new(connector: Arc<dyn StoreConnector>) -> Self {
        Self {
            store: StoreHandle::new(connector),
        }
    }

    pub fn status(&self) -> GatewayStatus {
        GatewayStatus {
            backend: self.store.backend(),
            handle: self.store.status(),
        }
    }

    /// Open the store and create the schema if that has not happened yet.
    pub async fn ensure_ready(&self) -> Result<()> {
        self.store.get().await.map(|_| ())
    }

    /// Insert a patient and return the stored row. Blank optional fields are
    /// stored as NULL. Required fields are not re-validated here.
    pub async fn register(&self, patient: NewPatient) -> Result<Patient> {
        const OPERATION: &str = "register patient";

        let store = self.store.get().await?;
        let dialect = store.dialect();
        let patient = patient.normalized();

        let placeholders: Vec<String> = (1..=10).map(|i| dialect.placeholder(i)).collect();
        let sql = format!(
            "INSERT INTO patients \
             (first_name, last_name, date_of_birth, gender, email, phone, address, \
             medical_notes, insurance_provider, insurance_id) \
             VALUES ({}) RETURNING {}",
            placeholders.join(", "),
            PATIENT_COLUMNS
        );
        let params = [
            SqlValue::from(patient.first_name),
            SqlValue::from(patient.last_name),
            SqlValue::from(patient.date_of_birth),
            SqlValue::from(patient.gender),
            SqlValue::from(patient.email),
            SqlValue::from(patient.phone),
            SqlValue::from(patient.address),
            SqlValue::from(patient.medical_notes),
            SqlValue::from(patient.insurance_provider),
            SqlValue::from(patient.insurance_id),
        ];

        let result = store.query(&sql, &params).await.map_err(|e| {
            warn!("Error registering patient: {}", e);
            GatewayError::query(OPERATION, e.to_string())
        })?;

        let stored = patients_from(OPERATION, result)?
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::query(OPERATION, "insert returned no row"))?;

        info!("Registered patient {}", stored.id);
        Ok(stored)
    }

    /// Every patient, ordered by last name then first name.
    pub async fn list_all(&self) -> Result<Vec<Patient>> {
        const OPERATION: &str = "list patients";

        let store = self.store.get().await?;
        let sql = format!(
            "SELECT {} FROM patients ORDER BY last_name, first_name",
            PATIENT_COLUMNS
        );

        let result = store.query(&sql, &[]).await.map_err(|e| {
            warn!("Error executing list query: {}", e);
            GatewayError::query(OPERATION, e.to_string())
        })?;

        let patients = patients_from(OPERATION, result)?;
        debug!("Listed {} patients", patients.len());
        Ok(patients)
    }

    /// Patients whose first or last name contains `term`, ignoring case.
    pub async fn search_by_name(&self, term: &str) -> Result<Vec<Patient>> {
        const OPERATION: &str = "search patients";

        let store = self.store.get().await?;
        let dialect = store.dialect();
        let p = dialect.placeholder(1);
        let sql = format!(
            "SELECT {} FROM patients WHERE {} OR {} ORDER BY last_name, first_name",
            PATIENT_COLUMNS,
            dialect.case_insensitive_match("first_name", &p),
            dialect.case_insensitive_match("last_name", &p),
        );

        let result = store
            .query(&sql, &[SqlValue::Text(contains_pattern(term))])
            .await
            .map_err(|e| {
                warn!("Error executing search query: {}", e);
                GatewayError::query(OPERATION, e.to_string())
            })?;

        let patients = patients_from(OPERATION, result)?;
        debug!("Search for {:?} matched {} patients", term, patients.len());
        Ok(patients)
    }

    /// Run arbitrary SQL. Never fails: every problem, including a store that
    /// cannot be opened, is reported inside the envelope.
    pub async fn execute(&self, sql: &str, params: &[SqlValue]) -> QueryEnvelope {
        if sql.trim().is_empty() {
            return QueryEnvelope::failure("Query text is empty");
        }

        let store = match self.store.get().await {
            Ok(store) => store,
            Err(e) => {
                warn!("Query console unavailable: {}", e);
                return QueryEnvelope::failure(e.to_string());
            }
        };

        let start_time = Instant::now();
        debug!("Executing query: {} with {} params", sql, params.len());

        match store.query(sql, params).await {
            Ok(result) => {
                debug!(
                    "Query returned {} rows in {}ms",
                    result.rows.len(),
                    start_time.elapsed().as_millis()
                );
                QueryEnvelope::success(result)
            }
            Err(e) => {
                warn!("Query execution error: {}", e);
                QueryEnvelope::failure(e.to_string())
            }
        }
    }
}

/// A row that does not read as a patient fails the whole operation rather
/// than being skipped.
fn patients_from(operation: &str, result: QueryResult) -> Result<Vec<Patient>> {
    result
        .rows
        .iter()
        .map(|row| {
            Patient::try_from(row).map_err(|e| {
                GatewayError::query(operation, format!("unexpected result shape: {}", e))
            })
        })
        .collect()
}
