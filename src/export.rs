//! JSON export of whatever records a view is currently showing.

use crate::error::Result;
use serde::Serialize;

pub const PATIENT_EXPORT_FILENAME: &str = "patient_data.json";
pub const QUERY_EXPORT_FILENAME: &str = "patient_query_results.json";

/// Pretty-printed JSON array, two-space indented.
pub fn to_pretty_json<T: Serialize>(records: &[T]) -> Result<String> {
    Ok(serde_json::to_string_pretty(records)?)
}
