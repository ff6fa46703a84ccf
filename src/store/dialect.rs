/// SQL differences between the supported stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

const POSTGRES_PATIENTS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS patients (
      id SERIAL PRIMARY KEY,
      first_name TEXT NOT NULL,
      last_name TEXT NOT NULL,
      date_of_birth TEXT NOT NULL,
      gender TEXT NOT NULL,
      email TEXT,
      phone TEXT,
      address TEXT,
      medical_notes TEXT,
      insurance_provider TEXT,
      insurance_id TEXT,
      created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )
"#;

// SERIAL is not a rowid alias in SQLite; AUTOINCREMENT keeps ids monotonic.
const SQLITE_PATIENTS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS patients (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      first_name TEXT NOT NULL,
      last_name TEXT NOT NULL,
      date_of_birth TEXT NOT NULL,
      gender TEXT NOT NULL,
      email TEXT,
      phone TEXT,
      address TEXT,
      medical_notes TEXT,
      insurance_provider TEXT,
      insurance_id TEXT,
      created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )
"#;

const PATIENT_NAME_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_patient_name ON patients (last_name, first_name)";

impl Dialect {
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
        }
    }

    /// Statements that bring an empty store up to the patients schema.
    /// Every statement is safe to run against an existing schema.
    pub fn schema_statements(&self) -> [&'static str; 2] {
        match self {
            Dialect::Sqlite => [SQLITE_PATIENTS_TABLE, PATIENT_NAME_INDEX],
            Dialect::Postgres => [POSTGRES_PATIENTS_TABLE, PATIENT_NAME_INDEX],
        }
    }

    /// Positional placeholder for the 1-based parameter `index`.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Sqlite => format!("?{}", index),
            Dialect::Postgres => format!("${}", index),
        }
    }

    /// Condition that `column` matches the LIKE pattern bound at
    /// `placeholder`, ignoring case. SQLite's own LIKE only folds ASCII, so
    /// both sides go through [`FOLD_CASE_FUNCTION`] first.
    pub fn case_insensitive_match(&self, column: &str, placeholder: &str) -> String {
        match self {
            Dialect::Sqlite => format!(
                "{f}({column}) LIKE {f}({placeholder}) ESCAPE '\\'",
                f = FOLD_CASE_FUNCTION
            ),
            Dialect::Postgres => format!("{column} ILIKE {placeholder} ESCAPE '\\'"),
        }
    }
}

/// Unicode lowercase scalar function every SQLite connection registers.
pub const FOLD_CASE_FUNCTION: &str = "fold_case";

/// Wrap a search fragment as a "contains" pattern, escaping LIKE wildcards
/// so the fragment matches literally. Pair with `ESCAPE '\'`.
pub fn contains_pattern(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len() + 2);
    escaped.push('%');
    for c in fragment.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
