//! Data-driven test tables.
//!
//! A table is a JSON array of flat string-valued objects, one row per test
//! case, looked up by a key column (default `"case"`).

use crate::result::{ManejarError, ManejarResult};
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

/// Default key column identifying a row's test case
pub const DEFAULT_KEY_COLUMN: &str = "case";

/// Row-per-case lookup table backed by a JSON file
#[derive(Debug, Clone)]
pub struct DataTable {
    key_column: String,
    rows: Vec<HashMap<String, String>>,
}

impl DataTable {
    /// Load a table from a JSON file using the default key column
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a JSON array of
    /// string-valued objects.
    pub fn load(path: impl AsRef<Path>) -> ManejarResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse a table from JSON text using the default key column
    ///
    /// # Errors
    ///
    /// Returns [`ManejarError::Json`] when the text is not a JSON array of
    /// string-valued objects.
    pub fn parse(json: &str) -> ManejarResult<Self> {
        let rows: Vec<HashMap<String, String>> = serde_json::from_str(json)?;
        Ok(Self {
            key_column: DEFAULT_KEY_COLUMN.to_string(),
            rows,
        })
    }

    /// Use a different column as the case key
    #[must_use]
    pub fn with_key_column(mut self, column: impl Into<String>) -> Self {
        self.key_column = column.into();
        self
    }

    /// Number of rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The case names present in the table, in row order
    pub fn cases(&self) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .filter_map(|row| row.get(&self.key_column).map(String::as_str))
    }

    /// The row for a test case, if present
    #[must_use]
    pub fn row(&self, case: &str) -> Option<&HashMap<String, String>> {
        let found = self
            .rows
            .iter()
            .find(|row| row.get(&self.key_column).is_some_and(|v| v == case));
        if found.is_none() {
            warn!(case, "no row for test case");
        }
        found
    }

    /// One cell: the `column` value of the `case` row
    #[must_use]
    pub fn get(&self, case: &str, column: &str) -> Option<&str> {
        self.row(case)?.get(column).map(String::as_str)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample() -> DataTable {
        DataTable::parse(
            r#"[
                {"case": "valid_login", "username": "admin", "password": "hunter2", "expect": "dashboard"},
                {"case": "bad_password", "username": "admin", "password": "nope", "expect": "error"},
                {"case": "empty_username", "username": "", "password": "hunter2", "expect": "error"}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_lookup_by_case() {
        let table = sample();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get("valid_login", "username"), Some("admin"));
        assert_eq!(table.get("bad_password", "expect"), Some("error"));
    }

    #[test]
    fn test_missing_case_and_column_are_none() {
        let table = sample();
        assert!(table.row("unknown_case").is_none());
        assert!(table.get("valid_login", "unknown_column").is_none());
    }

    #[test]
    fn test_cases_in_row_order() {
        let table = sample();
        let cases: Vec<&str> = table.cases().collect();
        assert_eq!(cases, ["valid_login", "bad_password", "empty_username"]);
    }

    #[test]
    fn test_custom_key_column() {
        let table = DataTable::parse(r#"[{"id": "t1", "value": "42"}]"#)
            .unwrap()
            .with_key_column("id");
        assert_eq!(table.get("t1", "value"), Some("42"));
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(matches!(
            DataTable::parse(r#"{"not": "an array"}"#),
            Err(ManejarError::Json(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"case": "smoke", "url": "/health"}}]"#).unwrap();
        let table = DataTable::load(file.path()).unwrap();
        assert_eq!(table.get("smoke", "url"), Some("/health"));
    }
}
