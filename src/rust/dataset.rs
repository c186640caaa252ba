use std::path::Path;

use log::info;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpendcatError};

/// A transaction to categorize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub description: String,
    pub amount: f64,
}

impl Transaction {
    pub fn new(description: impl Into<String>, amount: f64) -> Self {
        Self {
            description: description.into(),
            amount,
        }
    }
}

/// A labeled transaction used for training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRow {
    pub description: String,
    pub amount: f64,
    pub category: String,
}

impl TrainingRow {
    pub fn new(description: impl Into<String>, amount: f64, category: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            amount,
            category: category.into(),
        }
    }

    /// Rejects rows the pipeline cannot learn from.
    pub fn validate(&self) -> Result<()> {
        if !self.amount.is_finite() {
            return Err(SpendcatError::MalformedInput(format!(
                "amount for '{}' is not a finite number",
                self.description
            )));
        }
        if self.category.trim().is_empty() {
            return Err(SpendcatError::MalformedInput(format!(
                "row '{}' has an empty category",
                self.description
            )));
        }
        Ok(())
    }
}

/// The eight hand-written transactions used to smoke-test the pipeline.
pub fn mock_transactions() -> Vec<TrainingRow> {
    vec![
        TrainingRow::new("AMAZON MKTPLACE", 59.99, "Shopping"),
        TrainingRow::new("UBER TRIP", 22.50, "Travel"),
        TrainingRow::new("WHOLE FOODS", 87.45, "Groceries"),
        TrainingRow::new("NETFLIX SUBSCRIPTION", 14.99, "Subscriptions"),
        TrainingRow::new("RESTAURANT PIZZA", 45.00, "Dining"),
        TrainingRow::new("WALGREENS PHARMACY", 32.10, "Healthcare"),
        TrainingRow::new("ELECTRIC COMPANY", 120.00, "Utilities"),
        TrainingRow::new("MOVIE THEATER", 15.00, "Entertainment"),
    ]
}

/// Reads training rows from a CSV file (by `.csv` extension), a JSON array
/// or a JSON Lines file.
///
/// CSV files need a header with `description`, `amount` and `category`
/// columns; any other columns, such as `date`, are ignored.
pub fn load_rows<P: AsRef<Path>>(path: P) -> Result<Vec<TrainingRow>> {
    let rows: Vec<TrainingRow> = read_records(path.as_ref())?;
    info!("Loaded {} training rows from {:?}", rows.len(), path.as_ref());
    Ok(rows)
}

/// Reads transactions from a CSV, JSON array or JSON Lines file.
pub fn load_transactions<P: AsRef<Path>>(path: P) -> Result<Vec<Transaction>> {
    read_records(path.as_ref())
}

fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let raw = std::fs::read_to_string(path)?;
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if is_csv {
        parse_csv_records(&raw)
    } else {
        parse_records(&raw)
    }
}

pub(crate) fn parse_csv_records<T: DeserializeOwned>(raw: &str) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(raw.as_bytes());
    reader
        .deserialize()
        .map(|record| record.map_err(SpendcatError::from))
        .collect()
}

pub(crate) fn parse_records<T: DeserializeOwned>(raw: &str) -> Result<Vec<T>> {
    if raw.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(raw)?);
    }
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(SpendcatError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_dataset_has_one_row_per_category() {
        let rows = mock_transactions();
        assert_eq!(rows.len(), 8);
        let mut categories: Vec<_> = rows.iter().map(|r| r.category.as_str()).collect();
        categories.sort();
        categories.dedup();
        assert_eq!(categories.len(), 8);
        assert!(rows.iter().all(|r| r.validate().is_ok()));
    }

    #[test]
    fn test_parse_json_array_and_lines() {
        let array = r#"[{"description": "UBER TRIP", "amount": 22.5, "category": "Travel"}]"#;
        let rows: Vec<TrainingRow> = parse_records(array).unwrap();
        assert_eq!(rows[0], TrainingRow::new("UBER TRIP", 22.5, "Travel"));

        let lines = "{\"description\": \"NETFLIX\", \"amount\": 14.99}\n\n{\"description\": \"\", \"amount\": 0}\n";
        let txns: Vec<Transaction> = parse_records(lines).unwrap();
        assert_eq!(txns.len(), 2);
        assert_eq!(txns[1], Transaction::new("", 0.0));
    }

    #[test]
    fn test_parse_csv_with_extra_columns() {
        let raw = "description,amount,category,date\n\
                   \"Uber ride to airport, terminal 2\",23.50,Travel,2024-03-01\n\
                   Starbucks,4.75,Food & Dining,2024-03-02\n";
        let rows: Vec<TrainingRow> = parse_csv_records(raw).unwrap();
        assert_eq!(
            rows,
            vec![
                TrainingRow::new("Uber ride to airport, terminal 2", 23.5, "Travel"),
                TrainingRow::new("Starbucks", 4.75, "Food & Dining"),
            ]
        );

        let txns: Vec<Transaction> = parse_csv_records(raw).unwrap();
        assert_eq!(txns[1], Transaction::new("Starbucks", 4.75));
    }

    #[test]
    fn test_parse_csv_rejects_missing_column() {
        let raw = "description,category\nUBER,Travel\n";
        let result: Result<Vec<TrainingRow>> = parse_csv_records(raw);
        assert!(matches!(result, Err(SpendcatError::Csv(_))));
    }

    #[test]
    fn test_load_rows_dispatches_on_extension() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("transactions_large.CSV");
        std::fs::write(&csv_path, "description,amount,category,date\nNETFLIX,15.49,Entertainment,2024-01-05\n").unwrap();
        let rows = load_rows(&csv_path).unwrap();
        assert_eq!(rows, vec![TrainingRow::new("NETFLIX", 15.49, "Entertainment")]);

        let json_path = dir.path().join("rows.jsonl");
        std::fs::write(&json_path, "{\"description\": \"NETFLIX\", \"amount\": 15.49, \"category\": \"Entertainment\"}\n").unwrap();
        assert_eq!(load_rows(&json_path).unwrap(), rows);
    }

    #[test]
    fn test_parse_rejects_non_numeric_amount() {
        let bad = r#"{"description": "UBER", "amount": "twenty"}"#;
        let result: Result<Vec<Transaction>> = parse_records(bad);
        assert!(matches!(result, Err(SpendcatError::Serialization(_))));
    }

    #[test]
    fn test_row_validation() {
        assert!(TrainingRow::new("X", f64::NAN, "Travel").validate().is_err());
        assert!(TrainingRow::new("X", 1.0, " ").validate().is_err());
        assert!(TrainingRow::new("X", -12.0, "Refunds").validate().is_ok());
    }
}
