//! Labeled query sets.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One labeled evaluation query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalQuery {
    pub query: String,
    /// A result is relevant if its text contains any of these,
    /// case-insensitively.
    #[serde(default)]
    pub relevant_substrings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Downstream answer quality in `[0, 1]`, if judged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_quality: Option<f64>,
}

impl EvalQuery {
    pub fn new(query: impl Into<String>, relevant: &[&str]) -> Self {
        Self {
            query: query.into(),
            relevant_substrings: relevant.iter().map(|s| s.to_string()).collect(),
            notes: None,
            answer_quality: None,
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.query.trim().is_empty() {
            return Err("empty query".into());
        }
        if let Some(quality) = self.answer_quality {
            if !(0.0..=1.0).contains(&quality) {
                return Err(format!(
                    "answer_quality {quality} for {:?} is outside [0, 1]",
                    self.query
                ));
            }
        }
        Ok(())
    }
}

/// Row of a `.csv` dataset. `relevant_substrings` is `;`-separated.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    query: String,
    #[serde(default)]
    relevant_substrings: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    answer_quality: Option<f64>,
}

impl From<CsvRecord> for EvalQuery {
    fn from(record: CsvRecord) -> Self {
        Self {
            query: record.query,
            relevant_substrings: record
                .relevant_substrings
                .unwrap_or_default()
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            notes: record.notes.filter(|n| !n.trim().is_empty()),
            answer_quality: record.answer_quality,
        }
    }
}

/// Load a dataset: a JSON array (`.json`), one record per line (`.jsonl`),
/// or a CSV table with a header row (`.csv`).
pub fn load_dataset(path: &Path) -> Result<Vec<EvalQuery>> {
    let malformed = |reason: String| Error::Dataset {
        path: path.to_path_buf(),
        reason,
    };

    let contents = fs::read_to_string(path).map_err(|e| malformed(e.to_string()))?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    let queries: Vec<EvalQuery> = match extension.as_deref() {
        Some("json") => serde_json::from_str(&contents).map_err(|e| malformed(e.to_string()))?,
        Some("jsonl") => contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str::<EvalQuery>(line)
                    .map_err(|e| malformed(format!("line {}: {e}", i + 1)))
            })
            .collect::<Result<_>>()?,
        Some("csv") => csv::Reader::from_reader(contents.as_bytes())
            .deserialize::<CsvRecord>()
            .map(|row| row.map(EvalQuery::from).map_err(|e| malformed(e.to_string())))
            .collect::<Result<_>>()?,
        other => {
            return Err(malformed(format!(
                "unsupported format {:?}, expected .json, .jsonl or .csv",
                other.unwrap_or("")
            )));
        }
    };

    for (i, query) in queries.iter().enumerate() {
        query
            .validate()
            .map_err(|reason| malformed(format!("record {}: {reason}", i + 1)))?;
    }

    tracing::info!("Loaded {} evaluation queries from {}", queries.len(), path.display());
    Ok(queries)
}
