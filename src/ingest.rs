//! Mood record ingestion
//!
//! Parses exported mood logs (a JSON array or newline-delimited JSON) and
//! checks records against the data model ranges before they reach the engine.

use crate::config::ScaleConfig;
use crate::error::InsightError;
use crate::normalizer::{validate_record, RecordIssue};
use crate::types::MoodRecord;

/// Reader for exported mood records
pub struct RecordReader;

impl RecordReader {
    /// Parse a JSON array of records
    pub fn parse_array(json: &str) -> Result<Vec<MoodRecord>, InsightError> {
        let records: Vec<MoodRecord> = serde_json::from_str(json)?;
        Ok(records)
    }

    /// Parse NDJSON, one record per line. Blank lines are ignored.
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<MoodRecord>, InsightError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let record = serde_json::from_str::<MoodRecord>(trimmed).map_err(|e| {
                InsightError::Parse(format!("line {}: {}", line_num + 1, e))
            })?;
            records.push(record);
        }
        Ok(records)
    }

    /// Records that fail range checks, with their position in the input
    pub fn validate_records(records: &[MoodRecord], scale: &ScaleConfig) -> Vec<RecordValidation> {
        records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| {
                validate_record(record, scale)
                    .err()
                    .map(|issue| RecordValidation {
                        index,
                        timestamp: record.timestamp.to_rfc3339(),
                        issue,
                    })
            })
            .collect()
    }
}

/// One rejected record
#[derive(Debug, Clone, PartialEq)]
pub struct RecordValidation {
    pub index: usize,
    pub timestamp: String,
    pub issue: RecordIssue,
}
