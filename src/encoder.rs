//! Report encoding
//!
//! Wraps a composed insight list into a self-describing report envelope with
//! producer metadata, the analyzed window and the stages that were skipped.

use crate::error::InsightError;
use crate::pipeline::Composition;
use crate::source::DateRange;
use crate::types::{Insight, Stage};
use crate::{ENGINE_VERSION, PRODUCER_NAME};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

/// Which engine build produced a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Insight report for one user and one analysis window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightReport {
    pub report_version: String,
    pub report_id: String,
    pub producer: ReportProducer,
    pub user_id: String,
    pub window: DateRange,
    pub generated_at: DateTime<Utc>,
    /// Logged days that survived normalization
    pub days_analyzed: usize,
    /// Stages left out for lack of data
    pub skipped_stages: Vec<Stage>,
    /// Insights, priority 1 first
    pub insights: Vec<Insight>,
}

/// Report encoder
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create an encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn encode(
        &self,
        user_id: &str,
        window: DateRange,
        generated_at: DateTime<Utc>,
        composition: Composition,
    ) -> InsightReport {
        InsightReport {
            report_version: REPORT_VERSION.to_string(),
            report_id: Uuid::new_v4().to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: ENGINE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            user_id: user_id.to_string(),
            window,
            generated_at,
            days_analyzed: composition.days_analyzed,
            skipped_stages: composition.skipped_stages,
            insights: composition.insights,
        }
    }

    /// Encode to a pretty-printed JSON string
    pub fn encode_to_json(
        &self,
        user_id: &str,
        window: DateRange,
        generated_at: DateTime<Utc>,
        composition: Composition,
    ) -> Result<String, InsightError> {
        let report = self.encode(user_id, window, generated_at, composition);
        serde_json::to_string_pretty(&report).map_err(InsightError::Json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InsightPayload, TrendDirection, TrendResult, TrendWindow};
    use chrono::{NaiveDate, TimeZone};

    fn make_test_composition() -> Composition {
        let trend = TrendResult {
            window: TrendWindow::Short,
            window_days: 7,
            direction: TrendDirection::Stable,
            magnitude: 0.01,
            confidence: 0.9,
            sample_count: 7,
        };
        Composition {
            days_analyzed: 9,
            skipped_stages: vec![Stage::Anomaly, Stage::Correlation, Stage::Risk],
            insights: vec![Insight {
                priority: 1,
                title: "7-day mood trend: stable".to_string(),
                summary: "Your mood has held steady over the last 7 days.".to_string(),
                confidence: 0.9,
                actionable: false,
                payload: InsightPayload::Trend(trend),
            }],
        }
    }

    fn window() -> DateRange {
        DateRange {
            start: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 5, 9).unwrap(),
        }
    }

    #[test]
    fn test_encode_report() {
        let encoder = ReportEncoder::with_instance_id("test-instance".to_string());
        let generated_at = Utc.with_ymd_and_hms(2024, 5, 9, 22, 0, 0).unwrap();
        let report = encoder.encode("user-7", window(), generated_at, make_test_composition());

        assert_eq!(report.report_version, REPORT_VERSION);
        assert_eq!(report.producer.name, PRODUCER_NAME);
        assert_eq!(report.producer.version, ENGINE_VERSION);
        assert_eq!(report.producer.instance_id, "test-instance");
        assert_eq!(report.user_id, "user-7");
        assert_eq!(report.days_analyzed, 9);
        assert_eq!(report.insights.len(), 1);
        assert!(Uuid::parse_str(&report.report_id).is_ok());
    }

    #[test]
    fn test_report_ids_are_unique() {
        let encoder = ReportEncoder::new();
        let at = Utc.with_ymd_and_hms(2024, 5, 9, 22, 0, 0).unwrap();
        let a = encoder.encode("u", window(), at, make_test_composition());
        let b = encoder.encode("u", window(), at, make_test_composition());
        assert_ne!(a.report_id, b.report_id);
        assert_eq!(a.producer.instance_id, b.producer.instance_id);
    }

    #[test]
    fn test_encode_to_json() {
        let encoder = ReportEncoder::new();
        let at = Utc.with_ymd_and_hms(2024, 5, 9, 22, 0, 0).unwrap();
        let json = encoder
            .encode_to_json("user-7", window(), at, make_test_composition())
            .unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["report_version"], "1.0.0");
        assert_eq!(parsed["producer"]["name"], "moodmap-insights");
        assert_eq!(parsed["window"]["start"], "2024-05-01");
        assert_eq!(
            parsed["skipped_stages"],
            serde_json::json!(["anomaly", "correlation", "risk"])
        );

        let insight = &parsed["insights"][0];
        assert_eq!(insight["priority"], 1);
        assert_eq!(insight["payload"]["type"], "trend");
        assert_eq!(insight["payload"]["data"]["direction"], "stable");
        assert_eq!(insight["payload"]["data"]["window"], "short");

        let back: InsightReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.insights[0].title, "7-day mood trend: stable");
    }
}
