//! MoodMap Insights - on-device behavioral insight engine
//!
//! Turns a person's daily mood log into ranked, explainable insights through a
//! deterministic pipeline: normalization → anomaly detection → correlation
//! mining → trend analysis → risk scoring → insight composition.
//!
//! Every call fits its models on the caller's own records only. Nothing is
//! cached or learned across users.
//!
//! ```ignore
//! let engine = InsightEngine::default();
//! let report = engine.generate("user-1", AnalysisWindow::LastDays(30), &source, None)?;
//! for insight in &report.insights {
//!     println!("{}. {}", insight.priority, insight.title);
//! }
//! ```

pub mod anomaly;
pub mod config;
pub mod correlation;
pub mod encoder;
pub mod error;
pub mod ingest;
pub mod normalizer;
pub mod pipeline;
pub mod risk;
pub mod source;
pub mod stats;
pub mod trend;
pub mod types;

pub use config::EngineConfig;
pub use encoder::{InsightReport, ReportEncoder};
pub use error::InsightError;
pub use ingest::RecordReader;
pub use pipeline::{Composition, InsightEngine};
pub use source::{
    AnalysisWindow, DateRange, InMemoryRecordSource, InMemoryWeatherSource, RecordSource,
    WeatherSource,
};
pub use types::{Insight, InsightPayload, MoodRecord, SeverityTier};

/// Engine version embedded in every report
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "moodmap-insights";
