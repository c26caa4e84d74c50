/// Log & Metric Analytics.
///
/// A per-source bounded-channel log ingestion pipeline feeding Drain-like
/// template mining, plus standalone metric baseline/z-score anomaly
/// detection and alert flappiness scoring. These are read/observe
/// APIs the Integration Manager's connectors drive; the core places
/// no requirement on where log/metric bytes originate.
pub mod flappiness;
pub mod log_pipeline;
pub mod metrics;
pub mod templates;

pub use flappiness::flappiness_score;
pub use log_pipeline::{LogIngestionPipeline, LogLine};
pub use metrics::{classify, rank, MetricAnomaly, MetricClass, Sample, Severity, TimeSlot};
pub use templates::{Template, TemplateMiner};
