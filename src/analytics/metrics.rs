/// Metric baseline/z-score anomaly detection. A baseline is built
/// per metric from historical samples at matching `(dayType, hourOfDay)`
/// slots; deviation is classified by z-score with metric-class-specific
/// thresholds.
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DayType {
    Weekday,
    Weekend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeSlot {
    pub day_type: DayType,
    pub hour_of_day: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MetricClass {
    General,
    ErrorRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricAnomaly {
    pub metric_name: String,
    pub value: f64,
    pub z_score: f64,
    pub severity: Severity,
}

const MIN_SAMPLES: usize = 3;

/// A historical sample at a given time slot, carrying just the value — the
/// baseline only needs the statistical moments per slot.
pub struct Sample {
    pub slot: TimeSlot,
    pub value: f64,
}

/// Build a mean/stddev baseline from historical samples matching a slot,
/// requiring at least `MIN_SAMPLES`.
pub fn baseline_for_slot(samples: &[Sample], slot: TimeSlot) -> Option<(f64, f64)> {
    let matching: Vec<f64> = samples.iter().filter(|s| s.slot == slot).map(|s| s.value).collect();
    if matching.len() < MIN_SAMPLES {
        return None;
    }
    let mean = matching.iter().sum::<f64>() / matching.len() as f64;
    let variance = matching.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / matching.len() as f64;
    Some((mean, variance.sqrt()))
}

/// Classify `value` against its baseline for `metric_name`, returning
/// `None` when the baseline has insufficient history or zero variance.
pub fn classify(
    metric_name: &str,
    value: f64,
    samples: &[Sample],
    slot: TimeSlot,
    class: MetricClass,
) -> Option<MetricAnomaly> {
    let (mean, stddev) = baseline_for_slot(samples, slot)?;
    if stddev == 0.0 {
        return None;
    }
    let z = (value - mean) / stddev;
    let abs_z = z.abs();

    let severity = match class {
        MetricClass::ErrorRate => {
            if abs_z >= 2.0 {
                Severity::Critical
            } else {
                return None;
            }
        }
        MetricClass::General => {
            if abs_z >= 3.0 {
                Severity::Critical
            } else if abs_z >= 2.0 {
                Severity::Warning
            } else {
                return None;
            }
        }
    };

    Some(MetricAnomaly { metric_name: metric_name.to_string(), value, z_score: z, severity })
}

/// Rank anomalies by severity then |z-score| descending.
pub fn rank(mut anomalies: Vec<MetricAnomaly>) -> Vec<MetricAnomaly> {
    anomalies.sort_by(|a, b| {
        let sev_rank = |s: Severity| if s == Severity::Critical { 1 } else { 0 };
        sev_rank(b.severity)
            .cmp(&sev_rank(a.severity))
            .then_with(|| b.z_score.abs().partial_cmp(&a.z_score.abs()).unwrap_or(std::cmp::Ordering::Equal))
    });
    anomalies
}
