use crate::results::{DetailRow, SummaryRow};

/// Numeric columns reported by the benchmark harness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Tps,
    Qps,
    ReadsPerSec,
    WritesPerSec,
    LatencyMinMs,
    LatencyAvgMs,
    LatencyP95Ms,
    LatencyMaxMs,
    DataSizeAfterPrepareMb,
    DataSizeAfterRunMb,
}

impl Metric {
    /// CSV column name, also used in output file names
    pub fn column(&self) -> &'static str {
        match self {
            Metric::Tps => "tps",
            Metric::Qps => "qps",
            Metric::ReadsPerSec => "reads_per_sec",
            Metric::WritesPerSec => "writes_per_sec",
            Metric::LatencyMinMs => "latency_min_ms",
            Metric::LatencyAvgMs => "latency_avg_ms",
            Metric::LatencyP95Ms => "latency_p95_ms",
            Metric::LatencyMaxMs => "latency_max_ms",
            Metric::DataSizeAfterPrepareMb => "data_size_after_prepare_mb",
            Metric::DataSizeAfterRunMb => "data_size_after_run_mb",
        }
    }

    pub fn summary_value(&self, row: &SummaryRow) -> f64 {
        match self {
            Metric::Tps => row.tps,
            Metric::Qps => row.qps,
            Metric::ReadsPerSec => row.reads_per_sec,
            Metric::WritesPerSec => row.writes_per_sec,
            Metric::LatencyMinMs => row.latency_min_ms,
            Metric::LatencyAvgMs => row.latency_avg_ms,
            Metric::LatencyP95Ms => row.latency_p95_ms,
            Metric::LatencyMaxMs => row.latency_max_ms,
            Metric::DataSizeAfterPrepareMb => row.data_size_after_prepare_mb,
            Metric::DataSizeAfterRunMb => row.data_size_after_run_mb,
        }
    }

    /// Sampled value of a detail row; data sizes are never sampled per interval.
    pub fn detail_value(&self, row: &DetailRow) -> Option<f64> {
        match self {
            Metric::Tps => row.tps,
            Metric::Qps => row.qps,
            Metric::ReadsPerSec => row.reads_per_sec,
            Metric::WritesPerSec => row.writes_per_sec,
            Metric::LatencyMinMs => row.latency_min_ms,
            Metric::LatencyAvgMs => row.latency_avg_ms,
            Metric::LatencyP95Ms => row.latency_p95_ms,
            Metric::LatencyMaxMs => row.latency_max_ms,
            Metric::DataSizeAfterPrepareMb | Metric::DataSizeAfterRunMb => None,
        }
    }
}

/// A metric together with how it is presented
#[derive(Debug, Clone, Copy)]
pub struct MetricSpec {
    pub metric: Metric,
    /// Axis label and title suffix
    pub label: &'static str,
    /// Values may span orders of magnitude, so bar charts may switch to a log axis
    pub scale_sensitive: bool,
}

const fn spec(metric: Metric, label: &'static str, scale_sensitive: bool) -> MetricSpec {
    MetricSpec {
        metric,
        label,
        scale_sensitive,
    }
}

/// Metrics drawn as grouped bar and scatter charts, in rendering order
pub const SUMMARY_METRICS: &[MetricSpec] = &[
    spec(Metric::Tps, "Transactions / sec", true),
    spec(Metric::Qps, "Queries / sec", true),
    spec(Metric::ReadsPerSec, "Reads / sec", true),
    spec(Metric::WritesPerSec, "Writes / sec", true),
    spec(Metric::LatencyAvgMs, "Avg Latency (ms)", false),
    spec(Metric::LatencyP95Ms, "P95 Latency (ms)", false),
    spec(Metric::LatencyMaxMs, "Max Latency (ms)", false),
];

/// Metrics drawn over time from the interval samples
pub const DETAIL_METRICS: &[MetricSpec] = &[
    spec(Metric::Tps, "TPS", false),
    spec(Metric::Qps, "QPS", false),
    spec(Metric::LatencyAvgMs, "Avg Latency (ms)", false),
    spec(Metric::LatencyP95Ms, "P95 Latency (ms)", false),
];

/// Latency columns of the breakdown chart with their category labels
pub const LATENCY_BREAKDOWN: &[(Metric, &str)] = &[
    (Metric::LatencyMinMs, "Min"),
    (Metric::LatencyAvgMs, "Avg"),
    (Metric::LatencyP95Ms, "P95"),
    (Metric::LatencyMaxMs, "Max"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_throughput_is_scale_sensitive() {
        for spec in SUMMARY_METRICS {
            let throughput = matches!(
                spec.metric,
                Metric::Tps | Metric::Qps | Metric::ReadsPerSec | Metric::WritesPerSec
            );
            assert_eq!(spec.scale_sensitive, throughput, "{}", spec.metric.column());
        }
    }

    #[test]
    fn test_detail_metrics_are_sampled() {
        let row = DetailRow {
            workload: "oltp_read_only".to_string(),
            engine: "InnoDB".to_string(),
            threads: 4,
            time_s: 1.0,
            tps: Some(10.0),
            qps: Some(200.0),
            reads_per_sec: None,
            writes_per_sec: None,
            latency_min_ms: None,
            latency_avg_ms: Some(1.5),
            latency_p95_ms: Some(3.0),
            latency_max_ms: None,
        };
        let values: Vec<Option<f64>> = DETAIL_METRICS
            .iter()
            .map(|s| s.metric.detail_value(&row))
            .collect();
        assert_eq!(values, vec![Some(10.0), Some(200.0), Some(1.5), Some(3.0)]);
        assert_eq!(Metric::DataSizeAfterRunMb.detail_value(&row), None);
    }
}
