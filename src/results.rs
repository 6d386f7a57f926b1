use crate::engine::Engine;
use crate::metric::Metric;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

/// Identifies which partition a result row belongs to
pub trait ResultRow {
    fn workload(&self) -> &str;

    fn engine_name(&self) -> &str;

    fn threads(&self) -> u32;

    /// The engine this row was measured on, if it is one we know how to draw.
    fn engine(&self) -> Option<Engine> {
        Engine::from_name(self.engine_name())
    }
}

/// One aggregate measurement per (workload, engine, thread count).
///
/// An empty metric cell is read as NaN: it has no value, is left out of sums
/// and means, and draws nothing.
#[derive(Debug, Clone, Deserialize)]
pub struct SummaryRow {
    pub workload: String,
    pub engine: String,
    pub threads: u32,
    #[serde(deserialize_with = "empty_as_nan")]
    pub tps: f64,
    #[serde(deserialize_with = "empty_as_nan")]
    pub qps: f64,
    #[serde(deserialize_with = "empty_as_nan")]
    pub reads_per_sec: f64,
    #[serde(deserialize_with = "empty_as_nan")]
    pub writes_per_sec: f64,
    #[serde(deserialize_with = "empty_as_nan")]
    pub latency_min_ms: f64,
    #[serde(deserialize_with = "empty_as_nan")]
    pub latency_avg_ms: f64,
    #[serde(deserialize_with = "empty_as_nan")]
    pub latency_p95_ms: f64,
    #[serde(deserialize_with = "empty_as_nan")]
    pub latency_max_ms: f64,
    #[serde(deserialize_with = "empty_as_nan")]
    pub data_size_after_prepare_mb: f64,
    #[serde(deserialize_with = "empty_as_nan")]
    pub data_size_after_run_mb: f64,
}

fn empty_as_nan<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    let value: Option<f64> = Option::deserialize(deserializer)?;
    Ok(value.unwrap_or(f64::NAN))
}

impl SummaryRow {
    /// Data size added by the run phase. Negative when the engine compacted
    /// during the run.
    pub fn disk_growth_mb(&self) -> f64 {
        self.data_size_after_run_mb - self.data_size_after_prepare_mb
    }
}

impl ResultRow for SummaryRow {
    fn workload(&self) -> &str {
        &self.workload
    }

    fn engine_name(&self) -> &str {
        &self.engine
    }

    fn threads(&self) -> u32 {
        self.threads
    }
}

/// One interval sample per (workload, engine, thread count, elapsed time).
/// Metric columns are optional: the harness only reports what it sampled.
#[derive(Debug, Clone, Deserialize)]
pub struct DetailRow {
    pub workload: String,
    pub engine: String,
    pub threads: u32,
    pub time_s: f64,
    #[serde(default)]
    pub tps: Option<f64>,
    #[serde(default)]
    pub qps: Option<f64>,
    #[serde(default)]
    pub reads_per_sec: Option<f64>,
    #[serde(default)]
    pub writes_per_sec: Option<f64>,
    #[serde(default)]
    pub latency_min_ms: Option<f64>,
    #[serde(default)]
    pub latency_avg_ms: Option<f64>,
    #[serde(default)]
    pub latency_p95_ms: Option<f64>,
    #[serde(default)]
    pub latency_max_ms: Option<f64>,
}

impl ResultRow for DetailRow {
    fn workload(&self) -> &str {
        &self.workload
    }

    fn engine_name(&self) -> &str {
        &self.engine
    }

    fn threads(&self) -> u32 {
        self.threads
    }
}

/// Summary statistics loaded from the harness' summary CSV
#[derive(Debug, Default)]
pub struct SummaryTable {
    pub rows: Vec<SummaryRow>,
}

impl SummaryTable {
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open summary file {}", path.display()))?;
        let table = Self::from_reader(file, &path.display().to_string())?;
        info!(path = %path.display(), rows = table.rows.len(), "loaded summary results");
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R, source: &str) -> Result<Self> {
        let (_, rows) = read_rows(reader, source)?;
        warn_unknown_engines(&rows, source);
        Ok(Self { rows })
    }

    /// Sum of a metric over every row, including rows of unknown engines.
    /// Missing values are skipped.
    pub fn total(&self, metric: Metric) -> f64 {
        self.rows
            .iter()
            .map(|r| metric.summary_value(r))
            .filter(|v| !v.is_nan())
            .sum()
    }

    pub fn by_workload(&self) -> Vec<(&str, Partition<'_, SummaryRow>)> {
        by_workload(&self.rows)
    }
}

/// Interval samples loaded from the harness' detail CSV
#[derive(Debug, Default)]
pub struct DetailTable {
    /// Header names in file order
    pub columns: Vec<String>,
    pub rows: Vec<DetailRow>,
}

impl DetailTable {
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open detail file {}", path.display()))?;
        let table = Self::from_reader(file, &path.display().to_string())?;
        info!(
            path = %path.display(),
            rows = table.rows.len(),
            columns = table.columns.len(),
            "loaded detail results"
        );
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R, source: &str) -> Result<Self> {
        let (columns, rows) = read_rows(reader, source)?;
        warn_unknown_engines(&rows, source);
        Ok(Self { columns, rows })
    }

    pub fn has_column(&self, metric: Metric) -> bool {
        self.columns.iter().any(|c| c == metric.column())
    }

    /// Sum of every sampled value of a metric; empty cells count as nothing.
    pub fn total(&self, metric: Metric) -> f64 {
        self.rows.iter().filter_map(|r| metric.detail_value(r)).sum()
    }

    pub fn by_workload(&self) -> Vec<(&str, Partition<'_, DetailRow>)> {
        by_workload(&self.rows)
    }
}

fn read_rows<T: DeserializeOwned, R: Read>(
    reader: R,
    source: &str,
) -> Result<(Vec<String>, Vec<T>)> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns = csv_reader
        .headers()
        .with_context(|| format!("Failed to read header row of {}", source))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (idx, record) in csv_reader.deserialize().enumerate() {
        // +2: one for the header, one for 1-based line numbers
        let row: T = record
            .with_context(|| format!("Invalid row at line {} of {}", idx + 2, source))?;
        rows.push(row);
    }

    Ok((columns, rows))
}

fn warn_unknown_engines<R: ResultRow>(rows: &[R], source: &str) {
    let mut unknown: BTreeMap<&str, usize> = BTreeMap::new();
    for row in rows.iter().filter(|r| r.engine().is_none()) {
        *unknown.entry(row.engine_name()).or_default() += 1;
    }
    for (engine, count) in unknown {
        warn!(source, engine, rows = count, "rows for unknown engine will not be drawn");
    }
}

/// Rows of a single workload (and optionally narrower), borrowed from a table
#[derive(Debug)]
pub struct Partition<'a, R> {
    rows: Vec<&'a R>,
}

impl<'a, R> Clone for Partition<'a, R> {
    fn clone(&self) -> Self {
        Self {
            rows: self.rows.clone(),
        }
    }
}

impl<'a, R: ResultRow> Partition<'a, R> {
    pub fn new(rows: Vec<&'a R>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[&'a R] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Known engines present, in draw order
    pub fn engines(&self) -> Vec<Engine> {
        let present: BTreeSet<Engine> = self.rows.iter().filter_map(|r| r.engine()).collect();
        present.into_iter().collect()
    }

    /// Distinct thread counts, ascending
    pub fn thread_counts(&self) -> Vec<u32> {
        let counts: BTreeSet<u32> = self.rows.iter().map(|r| r.threads()).collect();
        counts.into_iter().collect()
    }

    pub fn with_threads(&self, threads: u32) -> Partition<'a, R> {
        self.filter(|r| r.threads() == threads)
    }

    pub fn with_engine(&self, engine: Engine) -> Partition<'a, R> {
        self.filter(|r| r.engine() == Some(engine))
    }

    fn filter(&self, keep: impl Fn(&R) -> bool) -> Partition<'a, R> {
        Partition {
            rows: self.rows.iter().copied().filter(|r| keep(*r)).collect(),
        }
    }

    /// Mean of `value` over the partition ignoring NaN, `None` when no row
    /// has a value
    pub fn mean(&self, value: impl Fn(&R) -> f64) -> Option<f64> {
        let (sum, count) = self
            .rows
            .iter()
            .map(|r| value(*r))
            .filter(|v| !v.is_nan())
            .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
        if count == 0 {
            return None;
        }
        Some(sum / count as f64)
    }

    pub fn first(&self) -> Option<&'a R> {
        self.rows.first().copied()
    }
}

/// Split rows by workload, workloads in ascending order
pub fn by_workload<R: ResultRow>(rows: &[R]) -> Vec<(&str, Partition<'_, R>)> {
    let mut map: BTreeMap<&str, Vec<&R>> = BTreeMap::new();
    for row in rows {
        map.entry(row.workload()).or_default().push(row);
    }
    map.into_iter()
        .map(|(workload, rows)| (workload, Partition::new(rows)))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    pub const SUMMARY_HEADER: &str = "workload,engine,threads,tps,qps,reads_per_sec,writes_per_sec,\
latency_min_ms,latency_avg_ms,latency_p95_ms,latency_max_ms,\
data_size_after_prepare_mb,data_size_after_run_mb";

    pub fn summary_row(workload: &str, engine: &str, threads: u32, tps: f64) -> SummaryRow {
        SummaryRow {
            workload: workload.to_string(),
            engine: engine.to_string(),
            threads,
            tps,
            qps: tps * 20.0,
            reads_per_sec: tps * 14.0,
            writes_per_sec: 0.0,
            latency_min_ms: 0.5,
            latency_avg_ms: 2.0,
            latency_p95_ms: 4.5,
            latency_max_ms: 30.0,
            data_size_after_prepare_mb: 100.0,
            data_size_after_run_mb: 120.0,
        }
    }

    pub fn detail_row(
        workload: &str,
        engine: &str,
        threads: u32,
        time_s: f64,
        tps: f64,
    ) -> DetailRow {
        DetailRow {
            workload: workload.to_string(),
            engine: engine.to_string(),
            threads,
            time_s,
            tps: Some(tps),
            qps: Some(tps * 20.0),
            reads_per_sec: None,
            writes_per_sec: None,
            latency_min_ms: None,
            latency_avg_ms: Some(2.0),
            latency_p95_ms: Some(4.0),
            latency_max_ms: None,
        }
    }

    #[test]
    fn test_load_summary_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", SUMMARY_HEADER).unwrap();
        writeln!(file, "oltp_read_write,InnoDB,1,100,2000,1400,400,0.5,10,15,40,250,260").unwrap();
        writeln!(file, "oltp_read_write,TidesDB,1,150,3000,2100,600,0.4,7,11,30,180,175.5").unwrap();
        file.flush().unwrap();

        let table = SummaryTable::load(file.path()).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1].engine(), Some(Engine::TidesDb));
        assert_eq!(table.rows[1].data_size_after_run_mb, 175.5);
        assert_eq!(table.total(Metric::Tps), 250.0);
    }

    #[test]
    fn test_summary_extra_columns_ignored() {
        let csv = format!(
            "{},errors_per_sec\nread_only,InnoDB,8,1,2,3,4,5,6,7,8,9,10,0\n",
            SUMMARY_HEADER
        );
        let table = SummaryTable::from_reader(csv.as_bytes(), "inline").unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].threads, 8);
    }

    #[test]
    fn test_summary_bad_number_is_an_error() {
        let csv = format!("{}\nread_only,InnoDB,8,fast,2,3,4,5,6,7,8,9,10\n", SUMMARY_HEADER);
        let err = SummaryTable::from_reader(csv.as_bytes(), "inline").unwrap_err();
        assert!(format!("{:#}", err).contains("line 2 of inline"));
    }

    #[test]
    fn test_summary_empty_cell_is_missing() {
        let csv = format!(
            "{}\nread_only,InnoDB,8,100,2000,1400,,0.5,10,15,40,250,260\n\
             read_only,InnoDB,8,300,6000,4200,50,0.5,10,15,40,250,260\n",
            SUMMARY_HEADER
        );
        let table = SummaryTable::from_reader(csv.as_bytes(), "inline").unwrap();
        assert_eq!(table.rows.len(), 2);
        assert!(table.rows[0].writes_per_sec.is_nan());
        assert_eq!(table.total(Metric::WritesPerSec), 50.0);
        assert_eq!(table.total(Metric::Tps), 400.0);

        let workloads = table.by_workload();
        let part = &workloads[0].1;
        assert_eq!(part.mean(|r| r.writes_per_sec), Some(50.0));
        assert_eq!(part.mean(|r| r.tps), Some(200.0));
    }

    #[test]
    fn test_mean_of_only_missing_values() {
        let mut row = summary_row("read_only", "InnoDB", 1, 1.0);
        row.qps = f64::NAN;
        let rows = [row];
        let part = Partition::new(rows.iter().collect());
        assert_eq!(part.mean(|r| r.qps), None);
        assert_eq!(part.mean(|r| r.tps), Some(1.0));
    }

    #[test]
    fn test_summary_missing_column_is_an_error() {
        let csv = "workload,engine,threads,tps\nread_only,InnoDB,8,100\n";
        assert!(SummaryTable::from_reader(csv.as_bytes(), "inline").is_err());
    }

    #[test]
    fn test_detail_optional_columns() {
        let csv = "workload,engine,threads,time_s,tps,latency_avg_ms\n\
                   read_only,InnoDB,4,1.0,120.5,\n\
                   read_only,TidesDB,4,1.0,150.0,1.25\n";
        let table = DetailTable::from_reader(csv.as_bytes(), "inline").unwrap();

        assert!(table.has_column(Metric::Tps));
        assert!(table.has_column(Metric::LatencyAvgMs));
        assert!(!table.has_column(Metric::Qps));
        assert_eq!(table.rows[0].qps, None);
        assert_eq!(table.rows[0].latency_avg_ms, None);
        assert_eq!(table.rows[1].latency_avg_ms, Some(1.25));
        assert_eq!(table.total(Metric::Tps), 270.5);
        assert_eq!(table.total(Metric::Qps), 0.0);
    }

    #[test]
    fn test_partitions() {
        let table = SummaryTable {
            rows: vec![
                summary_row("write_only", "TidesDB", 8, 10.0),
                summary_row("read_only", "TidesDB", 4, 10.0),
                summary_row("read_only", "InnoDB", 1, 5.0),
                summary_row("read_only", "MyRocks", 2, 5.0),
                summary_row("read_only", "InnoDB", 4, 7.0),
            ],
        };

        let workloads = table.by_workload();
        let names: Vec<&str> = workloads.iter().map(|(w, _)| *w).collect();
        assert_eq!(names, vec!["read_only", "write_only"]);

        let read_only = &workloads[0].1;
        assert_eq!(read_only.rows().len(), 4);
        assert_eq!(read_only.engines(), vec![Engine::InnoDb, Engine::TidesDb]);
        assert_eq!(read_only.thread_counts(), vec![1, 2, 4]);

        let innodb_4 = read_only.with_engine(Engine::InnoDb).with_threads(4);
        assert_eq!(innodb_4.mean(|r| r.tps), Some(7.0));
        assert_eq!(read_only.with_threads(16).mean(|r| r.tps), None);
    }

    #[test]
    fn test_disk_growth_keeps_sign() {
        let mut row = summary_row("read_only", "InnoDB", 1, 1.0);
        row.data_size_after_prepare_mb = 300.0;
        row.data_size_after_run_mb = 280.0;
        assert_eq!(row.disk_growth_mb(), -20.0);
    }

    proptest! {
        #[test]
        fn prop_disk_growth_is_run_minus_prepare(prepare in -1e6f64..1e6, run in -1e6f64..1e6) {
            let mut row = summary_row("w", "InnoDB", 1, 1.0);
            row.data_size_after_prepare_mb = prepare;
            row.data_size_after_run_mb = run;
            prop_assert_eq!(row.disk_growth_mb(), run - prepare);
        }
    }
}
