use crate::chart::render_figure;
use crate::figure::{detail_figures, summary_figures, Figure};
use crate::results::{DetailTable, SummaryTable};
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Inputs and destination of a report run
#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// Summary CSV, one row per workload/engine/thread count
    pub summary_path: PathBuf,
    /// Detail CSV with interval samples
    pub detail_path: PathBuf,
    /// Directory the PNG files are written to, created if missing
    pub output_dir: PathBuf,
}

/// Fail unless both inputs are existing regular files
pub fn check_inputs(config: &ReportConfig) -> Result<()> {
    for path in [&config.summary_path, &config.detail_path] {
        if !path.is_file() {
            bail!("File not found: {}", path.display());
        }
    }
    Ok(())
}

/// Load both result files and write every chart, returning the paths written.
///
/// Nothing is created on disk when an input is missing or cannot be parsed.
pub fn generate_report(config: &ReportConfig) -> Result<Vec<PathBuf>> {
    check_inputs(config)?;
    let summary = SummaryTable::load(&config.summary_path)?;
    let detail = DetailTable::load(&config.detail_path)?;

    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Failed to create output directory {}",
            config.output_dir.display()
        )
    })?;

    let mut written = Vec::new();

    println!("\n=== Summary plots from {} ===", config.summary_path.display());
    let figures = summary_figures(&summary);
    info!(charts = figures.len(), "planned summary charts");
    written.extend(render_all(&figures, &config.output_dir)?);

    println!("\n=== Detail plots from {} ===", config.detail_path.display());
    let figures = detail_figures(&detail);
    info!(charts = figures.len(), "planned detail charts");
    written.extend(render_all(&figures, &config.output_dir)?);

    println!(
        "\nDone. All plots saved to {}/",
        config.output_dir.display()
    );
    Ok(written)
}

fn render_all(figures: &[Figure], output_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(figures.len());
    for figure in figures {
        let path = render_figure(figure, output_dir)?;
        println!("  Generated: {}", path.display());
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::tests::SUMMARY_HEADER;
    use std::collections::BTreeSet;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    const DETAIL_HEADER: &str = "workload,engine,threads,time_s,tps,qps,latency_avg_ms,latency_p95_ms";

    fn summary_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", SUMMARY_HEADER).unwrap();
        writeln!(file, "read_only,InnoDB,1,100,2000,1400,0,0.5,10,15,40,250,260").unwrap();
        file.flush().unwrap();
        file
    }

    fn write_inputs(dir: &Path) -> ReportConfig {
        let summary_path = dir.join("summary.csv");
        let summary = format!(
            "{}\n\
             read_only,InnoDB,1,100,2000,1400,0,0.5,10,15,40,250,260\n\
             read_only,TidesDB,1,150,3000,2100,0,0.4,7,11,30,180,175.5\n\
             read_only,TidesDB,4,40000,800000,560000,0,0.3,6,9,25,180,200\n",
            SUMMARY_HEADER
        );
        std::fs::write(&summary_path, summary).unwrap();

        let detail_path = dir.join("detail.csv");
        let detail = format!(
            "{}\n\
             read_only,InnoDB,1,1.0,98,1960,10.2,15.1\n\
             read_only,TidesDB,1,1.0,151,3020,,\n",
            DETAIL_HEADER
        );
        std::fs::write(&detail_path, detail).unwrap();

        ReportConfig {
            summary_path,
            detail_path,
            output_dir: dir.join("out").join("plots"),
        }
    }

    fn png_names(dir: &Path) -> BTreeSet<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".png"))
            .collect()
    }

    #[test]
    fn test_generate_report_writes_expected_files() {
        let dir = tempdir().unwrap();
        let config = write_inputs(dir.path());

        let written = generate_report(&config).unwrap();
        let names = png_names(&config.output_dir);
        assert_eq!(written.len(), names.len());

        let mut expected: BTreeSet<String> = BTreeSet::new();
        for metric in [
            "tps",
            "qps",
            "reads_per_sec",
            "latency_avg_ms",
            "latency_p95_ms",
            "latency_max_ms",
        ] {
            expected.insert(format!("summary_bar_{}_read_only.png", metric));
            expected.insert(format!("summary_scatter_{}_read_only.png", metric));
        }
        for kind in [
            "summary_latency_breakdown",
            "summary_datasize",
            "summary_disk_usage_bar",
            "summary_disk_growth_line",
            "summary_disk_stacked",
        ] {
            expected.insert(format!("{}_read_only.png", kind));
        }
        for metric in ["tps", "qps", "latency_avg_ms", "latency_p95_ms"] {
            expected.insert(format!("detail_ts_{}_read_only.png", metric));
            expected.insert(format!("detail_scatter_{}_read_only.png", metric));
        }
        assert_eq!(names, expected);

        // writes_per_sec is zero in every row
        assert!(!names.iter().any(|n| n.starts_with("summary_bar_writes_per_sec")));
        assert!(!names.iter().any(|n| n.starts_with("summary_scatter_writes_per_sec")));
    }

    #[test]
    fn test_generate_report_is_deterministic() {
        let dir = tempdir().unwrap();
        let first = write_inputs(dir.path());
        let second = ReportConfig {
            output_dir: dir.path().join("again"),
            ..first.clone()
        };

        generate_report(&first).unwrap();
        generate_report(&second).unwrap();
        let names = png_names(&first.output_dir);
        assert!(!names.is_empty());
        assert_eq!(names, png_names(&second.output_dir));
    }

    #[test]
    fn test_unparsable_input_creates_nothing() {
        let dir = tempdir().unwrap();
        let config = write_inputs(dir.path());
        std::fs::write(&config.detail_path, "workload,engine,threads,time_s\nw,InnoDB,x,1\n")
            .unwrap();

        assert!(generate_report(&config).is_err());
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_missing_summary_creates_nothing() {
        let dir = tempdir().unwrap();
        let detail = summary_file();
        let config = ReportConfig {
            summary_path: dir.path().join("does_not_exist.csv"),
            detail_path: detail.path().to_path_buf(),
            output_dir: dir.path().join("plots"),
        };

        let err = generate_report(&config).unwrap_err();
        assert!(err.to_string().starts_with("File not found:"));
        assert!(err.to_string().contains("does_not_exist.csv"));
        assert!(!config.output_dir.exists());
    }

    #[test]
    fn test_missing_detail_creates_nothing() {
        let dir = tempdir().unwrap();
        let summary = summary_file();
        let config = ReportConfig {
            summary_path: summary.path().to_path_buf(),
            detail_path: dir.path().join("detail.csv"),
            output_dir: dir.path().join("nested").join("plots"),
        };

        assert!(generate_report(&config).is_err());
        assert!(!config.output_dir.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_directory_is_not_an_input_file() {
        let dir = tempdir().unwrap();
        let summary = summary_file();
        let config = ReportConfig {
            summary_path: summary.path().to_path_buf(),
            detail_path: dir.path().to_path_buf(),
            output_dir: dir.path().join("plots"),
        };
        assert!(check_inputs(&config).is_err());
    }

    #[test]
    fn test_existing_inputs_pass_check() {
        let summary = summary_file();
        let detail = summary_file();
        let config = ReportConfig {
            summary_path: summary.path().to_path_buf(),
            detail_path: detail.path().to_path_buf(),
            output_dir: PathBuf::from("plots"),
        };
        assert!(check_inputs(&config).is_ok());
    }
}
