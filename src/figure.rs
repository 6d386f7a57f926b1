//! Figure plans: everything a chart shows, computed from the result tables
//! before any pixels are drawn.
//!
//! Each builder takes one workload partition and returns a [`Figure`]. The
//! renderer in [`crate::chart`] only lays these out; all filtering, grouping and
//! aggregation happens here.

use crate::metric::{Metric, MetricSpec, DETAIL_METRICS, LATENCY_BREAKDOWN, SUMMARY_METRICS};
use crate::results::{DetailRow, DetailTable, Partition, SummaryRow, SummaryTable};
use plotters::style::RGBColor;
use tracing::debug;

/// Pixel size of a single-chart figure
pub const SINGLE_PANEL_SIZE: (u32, u32) = (1200, 750);
/// Pixel size of each latency breakdown sub-chart
pub const BREAKDOWN_PANEL_SIZE: (u32, u32) = (750, 750);
/// Pixel size of each interval sub-chart
pub const DETAIL_PANEL_SIZE: (u32, u32) = (900, 750);

/// Total width shared by the bars of one category in a grouped bar chart
const GROUP_WIDTH: f64 = 0.8;
/// Bar width of the hand-laid-out bar charts
const PAIRED_BAR_WIDTH: f64 = 0.35;
/// Bar ratio over which throughput bars move to a log axis
const LOG_SCALE_RATIO: f64 = 100.0;

const LEGEND_ENGINE: &str = "Engine";

// Neutral series colours for charts that are not split by engine
const PREPARE_COLOR: RGBColor = RGBColor(31, 119, 180);
const RUN_COLOR: RGBColor = RGBColor(255, 127, 14);

/// Human-readable workload name: underscores become spaces and every word is
/// capitalized ("read_only_mixed" -> "Read Only Mixed").
pub fn format_workload(workload: &str) -> String {
    let mut out = String::with_capacity(workload.len());
    let mut prev_cased = false;
    for c in workload.chars() {
        let c = if c == '_' { ' ' } else { c };
        if c.is_lowercase() || c.is_uppercase() {
            if prev_cased {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_cased = true;
        } else {
            out.push(c);
            prev_cased = false;
        }
    }
    out
}

/// A chart to be written as `<file_stem>.png`
#[derive(Debug, Clone)]
pub struct Figure {
    pub file_stem: String,
    pub title: String,
    /// Sub-charts laid out left to right, sharing one y-axis range
    pub panels: Vec<Panel>,
    /// Pixel size of each panel
    pub panel_size: (u32, u32),
}

impl Figure {
    pub fn file_name(&self) -> String {
        format!("{}.png", self.file_stem)
    }

    /// Pixel size of the whole image
    pub fn size(&self) -> (u32, u32) {
        let (w, h) = self.panel_size;
        (w * self.panels.len().max(1) as u32, h)
    }
}

#[derive(Debug, Clone)]
pub enum Panel {
    Bars(BarPanel),
    Xy(XyPanel),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Legend {
    /// Legend entries under an "Engine" heading
    Engine,
    Plain,
}

/// Bars over categorical x positions
#[derive(Debug, Clone)]
pub struct BarPanel {
    pub caption: Option<String>,
    pub x_desc: String,
    pub y_desc: String,
    pub categories: Vec<String>,
    pub series: Vec<BarSeries>,
    pub log_y: bool,
    pub legend: Legend,
}

#[derive(Debug, Clone)]
pub struct BarSeries {
    pub label: String,
    pub color: RGBColor,
    pub opacity: f64,
    /// Offset of the bar centre from the category centre
    pub offset: f64,
    pub width: f64,
    pub bars: Vec<Bar>,
}

/// One bar segment spanning `bottom..top` at a category index
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub category: usize,
    pub bottom: f64,
    pub top: f64,
}

/// Points and lines over a numeric x-axis
#[derive(Debug, Clone)]
pub struct XyPanel {
    pub caption: Option<String>,
    pub x_desc: String,
    pub y_desc: String,
    pub series: Vec<XySeries>,
    pub legend: Legend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesStyle {
    Line { width: u32 },
    Markers { size: u32 },
    LineMarkers { width: u32, size: u32 },
}

#[derive(Debug, Clone)]
pub struct XySeries {
    /// Series without a label stay out of the legend
    pub label: Option<String>,
    pub color: RGBColor,
    pub opacity: f64,
    pub style: SeriesStyle,
    pub points: Vec<(f64, f64)>,
}

/// Centre offset of slot `idx` out of `count` bars of `width` in one category
fn slot_offset(idx: usize, count: usize, width: f64) -> f64 {
    (idx as f64 - (count as f64 - 1.0) / 2.0) * width
}

fn thread_categories(threads: &[u32]) -> Vec<String> {
    threads.iter().map(|t| t.to_string()).collect()
}

/// Plan every chart drawn from the summary table
pub fn summary_figures(table: &SummaryTable) -> Vec<Figure> {
    let workloads = table.by_workload();
    let mut figures = Vec::new();

    for spec in SUMMARY_METRICS {
        if table.total(spec.metric) == 0.0 {
            debug!(metric = spec.metric.column(), "metric is zero everywhere, skipping");
            continue;
        }
        for (workload, part) in &workloads {
            figures.push(summary_bar(workload, part, spec));
        }
        for (workload, part) in &workloads {
            figures.push(summary_scatter(workload, part, spec));
        }
    }

    for (workload, part) in &workloads {
        figures.push(latency_breakdown(workload, part));
    }
    for (workload, part) in &workloads {
        figures.push(data_size(workload, part));
    }
    for (workload, part) in &workloads {
        figures.push(disk_usage_bar(workload, part));
    }
    for (workload, part) in &workloads {
        figures.push(disk_growth_line(workload, part));
    }
    for (workload, part) in &workloads {
        figures.push(disk_stacked_bar(workload, part));
    }

    figures
}

/// Plan every chart drawn from the interval samples
pub fn detail_figures(table: &DetailTable) -> Vec<Figure> {
    let workloads = table.by_workload();
    let mut figures = Vec::new();

    for spec in DETAIL_METRICS {
        let column = spec.metric.column();
        if !table.has_column(spec.metric) {
            debug!(metric = column, "column not present in detail results, skipping");
            continue;
        }
        if table.total(spec.metric) == 0.0 {
            debug!(metric = column, "metric is zero everywhere, skipping");
            continue;
        }
        for (workload, part) in &workloads {
            figures.push(detail_timeseries(workload, part, spec));
        }
        for (workload, part) in &workloads {
            figures.push(detail_scatter(workload, part, spec));
        }
    }

    figures
}

/// Bars of `metric` per thread count and engine, one bar per pair present
fn grouped_bars(part: &Partition<'_, SummaryRow>, metric: Metric, log_y: bool) -> BarPanel {
    let threads = part.thread_counts();
    let engines = part.engines();
    let width = GROUP_WIDTH / engines.len().max(1) as f64;

    let series = engines
        .iter()
        .enumerate()
        .map(|(idx, &engine)| {
            let rows = part.with_engine(engine);
            let bars = threads
                .iter()
                .enumerate()
                .filter_map(|(category, &t)| {
                    rows.with_threads(t).mean(|r| metric.summary_value(r)).map(|top| Bar {
                        category,
                        bottom: 0.0,
                        top,
                    })
                })
                .collect();
            BarSeries {
                label: engine.name().to_string(),
                color: engine.color(),
                opacity: 1.0,
                offset: slot_offset(idx, engines.len(), width),
                width,
                bars,
            }
        })
        .collect();

    BarPanel {
        caption: None,
        x_desc: "Threads".to_string(),
        y_desc: String::new(),
        categories: thread_categories(&threads),
        series,
        log_y,
        legend: Legend::Engine,
    }
}

/// Whether a scale-sensitive metric spans enough orders of magnitude in this
/// workload to need a log axis
pub fn wants_log_scale(part: &Partition<'_, SummaryRow>, spec: &MetricSpec) -> bool {
    if !spec.scale_sensitive || part.is_empty() {
        return false;
    }
    let values = part.rows().iter().map(|r| spec.metric.summary_value(r));
    let (min, max) = values.fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
    max / min.max(1.0) > LOG_SCALE_RATIO
}

pub fn summary_bar(workload: &str, part: &Partition<'_, SummaryRow>, spec: &MetricSpec) -> Figure {
    let mut panel = grouped_bars(part, spec.metric, wants_log_scale(part, spec));
    panel.y_desc = spec.label.to_string();

    Figure {
        file_stem: format!("summary_bar_{}_{}", spec.metric.column(), workload),
        title: format!("{} - {}", format_workload(workload), spec.label),
        panels: vec![Panel::Bars(panel)],
        panel_size: SINGLE_PANEL_SIZE,
    }
}

pub fn summary_scatter(
    workload: &str,
    part: &Partition<'_, SummaryRow>,
    spec: &MetricSpec,
) -> Figure {
    let metric = spec.metric;
    let mut series = Vec::new();

    for engine in part.engines() {
        let rows = part.with_engine(engine);
        let points = rows
            .rows()
            .iter()
            .map(|r| (r.threads as f64, metric.summary_value(r)))
            .filter(|(_, v)| !v.is_nan())
            .collect();
        let means = rows
            .thread_counts()
            .into_iter()
            .filter_map(|t| {
                rows.with_threads(t)
                    .mean(|r| metric.summary_value(r))
                    .map(|mean| (t as f64, mean))
            })
            .collect();

        // Mean line first so the points sit on top of it
        series.push(XySeries {
            label: None,
            color: engine.color(),
            opacity: 0.6,
            style: SeriesStyle::Line { width: 2 },
            points: means,
        });
        series.push(XySeries {
            label: Some(engine.name().to_string()),
            color: engine.color(),
            opacity: 1.0,
            style: SeriesStyle::Markers { size: 9 },
            points,
        });
    }

    Figure {
        file_stem: format!("summary_scatter_{}_{}", metric.column(), workload),
        title: format!("{} - {}", format_workload(workload), spec.label),
        panels: vec![Panel::Xy(XyPanel {
            caption: None,
            x_desc: "Threads".to_string(),
            y_desc: spec.label.to_string(),
            series,
            legend: Legend::Engine,
        })],
        panel_size: SINGLE_PANEL_SIZE,
    }
}

/// Min/avg/p95/max latency side by side, one sub-chart per thread count
pub fn latency_breakdown(workload: &str, part: &Partition<'_, SummaryRow>) -> Figure {
    let engines = part.engines();
    let categories: Vec<String> = LATENCY_BREAKDOWN.iter().map(|(_, l)| l.to_string()).collect();

    let panels = part
        .thread_counts()
        .into_iter()
        .enumerate()
        .map(|(panel_idx, t)| {
            let at_threads = part.with_threads(t);
            let series = engines
                .iter()
                .enumerate()
                .filter_map(|(idx, &engine)| {
                    let rows = at_threads.with_engine(engine);
                    if rows.is_empty() {
                        return None;
                    }
                    let bars = LATENCY_BREAKDOWN
                        .iter()
                        .enumerate()
                        .filter_map(|(category, (metric, _))| {
                            rows.mean(|r| metric.summary_value(r)).map(|top| Bar {
                                category,
                                bottom: 0.0,
                                top,
                            })
                        })
                        .collect();
                    Some(BarSeries {
                        label: engine.name().to_string(),
                        color: engine.color(),
                        opacity: 1.0,
                        offset: slot_offset(idx, engines.len(), PAIRED_BAR_WIDTH),
                        width: PAIRED_BAR_WIDTH,
                        bars,
                    })
                })
                .collect();

            Panel::Bars(BarPanel {
                caption: Some(format!("{} threads", t)),
                x_desc: "Statistic".to_string(),
                y_desc: if panel_idx == 0 {
                    "Latency (ms)".to_string()
                } else {
                    String::new()
                },
                categories: categories.clone(),
                series,
                log_y: false,
                legend: Legend::Engine,
            })
        })
        .collect();

    Figure {
        file_stem: format!("summary_latency_breakdown_{}", workload),
        title: format!("{} - Latency Breakdown", format_workload(workload)),
        panels,
        panel_size: BREAKDOWN_PANEL_SIZE,
    }
}

/// Data size after prepare and after run per engine, at the lowest thread
/// count only since the prepared size does not depend on threads.
pub fn data_size(workload: &str, part: &Partition<'_, SummaryRow>) -> Figure {
    let engines = part.engines();
    let lowest = part.thread_counts().first().copied();
    let at_lowest = match lowest {
        Some(t) => part.with_threads(t),
        None => Partition::new(Vec::new()),
    };

    let phases: [(&str, RGBColor, fn(&SummaryRow) -> f64); 2] = [
        ("After Prepare", PREPARE_COLOR, |r: &SummaryRow| r.data_size_after_prepare_mb),
        ("After Run", RUN_COLOR, |r: &SummaryRow| r.data_size_after_run_mb),
    ];

    let series = phases
        .iter()
        .enumerate()
        .map(|(idx, (label, color, value))| BarSeries {
            label: label.to_string(),
            color: *color,
            opacity: 0.85,
            offset: slot_offset(idx, phases.len(), PAIRED_BAR_WIDTH),
            width: PAIRED_BAR_WIDTH,
            bars: engines
                .iter()
                .enumerate()
                .map(|(category, &engine)| Bar {
                    category,
                    bottom: 0.0,
                    top: at_lowest.with_engine(engine).mean(value).unwrap_or(0.0),
                })
                .collect(),
        })
        .collect();

    Figure {
        file_stem: format!("summary_datasize_{}", workload),
        title: format!("{} - Data Size", format_workload(workload)),
        panels: vec![Panel::Bars(BarPanel {
            caption: None,
            x_desc: LEGEND_ENGINE.to_string(),
            y_desc: "Data Size (MB)".to_string(),
            categories: engines.iter().map(|e| e.name().to_string()).collect(),
            series,
            log_y: false,
            legend: Legend::Plain,
        })],
        panel_size: SINGLE_PANEL_SIZE,
    }
}

pub fn disk_usage_bar(workload: &str, part: &Partition<'_, SummaryRow>) -> Figure {
    let mut panel = grouped_bars(part, Metric::DataSizeAfterRunMb, false);
    panel.y_desc = "Data Size (MB)".to_string();

    Figure {
        file_stem: format!("summary_disk_usage_bar_{}", workload),
        title: format!("{} - Disk Usage After Run", format_workload(workload)),
        panels: vec![Panel::Bars(panel)],
        panel_size: SINGLE_PANEL_SIZE,
    }
}

pub fn disk_growth_line(workload: &str, part: &Partition<'_, SummaryRow>) -> Figure {
    let series = part
        .engines()
        .into_iter()
        .map(|engine| {
            let mut points: Vec<(f64, f64)> = part
                .with_engine(engine)
                .rows()
                .iter()
                .map(|r| (r.threads as f64, r.disk_growth_mb()))
                .filter(|(_, growth)| !growth.is_nan())
                .collect();
            points.sort_by(|a, b| a.0.total_cmp(&b.0));
            XySeries {
                label: Some(engine.name().to_string()),
                color: engine.color(),
                opacity: 0.85,
                style: SeriesStyle::LineMarkers { width: 3, size: 8 },
                points,
            }
        })
        .collect();

    Figure {
        file_stem: format!("summary_disk_growth_line_{}", workload),
        title: format!("{} - Disk Growth (Run − Prepare)", format_workload(workload)),
        panels: vec![Panel::Xy(XyPanel {
            caption: None,
            x_desc: "Threads".to_string(),
            y_desc: "Growth (MB)".to_string(),
            series,
            legend: Legend::Engine,
        })],
        panel_size: SINGLE_PANEL_SIZE,
    }
}

/// Base (after prepare) and growth segments of a stacked disk usage bar.
/// Shrinkage during the run shows as no growth segment at all.
pub fn stacked_segments(row: Option<&SummaryRow>) -> (Bar, Bar) {
    let (base, growth) = match row {
        Some(r) => (r.data_size_after_prepare_mb, r.disk_growth_mb().max(0.0)),
        None => (0.0, 0.0),
    };
    (
        Bar {
            category: 0,
            bottom: 0.0,
            top: base,
        },
        Bar {
            category: 0,
            bottom: base,
            top: base + growth,
        },
    )
}

pub fn disk_stacked_bar(workload: &str, part: &Partition<'_, SummaryRow>) -> Figure {
    let threads = part.thread_counts();
    let engines = part.engines();
    let mut series = Vec::new();

    for (idx, &engine) in engines.iter().enumerate() {
        let rows = part.with_engine(engine);
        let (base, growth): (Vec<Bar>, Vec<Bar>) = threads
            .iter()
            .enumerate()
            .map(|(category, &t)| {
                let (base, growth) = stacked_segments(rows.with_threads(t).first());
                (Bar { category, ..base }, Bar { category, ..growth })
            })
            .unzip();

        let offset = slot_offset(idx, engines.len(), PAIRED_BAR_WIDTH);
        series.push(BarSeries {
            label: format!("{} (base)", engine.name()),
            color: engine.color(),
            opacity: 1.0,
            offset,
            width: PAIRED_BAR_WIDTH,
            bars: base,
        });
        series.push(BarSeries {
            label: format!("{} (growth)", engine.name()),
            color: engine.color(),
            opacity: 0.5,
            offset,
            width: PAIRED_BAR_WIDTH,
            bars: growth,
        });
    }

    Figure {
        file_stem: format!("summary_disk_stacked_{}", workload),
        title: format!("{} - Disk Usage (Base + Growth)", format_workload(workload)),
        panels: vec![Panel::Bars(BarPanel {
            caption: None,
            x_desc: "Threads".to_string(),
            y_desc: "Data Size (MB)".to_string(),
            categories: thread_categories(&threads),
            series,
            log_y: false,
            legend: Legend::Plain,
        })],
        panel_size: SINGLE_PANEL_SIZE,
    }
}

/// One interval sub-chart per thread count with a series per engine
fn detail_panels(
    part: &Partition<'_, DetailRow>,
    spec: &MetricSpec,
    style: SeriesStyle,
    opacity: f64,
    sort_by_time: bool,
) -> Vec<Panel> {
    part.thread_counts()
        .into_iter()
        .enumerate()
        .map(|(panel_idx, t)| {
            let at_threads = part.with_threads(t);
            let series = at_threads
                .engines()
                .into_iter()
                .map(|engine| {
                    let mut points: Vec<(f64, f64)> = at_threads
                        .with_engine(engine)
                        .rows()
                        .iter()
                        .filter_map(|r| spec.metric.detail_value(r).map(|v| (r.time_s, v)))
                        .filter(|(x, y)| x.is_finite() && y.is_finite())
                        .collect();
                    if sort_by_time {
                        points.sort_by(|a, b| a.0.total_cmp(&b.0));
                    }
                    XySeries {
                        label: Some(engine.name().to_string()),
                        color: engine.color(),
                        opacity,
                        style,
                        points,
                    }
                })
                .collect();

            Panel::Xy(XyPanel {
                caption: Some(format!("{} threads", t)),
                x_desc: "Time (s)".to_string(),
                y_desc: if panel_idx == 0 {
                    spec.label.to_string()
                } else {
                    String::new()
                },
                series,
                legend: Legend::Engine,
            })
        })
        .collect()
}

pub fn detail_timeseries(
    workload: &str,
    part: &Partition<'_, DetailRow>,
    spec: &MetricSpec,
) -> Figure {
    Figure {
        file_stem: format!("detail_ts_{}_{}", spec.metric.column(), workload),
        title: format!("{} - {} Over Time", format_workload(workload), spec.label),
        panels: detail_panels(part, spec, SeriesStyle::Line { width: 2 }, 0.85, true),
        panel_size: DETAIL_PANEL_SIZE,
    }
}

pub fn detail_scatter(
    workload: &str,
    part: &Partition<'_, DetailRow>,
    spec: &MetricSpec,
) -> Figure {
    Figure {
        file_stem: format!("detail_scatter_{}_{}", spec.metric.column(), workload),
        title: format!("{} - {} Scatter", format_workload(workload), spec.label),
        panels: detail_panels(part, spec, SeriesStyle::Markers { size: 4 }, 0.7, false),
        panel_size: DETAIL_PANEL_SIZE,
    }
}
