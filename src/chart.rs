use crate::figure::{BarPanel, Figure, Legend, Panel, SeriesStyle, XyPanel};
use anyhow::{Context, Result};
use plotters::coord::{CoordTranslate, Shift};
use plotters::prelude::*;
use std::path::{Path, PathBuf};

// Font sizes
const TITLE_FONT_SIZE: u32 = 34;
const CAPTION_FONT_SIZE: u32 = 26;
const AXIS_LABEL_FONT_SIZE: u32 = 22;
const TICK_LABEL_FONT_SIZE: u32 = 18;
const LEGEND_FONT_SIZE: u32 = 18;

// Layout tuning
const PANEL_MARGIN: u32 = 20;
const X_LABEL_AREA_SIZE: u32 = 60;
const Y_LABEL_AREA_SIZE: u32 = 90;

/// Gap between neighbouring bars, in category units
const BAR_GAP: f64 = 0.01;

const BACKGROUND: RGBColor = RGBColor(0xfa, 0xfa, 0xfa);
const GRID: RGBColor = RGBColor(0xdd, 0xdd, 0xdd);

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

/// Format an axis value for display
fn format_value(value: f64) -> String {
    let abs = value.abs();
    if abs >= 100.0 || value == value.trunc() {
        format!("{:.0}", value)
    } else if abs >= 1.0 {
        format!("{:.1}", value)
    } else {
        format!("{:.2}", value)
    }
}

fn format_log_tick(value: f64) -> String {
    if value <= 0.0 {
        return String::new();
    }
    // Only label powers of 10 on log axes.
    let log10 = value.log10();
    let nearest = log10.round();
    if (log10 - nearest).abs() < 1e-6 {
        format_value(10f64.powf(nearest))
    } else {
        String::new()
    }
}

/// Vertical extent shared by every panel of a figure
#[derive(Debug, Clone, Copy, PartialEq)]
struct YRange {
    lo: f64,
    hi: f64,
    log: bool,
}

impl YRange {
    fn for_figure(figure: &Figure) -> Self {
        let log = figure
            .panels
            .iter()
            .any(|p| matches!(p, Panel::Bars(bars) if bars.log_y));

        let mut values = Vec::new();
        let mut has_bars = false;
        for panel in &figure.panels {
            match panel {
                Panel::Bars(bars) => {
                    has_bars = true;
                    for bar in bars.series.iter().flat_map(|s| &s.bars) {
                        values.push(bar.bottom);
                        values.push(bar.top);
                    }
                }
                Panel::Xy(xy) => {
                    values.extend(xy.series.iter().flat_map(|s| s.points.iter().map(|p| p.1)));
                }
            }
        }
        values.retain(|v| v.is_finite());

        if log {
            let min_positive = values
                .iter()
                .copied()
                .filter(|&v| v > 0.0)
                .fold(f64::MAX, f64::min);
            let max = values.iter().copied().fold(0.0_f64, f64::max);
            if max <= 0.0 {
                return Self::linear(0.0, 1.0);
            }
            return Self {
                lo: min_positive * 0.5,
                hi: max * 2.0,
                log: true,
            };
        }

        let mut lo = values.iter().copied().fold(f64::MAX, f64::min);
        let mut hi = values.iter().copied().fold(f64::MIN, f64::max);
        if values.is_empty() {
            return Self::linear(0.0, 1.0);
        }
        if has_bars {
            // Bars grow from zero
            lo = lo.min(0.0);
            hi = hi.max(0.0);
        }
        let span = hi - lo;
        let pad = if span > 0.0 { span * 0.08 } else { lo.abs().max(1.0) * 0.5 };
        if !has_bars || lo < 0.0 {
            lo -= pad;
        }
        hi += pad;
        Self::linear(lo, hi)
    }

    fn linear(lo: f64, hi: f64) -> Self {
        Self { lo, hi, log: false }
    }
}

/// Numeric x extent of an xy panel, padded so markers stay inside the plot
fn x_bounds(panel: &XyPanel) -> (f64, f64) {
    let xs = panel
        .series
        .iter()
        .flat_map(|s| s.points.iter().map(|p| p.0))
        .filter(|x| x.is_finite());
    let (lo, hi) = xs.fold((f64::MAX, f64::MIN), |(lo, hi), x| (lo.min(x), hi.max(x)));
    if lo > hi {
        return (0.0, 1.0);
    }
    let span = hi - lo;
    let pad = if span > 0.0 { span * 0.05 } else { 1.0 };
    (lo - pad, hi + pad)
}

fn category_label(categories: &[String], x: f64) -> String {
    let idx = x.round();
    if idx < 0.0 || (x - idx).abs() > 0.3 {
        return String::new();
    }
    categories.get(idx as usize).cloned().unwrap_or_default()
}

/// Corners of the bars that can be drawn on `y`. Missing values are skipped;
/// on a log axis bars start at the bottom of the axis and non-positive bars are
/// skipped.
fn bar_rects(panel: &BarPanel, y: &YRange) -> Vec<(usize, [(f64, f64); 2])> {
    let mut rects = Vec::new();
    for (idx, series) in panel.series.iter().enumerate() {
        for bar in &series.bars {
            if !bar.top.is_finite() || !bar.bottom.is_finite() {
                continue;
            }
            let bottom = if y.log {
                if bar.top <= 0.0 {
                    continue;
                }
                bar.bottom.max(y.lo)
            } else {
                bar.bottom
            };
            let x_center = bar.category as f64 + series.offset;
            let x_left = x_center - series.width / 2.0 + BAR_GAP;
            let x_right = x_center + series.width / 2.0 - BAR_GAP;
            rects.push((idx, [(x_left, bottom), (x_right, bar.top)]));
        }
    }
    rects
}

/// Render a planned figure to `<output_dir>/<file_stem>.png`
pub fn render_figure(figure: &Figure, output_dir: &Path) -> Result<PathBuf> {
    let path = output_dir.join(figure.file_name());
    let y_range = YRange::for_figure(figure);

    {
        let root = BitMapBackend::new(&path, figure.size()).into_drawing_area();
        root.fill(&BACKGROUND)?;
        let body = root.titled(&figure.title, ("sans-serif", TITLE_FONT_SIZE))?;

        let areas = body.split_evenly((1, figure.panels.len().max(1)));
        for (area, panel) in areas.iter().zip(&figure.panels) {
            match panel {
                Panel::Bars(bars) => draw_bar_panel(area, bars, &y_range)?,
                Panel::Xy(xy) => draw_xy_panel(area, xy, &y_range)?,
            }
        }

        root.present()
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    Ok(path)
}

fn draw_bar_panel(area: &Area<'_>, panel: &BarPanel, y: &YRange) -> Result<()> {
    let num_categories = panel.categories.len().max(1);
    let x_range = -0.5..(num_categories as f64 - 0.5);

    let mut builder = ChartBuilder::on(area);
    builder
        .margin(PANEL_MARGIN)
        .x_label_area_size(X_LABEL_AREA_SIZE)
        .y_label_area_size(Y_LABEL_AREA_SIZE);
    if let Some(caption) = &panel.caption {
        builder.caption(caption, ("sans-serif", CAPTION_FONT_SIZE));
    }

    if y.log {
        let mut chart = builder.build_cartesian_2d(x_range, (y.lo..y.hi).log_scale())?;
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(num_categories)
            .x_label_formatter(&|x| category_label(&panel.categories, *x))
            .y_label_formatter(&|v| format_log_tick(*v))
            .bold_line_style(GRID)
            .light_line_style(BACKGROUND)
            .x_desc(panel.x_desc.as_str())
            .y_desc(panel.y_desc.as_str())
            .label_style(("sans-serif", TICK_LABEL_FONT_SIZE))
            .axis_desc_style(("sans-serif", AXIS_LABEL_FONT_SIZE))
            .draw()?;
        draw_bars(&mut chart, panel, y)
    } else {
        let mut chart = builder.build_cartesian_2d(x_range, y.lo..y.hi)?;
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(num_categories)
            .x_label_formatter(&|x| category_label(&panel.categories, *x))
            .y_label_formatter(&|v| format_value(*v))
            .bold_line_style(GRID)
            .light_line_style(BACKGROUND)
            .x_desc(panel.x_desc.as_str())
            .y_desc(panel.y_desc.as_str())
            .label_style(("sans-serif", TICK_LABEL_FONT_SIZE))
            .axis_desc_style(("sans-serif", AXIS_LABEL_FONT_SIZE))
            .draw()?;
        draw_bars(&mut chart, panel, y)
    }
}

fn draw_bars<'a, 'b: 'a, CT>(
    chart: &mut ChartContext<'a, BitMapBackend<'b>, CT>,
    panel: &BarPanel,
    y: &YRange,
) -> Result<()>
where
    CT: CoordTranslate<From = (f64, f64)>,
{
    if panel.legend == Legend::Engine {
        draw_legend_heading(chart)?;
    }

    let rects = bar_rects(panel, y);
    for (idx, series) in panel.series.iter().enumerate() {
        let fill = series.color.mix(series.opacity).filled();
        let corners: Vec<[(f64, f64); 2]> = rects
            .iter()
            .filter(|(series_idx, _)| *series_idx == idx)
            .map(|(_, c)| *c)
            .collect();

        chart
            .draw_series(corners.iter().map(|c| Rectangle::new(*c, fill)))?
            .label(series.label.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 6), (x + 20, y + 6)], fill));

        // White bar edges
        chart.draw_series(
            corners
                .iter()
                .map(|c| Rectangle::new(*c, WHITE.stroke_width(1))),
        )?;
    }

    draw_series_labels(chart)
}

fn draw_xy_panel(area: &Area<'_>, panel: &XyPanel, y: &YRange) -> Result<()> {
    let (x_lo, x_hi) = x_bounds(panel);

    let mut builder = ChartBuilder::on(area);
    builder
        .margin(PANEL_MARGIN)
        .x_label_area_size(X_LABEL_AREA_SIZE)
        .y_label_area_size(Y_LABEL_AREA_SIZE);
    if let Some(caption) = &panel.caption {
        builder.caption(caption, ("sans-serif", CAPTION_FONT_SIZE));
    }
    let mut chart = builder.build_cartesian_2d(x_lo..x_hi, y.lo..y.hi)?;

    chart
        .configure_mesh()
        .x_label_formatter(&|x| format_value(*x))
        .y_label_formatter(&|v| format_value(*v))
        .bold_line_style(GRID)
        .light_line_style(BACKGROUND)
        .x_desc(panel.x_desc.as_str())
        .y_desc(panel.y_desc.as_str())
        .label_style(("sans-serif", TICK_LABEL_FONT_SIZE))
        .axis_desc_style(("sans-serif", AXIS_LABEL_FONT_SIZE))
        .draw()?;

    if panel.legend == Legend::Engine {
        draw_legend_heading(&mut chart)?;
    }

    for series in &panel.series {
        let color = series.color.mix(series.opacity);
        let points: Vec<(f64, f64)> = series
            .points
            .iter()
            .copied()
            .filter(|(x, v)| x.is_finite() && v.is_finite())
            .collect();

        match series.style {
            SeriesStyle::Line { width } => {
                let anno =
                    chart.draw_series(LineSeries::new(points, color.stroke_width(width)))?;
                if let Some(label) = &series.label {
                    anno.label(label.as_str()).legend(move |(x, y)| {
                        PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(width))
                    });
                }
            }
            SeriesStyle::Markers { size } => {
                let anno = chart.draw_series(
                    points
                        .iter()
                        .map(|&p| Circle::new(p, size, color.filled())),
                )?;
                if let Some(label) = &series.label {
                    anno.label(label.as_str())
                        .legend(move |(x, y)| Circle::new((x + 10, y), 6, color.filled()));
                }
                chart.draw_series(
                    points
                        .iter()
                        .map(|&p| Circle::new(p, size, WHITE.stroke_width(1))),
                )?;
            }
            SeriesStyle::LineMarkers { width, size } => {
                let anno = chart
                    .draw_series(LineSeries::new(points.clone(), color.stroke_width(width)))?;
                if let Some(label) = &series.label {
                    anno.label(label.as_str()).legend(move |(x, y)| {
                        PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(width))
                    });
                }
                chart.draw_series(PointSeries::of_element(
                    points,
                    size,
                    color.filled(),
                    &|coord, size, style| {
                        EmptyElement::at(coord) + Circle::new((0, 0), size, style)
                    },
                ))?;
            }
        }
    }

    draw_series_labels(&mut chart)
}

/// Adds an "Engine" heading as the first legend entry
fn draw_legend_heading<'a, 'b: 'a, CT>(
    chart: &mut ChartContext<'a, BitMapBackend<'b>, CT>,
) -> Result<()>
where
    CT: CoordTranslate<From = (f64, f64)>,
{
    chart
        .draw_series(std::iter::empty::<Rectangle<(f64, f64)>>())?
        .label("Engine")
        .legend(|(x, y)| Rectangle::new([(x, y), (x, y)], WHITE.mix(0.0).filled()));
    Ok(())
}

fn draw_series_labels<'a, 'b: 'a, CT>(
    chart: &mut ChartContext<'a, BitMapBackend<'b>, CT>,
) -> Result<()>
where
    CT: CoordTranslate<From = (f64, f64)>,
{
    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .label_font(("sans-serif", LEGEND_FONT_SIZE))
        .draw()?;
    Ok(())
}
