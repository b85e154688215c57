//! Aggregation and chart rendering
//!
//! Pure, stateless, replay-safe: reads a finished results table, groups by
//! `(MeasurementType, Version)`, computes per-bin mean and sample standard
//! deviation, and renders one comparison panel per measurement type.
//! Re-running on an unchanged table yields identical statistics and chart
//! data. `NaN` sentinel rows are excluded from statistics; a group with no
//! valid readings is omitted, never an error.

use std::collections::BTreeMap;
use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::error::{Error, Result};
use crate::profiler::MeasurementType;
use crate::sink::TrialRecord;

/// Chart pixel dimensions, one panel per measurement type side by side.
const CHART_SIZE: (u32, u32) = (1400, 700);

/// Identity of one rendered line series.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeriesKey {
    /// Measurement strategy (chart panel)
    pub measurement_type: MeasurementType,
    /// Binary variant label (line within a panel)
    pub version: String,
}

/// Summary statistics of one `(series, bin count)` cell.
#[derive(Debug, Clone, PartialEq)]
pub struct PointSummary {
    /// Parameter value of the cell
    pub bin_count: u32,
    /// Mean of the valid readings
    pub mean: f64,
    /// Sample standard deviation of the valid readings (0 for one sample)
    pub std_dev: f64,
    /// Number of valid (non-`NaN`) readings
    pub samples: usize,
}

/// Per-series summaries, ordered by `(measurement type, version)` with
/// points sorted by bin count.
pub type SeriesSummaries = BTreeMap<SeriesKey, Vec<PointSummary>>;

/// Group trial records and compute per-bin summary statistics.
///
/// `NaN` rows are dropped before statistics; a `(series, bin)` cell with no
/// valid readings produces no point, and a series with no cells at all is
/// absent from the result.
#[must_use]
pub fn summarize(records: &[TrialRecord]) -> SeriesSummaries {
    let mut cells: BTreeMap<SeriesKey, BTreeMap<u32, Vec<f64>>> = BTreeMap::new();
    for record in records {
        if record.energy_joules().is_nan() {
            continue;
        }
        cells
            .entry(SeriesKey {
                measurement_type: record.measurement_type(),
                version: record.version().to_string(),
            })
            .or_default()
            .entry(record.bin_count())
            .or_default()
            .push(record.energy_joules());
    }

    cells
        .into_iter()
        .map(|(key, bins)| {
            let points = bins
                .into_iter()
                .map(|(bin_count, values)| {
                    let (mean, std_dev) = mean_std_dev(&values);
                    PointSummary {
                        bin_count,
                        mean,
                        std_dev,
                        samples: values.len(),
                    }
                })
                .collect();
            (key, points)
        })
        .collect()
}

/// Version labels in first-appearance order of the table.
///
/// Color assignment follows this order, so repeated runs over the same
/// table (or tables produced by the same sweep configuration) are visually
/// comparable.
#[must_use]
pub fn version_order(records: &[TrialRecord]) -> Vec<String> {
    let mut versions = Vec::new();
    for record in records {
        if !versions.iter().any(|v| v == record.version()) {
            versions.push(record.version().to_string());
        }
    }
    versions
}

/// Render the comparison chart: one panel per measurement type, one line
/// series with ±σ error bars per version.
///
/// # Errors
///
/// Returns [`Error::Chart`] when the backend cannot draw or write the file.
pub fn render_chart(
    summaries: &SeriesSummaries,
    versions: &[String],
    path: &Path,
) -> Result<()> {
    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    let panels = root.split_evenly((1, 2));
    for (panel, strategy) in panels.iter().zip(MeasurementType::ALL) {
        draw_panel(panel, strategy, summaries, versions)?;
    }

    root.present().map_err(chart_err)?;
    Ok(())
}

/// Load a results table, aggregate it, and render the chart artifact.
///
/// # Errors
///
/// Returns an error when the table cannot be read or the chart cannot be
/// written; sentinel rows and empty groups are not errors.
pub fn aggregate_and_plot(table: impl AsRef<Path>, chart: impl AsRef<Path>) -> Result<()> {
    let records = crate::sink::load_table(table)?;
    let summaries = summarize(&records);
    let versions = version_order(&records);
    tracing::info!(
        series = summaries.len(),
        versions = versions.len(),
        chart = %chart.as_ref().display(),
        "rendering comparison chart"
    );
    render_chart(&summaries, &versions, chart.as_ref())
}

fn draw_panel(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    strategy: MeasurementType,
    summaries: &SeriesSummaries,
    versions: &[String],
) -> Result<()> {
    let series: Vec<(&SeriesKey, &Vec<PointSummary>)> = summaries
        .iter()
        .filter(|(key, _)| key.measurement_type == strategy)
        .collect();

    let mut x_max = 0u32;
    let mut y_max = 0f64;
    for (_, points) in &series {
        for point in *points {
            x_max = x_max.max(point.bin_count);
            y_max = y_max.max(point.mean + point.std_dev);
        }
    }
    let x_range = 0f64..(f64::from(x_max.max(1)) * 1.05);
    let y_range = 0f64..(y_max.max(1.0) * 1.1);

    let mut chart = ChartBuilder::on(area)
        .caption(strategy.to_string(), ("sans-serif", 28))
        .margin(20)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .x_desc("Number of Bins")
        .y_desc("Energy Consumption (Joules)")
        .draw()
        .map_err(chart_err)?;

    for (key, points) in &series {
        let palette_idx = versions
            .iter()
            .position(|v| v == &key.version)
            .unwrap_or(0);
        let color = Palette99::pick(palette_idx).to_rgba();

        chart
            .draw_series(LineSeries::new(
                points.iter().map(|p| (f64::from(p.bin_count), p.mean)),
                color.stroke_width(2),
            ))
            .map_err(chart_err)?
            .label(key.version.clone())
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
            });

        chart
            .draw_series(points.iter().map(|p| {
                ErrorBar::new_vertical(
                    f64::from(p.bin_count),
                    p.mean - p.std_dev,
                    p.mean,
                    p.mean + p.std_dev,
                    color.filled(),
                    6,
                )
            }))
            .map_err(chart_err)?;
    }

    if !series.is_empty() {
        chart
            .configure_series_labels()
            .border_style(BLACK)
            .background_style(WHITE.mix(0.8))
            .draw()
            .map_err(chart_err)?;
    }
    Ok(())
}

fn mean_std_dev(values: &[f64]) -> (f64, f64) {
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, variance.sqrt())
}

fn chart_err(error: impl std::fmt::Display) -> Error {
    Error::Chart(error.to_string())
}
