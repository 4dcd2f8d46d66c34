//! Four-panel PNG for one subject's result rows.
//!
//! [`ChartData`] is the pure projection of rows onto what gets drawn;
//! [`render_chart`] hands it to `plotters`.

use plotters::coord::Shift;
use plotters::prelude::*;
use serde::Serialize;
use std::path::Path;

use crate::domain::error::BenchError;
use crate::domain::row::ResultRow;

const CHART_SIZE: (u32, u32) = (1400, 1000);
const ORANGE: RGBColor = RGBColor(255, 165, 0);

#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("no rows to chart")]
    EmptyData,

    #[error("drawing failed: {0}")]
    Draw(String),
}

impl From<ChartError> for BenchError {
    fn from(e: ChartError) -> Self {
        BenchError::Chart(e.to_string())
    }
}

fn draw_err(e: impl std::fmt::Display) -> ChartError {
    ChartError::Draw(e.to_string())
}

/// Stability classification of a CV% value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilityBand {
    Stable,
    Marginal,
    Unstable,
}

impl StabilityBand {
    /// `< 10` stable, `10..=20` marginal, `> 20` unstable.
    pub fn classify(cv_pct: f64) -> Self {
        if cv_pct < 10.0 {
            StabilityBand::Stable
        } else if cv_pct <= 20.0 {
            StabilityBand::Marginal
        } else {
            StabilityBand::Unstable
        }
    }

    fn color(self) -> RGBColor {
        match self {
            StabilityBand::Stable => GREEN,
            StabilityBand::Marginal => ORANGE,
            StabilityBand::Unstable => RED,
        }
    }
}

/// One block size worth of plotted values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub block_size: u32,
    /// Position on the base-2 log axis.
    pub log2_block: f64,
    pub mean_ms: f64,
    pub std_dev_ms: f64,
    pub rt_cpu_pct: f64,
    pub cv_pct: f64,
    pub band: StabilityBand,
    pub min_us: f64,
    pub median_us: f64,
    pub p95_us: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub title: String,
    /// Sorted by block size.
    pub points: Vec<ChartPoint>,
}

impl ChartData {
    pub fn from_rows(title: impl Into<String>, rows: &[ResultRow]) -> Result<Self, ChartError> {
        if rows.is_empty() {
            return Err(ChartError::EmptyData);
        }
        let mut points: Vec<ChartPoint> = rows
            .iter()
            .map(|r| ChartPoint {
                block_size: r.block_size,
                log2_block: f64::from(r.block_size.max(1)).log2(),
                mean_ms: r.mean_us / 1000.0,
                std_dev_ms: r.std_dev_us / 1000.0,
                rt_cpu_pct: r.approx_rt_cpu_pct,
                cv_pct: r.cv_pct,
                band: StabilityBand::classify(r.cv_pct),
                min_us: r.min_us,
                median_us: r.median_us,
                p95_us: r.p95_us,
            })
            .collect();
        points.sort_by_key(|p| p.block_size);
        Ok(Self {
            title: title.into(),
            points,
        })
    }

    /// Log-axis extent padded by half an octave on each side.
    pub fn log2_range(&self) -> (f64, f64) {
        let lo = self.points.first().map(|p| p.log2_block).unwrap_or(0.0);
        let hi = self.points.last().map(|p| p.log2_block).unwrap_or(0.0);
        (lo - 0.5, hi + 0.5)
    }

    /// Upper bound for the latency panel, covering the error bars.
    pub fn latency_ceiling(&self) -> f64 {
        ceiling(self.points.iter().map(|p| p.mean_ms + p.std_dev_ms))
    }

    /// Upper bound for the CPU panel, never below the 100% reference line.
    pub fn cpu_ceiling(&self) -> f64 {
        ceiling(self.points.iter().map(|p| p.rt_cpu_pct)).max(110.0)
    }

    pub fn cv_ceiling(&self) -> f64 {
        ceiling(self.points.iter().map(|p| p.cv_pct)).max(25.0)
    }

    pub fn timing_ceiling(&self) -> f64 {
        ceiling(self.points.iter().map(|p| p.p95_us.max(p.median_us).max(p.min_us)))
    }
}

fn ceiling(values: impl Iterator<Item = f64>) -> f64 {
    let max = values.fold(0.0_f64, f64::max);
    if max > 0.0 {
        max * 1.1
    } else {
        1.0
    }
}

fn octave_label(x: &f64) -> String {
    if (x - x.round()).abs() < 1e-6 {
        format!("{}", 2f64.powf(x.round()) as u64)
    } else {
        String::new()
    }
}

/// Render `rows` as a 2×2 PNG at `path`.
pub fn render_chart(rows: &[ResultRow], title: &str, path: &Path) -> Result<(), ChartError> {
    let data = ChartData::from_rows(title, rows)?;
    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(draw_err)?;

    let panels = root.split_evenly((2, 2));
    draw_latency(&panels[0], &data)?;
    draw_cpu(&panels[1], &data)?;
    draw_stability(&panels[2], &data)?;
    draw_timing(&panels[3], &data)?;

    root.present().map_err(draw_err)?;
    tracing::info!(path = %path.display(), points = data.points.len(), "chart written");
    Ok(())
}

type Panel<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

fn draw_latency(area: &Panel<'_>, data: &ChartData) -> Result<(), ChartError> {
    let (x0, x1) = data.log2_range();
    let mut chart = ChartBuilder::on(area)
        .caption(format!("{}: Mean latency", data.title), ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x0..x1, 0.0..data.latency_ceiling())
        .map_err(draw_err)?;
    chart
        .configure_mesh()
        .x_desc("Block size (samples)")
        .y_desc("Latency (ms)")
        .x_label_formatter(&octave_label)
        .draw()
        .map_err(draw_err)?;

    chart
        .draw_series(LineSeries::new(
            data.points.iter().map(|p| (p.log2_block, p.mean_ms)),
            &BLUE,
        ))
        .map_err(draw_err)?;
    chart
        .draw_series(data.points.iter().map(|p| {
            ErrorBar::new_vertical(
                p.log2_block,
                (p.mean_ms - p.std_dev_ms).max(0.0),
                p.mean_ms,
                p.mean_ms + p.std_dev_ms,
                BLUE.filled(),
                8,
            )
        }))
        .map_err(draw_err)?;
    Ok(())
}

fn draw_cpu(area: &Panel<'_>, data: &ChartData) -> Result<(), ChartError> {
    let (x0, x1) = data.log2_range();
    let mut chart = ChartBuilder::on(area)
        .caption(format!("{}: Real-time CPU", data.title), ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x0..x1, 0.0..data.cpu_ceiling())
        .map_err(draw_err)?;
    chart
        .configure_mesh()
        .x_desc("Block size (samples)")
        .y_desc("CPU (%)")
        .x_label_formatter(&octave_label)
        .draw()
        .map_err(draw_err)?;

    chart
        .draw_series(LineSeries::new(vec![(x0, 100.0), (x1, 100.0)], &RED))
        .map_err(draw_err)?
        .label("100% real-time")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));
    chart
        .draw_series(LineSeries::new(
            data.points.iter().map(|p| (p.log2_block, p.rt_cpu_pct)),
            &BLUE,
        ))
        .map_err(draw_err)?
        .label("approx RT CPU")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));
    chart
        .draw_series(
            data.points
                .iter()
                .map(|p| Circle::new((p.log2_block, p.rt_cpu_pct), 4, BLUE.filled())),
        )
        .map_err(draw_err)?;
    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(draw_err)?;
    Ok(())
}

/// Label for categorical panels, where x is the point index.
fn index_label(data: &ChartData) -> impl Fn(&f64) -> String + '_ {
    move |x: &f64| {
        let i = x.round();
        if (x - i).abs() > 1e-6 || i < 0.0 {
            return String::new();
        }
        data.points
            .get(i as usize)
            .map(|p| p.block_size.to_string())
            .unwrap_or_default()
    }
}

fn draw_stability(area: &Panel<'_>, data: &ChartData) -> Result<(), ChartError> {
    let n = data.points.len() as f64;
    let label = index_label(data);
    let mut chart = ChartBuilder::on(area)
        .caption(format!("{}: Stability (CV%)", data.title), ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5..n - 0.5, 0.0..data.cv_ceiling())
        .map_err(draw_err)?;
    chart
        .configure_mesh()
        .x_desc("Block size (samples)")
        .y_desc("CV (%)")
        .x_labels(data.points.len())
        .x_label_formatter(&label)
        .draw()
        .map_err(draw_err)?;

    chart
        .draw_series(data.points.iter().enumerate().map(|(i, p)| {
            let x = i as f64;
            Rectangle::new([(x - 0.35, 0.0), (x + 0.35, p.cv_pct)], p.band.color().filled())
        }))
        .map_err(draw_err)?;
    Ok(())
}

fn draw_timing(area: &Panel<'_>, data: &ChartData) -> Result<(), ChartError> {
    let n = data.points.len() as f64;
    let label = index_label(data);
    let mut chart = ChartBuilder::on(area)
        .caption(format!("{}: Timing distribution", data.title), ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5..n - 0.5, 0.0..data.timing_ceiling())
        .map_err(draw_err)?;
    chart
        .configure_mesh()
        .x_desc("Block size (samples)")
        .y_desc("Time (µs)")
        .x_labels(data.points.len())
        .x_label_formatter(&label)
        .draw()
        .map_err(draw_err)?;

    let series: [(&str, RGBColor, f64, fn(&ChartPoint) -> f64); 3] = [
        ("min", GREEN, -0.25, |p| p.min_us),
        ("median", BLUE, 0.0, |p| p.median_us),
        ("p95", RED, 0.25, |p| p.p95_us),
    ];
    for (name, color, offset, value) in series {
        chart
            .draw_series(data.points.iter().enumerate().map(|(i, p)| {
                let x = i as f64 + offset;
                Rectangle::new([(x - 0.12, 0.0), (x + 0.12, value(p))], color.filled())
            }))
            .map_err(draw_err)?
            .label(name)
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }
    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(draw_err)?;
    Ok(())
}
