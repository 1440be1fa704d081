use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use log::debug;
use plotters::prelude::*;
use plotters::prelude::IntoLogRange;

use super::color::{ColorScale, LogNorm};
use super::{AltitudeRange, ChannelStyle};
use crate::data::model::ChannelRecord;

// 10 x 5 inches at 100 dpi.
const WIDTH: u32 = 1000;
const HEIGHT: u32 = 500;
const COLORBAR_WIDTH: u32 = 110;
const COLORBAR_STEPS: usize = 256;

// ---------------------------------------------------------------------------
// Grid extracted from one channel record
// ---------------------------------------------------------------------------

/// Time × altitude grid ready for drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    /// Profile timestamps, seconds since the epoch.
    pub time: Vec<f64>,
    /// Range-bin altitudes in metres.
    pub altitude: Vec<f64>,
    /// One row per profile, one column per range bin.
    pub values: Vec<Vec<f64>>,
}

impl Grid {
    pub fn from_record(record: &ChannelRecord) -> Result<Self> {
        let time = record.time().context("DP.time missing or not numeric")?;
        let altitude = record
            .lidar_range()
            .context("lidar_range missing or not numeric")?;
        let values = record.data().context("DP.data missing or not a numeric matrix")?;

        if time.is_empty() {
            bail!("no profiles to plot");
        }
        if let Some(i) = time.iter().position(|t| !t.is_finite()) {
            bail!("DP.time[{i}] is not a finite timestamp");
        }
        if values.len() != time.len() {
            bail!("DP.data has {} profiles but DP.time has {}", values.len(), time.len());
        }
        if let Some((i, row)) = values.iter().enumerate().find(|(_, r)| r.len() != altitude.len()) {
            bail!(
                "profile {i} has {} range bins but lidar_range has {}",
                row.len(),
                altitude.len()
            );
        }

        Ok(Grid { time, altitude, values })
    }
}

/// Cell boundaries for cells centred on `centers`: midpoints between
/// neighbours, extended by half a step at each end.
pub fn cell_edges(centers: &[f64]) -> Vec<f64> {
    match centers {
        [] => Vec::new(),
        [only] => vec![only - 0.5, only + 0.5],
        _ => {
            let n = centers.len();
            let mut edges = Vec::with_capacity(n + 1);
            edges.push(centers[0] - (centers[1] - centers[0]) / 2.0);
            edges.extend(centers.windows(2).map(|w| (w[0] + w[1]) / 2.0));
            edges.push(centers[n - 1] + (centers[n - 1] - centers[n - 2]) / 2.0);
            edges
        }
    }
}

/// `Time (UTC YYYY-MM-DD)` from the second profile, or the first if alone.
pub fn time_axis_label(time: &[f64]) -> String {
    let reference = time.get(1).or_else(|| time.first()).copied().unwrap_or(0.0);
    let date = to_utc(reference)
        .map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "?".to_string());
    format!("Time (UTC {date})")
}

fn to_utc(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

fn clock_label(seconds: f64) -> String {
    to_utc(seconds)
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render one channel as a PNG heatmap with a logarithmic colour bar.
pub fn render_channel(
    record: &ChannelRecord,
    style: &ChannelStyle,
    range: AltitudeRange,
    path: &Path,
) -> Result<()> {
    let grid = Grid::from_record(record)?;
    let scale = ColorScale::new(LogNorm::new(style.vmin, style.vmax));
    debug!(
        "channel '{}': {} profiles x {} bins",
        style.channel,
        grid.time.len(),
        grid.altitude.len()
    );

    let mut buffer = vec![0u8; (WIDTH * HEIGHT * 3) as usize];
    draw(&mut buffer, &grid, &scale, range).context("drawing heatmap")?;

    let img = image::RgbImage::from_raw(WIDTH, HEIGHT, buffer)
        .context("pixel buffer does not match the figure size")?;
    img.save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn draw(buffer: &mut [u8], grid: &Grid, scale: &ColorScale, range: AltitudeRange) -> Result<()> {
    let root = BitMapBackend::with_buffer(buffer, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE)?;
    let (plot_area, bar_area) = root.split_horizontally((WIDTH - COLORBAR_WIDTH) as i32);

    let x_edges = cell_edges(&grid.time);
    let y_edges = cell_edges(&grid.altitude);
    let x_range = x_edges[0]..x_edges[x_edges.len() - 1];

    let mut chart = ChartBuilder::on(&plot_area)
        .margin(15)
        .set_label_area_size(LabelAreaPosition::Left, 70)
        .set_label_area_size(LabelAreaPosition::Bottom, 50)
        .build_cartesian_2d(x_range, range.lower..range.upper)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc(time_axis_label(&grid.time))
        .y_desc("Altitude (m)")
        .x_label_formatter(&|v: &f64| clock_label(*v))
        .y_label_formatter(&|v: &f64| format!("{v:.0}"))
        .draw()?;

    let (x_edges, y_edges) = (&x_edges, &y_edges);

    // Only bins that overlap the visible altitude window.
    let visible: Vec<usize> = (0..grid.altitude.len())
        .filter(|&j| y_edges[j + 1] >= range.lower && y_edges[j] <= range.upper)
        .collect();

    chart.draw_series(grid.values.iter().enumerate().flat_map(|(i, row)| {
        let (x0, x1) = (x_edges[i], x_edges[i + 1]);
        visible.iter().filter_map(move |&j| {
            let color = scale.color_for(row[j])?;
            let (y0, y1) = (y_edges[j].max(range.lower), y_edges[j + 1].min(range.upper));
            Some(Rectangle::new([(x0, y0), (x1, y1)], color.filled()))
        })
    }))?;

    draw_colorbar(&bar_area, scale)?;
    root.present()?;
    Ok(())
}

fn draw_colorbar<DB>(area: &DrawingArea<DB, plotters::coord::Shift>, scale: &ColorScale) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let LogNorm { vmin, vmax } = scale.norm;
    let mut bar = ChartBuilder::on(area)
        .margin_top(15)
        .margin_bottom(65)
        .margin_left(5)
        .set_label_area_size(LabelAreaPosition::Right, 55)
        .build_cartesian_2d(0.0..1.0, (vmin..vmax).log_scale())?;

    bar.configure_mesh()
        .disable_mesh()
        .disable_x_axis()
        .y_label_formatter(&|v: &f64| format!("{v:.0e}"))
        .draw()?;

    let ratio = (vmax / vmin).powf(1.0 / COLORBAR_STEPS as f64);
    bar.draw_series((0..COLORBAR_STEPS).map(|k| {
        let lo = vmin * ratio.powi(k as i32);
        let hi = lo * ratio;
        let t = (k as f64 + 0.5) / COLORBAR_STEPS as f64;
        Rectangle::new([(0.0, lo), (1.0, hi)], scale.cmap.sample(t).filled())
    }))?;
    Ok(())
}
