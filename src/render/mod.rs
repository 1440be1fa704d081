//! Quick-look rendering: one time/altitude heatmap per channel.

pub mod color;
pub mod heatmap;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;

use crate::data::model::JoinedMeasurementSet;

pub use heatmap::render_channel;

// ---------------------------------------------------------------------------
// Fixed plot configuration
// ---------------------------------------------------------------------------

/// Vertical extent of a plot, in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AltitudeRange {
    pub lower: f64,
    pub upper: f64,
}

impl AltitudeRange {
    pub const fn new(lower: f64, upper: f64) -> Self {
        AltitudeRange { lower, upper }
    }

    /// Name of the output subdirectory for this range, e.g. `0-4000m`.
    pub fn dir_name(&self) -> String {
        format!("{}-{}m", self.lower, self.upper)
    }
}

/// Boundary-layer and full-troposphere views.
pub const ALTITUDE_RANGES: [AltitudeRange; 2] = [
    AltitudeRange::new(0.0, 4000.0),
    AltitudeRange::new(0.0, 15000.0),
];

/// Fixed colour limits for one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelStyle {
    pub channel: &'static str,
    pub vmin: f64,
    pub vmax: f64,
}

pub static CHANNEL_STYLES: [ChannelStyle; 3] = [
    ChannelStyle { channel: "1", vmin: 1e5, vmax: 1e7 },
    ChannelStyle { channel: "2", vmin: 1e4, vmax: 1e7 },
    ChannelStyle { channel: "11", vmin: 1e5, vmax: 1e8 },
];

// ---------------------------------------------------------------------------
// Render every configured channel
// ---------------------------------------------------------------------------

/// Write `channel<id>.png` for each configured channel into `outdir`.
pub fn render_all(
    joined: &JoinedMeasurementSet,
    outdir: &Path,
    range: AltitudeRange,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(outdir)
        .with_context(|| format!("creating output directory {}", outdir.display()))?;

    let mut written = Vec::with_capacity(CHANNEL_STYLES.len());
    for style in &CHANNEL_STYLES {
        let record = joined
            .channel(style.channel)
            .with_context(|| format!("channel '{}' not present in the input data", style.channel))?;

        let path = outdir.join(format!("channel{}.png", style.channel));
        render_channel(record, style, range, &path)
            .with_context(|| format!("rendering channel '{}'", style.channel))?;
        info!("wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}
