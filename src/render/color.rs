use palette::{LinSrgb, Mix, Srgb};
use plotters::style::RGBColor;

// ---------------------------------------------------------------------------
// Colormap – evenly spaced anchors, interpolated in linear light
// ---------------------------------------------------------------------------

/// Ten evenly spaced samples of matplotlib's viridis.
const VIRIDIS: [(u8, u8, u8); 10] = [
    (0x44, 0x01, 0x54),
    (0x48, 0x28, 0x78),
    (0x3e, 0x49, 0x89),
    (0x31, 0x68, 0x8e),
    (0x26, 0x82, 0x8e),
    (0x1f, 0x9e, 0x89),
    (0x35, 0xb7, 0x79),
    (0x6e, 0xce, 0x58),
    (0xb5, 0xde, 0x2b),
    (0xfd, 0xe7, 0x25),
];

#[derive(Debug, Clone)]
pub struct Colormap {
    stops: Vec<LinSrgb>,
}

impl Colormap {
    pub fn viridis() -> Self {
        let stops = VIRIDIS
            .iter()
            .map(|&(r, g, b)| Srgb::new(r, g, b).into_format::<f32>().into_linear())
            .collect();
        Colormap { stops }
    }

    /// Colour at position `t` in `[0, 1]`; out-of-range positions are clamped.
    pub fn sample(&self, t: f64) -> RGBColor {
        let last = self.stops.len() - 1;
        let scaled = t.clamp(0.0, 1.0) * last as f64;
        let i = (scaled.floor() as usize).min(last.saturating_sub(1));
        let frac = (scaled - i as f64) as f32;

        let lin = match self.stops.get(i + 1) {
            Some(next) => self.stops[i].mix(*next, frac),
            None => self.stops[i],
        };
        let rgb = Srgb::<f32>::from_linear(lin).into_format::<u8>();
        RGBColor(rgb.red, rgb.green, rgb.blue)
    }
}

// ---------------------------------------------------------------------------
// Logarithmic normalisation
// ---------------------------------------------------------------------------

/// Maps `[vmin, vmax]` onto `[0, 1]` in log10 space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogNorm {
    pub vmin: f64,
    pub vmax: f64,
}

impl LogNorm {
    pub fn new(vmin: f64, vmax: f64) -> Self {
        LogNorm { vmin, vmax }
    }

    /// `None` for values a log scale cannot show (non-positive or NaN).
    /// Values beyond the bounds saturate at 0 or 1.
    pub fn normalize(&self, value: f64) -> Option<f64> {
        if !(value > 0.0) {
            return None;
        }
        let lo = self.vmin.log10();
        let span = self.vmax.log10() - lo;
        if span <= 0.0 {
            return Some(0.0);
        }
        Some(((value.log10() - lo) / span).clamp(0.0, 1.0))
    }
}

/// A colormap paired with its normalisation.
#[derive(Debug, Clone)]
pub struct ColorScale {
    pub norm: LogNorm,
    pub cmap: Colormap,
}

impl ColorScale {
    pub fn new(norm: LogNorm) -> Self {
        ColorScale {
            norm,
            cmap: Colormap::viridis(),
        }
    }

    /// Look up the colour for a data value. Masked values return `None`.
    pub fn color_for(&self, value: f64) -> Option<RGBColor> {
        self.norm.normalize(value).map(|t| self.cmap.sample(t))
    }
}
