//! Minimal line-plot figures rendered to PNG.
//!
//! [`FigHandler`] collects lines on a single [`Axes`] and rasterizes them with the
//! `image` crate. Text is not drawn into the bitmap; axis labels, the title and the
//! legend names travel alongside the PNG as a [`FigureSummary`] so the report can
//! print them next to the image.

use crate::error::FigureError;
use image::{ImageFormat, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::path::Path;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const FRAME: Rgb<u8> = Rgb([0, 0, 0]);
const ZERO_LINE: Rgb<u8> = Rgb([200, 200, 200]);

/// Line colours, cycled in plot order.
const PALETTE: [Rgb<u8>; 6] = [
    Rgb([31, 119, 180]),
    Rgb([255, 127, 14]),
    Rgb([44, 160, 44]),
    Rgb([214, 39, 40]),
    Rgb([148, 103, 189]),
    Rgb([140, 86, 75]),
];

const MARGIN: u32 = 40;
const LEGEND_SWATCH: u32 = 12;

/// A single plotted series.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    /// Legend name.
    pub label: String,
    /// Abscissa values.
    pub x: Vec<f64>,
    /// Ordinate values.
    pub y: Vec<f64>,
}

/// Plot area holding lines and their labels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Axes {
    lines: Vec<Line>,
    xlabel: Option<String>,
    ylabel: Option<String>,
    title: Option<String>,
    legend: bool,
}

impl Axes {
    /// Adds a line.
    pub fn plot(&mut self, x: &[f64], y: &[f64], label: impl Into<String>) {
        self.lines.push(Line {
            label: label.into(),
            x: x.to_vec(),
            y: y.to_vec(),
        });
    }

    /// Shows the legend swatches.
    pub fn legend(&mut self) {
        self.legend = true;
    }

    /// Sets the x axis label.
    pub fn set_xlabel(&mut self, label: impl Into<String>) {
        self.xlabel = Some(label.into());
    }

    /// Sets the y axis label.
    pub fn set_ylabel(&mut self, label: impl Into<String>) {
        self.ylabel = Some(label.into());
    }

    /// Sets the figure title.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    /// Lines in plot order.
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// The x axis label, if set.
    pub fn xlabel(&self) -> Option<&str> {
        self.xlabel.as_deref()
    }

    /// The y axis label, if set.
    pub fn ylabel(&self) -> Option<&str> {
        self.ylabel.as_deref()
    }

    /// Data bounds over every line as `(xmin, xmax, ymin, ymax)`, padded when a
    /// range collapses to a single value.
    fn bounds(&self) -> (f64, f64, f64, f64) {
        let mut xmin = f64::INFINITY;
        let mut xmax = f64::NEG_INFINITY;
        let mut ymin = f64::INFINITY;
        let mut ymax = f64::NEG_INFINITY;
        for line in &self.lines {
            for (&x, &y) in line.x.iter().zip(&line.y) {
                xmin = xmin.min(x);
                xmax = xmax.max(x);
                ymin = ymin.min(y);
                ymax = ymax.max(y);
            }
        }
        let (xmin, xmax) = pad_range(xmin, xmax);
        let (ymin, ymax) = pad_range(ymin, ymax);
        (xmin, xmax, ymin, ymax)
    }
}

fn pad_range(min: f64, max: f64) -> (f64, f64) {
    if !min.is_finite() || !max.is_finite() {
        return (-1.0, 1.0);
    }
    if (max - min).abs() < f64::EPSILON {
        let pad = if min == 0.0 { 1.0 } else { min.abs() * 0.5 };
        return (min - pad, max + pad);
    }
    let pad = (max - min) * 0.05;
    (min - pad, max + pad)
}

/// Text that accompanies a saved figure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FigureSummary {
    /// Figure title.
    pub title: Option<String>,
    /// X axis label.
    pub xlabel: Option<String>,
    /// Y axis label.
    pub ylabel: Option<String>,
    /// Legend names in plot order.
    pub legend: Vec<String>,
}

/// Figure builder with a single set of axes.
#[derive(Debug, Clone)]
pub struct FigHandler {
    /// The plot area.
    pub ax: Axes,
    width: u32,
    height: u32,
}

impl Default for FigHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl FigHandler {
    /// 640x480 figure.
    pub fn new() -> Self {
        Self::with_size(640, 480)
    }

    /// Figure of the given pixel size; sizes below the margins are clamped.
    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            ax: Axes::default(),
            width: width.max(3 * MARGIN),
            height: height.max(3 * MARGIN),
        }
    }

    /// Pixel size as `(width, height)`.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Text to print alongside the image.
    pub fn summary(&self) -> FigureSummary {
        FigureSummary {
            title: self.ax.title.clone(),
            xlabel: self.ax.xlabel.clone(),
            ylabel: self.ax.ylabel.clone(),
            legend: if self.ax.legend {
                self.ax.lines.iter().map(|l| l.label.clone()).collect()
            } else {
                Vec::new()
            },
        }
    }

    /// Rasterizes the axes and writes a PNG, creating parent directories.
    pub fn save_fig<P: AsRef<Path>>(&self, path: P) -> Result<(), FigureError> {
        let path = path.as_ref();
        let img = self.render()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        img.save_with_format(path, ImageFormat::Png)?;
        tracing::debug!(path = %path.display(), lines = self.ax.lines.len(), "Figure saved");
        Ok(())
    }

    /// Draws the figure into an RGB buffer.
    pub fn render(&self) -> Result<RgbImage, FigureError> {
        if self.ax.lines.is_empty() {
            return Err(FigureError::Empty);
        }
        for line in &self.ax.lines {
            if line.x.len() != line.y.len() {
                return Err(FigureError::LengthMismatch(line.label.clone()));
            }
            if line.x.iter().chain(&line.y).any(|v| !v.is_finite()) {
                return Err(FigureError::NonFinite(line.label.clone()));
            }
        }

        let mut img = RgbImage::from_pixel(self.width, self.height, BACKGROUND);
        let (left, top) = (MARGIN as i64, MARGIN as i64);
        let right = i64::from(self.width - MARGIN);
        let bottom = i64::from(self.height - MARGIN);
        let (xmin, xmax, ymin, ymax) = self.ax.bounds();

        let to_px = |x: f64, y: f64| -> (i64, i64) {
            let px = left as f64 + (x - xmin) / (xmax - xmin) * (right - left) as f64;
            let py = bottom as f64 - (y - ymin) / (ymax - ymin) * (bottom - top) as f64;
            (px.round() as i64, py.round() as i64)
        };

        if xmin < 0.0 && xmax > 0.0 {
            let (zx, _) = to_px(0.0, ymin);
            draw_line(&mut img, (zx, top), (zx, bottom), ZERO_LINE, 1);
        }
        if ymin < 0.0 && ymax > 0.0 {
            let (_, zy) = to_px(xmin, 0.0);
            draw_line(&mut img, (left, zy), (right, zy), ZERO_LINE, 1);
        }

        for (index, line) in self.ax.lines.iter().enumerate() {
            let colour = PALETTE[index % PALETTE.len()];
            let points: Vec<_> = line.x.iter().zip(&line.y).map(|(&x, &y)| to_px(x, y)).collect();
            for pair in points.windows(2) {
                draw_line(&mut img, pair[0], pair[1], colour, 2);
            }
            if let [only] = points.as_slice() {
                draw_line(&mut img, *only, *only, colour, 3);
            }
        }

        draw_line(&mut img, (left, top), (right, top), FRAME, 1);
        draw_line(&mut img, (right, top), (right, bottom), FRAME, 1);
        draw_line(&mut img, (right, bottom), (left, bottom), FRAME, 1);
        draw_line(&mut img, (left, bottom), (left, top), FRAME, 1);

        if self.ax.legend {
            for index in 0..self.ax.lines.len() {
                let colour = PALETTE[index % PALETTE.len()];
                let x0 = left + 8;
                let y0 = top + 8 + index as i64 * i64::from(LEGEND_SWATCH + 4);
                for dy in 0..i64::from(LEGEND_SWATCH) {
                    draw_line(
                        &mut img,
                        (x0, y0 + dy),
                        (x0 + i64::from(LEGEND_SWATCH), y0 + dy),
                        colour,
                        1,
                    );
                }
            }
        }

        Ok(img)
    }
}

/// Bresenham line with a square pen of `thickness` pixels, clipped to the image.
fn draw_line(img: &mut RgbImage, from: (i64, i64), to: (i64, i64), colour: Rgb<u8>, thickness: i64) {
    let (mut x0, mut y0) = from;
    let (x1, y1) = to;
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let half = thickness / 2;

    loop {
        for ox in -half..=(thickness - 1 - half) {
            for oy in -half..=(thickness - 1 - half) {
                put_pixel(img, x0 + ox, y0 + oy, colour);
            }
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn put_pixel(img: &mut RgbImage, x: i64, y: i64, colour: Rgb<u8>) {
    if let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) {
        if x < img.width() && y < img.height() {
            img.put_pixel(x, y, colour);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_figure_is_rejected() {
        let fig = FigHandler::new();
        assert!(matches!(fig.render(), Err(FigureError::Empty)));
    }

    #[test]
    fn test_non_finite_values_are_rejected() {
        let mut fig = FigHandler::new();
        fig.ax.plot(&[0.0, 1.0], &[0.0, f64::NAN], "bad");
        assert!(matches!(fig.render(), Err(FigureError::NonFinite(l)) if l == "bad"));
    }

    #[test]
    fn test_render_draws_lines_in_palette_colours() {
        let mut fig = FigHandler::with_size(200, 200);
        fig.ax.plot(&[-1.0, 1.0], &[-1.0, 1.0], "rising");
        fig.ax.plot(&[-1.0, 1.0], &[1.0, -1.0], "falling");
        let img = fig.render().unwrap();

        assert_eq!(img.dimensions(), (200, 200));
        assert!(img.pixels().any(|p| *p == PALETTE[0]));
        assert!(img.pixels().any(|p| *p == PALETTE[1]));
        assert_eq!(*img.get_pixel(0, 0), BACKGROUND);
    }

    #[test]
    fn test_summary_lists_legend_only_when_enabled() {
        let mut fig = FigHandler::new();
        fig.ax.plot(&[0.0, 1.0], &[0.0, 1.0], "i0");
        fig.ax.set_xlabel("Voltage (V)");
        assert!(fig.summary().legend.is_empty());

        fig.ax.legend();
        fig.ax.set_title("IV sweep");
        let summary = fig.summary();
        assert_eq!(summary.legend, vec!["i0".to_string()]);
        assert_eq!(summary.xlabel.as_deref(), Some("Voltage (V)"));
        assert_eq!(summary.title.as_deref(), Some("IV sweep"));
        assert!(summary.ylabel.is_none());
    }

    #[test]
    fn test_save_fig_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("plot.png");
        let mut fig = FigHandler::new();
        fig.ax.plot(&[0.0, 1.0, 2.0], &[0.0, 0.0, 0.0], "flat");
        fig.save_fig(&path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }
}
