use base64::{engine::general_purpose::STANDARD, Engine as _};
use plotters::element::Pie;
use plotters::prelude::*;
use std::io::Cursor;
use std::sync::Once;

use crate::error::AppError;

/// The bitmap backend has no system font access, so captions and labels are
/// drawn with an embedded face registered once per process.
static SANS_SERIF_TTF: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");
static FONT_INIT: Once = Once::new();

fn ensure_font() {
    FONT_INIT.call_once(|| {
        if plotters::style::register_font("sans-serif", FontStyle::Normal, SANS_SERIF_TTF).is_err()
        {
            tracing::error!("embedded chart font failed to load; text rendering will fail");
        }
    });
}

const WIDTH: u32 = 600;
const HEIGHT: u32 = 400;
const HIST_BINS: usize = 10;

const BAR_COLOR: RGBColor = RGBColor(135, 206, 235);
const LINE_COLOR: RGBColor = RGBColor(46, 139, 87);
const PIE_PALETTE: [RGBColor; 10] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
    RGBColor(188, 189, 34),
    RGBColor(23, 190, 207),
];

fn chart_err<E: std::fmt::Display>(e: E) -> AppError {
    AppError::ChartError(e.to_string())
}

/// Encode the finished RGB buffer as PNG, then base64. The drawing surface is
/// gone by the time this runs; nothing is shared between charts.
fn encode_png(raw: Vec<u8>) -> Result<String, AppError> {
    let img = image::RgbImage::from_raw(WIDTH, HEIGHT, raw)
        .ok_or_else(|| AppError::ChartError("pixel buffer size mismatch".to_string()))?;

    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), image::ImageOutputFormat::Png)
        .map_err(chart_err)?;

    Ok(STANDARD.encode(png))
}

/// 10-bin histogram of the sampled values.
pub fn histogram(name: &str, values: &[f64]) -> Result<String, AppError> {
    ensure_font();
    let (lo, mut hi) = bounds(values);
    if hi <= lo {
        hi = lo + 1.0;
    }
    let bin_width = (hi - lo) / HIST_BINS as f64;

    let mut counts = [0u32; HIST_BINS];
    for &v in values {
        let idx = (((v - lo) / bin_width) as usize).min(HIST_BINS - 1);
        counts[idx] += 1;
    }
    let y_max = counts.iter().copied().max().unwrap_or(0) + 1;

    let mut raw = vec![0u8; (WIDTH * HEIGHT * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut raw, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(format!("Histogram of {}", name), ("sans-serif", 20))
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(40)
            .build_cartesian_2d(lo..hi, 0u32..y_max)
            .map_err(chart_err)?;
        chart
            .configure_mesh()
            .x_desc(name)
            .y_desc("Frequency")
            .draw()
            .map_err(chart_err)?;

        chart
            .draw_series(counts.iter().enumerate().map(|(i, &count)| {
                let x0 = lo + i as f64 * bin_width;
                Rectangle::new([(x0, 0), (x0 + bin_width, count)], BAR_COLOR.filled())
            }))
            .map_err(chart_err)?;

        root.present().map_err(chart_err)?;
    }
    encode_png(raw)
}

/// Line plot of the sampled values against their positional index, with
/// point markers.
pub fn line_plot(name: &str, values: &[f64]) -> Result<String, AppError> {
    ensure_font();
    let (lo, mut hi) = bounds(values);
    if hi <= lo {
        hi = lo + 1.0;
    }
    let x_max = values.len().saturating_sub(1).max(1) as f64;

    let mut raw = vec![0u8; (WIDTH * HEIGHT * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut raw, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(format!("Line Plot of {}", name), ("sans-serif", 20))
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(40)
            .build_cartesian_2d(0f64..x_max, lo..hi)
            .map_err(chart_err)?;
        chart
            .configure_mesh()
            .x_desc("Index")
            .y_desc(name)
            .draw()
            .map_err(chart_err)?;

        let points: Vec<(f64, f64)> = values
            .iter()
            .enumerate()
            .map(|(i, &v)| (i as f64, v))
            .collect();
        chart
            .draw_series(LineSeries::new(points, &LINE_COLOR).point_size(3))
            .map_err(chart_err)?;

        root.present().map_err(chart_err)?;
    }
    encode_png(raw)
}

/// Pie chart of value frequencies (largest slice first), with percentage
/// labels.
pub fn pie_chart(name: &str, counts: &[(f64, usize)]) -> Result<String, AppError> {
    ensure_font();
    let sizes: Vec<f64> = counts.iter().map(|&(_, c)| c as f64).collect();
    let labels: Vec<String> = counts.iter().map(|&(v, _)| format_slice_label(v)).collect();
    let colors: Vec<RGBColor> = (0..counts.len())
        .map(|i| PIE_PALETTE[i % PIE_PALETTE.len()])
        .collect();

    let mut raw = vec![0u8; (WIDTH * HEIGHT * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut raw, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;
        let titled = root
            .titled(&format!("Pie Chart of {}", name), ("sans-serif", 20))
            .map_err(chart_err)?;

        let center = ((WIDTH / 2) as i32, (HEIGHT / 2) as i32);
        let radius = f64::from(WIDTH.min(HEIGHT)) * 0.35;
        let mut pie = Pie::new(&center, &radius, &sizes, &colors, &labels);
        pie.start_angle(90.0);
        pie.label_style(("sans-serif", 16).into_font().color(&BLACK));
        pie.percentages(("sans-serif", 14).into_font().color(&BLACK));
        titled.draw(&pie).map_err(chart_err)?;

        root.present().map_err(chart_err)?;
    }
    encode_png(raw)
}

fn bounds(values: &[f64]) -> (f64, f64) {
    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (lo, hi)
}

fn format_slice_label(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
