//! 24-hour player-count chart rendering.
//!
//! Produces a 640x400 PNG line chart of one server's sample history. The
//! series is colored three ways: red where the server was offline, yellow
//! across the peak plateau, green everywhere else. Rendering is pure and
//! deterministic: the same samples yield the same bytes, in any input
//! order.

use ab_glyph::{FontRef, PxScale};
use chrono::DateTime;
use emberwatch_db::Sample;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut, draw_text_mut};
use std::io::Cursor;
use thiserror::Error;

/// DejaVu Sans for axis labels (embedded at compile time).
const AXIS_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

pub const CHART_WIDTH: u32 = 640;
pub const CHART_HEIGHT: u32 = 400;

const MARGIN_LEFT: f32 = 48.0;
const MARGIN_TOP: f32 = 16.0;
const MARGIN_RIGHT: f32 = 16.0;
const MARGIN_BOTTOM: f32 = 40.0;

/// At most this many time labels along the x-axis.
const MAX_TIME_LABELS: usize = 12;

// Discord's blurple-era status palette, matching the embed colors.
const ONLINE_COLOR: Rgba<u8> = Rgba([0x57, 0xf2, 0x87, 0xff]);
const OFFLINE_COLOR: Rgba<u8> = Rgba([0xed, 0x42, 0x45, 0xff]);
const PEAK_COLOR: Rgba<u8> = Rgba([0xfe, 0xe7, 0x5c, 0xff]);
const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const GRID_COLOR: Rgba<u8> = Rgba([220, 220, 220, 255]);
const LABEL_COLOR: Rgba<u8> = Rgba([80, 80, 80, 255]);

/// How the y-axis ceiling is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisMode {
    /// Scale to the observed peak, rounded up to a clean gridline value.
    Auto,
    /// Pin the axis to the server's player cap.
    FixedMax(u32),
}

#[derive(Debug, Error)]
pub enum ChartError {
    /// An empty window renders nothing; callers publish without a chart.
    #[error("no samples to chart")]
    NoSamples,
    #[error("failed to load font: {0}")]
    FontLoad(String),
    #[error("failed to encode chart: {0}")]
    ImageEncode(String),
}

/// Render the sample series to a PNG.
pub fn render(samples: &[Sample], axis: AxisMode) -> Result<Vec<u8>, ChartError> {
    if samples.is_empty() {
        return Err(ChartError::NoSamples);
    }

    let font =
        FontRef::try_from_slice(AXIS_FONT).map_err(|e| ChartError::FontLoad(e.to_string()))?;

    // Stable sort: equal timestamps keep their insertion order, so the
    // output is byte-identical regardless of how callers ordered the slice.
    let mut samples: Vec<&Sample> = samples.iter().collect();
    samples.sort_by_key(|s| s.captured_at);

    let peak = samples.iter().map(|s| s.player_count).max().unwrap_or(0);
    let ceiling = match axis {
        AxisMode::Auto => axis_ceiling(peak),
        AxisMode::FixedMax(max) => max.max(MIN_CEILING),
    };

    let mut canvas = RgbaImage::from_pixel(CHART_WIDTH, CHART_HEIGHT, BACKGROUND);

    let plot_w = CHART_WIDTH as f32 - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = CHART_HEIGHT as f32 - MARGIN_TOP - MARGIN_BOTTOM;

    let first = samples[0].captured_at;
    let last = samples[samples.len() - 1].captured_at;
    let span = (last - first).max(1) as f32;

    let x_of = |captured_at: i64| MARGIN_LEFT + (captured_at - first) as f32 / span * plot_w;
    let y_of = |count: u32| {
        MARGIN_TOP + plot_h - (count.min(ceiling) as f32 / ceiling as f32) * plot_h
    };

    let scale = PxScale::from(14.0);

    // Horizontal gridlines with count labels.
    for division in 0..=GRID_DIVISIONS {
        let count = (ceiling as u64 * division as u64 / GRID_DIVISIONS as u64) as u32;
        let y = y_of(count);
        draw_line_segment_mut(
            &mut canvas,
            (MARGIN_LEFT, y),
            (CHART_WIDTH as f32 - MARGIN_RIGHT, y),
            GRID_COLOR,
        );
        draw_text_mut(
            &mut canvas,
            LABEL_COLOR,
            8,
            (y - 8.0) as i32,
            scale,
            &font,
            &count.to_string(),
        );
    }

    // Time labels, capped at MAX_TIME_LABELS across the window.
    let stride = samples.len().div_ceil(MAX_TIME_LABELS);
    for sample in samples.iter().step_by(stride) {
        let x = x_of(sample.captured_at);
        if let Some(when) = DateTime::from_timestamp(sample.captured_at, 0) {
            draw_text_mut(
                &mut canvas,
                LABEL_COLOR,
                (x - 18.0) as i32,
                (CHART_HEIGHT as f32 - MARGIN_BOTTOM + 8.0) as i32,
                scale,
                &font,
                &when.format("%H:%M").to_string(),
            );
        }
    }

    // Segments first, then markers on top.
    for pair in samples.windows(2) {
        let color = segment_color(pair[0], pair[1], peak);
        let (x0, y0) = (x_of(pair[0].captured_at), y_of(pair[0].player_count));
        let (x1, y1) = (x_of(pair[1].captured_at), y_of(pair[1].player_count));
        // Three one-pixel passes give a line thick enough to survive
        // Discord's embed downscaling.
        for offset in -1..=1 {
            let dy = offset as f32;
            draw_line_segment_mut(&mut canvas, (x0, y0 + dy), (x1, y1 + dy), color);
        }
    }

    for sample in &samples {
        draw_filled_circle_mut(
            &mut canvas,
            (
                x_of(sample.captured_at) as i32,
                y_of(sample.player_count) as i32,
            ),
            3,
            marker_color(sample, peak),
        );
    }

    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(canvas)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| ChartError::ImageEncode(e.to_string()))?;

    Ok(buf)
}

const GRID_DIVISIONS: u32 = 5;
const MIN_CEILING: u32 = 5;

/// The y-axis tops out at the observed peak, floored at five so a
/// flat-zero history still gets a readable axis.
pub fn axis_ceiling(peak: u32) -> u32 {
    peak.max(MIN_CEILING)
}

/// Color for the line between two adjacent samples, taken from the later
/// sample's state: offline wins, then a plateau held at the peak since the
/// previous sample is highlighted. A zero peak is never highlighted; an
/// empty server has no "peak".
pub fn segment_color(prev: &Sample, next: &Sample, peak: u32) -> Rgba<u8> {
    if !next.online {
        OFFLINE_COLOR
    } else if peak > 0 && prev.player_count == peak && next.player_count == peak {
        PEAK_COLOR
    } else {
        ONLINE_COLOR
    }
}

/// Color for a sample's dot. A lone peak sample gets the highlight even
/// when neither adjacent segment does.
pub fn marker_color(sample: &Sample, peak: u32) -> Rgba<u8> {
    if !sample.online {
        OFFLINE_COLOR
    } else if peak > 0 && sample.player_count == peak {
        PEAK_COLOR
    } else {
        ONLINE_COLOR
    }
}
