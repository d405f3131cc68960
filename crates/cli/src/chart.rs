use anyhow::{anyhow, Result};
use cbr_rates_core::domain::rates::RateHistory;
use cbr_rates_core::view::chart::{value_bounds, ChartSegment, Trend};
use chrono::{Duration, NaiveDate};
use plotters::prelude::*;
use std::path::Path;

const UP: RGBColor = RGBColor(46, 160, 67);
const DOWN: RGBColor = RGBColor(215, 58, 73);
const LINE_WIDTH: u32 = 2;

fn trend_color(trend: Trend) -> RGBColor {
    match trend {
        Trend::Up => UP,
        Trend::Down => DOWN,
    }
}

/// Days since `origin`; the x axis is laid out in whole days.
fn day_offset(origin: NaiveDate, date: NaiveDate) -> i32 {
    (date - origin).num_days() as i32
}

pub fn render_svg(
    path: &Path,
    title: &str,
    history: &RateHistory,
    segments: &[ChartSegment],
    size: (u32, u32),
) -> Result<()> {
    let (y_min, y_max) = value_bounds(history).ok_or_else(|| anyhow!("history has no points"))?;
    let origin = history.start;
    let x_max = day_offset(origin, history.end).max(1);

    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| anyhow!("failed to fill canvas: {e}"))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 22.0).into_font())
        .margin(12)
        .x_label_area_size(32)
        .y_label_area_size(72)
        .build_cartesian_2d(0..x_max, y_min..y_max)
        .map_err(|e| anyhow!("failed to build chart: {e}"))?;

    let x_fmt = |x: &i32| {
        (origin + Duration::days(i64::from(*x)))
            .format("%d.%m")
            .to_string()
    };
    let y_fmt = |y: &f64| format!("{y:.4}");
    chart
        .configure_mesh()
        .x_label_formatter(&x_fmt)
        .y_label_formatter(&y_fmt)
        .y_desc("Курс")
        .draw()
        .map_err(|e| anyhow!("failed to draw mesh: {e}"))?;

    for seg in segments {
        let style = trend_color(seg.trend).stroke_width(LINE_WIDTH);
        chart
            .draw_series(std::iter::once(PathElement::new(
                vec![
                    (day_offset(origin, seg.from.date), seg.from.value),
                    (day_offset(origin, seg.to.date), seg.to.value),
                ],
                style,
            )))
            .map_err(|e| anyhow!("failed to draw segment: {e}"))?;
    }

    if segments.is_empty() {
        // A lone point has no segment to color.
        if let Some(p) = history.first() {
            chart
                .draw_series(std::iter::once(Circle::new(
                    (day_offset(origin, p.date), p.value),
                    3,
                    UP.filled(),
                )))
                .map_err(|e| anyhow!("failed to draw point: {e}"))?;
        }
    }

    root.present()
        .map_err(|e| anyhow!("failed to write chart: {e}"))?;
    Ok(())
}
