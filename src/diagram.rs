//! Puts a layout on a page: bars and labels from the layout engine, then
//! the axis chrome (title, axis labels, spines and ticks).

use crate::config::Settings;
use crate::error::ConfigError;
use crate::ir::{AlignmentMode, Dataset};
use crate::layout::{
    Anchor, HAlign, Layout, SystemFontMeasure, TextMeasure, VAlign, compute_layout,
};
use crate::render::{BBox, Stroke, Surface, SvgSurface, TextSpec, Transform, render_layout};
use crate::theme::Theme;

/// Padding around the tight bounding box, in points (0.1 in).
pub const TIGHT_PAD: f32 = 7.2;
/// Gap between the axes and the title.
const TITLE_PAD: f32 = 6.0;
/// Gap between the axes (or tick labels) and an axis label.
const LABEL_PAD: f32 = 4.0;
/// Gap between the axis and tick labels.
const TICK_PAD: f32 = 4.0;
const CHROME_TEXT_Z: i32 = 3;
const SPINE_Z: i32 = 5;
const MAX_VACUUM_TICKS: usize = 5;

pub const TITLE_VACUUM: &str = "Vacuum Level";
pub const TITLE_OFFSET: &str = "Conduction Band";
pub const X_LABEL: &str = "Valence Band";
pub const Y_LABEL: &str = "Energy (eV)";

/// A finished diagram, ready to be written out.
#[derive(Debug, Clone)]
pub struct Figure {
    pub layout: Layout,
    pub svg: String,
    /// Page size in points.
    pub width: f32,
    pub height: f32,
}

/// Lays out `dataset` and draws it, measuring text with installed fonts.
pub fn build_figure(
    dataset: &Dataset,
    settings: &Settings,
    theme: &Theme,
) -> Result<Figure, ConfigError> {
    build_figure_with_measure(dataset, settings, theme, SystemFontMeasure)
}

pub fn build_figure_with_measure<M: TextMeasure + Copy>(
    dataset: &Dataset,
    settings: &Settings,
    theme: &Theme,
    measure: M,
) -> Result<Figure, ConfigError> {
    let theme = match settings.font.as_deref() {
        Some(font) => theme.clone().with_font(Some(font)),
        None => theme.clone(),
    };
    let layout = compute_layout(dataset, settings, &theme, &measure)?;
    let mut surface = SvgSurface::with_measure(theme.background, measure);
    let bounds = assemble(&layout, settings, &theme, &mut surface);
    let page = bounds.padded(TIGHT_PAD);
    let svg = surface.finish(page);
    log::debug!(
        "figure {:.1}x{:.1} pt ({} bars, {} labels)",
        page.width(),
        page.height(),
        layout.bars.len(),
        layout.labels.len()
    );
    Ok(Figure {
        width: page.width(),
        height: page.height(),
        layout,
        svg,
    })
}

/// Draws `layout` and its chrome onto `surface`. Returns the tight bounding
/// box of everything drawn.
pub fn assemble<S: Surface + ?Sized>(
    layout: &Layout,
    settings: &Settings,
    theme: &Theme,
    surface: &mut S,
) -> BBox {
    let transform = Transform::for_layout(layout);
    let frame = transform.frame();
    let mut bounds = frame;
    if let Some(labels) = render_layout(layout, theme, &transform, surface) {
        bounds = bounds.union(&labels);
    }

    let text = |text: &str, x: f32, y: f32, size: f32, anchor: Anchor, rotation: f32| TextSpec {
        text: text.to_string(),
        x,
        y,
        size,
        color: theme.text_color,
        anchor,
        rotation,
        font_family: theme.font_family.clone(),
    };

    let title = match layout.mode {
        AlignmentMode::VacuumReferenced => TITLE_VACUUM,
        AlignmentMode::OffsetReferenced => TITLE_OFFSET,
    };
    let title_box = surface.draw_text(
        &text(
            title,
            frame.width() / 2.0,
            -TITLE_PAD,
            settings.label_size,
            Anchor::new(HAlign::Center, VAlign::Bottom),
            0.0,
        ),
        CHROME_TEXT_Z,
    );
    bounds = bounds.union(&title_box);
    let x_label_box = surface.draw_text(
        &text(
            X_LABEL,
            frame.width() / 2.0,
            frame.height() + LABEL_PAD,
            settings.label_size,
            Anchor::new(HAlign::Center, VAlign::Top),
            0.0,
        ),
        CHROME_TEXT_Z,
    );
    bounds = bounds.union(&x_label_box);

    if !settings.show_axis {
        return bounds;
    }

    let spine = Stroke::solid(theme.edge_color, theme.line_width);
    surface.draw_rect(frame, None, Some(&spine), SPINE_Z);

    let (lo, hi) = layout.y_range;
    let (major, minor) = match layout.mode {
        AlignmentMode::VacuumReferenced => (max_n_ticks(lo, hi, MAX_VACUUM_TICKS), Vec::new()),
        AlignmentMode::OffsetReferenced => {
            let major = multiple_ticks(lo, hi, 1.0);
            let minor = multiple_ticks(lo, hi, 0.5)
                .into_iter()
                .filter(|v| !major.iter().any(|m| (m - v).abs() < 1e-6))
                .collect();
            (major, minor)
        }
    };
    let step = tick_step(&major);

    let tick = Stroke::solid(theme.edge_color, theme.line_width);
    let mut tick_label_left = 0.0f32;
    for (values, length) in [(&major, theme.tick_size), (&minor, theme.tick_size / 2.0)] {
        for value in values {
            let y = transform.y(*value);
            // inward on both sides
            surface.draw_line((0.0, y), (length, y), &tick, SPINE_Z);
            surface.draw_line(
                (frame.width(), y),
                (frame.width() - length, y),
                &tick,
                SPINE_Z,
            );
        }
    }
    for value in &major {
        let label_box = surface.draw_text(
            &text(
                &format_tick(*value, step),
                -TICK_PAD,
                transform.y(*value),
                theme.tick_label_size,
                Anchor::new(HAlign::Right, VAlign::Center),
                0.0,
            ),
            CHROME_TEXT_Z,
        );
        tick_label_left = tick_label_left.min(label_box.x0);
        bounds = bounds.union(&label_box);
    }

    let y_label_box = surface.draw_text(
        &text(
            Y_LABEL,
            tick_label_left - LABEL_PAD,
            frame.height() / 2.0,
            settings.label_size,
            Anchor::new(HAlign::Center, VAlign::Bottom),
            90.0,
        ),
        CHROME_TEXT_Z,
    );
    bounds.union(&y_label_box)
}

/// At most `max_ticks + 1` evenly spaced "nice" values (steps of 1, 2, 2.5
/// or 5 times a power of ten) inside `lo..=hi`.
pub fn max_n_ticks(lo: f32, hi: f32, max_ticks: usize) -> Vec<f32> {
    let (lo, hi) = (f64::from(lo.min(hi)), f64::from(lo.max(hi)));
    let span = hi - lo;
    if !(span > 0.0) || max_ticks == 0 {
        return vec![lo as f32];
    }
    let raw = span / max_ticks as f64;
    let scale = 10f64.powi(raw.log10().floor() as i32);
    for multiple in [1.0, 2.0, 2.5, 5.0, 10.0] {
        let step = multiple * scale;
        let start = (lo / step).floor();
        let end = (hi / step).ceil();
        if end - start <= max_ticks as f64 + 1e-6 {
            let first = (lo / step - 1e-6).ceil() as i64;
            let last = (hi / step + 1e-6).floor() as i64;
            return (first..=last)
                .map(|i| clean_zero((i as f64 * step) as f32))
                .collect();
        }
    }
    vec![lo as f32, hi as f32]
}

/// Every multiple of `step` inside `lo..=hi`.
pub fn multiple_ticks(lo: f32, hi: f32, step: f32) -> Vec<f32> {
    if !(step > 0.0) {
        return Vec::new();
    }
    let first = (lo.min(hi) / step - 1e-4).ceil() as i64;
    let last = (lo.max(hi) / step + 1e-4).floor() as i64;
    (first..=last).map(|i| clean_zero(i as f32 * step)).collect()
}

fn clean_zero(value: f32) -> f32 {
    if value.abs() < 1e-6 { 0.0 } else { value }
}

fn tick_step(ticks: &[f32]) -> f32 {
    match ticks {
        [a, b, ..] => (b - a).abs(),
        _ => 1.0,
    }
}

/// Tick text with as many decimals as the step needs and a typographic
/// minus sign.
pub fn format_tick(value: f32, step: f32) -> String {
    let decimals = (0..=3)
        .find(|d| {
            let scaled = step * 10f32.powi(*d);
            (scaled - scaled.round()).abs() < 1e-3
        })
        .unwrap_or(3) as usize;
    let text = format!("{:.*}", decimals, clean_zero(value));
    match text.strip_prefix('-') {
        Some(rest) => format!("\u{2212}{rest}"),
        None => text,
    }
}
