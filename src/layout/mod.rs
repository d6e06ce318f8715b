mod offset;
pub mod text;
pub(crate) mod types;
mod vacuum;
pub use text::{FastTextMeasure, SystemFontMeasure, TextExtent, TextMeasure};
pub use types::*;
use offset::*;
use vacuum::*;

use crate::config::Settings;
use crate::error::ConfigError;
use crate::gradient::Rgba;
use crate::ir::{AlignmentMode, BandKind, Compound, Dataset, FadeMode};
use crate::theme::Theme;

/// Points per inch.
pub const POINTS_PER_INCH: f32 = 72.0;
/// Ramp positions sampled at a bar's band edge and at its far end.
pub const GRADIENT_EDGE_SAMPLE: f32 = 0.6;
pub const GRADIENT_FAR_SAMPLE: f32 = 0.7;

const TEXT_Z: i32 = 2;
const EDGE_Z: i32 = 5;
const FADED_EDGE_Z: i32 = 4;
const FULL_FADE_Z: i32 = 3;
const CONDUCTION_FADE_Z: i32 = 1;

/// Shared inputs of the two alignment strategies.
pub(super) struct LayoutContext<'a> {
    pub dataset: &'a Dataset,
    pub settings: &'a Settings,
    pub theme: &'a Theme,
    pub measure: &'a dyn TextMeasure,
    pub name_colour: Rgba,
    pub frame: Frame,
    pub x_range: (f32, f32),
}

impl LayoutContext<'_> {
    pub fn bar_x(&self, idx: usize) -> f32 {
        bar_x(idx, self.settings.bar_width, self.settings.gap)
    }

    pub fn label(
        &self,
        role: LabelRole,
        compound: Option<usize>,
        text: String,
        (x, y): (f32, f32),
        anchor: Anchor,
        color: Rgba,
    ) -> LabelLayout {
        let size = self.settings.label_size;
        let extent = self
            .measure
            .measure_text(&text, size, &self.theme.font_family);
        LabelLayout {
            role,
            compound,
            text,
            x,
            y,
            anchor,
            size,
            color,
            z: TEXT_Z,
            extent,
        }
    }

    pub fn arrow(
        &self,
        compound: usize,
        x: f32,
        (y_start, y_end): (f32, f32),
        head_start: bool,
        head_end: bool,
    ) -> ArrowLayout {
        ArrowLayout {
            compound,
            x,
            y_start,
            y_end,
            head_start,
            head_end,
            color: self.theme.text_color,
            width: self.theme.line_width,
        }
    }
}

/// Left edge of the bar at `idx`.
pub fn bar_x(idx: usize, bar_width: f32, gap: f32) -> f32 {
    idx as f32 * (bar_width + gap)
}

/// Horizontal extent covered by `count` bars.
pub fn x_extent(count: usize, bar_width: f32, gap: f32) -> f32 {
    let n = count as f32;
    n * bar_width + (n - 1.0).max(0.0) * gap
}

pub fn compute_layout(
    dataset: &Dataset,
    settings: &Settings,
    theme: &Theme,
    measure: &dyn TextMeasure,
) -> Result<Layout, ConfigError> {
    settings.validate()?;
    let count = dataset.len();
    let (width_in, height_in) = settings.figure_size(count);
    let ctx = LayoutContext {
        dataset,
        settings,
        theme,
        measure,
        name_colour: Rgba::parse(&settings.name_colour)?,
        frame: Frame {
            width: width_in * POINTS_PER_INCH,
            height: height_in * POINTS_PER_INCH,
        },
        x_range: (0.0, x_extent(count, settings.bar_width, settings.gap)),
    };

    let layout = match dataset.mode() {
        AlignmentMode::VacuumReferenced => compute_vacuum_layout(&ctx)?,
        AlignmentMode::OffsetReferenced => compute_offset_layout(&ctx)?,
    };
    log::debug!(
        "{:?} layout: {} compounds, x {:?}, y {:?}, frame {}x{} pt",
        layout.mode,
        count,
        layout.x_range,
        layout.y_range,
        layout.frame.width,
        layout.frame.height
    );
    Ok(layout)
}

/// Valence and conduction bars of one compound, with their outlines and any
/// fade overlay. `column` spans the whole plot height at this x.
pub(super) fn push_bars(
    layout: &mut Layout,
    ctx: &LayoutContext<'_>,
    idx: usize,
    compound: &Compound,
    valence: Rect,
    conduction: Rect,
    column: Rect,
) {
    let fade = compound.fade_mode(ctx.settings.fade_cb);
    let theme = ctx.theme;
    let edge = |faded: bool| EdgeStyle {
        color: if faded {
            theme.faded_edge_color
        } else {
            theme.edge_color
        },
        width: theme.line_width,
        z: if faded { FADED_EDGE_Z } else { EDGE_Z },
    };
    let valence_faded = fade == FadeMode::Full;
    let conduction_faded = fade != FadeMode::None;

    layout.bars.push(BarLayout {
        compound: idx,
        band: BandKind::Valence,
        rect: valence,
        edge_level: compound.edges.valence_edge(),
        fill: compound.band_fill(BandKind::Valence, ctx.settings.gradients),
        fade,
        edge: edge(valence_faded),
    });
    layout.bars.push(BarLayout {
        compound: idx,
        band: BandKind::Conduction,
        rect: conduction,
        edge_level: compound.edges.conduction_edge(),
        fill: compound.band_fill(BandKind::Conduction, ctx.settings.gradients),
        fade,
        edge: edge(conduction_faded),
    });

    match fade {
        FadeMode::Full => layout.overlays.push(OverlayLayout {
            compound: idx,
            rect: column,
            color: theme.fade_overlay,
            z: FULL_FADE_Z,
        }),
        FadeMode::ConductionOnly => layout.overlays.push(OverlayLayout {
            compound: idx,
            rect: conduction,
            color: theme.fade_overlay,
            z: CONDUCTION_FADE_Z,
        }),
        FadeMode::None => {}
    }
}

pub(super) fn empty_layout(ctx: &LayoutContext<'_>, y_range: (f32, f32)) -> Layout {
    let count = ctx.dataset.len();
    Layout {
        mode: ctx.dataset.mode(),
        x_range: ctx.x_range,
        y_range,
        frame: ctx.frame,
        bars: Vec::with_capacity(count * 2),
        overlays: Vec::new(),
        arrows: Vec::with_capacity(count * 2),
        labels: Vec::with_capacity(count * 3),
        hlines: Vec::new(),
    }
}
