use crate::error::ConfigError;
use crate::ir::BandEdges;

use super::{
    Anchor, HAlign, LabelLayout, LabelRole, Layout, LayoutContext, Rect, VAlign, empty_layout,
    push_bars,
};

/// Space between the name label and the offset label below it, as a
/// fraction of the name label's height.
const OFFSET_LABEL_SPACING: f32 = 0.25;

/// Bars are placed by their offsets relative to the first compound; valence
/// bars drop to `emin`, conduction bars rise to `emax`.
pub(super) fn compute_offset_layout(ctx: &LayoutContext<'_>) -> Result<Layout, ConfigError> {
    let settings = ctx.settings;
    let compounds = ctx.dataset.compounds();
    let edges: Vec<(f32, f32, f32)> = compounds
        .iter()
        .filter_map(|c| match c.edges {
            BandEdges::Offset { vbo, band_gap, cbo } => Some((vbo, band_gap, cbo)),
            BandEdges::Vacuum { .. } => None,
        })
        .collect();
    let min_vbo = edges.iter().map(|e| e.0).fold(f32::INFINITY, f32::min);
    let max_cb = edges
        .iter()
        .map(|e| e.0 + e.1)
        .fold(f32::NEG_INFINITY, f32::max);
    let emin = settings.emin.unwrap_or(min_vbo - 2.0);
    let emax = settings.emax.unwrap_or(max_cb + 2.0);
    if !(emin < emax) {
        return Err(ConfigError::InvalidRange { emin, emax });
    }
    let pad = -(emax - emin) / 20.0;
    let bw = settings.bar_width;
    let mut layout = empty_layout(ctx, (emin, emax));
    let y_scale = ctx.frame.y_scale(layout.y_range);

    let mut previous: Option<(f32, f32)> = None;
    for (idx, compound) in compounds.iter().enumerate() {
        let BandEdges::Offset { vbo, band_gap, cbo } = compound.edges else {
            continue;
        };
        let cb = vbo + band_gap;
        let x = ctx.bar_x(idx);
        push_bars(
            &mut layout,
            ctx,
            idx,
            compound,
            Rect::from_corners(x, emin, x + bw, vbo),
            Rect::from_corners(x, cb, x + bw, emax),
            Rect::from_corners(x, emin, x + bw, emax),
        );

        layout.arrows.push(ctx.arrow(
            idx,
            x + bw / 6.0,
            (vbo - pad / 3.0, cb + pad / 3.0),
            true,
            true,
        ));
        layout.labels.push(ctx.label(
            LabelRole::BandGap,
            Some(idx),
            format!("{band_gap:.2} eV"),
            (x + bw / 4.0, vbo + band_gap / 2.0),
            Anchor::new(HAlign::Left, VAlign::Center),
            ctx.theme.text_color,
        ));

        // Measure pass: the name's extent decides where the VBO label goes.
        let name = ctx.label(
            LabelRole::Name,
            Some(idx),
            compound.name.clone(),
            (x + bw / 2.0, vbo + pad / 2.0),
            Anchor::new(HAlign::Center, VAlign::Top),
            ctx.name_colour,
        );
        let below_name = label_below(&name, y_scale);
        layout.labels.push(name);

        if let Some((prev_vbo, prev_cbo)) = previous {
            if !settings.hide_vbo {
                layout.labels.push(ctx.label(
                    LabelRole::ValenceOffset,
                    Some(idx),
                    format_offset(vbo - prev_vbo),
                    (x + bw / 2.0, below_name),
                    Anchor::new(HAlign::Center, VAlign::Top),
                    ctx.name_colour,
                ));
            }
            if !settings.hide_cbo {
                layout.labels.push(ctx.label(
                    LabelRole::ConductionOffset,
                    Some(idx),
                    format_offset(cbo - prev_cbo),
                    (x + bw / 2.0, cb - pad / 4.0),
                    Anchor::new(HAlign::Center, VAlign::Bottom),
                    ctx.name_colour,
                ));
            }
        }
        previous = Some((vbo, cbo));
    }

    Ok(layout)
}

/// Top of a label placed directly under a top-anchored `label`, in data
/// units.
fn label_below(label: &LabelLayout, y_scale: f32) -> f32 {
    let height = label.extent.height / y_scale;
    label.y - height - OFFSET_LABEL_SPACING * height
}

/// Signed offset with two decimals, e.g. `+1.50 eV`.
pub fn format_offset(value: f32) -> String {
    // avoid printing -0.00 for offsets that round to zero
    let value = if (value * 100.0).round() == 0.0 {
        0.0
    } else {
        value
    };
    format!("{value:+.2} eV")
}
