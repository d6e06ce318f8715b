use crate::error::ConfigError;
use crate::ir::BandEdges;

use super::{
    Anchor, HAlign, HLineLayout, LabelRole, Layout, LayoutContext, Rect, VAlign, empty_layout,
    push_bars,
};

/// Water reduction and oxidation potentials against vacuum, in eV.
pub const PHOTOCAT_LEVELS: [(f32, &str); 2] =
    [(-4.44, "[H$^+$/H$_2$]"), (-5.67, "[H$_2$O/O$_2$]")];

/// Gap between the plot's right edge and the redox labels, in bar units.
const REFERENCE_LABEL_OFFSET: f32 = 0.1;

/// Bars hang from the vacuum level at 0 eV down to `emin`.
pub(super) fn compute_vacuum_layout(ctx: &LayoutContext<'_>) -> Result<Layout, ConfigError> {
    let settings = ctx.settings;
    let compounds = ctx.dataset.compounds();
    let max_ip = compounds
        .iter()
        .filter_map(|c| match c.edges {
            BandEdges::Vacuum { ip, .. } => Some(ip),
            BandEdges::Offset { .. } => None,
        })
        .fold(f32::NEG_INFINITY, f32::max);
    let emin = settings.emin.unwrap_or(-max_ip - 2.0);
    if !(emin < 0.0) {
        return Err(ConfigError::InvalidRange { emin, emax: 0.0 });
    }
    if settings.emax.is_some() {
        log::debug!("emax is ignored for vacuum-referenced diagrams");
    }
    let pad = 2.0 / emin;
    let bw = settings.bar_width;
    let mut layout = empty_layout(ctx, (emin, 0.0));

    for (idx, compound) in compounds.iter().enumerate() {
        let BandEdges::Vacuum { ip, ea } = compound.edges else {
            continue;
        };
        let x = ctx.bar_x(idx);
        push_bars(
            &mut layout,
            ctx,
            idx,
            compound,
            Rect::from_corners(x, emin, x + bw, -ip),
            Rect::from_corners(x, -ea, x + bw, 0.0),
            Rect::from_corners(x, emin, x + bw, 0.0),
        );

        let arrow_x = x + bw / 6.0;
        let label_x = x + bw / 4.0;
        let text_color = ctx.theme.text_color;
        if settings.show_ea {
            layout
                .arrows
                .push(ctx.arrow(idx, arrow_x, (-ea - pad / 3.0, pad / 3.0), true, true));
            layout.arrows.push(ctx.arrow(
                idx,
                arrow_x,
                (-ip - pad / 3.0, -ea + pad / 3.0),
                true,
                false,
            ));
            layout.labels.push(ctx.label(
                LabelRole::IonisationPotential,
                Some(idx),
                format!("{ip:.1} eV"),
                (label_x, -ip - pad / 2.0),
                Anchor::new(HAlign::Left, VAlign::Bottom),
                text_color,
            ));
            layout.labels.push(ctx.label(
                LabelRole::ElectronAffinity,
                Some(idx),
                format!("{ea:.1} eV"),
                (label_x, 2.0 * pad),
                Anchor::new(HAlign::Left, VAlign::Top),
                text_color,
            ));
        } else {
            layout
                .arrows
                .push(ctx.arrow(idx, arrow_x, (-ip - pad / 3.0, pad / 3.0), true, true));
            layout.labels.push(ctx.label(
                LabelRole::IonisationPotential,
                Some(idx),
                format!("{ip:.1} eV"),
                (label_x, 2.0 * pad),
                Anchor::new(HAlign::Left, VAlign::Top),
                text_color,
            ));
        }

        layout.labels.push(ctx.label(
            LabelRole::Name,
            Some(idx),
            compound.name.clone(),
            (x + bw / 2.0, -ip + pad),
            Anchor::new(HAlign::Center, VAlign::Top),
            ctx.name_colour,
        ));
    }

    if settings.photocat_hlines {
        let end = ctx.x_range.1;
        for (level, text) in PHOTOCAT_LEVELS {
            layout.hlines.push(HLineLayout {
                y: level,
                x0: 0.0,
                x1: end,
                color: ctx.theme.reference_line_color,
                width: ctx.theme.line_width,
                dotted: true,
                z: 0,
            });
            layout.labels.push(ctx.label(
                LabelRole::Reference,
                None,
                text.to_string(),
                (end + REFERENCE_LABEL_OFFSET, level),
                Anchor::new(HAlign::Left, VAlign::Center),
                ctx.theme.text_color,
            ));
        }
    }

    Ok(layout)
}
