use crate::gradient::{BandFill, Rgba};
use crate::ir::{AlignmentMode, BandKind, FadeMode};
use serde::Serialize;

use super::text::TextExtent;

/// Axis-aligned rectangle in data coordinates (x in bar units, y in eV).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x0: f32,
    pub x1: f32,
    pub y0: f32,
    pub y1: f32,
}

impl Rect {
    /// Builds a rectangle from two corners in any order.
    pub fn from_corners(xa: f32, ya: f32, xb: f32, yb: f32) -> Self {
        Self {
            x0: xa.min(xb),
            x1: xa.max(xb),
            y0: ya.min(yb),
            y1: ya.max(yb),
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VAlign {
    Top,
    Center,
    Bottom,
    Baseline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Anchor {
    pub h: HAlign,
    pub v: VAlign,
}

impl Anchor {
    pub const fn new(h: HAlign, v: VAlign) -> Self {
        Self { h, v }
    }
}

/// Outline of a bar. Faded outlines sit one level lower so they recede
/// behind unfaded neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EdgeStyle {
    pub color: Rgba,
    pub width: f32,
    pub z: i32,
}

#[derive(Debug, Clone)]
pub struct BarLayout {
    pub compound: usize,
    pub band: BandKind,
    pub rect: Rect,
    /// Energy of the band edge; the other end of `rect` is the axis limit.
    pub edge_level: f32,
    pub fill: BandFill,
    pub fade: FadeMode,
    pub edge: EdgeStyle,
}

/// Translucent wash drawn over a faded bar.
#[derive(Debug, Clone, Serialize)]
pub struct OverlayLayout {
    pub compound: usize,
    pub rect: Rect,
    pub color: Rgba,
    pub z: i32,
}

/// Dashed vertical arrow; heads sit exactly at `y_start` and `y_end`.
#[derive(Debug, Clone, Serialize)]
pub struct ArrowLayout {
    pub compound: usize,
    pub x: f32,
    pub y_start: f32,
    pub y_end: f32,
    pub head_start: bool,
    pub head_end: bool,
    pub color: Rgba,
    pub width: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LabelRole {
    Name,
    IonisationPotential,
    ElectronAffinity,
    BandGap,
    ValenceOffset,
    ConductionOffset,
    Reference,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelLayout {
    pub role: LabelRole,
    pub compound: Option<usize>,
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub anchor: Anchor,
    pub size: f32,
    pub color: Rgba,
    pub z: i32,
    /// Measured extent in points.
    pub extent: TextExtent,
}

/// Horizontal reference line across the plot, e.g. a redox level.
#[derive(Debug, Clone, Serialize)]
pub struct HLineLayout {
    pub y: f32,
    pub x0: f32,
    pub x1: f32,
    pub color: Rgba,
    pub width: f32,
    pub dotted: bool,
    pub z: i32,
}

/// Plot area size in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Frame {
    pub width: f32,
    pub height: f32,
}

impl Frame {
    /// Points per eV on the y axis.
    pub fn y_scale(&self, y_range: (f32, f32)) -> f32 {
        let span = (y_range.1 - y_range.0).abs();
        if span > 0.0 { self.height / span } else { 1.0 }
    }

    /// Points per bar unit on the x axis.
    pub fn x_scale(&self, x_range: (f32, f32)) -> f32 {
        let span = (x_range.1 - x_range.0).abs();
        if span > 0.0 { self.width / span } else { 1.0 }
    }
}

#[derive(Debug, Clone)]
pub struct Layout {
    pub mode: AlignmentMode,
    pub x_range: (f32, f32),
    pub y_range: (f32, f32),
    pub frame: Frame,
    pub bars: Vec<BarLayout>,
    pub overlays: Vec<OverlayLayout>,
    pub arrows: Vec<ArrowLayout>,
    pub labels: Vec<LabelLayout>,
    pub hlines: Vec<HLineLayout>,
}

impl Layout {
    pub fn bar(&self, compound: usize, band: BandKind) -> Option<&BarLayout> {
        self.bars
            .iter()
            .find(|bar| bar.compound == compound && bar.band == band)
    }

    pub fn label(&self, role: LabelRole, compound: usize) -> Option<&LabelLayout> {
        self.labels
            .iter()
            .find(|label| label.role == role && label.compound == Some(compound))
    }

    pub fn labels_with_role(&self, role: LabelRole) -> impl Iterator<Item = &LabelLayout> {
        self.labels.iter().filter(move |label| label.role == role)
    }

    pub fn arrows_for(&self, compound: usize) -> impl Iterator<Item = &ArrowLayout> {
        self.arrows
            .iter()
            .filter(move |arrow| arrow.compound == compound)
    }
}
