use crate::gradient::{BandFill, Gradient, Rgba};
use crate::layout::{
    Anchor, FastTextMeasure, GRADIENT_EDGE_SAMPLE, GRADIENT_FAR_SAMPLE, HAlign, Layout, Rect,
    SystemFontMeasure, VAlign,
};
use crate::layout::text::{SCRIPT_SCALE, SUB_SHIFT, SUPER_SHIFT, Script, parse_markup};
use crate::theme::Theme;
use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

pub use crate::layout::{TextExtent, TextMeasure};

/// matplotlib's `(8, 4.3)` dash pattern at unit line width.
pub const ARROW_DASHES: (f32, f32) = (8.0, 4.3);
/// Arrowhead size in data units.
pub const ARROW_HEAD_LENGTH: f32 = 0.25;
pub const ARROW_HEAD_WIDTH: f32 = 0.2;
const ARROW_OVERHANG: f32 = 0.15;
/// Intermediate stops used to approximate the bicubic stretch of a gradient.
const GRADIENT_STOPS: usize = 8;

/// Rectangle in page points, y growing downwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    pub fn padded(&self, pad: f32) -> BBox {
        BBox {
            x0: self.x0 - pad,
            y0: self.y0 - pad,
            x1: self.x1 + pad,
            y1: self.y1 + pad,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Stroke {
    pub color: Rgba,
    pub width: f32,
    pub dash: Option<(f32, f32)>,
}

impl Stroke {
    pub fn solid(color: Rgba, width: f32) -> Self {
        Self {
            color,
            width,
            dash: None,
        }
    }

    pub fn dotted(color: Rgba, width: f32) -> Self {
        Self {
            color,
            width,
            dash: Some((width, 1.65 * width)),
        }
    }
}

/// Vertical ramp fill: ramp positions at the rectangle's top and bottom.
#[derive(Debug, Clone)]
pub struct GradientFill {
    pub gradient: Arc<Gradient>,
    pub top: f32,
    pub bottom: f32,
}

impl GradientFill {
    /// Ramp position at `u` in `0..=1` from top to bottom. Two pixels
    /// stretched bicubically: flat outside the pixel centres, smooth between.
    pub fn value_at(&self, u: f32) -> f32 {
        let t = ((u.clamp(0.0, 1.0) - 0.25) / 0.5).clamp(0.0, 1.0);
        let s = 0.5 * t + 1.5 * t * t - t * t * t;
        self.top + (self.bottom - self.top) * s
    }
}

/// Dashed vertical arrow in page points. Heads point outwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArrowSpec {
    pub x: f32,
    pub y_start: f32,
    pub y_end: f32,
    pub head_start: bool,
    pub head_end: bool,
    pub head_length: f32,
    pub head_width: f32,
    pub color: Rgba,
    pub width: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextSpec {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub color: Rgba,
    pub anchor: Anchor,
    /// Counter-clockwise rotation in degrees; only 0 and 90 are used.
    pub rotation: f32,
    pub font_family: String,
}

/// A 2-D drawing target. Everything is in page points; drawing order is by
/// `z`, then by submission order.
pub trait Surface: TextMeasure {
    fn draw_rect(&mut self, rect: BBox, fill: Option<Rgba>, edge: Option<&Stroke>, z: i32);
    fn draw_gradient_rect(&mut self, rect: BBox, fill: &GradientFill, z: i32);
    fn draw_line(&mut self, from: (f32, f32), to: (f32, f32), stroke: &Stroke, z: i32);
    fn draw_dashed_arrow(&mut self, arrow: &ArrowSpec, z: i32);
    /// Draws `text` and returns the box it covers.
    fn draw_text(&mut self, text: &TextSpec, z: i32) -> BBox;
}

/// Maps data coordinates onto the plot frame, which sits at the page origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub x_range: (f32, f32),
    pub y_range: (f32, f32),
    pub width: f32,
    pub height: f32,
}

impl Transform {
    pub fn for_layout(layout: &Layout) -> Self {
        Self {
            x_range: layout.x_range,
            y_range: layout.y_range,
            width: layout.frame.width,
            height: layout.frame.height,
        }
    }

    pub fn x_scale(&self) -> f32 {
        let span = self.x_range.1 - self.x_range.0;
        if span.abs() > f32::EPSILON { self.width / span } else { 1.0 }
    }

    pub fn y_scale(&self) -> f32 {
        let span = self.y_range.1 - self.y_range.0;
        if span.abs() > f32::EPSILON { self.height / span } else { 1.0 }
    }

    pub fn x(&self, x: f32) -> f32 {
        (x - self.x_range.0) * self.x_scale()
    }

    pub fn y(&self, y: f32) -> f32 {
        (self.y_range.1 - y) * self.y_scale()
    }

    pub fn rect(&self, rect: &Rect) -> BBox {
        BBox::new(self.x(rect.x0), self.y(rect.y1), self.x(rect.x1), self.y(rect.y0))
    }

    pub fn frame(&self) -> BBox {
        BBox::new(0.0, 0.0, self.width, self.height)
    }
}

/// Draws bars, overlays, arrows, reference lines and labels of `layout`.
/// Returns the union of the label boxes.
pub fn render_layout<S: Surface + ?Sized>(
    layout: &Layout,
    theme: &Theme,
    transform: &Transform,
    surface: &mut S,
) -> Option<BBox> {
    for bar in &layout.bars {
        let rect = transform.rect(&bar.rect);
        match &bar.fill {
            BandFill::Gradient(gradient) => {
                // Row 0 of the two-pixel image sits at the band edge.
                let edge_on_top = (bar.edge_level - bar.rect.y1).abs()
                    <= (bar.edge_level - bar.rect.y0).abs();
                let (top, bottom) = if edge_on_top {
                    (GRADIENT_EDGE_SAMPLE, GRADIENT_FAR_SAMPLE)
                } else {
                    (GRADIENT_FAR_SAMPLE, GRADIENT_EDGE_SAMPLE)
                };
                let fill = GradientFill {
                    gradient: gradient.clone(),
                    top,
                    bottom,
                };
                surface.draw_gradient_rect(rect, &fill, 0);
            }
            BandFill::Solid(color) => surface.draw_rect(rect, Some(*color), None, 0),
        }
        let edge = Stroke::solid(bar.edge.color, bar.edge.width);
        surface.draw_rect(rect, None, Some(&edge), bar.edge.z);
    }

    for overlay in &layout.overlays {
        surface.draw_rect(
            transform.rect(&overlay.rect),
            Some(overlay.color),
            None,
            overlay.z,
        );
    }

    for line in &layout.hlines {
        let stroke = if line.dotted {
            Stroke::dotted(line.color, line.width)
        } else {
            Stroke::solid(line.color, line.width)
        };
        let y = transform.y(line.y);
        surface.draw_line(
            (transform.x(line.x0), y),
            (transform.x(line.x1), y),
            &stroke,
            line.z,
        );
    }

    for arrow in &layout.arrows {
        surface.draw_dashed_arrow(
            &ArrowSpec {
                x: transform.x(arrow.x),
                y_start: transform.y(arrow.y_start),
                y_end: transform.y(arrow.y_end),
                head_start: arrow.head_start,
                head_end: arrow.head_end,
                head_length: ARROW_HEAD_LENGTH * transform.y_scale(),
                head_width: ARROW_HEAD_WIDTH * transform.x_scale(),
                color: arrow.color,
                width: arrow.width,
            },
            2,
        );
    }

    let mut bounds: Option<BBox> = None;
    for label in &layout.labels {
        let bbox = surface.draw_text(
            &TextSpec {
                text: label.text.clone(),
                x: transform.x(label.x),
                y: transform.y(label.y),
                size: label.size,
                color: label.color,
                anchor: label.anchor,
                rotation: 0.0,
                font_family: theme.font_family.clone(),
            },
            label.z,
        );
        bounds = Some(bounds.map_or(bbox, |b| b.union(&bbox)));
    }
    bounds
}

/// Box covered by a label of `extent` drawn at the anchor point of `spec`.
pub fn text_bbox(spec: &TextSpec, extent: TextExtent) -> BBox {
    let (along, across) = (extent.width, extent.height);
    let x0 = match spec.anchor.h {
        HAlign::Left => 0.0,
        HAlign::Center => -along / 2.0,
        HAlign::Right => -along,
    };
    let top = match spec.anchor.v {
        VAlign::Top => 0.0,
        VAlign::Center => -across / 2.0,
        VAlign::Bottom => -across,
        VAlign::Baseline => -extent.ascent(),
    };
    if spec.rotation.abs() > 45.0 {
        // rotated a quarter turn counter-clockwise: width runs up the page
        BBox::new(
            spec.x + top,
            spec.y - x0,
            spec.x + top + across,
            spec.y - x0 - along,
        )
    } else {
        BBox::new(spec.x + x0, spec.y + top, spec.x + x0 + along, spec.y + top + across)
    }
}

/// Baseline offset from the anchor point along the text's vertical axis.
fn baseline_offset(anchor: Anchor, extent: TextExtent) -> f32 {
    match anchor.v {
        VAlign::Top => extent.ascent(),
        VAlign::Center => extent.ascent() - extent.height / 2.0,
        VAlign::Bottom => -extent.descent,
        VAlign::Baseline => 0.0,
    }
}

struct Element {
    z: i32,
    seq: usize,
    markup: String,
}

/// Builds an SVG document from draw calls.
pub struct SvgSurface<M: TextMeasure = SystemFontMeasure> {
    measure: M,
    background: Rgba,
    elements: Vec<Element>,
    defs: Vec<String>,
}

impl SvgSurface<SystemFontMeasure> {
    pub fn new(background: Rgba) -> Self {
        Self::with_measure(background, SystemFontMeasure)
    }
}

impl<M: TextMeasure> SvgSurface<M> {
    pub fn with_measure(background: Rgba, measure: M) -> Self {
        Self {
            measure,
            background,
            elements: Vec::new(),
            defs: Vec::new(),
        }
    }

    fn push(&mut self, z: i32, markup: String) {
        let seq = self.elements.len();
        self.elements.push(Element { z, seq, markup });
    }

    /// Serialises everything drawn so far with `view` as the page.
    pub fn finish(mut self, view: BBox) -> String {
        self.elements.sort_by_key(|element| (element.z, element.seq));
        let width = view.width();
        let height = view.height();
        let mut svg = String::new();
        svg.push_str(&format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.2}pt\" height=\"{height:.2}pt\" viewBox=\"{:.2} {:.2} {width:.2} {height:.2}\">",
            view.x0, view.y0
        ));
        if !self.defs.is_empty() {
            svg.push_str("<defs>");
            for def in &self.defs {
                svg.push_str(def);
            }
            svg.push_str("</defs>");
        }
        svg.push_str(&format!(
            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{width:.2}\" height=\"{height:.2}\" fill=\"{}\"/>",
            view.x0, view.y0, self.background
        ));
        for element in &self.elements {
            svg.push_str(&element.markup);
        }
        svg.push_str("</svg>");
        svg
    }
}

impl<M: TextMeasure> TextMeasure for SvgSurface<M> {
    fn measure_text(&self, text: &str, size: f32, font_family: &str) -> TextExtent {
        self.measure.measure_text(text, size, font_family)
    }
}

impl<M: TextMeasure> Surface for SvgSurface<M> {
    fn draw_rect(&mut self, rect: BBox, fill: Option<Rgba>, edge: Option<&Stroke>, z: i32) {
        let fill_attr = match fill {
            Some(color) => paint_attr("fill", color),
            None => "fill=\"none\"".to_string(),
        };
        let stroke_attr = edge.map(stroke_attrs).unwrap_or_default();
        self.push(
            z,
            format!(
                "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" {fill_attr}{stroke_attr}/>",
                rect.x0,
                rect.y0,
                rect.width(),
                rect.height()
            ),
        );
    }

    fn draw_gradient_rect(&mut self, rect: BBox, fill: &GradientFill, z: i32) {
        let id = format!("ramp{}", self.defs.len());
        let mut def = format!(
            "<linearGradient id=\"{id}\" x1=\"0\" y1=\"0\" x2=\"0\" y2=\"1\">"
        );
        let mut offsets = vec![0.0f32];
        offsets.extend((0..=GRADIENT_STOPS).map(|i| 0.25 + 0.5 * i as f32 / GRADIENT_STOPS as f32));
        offsets.push(1.0);
        for offset in offsets {
            let color = fill.gradient.sample(fill.value_at(offset));
            def.push_str(&format!(
                "<stop offset=\"{offset:.4}\" stop-color=\"{color}\"/>"
            ));
        }
        def.push_str("</linearGradient>");
        self.defs.push(def);
        self.push(
            z,
            format!(
                "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"url(#{id})\"/>",
                rect.x0,
                rect.y0,
                rect.width(),
                rect.height()
            ),
        );
    }

    fn draw_line(&mut self, from: (f32, f32), to: (f32, f32), stroke: &Stroke, z: i32) {
        self.push(
            z,
            format!(
                "<line x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\" fill=\"none\"{}/>",
                from.0,
                from.1,
                to.0,
                to.1,
                stroke_attrs(stroke)
            ),
        );
    }

    fn draw_dashed_arrow(&mut self, arrow: &ArrowSpec, z: i32) {
        let dash = (ARROW_DASHES.0 * arrow.width, ARROW_DASHES.1 * arrow.width);
        let shaft = Stroke {
            color: arrow.color,
            width: arrow.width,
            dash: Some(dash),
        };
        let mut markup = format!(
            "<line x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\" fill=\"none\"{}/>",
            arrow.x,
            arrow.y_start,
            arrow.x,
            arrow.y_end,
            stroke_attrs(&shaft)
        );
        let outline = Stroke::solid(arrow.color, arrow.width);
        for (tip, from) in [
            (arrow.head_start.then_some(arrow.y_start), arrow.y_end),
            (arrow.head_end.then_some(arrow.y_end), arrow.y_start),
        ] {
            let Some(tip) = tip else {
                continue;
            };
            let points = arrowhead_points(arrow.x, tip, from, arrow.head_length, arrow.head_width);
            let path: Vec<String> = points
                .iter()
                .map(|(x, y)| format!("{x:.2},{y:.2}"))
                .collect();
            markup.push_str(&format!(
                "<polygon points=\"{}\" {}{}/>",
                path.join(" "),
                paint_attr("fill", arrow.color),
                stroke_attrs(&outline)
            ));
        }
        self.push(z, markup);
    }

    fn draw_text(&mut self, spec: &TextSpec, z: i32) -> BBox {
        let extent = self
            .measure
            .measure_text(&spec.text, spec.size, &spec.font_family);
        let bbox = text_bbox(spec, extent);
        let text_anchor = match spec.anchor.h {
            HAlign::Left => "start",
            HAlign::Center => "middle",
            HAlign::Right => "end",
        };
        let x = spec.x;
        let y = spec.y + baseline_offset(spec.anchor, extent);
        // laid out horizontally around the anchor, then turned about it
        let transform = if spec.rotation.abs() > f32::EPSILON {
            format!(
                " transform=\"rotate({:.2} {:.2} {:.2})\"",
                -spec.rotation, spec.x, spec.y
            )
        } else {
            String::new()
        };
        let mut markup = format!(
            "<text x=\"{x:.2}\" y=\"{y:.2}\" font-family=\"{}\" font-size=\"{:.2}\" text-anchor=\"{text_anchor}\" {}{transform}>",
            escape_xml(&spec.font_family),
            spec.size,
            paint_attr("fill", spec.color),
        );
        markup.push_str(&runs_markup(&spec.text, spec.size));
        markup.push_str("</text>");
        self.push(z, markup);
        bbox
    }
}

/// Sub/superscript runs as `tspan`s shifted with `dy`.
fn runs_markup(text: &str, size: f32) -> String {
    let mut out = String::new();
    let mut shift = 0.0f32;
    for run in parse_markup(text) {
        let (target, run_size) = match run.script {
            Script::Normal => (0.0, size),
            Script::Super => (-SUPER_SHIFT * size, size * SCRIPT_SCALE),
            Script::Sub => (SUB_SHIFT * size, size * SCRIPT_SCALE),
        };
        let dy = target - shift;
        shift = target;
        if run.script == Script::Normal && dy.abs() < f32::EPSILON {
            out.push_str(&escape_xml(&run.text));
        } else {
            out.push_str(&format!(
                "<tspan dy=\"{dy:.2}\" font-size=\"{run_size:.2}\">{}</tspan>",
                escape_xml(&run.text)
            ));
        }
    }
    out
}

/// Notched arrowhead with its tip at `tip`, pointing away from `from`.
fn arrowhead_points(x: f32, tip: f32, from: f32, length: f32, width: f32) -> [(f32, f32); 4] {
    let dir = if from >= tip { 1.0 } else { -1.0 };
    let base = tip + dir * length;
    let notch = tip + dir * length * (1.0 - ARROW_OVERHANG);
    [
        (x, tip),
        (x - width / 2.0, base),
        (x, notch),
        (x + width / 2.0, base),
    ]
}

fn paint_attr(name: &str, color: Rgba) -> String {
    if color.a == 255 {
        format!("{name}=\"{color}\"")
    } else {
        format!("{name}=\"{color}\" {name}-opacity=\"{:.3}\"", color.opacity())
    }
}

fn stroke_attrs(stroke: &Stroke) -> String {
    let mut attrs = format!(
        " {} stroke-width=\"{:.2}\"",
        paint_attr("stroke", stroke.color),
        stroke.width
    );
    if let Some((on, off)) = stroke.dash {
        attrs.push_str(&format!(" stroke-dasharray=\"{on:.2} {off:.2}\""));
    }
    attrs
}

/// One recorded draw call.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawOp {
    Rect {
        rect: BBox,
        fill: Option<Rgba>,
        edge: Option<Stroke>,
        z: i32,
    },
    GradientRect {
        rect: BBox,
        gradient: String,
        top: Rgba,
        bottom: Rgba,
        z: i32,
    },
    Line {
        from: (f32, f32),
        to: (f32, f32),
        stroke: Stroke,
        z: i32,
    },
    DashedArrow {
        arrow: ArrowSpec,
        z: i32,
    },
    Text {
        text: TextSpec,
        bbox: BBox,
        z: i32,
    },
}

impl DrawOp {
    pub fn z(&self) -> i32 {
        match self {
            DrawOp::Rect { z, .. }
            | DrawOp::GradientRect { z, .. }
            | DrawOp::Line { z, .. }
            | DrawOp::DashedArrow { z, .. }
            | DrawOp::Text { z, .. } => *z,
        }
    }
}

/// Keeps draw calls instead of drawing them.
#[derive(Debug, Default)]
pub struct RecordingSurface<M: TextMeasure = FastTextMeasure> {
    measure: M,
    ops: Vec<DrawOp>,
}

impl RecordingSurface<FastTextMeasure> {
    pub fn new() -> Self {
        Self::with_measure(FastTextMeasure)
    }
}

impl<M: TextMeasure> RecordingSurface<M> {
    pub fn with_measure(measure: M) -> Self {
        Self {
            measure,
            ops: Vec::new(),
        }
    }

    /// Calls in submission order.
    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// Calls in paint order.
    pub fn ops_in_paint_order(&self) -> Vec<&DrawOp> {
        let mut ops: Vec<&DrawOp> = self.ops.iter().collect();
        ops.sort_by_key(|op| op.z());
        ops
    }

    pub fn into_ops(self) -> Vec<DrawOp> {
        self.ops
    }
}

impl<M: TextMeasure> TextMeasure for RecordingSurface<M> {
    fn measure_text(&self, text: &str, size: f32, font_family: &str) -> TextExtent {
        self.measure.measure_text(text, size, font_family)
    }
}

impl<M: TextMeasure> Surface for RecordingSurface<M> {
    fn draw_rect(&mut self, rect: BBox, fill: Option<Rgba>, edge: Option<&Stroke>, z: i32) {
        self.ops.push(DrawOp::Rect {
            rect,
            fill,
            edge: edge.copied(),
            z,
        });
    }

    fn draw_gradient_rect(&mut self, rect: BBox, fill: &GradientFill, z: i32) {
        self.ops.push(DrawOp::GradientRect {
            rect,
            gradient: fill.gradient.id().to_string(),
            top: fill.gradient.sample(fill.top),
            bottom: fill.gradient.sample(fill.bottom),
            z,
        });
    }

    fn draw_line(&mut self, from: (f32, f32), to: (f32, f32), stroke: &Stroke, z: i32) {
        self.ops.push(DrawOp::Line {
            from,
            to,
            stroke: *stroke,
            z,
        });
    }

    fn draw_dashed_arrow(&mut self, arrow: &ArrowSpec, z: i32) {
        self.ops.push(DrawOp::DashedArrow { arrow: *arrow, z });
    }

    fn draw_text(&mut self, text: &TextSpec, z: i32) -> BBox {
        let extent = self
            .measure
            .measure_text(&text.text, text.size, &text.font_family);
        let bbox = text_bbox(text, extent);
        self.ops.push(DrawOp::Text {
            text: text.clone(),
            bbox,
            z,
        });
        bbox
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutputFormat {
    Svg,
    Png,
    Pdf,
}

impl OutputFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "svg" => Some(Self::Svg),
            "png" => Some(Self::Png),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

pub fn write_output(svg: &str, output: &Path, format: OutputFormat, dpi: f32) -> Result<()> {
    match format {
        OutputFormat::Svg => write_output_svg(svg, Some(output)),
        OutputFormat::Png => write_output_png(svg, output, dpi),
        OutputFormat::Pdf => write_output_pdf(svg, output),
    }
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

/// Rasterises at `dpi`; the SVG is sized in points, so the zoom is dpi / 72.
#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, dpi: f32) -> Result<()> {
    let mut opt = usvg::Options::default();
    // one user unit per point
    opt.dpi = 72.0;
    opt.fontdb_mut().load_system_fonts();

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let zoom = dpi / 72.0;
    let size = tree.size();
    let width = (size.width() * zoom).ceil().max(1.0) as u32;
    let height = (size.height() * zoom).ceil().max(1.0) as u32;
    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate {width}x{height} pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(
        &tree,
        resvg::tiny_skia::Transform::from_scale(zoom, zoom),
        &mut pixmap_mut,
    );
    pixmap.save_png(output)?;
    Ok(())
}

#[cfg(not(feature = "png"))]
pub fn write_output_png(_svg: &str, _output: &Path, _dpi: f32) -> Result<()> {
    Err(anyhow::anyhow!(
        "PNG export not enabled (compile with 'png' feature)"
    ))
}

#[cfg(feature = "pdf")]
pub fn write_output_pdf(svg: &str, output: &Path) -> Result<()> {
    use svg2pdf::usvg;

    let mut opt = usvg::Options::default();
    opt.dpi = 72.0;
    opt.fontdb_mut().load_system_fonts();
    let tree = usvg::Tree::from_str(svg, &opt)?;
    let pdf = svg2pdf::to_pdf(
        &tree,
        svg2pdf::ConversionOptions::default(),
        svg2pdf::PageOptions::default(),
    )
    .map_err(|err| anyhow::anyhow!("PDF conversion failed: {err:?}"))?;
    std::fs::write(output, pdf)?;
    Ok(())
}

#[cfg(not(feature = "pdf"))]
pub fn write_output_pdf(_svg: &str, _output: &Path) -> Result<()> {
    Err(anyhow::anyhow!(
        "PDF export not enabled (compile with 'pdf' feature)"
    ))
}

pub(crate) fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::ir::{Compound, Dataset};
    use crate::layout::compute_layout;

    fn vacuum_layout(settings: &Settings) -> Layout {
        let dataset = Dataset::new(vec![
            Compound::vacuum("ZnO", 7.7, 4.4),
            Compound::vacuum("TiO$_2$", 7.3, 4.1).faded(true),
        ])
        .unwrap();
        compute_layout(&dataset, settings, &Theme::publication(), &FastTextMeasure).unwrap()
    }

    #[test]
    fn transform_maps_data_to_frame() {
        let transform = Transform {
            x_range: (0.0, 6.0),
            y_range: (-10.0, 0.0),
            width: 432.0,
            height: 360.0,
        };
        assert_eq!(transform.x(0.0), 0.0);
        assert_eq!(transform.x(6.0), 432.0);
        assert_eq!(transform.y(0.0), 0.0);
        assert_eq!(transform.y(-10.0), 360.0);
        let rect = transform.rect(&Rect::from_corners(0.0, -10.0, 3.0, -7.0));
        assert_eq!(rect, BBox::new(0.0, 108.0, 216.0, 360.0));
    }

    #[test]
    fn gradient_value_is_flat_outside_pixel_centres() {
        let fill = GradientFill {
            gradient: crate::theme::DEFAULT_VB_GRADIENT.clone(),
            top: 0.6,
            bottom: 0.7,
        };
        assert_eq!(fill.value_at(0.0), 0.6);
        assert_eq!(fill.value_at(0.2), 0.6);
        assert!((fill.value_at(0.5) - 0.65).abs() < 1e-6);
        assert!((fill.value_at(0.9) - 0.7).abs() < 1e-6);
    }

    #[test]
    fn recording_surface_keeps_paint_order() {
        let layout = vacuum_layout(&Settings::default());
        let mut surface = RecordingSurface::new();
        render_layout(
            &layout,
            &Theme::publication(),
            &Transform::for_layout(&layout),
            &mut surface,
        );
        let ordered = surface.ops_in_paint_order();
        let zs: Vec<i32> = ordered.iter().map(|op| op.z()).collect();
        assert!(zs.windows(2).all(|w| w[0] <= w[1]));
        let gradients = surface
            .ops()
            .iter()
            .filter(|op| matches!(op, DrawOp::GradientRect { .. }))
            .count();
        assert_eq!(gradients, 4);
        // faded outlines sit below the unfaded ones
        let edge_zs: Vec<i32> = surface
            .ops()
            .iter()
            .filter_map(|op| match op {
                DrawOp::Rect {
                    edge: Some(_), z, ..
                } => Some(*z),
                _ => None,
            })
            .collect();
        assert_eq!(edge_zs, vec![5, 5, 4, 4]);
    }

    #[test]
    fn band_edge_gets_edge_sample() {
        let layout = vacuum_layout(&Settings::default());
        let mut surface = RecordingSurface::new();
        render_layout(
            &layout,
            &Theme::publication(),
            &Transform::for_layout(&layout),
            &mut surface,
        );
        let ramp = crate::theme::DEFAULT_VB_GRADIENT.clone();
        let first = surface
            .ops()
            .iter()
            .find_map(|op| match op {
                DrawOp::GradientRect { top, bottom, .. } => Some((*top, *bottom)),
                _ => None,
            })
            .unwrap();
        // valence edge is the top of its bar
        assert_eq!(first.0, ramp.sample(GRADIENT_EDGE_SAMPLE));
        assert_eq!(first.1, ramp.sample(GRADIENT_FAR_SAMPLE));
    }

    #[test]
    fn svg_contains_scripts_and_dashes() {
        let layout = vacuum_layout(&Settings::default());
        let mut surface = SvgSurface::with_measure(Rgba::WHITE, FastTextMeasure);
        let transform = Transform::for_layout(&layout);
        render_layout(&layout, &Theme::publication(), &transform, &mut surface);
        let svg = surface.finish(transform.frame());
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("TiO<tspan dy=\"3.00\" font-size=\"10.50\">2</tspan>"));
        assert!(svg.contains("stroke-dasharray=\"8.00 4.30\""));
        assert!(svg.contains("<linearGradient"));
        assert!(svg.contains("fill-opacity"));
        assert!(svg.ends_with("</svg>"));
    }

    #[test]
    fn svg_paints_in_z_order() {
        let mut surface = SvgSurface::with_measure(Rgba::WHITE, FastTextMeasure);
        surface.draw_rect(BBox::new(0.0, 0.0, 1.0, 1.0), Some(Rgba::BLACK), None, 5);
        surface.draw_rect(BBox::new(0.0, 0.0, 2.0, 2.0), Some(Rgba::WHITE), None, 0);
        let svg = surface.finish(BBox::new(0.0, 0.0, 2.0, 2.0));
        let white = svg.find("width=\"2.00\" height=\"2.00\" fill=\"#ffffff\"/>").unwrap();
        let black = svg.find("fill=\"#000000\"").unwrap();
        assert!(white < black);
    }

    #[test]
    fn text_bbox_respects_anchor() {
        let spec = TextSpec {
            text: "x".to_string(),
            x: 100.0,
            y: 50.0,
            size: 10.0,
            color: Rgba::BLACK,
            anchor: Anchor::new(HAlign::Center, VAlign::Top),
            rotation: 0.0,
            font_family: "sans-serif".to_string(),
        };
        let extent = TextExtent {
            width: 20.0,
            height: 12.0,
            descent: 2.0,
        };
        assert_eq!(text_bbox(&spec, extent), BBox::new(90.0, 50.0, 110.0, 62.0));
        let rotated = TextSpec {
            rotation: 90.0,
            anchor: Anchor::new(HAlign::Center, VAlign::Bottom),
            ..spec
        };
        assert_eq!(
            text_bbox(&rotated, extent),
            BBox::new(88.0, 40.0, 100.0, 60.0)
        );
    }

    #[test]
    fn arrowheads_point_outwards() {
        let head = arrowhead_points(10.0, 100.0, 0.0, 8.0, 4.0);
        assert_eq!(head[0], (10.0, 100.0));
        assert!(head[1].1 < 100.0);
        let head = arrowhead_points(10.0, 0.0, 100.0, 8.0, 4.0);
        assert!(head[1].1 > 0.0);
    }

    #[test]
    fn output_format_from_extension() {
        assert_eq!(
            OutputFormat::from_path(Path::new("a.PDF")),
            Some(OutputFormat::Pdf)
        );
        assert_eq!(
            OutputFormat::from_path(Path::new("a.svg")),
            Some(OutputFormat::Svg)
        );
        assert_eq!(OutputFormat::from_path(Path::new("a.tiff")), None);
        assert_eq!(OutputFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn escape_xml_handles_markup_characters() {
        assert_eq!(escape_xml("a<b & c>"), "a&lt;b &amp; c&gt;");
    }

    const PAGE_SVG: &str = "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"122.40pt\" height=\"419.50pt\" viewBox=\"0 0 122.40 419.50\"><rect x=\"0\" y=\"0\" width=\"122.40\" height=\"419.50\" fill=\"#ffffff\"/></svg>";

    #[cfg(feature = "png")]
    #[test]
    fn png_size_follows_points_and_dpi() {
        let dir = tempfile::tempdir().unwrap();
        for dpi in [72.0f32, 144.0] {
            let path = dir.path().join(format!("page-{dpi}.png"));
            write_output(PAGE_SVG, &path, OutputFormat::Png, dpi).unwrap();
            let pixmap = resvg::tiny_skia::Pixmap::load_png(&path).unwrap();
            let zoom = dpi / 72.0;
            assert_eq!(pixmap.width(), (122.4f32 * zoom).ceil() as u32);
            assert_eq!(pixmap.height(), (419.5f32 * zoom).ceil() as u32);
        }
    }

    #[cfg(feature = "pdf")]
    #[test]
    fn pdf_page_matches_svg_points() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.pdf");
        write_output(PAGE_SVG, &path, OutputFormat::Pdf, 400.0).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        let start = text.find("/MediaBox [").unwrap() + "/MediaBox [".len();
        let end = start + text[start..].find(']').unwrap();
        let media_box: Vec<f32> = text[start..end]
            .split_whitespace()
            .map(|v| v.parse().unwrap())
            .collect();
        assert_eq!(media_box.len(), 4);
        assert!((media_box[2] - media_box[0] - 122.4).abs() < 0.01);
        assert!((media_box[3] - media_box[1] - 419.5).abs() < 0.01);
    }
}
