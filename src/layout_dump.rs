use crate::gradient::BandFill;
use crate::ir::Dataset;
use crate::layout::{ArrowLayout, Frame, HLineLayout, Layout, OverlayLayout};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub mode: String,
    pub x_range: [f32; 2],
    pub y_range: [f32; 2],
    pub frame: Frame,
    pub bars: Vec<BarDump>,
    pub overlays: Vec<OverlayLayout>,
    pub arrows: Vec<ArrowLayout>,
    pub labels: Vec<LabelDump>,
    pub hlines: Vec<HLineLayout>,
}

#[derive(Debug, Serialize)]
pub struct BarDump {
    pub compound: String,
    pub band: String,
    pub x0: f32,
    pub x1: f32,
    pub y0: f32,
    pub y1: f32,
    pub edge_level: f32,
    pub fill: String,
    pub fade: String,
    pub edge_color: String,
    pub edge_z: i32,
}

#[derive(Debug, Serialize)]
pub struct LabelDump {
    pub role: String,
    pub compound: Option<String>,
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub anchor: String,
    pub width_pt: f32,
    pub height_pt: f32,
    pub color: String,
}

impl LayoutDump {
    pub fn from_layout(layout: &Layout, dataset: &Dataset) -> Self {
        let name = |idx: usize| {
            dataset
                .compounds()
                .get(idx)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| format!("#{idx}"))
        };

        let bars = layout
            .bars
            .iter()
            .map(|bar| BarDump {
                compound: name(bar.compound),
                band: format!("{:?}", bar.band),
                x0: bar.rect.x0,
                x1: bar.rect.x1,
                y0: bar.rect.y0,
                y1: bar.rect.y1,
                edge_level: bar.edge_level,
                fill: match &bar.fill {
                    BandFill::Gradient(gradient) => format!("gradient:{}", gradient.id()),
                    BandFill::Solid(color) => color.to_hex(),
                },
                fade: format!("{:?}", bar.fade),
                edge_color: bar.edge.color.to_hex(),
                edge_z: bar.edge.z,
            })
            .collect();

        let labels = layout
            .labels
            .iter()
            .map(|label| LabelDump {
                role: format!("{:?}", label.role),
                compound: label.compound.map(name),
                text: label.text.clone(),
                x: label.x,
                y: label.y,
                anchor: format!("{:?}/{:?}", label.anchor.h, label.anchor.v),
                width_pt: label.extent.width,
                height_pt: label.extent.height,
                color: label.color.to_hex(),
            })
            .collect();

        LayoutDump {
            mode: format!("{:?}", layout.mode),
            x_range: [layout.x_range.0, layout.x_range.1],
            y_range: [layout.y_range.0, layout.y_range.1],
            frame: layout.frame,
            bars,
            overlays: layout.overlays.clone(),
            arrows: layout.arrows.clone(),
            labels,
            hlines: layout.hlines.clone(),
        }
    }
}

pub fn write_layout_dump(path: &Path, layout: &Layout, dataset: &Dataset) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_layout(layout, dataset);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}
