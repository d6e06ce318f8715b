use crate::config::{CompoundRecord, Settings, SettingsFile, load_config};
use crate::diagram::build_figure;
use crate::error::{ArgsError, ConfigError};
use crate::gradient::GradientSet;
use crate::ir::Dataset;
use crate::layout_dump::write_layout_dump;
use crate::render::{OutputFormat, write_output};
use crate::theme::Theme;
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "bandalign",
    version,
    about = "Plotter for electronic band alignment diagrams"
)]
pub struct Args {
    /// Path to a YAML (or JSON) file containing alignment information
    #[arg(short = 'f', long = "filename")]
    pub filename: Option<PathBuf>,

    /// Compound names, comma separated. Use $_x$ and $^y$ for subscript and superscript
    #[arg(short = 'n', long = "name")]
    pub name: Option<String>,

    /// Ionisation potentials, comma separated
    #[arg(short = 'i', long = "ip", allow_hyphen_values = true)]
    pub ip: Option<String>,

    /// Electron affinities, comma separated
    #[arg(short = 'e', long = "ea", allow_hyphen_values = true)]
    pub ea: Option<String>,

    /// Conduction band offsets relative to the first compound, comma separated
    #[arg(short = 'c', long = "cbo", allow_hyphen_values = true)]
    pub cbo: Option<String>,

    /// Valence band offsets relative to the first compound, comma separated
    #[arg(short = 'v', long = "vbo", allow_hyphen_values = true)]
    pub vbo: Option<String>,

    /// Band gaps, comma separated
    #[arg(short = 'b', long = "band-gap", allow_hyphen_values = true)]
    pub band_gap: Option<String>,

    /// Output file; the extension picks the format unless --format is given
    #[arg(short = 'o', long = "output", default_value = "alignment.pdf")]
    pub output: PathBuf,

    /// Output format
    #[arg(long = "format", value_enum)]
    pub format: Option<FormatArg>,

    /// Display the electron affinity value
    #[arg(long = "show-ea")]
    pub show_ea: bool,

    /// Hide the conduction band offsets
    #[arg(long = "hide-cbo")]
    pub hide_cbo: bool,

    /// Hide the valence band offsets
    #[arg(long = "hide-vbo")]
    pub hide_vbo: bool,

    /// Display the energy axis and its label
    #[arg(long = "show-axis")]
    pub show_axis: bool,

    /// Fade the conduction band segments
    #[arg(long = "fade-cb")]
    pub fade_cb: bool,

    /// Use flat colours instead of gradients
    #[arg(long = "no-gradients")]
    pub no_gradients: bool,

    /// Draw the water redox levels (vacuum alignment only)
    #[arg(long = "photocat-hlines")]
    pub photocat_hlines: bool,

    /// Figure height in inches
    #[arg(long = "height")]
    pub height: Option<f32>,

    /// Figure width in inches
    #[arg(long = "width")]
    pub width: Option<f32>,

    /// Energy minimum on the y axis
    #[arg(long = "emin", allow_hyphen_values = true)]
    pub emin: Option<f32>,

    /// Energy maximum on the y axis (offset alignment only)
    #[arg(long = "emax", allow_hyphen_values = true)]
    pub emax: Option<f32>,

    /// Gap between bars
    #[arg(long = "gap")]
    pub gap: Option<f32>,

    /// Width of each bar
    #[arg(long = "bar-width")]
    pub bar_width: Option<f32>,

    /// Preferred font, tried before the default fallback chain
    #[arg(long = "font")]
    pub font: Option<String>,

    /// Font size of all labels
    #[arg(long = "font-size")]
    pub font_size: Option<f32>,

    /// Colour of the compound names and offsets
    #[arg(long = "name-colour")]
    pub name_colour: Option<String>,

    /// Dots per inch for PNG output
    #[arg(long = "dpi")]
    pub dpi: Option<f32>,

    /// Also write the computed layout as JSON
    #[arg(long = "dump-layout")]
    pub dump_layout: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatArg {
    Svg,
    Png,
    Pdf,
}

impl From<FormatArg> for OutputFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Svg => OutputFormat::Svg,
            FormatArg::Png => OutputFormat::Png,
            FormatArg::Pdf => OutputFormat::Pdf,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OffsetList {
    Cbo(String),
    Vbo(String),
}

/// Where the compounds come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    File(PathBuf),
    Vacuum {
        names: String,
        ips: String,
        eas: String,
    },
    Offset {
        names: String,
        band_gaps: String,
        offsets: OffsetList,
    },
}

impl InputSource {
    /// Checks flag combinations. Nothing is read yet.
    pub fn from_args(args: &Args) -> Result<Self, ArgsError> {
        let vacuum_flags = args.ip.is_some() || args.ea.is_some();
        let offset_flags = args.band_gap.is_some() || args.cbo.is_some() || args.vbo.is_some();
        let inline = args.name.is_some() || vacuum_flags || offset_flags;

        if let Some(path) = &args.filename {
            if inline {
                return Err(ArgsError::FileAndInline);
            }
            return Ok(InputSource::File(path.clone()));
        }
        if !inline {
            return Err(ArgsError::NoInput);
        }
        if args.cbo.is_some() && args.vbo.is_some() {
            return Err(ArgsError::CboAndVbo);
        }
        if vacuum_flags && offset_flags {
            return Err(ArgsError::MixedInline);
        }
        if vacuum_flags {
            return match (&args.name, &args.ip, &args.ea) {
                (Some(names), Some(ips), Some(eas)) => Ok(InputSource::Vacuum {
                    names: names.clone(),
                    ips: ips.clone(),
                    eas: eas.clone(),
                }),
                _ => Err(ArgsError::IncompleteVacuum),
            };
        }
        let offsets = match (&args.cbo, &args.vbo) {
            (Some(cbo), None) => Some(OffsetList::Cbo(cbo.clone())),
            (None, Some(vbo)) => Some(OffsetList::Vbo(vbo.clone())),
            _ => None,
        };
        match (&args.name, &args.band_gap, offsets) {
            (Some(names), Some(band_gaps), Some(offsets)) => Ok(InputSource::Offset {
                names: names.clone(),
                band_gaps: band_gaps.clone(),
                offsets,
            }),
            _ => Err(ArgsError::IncompleteOffset),
        }
    }

    /// Compound records for inline input.
    pub fn inline_records(&self) -> Result<Vec<CompoundRecord>, ConfigError> {
        match self {
            InputSource::File(_) => Ok(Vec::new()),
            InputSource::Vacuum { names, ips, eas } => {
                let names = split_names(names);
                let ips = parse_list("ip", ips, names.len())?;
                let eas = parse_list("ea", eas, names.len())?;
                Ok(names
                    .into_iter()
                    .zip(ips)
                    .zip(eas)
                    .map(|((name, ip), ea)| CompoundRecord {
                        name: Some(name),
                        ip: Some(ip),
                        ea: Some(ea),
                        ..Default::default()
                    })
                    .collect())
            }
            InputSource::Offset {
                names,
                band_gaps,
                offsets,
            } => {
                let names = split_names(names);
                let band_gaps = parse_list("band-gap", band_gaps, names.len())?;
                let (flag, raw) = match offsets {
                    OffsetList::Cbo(raw) => ("cbo", raw),
                    OffsetList::Vbo(raw) => ("vbo", raw),
                };
                let values = parse_offsets(flag, raw, names.len())?;
                Ok(names
                    .into_iter()
                    .zip(band_gaps)
                    .zip(values)
                    .map(|((name, band_gap), offset)| {
                        let (vbo, cbo) = match offsets {
                            OffsetList::Cbo(_) => (None, Some(offset)),
                            OffsetList::Vbo(_) => (Some(offset), None),
                        };
                        CompoundRecord {
                            name: Some(name),
                            band_gap: Some(band_gap),
                            vbo,
                            cbo,
                            ..Default::default()
                        }
                    })
                    .collect())
            }
        }
    }
}

impl Args {
    /// Settings given explicitly on the command line. Unset flags leave the
    /// config's values alone.
    pub fn settings_overrides(&self) -> SettingsFile {
        let flag = |set: bool| set.then_some(true);
        SettingsFile {
            height: self.height,
            width: self.width,
            emin: self.emin,
            emax: self.emax,
            bar_width: self.bar_width,
            gap: self.gap,
            show_axis: flag(self.show_axis),
            show_ea: flag(self.show_ea),
            hide_cbo: flag(self.hide_cbo),
            hide_vbo: flag(self.hide_vbo),
            fade_cb: flag(self.fade_cb),
            name_colour: self.name_colour.clone(),
            label_size: self.font_size,
            font: self.font.clone(),
            gradients: self.no_gradients.then_some(false),
            photocat_hlines: flag(self.photocat_hlines),
            dpi: self.dpi,
        }
    }

    pub fn output_format(&self) -> Result<OutputFormat, ArgsError> {
        match self.format {
            Some(format) => Ok(format.into()),
            None => OutputFormat::from_path(&self.output)
                .ok_or_else(|| ArgsError::UnknownFormat(self.output.display().to_string())),
        }
    }
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    run_with_args(&args)
}

pub fn run_with_args(args: &Args) -> Result<()> {
    let source = InputSource::from_args(args)?;
    let format = args.output_format()?;

    let (mut settings, records, gradients) = match &source {
        InputSource::File(path) => {
            let config = load_config(path)?;
            let gradients = GradientSet::from_specs(&config.gradients)?;
            (config.settings, config.compounds, gradients)
        }
        inline => (
            Settings::default(),
            inline.inline_records()?,
            GradientSet::default(),
        ),
    };
    settings.apply(args.settings_overrides());
    settings.validate()?;

    let dataset = Dataset::from_records(&records, &gradients)?;
    log::debug!(
        "{} compounds, {:?}, {} custom gradients",
        dataset.len(),
        dataset.mode(),
        gradients.len()
    );

    let theme = Theme::publication();
    let figure = build_figure(&dataset, &settings, &theme)?;

    write_output(&figure.svg, &args.output, format, settings.dpi)?;
    log::info!("wrote {:?} output to {}", format, args.output.display());
    // written last so a failed output leaves no dump behind
    if let Some(path) = &args.dump_layout {
        write_layout_dump(path, &figure.layout, &dataset)?;
        log::info!("wrote layout dump to {}", path.display());
    }
    Ok(())
}

fn split_names(raw: &str) -> Vec<String> {
    raw.split(',').map(|name| name.trim().to_string()).collect()
}

fn parse_values(flag: &'static str, raw: &str) -> Result<Vec<f32>, ConfigError> {
    raw.split(',')
        .map(|value| {
            value
                .trim()
                .parse::<f32>()
                .map_err(|_| ConfigError::InvalidNumber {
                    flag,
                    value: value.trim().to_string(),
                })
        })
        .collect()
}

fn parse_list(flag: &'static str, raw: &str, expected: usize) -> Result<Vec<f32>, ConfigError> {
    let values = parse_values(flag, raw)?;
    if values.len() != expected {
        return Err(ConfigError::LengthMismatch {
            flag,
            expected,
            found: values.len(),
        });
    }
    Ok(values)
}

/// Offsets are relative to the first compound, so its 0 may be left out.
fn parse_offsets(flag: &'static str, raw: &str, expected: usize) -> Result<Vec<f32>, ConfigError> {
    let mut values = parse_values(flag, raw)?;
    if values.len() + 1 == expected {
        values.insert(0, 0.0);
    }
    if values.len() != expected {
        return Err(ConfigError::LengthMismatch {
            flag,
            expected,
            found: values.len(),
        });
    }
    Ok(values)
}
