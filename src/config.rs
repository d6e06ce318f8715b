use crate::error::ConfigError;
use crate::gradient::{ColourValue, GradientId, GradientSpec};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Layout and styling knobs. Sizes are in inches, energies in eV, fonts in
/// points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub height: f32,
    /// Defaults to `(bar_width / 2 + gap / 2) * n` when unset.
    pub width: Option<f32>,
    pub emin: Option<f32>,
    pub emax: Option<f32>,
    pub bar_width: f32,
    pub gap: f32,
    pub show_axis: bool,
    pub show_ea: bool,
    pub hide_cbo: bool,
    pub hide_vbo: bool,
    pub fade_cb: bool,
    pub name_colour: String,
    pub label_size: f32,
    pub font: Option<String>,
    pub gradients: bool,
    pub photocat_hlines: bool,
    pub dpi: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            height: 5.0,
            width: None,
            emin: None,
            emax: None,
            bar_width: 3.0,
            gap: 0.0,
            show_axis: false,
            show_ea: false,
            hide_cbo: false,
            hide_vbo: false,
            fade_cb: false,
            name_colour: "w".to_string(),
            label_size: 15.0,
            font: None,
            gradients: true,
            photocat_hlines: false,
            dpi: 400.0,
        }
    }
}

impl Settings {
    pub fn apply(&mut self, overrides: SettingsFile) {
        if let Some(v) = overrides.height {
            self.height = v;
        }
        if overrides.width.is_some() {
            self.width = overrides.width;
        }
        if overrides.emin.is_some() {
            self.emin = overrides.emin;
        }
        if overrides.emax.is_some() {
            self.emax = overrides.emax;
        }
        if let Some(v) = overrides.bar_width {
            self.bar_width = v;
        }
        if let Some(v) = overrides.gap {
            self.gap = v;
        }
        if let Some(v) = overrides.show_axis {
            self.show_axis = v;
        }
        if let Some(v) = overrides.show_ea {
            self.show_ea = v;
        }
        if let Some(v) = overrides.hide_cbo {
            self.hide_cbo = v;
        }
        if let Some(v) = overrides.hide_vbo {
            self.hide_vbo = v;
        }
        if let Some(v) = overrides.fade_cb {
            self.fade_cb = v;
        }
        if let Some(v) = overrides.name_colour {
            self.name_colour = v;
        }
        if let Some(v) = overrides.label_size {
            self.label_size = v;
        }
        if overrides.font.is_some() {
            self.font = overrides.font;
        }
        if let Some(v) = overrides.gradients {
            self.gradients = v;
        }
        if let Some(v) = overrides.photocat_hlines {
            self.photocat_hlines = v;
        }
        if let Some(v) = overrides.dpi {
            self.dpi = v;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("height", Some(self.height)),
            ("width", self.width),
            ("bar_width", Some(self.bar_width)),
            ("label_size", Some(self.label_size)),
            ("dpi", Some(self.dpi)),
        ];
        for (name, value) in positive {
            if let Some(v) = value {
                if !(v.is_finite() && v > 0.0) {
                    return Err(ConfigError::InvalidSetting {
                        name,
                        reason: format!("must be a positive number, got {v}"),
                    });
                }
            }
        }
        if !(self.gap.is_finite() && self.gap >= 0.0) {
            return Err(ConfigError::InvalidSetting {
                name: "gap",
                reason: format!("must not be negative, got {}", self.gap),
            });
        }
        // emax only matters for offset alignment, so ordering is checked there
        for (name, value) in [("emin", self.emin), ("emax", self.emax)] {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(ConfigError::InvalidSetting {
                        name,
                        reason: format!("must be a finite number, got {v}"),
                    });
                }
            }
        }
        Ok(())
    }

    /// Figure size in inches for `count` compounds.
    pub fn figure_size(&self, count: usize) -> (f32, f32) {
        let width = self
            .width
            .unwrap_or((self.bar_width / 2.0 + self.gap / 2.0) * count.max(1) as f32);
        (width, self.height)
    }
}

/// Partial settings, as read from a config file's `settings` block or
/// collected from command line flags.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsFile {
    pub height: Option<f32>,
    pub width: Option<f32>,
    pub emin: Option<f32>,
    pub emax: Option<f32>,
    pub bar_width: Option<f32>,
    pub gap: Option<f32>,
    pub show_axis: Option<bool>,
    pub show_ea: Option<bool>,
    pub hide_cbo: Option<bool>,
    pub hide_vbo: Option<bool>,
    pub fade_cb: Option<bool>,
    pub name_colour: Option<String>,
    #[serde(alias = "font_size")]
    pub label_size: Option<f32>,
    pub font: Option<String>,
    pub gradients: Option<bool>,
    pub photocat_hlines: Option<bool>,
    pub dpi: Option<f32>,
}

/// One entry of the config's `compounds` list, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompoundRecord {
    pub name: Option<String>,
    pub ip: Option<f32>,
    pub ea: Option<f32>,
    pub vbo: Option<f32>,
    pub cbo: Option<f32>,
    pub band_gap: Option<f32>,
    #[serde(default)]
    pub fade: bool,
    /// `1` or `"1,2"`: one id for both bands, or valence then conduction.
    pub gradient: Option<GradientId>,
    pub vb_gradient: Option<GradientId>,
    pub cb_gradient: Option<GradientId>,
    pub vb_colour: Option<ColourValue>,
    pub cb_colour: Option<ColourValue>,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    compounds: Option<Vec<CompoundRecord>>,
    settings: Option<SettingsFile>,
    gradients: Option<Vec<GradientSpec>>,
}

/// A loaded config file.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub settings: Settings,
    pub compounds: Vec<CompoundRecord>,
    pub gradients: Vec<GradientSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") | Some("json5") => ConfigFormat::Json,
            _ => ConfigFormat::Yaml,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&contents, ConfigFormat::from_path(path), path)?;
    log::debug!(
        "loaded {} compounds and {} gradients from {}",
        config.compounds.len(),
        config.gradients.len(),
        path.display()
    );
    Ok(config)
}

pub fn parse_config(
    contents: &str,
    format: ConfigFormat,
    origin: &Path,
) -> Result<Config, ConfigError> {
    let parse_error = |line: usize, message: String| ConfigError::Parse {
        path: PathBuf::from(origin),
        line,
        message,
    };
    let parsed: ConfigFile = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(contents).map_err(|err| {
            let line = err.location().map(|loc| loc.line()).unwrap_or(0);
            parse_error(line, err.to_string())
        })?,
        ConfigFormat::Json => match serde_json::from_str(contents) {
            Ok(parsed) => parsed,
            Err(json_err) => json5::from_str(contents)
                .map_err(|_| parse_error(json_err.line(), json_err.to_string()))?,
        },
    };

    let mut config = Config::default();
    if let Some(settings) = parsed.settings {
        config.settings.apply(settings);
    }
    config.compounds = parsed.compounds.unwrap_or_default();
    config.gradients = parsed.gradients.unwrap_or_default();
    if config.compounds.is_empty() {
        return Err(ConfigError::Empty);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r##"
settings:
  show_axis: true
  gap: 0.5
  font_size: 12
  colours: ignored
gradients:
  - id: 1
    start: "#000000"
    end: "#ffffff"
compounds:
  - name: ZnO
    ip: 7.7
    ea: 4.4
    gradient: 1
  - name: MOF-5
    ip: 7.3
    ea: 2.7
    fade: true
"##;

    #[test]
    fn parses_yaml_config() {
        let config = parse_config(YAML, ConfigFormat::Yaml, Path::new("test.yaml")).unwrap();
        assert_eq!(config.compounds.len(), 2);
        assert_eq!(config.compounds[0].name.as_deref(), Some("ZnO"));
        assert_eq!(config.compounds[0].gradient, Some(GradientId::Number(1)));
        assert!(config.compounds[1].fade);
        assert_eq!(config.gradients.len(), 1);
        assert!(config.settings.show_axis);
        assert_eq!(config.settings.gap, 0.5);
        assert_eq!(config.settings.label_size, 12.0);
        assert_eq!(config.settings.bar_width, 3.0);
    }

    #[test]
    fn parses_json_and_json5() {
        let json = r#"{"compounds": [{"name": "A", "vbo": 0, "band_gap": 2.0}]}"#;
        let config = parse_config(json, ConfigFormat::Json, Path::new("a.json")).unwrap();
        assert_eq!(config.compounds[0].band_gap, Some(2.0));

        let json5 = "{compounds: [{name: 'A', vbo: 0, band_gap: 2.0,},],}";
        let config = parse_config(json5, ConfigFormat::Json, Path::new("a.json5")).unwrap();
        assert_eq!(config.compounds[0].vbo, Some(0.0));
    }

    #[test]
    fn malformed_yaml_reports_parse_error() {
        let err = parse_config("compounds: [", ConfigFormat::Yaml, Path::new("bad.yaml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn empty_compound_list_is_rejected() {
        let err = parse_config("settings: {gap: 1}", ConfigFormat::Yaml, Path::new("x.yaml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Empty));
    }

    #[test]
    fn overrides_replace_only_given_fields() {
        let mut settings = Settings::default();
        settings.apply(SettingsFile {
            gap: Some(1.0),
            show_ea: Some(true),
            ..Default::default()
        });
        assert_eq!(settings.gap, 1.0);
        assert!(settings.show_ea);
        assert_eq!(settings.height, 5.0);
        assert_eq!(settings.name_colour, "w");
    }

    #[test]
    fn default_width_follows_bar_count() {
        let settings = Settings {
            bar_width: 3.0,
            gap: 1.0,
            ..Default::default()
        };
        assert_eq!(settings.figure_size(4), (8.0, 5.0));
        let fixed = Settings {
            width: Some(6.0),
            ..Default::default()
        };
        assert_eq!(fixed.figure_size(4).0, 6.0);
    }

    #[test]
    fn validate_leaves_range_order_to_layout() {
        let settings = Settings {
            emin: Some(-10.0),
            emax: Some(-12.0),
            ..Default::default()
        };
        assert!(settings.validate().is_ok());
        let settings = Settings {
            emin: Some(f32::NAN),
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidSetting { name: "emin", .. })
        ));
        let settings = Settings {
            bar_width: 0.0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }
}
