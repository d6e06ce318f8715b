//! Colours, two-colour gradient ramps and the lookup of gradient ids used by
//! compounds.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Number of entries in every interpolated ramp.
pub const RAMP_STEPS: usize = 200;

/// RGBA colour with 8-bit components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Self::new(self.r, self.g, self.b, a)
    }

    /// Builds a colour from 0..=1 fractions, the way matplotlib tuples are
    /// written.
    pub fn from_fractions(r: f32, g: f32, b: f32, a: f32) -> Self {
        let to_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self::new(to_u8(r), to_u8(g), to_u8(b), to_u8(a))
    }

    /// Linear interpolation in RGB space.
    pub fn lerp(self, other: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (f32::from(a) + (f32::from(b) - f32::from(a)) * t).round() as u8;
        Self::new(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
            mix(self.a, other.a),
        )
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn opacity(self) -> f32 {
        f32::from(self.a) / 255.0
    }

    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let raw = input.trim();
        let invalid = || ConfigError::InvalidColour(input.to_string());
        if let Some(hex) = raw.strip_prefix('#') {
            let digits: Vec<u8> = hex
                .chars()
                .map(|ch| ch.to_digit(16).map(|d| d as u8))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(invalid)?;
            return match digits.len() {
                3 => Ok(Self::rgb(digits[0] * 17, digits[1] * 17, digits[2] * 17)),
                6 | 8 => {
                    let byte = |i: usize| digits[i] * 16 + digits[i + 1];
                    let alpha = if digits.len() == 8 { byte(6) } else { 255 };
                    Ok(Self::new(byte(0), byte(2), byte(4), alpha))
                }
                _ => Err(invalid()),
            };
        }
        named_colour(&raw.to_ascii_lowercase()).ok_or_else(invalid)
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

fn named_colour(name: &str) -> Option<Rgba> {
    let colour = match name {
        // matplotlib single-letter shorthands
        "k" | "black" => Rgba::BLACK,
        "w" | "white" => Rgba::WHITE,
        "r" => Rgba::rgb(255, 0, 0),
        "g" => Rgba::rgb(0, 128, 0),
        "b" => Rgba::rgb(0, 0, 255),
        "c" => Rgba::rgb(0, 191, 191),
        "m" => Rgba::rgb(191, 0, 191),
        "y" => Rgba::rgb(191, 191, 0),
        "red" => Rgba::rgb(255, 0, 0),
        "green" => Rgba::rgb(0, 128, 0),
        "blue" => Rgba::rgb(0, 0, 255),
        "gray" | "grey" => Rgba::rgb(128, 128, 128),
        "lightgray" | "lightgrey" => Rgba::rgb(211, 211, 211),
        "darkgray" | "darkgrey" => Rgba::rgb(169, 169, 169),
        "orange" => Rgba::rgb(255, 165, 0),
        "navy" => Rgba::rgb(0, 0, 128),
        "teal" => Rgba::rgb(0, 128, 128),
        "purple" => Rgba::rgb(128, 0, 128),
        "yellow" => Rgba::rgb(255, 255, 0),
        "cyan" => Rgba::rgb(0, 255, 255),
        "magenta" => Rgba::rgb(255, 0, 255),
        "brown" => Rgba::rgb(165, 42, 42),
        "pink" => Rgba::rgb(255, 192, 203),
        _ => return None,
    };
    Some(colour)
}

/// A colour as written in a config file: a name, a hex string or an
/// `[r, g, b(, a)]` list of fractions (or 0..=255 integers).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColourValue {
    Text(String),
    Components(Vec<f32>),
}

impl ColourValue {
    pub fn resolve(&self) -> Result<Rgba, ConfigError> {
        match self {
            ColourValue::Text(text) => Rgba::parse(text),
            ColourValue::Components(parts) => {
                if !(3..=4).contains(&parts.len()) {
                    return Err(ConfigError::InvalidColour(format!("{parts:?}")));
                }
                let scale = if parts.iter().any(|v| *v > 1.0) { 255.0 } else { 1.0 };
                let alpha = parts.get(3).copied().unwrap_or(scale);
                Ok(Rgba::from_fractions(
                    parts[0] / scale,
                    parts[1] / scale,
                    parts[2] / scale,
                    alpha / scale,
                ))
            }
        }
    }
}

/// Gradient ids may be written as integers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GradientId {
    Number(i64),
    Text(String),
}

impl GradientId {
    pub fn key(&self) -> String {
        match self {
            GradientId::Number(n) => n.to_string(),
            GradientId::Text(s) => s.trim().to_string(),
        }
    }
}

/// One `{id, start, end}` entry of the config's `gradients` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientSpec {
    pub id: GradientId,
    pub start: ColourValue,
    pub end: ColourValue,
}

/// A two-colour linear ramp sampled at [`RAMP_STEPS`] points.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    id: String,
    start: Rgba,
    end: Rgba,
    steps: Vec<Rgba>,
}

impl Gradient {
    pub fn new(id: impl Into<String>, start: Rgba, end: Rgba) -> Self {
        let last = (RAMP_STEPS - 1) as f32;
        let steps = (0..RAMP_STEPS)
            .map(|i| start.lerp(end, i as f32 / last))
            .collect();
        Self {
            id: id.into(),
            start,
            end,
            steps,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn start(&self) -> Rgba {
        self.start
    }

    pub fn end(&self) -> Rgba {
        self.end
    }

    pub fn steps(&self) -> &[Rgba] {
        &self.steps
    }

    /// Looks up the ramp entry for `t` in `0..=1` (lookup-table semantics:
    /// `floor(t * N)`, clamped to the last entry).
    pub fn sample(&self, t: f32) -> Rgba {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let idx = ((t * RAMP_STEPS as f32) as usize).min(RAMP_STEPS - 1);
        self.steps[idx]
    }
}

/// Fill of one bar after palette resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum BandFill {
    Gradient(Arc<Gradient>),
    Solid(Rgba),
}

/// Gradients declared by a config file, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct GradientSet {
    gradients: HashMap<String, Arc<Gradient>>,
}

impl GradientSet {
    pub fn from_specs(specs: &[GradientSpec]) -> Result<Self, ConfigError> {
        let mut gradients = HashMap::new();
        for spec in specs {
            let key = spec.id.key();
            let gradient = Gradient::new(key.clone(), spec.start.resolve()?, spec.end.resolve()?);
            gradients.insert(key, Arc::new(gradient));
        }
        Ok(Self { gradients })
    }

    pub fn len(&self) -> usize {
        self.gradients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gradients.is_empty()
    }

    pub fn get(&self, id: &str) -> Result<Arc<Gradient>, ConfigError> {
        self.gradients
            .get(id.trim())
            .cloned()
            .ok_or_else(|| ConfigError::UnknownGradient(id.trim().to_string()))
    }

    /// Resolves a compound's `gradient` reference. A single id applies to
    /// both bands; `"a,b"` gives the valence and conduction ramps.
    pub fn resolve_pair(
        &self,
        reference: &GradientId,
    ) -> Result<(Arc<Gradient>, Arc<Gradient>), ConfigError> {
        let key = reference.key();
        let ids: Vec<&str> = key.split(',').map(str::trim).collect();
        match ids.as_slice() {
            [single] if !single.is_empty() => {
                let gradient = self.get(single)?;
                Ok((gradient.clone(), gradient))
            }
            [vb, cb] if !vb.is_empty() && !cb.is_empty() => Ok((self.get(vb)?, self.get(cb)?)),
            _ => Err(ConfigError::InvalidGradientRef(key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_has_fixed_length_and_endpoints() {
        let start = Rgba::rgb(23, 71, 158);
        let end = Rgba::rgb(174, 198, 242);
        let ramp = Gradient::new("vb", start, end);
        assert_eq!(ramp.steps().len(), RAMP_STEPS);
        assert_eq!(ramp.steps()[0], start);
        assert_eq!(ramp.steps()[RAMP_STEPS - 1], end);
        assert_eq!(ramp.sample(1.0), end);
        assert_eq!(ramp.sample(0.0), start);
    }

    #[test]
    fn ramp_is_monotonic_per_channel() {
        let ramp = Gradient::new("x", Rgba::rgb(0, 0, 0), Rgba::rgb(200, 100, 50));
        for pair in ramp.steps().windows(2) {
            assert!(pair[1].r >= pair[0].r);
            assert!(pair[1].g >= pair[0].g);
            assert!(pair[1].b >= pair[0].b);
        }
    }

    #[test]
    fn resolving_same_id_twice_is_identical() {
        let specs = vec![GradientSpec {
            id: GradientId::Number(1),
            start: ColourValue::Text("#000000".to_string()),
            end: ColourValue::Text("#ffffff".to_string()),
        }];
        let set = GradientSet::from_specs(&specs).unwrap();
        let a = set.get("1").unwrap();
        let b = set.get("1").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let rebuilt = GradientSet::from_specs(&specs).unwrap().get("1").unwrap();
        assert_eq!(a.steps(), rebuilt.steps());
    }

    #[test]
    fn pair_reference_splits_valence_and_conduction() {
        let specs = vec![
            GradientSpec {
                id: GradientId::Number(1),
                start: ColourValue::Text("k".to_string()),
                end: ColourValue::Text("w".to_string()),
            },
            GradientSpec {
                id: GradientId::Number(2),
                start: ColourValue::Components(vec![1.0, 0.0, 0.0]),
                end: ColourValue::Components(vec![0.0, 0.0, 1.0]),
            },
        ];
        let set = GradientSet::from_specs(&specs).unwrap();
        let (vb, cb) = set
            .resolve_pair(&GradientId::Text("1, 2".to_string()))
            .unwrap();
        assert_eq!(vb.id(), "1");
        assert_eq!(cb.id(), "2");
        let (vb, cb) = set.resolve_pair(&GradientId::Number(2)).unwrap();
        assert!(Arc::ptr_eq(&vb, &cb));
    }

    #[test]
    fn unknown_gradient_is_an_error() {
        let set = GradientSet::default();
        let err = set.resolve_pair(&GradientId::Number(7)).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownGradient(id) if id == "7"));
        let err = set
            .resolve_pair(&GradientId::Text("1,2,3".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidGradientRef(_)));
    }

    #[test]
    fn parses_colour_notations() {
        assert_eq!(Rgba::parse("#fff").unwrap(), Rgba::WHITE);
        assert_eq!(Rgba::parse("#219ebc").unwrap(), Rgba::rgb(0x21, 0x9e, 0xbc));
        assert_eq!(Rgba::parse("#00000080").unwrap().a, 0x80);
        assert_eq!(Rgba::parse("k").unwrap(), Rgba::BLACK);
        assert_eq!(Rgba::parse("Grey").unwrap(), Rgba::rgb(128, 128, 128));
        assert!(Rgba::parse("#12345").is_err());
        assert!(Rgba::parse("chartreuse-ish").is_err());
        let tuple = ColourValue::Components(vec![247.0, 148.0, 51.0]);
        assert_eq!(tuple.resolve().unwrap(), Rgba::rgb(247, 148, 51));
    }
}
