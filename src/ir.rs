use crate::config::CompoundRecord;
use crate::error::ConfigError;
use crate::gradient::{BandFill, Gradient, GradientSet, Rgba};
use crate::theme::{DEFAULT_CB_COLOUR, DEFAULT_CB_GRADIENT, DEFAULT_VB_COLOUR, DEFAULT_VB_GRADIENT};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlignmentMode {
    /// Bars hang from the vacuum level at 0 eV, given as IP/EA.
    VacuumReferenced,
    /// Bars are placed by valence band offset and band gap.
    OffsetReferenced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BandKind {
    Valence,
    Conduction,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BandEdges {
    Vacuum { ip: f32, ea: f32 },
    Offset { vbo: f32, band_gap: f32, cbo: f32 },
}

impl BandEdges {
    pub fn mode(&self) -> AlignmentMode {
        match self {
            BandEdges::Vacuum { .. } => AlignmentMode::VacuumReferenced,
            BandEdges::Offset { .. } => AlignmentMode::OffsetReferenced,
        }
    }

    /// Top of the valence band on the energy axis.
    pub fn valence_edge(&self) -> f32 {
        match *self {
            BandEdges::Vacuum { ip, .. } => -ip,
            BandEdges::Offset { vbo, .. } => vbo,
        }
    }

    /// Bottom of the conduction band on the energy axis.
    pub fn conduction_edge(&self) -> f32 {
        match *self {
            BandEdges::Vacuum { ea, .. } => -ea,
            BandEdges::Offset { vbo, band_gap, .. } => vbo + band_gap,
        }
    }
}

/// How a bar is washed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FadeMode {
    None,
    Full,
    ConductionOnly,
}

#[derive(Debug, Clone)]
pub struct Compound {
    pub name: String,
    pub edges: BandEdges,
    pub fade: bool,
    pub vb_gradient: Option<Arc<Gradient>>,
    pub cb_gradient: Option<Arc<Gradient>>,
    pub vb_colour: Option<Rgba>,
    pub cb_colour: Option<Rgba>,
}

impl Compound {
    pub fn vacuum(name: impl Into<String>, ip: f32, ea: f32) -> Self {
        Self::with_edges(name, BandEdges::Vacuum { ip, ea })
    }

    pub fn offset(name: impl Into<String>, vbo: f32, band_gap: f32, cbo: f32) -> Self {
        Self::with_edges(name, BandEdges::Offset { vbo, band_gap, cbo })
    }

    fn with_edges(name: impl Into<String>, edges: BandEdges) -> Self {
        Self {
            name: name.into(),
            edges,
            fade: false,
            vb_gradient: None,
            cb_gradient: None,
            vb_colour: None,
            cb_colour: None,
        }
    }

    pub fn faded(mut self, fade: bool) -> Self {
        self.fade = fade;
        self
    }

    /// A compound's own `fade` wins over the global `fade_cb`.
    pub fn fade_mode(&self, fade_cb: bool) -> FadeMode {
        if self.fade {
            FadeMode::Full
        } else if fade_cb {
            FadeMode::ConductionOnly
        } else {
            FadeMode::None
        }
    }

    pub fn band_fill(&self, band: BandKind, gradients: bool) -> BandFill {
        match (band, gradients) {
            (BandKind::Valence, true) => BandFill::Gradient(
                self.vb_gradient
                    .clone()
                    .unwrap_or_else(|| DEFAULT_VB_GRADIENT.clone()),
            ),
            (BandKind::Conduction, true) => BandFill::Gradient(
                self.cb_gradient
                    .clone()
                    .unwrap_or_else(|| DEFAULT_CB_GRADIENT.clone()),
            ),
            (BandKind::Valence, false) => {
                BandFill::Solid(self.vb_colour.unwrap_or(DEFAULT_VB_COLOUR))
            }
            (BandKind::Conduction, false) => {
                BandFill::Solid(self.cb_colour.unwrap_or(DEFAULT_CB_COLOUR))
            }
        }
    }
}

/// An ordered, non-empty list of compounds that all use the same alignment.
#[derive(Debug, Clone)]
pub struct Dataset {
    mode: AlignmentMode,
    compounds: Vec<Compound>,
}

impl Dataset {
    pub fn new(compounds: Vec<Compound>) -> Result<Self, ConfigError> {
        let first = compounds.first().ok_or(ConfigError::Empty)?;
        let mode = first.edges.mode();
        if let Some(other) = compounds.iter().find(|c| c.edges.mode() != mode) {
            return Err(ConfigError::MixedAlignment {
                first: first.name.clone(),
                other: other.name.clone(),
            });
        }
        Ok(Self { mode, compounds })
    }

    /// Validates config records, derives missing offsets and resolves
    /// gradient references.
    pub fn from_records(
        records: &[CompoundRecord],
        gradients: &GradientSet,
    ) -> Result<Self, ConfigError> {
        if records.is_empty() {
            return Err(ConfigError::Empty);
        }
        let mut compounds = Vec::with_capacity(records.len());
        let mut first_band_gap: Option<f32> = None;
        for (idx, record) in records.iter().enumerate() {
            let name = record.name.clone().ok_or_else(|| ConfigError::MissingField {
                compound: format!("#{}", idx + 1),
                field: "name",
            })?;
            let edges = classify(record, &name, &mut first_band_gap)?;
            let mut compound = Compound::with_edges(name, edges).faded(record.fade);
            resolve_palette(record, gradients, &mut compound)?;
            compounds.push(compound);
        }
        Self::new(compounds)
    }

    pub fn mode(&self) -> AlignmentMode {
        self.mode
    }

    pub fn compounds(&self) -> &[Compound] {
        &self.compounds
    }

    pub fn len(&self) -> usize {
        self.compounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compounds.is_empty()
    }
}

fn classify(
    record: &CompoundRecord,
    name: &str,
    first_band_gap: &mut Option<f32>,
) -> Result<BandEdges, ConfigError> {
    let missing = |field: &'static str| ConfigError::MissingField {
        compound: name.to_string(),
        field,
    };
    let fields = [
        ("ip", record.ip),
        ("ea", record.ea),
        ("vbo", record.vbo),
        ("cbo", record.cbo),
        ("band_gap", record.band_gap),
    ];
    if let Some(&(field, _)) = fields
        .iter()
        .find(|(_, value)| value.is_some_and(|v| !v.is_finite()))
    {
        return Err(ConfigError::NonFinite {
            compound: name.to_string(),
            field,
        });
    }
    let vacuum = record.ip.is_some() || record.ea.is_some();
    let offset = record.vbo.is_some() || record.cbo.is_some() || record.band_gap.is_some();
    match (vacuum, offset) {
        (true, true) => Err(ConfigError::ConflictingFields(name.to_string())),
        (true, false) => Ok(BandEdges::Vacuum {
            ip: record.ip.ok_or_else(|| missing("ip"))?,
            ea: record.ea.ok_or_else(|| missing("ea"))?,
        }),
        (false, true) => {
            let band_gap = record.band_gap.ok_or_else(|| missing("band_gap"))?;
            let bg0 = *first_band_gap.get_or_insert(band_gap);
            let (vbo, cbo) = match (record.vbo, record.cbo) {
                (Some(vbo), Some(cbo)) => (vbo, cbo),
                (Some(vbo), None) => (vbo, band_gap - bg0 + vbo),
                (None, Some(cbo)) => (bg0 - band_gap + cbo, cbo),
                (None, None) => return Err(missing("vbo")),
            };
            Ok(BandEdges::Offset { vbo, band_gap, cbo })
        }
        (false, false) => Err(missing("ip")),
    }
}

fn resolve_palette(
    record: &CompoundRecord,
    gradients: &GradientSet,
    compound: &mut Compound,
) -> Result<(), ConfigError> {
    if let Some(reference) = &record.gradient {
        let (vb, cb) = gradients.resolve_pair(reference)?;
        compound.vb_gradient = Some(vb);
        compound.cb_gradient = Some(cb);
    }
    if let Some(id) = &record.vb_gradient {
        compound.vb_gradient = Some(gradients.get(&id.key())?);
    }
    if let Some(id) = &record.cb_gradient {
        compound.cb_gradient = Some(gradients.get(&id.key())?);
    }
    if let Some(colour) = &record.vb_colour {
        compound.vb_colour = Some(colour.resolve()?);
    }
    if let Some(colour) = &record.cb_colour {
        compound.cb_colour = Some(colour.resolve()?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gradient::{ColourValue, GradientId, GradientSpec};

    fn record(name: &str) -> CompoundRecord {
        CompoundRecord {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn vacuum_records_build_vacuum_dataset() {
        let records = vec![CompoundRecord {
            ip: Some(7.7),
            ea: Some(4.4),
            ..record("ZnO")
        }];
        let dataset = Dataset::from_records(&records, &GradientSet::default()).unwrap();
        assert_eq!(dataset.mode(), AlignmentMode::VacuumReferenced);
        let edges = dataset.compounds()[0].edges;
        assert_eq!(edges.valence_edge(), -7.7);
        assert_eq!(edges.conduction_edge(), -4.4);
    }

    #[test]
    fn mixed_records_are_rejected() {
        let records = vec![
            CompoundRecord {
                ip: Some(7.7),
                ea: Some(4.4),
                ..record("ZnO")
            },
            CompoundRecord {
                vbo: Some(0.0),
                band_gap: Some(3.0),
                ..record("TiO2")
            },
        ];
        let err = Dataset::from_records(&records, &GradientSet::default()).unwrap_err();
        assert!(
            matches!(err, ConfigError::MixedAlignment { ref first, ref other } if first == "ZnO" && other == "TiO2")
        );
    }

    #[test]
    fn compound_with_both_field_sets_conflicts() {
        let records = vec![CompoundRecord {
            ip: Some(7.7),
            ea: Some(4.4),
            vbo: Some(0.0),
            ..record("ZnO")
        }];
        let err = Dataset::from_records(&records, &GradientSet::default()).unwrap_err();
        assert!(matches!(err, ConfigError::ConflictingFields(name) if name == "ZnO"));
    }

    #[test]
    fn missing_fields_are_named() {
        let records = vec![CompoundRecord {
            ip: Some(7.7),
            ..record("ZnO")
        }];
        let err = Dataset::from_records(&records, &GradientSet::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "ea", .. }));

        let records = vec![CompoundRecord {
            band_gap: Some(2.0),
            ..record("A")
        }];
        let err = Dataset::from_records(&records, &GradientSet::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "vbo", .. }));

        let records = vec![CompoundRecord {
            ip: Some(1.0),
            ea: Some(0.5),
            ..Default::default()
        }];
        let err = Dataset::from_records(&records, &GradientSet::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "name", .. }));
    }

    #[test]
    fn non_finite_energies_are_rejected() {
        let records = vec![
            CompoundRecord {
                ip: Some(7.7),
                ea: Some(4.4),
                ..record("ZnO")
            },
            CompoundRecord {
                ip: Some(f32::NAN),
                ea: Some(4.4),
                ..record("MOF-5")
            },
        ];
        let err = Dataset::from_records(&records, &GradientSet::default()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NonFinite { ref compound, field: "ip" } if compound == "MOF-5"
        ));

        let records = vec![CompoundRecord {
            vbo: Some(0.0),
            band_gap: Some(f32::INFINITY),
            ..record("A")
        }];
        let err = Dataset::from_records(&records, &GradientSet::default()).unwrap_err();
        assert!(matches!(err, ConfigError::NonFinite { field: "band_gap", .. }));
    }

    #[test]
    fn derives_missing_offset_from_first_band_gap() {
        let records = vec![
            CompoundRecord {
                cbo: Some(0.0),
                band_gap: Some(2.0),
                ..record("A")
            },
            CompoundRecord {
                cbo: Some(0.5),
                band_gap: Some(1.5),
                ..record("B")
            },
            CompoundRecord {
                vbo: Some(-1.0),
                band_gap: Some(3.0),
                ..record("C")
            },
        ];
        let dataset = Dataset::from_records(&records, &GradientSet::default()).unwrap();
        let offsets: Vec<(f32, f32)> = dataset
            .compounds()
            .iter()
            .map(|c| match c.edges {
                BandEdges::Offset { vbo, cbo, .. } => (vbo, cbo),
                BandEdges::Vacuum { .. } => unreachable!(),
            })
            .collect();
        assert_eq!(offsets, vec![(0.0, 0.0), (1.0, 0.5), (-1.0, 0.0)]);
    }

    #[test]
    fn supplied_offsets_are_kept() {
        let records = vec![
            CompoundRecord {
                vbo: Some(0.0),
                cbo: Some(0.0),
                band_gap: Some(2.0),
                ..record("A")
            },
            CompoundRecord {
                vbo: Some(1.5),
                cbo: Some(2.5),
                band_gap: Some(1.0),
                ..record("B")
            },
        ];
        let dataset = Dataset::from_records(&records, &GradientSet::default()).unwrap();
        assert_eq!(
            dataset.compounds()[1].edges,
            BandEdges::Offset {
                vbo: 1.5,
                band_gap: 1.0,
                cbo: 2.5
            }
        );
        assert_eq!(dataset.compounds()[1].edges.conduction_edge(), 2.5);
    }

    #[test]
    fn palette_references_resolve() {
        let gradients = GradientSet::from_specs(&[GradientSpec {
            id: GradientId::Number(3),
            start: ColourValue::Text("k".to_string()),
            end: ColourValue::Text("w".to_string()),
        }])
        .unwrap();
        let records = vec![CompoundRecord {
            ip: Some(7.0),
            ea: Some(3.0),
            cb_gradient: Some(GradientId::Text("3".to_string())),
            vb_colour: Some(ColourValue::Text("#ff0000".to_string())),
            ..record("X")
        }];
        let dataset = Dataset::from_records(&records, &gradients).unwrap();
        let compound = &dataset.compounds()[0];
        assert_eq!(compound.cb_gradient.as_ref().map(|g| g.id()), Some("3"));
        assert!(compound.vb_gradient.is_none());
        assert_eq!(
            compound.band_fill(BandKind::Valence, false),
            BandFill::Solid(Rgba::rgb(255, 0, 0))
        );
        assert_eq!(
            compound.band_fill(BandKind::Conduction, false),
            BandFill::Solid(DEFAULT_CB_COLOUR)
        );
        match compound.band_fill(BandKind::Valence, true) {
            BandFill::Gradient(g) => assert!(Arc::ptr_eq(&g, &DEFAULT_VB_GRADIENT)),
            BandFill::Solid(_) => panic!("expected gradient fill"),
        }
    }

    #[test]
    fn fade_wins_over_fade_cb() {
        let plain = Compound::vacuum("A", 7.0, 3.0);
        let faded = Compound::vacuum("B", 7.0, 3.0).faded(true);
        assert_eq!(plain.fade_mode(false), FadeMode::None);
        assert_eq!(plain.fade_mode(true), FadeMode::ConductionOnly);
        assert_eq!(faded.fade_mode(true), FadeMode::Full);
        assert_eq!(faded.fade_mode(false), FadeMode::Full);
    }

    #[test]
    fn empty_dataset_is_rejected() {
        assert!(matches!(Dataset::new(Vec::new()), Err(ConfigError::Empty)));
        assert!(matches!(
            Dataset::from_records(&[], &GradientSet::default()),
            Err(ConfigError::Empty)
        ));
    }
}
