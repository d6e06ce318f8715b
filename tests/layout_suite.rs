use std::path::{Path, PathBuf};

use bandalign::gradient::GradientSet;
use bandalign::ir::BandKind;
use bandalign::layout::LabelRole;
use bandalign::{AlignmentMode, Dataset, Figure, Theme, build_figure, load_config};

fn fixture_path(rel: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(rel)
}

fn assert_valid_svg(svg: &str, fixture: &str) {
    assert!(svg.contains("<svg"), "{fixture}: missing <svg tag");
    assert!(svg.contains("</svg>"), "{fixture}: missing </svg tag");
}

fn render_fixture(rel: &str) -> (Dataset, Figure) {
    let config = load_config(&fixture_path(rel)).expect("fixture load failed");
    let gradients = GradientSet::from_specs(&config.gradients).expect("bad gradients");
    let dataset = Dataset::from_records(&config.compounds, &gradients).expect("bad compounds");
    let figure = build_figure(&dataset, &config.settings, &Theme::publication())
        .expect("figure build failed");
    (dataset, figure)
}

#[test]
fn render_all_fixtures() {
    // Keep this list explicit so new fixtures must be added intentionally.
    let fixtures = [
        "vacuum.yaml",
        "offset.yaml",
        "offset.json",
        "gradients.yaml",
        "fade.yaml",
    ];
    for rel in fixtures {
        assert!(fixture_path(rel).exists(), "fixture missing: {rel}");
        let (dataset, figure) = render_fixture(rel);
        assert_valid_svg(&figure.svg, rel);
        assert!(figure.width > 0.0 && figure.height > 0.0, "{rel}: empty page");
        assert_eq!(figure.layout.bars.len(), dataset.len() * 2, "{rel}");
    }
}

#[test]
fn vacuum_fixture_labels_ip_and_ea() {
    let (dataset, figure) = render_fixture("vacuum.yaml");
    assert_eq!(dataset.mode(), AlignmentMode::VacuumReferenced);
    let layout = &figure.layout;
    assert_eq!(
        layout.labels_with_role(LabelRole::IonisationPotential).count(),
        3
    );
    assert_eq!(layout.labels_with_role(LabelRole::ElectronAffinity).count(), 3);
    assert!(figure.svg.contains("Energy (eV)"));
    assert!(figure.svg.contains("Vacuum Level"));
}

#[test]
fn json_offset_fixture_derives_vbo_and_hides_cbo() {
    let (dataset, figure) = render_fixture("offset.json");
    assert_eq!(dataset.mode(), AlignmentMode::OffsetReferenced);
    let layout = &figure.layout;
    assert_eq!(layout.y_range, (-3.0, 5.0));
    assert_eq!(layout.labels_with_role(LabelRole::ConductionOffset).count(), 0);
    // vbo = bg0 - bg + cbo = 2.0 - 1.0 + 2.5
    let vb = layout.bar(1, BandKind::Valence).expect("valence bar");
    assert!((vb.rect.y1 - 3.5).abs() < 1e-4);
    assert_eq!(layout.overlays.len(), 1);
}

#[test]
fn gradient_fixture_emits_ramps() {
    let (_, figure) = render_fixture("gradients.yaml");
    assert!(figure.svg.contains("<linearGradient"));
    assert!(figure.svg.contains("Cu"));
}

#[test]
fn fade_fixture_uses_flat_colours_and_redox_lines() {
    let (_, figure) = render_fixture("fade.yaml");
    assert!(!figure.svg.contains("<linearGradient"));
    assert_eq!(figure.layout.hlines.len(), 2);
    assert_eq!(
        figure.layout.labels_with_role(LabelRole::Reference).count(),
        2
    );
}
