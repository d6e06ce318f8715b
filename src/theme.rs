use crate::gradient::{Gradient, Rgba};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::Arc;

/// Fonts tried after the user's `font` setting, before the generic family.
pub const DEFAULT_FONTS: [&str; 6] = [
    "Whitney Pro",
    "Helvetica",
    "Arial",
    "Whitney Book",
    "Liberation Sans",
    "Andale Sans",
];

pub const DEFAULT_VB_COLOUR: Rgba = Rgba::rgb(0x21, 0x9e, 0xbc);
pub const DEFAULT_CB_COLOUR: Rgba = Rgba::rgb(0xfb, 0x85, 0x00);

/// Valence band ramp, dark to light blue.
pub static DEFAULT_VB_GRADIENT: Lazy<Arc<Gradient>> = Lazy::new(|| {
    Arc::new(Gradient::new(
        "vb",
        Rgba::rgb(23, 71, 158),
        Rgba::rgb(174, 198, 242),
    ))
});

/// Conduction band ramp, dark to light orange.
pub static DEFAULT_CB_GRADIENT: Lazy<Arc<Gradient>> = Lazy::new(|| {
    Arc::new(Gradient::new(
        "cb",
        Rgba::rgb(247, 148, 51),
        Rgba::rgb(251, 216, 181),
    ))
});

#[derive(Debug, Clone, Serialize)]
pub struct Theme {
    pub font_family: String,
    pub tick_label_size: f32,
    pub tick_size: f32,
    pub line_width: f32,
    pub text_color: Rgba,
    pub edge_color: Rgba,
    pub faded_edge_color: Rgba,
    pub fade_overlay: Rgba,
    pub reference_line_color: Rgba,
    pub background: Rgba,
}

impl Theme {
    /// Publication defaults: thin black outlines, inward ticks, sans-serif
    /// fallback chain.
    pub fn publication() -> Self {
        Self {
            font_family: font_family_chain(None),
            tick_label_size: 15.0,
            tick_size: 5.0,
            line_width: 1.0,
            text_color: Rgba::BLACK,
            edge_color: Rgba::BLACK,
            faded_edge_color: Rgba::rgb(0x80, 0x80, 0x80),
            fade_overlay: Rgba::WHITE.with_alpha(128),
            reference_line_color: Rgba::rgb(0x80, 0x80, 0x80),
            background: Rgba::WHITE,
        }
    }

    pub fn with_font(mut self, font: Option<&str>) -> Self {
        self.font_family = font_family_chain(font);
        self
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::publication()
    }
}

/// Builds a CSS font-family list: preferred font, the default chain, then
/// `sans-serif`.
pub fn font_family_chain(preferred: Option<&str>) -> String {
    let mut families: Vec<String> = Vec::new();
    if let Some(font) = preferred.map(str::trim).filter(|f| !f.is_empty()) {
        families.push(quote_family(font));
    }
    for font in DEFAULT_FONTS {
        let quoted = quote_family(font);
        if !families.contains(&quoted) {
            families.push(quoted);
        }
    }
    families.push("sans-serif".to_string());
    families.join(", ")
}

fn quote_family(name: &str) -> String {
    if name.contains(' ') {
        format!("'{name}'")
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferred_font_leads_the_chain() {
        let chain = font_family_chain(Some("Fira Sans"));
        assert!(chain.starts_with("'Fira Sans', 'Whitney Pro'"));
        assert!(chain.ends_with("sans-serif"));
    }

    #[test]
    fn duplicate_font_is_not_repeated() {
        let chain = font_family_chain(Some("Arial"));
        assert_eq!(chain.matches("Arial").count(), 1);
    }

    #[test]
    fn default_palettes_are_shared() {
        let a = DEFAULT_VB_GRADIENT.clone();
        let b = DEFAULT_VB_GRADIENT.clone();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(DEFAULT_CB_GRADIENT.start(), Rgba::rgb(247, 148, 51));
    }
}
