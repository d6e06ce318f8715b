use crate::text_metrics;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Size of sub- and superscript runs relative to the label size.
pub const SCRIPT_SCALE: f32 = 0.7;
/// Baseline shift of a superscript run, as a fraction of the label size.
pub const SUPER_SHIFT: f32 = 0.35;
/// Baseline drop of a subscript run, as a fraction of the label size.
pub const SUB_SHIFT: f32 = 0.2;

const FAST_ASCENT: f32 = 0.94;
const FAST_DESCENT: f32 = 0.23;

static SCRIPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$([_^])\{?([^${}]*)\}?\$").expect("valid script regex"));

/// Rendered size of a label in points. `descent` is the part below the
/// baseline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TextExtent {
    pub width: f32,
    pub height: f32,
    pub descent: f32,
}

impl TextExtent {
    pub fn ascent(&self) -> f32 {
        self.height - self.descent
    }
}

/// Text measurement independent of drawing. Layout measures first and
/// places afterwards.
pub trait TextMeasure {
    fn measure_text(&self, text: &str, size: f32, font_family: &str) -> TextExtent;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Script {
    Normal,
    Sub,
    Super,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextRun {
    pub text: String,
    pub script: Script,
}

/// Splits `TiO$_2$` style markup into runs. Anything that is not a
/// `$_x$`/`$^x$` group is kept verbatim.
pub fn parse_markup(text: &str) -> Vec<TextRun> {
    let mut runs = Vec::new();
    let mut last = 0;
    for caps in SCRIPT_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        push_run(&mut runs, &text[last..whole.start()], Script::Normal);
        let script = if &caps[1] == "_" {
            Script::Sub
        } else {
            Script::Super
        };
        push_run(&mut runs, &caps[2], script);
        last = whole.end();
    }
    push_run(&mut runs, &text[last..], Script::Normal);
    runs
}

fn push_run(runs: &mut Vec<TextRun>, text: &str, script: Script) {
    if text.is_empty() {
        return;
    }
    if let Some(prev) = runs.last_mut()
        && prev.script == script
    {
        prev.text.push_str(text);
        return;
    }
    runs.push(TextRun {
        text: text.to_string(),
        script,
    });
}

/// Label text with the markup removed.
pub fn plain_text(text: &str) -> String {
    parse_markup(text).into_iter().map(|run| run.text).collect()
}

/// Estimates extents from per-character width factors. Deterministic, so
/// tests and the layout dump do not depend on installed fonts.
#[derive(Debug, Clone, Copy, Default)]
pub struct FastTextMeasure;

impl TextMeasure for FastTextMeasure {
    fn measure_text(&self, text: &str, size: f32, _font_family: &str) -> TextExtent {
        measure_runs(text, size, |run, run_size| {
            (
                fallback_text_width(run, run_size),
                run_size * FAST_ASCENT,
                run_size * FAST_DESCENT,
            )
        })
    }
}

/// Measures with installed fonts through `fontdb`, falling back to the
/// width table when no family in the chain is installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemFontMeasure;

impl TextMeasure for SystemFontMeasure {
    fn measure_text(&self, text: &str, size: f32, font_family: &str) -> TextExtent {
        measure_runs(text, size, |run, run_size| {
            match text_metrics::measure_line(run, run_size, font_family) {
                Some(metrics) => (metrics.width, metrics.ascent, metrics.descent),
                None => (
                    fallback_text_width(run, run_size),
                    run_size * FAST_ASCENT,
                    run_size * FAST_DESCENT,
                ),
            }
        })
    }
}

/// Combines per-run `(width, ascent, descent)` into one extent, applying
/// script scaling and baseline shifts.
fn measure_runs(
    text: &str,
    size: f32,
    mut measure: impl FnMut(&str, f32) -> (f32, f32, f32),
) -> TextExtent {
    if size <= 0.0 {
        return TextExtent::default();
    }
    let (_, base_ascent, base_descent) = measure("", size);
    let mut width = 0.0f32;
    let mut ascent = base_ascent;
    let mut descent = base_descent;
    for run in parse_markup(text) {
        match run.script {
            Script::Normal => {
                let (w, a, d) = measure(&run.text, size);
                width += w;
                ascent = ascent.max(a);
                descent = descent.max(d);
            }
            Script::Super => {
                let (w, a, _) = measure(&run.text, size * SCRIPT_SCALE);
                width += w;
                ascent = ascent.max(size * SUPER_SHIFT + a);
            }
            Script::Sub => {
                let (w, _, d) = measure(&run.text, size * SCRIPT_SCALE);
                width += w;
                descent = descent.max(size * SUB_SHIFT + d);
            }
        }
    }
    TextExtent {
        width,
        height: ascent + descent,
        descent,
    }
}

pub(crate) fn fallback_text_width(text: &str, font_size: f32) -> f32 {
    text.chars().map(char_width_factor).sum::<f32>() * font_size
}

pub(crate) fn char_width_factor(ch: char) -> f32 {
    // Advance widths of a Helvetica-like sans-serif, in ems.
    match ch {
        ' ' => 0.278,
        '.' | ',' | ':' | ';' | '|' | '!' | 'i' | 'j' | 'l' => 0.222,
        '(' | ')' | '[' | ']' | '{' | '}' | '/' | '\\' | 'f' | 't' => 0.278,
        '-' | 'r' => 0.333,
        '+' | '=' | '<' | '>' | '\u{2212}' => 0.584,
        'A' | 'B' | 'E' | 'K' | 'P' | 'S' | 'V' | 'X' | 'Y' => 0.667,
        'C' | 'D' | 'H' | 'N' | 'R' | 'U' => 0.722,
        'F' | 'T' | 'Z' => 0.611,
        'G' | 'O' | 'Q' => 0.778,
        'I' => 0.278,
        'J' | 'c' | 'k' | 's' | 'v' | 'x' | 'y' | 'z' => 0.5,
        'L' => 0.556,
        'M' => 0.833,
        'W' => 0.944,
        'm' => 0.833,
        'w' => 0.722,
        'a' | 'b' | 'd' | 'e' | 'g' | 'h' | 'n' | 'o' | 'p' | 'q' | 'u' => 0.556,
        '0'..='9' => 0.556,
        '%' => 0.889,
        '@' => 1.015,
        '#' | '$' | '&' => 0.667,
        _ => 0.584,
    }
}
