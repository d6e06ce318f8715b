use std::path::PathBuf;
use thiserror::Error;

/// Invalid combinations of command line flags. Detected before any input is
/// read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgsError {
    #[error("no arguments specified")]
    NoInput,
    #[error("filename and name/ip/ea/band-gap/cbo/vbo specified simultaneously")]
    FileAndInline,
    #[error("cbo and vbo specified simultaneously")]
    CboAndVbo,
    #[error("ip/ea and band-gap/cbo/vbo specified simultaneously")]
    MixedInline,
    #[error("--name, --ip and --ea flags must be specified concurrently")]
    IncompleteVacuum,
    #[error("--name, --band-gap and --cbo or --vbo flags must be specified concurrently")]
    IncompleteOffset,
    #[error("cannot infer output format from '{0}' (use --format svg|png|pdf)")]
    UnknownFormat(String),
}

/// Problems with the dataset or its settings. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path} (line {line}): {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
    #[error("no compounds specified")]
    Empty,
    #[error("compound '{compound}' is missing required field '{field}'")]
    MissingField {
        compound: String,
        field: &'static str,
    },
    #[error("compound '{0}' has both ip/ea and band_gap/vbo/cbo fields")]
    ConflictingFields(String),
    #[error(
        "compounds '{first}' and '{other}' use different alignments; \
         all compounds must give either ip/ea or band_gap with vbo/cbo"
    )]
    MixedAlignment { first: String, other: String },
    #[error("compound '{compound}' has a non-finite {field}")]
    NonFinite {
        compound: String,
        field: &'static str,
    },
    #[error("unknown gradient id '{0}'")]
    UnknownGradient(String),
    #[error("invalid gradient reference '{0}'")]
    InvalidGradientRef(String),
    #[error("invalid colour '{0}'")]
    InvalidColour(String),
    #[error("invalid number '{value}' in --{flag}")]
    InvalidNumber { flag: &'static str, value: String },
    #[error("--{flag} has {found} entries but {expected} names were given")]
    LengthMismatch {
        flag: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("invalid energy range: emin {emin} must be below emax {emax}")]
    InvalidRange { emin: f32, emax: f32 },
    #[error("invalid setting {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },
}
