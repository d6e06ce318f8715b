#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod diagram;
pub mod error;
pub mod gradient;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod render;
pub mod text_metrics;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, Settings, load_config, parse_config};
pub use diagram::{Figure, build_figure};
pub use error::{ArgsError, ConfigError};
pub use ir::{AlignmentMode, Compound, Dataset};
pub use layout::compute_layout;
pub use render::{OutputFormat, write_output};
pub use theme::Theme;
