//! CLI argument parsing using clap.

use clap::{
    CommandFactory, Parser,
    builder::styling::{AnsiColor, Effects, Styles},
    error::ErrorKind,
};
use std::path::PathBuf;

use crate::config::{MappingConfig, Settings};

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Mirror directories as they change
#[derive(Parser, Debug)]
#[command(
    name = "dirmirror",
    version = env!("CARGO_PKG_VERSION"),
    about = "Mirror source directories into destination directories",
    long_about = "Watch SOURCE and replicate every added, changed or removed entry into \
                  DESTINATION. Without positional arguments the mappings listed in the \
                  configuration file are mirrored.",
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Source directory to watch
    #[arg(value_name = "SOURCE")]
    pub source: Option<PathBuf>,

    /// Directory that receives the mirrored entries
    #[arg(value_name = "DESTINATION")]
    pub destination: Option<PathBuf>,

    /// Path to a settings file (default: ./dirmirror.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Also mirror hidden entries for the SOURCE/DESTINATION pair
    #[arg(long)]
    pub include_hidden: bool,

    /// Milliseconds a path must be quiet before it is copied (overrides config)
    #[arg(long, value_name = "MS")]
    pub debounce_ms: Option<u64>,

    /// Copy existing entries once and exit without watching
    #[arg(long)]
    pub once: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    pub print_config: bool,
}

impl Cli {
    /// Layer command-line values over loaded settings.
    ///
    /// A SOURCE/DESTINATION pair replaces the configured mappings and excludes
    /// hidden entries unless `--include-hidden` is given.
    pub fn apply_overrides(&self, settings: &mut Settings) -> Result<(), clap::Error> {
        if let Some(ms) = self.debounce_ms {
            settings.debounce_ms = ms;
        }

        match (&self.source, &self.destination) {
            (Some(source), Some(destination)) => {
                settings.mappings = vec![MappingConfig {
                    source: source.clone(),
                    destination: destination.clone(),
                    exclude_hidden: !self.include_hidden,
                }];
                Ok(())
            }
            (Some(_), None) => Err(usage_error(
                "the following required arguments were not provided:\n  <DESTINATION>",
            )),
            (None, _) if settings.mappings.is_empty() && !self.print_config => Err(usage_error(
                "the following required arguments were not provided:\n  <SOURCE> <DESTINATION>\n\n\
                 (or list [[mappings]] in the configuration file)",
            )),
            (None, _) => Ok(()),
        }
    }
}

fn usage_error(message: &str) -> clap::Error {
    Cli::command().error(ErrorKind::MissingRequiredArgument, message)
}
