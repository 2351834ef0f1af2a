//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Export listing details and a preview image for a model page URL.
#[derive(Parser, Debug, Clone)]
#[command(name = "vincenzo", version, about = "Model listing details exporter")]
pub struct Cli {
    /// Model page URL, e.g. https://civitai.com/models/1994924/name
    pub url: String,

    /// Config file path (defaults to the user config directory)
    #[arg(long, env = "VINCENZO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory receiving the report and preview image
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Resolve and print only, without writing files
    #[arg(long)]
    pub no_save: bool,

    /// Do not print the resolved fields
    #[arg(long, short = 'q')]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    pub verbose: bool,
}
