use crate::config::AppConfig;
use crate::domain::model::PackageOptions;
use crate::server::DEFAULT_HEALTH_URL;
use crate::utils::error::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "visa-exhibit-generator")]
#[command(about = "Builds numbered visa exhibit packages from PDF evidence")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, env = "EXHIBIT_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the HTTP service (default)
    Serve {
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Build a package from local files and exit
    Build(BuildArgs),
    /// Probe the health endpoint, exit 1 on failure
    Healthcheck {
        #[arg(long, default_value = DEFAULT_HEALTH_URL)]
        url: String,
        #[arg(long, default_value = "10")]
        timeout_secs: u64,
    },
    /// Report Ghostscript availability and the effective configuration
    Doctor,
}

#[derive(Debug, Clone, Args)]
pub struct BuildArgs {
    /// PDF files or ZIP archives
    #[arg(short, long = "input", required = true, num_args = 1..)]
    pub inputs: Vec<PathBuf>,

    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    #[arg(long, default_value = "O-1A")]
    pub visa_type: String,

    #[arg(long, default_value = "letters")]
    pub numbering: String,

    #[arg(long)]
    pub quality: Option<String>,

    #[arg(long)]
    pub no_compression: bool,

    #[arg(long)]
    pub no_toc: bool,

    #[arg(long)]
    pub no_merge: bool,

    #[arg(long)]
    pub no_classification: bool,

    #[arg(long)]
    pub beneficiary: Option<String>,

    #[arg(long)]
    pub case_name: Option<String>,
}

impl BuildArgs {
    pub fn package_options(&self, config: &AppConfig) -> Result<PackageOptions> {
        let quality_preset = match &self.quality {
            Some(q) => q.parse()?,
            None => config.processing.quality_preset,
        };

        Ok(PackageOptions {
            visa_type: self.visa_type.parse()?,
            numbering_style: self.numbering.parse()?,
            enable_compression: config.processing.enable_compression && !self.no_compression,
            quality_preset,
            enable_classification: config.processing.enable_classification
                && !self.no_classification,
            add_toc: !self.no_toc,
            merge_pdfs: !self.no_merge,
            beneficiary_name: self.beneficiary.clone(),
            case_name: self.case_name.clone(),
        })
    }
}

impl CliConfig {
    /// 命令列參數覆蓋設定
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if self.verbose {
            config.logging.verbose = true;
        }

        match &self.command {
            Some(Command::Serve { address, port }) => {
                if let Some(address) = address {
                    config.server.address = address.clone();
                }
                if let Some(port) = port {
                    config.server.port = *port;
                }
            }
            Some(Command::Build(args)) => {
                if let Some(dir) = &args.output_dir {
                    config.storage.output_dir = dir.clone();
                }
            }
            _ => {}
        }
    }
}
