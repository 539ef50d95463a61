pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;

pub use adapters::{LocalStorage, Workspace};
pub use app::PackageService;
pub use config::AppConfig;
pub use core::{etl::PackageEngine, pipeline::ExhibitPipeline};
pub use utils::error::{ExhibitError, Result};
