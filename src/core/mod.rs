pub mod classify;
pub mod compress;
pub mod etl;
pub mod intake;
pub mod numbering;
pub mod pdf;
pub mod pipeline;
pub mod timeout;

pub use crate::domain::model::{Exhibit, PackageOptions, PackageReport};
pub use crate::domain::ports::{CompressionTier, ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
