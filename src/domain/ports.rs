use crate::core::timeout::ProgressTracker;
use crate::domain::model::{AssemblyResult, CompressionMethod, IntakeResult, PackageOutput};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn exists(&self, path: &str) -> impl std::future::Future<Output = Result<bool>> + Send;
    fn resolve(&self, path: &str) -> PathBuf;
}

pub trait ConfigProvider: Send + Sync {
    fn upload_dir(&self) -> &Path;
    fn output_dir(&self) -> &Path;
    fn ghostscript_bin(&self) -> &str;
    fn smallpdf_api_key(&self) -> Option<&str>;
    fn smallpdf_base_url(&self) -> &str;
    fn generation_timeout(&self) -> Duration;
}

/// 單一壓縮層級
#[async_trait]
pub trait CompressionTier: Send + Sync {
    fn method(&self) -> CompressionMethod;
    async fn compress(&self, input: &Path, output: &Path) -> Result<()>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self, progress: &mut ProgressTracker) -> Result<IntakeResult>;
    async fn transform(
        &self,
        intake: IntakeResult,
        progress: &mut ProgressTracker,
    ) -> Result<AssemblyResult>;
    async fn load(
        &self,
        assembly: AssemblyResult,
        progress: &mut ProgressTracker,
    ) -> Result<PackageOutput>;
}
