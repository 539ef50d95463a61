use crate::adapters::{JobDirs, Workspace};
use crate::config::AppConfig;
use crate::core::compress::PdfCompressor;
use crate::core::etl::PackageEngine;
use crate::core::pipeline::{remove_work_dir, ExhibitPipeline};
use crate::core::{ConfigProvider, PackageOptions, PackageReport, Storage};
use crate::utils::error::Result;
use std::path::PathBuf;

pub const REPORT_FILE: &str = "package_report.json";

/// 把工作目錄、壓縮器與引擎組合成一次套件產生
#[derive(Debug, Clone)]
pub struct PackageService {
    config: AppConfig,
    workspace: Workspace,
    monitor: bool,
}

impl PackageService {
    pub fn new(config: AppConfig) -> Self {
        let workspace = Workspace::new(config.upload_dir(), config.output_dir());
        Self {
            config,
            workspace,
            monitor: false,
        }
    }

    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor = enabled;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub async fn prepare(&self) -> Result<()> {
        self.workspace.prepare().await
    }

    /// 以設定檔的處理選項為預設值
    pub fn default_options(&self) -> PackageOptions {
        PackageOptions {
            enable_compression: self.config.processing.enable_compression,
            quality_preset: self.config.processing.quality_preset,
            enable_classification: self.config.processing.enable_classification,
            ..PackageOptions::default()
        }
    }

    /// 以 job 目錄執行，完成後清除上傳與中間檔
    pub async fn build_job(
        &self,
        job: &JobDirs,
        inputs: Vec<PathBuf>,
        options: PackageOptions,
    ) -> Result<PackageReport> {
        let compressor = if options.enable_compression {
            Some(PdfCompressor::from_config(&self.config, options.quality_preset).await)
        } else {
            None
        };

        let work_dir = job.input_dir.join(".work");
        let visa_type = options.visa_type;
        let pipeline = ExhibitPipeline::new(inputs, &work_dir, job.output_storage(), options)
            .with_compressor(compressor)
            .with_extract_limit(self.config.max_upload_bytes() as u64);
        let engine =
            PackageEngine::new_with_monitoring(pipeline, self.config.generation_timeout(), self.monitor);

        let result = engine.run(job.id, visa_type).await;

        if let Err(e) = remove_work_dir(&work_dir).await {
            tracing::warn!("⚠️ Could not clean work directory {}: {}", work_dir.display(), e);
        }

        let report = result?;
        let json = serde_json::to_vec_pretty(&report)?;
        job.output_storage().write_file(REPORT_FILE, &json).await?;
        Ok(report)
    }

    /// 本機檔案直接產生套件 (CLI)
    pub async fn build_from_paths(&self, inputs: Vec<PathBuf>, options: PackageOptions) -> Result<PackageReport> {
        let job = self.workspace.create_job().await?;
        let result = self.build_job(&job, inputs, options).await;
        if let Err(e) = self.workspace.remove_job_inputs(&job).await {
            tracing::warn!("⚠️ Could not remove job inputs for {}: {}", job.id, e);
        }
        result
    }

    /// 從磁碟讀回先前的報告
    pub async fn load_report(&self, job: &JobDirs) -> Result<Option<PackageReport>> {
        let storage = job.output_storage();
        if !storage.exists(REPORT_FILE).await? {
            return Ok(None);
        }
        let data = storage.read_file(REPORT_FILE).await?;
        Ok(Some(serde_json::from_slice(&data)?))
    }
}
