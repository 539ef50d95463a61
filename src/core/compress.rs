use crate::domain::model::{CompressionMethod, CompressionOutcome, PresetSettings, QualityPreset};
use crate::domain::ports::{CompressionTier, ConfigProvider};
use crate::utils::error::{ExhibitError, Result};
use async_trait::async_trait;
use lopdf::Document;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

const SMALLPDF_TIMEOUT: Duration = Duration::from_secs(120);
const INEFFECTIVE_NOTE: &str = "Compression not effective for this file";

#[derive(Debug, Clone, PartialEq)]
pub struct GhostscriptCheck {
    pub available: bool,
    pub version: Option<String>,
    pub message: String,
}

/// 執行 `<bin> --version` 確認 Ghostscript 可用
pub async fn verify_ghostscript(bin: &str) -> GhostscriptCheck {
    match Command::new(bin).arg("--version").output().await {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
            GhostscriptCheck {
                available: true,
                message: format!("Ghostscript {} available", version),
                version: Some(version),
            }
        }
        Ok(output) => GhostscriptCheck {
            available: false,
            version: None,
            message: format!(
                "Ghostscript error: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => GhostscriptCheck {
            available: false,
            version: None,
            message: "Ghostscript not found. Install with: apt-get install ghostscript (Linux) or brew install ghostscript (Mac)".to_string(),
        },
        Err(e) => GhostscriptCheck {
            available: false,
            version: None,
            message: format!("Ghostscript check failed: {}", e),
        },
    }
}

pub fn ghostscript_args(settings: &PresetSettings, input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-sDEVICE=pdfwrite".to_string(),
        "-dCompatibilityLevel=1.4".to_string(),
        format!("-dPDFSETTINGS={}", settings.pdf_settings),
        format!("-dColorImageResolution={}", settings.color_dpi),
        format!("-dGrayImageResolution={}", settings.gray_dpi),
        format!("-dMonoImageResolution={}", settings.mono_dpi),
        "-dColorImageDownsampleType=/Bicubic".to_string(),
        "-dGrayImageDownsampleType=/Bicubic".to_string(),
        "-dDownsampleColorImages=true".to_string(),
        "-dDownsampleGrayImages=true".to_string(),
        "-dDownsampleMonoImages=false".to_string(),
        "-dCompressPages=true".to_string(),
        "-dOptimize=true".to_string(),
        "-dEmbedAllFonts=true".to_string(),
        "-dSubsetFonts=true".to_string(),
        "-dNOPAUSE".to_string(),
        "-dQUIET".to_string(),
        "-dBATCH".to_string(),
        format!("-sOutputFile={}", output.display()),
        input.display().to_string(),
    ]
}

/// Tier 1: Ghostscript pdfwrite
pub struct GhostscriptTier {
    bin: String,
    preset: QualityPreset,
}

impl GhostscriptTier {
    pub fn new(bin: impl Into<String>, preset: QualityPreset) -> Self {
        Self {
            bin: bin.into(),
            preset,
        }
    }
}

#[async_trait]
impl CompressionTier for GhostscriptTier {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Ghostscript
    }

    async fn compress(&self, input: &Path, output: &Path) -> Result<()> {
        let args = ghostscript_args(&self.preset.settings(), input, output);
        let result = Command::new(&self.bin).args(&args).output().await?;

        if !result.status.success() {
            return Err(ExhibitError::CompressionError {
                method: "ghostscript".to_string(),
                message: format!(
                    "Ghostscript failed: {}",
                    String::from_utf8_lossy(&result.stderr).trim()
                ),
            });
        }

        if !tokio::fs::try_exists(output).await? {
            return Err(ExhibitError::CompressionError {
                method: "ghostscript".to_string(),
                message: "Ghostscript did not create output file".to_string(),
            });
        }
        Ok(())
    }
}

/// Tier 2: 清除無用物件並重新壓縮 stream
pub struct StructuralTier;

#[async_trait]
impl CompressionTier for StructuralTier {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Structural
    }

    async fn compress(&self, input: &Path, output: &Path) -> Result<()> {
        let input = input.to_path_buf();
        let output = output.to_path_buf();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut doc = Document::load(&input)?;
            doc.prune_objects();
            doc.delete_zero_length_streams();
            doc.renumber_objects();
            doc.compress();
            doc.save(&output)?;
            Ok(())
        })
        .await
        .map_err(|e| ExhibitError::processing(format!("Structural compression task failed: {}", e)))?
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CompressResponse {
    files: Vec<CompressedFile>,
}

#[derive(Debug, Deserialize)]
struct CompressedFile {
    url: String,
}

/// Tier 3: SmallPDF API，只在有 API key 時啟用
pub struct SmallPdfTier {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SmallPdfTier {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl CompressionTier for SmallPdfTier {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::SmallPdf
    }

    async fn compress(&self, input: &Path, output: &Path) -> Result<()> {
        let data = tokio::fs::read(input).await?;
        let file_name = input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "document.pdf".to_string());

        let part = Part::bytes(data).file_name(file_name).mime_str("application/pdf")?;
        let upload: UploadResponse = self
            .client
            .post(format!("{}/files", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(Form::new().part("file", part))
            .timeout(SMALLPDF_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let compressed: CompressResponse = self
            .client
            .post(format!("{}/compress", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "files": [{ "id": upload.id }],
                "compression_level": "recommended",
            }))
            .timeout(SMALLPDF_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let download_url = compressed
            .files
            .first()
            .map(|f| f.url.clone())
            .ok_or_else(|| ExhibitError::CompressionError {
                method: "smallpdf".to_string(),
                message: "Compress response contained no files".to_string(),
            })?;

        let bytes = self
            .client
            .get(download_url)
            .timeout(SMALLPDF_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        tokio::fs::write(output, &bytes).await?;
        Ok(())
    }
}

pub fn format_bytes(size: u64) -> String {
    let mut value = size as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if value < 1024.0 {
            return format!("{:.1} {}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.1} TB", value)
}

/// `compressed_<name>`，與輸入同目錄
pub fn default_output_path(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    input.with_file_name(format!("compressed_{}", name))
}

fn reduction_percent(original: u64, compressed: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    let reduction = (1.0 - compressed as f64 / original as f64) * 100.0;
    (reduction * 100.0).round() / 100.0
}

/// 依序嘗試各壓縮層級，結果變大則換下一層
pub struct PdfCompressor {
    preset: QualityPreset,
    tiers: Vec<Box<dyn CompressionTier>>,
}

impl PdfCompressor {
    pub fn new(preset: QualityPreset, tiers: Vec<Box<dyn CompressionTier>>) -> Self {
        Self { preset, tiers }
    }

    /// 依設定組合可用的壓縮層級
    pub async fn from_config(config: &impl ConfigProvider, preset: QualityPreset) -> Self {
        let mut tiers: Vec<Box<dyn CompressionTier>> = Vec::new();

        let check = verify_ghostscript(config.ghostscript_bin()).await;
        if check.available {
            tiers.push(Box::new(GhostscriptTier::new(config.ghostscript_bin(), preset)));
        } else {
            tracing::warn!("⚠️ Skipping Ghostscript: {}", check.message);
        }

        tiers.push(Box::new(StructuralTier));

        if let Some(key) = config.smallpdf_api_key() {
            tiers.push(Box::new(SmallPdfTier::new(key, config.smallpdf_base_url())));
        }

        Self::new(preset, tiers)
    }

    pub fn preset(&self) -> QualityPreset {
        self.preset
    }

    pub fn methods(&self) -> Vec<CompressionMethod> {
        self.tiers.iter().map(|t| t.method()).collect()
    }

    pub async fn compress(&self, input: &Path, output: Option<&Path>) -> Result<CompressionOutcome> {
        if !tokio::fs::try_exists(input).await? {
            return Err(ExhibitError::not_found(format!(
                "Input file not found: {}",
                input.display()
            )));
        }

        let output = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_output_path(input));
        let original_size = tokio::fs::metadata(input).await?.len();
        let settings = self.preset.settings();

        tracing::info!(
            "🗜️ Compressing: {} ({})",
            input.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
            format_bytes(original_size)
        );
        tracing::debug!("Quality preset: {}", settings.name);

        for tier in &self.tiers {
            let method = tier.method();
            tracing::debug!("Attempting: {}", method);

            if let Err(e) = tier.compress(input, &output).await {
                tracing::warn!("❌ FAILED {}: {}", method, e);
                remove_attempt(input, &output).await;
                continue;
            }

            let compressed_size = match tokio::fs::metadata(&output).await {
                Ok(meta) => meta.len(),
                Err(e) => {
                    tracing::warn!("❌ {}: output missing ({})", method, e);
                    continue;
                }
            };

            if compressed_size > original_size {
                tracing::warn!("⚠️ {}: File got LARGER (negative compression)", method);
                remove_attempt(input, &output).await;
                continue;
            }

            let reduction = reduction_percent(original_size, compressed_size);
            if reduction < settings.min_reduction {
                tracing::info!(
                    "💡 {}: Only {:.1}% reduction (expected {}%+)",
                    method,
                    reduction,
                    settings.min_reduction
                );
            }
            tracing::info!("✅ SUCCESS with {}: {:.1}% reduction", method, reduction);

            return Ok(CompressionOutcome {
                output_path: output,
                original_size,
                compressed_size,
                reduction_percent: reduction,
                method,
                quality_preset: (method != CompressionMethod::SmallPdf).then_some(self.preset),
                note: None,
            });
        }

        tracing::warn!("⚠️ All compression methods failed - returning original file");
        Ok(CompressionOutcome {
            output_path: input.to_path_buf(),
            original_size,
            compressed_size: original_size,
            reduction_percent: 0.0,
            method: CompressionMethod::None,
            quality_preset: None,
            note: Some(INEFFECTIVE_NOTE.to_string()),
        })
    }

    /// 逐一壓縮並回報 (目前序號, 總數, 檔名)
    pub async fn compress_batch<F>(&self, paths: &[PathBuf], mut on_progress: F) -> Vec<Result<CompressionOutcome>>
    where
        F: FnMut(usize, usize, &str),
    {
        let total = paths.len();
        let mut results = Vec::with_capacity(total);

        for (i, path) in paths.iter().enumerate() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            on_progress(i + 1, total, &name);
            results.push(self.compress(path, None).await);
        }
        results
    }
}

async fn remove_attempt(input: &Path, output: &Path) {
    if output != input && tokio::fs::try_exists(output).await.unwrap_or(false) {
        if let Err(e) = tokio::fs::remove_file(output).await {
            tracing::debug!("Could not remove failed attempt {}: {}", output.display(), e);
        }
    }
}
