#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::core::ConfigProvider;
use crate::domain::model::QualityPreset;
use crate::utils::error::{ExhibitError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_range,
    validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app_name: String,
    pub app_version: String,
    pub debug: bool,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub processing: ProcessingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
    pub headless: bool,
    pub enable_cors: bool,
    pub enable_xsrf_protection: bool,
    pub gather_usage_stats: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    pub max_upload_size_mb: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub enable_compression: bool,
    pub quality_preset: QualityPreset,
    pub enable_classification: bool,
    pub ghostscript_bin: String,
    pub generation_timeout_secs: u64,
    pub smallpdf_api_key: Option<String>,
    pub smallpdf_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: String,
    pub verbose: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "Visa Exhibit Generator".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            debug: false,
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            processing: ProcessingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 8080,
            headless: true,
            enable_cors: false,
            enable_xsrf_protection: true,
            gather_usage_stats: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("/tmp/uploads"),
            output_dir: PathBuf::from("/tmp/outputs"),
            max_upload_size_mb: 100,
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            enable_compression: true,
            quality_preset: QualityPreset::High,
            enable_classification: true,
            ghostscript_bin: "gs".to_string(),
            generation_timeout_secs: 300,
            smallpdf_api_key: None,
            smallpdf_base_url: "https://api.smallpdf.com/v2".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: "text".to_string(),
            verbose: false,
        }
    }
}

fn parse_bool(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ExhibitError::InvalidConfigValueError {
            field: field.to_string(),
            value: value.to_string(),
            reason: "Expected a number".to_string(),
        })
}

impl AppConfig {
    /// 套用環境變數覆蓋
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("APP_NAME") {
            self.app_name = v;
        }
        if let Some(v) = lookup("APP_VERSION") {
            self.app_version = v;
        }
        if let Some(v) = lookup("DEBUG") {
            self.debug = parse_bool(&v);
        }

        // 伺服器
        if let Some(v) = lookup("APP_SERVER_ADDRESS") {
            self.server.address = v;
        }
        if let Some(v) = lookup("APP_SERVER_PORT") {
            self.server.port = parse_number("APP_SERVER_PORT", &v)?;
        }
        if let Some(v) = lookup("APP_SERVER_HEADLESS") {
            self.server.headless = parse_bool(&v);
        }
        if let Some(v) = lookup("ENABLE_CORS") {
            self.server.enable_cors = parse_bool(&v);
        }
        if let Some(v) = lookup("ENABLE_XSRF_PROTECTION") {
            self.server.enable_xsrf_protection = parse_bool(&v);
        }
        if let Some(v) = lookup("GATHER_USAGE_STATS") {
            self.server.gather_usage_stats = parse_bool(&v);
        }

        // 儲存
        if let Some(v) = lookup("UPLOAD_DIR") {
            self.storage.upload_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("OUTPUT_DIR") {
            self.storage.output_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("MAX_UPLOAD_SIZE_MB") {
            self.storage.max_upload_size_mb = parse_number("MAX_UPLOAD_SIZE_MB", &v)?;
        }

        // 處理
        if let Some(v) = lookup("ENABLE_COMPRESSION") {
            self.processing.enable_compression = parse_bool(&v);
        }
        if let Some(v) = lookup("QUALITY_PRESET") {
            self.processing.quality_preset = v.parse()?;
        }
        if let Some(v) = lookup("ENABLE_CLASSIFICATION") {
            self.processing.enable_classification = parse_bool(&v);
        }
        if let Some(v) = lookup("GHOSTSCRIPT_BIN") {
            self.processing.ghostscript_bin = v;
        }
        if let Some(v) = lookup("GENERATION_TIMEOUT_SECS") {
            self.processing.generation_timeout_secs =
                parse_number("GENERATION_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("SMALLPDF_API_KEY") {
            self.processing.smallpdf_api_key = Some(v).filter(|k| !k.trim().is_empty());
        }
        if let Some(v) = lookup("SMALLPDF_BASE_URL") {
            self.processing.smallpdf_base_url = v;
        }

        if let Some(v) = lookup("LOG_FORMAT") {
            self.logging.format = v;
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.address, self.server.port)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.storage.max_upload_size_mb * 1024 * 1024
    }

    /// 對外公開的設定摘要，不含任何金鑰
    pub fn public_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "app_name": self.app_name,
            "app_version": self.app_version,
            "debug": self.debug,
            "server_address": self.bind_address(),
            "max_upload_size_mb": self.storage.max_upload_size_mb,
            "enable_compression": self.processing.enable_compression,
            "quality_preset": self.processing.quality_preset,
            "enable_classification": self.processing.enable_classification,
            "generation_timeout_secs": self.processing.generation_timeout_secs,
            "enable_cors": self.server.enable_cors,
            "enable_xsrf_protection": self.server.enable_xsrf_protection,
            "headless": self.server.headless,
            "gather_usage_stats": self.server.gather_usage_stats,
            "has_smallpdf_key": self.processing.smallpdf_api_key.is_some(),
        })
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("server.address", &self.server.address)?;
        validate_positive_number("server.port", self.server.port as usize, 1)?;

        validate_path(
            "storage.upload_dir",
            &self.storage.upload_dir.to_string_lossy(),
        )?;
        validate_path(
            "storage.output_dir",
            &self.storage.output_dir.to_string_lossy(),
        )?;
        validate_range(
            "storage.max_upload_size_mb",
            self.storage.max_upload_size_mb,
            1,
            2048,
        )?;

        validate_non_empty_string("processing.ghostscript_bin", &self.processing.ghostscript_bin)?;
        // 臨界點在期限前 30 秒
        if self.processing.generation_timeout_secs <= 30 {
            return Err(ExhibitError::InvalidConfigValueError {
                field: "processing.generation_timeout_secs".to_string(),
                value: self.processing.generation_timeout_secs.to_string(),
                reason: "Timeout must be greater than 30 seconds".to_string(),
            });
        }
        validate_url(
            "processing.smallpdf_base_url",
            &self.processing.smallpdf_base_url,
        )?;

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }
}

impl ConfigProvider for AppConfig {
    fn upload_dir(&self) -> &Path {
        &self.storage.upload_dir
    }

    fn output_dir(&self) -> &Path {
        &self.storage.output_dir
    }

    fn ghostscript_bin(&self) -> &str {
        &self.processing.ghostscript_bin
    }

    fn smallpdf_api_key(&self) -> Option<&str> {
        self.processing.smallpdf_api_key.as_deref()
    }

    fn smallpdf_base_url(&self) -> &str {
        &self.processing.smallpdf_base_url
    }

    fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.processing.generation_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_container() {
        let config = AppConfig::default();
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.storage.upload_dir, PathBuf::from("/tmp/uploads"));
        assert_eq!(config.storage.output_dir, PathBuf::from("/tmp/outputs"));
        assert!(!config.server.enable_cors);
        assert!(config.server.enable_xsrf_protection);
        assert!(!config.server.gather_usage_stats);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env_from(lookup_from(&[
                ("APP_SERVER_PORT", "9000"),
                ("ENABLE_COMPRESSION", "FALSE"),
                ("ENABLE_CLASSIFICATION", "yes"),
                ("QUALITY_PRESET", "balanced"),
                ("SMALLPDF_API_KEY", "  "),
                ("UPLOAD_DIR", "/data/in"),
                ("APP_SERVER_HEADLESS", "false"),
                ("GATHER_USAGE_STATS", "true"),
            ]))
            .unwrap();

        assert_eq!(config.server.port, 9000);
        assert!(!config.processing.enable_compression);
        // 只有 "true" 視為真
        assert!(!config.processing.enable_classification);
        assert_eq!(config.processing.quality_preset, QualityPreset::Balanced);
        assert!(config.processing.smallpdf_api_key.is_none());
        assert_eq!(config.storage.upload_dir, PathBuf::from("/data/in"));
        assert!(!config.server.headless);
        assert!(config.server.gather_usage_stats);
        assert_eq!(config.public_summary()["gather_usage_stats"], true);
    }

    #[test]
    fn test_invalid_port_env_is_rejected() {
        let mut config = AppConfig::default();
        let result = config.apply_env_from(lookup_from(&[("APP_SERVER_PORT", "http")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_short_timeout_fails_validation() {
        let mut config = AppConfig::default();
        config.processing.generation_timeout_secs = 30;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_public_summary_hides_secrets() {
        let mut config = AppConfig::default();
        config.processing.smallpdf_api_key = Some("secret-key".to_string());
        let summary = config.public_summary();
        assert_eq!(summary["has_smallpdf_key"], true);
        assert_eq!(summary["headless"], true);
        assert_eq!(summary["gather_usage_stats"], false);
        assert!(!summary.to_string().contains("secret-key"));
    }
}
