use crate::config::AppConfig;
use crate::utils::error::{ExhibitError, Result};
use regex::Regex;
use std::path::Path;

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ExhibitError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置，未列出的欄位使用預設值
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ExhibitError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 預設值 <- 設定檔 <- 環境變數
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                tracing::info!("📁 Loading configuration from: {}", path.display());
                Self::from_file(path)?
            }
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }
}

/// 替換環境變數 (例如 ${SMALLPDF_API_KEY})，找不到的變數保留原文
pub fn substitute_env_vars(content: &str) -> Result<String> {
    substitute_vars_with(content, |name| std::env::var(name).ok())
}

pub fn substitute_vars_with<F>(content: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ExhibitError::ConfigError {
        message: format!("Invalid substitution pattern: {}", e),
    })?;

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        lookup(var_name).unwrap_or_else(|| format!("${{{}}}", var_name))
    });

    Ok(result.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::QualityPreset;
    use crate::utils::validation::Validate;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_partial_toml_config() {
        let toml_content = r#"
app_name = "Exhibit Desk"

[server]
port = 8501

[processing]
quality_preset = "maximum"
generation_timeout_secs = 120
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.app_name, "Exhibit Desk");
        assert_eq!(config.server.port, 8501);
        assert_eq!(config.server.address, "0.0.0.0");
        assert_eq!(config.processing.quality_preset, QualityPreset::Maximum);
        assert_eq!(config.storage.output_dir, PathBuf::from("/tmp/outputs"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_var_substitution_keeps_unknown_variables() {
        let content = "key = \"${KNOWN}\"\nother = \"${UNKNOWN_VAR}\"";
        let result = substitute_vars_with(content, |name| {
            (name == "KNOWN").then(|| "value".to_string())
        })
        .unwrap();

        assert!(result.contains("key = \"value\""));
        assert!(result.contains("${UNKNOWN_VAR}"));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = AppConfig::from_toml_str("[server\nport = ").unwrap_err();
        assert!(matches!(err, ExhibitError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let toml_content = r#"
[storage]
upload_dir = "/srv/uploads"
output_dir = "/srv/outputs"
max_upload_size_mb = 25
"#;

        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = AppConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.storage.upload_dir, PathBuf::from("/srv/uploads"));
        assert_eq!(config.max_upload_bytes(), 25 * 1024 * 1024);
    }
}
