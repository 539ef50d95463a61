use crate::utils::error::{ExhibitError, Result};
use std::path::{Component, Path};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(ExhibitError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(ExhibitError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(ExhibitError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(ExhibitError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(ExhibitError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(ExhibitError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ExhibitError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(ExhibitError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// 上傳的檔名只允許單一路徑段
pub fn sanitize_file_name(raw: &str) -> Result<String> {
    let candidate = raw.rsplit(['/', '\\']).next().unwrap_or("").trim();

    if candidate.is_empty() || candidate == "." || candidate == ".." {
        return Err(ExhibitError::validation(format!(
            "Invalid file name: '{}'",
            raw
        )));
    }

    if candidate.contains('\0') {
        return Err(ExhibitError::SecurityError {
            message: format!("Null byte in file name: {}", raw),
        });
    }

    Ok(candidate.to_string())
}

/// 壓縮檔內的路徑不可為絕對路徑或跳出解壓目錄
pub fn validate_archive_entry(name: &str) -> Result<()> {
    if name.starts_with('/') || name.starts_with('\\') {
        return Err(ExhibitError::SecurityError {
            message: format!("Absolute path in ZIP: {}", name),
        });
    }

    if name.contains("..") {
        return Err(ExhibitError::SecurityError {
            message: format!("Path traversal in ZIP: {}", name),
        });
    }

    let normalized = Path::new(name);
    let escapes = normalized.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return Err(ExhibitError::SecurityError {
            message: format!("Unsafe path in ZIP: {}", name),
        });
    }

    Ok(())
}

pub fn validate_job_id(job_id: &str) -> Result<uuid::Uuid> {
    uuid::Uuid::parse_str(job_id)
        .map_err(|_| ExhibitError::not_found(format!("Unknown package id: {}", job_id)))
}
