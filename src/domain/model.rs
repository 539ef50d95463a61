use crate::utils::error::ExhibitError;
use crate::utils::monitor::PhaseStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum VisaType {
    #[default]
    #[serde(rename = "O-1A")]
    O1A,
    #[serde(rename = "O-1B")]
    O1B,
    #[serde(rename = "O-2")]
    O2,
    #[serde(rename = "P-1A")]
    P1A,
    #[serde(rename = "P-1B")]
    P1B,
    #[serde(rename = "P-1S")]
    P1S,
    #[serde(rename = "EB-1A")]
    EB1A,
    #[serde(rename = "EB-1B")]
    EB1B,
    #[serde(rename = "EB-2 NIW")]
    EB2Niw,
}

impl VisaType {
    pub const ALL: [VisaType; 9] = [
        VisaType::O1A,
        VisaType::O1B,
        VisaType::O2,
        VisaType::P1A,
        VisaType::P1B,
        VisaType::P1S,
        VisaType::EB1A,
        VisaType::EB1B,
        VisaType::EB2Niw,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VisaType::O1A => "O-1A",
            VisaType::O1B => "O-1B",
            VisaType::O2 => "O-2",
            VisaType::P1A => "P-1A",
            VisaType::P1B => "P-1B",
            VisaType::P1S => "P-1S",
            VisaType::EB1A => "EB-1A",
            VisaType::EB1B => "EB-1B",
            VisaType::EB2Niw => "EB-2 NIW",
        }
    }
}

impl fmt::Display for VisaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisaType {
    type Err = ExhibitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        VisaType::ALL
            .iter()
            .copied()
            .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ExhibitError::InvalidConfigValueError {
                field: "visa_type".to_string(),
                value: s.to_string(),
                reason: format!(
                    "Unsupported visa type. Valid types: {}",
                    VisaType::ALL.map(|v| v.as_str()).join(", ")
                ),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NumberingStyle {
    #[default]
    Letters,
    Numbers,
    Roman,
}

impl FromStr for NumberingStyle {
    type Err = ExhibitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "letters" => Ok(NumberingStyle::Letters),
            "numbers" => Ok(NumberingStyle::Numbers),
            "roman" => Ok(NumberingStyle::Roman),
            _ => Err(ExhibitError::InvalidConfigValueError {
                field: "numbering_style".to_string(),
                value: s.to_string(),
                reason: "Valid styles: letters, numbers, roman".to_string(),
            }),
        }
    }
}

/// Ghostscript 參數組合
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresetSettings {
    pub name: &'static str,
    pub description: &'static str,
    pub pdf_settings: &'static str,
    pub color_dpi: u32,
    pub gray_dpi: u32,
    pub mono_dpi: u32,
    pub jpeg_quality: u32,
    pub min_reduction: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreset {
    #[default]
    High,
    Balanced,
    Maximum,
}

impl QualityPreset {
    pub fn settings(&self) -> PresetSettings {
        match self {
            QualityPreset::High => PresetSettings {
                name: "High Quality (USCIS Recommended)",
                description: "300 DPI text, 200 DPI images - Best for legal docs",
                pdf_settings: "/printer",
                color_dpi: 200,
                gray_dpi: 200,
                mono_dpi: 300,
                jpeg_quality: 85,
                min_reduction: 10.0,
            },
            QualityPreset::Balanced => PresetSettings {
                name: "Balanced",
                description: "150 DPI images, 300 DPI text - Good compression",
                pdf_settings: "/ebook",
                color_dpi: 150,
                gray_dpi: 150,
                mono_dpi: 300,
                jpeg_quality: 80,
                min_reduction: 20.0,
            },
            QualityPreset::Maximum => PresetSettings {
                name: "Maximum Compression",
                description: "100 DPI images - Smallest files (use with caution)",
                pdf_settings: "/screen",
                color_dpi: 100,
                gray_dpi: 100,
                mono_dpi: 200,
                jpeg_quality: 75,
                min_reduction: 30.0,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::High => "high",
            QualityPreset::Balanced => "balanced",
            QualityPreset::Maximum => "maximum",
        }
    }
}

impl FromStr for QualityPreset {
    type Err = ExhibitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(QualityPreset::High),
            "balanced" => Ok(QualityPreset::Balanced),
            "maximum" => Ok(QualityPreset::Maximum),
            _ => Err(ExhibitError::InvalidConfigValueError {
                field: "quality_preset".to_string(),
                value: s.to_string(),
                reason: "Valid presets: high, balanced, maximum".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageOptions {
    pub visa_type: VisaType,
    pub numbering_style: NumberingStyle,
    pub enable_compression: bool,
    pub quality_preset: QualityPreset,
    pub enable_classification: bool,
    pub add_toc: bool,
    pub merge_pdfs: bool,
    pub beneficiary_name: Option<String>,
    pub case_name: Option<String>,
}

impl Default for PackageOptions {
    fn default() -> Self {
        Self {
            visa_type: VisaType::default(),
            numbering_style: NumberingStyle::default(),
            enable_compression: true,
            quality_preset: QualityPreset::default(),
            enable_classification: true,
            add_toc: true,
            merge_pdfs: true,
            beneficiary_name: None,
            case_name: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub relative_path: String,
    pub page_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub file: String,
    pub reason: String,
}

impl SkippedFile {
    pub fn new(file: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMethod {
    Ghostscript,
    Structural,
    SmallPdf,
    None,
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompressionMethod::Ghostscript => "ghostscript",
            CompressionMethod::Structural => "structural",
            CompressionMethod::SmallPdf => "smallpdf",
            CompressionMethod::None => "none",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionOutcome {
    pub output_path: PathBuf,
    pub original_size: u64,
    pub compressed_size: u64,
    pub reduction_percent: f64,
    pub method: CompressionMethod,
    pub quality_preset: Option<QualityPreset>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub criterion_code: String,
    pub criterion_name: String,
    pub document_type: String,
    pub confidence: f64,
    pub reasoning: String,
    pub evidence_type: Option<String>,
    pub method: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exhibit {
    pub label: String,
    pub title: String,
    pub file_name: String,
    pub page_count: usize,
    pub output_path: PathBuf,
    pub covered: bool,
    pub compression: Option<CompressionOutcome>,
    pub classification: Option<Classification>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub name: String,
    pub status: StepStatus,
    pub progress: f64,
    pub error_message: Option<String>,
}

/// extract 階段輸出
#[derive(Debug, Clone, Default)]
pub struct IntakeResult {
    pub documents: Vec<SourceDocument>,
    pub skipped: Vec<SkippedFile>,
}

/// transform 階段輸出
#[derive(Debug, Clone, Default)]
pub struct AssemblyResult {
    pub exhibits: Vec<Exhibit>,
    pub skipped: Vec<SkippedFile>,
    pub failed: Vec<SkippedFile>,
    pub partial: bool,
    pub original_size: u64,
    pub compressed_size: u64,
}

/// load 階段輸出
#[derive(Debug, Clone)]
pub struct PackageOutput {
    pub exhibits: Vec<Exhibit>,
    pub skipped: Vec<SkippedFile>,
    pub partial: bool,
    pub original_size: u64,
    pub compressed_size: u64,
    pub total_pages: usize,
    pub output_file: PathBuf,
    pub manifest_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub visa_type: VisaType,
    pub exhibits: Vec<Exhibit>,
    pub skipped: Vec<SkippedFile>,
    pub total_pages: usize,
    pub original_size: u64,
    pub compressed_size: u64,
    pub output_file: PathBuf,
    pub manifest_file: PathBuf,
    pub steps: Vec<StepReport>,
    pub partial: bool,
    pub elapsed_seconds: f64,
    #[serde(default, skip_deserializing)]
    pub resource_stats: Vec<PhaseStats>,
}

impl PackageReport {
    pub fn average_reduction(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        (1.0 - self.compressed_size as f64 / self.original_size as f64) * 100.0
    }
}
