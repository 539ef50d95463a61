use crate::core::classify::{classify_document, suggested_title};
use crate::core::compress::PdfCompressor;
use crate::core::intake::{collect_inputs, DEFAULT_MAX_EXTRACT_BYTES};
use crate::core::numbering::exhibit_label;
use crate::core::pdf::{self, TocEntry, TocInfo};
use crate::core::timeout::{process_with_timeout, ProgressTracker};
use crate::core::{Pipeline, Storage};
use crate::domain::model::{
    AssemblyResult, Classification, CompressionOutcome, Exhibit, IntakeResult, PackageOptions,
    PackageOutput, SkippedFile, SourceDocument, VisaType,
};
use crate::utils::error::{ExhibitError, Result};
use chrono::{DateTime, Local};
use lopdf::Document;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::{SimpleFileOptions, ZipWriter};

pub const MANIFEST_CSV: &str = "exhibit_list.csv";
pub const MANIFEST_JSON: &str = "exhibit_list.json";
const TEXT_SAMPLE_PAGES: usize = 3;

/// 在 blocking pool 執行同步的 PDF 工作
pub async fn run_blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| ExhibitError::processing(format!("Background task failed: {}", e)))?
}

/// 壓縮與分類後、尚未編號的文件
#[derive(Debug, Clone)]
struct PreparedDocument {
    working_path: PathBuf,
    compression: Option<CompressionOutcome>,
    classification: Option<Classification>,
}

#[derive(Debug, Serialize)]
struct ManifestEntry<'a> {
    exhibit: &'a str,
    title: &'a str,
    file: &'a str,
    pages: usize,
    criterion: Option<&'a str>,
    document_type: Option<&'a str>,
    confidence: Option<f64>,
    compression: Option<String>,
    original_size: Option<u64>,
    compressed_size: Option<u64>,
    reduction_percent: Option<f64>,
}

impl<'a> ManifestEntry<'a> {
    fn from_exhibit(exhibit: &'a Exhibit) -> Self {
        let classification = exhibit.classification.as_ref();
        let compression = exhibit.compression.as_ref();
        Self {
            exhibit: &exhibit.label,
            title: &exhibit.title,
            file: &exhibit.file_name,
            pages: exhibit.page_count,
            criterion: classification.map(|c| c.criterion_code.as_str()),
            document_type: classification.map(|c| c.document_type.as_str()),
            confidence: classification.map(|c| (c.confidence * 100.0).round() / 100.0),
            compression: compression.map(|c| c.method.to_string()),
            original_size: compression.map(|c| c.original_size),
            compressed_size: compression.map(|c| c.compressed_size),
            reduction_percent: compression.map(|c| c.reduction_percent),
        }
    }
}

#[derive(Debug, Serialize)]
struct PackageManifest<'a> {
    generated_at: DateTime<Local>,
    visa_type: VisaType,
    beneficiary_name: Option<&'a str>,
    case_name: Option<&'a str>,
    package_file: &'a str,
    total_pages: usize,
    exhibits: Vec<ManifestEntry<'a>>,
    skipped: &'a [SkippedFile],
}

/// 由上傳的證據產生編號展品套件
pub struct ExhibitPipeline<S: Storage> {
    inputs: Vec<PathBuf>,
    work_dir: PathBuf,
    storage: S,
    compressor: Option<PdfCompressor>,
    options: PackageOptions,
    extract_limit: u64,
}

impl<S: Storage> ExhibitPipeline<S> {
    pub fn new(inputs: Vec<PathBuf>, work_dir: impl Into<PathBuf>, storage: S, options: PackageOptions) -> Self {
        Self {
            inputs,
            work_dir: work_dir.into(),
            storage,
            compressor: None,
            options,
            extract_limit: DEFAULT_MAX_EXTRACT_BYTES,
        }
    }

    pub fn with_compressor(mut self, compressor: Option<PdfCompressor>) -> Self {
        self.compressor = compressor;
        self
    }

    /// ZIP 解壓總量上限
    pub fn with_extract_limit(mut self, max_bytes: u64) -> Self {
        self.extract_limit = max_bytes;
        self
    }

    pub fn options(&self) -> &PackageOptions {
        &self.options
    }

    fn extract_dir(&self) -> PathBuf {
        self.work_dir.join("extracted")
    }

    fn compressed_dir(&self) -> PathBuf {
        self.work_dir.join("compressed")
    }

    fn numbered_dir(&self) -> PathBuf {
        self.work_dir.join("numbered")
    }

    async fn prepare_document(&self, index: usize, doc: SourceDocument) -> Result<PreparedDocument> {
        let mut working_path = doc.path.clone();
        let mut compression = None;

        if self.options.enable_compression {
            if let Some(compressor) = &self.compressor {
                let target = self
                    .compressed_dir()
                    .join(format!("{:03}_{}", index, doc.name));
                let outcome = compressor.compress(&doc.path, Some(&target)).await?;
                working_path = outcome.output_path.clone();
                compression = Some(outcome);
            }
        }

        let classification = if self.options.enable_classification {
            let path = doc.path.clone();
            let text = run_blocking(move || Ok(pdf::extract_text_sample(&path, TEXT_SAMPLE_PAGES))).await?;
            let result = classify_document(&doc.name, text.as_deref(), self.options.visa_type);
            tracing::debug!(
                "🔍 {} -> {} ({}, confidence {:.2})",
                doc.name,
                result.criterion_code,
                result.document_type,
                result.confidence
            );
            Some(result)
        } else {
            None
        };

        Ok(PreparedDocument {
            working_path,
            compression,
            classification,
        })
    }

    fn manifest_csv(exhibits: &[Exhibit]) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for exhibit in exhibits {
            writer.serialize(ManifestEntry::from_exhibit(exhibit))?;
        }
        writer
            .into_inner()
            .map_err(|e| ExhibitError::processing(format!("Failed to finish manifest CSV: {}", e)))
    }
}

fn bundle_entry_name(exhibit: &Exhibit) -> String {
    format!("Exhibit_{}_{}", exhibit.label, exhibit.file_name)
}

/// 未合併時的 ZIP 套件
fn bundle_zip(toc: Option<Vec<u8>>, exhibits: &[(String, PathBuf)]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

    if let Some(toc) = toc {
        zip.start_file("00_Table_of_Contents.pdf", SimpleFileOptions::default())?;
        zip.write_all(&toc)?;
    }

    for (name, path) in exhibits {
        zip.start_file(name.as_str(), SimpleFileOptions::default())?;
        zip.write_all(&std::fs::read(path)?)?;
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for ExhibitPipeline<S> {
    async fn extract(&self, progress: &mut ProgressTracker) -> Result<IntakeResult> {
        progress.begin("extract");

        let inputs = self.inputs.clone();
        let extract_dir = self.extract_dir();
        let limit = self.extract_limit;
        let intake = run_blocking(move || collect_inputs(&inputs, &extract_dir, limit)).await?;

        tracing::info!(
            "📁 Intake: {} processable, {} skipped",
            intake.documents.len(),
            intake.skipped.len()
        );

        if intake.documents.is_empty() {
            progress.fail("extract", "No processable PDF documents");
            return Err(ExhibitError::processing("No processable PDF documents"));
        }

        progress.complete("extract");
        Ok(intake)
    }

    async fn transform(&self, intake: IntakeResult, progress: &mut ProgressTracker) -> Result<AssemblyResult> {
        progress.begin("compress");
        tokio::fs::create_dir_all(self.compressed_dir()).await?;
        tokio::fs::create_dir_all(self.numbered_dir()).await?;

        let total = intake.documents.len();
        let budget = progress.remaining();
        let batch = process_with_timeout(intake.documents, budget, |index, doc| {
            progress.update("compress", index as f64 / total as f64 * 100.0);
            self.prepare_document(index, doc)
        })
        .await;
        progress.complete("compress");

        let mut skipped = intake.skipped;
        skipped.extend(
            batch
                .skipped
                .iter()
                .map(|doc| SkippedFile::new(&doc.name, "Skipped: time limit reached")),
        );
        let failed: Vec<SkippedFile> = batch
            .failed
            .iter()
            .map(|f| SkippedFile::new(&f.item.name, f.error.clone()))
            .collect();

        progress.begin("number");
        let numbered_total = batch.processed.len();
        let mut exhibits = Vec::with_capacity(numbered_total);
        let mut original_size = 0;
        let mut compressed_size = 0;

        for (index, (doc, prepared)) in batch.processed.into_iter().enumerate() {
            let label = exhibit_label(self.options.numbering_style, index);
            let title = suggested_title(&doc.name, prepared.classification.as_ref());
            let summary = prepared
                .classification
                .as_ref()
                .filter(|c| c.confidence > 0.0)
                .map(|c| format!("{}: {}", c.criterion_code, c.criterion_name));

            let target = self
                .numbered_dir()
                .join(format!("Exhibit_{}_{}", label, doc.name));
            let source = prepared.working_path.clone();
            let (cover_label, cover_title, cover_target) = (label.clone(), title.clone(), target.clone());
            let covered = run_blocking(move || {
                pdf::prepend_cover(
                    &source,
                    &cover_target,
                    &cover_label,
                    Some(cover_title.as_str()),
                    summary.as_deref(),
                )
            })
            .await;

            let (output_path, page_count, covered) = match covered {
                Ok(pages) => (target, pages, true),
                Err(e) => {
                    tracing::warn!("⚠️ Numbering failed for {}: {}, using original", doc.name, e);
                    (prepared.working_path.clone(), doc.page_count, false)
                }
            };

            original_size += doc.size;
            compressed_size += prepared
                .compression
                .as_ref()
                .map(|c| c.compressed_size)
                .unwrap_or(doc.size);

            exhibits.push(Exhibit {
                label,
                title,
                file_name: doc.name,
                page_count,
                output_path,
                covered,
                compression: prepared.compression,
                classification: prepared.classification,
            });
            progress.update("number", (index + 1) as f64 / numbered_total.max(1) as f64 * 100.0);
        }
        progress.complete("number");

        Ok(AssemblyResult {
            exhibits,
            skipped,
            failed,
            partial: batch.partial,
            original_size,
            compressed_size,
        })
    }

    async fn load(&self, assembly: AssemblyResult, progress: &mut ProgressTracker) -> Result<PackageOutput> {
        if assembly.exhibits.is_empty() {
            progress.fail("toc", "No processable PDF documents");
            return Err(ExhibitError::processing("No processable PDF documents"));
        }

        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();

        progress.begin("toc");
        let toc = if self.options.add_toc {
            let info = TocInfo {
                visa_type: self.options.visa_type,
                beneficiary: self.options.beneficiary_name.clone(),
                case_name: self.options.case_name.clone(),
                generated: Local::now(),
            };
            let entries: Vec<TocEntry> = assembly
                .exhibits
                .iter()
                .map(|e| TocEntry {
                    label: e.label.clone(),
                    title: e.title.clone(),
                    pages: e.page_count,
                })
                .collect();
            Some(run_blocking(move || pdf::table_of_contents(&info, &entries)).await?)
        } else {
            None
        };
        progress.complete("toc");

        progress.begin("merge");
        let exhibit_paths: Vec<PathBuf> = assembly.exhibits.iter().map(|e| e.output_path.clone()).collect();
        let (output_name, package_bytes, total_pages) = if self.options.merge_pdfs {
            let (bytes, pages) = run_blocking(move || {
                let mut documents = Vec::with_capacity(exhibit_paths.len() + 1);
                documents.extend(toc);
                for path in &exhibit_paths {
                    documents.push(Document::load(path)?);
                }
                let mut merged = pdf::merge_documents(documents)?;
                let pages = merged.get_pages().len();
                Ok((pdf::document_bytes(&mut merged)?, pages))
            })
            .await?;
            (format!("exhibit_package_{}.pdf", stamp), bytes, pages)
        } else {
            let entries: Vec<(String, PathBuf)> = assembly
                .exhibits
                .iter()
                .map(|e| (bundle_entry_name(e), e.output_path.clone()))
                .collect();
            let cover_pages = assembly.exhibits.iter().filter(|e| e.covered).count();
            let content_pages: usize = assembly.exhibits.iter().map(|e| e.page_count).sum();
            let (bytes, toc_pages) = run_blocking(move || {
                let (toc_bytes, toc_pages) = match toc {
                    Some(mut doc) => {
                        let pages = doc.get_pages().len();
                        (Some(pdf::document_bytes(&mut doc)?), pages)
                    }
                    None => (None, 0),
                };
                Ok((bundle_zip(toc_bytes, &entries)?, toc_pages))
            })
            .await?;
            (
                format!("exhibit_package_{}.zip", stamp),
                bytes,
                toc_pages + cover_pages + content_pages,
            )
        };
        self.storage.write_file(&output_name, &package_bytes).await?;
        progress.complete("merge");

        progress.begin("finalize");
        let mut skipped = assembly.skipped;
        skipped.extend(assembly.failed);

        let csv_bytes = Self::manifest_csv(&assembly.exhibits)?;
        self.storage.write_file(MANIFEST_CSV, &csv_bytes).await?;

        let manifest = PackageManifest {
            generated_at: Local::now(),
            visa_type: self.options.visa_type,
            beneficiary_name: self.options.beneficiary_name.as_deref(),
            case_name: self.options.case_name.as_deref(),
            package_file: &output_name,
            total_pages,
            exhibits: assembly.exhibits.iter().map(ManifestEntry::from_exhibit).collect(),
            skipped: &skipped,
        };
        let json_bytes = serde_json::to_vec_pretty(&manifest)?;
        self.storage.write_file(MANIFEST_JSON, &json_bytes).await?;
        progress.complete("finalize");

        tracing::info!(
            "📦 Package {} written ({} exhibits, {} pages)",
            output_name,
            assembly.exhibits.len(),
            total_pages
        );

        Ok(PackageOutput {
            exhibits: assembly.exhibits,
            skipped,
            partial: assembly.partial,
            original_size: assembly.original_size,
            compressed_size: assembly.compressed_size,
            total_pages,
            output_file: self.storage.resolve(&output_name),
            manifest_file: self.storage.resolve(MANIFEST_CSV),
        })
    }
}

/// 清除工作目錄 (壓縮與編號的中間檔)
pub async fn remove_work_dir(work_dir: &Path) -> Result<()> {
    if tokio::fs::try_exists(work_dir).await? {
        tokio::fs::remove_dir_all(work_dir).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::LocalStorage;
    use crate::core::pdf::tests::page_strings;
    use crate::core::pdf::{save_document, text_document};
    use crate::domain::model::NumberingStyle;
    use std::time::Duration;
    use tempfile::TempDir;

    fn write_pdf(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(name);
        let pages: Vec<Vec<&str>> = lines.iter().map(|l| vec![*l]).collect();
        let mut doc = text_document(&pages).unwrap();
        save_document(&mut doc, &path).unwrap();
        path
    }

    fn options(merge: bool) -> PackageOptions {
        PackageOptions {
            enable_compression: false,
            merge_pdfs: merge,
            beneficiary_name: Some("Alex Moreno".to_string()),
            ..PackageOptions::default()
        }
    }

    async fn run_all<S: Storage>(pipeline: &ExhibitPipeline<S>) -> Result<PackageOutput> {
        let mut progress = ProgressTracker::new(Duration::from_secs(300));
        progress.start();
        let intake = pipeline.extract(&mut progress).await?;
        let assembly = pipeline.transform(intake, &mut progress).await?;
        pipeline.load(assembly, &mut progress).await
    }

    #[tokio::test]
    async fn test_merged_package_has_toc_covers_and_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let inputs = vec![
            write_pdf(temp_dir.path(), "gold_medal_award.pdf", &["Award certificate"]),
            write_pdf(temp_dir.path(), "press_interview.pdf", &["Interview p1", "Interview p2"]),
        ];
        let out_dir = temp_dir.path().join("out");
        let pipeline = ExhibitPipeline::new(
            inputs,
            temp_dir.path().join("work"),
            LocalStorage::new(&out_dir),
            options(true),
        );

        let output = run_all(&pipeline).await.unwrap();

        assert_eq!(output.exhibits.len(), 2);
        assert_eq!(output.exhibits[0].label, "A");
        assert_eq!(output.exhibits[1].label, "B");
        assert_eq!(output.exhibits[1].page_count, 2);
        assert!(output.exhibits.iter().all(|e| e.covered));

        let file_name = output.output_file.file_name().unwrap().to_string_lossy().to_string();
        assert!(file_name.starts_with("exhibit_package_") && file_name.ends_with(".pdf"));

        // 目錄 1 頁 + 2 封面 + 3 內容頁
        assert_eq!(output.total_pages, 6);
        let merged = Document::load(&output.output_file).unwrap();
        assert_eq!(merged.get_pages().len(), 6);
        assert_eq!(page_strings(&merged, 2)[0], "Exhibit A");
        assert_eq!(page_strings(&merged, 4)[0], "Exhibit B");

        let csv = std::fs::read_to_string(out_dir.join(MANIFEST_CSV)).unwrap();
        assert!(csv.starts_with("exhibit,title,file,pages"));
        assert!(csv.contains("gold_medal_award.pdf"));

        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(out_dir.join(MANIFEST_JSON)).unwrap()).unwrap();
        assert_eq!(json["visa_type"], "O-1A");
        assert_eq!(json["exhibits"][0]["criterion"], "O1A-1");
        assert_eq!(json["package_file"], file_name);
    }

    #[tokio::test]
    async fn test_unmerged_package_is_zip_bundle() {
        let temp_dir = TempDir::new().unwrap();
        let inputs = vec![
            write_pdf(temp_dir.path(), "letter.pdf", &["Expert letter"]),
            write_pdf(temp_dir.path(), "contract.pdf", &["Contract"]),
        ];
        let out_dir = temp_dir.path().join("out");
        let mut opts = options(false);
        opts.numbering_style = NumberingStyle::Numbers;
        let pipeline = ExhibitPipeline::new(inputs, temp_dir.path().join("work"), LocalStorage::new(&out_dir), opts);

        let output = run_all(&pipeline).await.unwrap();
        assert!(output.output_file.to_string_lossy().ends_with(".zip"));
        assert_eq!(output.total_pages, 1 + 2 + 2);

        let archive_bytes = std::fs::read(&output.output_file).unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(archive_bytes)).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "00_Table_of_Contents.pdf",
                "Exhibit_1_letter.pdf",
                "Exhibit_2_contract.pdf"
            ]
        );
    }

    #[tokio::test]
    async fn test_no_processable_documents() {
        let temp_dir = TempDir::new().unwrap();
        let bogus = temp_dir.path().join("notes.txt");
        std::fs::write(&bogus, b"plain text").unwrap();

        let pipeline = ExhibitPipeline::new(
            vec![bogus],
            temp_dir.path().join("work"),
            LocalStorage::new(temp_dir.path().join("out")),
            options(true),
        );
        let mut progress = ProgressTracker::new(Duration::from_secs(300));
        let err = pipeline.extract(&mut progress).await.unwrap_err();
        assert_eq!(err.to_string(), ExhibitError::processing("No processable PDF documents").to_string());
    }

    #[tokio::test]
    async fn test_zero_budget_yields_no_exhibits() {
        let temp_dir = TempDir::new().unwrap();
        let inputs = vec![write_pdf(temp_dir.path(), "award.pdf", &["Award"])];
        let pipeline = ExhibitPipeline::new(
            inputs,
            temp_dir.path().join("work"),
            LocalStorage::new(temp_dir.path().join("out")),
            options(true),
        );

        let mut progress = ProgressTracker::new(Duration::ZERO);
        progress.start();
        let intake = pipeline.extract(&mut progress).await.unwrap();
        let assembly = pipeline.transform(intake, &mut progress).await.unwrap();

        assert!(assembly.partial);
        assert!(assembly.exhibits.is_empty());
        assert_eq!(assembly.skipped[0].reason, "Skipped: time limit reached");
        assert!(pipeline.load(assembly, &mut progress).await.is_err());
    }
}
