use crate::domain::model::{IntakeResult, SkippedFile, SourceDocument};
use crate::utils::error::{ExhibitError, Result};
use crate::utils::validation::validate_archive_entry;
use lopdf::Document;
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

const SNIFF_LEN: usize = 1024;
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const ENCRYPT_MARKER: &[u8] = b"/Encrypt";

pub const DEFAULT_EXTENSIONS: [&str; 1] = ["pdf"];
/// 解壓總量上限 (與預設上傳上限相同)
pub const DEFAULT_MAX_EXTRACT_BYTES: u64 = 100 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Zip,
    Unsupported(String),
}

/// 依內容判斷檔案類型，無法判斷時才看副檔名
pub fn sniff(bytes: &[u8], name: &str) -> FileKind {
    let head = &bytes[..bytes.len().min(SNIFF_LEN)];
    if head.windows(4).any(|w| w == b"%PDF") {
        return FileKind::Pdf;
    }
    if head.starts_with(ZIP_MAGIC) {
        return FileKind::Zip;
    }

    let guessed = mime_guess::from_path(name).first_or_octet_stream();
    match guessed.essence_str() {
        "application/pdf" => FileKind::Pdf,
        "application/zip" => FileKind::Zip,
        other => FileKind::Unsupported(other.to_string()),
    }
}

pub fn sniff_file(path: &Path) -> Result<FileKind> {
    let mut head = Vec::with_capacity(SNIFF_LEN);
    File::open(path)?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut head)?;
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    Ok(sniff(&head, name))
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn has_allowed_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            allowed
                .iter()
                .any(|a| a.trim_start_matches('.').eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

fn collect_matching(root: &Path, dir: &Path, allowed: &[&str], found: &mut Vec<SourceDocument>) -> Result<()> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)?.collect::<std::io::Result<_>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = entry.file_name().to_string_lossy().to_string();
        if is_hidden(&name) {
            continue;
        }

        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_matching(root, &path, allowed, found)?;
        } else if file_type.is_file() && has_allowed_extension(&path, allowed) {
            let relative_path = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            found.push(SourceDocument {
                name,
                size: entry.metadata()?.len(),
                path,
                relative_path,
                page_count: 0,
            });
        }
    }
    Ok(())
}

/// 安全解壓 ZIP，回傳符合副檔名的檔案
pub fn extract_zip(
    archive_path: &Path,
    dest: &Path,
    allowed_extensions: &[&str],
    max_total_bytes: u64,
) -> Result<Vec<SourceDocument>> {
    if !archive_path.exists() {
        return Err(ExhibitError::not_found(format!(
            "ZIP file not found: {}",
            archive_path.display()
        )));
    }

    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|_| ExhibitError::validation("Invalid or corrupted ZIP file"))?;

    // 先檢查所有項目再解壓
    for name in archive.file_names() {
        validate_archive_entry(name)?;
    }

    let mut total_bytes: u64 = 0;
    for index in 0..archive.len() {
        let entry = archive
            .by_index_raw(index)
            .map_err(|_| ExhibitError::validation("Invalid or corrupted ZIP file"))?;
        total_bytes = total_bytes.saturating_add(entry.size());
    }
    if total_bytes > max_total_bytes {
        return Err(ExhibitError::validation(format!(
            "ZIP expands to {} bytes, above the {} byte limit",
            total_bytes, max_total_bytes
        )));
    }

    std::fs::create_dir_all(dest)?;
    archive
        .extract(dest)
        .map_err(|e| ExhibitError::processing(format!("ZIP extraction failed: {}", e)))?;

    let mut found = Vec::new();
    collect_matching(dest, dest, allowed_extensions, &mut found)?;

    tracing::info!(
        "📦 Extracted {} files from {}",
        found.len(),
        archive_path.display()
    );
    Ok(found)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PdfStatus {
    pub encrypted: bool,
    pub can_process: bool,
    pub page_count: Option<usize>,
    pub message: String,
}

impl PdfStatus {
    fn rejected(encrypted: bool, message: String) -> Self {
        Self {
            encrypted,
            can_process: false,
            page_count: None,
            message,
        }
    }
}

fn short_error(err: impl std::fmt::Display) -> String {
    err.to_string().chars().take(50).collect()
}

/// 檢查 PDF 是否加密或損毀
pub fn inspect_pdf(path: &Path) -> PdfStatus {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => return PdfStatus::rejected(false, format!("Error reading PDF: {}", short_error(e))),
    };

    match Document::load_mem(&bytes) {
        Ok(doc) => {
            if doc.trailer.has(b"Encrypt") {
                return PdfStatus::rejected(true, format!("Password-protected: {}", name));
            }
            let page_count = doc.get_pages().len();
            PdfStatus {
                encrypted: false,
                can_process: true,
                page_count: Some(page_count),
                message: format!("OK: {} pages", page_count),
            }
        }
        // 只有無法解析時才用原始位元組判斷
        Err(_) if bytes.windows(ENCRYPT_MARKER.len()).any(|w| w == ENCRYPT_MARKER) => {
            PdfStatus::rejected(true, format!("Requires password: {}", name))
        }
        Err(e) => PdfStatus::rejected(false, format!("Corrupted PDF: {}", short_error(e))),
    }
}

/// 分出可處理與略過的文件
pub fn filter_processable(documents: Vec<SourceDocument>) -> (Vec<SourceDocument>, Vec<SkippedFile>) {
    let mut processable = Vec::new();
    let mut skipped = Vec::new();

    for mut doc in documents {
        if !doc.path.exists() {
            skipped.push(SkippedFile::new(&doc.name, "File not found"));
            continue;
        }

        let status = inspect_pdf(&doc.path);
        if status.can_process {
            doc.page_count = status.page_count.unwrap_or(0);
            processable.push(doc);
        } else {
            tracing::warn!("⚠️ Skipping {}: {}", doc.name, status.message);
            skipped.push(SkippedFile::new(&doc.name, status.message));
        }
    }

    tracing::info!(
        "🔍 Filtered PDFs: {} processable, {} skipped",
        processable.len(),
        skipped.len()
    );
    (processable, skipped)
}

#[derive(Debug, Clone, Serialize)]
pub struct InvalidFile {
    pub path: PathBuf,
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchValidation {
    pub valid: Vec<PathBuf>,
    pub invalid: Vec<InvalidFile>,
    pub total_pages: usize,
    pub total_size: u64,
}

impl BatchValidation {
    pub fn valid_count(&self) -> usize {
        self.valid.len()
    }

    pub fn invalid_count(&self) -> usize {
        self.invalid.len()
    }
}

pub fn validate_batch(paths: &[PathBuf]) -> BatchValidation {
    let mut report = BatchValidation::default();

    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let size = match std::fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(_) => {
                report.invalid.push(InvalidFile {
                    path: path.clone(),
                    name,
                    error: "File not found".to_string(),
                });
                continue;
            }
        };

        let status = inspect_pdf(path);
        if status.can_process {
            report.valid.push(path.clone());
            report.total_pages += status.page_count.unwrap_or(0);
            report.total_size += size;
        } else {
            report.invalid.push(InvalidFile {
                path: path.clone(),
                name,
                error: status.message,
            });
        }
    }

    report
}

fn source_document(path: &Path) -> Result<SourceDocument> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    Ok(SourceDocument {
        relative_path: name.clone(),
        name,
        size: std::fs::metadata(path)?.len(),
        path: path.to_path_buf(),
        page_count: 0,
    })
}

/// 依上傳順序收集 PDF，ZIP 會解壓到 extract_root 下
pub fn collect_inputs(inputs: &[PathBuf], extract_root: &Path, max_extract_bytes: u64) -> Result<IntakeResult> {
    let mut candidates = Vec::new();
    let mut skipped = Vec::new();

    for (index, path) in inputs.iter().enumerate() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        if !path.exists() {
            skipped.push(SkippedFile::new(name, "File not found"));
            continue;
        }

        match sniff_file(path)? {
            FileKind::Pdf => candidates.push(source_document(path)?),
            FileKind::Zip => {
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| "archive".to_string());
                let dest = extract_root.join(format!("{:03}_{}", index, stem));
                match extract_zip(path, &dest, &DEFAULT_EXTENSIONS, max_extract_bytes) {
                    Ok(found) if found.is_empty() => {
                        skipped.push(SkippedFile::new(name, "ZIP contains no PDF files"));
                    }
                    Ok(found) => candidates.extend(found),
                    Err(e) => {
                        tracing::warn!("❌ Could not extract {}: {}", name, e);
                        skipped.push(SkippedFile::new(name, e.to_string()));
                    }
                }
            }
            FileKind::Unsupported(mime) => {
                skipped.push(SkippedFile::new(name, format!("Unsupported file type: {}", mime)));
            }
        }
    }

    let (documents, mut rejected) = filter_processable(candidates);
    skipped.append(&mut rejected);

    Ok(IntakeResult { documents, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pdf::{save_document, text_document};
    use lopdf::dictionary;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::{SimpleFileOptions, ZipWriter};

    fn write_pdf(path: &Path, pages: usize) {
        let lines: Vec<Vec<&str>> = (0..pages).map(|_| vec!["evidence"]).collect();
        let mut doc = text_document(&lines).unwrap();
        save_document(&mut doc, path).unwrap();
    }

    fn pdf_bytes() -> Vec<u8> {
        let mut doc = text_document(&[vec!["zipped evidence"]]).unwrap();
        crate::core::pdf::document_bytes(&mut doc).unwrap()
    }

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, data) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_sniff_by_magic_and_extension() {
        assert_eq!(sniff(b"%PDF-1.5\n...", "scan.bin"), FileKind::Pdf);
        assert_eq!(sniff(b"PK\x03\x04rest", "bundle.dat"), FileKind::Zip);
        assert_eq!(sniff(b"garbage", "award.pdf"), FileKind::Pdf);
        assert_eq!(
            sniff(b"\x89PNG", "photo.png"),
            FileKind::Unsupported("image/png".to_string())
        );
    }

    #[test]
    fn test_extract_zip_filters_and_skips_hidden() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("evidence.zip");
        let pdf = pdf_bytes();
        write_zip(
            &archive,
            &[
                ("awards/medal.PDF", pdf.as_slice()),
                ("press.pdf", pdf.as_slice()),
                ("notes.txt", b"not a pdf"),
                (".hidden.pdf", pdf.as_slice()),
                ("__MACOSX/.ds/ignored.pdf", pdf.as_slice()),
            ],
        );

        let dest = temp_dir.path().join("out");
        let found = extract_zip(&archive, &dest, &DEFAULT_EXTENSIONS, DEFAULT_MAX_EXTRACT_BYTES).unwrap();
        let names: Vec<&str> = found.iter().map(|f| f.relative_path.as_str()).collect();

        assert_eq!(names, vec!["awards/medal.PDF", "press.pdf"]);
        assert!(found.iter().all(|f| f.size > 0));
    }

    #[test]
    fn test_extract_zip_rejects_traversal() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("evil.zip");
        write_zip(&archive, &[("../../etc/passwd.pdf", b"x")]);

        let err = extract_zip(&archive, &temp_dir.path().join("out"), &DEFAULT_EXTENSIONS, DEFAULT_MAX_EXTRACT_BYTES).unwrap_err();
        assert!(matches!(err, ExhibitError::SecurityError { .. }));
        assert!(!temp_dir.path().join("etc").exists());
    }

    #[test]
    fn test_extract_zip_rejects_oversized_expansion() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("bomb.zip");
        let zeros = vec![0u8; 64 * 1024];
        write_zip(&archive, &[("a.pdf", zeros.as_slice()), ("b.pdf", zeros.as_slice())]);

        let dest = temp_dir.path().join("out");
        let err = extract_zip(&archive, &dest, &DEFAULT_EXTENSIONS, 100 * 1024).unwrap_err();
        assert!(matches!(err, ExhibitError::ValidationError { .. }));
        assert!(err.to_string().contains("131072 bytes"));
        assert!(!dest.exists());

        let found = extract_zip(&archive, &dest, &DEFAULT_EXTENSIONS, 128 * 1024).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_collect_inputs_skips_oversized_zip() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("press.zip");
        write_zip(&archive, &[("article.pdf", pdf_bytes().as_slice())]);

        let result = collect_inputs(&[archive], &temp_dir.path().join(".extracted"), 16).unwrap();
        assert!(result.documents.is_empty());
        assert_eq!(result.skipped.len(), 1);
        assert!(result.skipped[0].reason.contains("byte limit"));
    }

    #[test]
    fn test_extract_zip_rejects_corrupt_archive() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("broken.zip");
        std::fs::write(&archive, b"PK\x03\x04 truncated").unwrap();

        let err = extract_zip(&archive, &temp_dir.path().join("out"), &DEFAULT_EXTENSIONS, DEFAULT_MAX_EXTRACT_BYTES).unwrap_err();
        assert_eq!(err.to_string(), ExhibitError::validation("Invalid or corrupted ZIP file").to_string());
    }

    #[test]
    fn test_inspect_pdf_statuses() {
        let temp_dir = TempDir::new().unwrap();

        let ok = temp_dir.path().join("ok.pdf");
        write_pdf(&ok, 3);
        let status = inspect_pdf(&ok);
        assert!(status.can_process);
        assert_eq!(status.page_count, Some(3));
        assert_eq!(status.message, "OK: 3 pages");

        let corrupt = temp_dir.path().join("corrupt.pdf");
        std::fs::write(&corrupt, b"%PDF-1.4 this is not really a pdf").unwrap();
        let status = inspect_pdf(&corrupt);
        assert!(!status.can_process);
        assert!(!status.encrypted);
        assert!(status.message.starts_with("Corrupted PDF: "));
        assert!(status.message.len() <= "Corrupted PDF: ".len() + 50 * 4);

        let locked = temp_dir.path().join("locked.pdf");
        let mut doc = text_document(&[vec!["secret"]]).unwrap();
        doc.trailer.set("Encrypt", dictionary! { "Filter" => "Standard" });
        save_document(&mut doc, &locked).unwrap();
        let status = inspect_pdf(&locked);
        assert!(status.encrypted);
        assert!(!status.can_process);
        assert!(status.message.contains("locked.pdf"));
    }

    #[test]
    fn test_encrypt_keyword_in_text_is_not_encryption() {
        let temp_dir = TempDir::new().unwrap();
        let plain = temp_dir.path().join("plain.pdf");
        let mut doc = text_document(&[vec!["See field /Encrypt in the trailer"]]).unwrap();
        // 解開內容串流，讓關鍵字以原文出現在檔案中
        doc.decompress();
        let bytes = crate::core::pdf::document_bytes(&mut doc).unwrap();
        std::fs::write(&plain, &bytes).unwrap();
        assert!(bytes.windows(ENCRYPT_MARKER.len()).any(|w| w == ENCRYPT_MARKER));

        let status = inspect_pdf(&plain);
        assert!(!status.encrypted);
        assert!(status.can_process);
        assert_eq!(status.message, "OK: 1 pages");
    }

    #[test]
    fn test_zero_page_pdf_is_processable() {
        let temp_dir = TempDir::new().unwrap();
        let empty = temp_dir.path().join("empty.pdf");
        let mut doc = text_document(&[]).unwrap();
        save_document(&mut doc, &empty).unwrap();

        let status = inspect_pdf(&empty);
        assert!(status.can_process);
        assert_eq!(status.page_count, Some(0));
        assert_eq!(status.message, "OK: 0 pages");
    }

    #[test]
    fn test_filter_processable_and_validate_batch() {
        let temp_dir = TempDir::new().unwrap();
        let good = temp_dir.path().join("good.pdf");
        write_pdf(&good, 2);
        let bad = temp_dir.path().join("bad.pdf");
        std::fs::write(&bad, b"nope").unwrap();
        let missing = temp_dir.path().join("missing.pdf");

        let docs = vec![
            source_document(&good).unwrap(),
            source_document(&bad).unwrap(),
            SourceDocument {
                name: "missing.pdf".to_string(),
                path: missing.clone(),
                size: 0,
                relative_path: "missing.pdf".to_string(),
                page_count: 0,
            },
        ];
        let (processable, skipped) = filter_processable(docs);
        assert_eq!(processable.len(), 1);
        assert_eq!(processable[0].page_count, 2);
        assert_eq!(skipped.len(), 2);
        assert_eq!(skipped[1], SkippedFile::new("missing.pdf", "File not found"));

        let report = validate_batch(&[good.clone(), bad, missing]);
        assert_eq!(report.valid, vec![good]);
        assert_eq!(report.valid_count(), 1);
        assert_eq!(report.invalid_count(), 2);
        assert_eq!(report.total_pages, 2);
        assert!(report.total_size > 0);
    }

    #[test]
    fn test_collect_inputs_keeps_upload_order() {
        let temp_dir = TempDir::new().unwrap();
        let uploads = temp_dir.path().join("uploads");
        std::fs::create_dir_all(&uploads).unwrap();

        let second = uploads.join("b_letter.pdf");
        write_pdf(&second, 1);
        let first = uploads.join("z_award.pdf");
        write_pdf(&first, 1);
        let archive = uploads.join("press.zip");
        write_zip(&archive, &[("article.pdf", pdf_bytes().as_slice())]);
        let image = uploads.join("photo.png");
        std::fs::write(&image, b"\x89PNG\r\n").unwrap();

        let result = collect_inputs(
            &[first, second, archive, image],
            &uploads.join(".extracted"),
            DEFAULT_MAX_EXTRACT_BYTES,
        )
        .unwrap();

        let names: Vec<&str> = result.documents.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["z_award.pdf", "b_letter.pdf", "article.pdf"]);
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].reason, "Unsupported file type: image/png");
    }
}
