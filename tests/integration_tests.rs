use lopdf::content::Content;
use lopdf::{Document, Object};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;
use visa_exhibit_generator::core::pdf::{document_bytes, save_document, text_document};
use visa_exhibit_generator::core::pipeline::{MANIFEST_CSV, MANIFEST_JSON};
use visa_exhibit_generator::domain::model::{NumberingStyle, PackageOptions, VisaType};
use visa_exhibit_generator::{AppConfig, PackageService};
use zip::write::{SimpleFileOptions, ZipWriter};

fn service(temp_dir: &TempDir) -> PackageService {
    let mut config = AppConfig::default();
    config.storage.upload_dir = temp_dir.path().join("uploads");
    config.storage.output_dir = temp_dir.path().join("outputs");
    PackageService::new(config)
}

fn write_pdf(path: &Path, pages: &[Vec<&str>]) {
    let mut doc = text_document(pages).unwrap();
    save_document(&mut doc, path).unwrap();
}

fn page_strings(doc: &Document, page_no: u32) -> Vec<String> {
    let pages = doc.get_pages();
    let page_id = pages[&page_no];
    let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
    content
        .operations
        .iter()
        .filter(|op| op.operator == "Tj")
        .filter_map(|op| match op.operands.first() {
            Some(Object::String(bytes, _)) => Some(String::from_utf8_lossy(bytes).to_string()),
            _ => None,
        })
        .collect()
}

fn options() -> PackageOptions {
    PackageOptions {
        enable_compression: false,
        beneficiary_name: Some("Jane Doe".to_string()),
        case_name: Some("O-1A Petition".to_string()),
        ..PackageOptions::default()
    }
}

#[tokio::test]
async fn test_end_to_end_merged_package() {
    let temp_dir = TempDir::new().unwrap();
    let service = service(&temp_dir);
    service.prepare().await.unwrap();

    // 一般 PDF、含 PDF 的 ZIP、損毀的 PDF
    let award = temp_dir.path().join("medal_award.pdf");
    write_pdf(
        &award,
        &[vec!["Gold medal award recipient"], vec!["Prize committee letter"]],
    );

    let archive = temp_dir.path().join("press.zip");
    {
        let mut interview = text_document(&[vec!["Featured interview in national press"]]).unwrap();
        let interview_bytes = document_bytes(&mut interview).unwrap();
        let mut zip = ZipWriter::new(File::create(&archive).unwrap());
        zip.start_file("coverage/interview.pdf", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(&interview_bytes).unwrap();
        zip.start_file("coverage/notes.txt", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"not evidence").unwrap();
        zip.finish().unwrap();
    }

    let corrupt = temp_dir.path().join("corrupt.pdf");
    std::fs::write(&corrupt, b"%PDF-1.4\nthis is not a real document").unwrap();

    let report = service
        .build_from_paths(vec![award, archive, corrupt], options())
        .await
        .unwrap();

    // 上傳順序決定編號
    assert_eq!(report.visa_type, VisaType::O1A);
    assert_eq!(report.exhibits.len(), 2);
    assert_eq!(report.exhibits[0].label, "A");
    assert_eq!(report.exhibits[0].file_name, "medal_award.pdf");
    assert_eq!(report.exhibits[1].label, "B");
    assert_eq!(report.exhibits[1].file_name, "interview.pdf");
    assert!(!report.partial);

    let award_class = report.exhibits[0].classification.as_ref().unwrap();
    assert_eq!(award_class.criterion_code, "O1A-1");
    let press_class = report.exhibits[1].classification.as_ref().unwrap();
    assert_eq!(press_class.criterion_code, "O1A-3");

    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].file, "corrupt.pdf");
    assert!(report.skipped[0].reason.starts_with("Corrupted PDF"));

    // 目錄 1 頁 + 2 張封面 + 3 頁內容
    assert_eq!(report.total_pages, 6);
    assert!(report
        .output_file
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("exhibit_package_"));

    let merged = Document::load(&report.output_file).unwrap();
    assert_eq!(merged.get_pages().len(), 6);

    let toc = page_strings(&merged, 1).join("\n");
    assert!(toc.contains("TABLE OF CONTENTS"));
    assert!(toc.contains("Beneficiary: Jane Doe"));
    assert!(toc.contains("Total Exhibits: 2"));

    assert!(page_strings(&merged, 2).contains(&"Exhibit A".to_string()));
    assert!(page_strings(&merged, 5).contains(&"Exhibit B".to_string()));

    let output_dir = report.output_file.parent().unwrap();
    let csv = std::fs::read_to_string(output_dir.join(MANIFEST_CSV)).unwrap();
    let mut lines = csv.lines();
    assert!(lines.next().unwrap().starts_with("exhibit,title,file,pages"));
    assert_eq!(lines.count(), 2);

    let json: serde_json::Value =
        serde_json::from_slice(&std::fs::read(output_dir.join(MANIFEST_JSON)).unwrap()).unwrap();
    assert_eq!(json["visa_type"], "O-1A");
    assert_eq!(json["exhibits"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_roman_numbering_without_toc() {
    let temp_dir = TempDir::new().unwrap();
    let service = service(&temp_dir);
    service.prepare().await.unwrap();

    let mut inputs = Vec::new();
    for name in ["first.pdf", "second.pdf", "third.pdf", "fourth.pdf"] {
        let path = temp_dir.path().join(name);
        write_pdf(&path, &[vec!["evidence"]]);
        inputs.push(path);
    }

    let report = service
        .build_from_paths(
            inputs,
            PackageOptions {
                numbering_style: NumberingStyle::Roman,
                add_toc: false,
                enable_classification: false,
                ..options()
            },
        )
        .await
        .unwrap();

    let labels: Vec<&str> = report.exhibits.iter().map(|e| e.label.as_str()).collect();
    assert_eq!(labels, vec!["I", "II", "III", "IV"]);
    assert!(report.exhibits.iter().all(|e| e.classification.is_none()));
    // 每件展品 1 張封面 + 1 頁內容
    assert_eq!(report.total_pages, 8);
}

#[tokio::test]
async fn test_unmerged_package_is_zip_bundle() {
    let temp_dir = TempDir::new().unwrap();
    let service = service(&temp_dir);
    service.prepare().await.unwrap();

    let input = temp_dir.path().join("salary_contract.pdf");
    write_pdf(&input, &[vec!["Employment contract and salary"]]);

    let report = service
        .build_from_paths(
            vec![input],
            PackageOptions {
                merge_pdfs: false,
                ..options()
            },
        )
        .await
        .unwrap();

    assert_eq!(
        report.output_file.extension().and_then(|e| e.to_str()),
        Some("zip")
    );

    let mut archive = zip::ZipArchive::new(File::open(&report.output_file).unwrap()).unwrap();
    let names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    assert_eq!(names[0], "00_Table_of_Contents.pdf");
    assert!(names[1].starts_with("Exhibit_A_"));
}

#[tokio::test]
async fn test_no_processable_documents_fails() {
    let temp_dir = TempDir::new().unwrap();
    let service = service(&temp_dir);
    service.prepare().await.unwrap();

    let notes = temp_dir.path().join("notes.txt");
    std::fs::write(&notes, b"plain text").unwrap();

    let err = service
        .build_from_paths(vec![notes], options())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("No processable PDF documents"));
}
