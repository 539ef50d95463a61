//! PDF rendering and assembly on top of `lopdf`.
//!
//! Generated pages use the standard Type1 Helvetica faces, so nothing has to
//! be embedded. Widths come from the Adobe core font metrics.

use crate::domain::model::VisaType;
use crate::utils::error::{ExhibitError, Result};
use chrono::{DateTime, Local};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::BTreeMap;
use std::path::Path;

pub const PAGE_WIDTH: f32 = 612.0;
pub const PAGE_HEIGHT: f32 = 792.0;

const MARGIN: f32 = 72.0;
const INHERITABLE_KEYS: [&[u8]; 4] = [b"MediaBox", b"Resources", b"CropBox", b"Rotate"];
const MAX_PARENT_DEPTH: usize = 32;

#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    278, 278, 584, 584, 584, 556, 1015,
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    278, 278, 278, 469, 556, 333,
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833,
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500,
    334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    333, 333, 584, 584, 584, 611, 975,
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    333, 278, 333, 584, 556, 333,
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889,
    611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500,
    389, 280, 389, 584,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource_name(&self) -> &'static [u8] {
        match self {
            Font::Regular => b"F1",
            Font::Bold => b"F2",
        }
    }

    fn widths(&self) -> &'static [u16; 95] {
        match self {
            Font::Regular => &HELVETICA_WIDTHS,
            Font::Bold => &HELVETICA_BOLD_WIDTHS,
        }
    }
}

pub fn text_width(text: &str, font: Font, size: f32) -> f32 {
    let widths = font.widths();
    let units: u32 = text
        .chars()
        .map(|c| match c as u32 {
            code @ 32..=126 => widths[(code - 32) as usize] as u32,
            _ => 556,
        })
        .sum();
    units as f32 * size / 1000.0
}

/// 貪婪斷行，單字超過寬度時獨立成行
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };

        if needed > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// 依字型寬度斷行，過長的單字逐字切開
pub fn wrap_to_width(text: &str, font: Font, size: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if text_width(&candidate, font, size) <= max_width {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        for c in word.chars() {
            current.push(c);
            if text_width(&current, font, size) > max_width && current.chars().count() > 1 {
                current.pop();
                lines.push(std::mem::take(&mut current));
                current.push(c);
            }
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

// WinAnsi 以外的字元以 ? 代替
fn encode_text(text: &str) -> Object {
    let bytes = text
        .chars()
        .map(|c| match c as u32 {
            code @ 32..=126 | code @ 160..=255 => code as u8,
            _ => b'?',
        })
        .collect();
    Object::String(bytes, StringFormat::Literal)
}

/// 單頁的繪圖指令
#[derive(Debug, Default)]
pub struct PageCanvas {
    operations: Vec<Operation>,
}

impl PageCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&mut self, font: Font, size: f32, x: f32, y: f32, text: &str) {
        self.operations.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(font.resource_name().to_vec()), size.into()]),
            Operation::new("Td", vec![x.into(), y.into()]),
            Operation::new("Tj", vec![encode_text(text)]),
            Operation::new("ET", vec![]),
        ]);
    }

    pub fn centered_text(&mut self, font: Font, size: f32, y: f32, text: &str) {
        let x = (PAGE_WIDTH - text_width(text, font, size)) / 2.0;
        self.text(font, size, x.max(0.0), y, text);
    }

    pub fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, width: f32) {
        self.operations.extend([
            Operation::new("w", vec![width.into()]),
            Operation::new("m", vec![x1.into(), y1.into()]),
            Operation::new("l", vec![x2.into(), y2.into()]),
            Operation::new("S", vec![]),
        ]);
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// 逐頁產生新的 PDF 文件
pub struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    resources_id: ObjectId,
    kids: Vec<Object>,
}

impl Default for PdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let regular = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let bold = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => regular,
                "F2" => bold,
            },
        });

        Self {
            doc,
            pages_id,
            resources_id,
            kids: Vec::new(),
        }
    }

    pub fn add_page(&mut self, canvas: PageCanvas) -> Result<()> {
        let content = Content {
            operations: canvas.operations,
        };
        let content_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "Contents" => content_id,
            "Resources" => self.resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        });
        self.kids.push(page_id.into());
        Ok(())
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    pub fn finish(mut self) -> Document {
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.compress();
        self.doc
    }
}

/// 展品封面頁
pub fn cover_page(label: &str, title: Option<&str>, summary: Option<&str>) -> Result<Document> {
    let mut canvas = PageCanvas::new();
    let left = 50.0;
    let right = PAGE_WIDTH - 50.0;

    canvas.line(left, PAGE_HEIGHT - 300.0, right, PAGE_HEIGHT - 300.0, 2.0);

    let label_y = PAGE_HEIGHT - 220.0;
    canvas.centered_text(Font::Bold, 48.0, label_y, &format!("Exhibit {}", label));

    if let Some(title) = title.filter(|t| !t.trim().is_empty()) {
        let mut y = label_y - 60.0;
        for line in wrap_to_width(title, Font::Bold, 18.0, right - left) {
            canvas.centered_text(Font::Bold, 18.0, y, &line);
            y -= 20.0;
        }
    }

    if let Some(summary) = summary.filter(|s| !s.trim().is_empty()) {
        let mut y = label_y - 120.0;
        for line in wrap_to_width(summary, Font::Regular, 10.0, right - left)
            .into_iter()
            .take(10)
        {
            canvas.centered_text(Font::Regular, 10.0, y, &line);
            y -= 14.0;
        }
    }

    canvas.line(left, PAGE_HEIGHT / 2.0 - 50.0, right, PAGE_HEIGHT / 2.0 - 50.0, 2.0);

    let mut builder = PdfBuilder::new();
    builder.add_page(canvas)?;
    Ok(builder.finish())
}

#[derive(Debug, Clone)]
pub struct TocEntry {
    pub label: String,
    pub title: String,
    pub pages: usize,
}

#[derive(Debug, Clone)]
pub struct TocInfo {
    pub visa_type: VisaType,
    pub beneficiary: Option<String>,
    pub case_name: Option<String>,
    pub generated: DateTime<Local>,
}

const TOC_COLUMNS: [f32; 3] = [MARGIN, 162.0, 486.0];
const TOC_ROW_HEIGHT: f32 = 18.0;

fn toc_header_row(canvas: &mut PageCanvas, y: f32) -> f32 {
    for (x, heading) in TOC_COLUMNS.iter().zip(["Exhibit", "Title", "Pages"]) {
        canvas.text(Font::Bold, 12.0, *x, y, heading);
    }
    canvas.line(MARGIN, y - 6.0, PAGE_WIDTH - MARGIN, y - 6.0, 1.0);
    y - TOC_ROW_HEIGHT - 4.0
}

/// 目錄頁，列數超過一頁時續頁
pub fn table_of_contents(info: &TocInfo, entries: &[TocEntry]) -> Result<Document> {
    let mut builder = PdfBuilder::new();
    let mut canvas = PageCanvas::new();

    canvas.centered_text(Font::Bold, 24.0, 720.0, "EXHIBIT PACKAGE");
    canvas.centered_text(Font::Bold, 24.0, 690.0, "TABLE OF CONTENTS");

    let mut info_lines = vec![format!("Visa Type: {}", info.visa_type)];
    if let Some(name) = info.beneficiary.as_deref().filter(|n| !n.trim().is_empty()) {
        info_lines.push(format!("Beneficiary: {}", name));
    }
    if let Some(case) = info.case_name.as_deref().filter(|c| !c.trim().is_empty()) {
        info_lines.push(format!("Case: {}", case));
    }
    info_lines.push(format!("Generated: {}", info.generated.format("%B %d, %Y")));
    info_lines.push(format!("Total Exhibits: {}", entries.len()));

    let mut y = 640.0;
    for line in &info_lines {
        canvas.text(Font::Regular, 11.0, MARGIN, y, line);
        y -= 16.0;
    }

    y = toc_header_row(&mut canvas, y - 20.0);

    for entry in entries {
        if y < MARGIN {
            builder.add_page(std::mem::take(&mut canvas))?;
            y = toc_header_row(&mut canvas, PAGE_HEIGHT - MARGIN);
        }
        canvas.text(Font::Regular, 10.0, TOC_COLUMNS[0], y, &format!("Exhibit {}", entry.label));
        canvas.text(Font::Regular, 10.0, TOC_COLUMNS[1], y, &truncate_chars(&entry.title, 50));
        canvas.text(Font::Regular, 10.0, TOC_COLUMNS[2], y, &entry.pages.to_string());
        y -= TOC_ROW_HEIGHT;
    }

    builder.add_page(canvas)?;
    Ok(builder.finish())
}

fn object_type(object: &Object) -> Option<&[u8]> {
    let dict = match object {
        Object::Dictionary(dict) => dict,
        Object::Stream(stream) => &stream.dict,
        _ => return None,
    };
    dict.get(b"Type").ok()?.as_name().ok()
}

// 沿 Parent 鏈尋找可繼承屬性
fn inherited_attribute(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    for _ in 0..MAX_PARENT_DEPTH {
        let node = doc.get_dictionary(parent?).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

/// 依序合併多份文件
pub fn merge_documents(documents: Vec<Document>) -> Result<Document> {
    if documents.is_empty() {
        return Err(ExhibitError::validation("No documents to merge"));
    }

    let mut next_id = 1;
    let mut pages: Vec<(ObjectId, Dictionary)> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for mut doc in documents {
        doc.renumber_objects_with(next_id);
        next_id = doc.max_id + 1;

        for page_id in doc.get_pages().into_values() {
            let mut page = doc.get_dictionary(page_id)?.clone();
            for key in INHERITABLE_KEYS {
                if !page.has(key) {
                    if let Some(value) = inherited_attribute(&doc, &page, key) {
                        page.set(key.to_vec(), value);
                    }
                }
            }
            pages.push((page_id, page));
        }

        for (id, object) in doc.objects {
            match object_type(&object) {
                Some(b"Catalog") | Some(b"Pages") | Some(b"Page") | Some(b"Outlines")
                | Some(b"Outline") => {}
                _ => {
                    objects.insert(id, object);
                }
            }
        }
    }

    let mut merged = Document::with_version("1.5");
    merged.objects = objects;
    merged.max_id = next_id;
    let pages_id = merged.new_object_id();

    let mut kids = Vec::with_capacity(pages.len());
    for (page_id, mut page) in pages {
        page.set("Parent", pages_id);
        merged.objects.insert(page_id, Object::Dictionary(page));
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    merged.trailer.set("Root", catalog_id);
    merged.compress();

    Ok(merged)
}

pub fn document_bytes(doc: &mut Document) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)?;
    Ok(buffer)
}

/// 寫入磁碟並回傳檔案大小
pub fn save_document(doc: &mut Document, path: &Path) -> Result<u64> {
    let bytes = document_bytes(doc)?;
    std::fs::write(path, &bytes)?;
    Ok(bytes.len() as u64)
}

pub fn page_count(path: &Path) -> Result<usize> {
    let doc = Document::load(path)?;
    Ok(doc.get_pages().len())
}

/// 在文件前加上封面，回傳內容頁數 (不含封面)
pub fn prepend_cover(
    source: &Path,
    output: &Path,
    label: &str,
    title: Option<&str>,
    summary: Option<&str>,
) -> Result<usize> {
    let content = Document::load(source)?;
    let content_pages = content.get_pages().len();
    if content_pages == 0 {
        return Err(ExhibitError::processing(format!(
            "PDF has no pages: {}",
            source.display()
        )));
    }

    let cover = cover_page(label, title, summary)?;
    let mut merged = merge_documents(vec![cover, content])?;
    save_document(&mut merged, output)?;
    Ok(content_pages)
}

/// 讀取前幾頁文字供分類使用，失敗時回傳 None
pub fn extract_text_sample(path: &Path, max_pages: usize) -> Option<String> {
    let doc = Document::load(path).ok()?;
    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().take(max_pages).collect();
    if page_numbers.is_empty() {
        return None;
    }
    doc.extract_text(&page_numbers)
        .ok()
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// 產生僅含文字的測試或佔位文件
pub fn text_document(pages: &[Vec<&str>]) -> Result<Document> {
    let mut builder = PdfBuilder::new();
    for lines in pages {
        let mut canvas = PageCanvas::new();
        let mut y = PAGE_HEIGHT - MARGIN;
        for line in lines {
            canvas.text(Font::Regular, 12.0, MARGIN, y, line);
            y -= 16.0;
        }
        builder.add_page(canvas)?;
    }
    Ok(builder.finish())
}
