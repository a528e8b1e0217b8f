//! Content extraction: turning a file on disk into an analyzable payload.
//!
//! Text-bearing formats are read or parsed into a string; raster images pass
//! through as bytes for a vision-capable model. PDFs try their text layer
//! first and fall back to rasterizing the first page when the layer is too
//! thin to be useful (scanned documents).

use crate::error::ExtractError;
use std::io::Cursor;
use std::path::Path;

/// Minimum trimmed text length for a PDF text layer to count as meaningful.
const MIN_TEXT_LENGTH: usize = 50;

/// Number of leading PDF pages read for analysis.
const MAX_PDF_PAGES: usize = 10;

/// MIME type reported for undecodable binary content.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Payload handed to an analysis provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Text(String),
    Image { data: Vec<u8>, mime_type: String },
}

/// Extract analyzable content from a file, dispatching on its extension.
pub fn extract(path: &Path) -> Result<FileContent, ExtractError> {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    match ext.as_deref() {
        Some("pdf") => extract_pdf(path),

        // Raster formats the providers accept as-is
        Some("png") | Some("jpg") | Some("jpeg") | Some("gif") | Some("webp") => {
            let data = read_bytes(path)?;
            let mime_type = mime_guess::from_path(path)
                .first_or_octet_stream()
                .essence_str()
                .to_string();
            Ok(FileContent::Image { data, mime_type })
        }

        // Containers the providers reject; transcode to PNG where possible
        Some("heic") | Some("heif") => transcode_image(path, "image/heic"),
        Some("bmp") => transcode_image(path, "image/bmp"),
        Some("tif") | Some("tiff") => transcode_image(path, "image/tiff"),

        // Office documents
        Some("xlsx") => extract_workbook::<calamine::Xlsx<_>>(path),
        Some("xls") => extract_workbook::<calamine::Xls<_>>(path),
        Some("docx") => extract_docx(path),

        Some(ext) if is_plain_text_ext(ext) => read_text(path).map(FileContent::Text),

        // Unknown: non-empty UTF-8 wins, otherwise treat it as opaque binary
        _ => {
            let data = read_bytes(path)?;
            match String::from_utf8(data) {
                Ok(text) if !text.is_empty() => Ok(FileContent::Text(text)),
                Ok(text) => Ok(FileContent::Image {
                    data: text.into_bytes(),
                    mime_type: OCTET_STREAM.to_string(),
                }),
                Err(err) => Ok(FileContent::Image {
                    data: err.into_bytes(),
                    mime_type: OCTET_STREAM.to_string(),
                }),
            }
        }
    }
}

fn is_plain_text_ext(ext: &str) -> bool {
    matches!(
        ext,
        "txt" | "md" | "csv" | "json" | "xml" | "html" | "htm" | "yaml" | "yml" | "toml" | "log"
            | "ini" | "cfg" | "conf" | "env" | "swift" | "py" | "js" | "ts" | "rs" | "sh"
            | "bash" | "zsh"
    )
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, ExtractError> {
    std::fs::read(path).map_err(|source| ExtractError::io(path, source))
}

/// Strict UTF-8 read for known text formats.
fn read_text(path: &Path) -> Result<String, ExtractError> {
    let bytes = read_bytes(path)?;
    String::from_utf8(bytes).map_err(|_| ExtractError::NotUtf8 {
        path: path.to_path_buf(),
    })
}

/// Per-page text from the first pages of a PDF; rasterizes page one when the
/// text layer is thin enough to suggest a scanned document.
fn extract_pdf(path: &Path) -> Result<FileContent, ExtractError> {
    let bytes = read_bytes(path)?;

    // pdf-extract (and its font stack) can panic on malformed input
    let pages = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(&bytes)
    })) {
        Ok(Ok(pages)) => pages,
        Ok(Err(err)) => {
            tracing::warn!("[Extract] PDF extraction failed for {}: {}", path.display(), err);
            return Err(ExtractError::Pdf(err.to_string()));
        }
        Err(_panic) => {
            tracing::error!(
                "[Extract] PDF extraction panicked for {} - likely malformed fonts",
                path.display()
            );
            return Err(ExtractError::Pdf(
                "extraction panicked - likely contains malformed fonts".to_string(),
            ));
        }
    };

    let mut text = String::new();
    for page in pages.iter().take(MAX_PDF_PAGES) {
        text.push_str(page);
        text.push('\n');
    }

    if text.trim().chars().count() > MIN_TEXT_LENGTH {
        return Ok(FileContent::Text(text));
    }

    tracing::debug!(
        "[Extract] PDF text layer too thin for {}, rasterizing first page",
        path.display()
    );
    match render_first_page(path) {
        Some(png) => Ok(FileContent::Image {
            data: png,
            mime_type: "image/png".to_string(),
        }),
        // Degraded but non-fatal: let the model see whatever text there was
        None => Ok(FileContent::Text(text)),
    }
}

/// Render the first PDF page at 2x scale to PNG.
#[cfg(feature = "pdfium")]
fn render_first_page(path: &Path) -> Option<Vec<u8>> {
    use pdfium_render::prelude::*;

    let pdfium = Pdfium::new(Pdfium::bind_to_system_library().ok()?);
    let document = pdfium.load_pdf_from_file(path, None).ok()?;
    let page = document.pages().get(0).ok()?;

    let config = PdfRenderConfig::new()
        .set_target_width((page.width().value * 2.0) as i32)
        .set_target_height((page.height().value * 2.0) as i32);
    let bitmap = page.render_with_config(&config).ok()?;

    let mut buffer = Vec::new();
    bitmap
        .as_image()
        .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
        .ok()?;
    Some(buffer)
}

#[cfg(not(feature = "pdfium"))]
fn render_first_page(_path: &Path) -> Option<Vec<u8>> {
    None
}

/// Decode an image container and re-encode it as PNG; if decoding fails the
/// original bytes go through under the container's own MIME type.
fn transcode_image(path: &Path, fallback_mime: &str) -> Result<FileContent, ExtractError> {
    let data = read_bytes(path)?;

    if let Ok(decoded) = image::load_from_memory(&data) {
        let mut png = Vec::new();
        if decoded
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .is_ok()
        {
            return Ok(FileContent::Image {
                data: png,
                mime_type: "image/png".to_string(),
            });
        }
    }

    tracing::debug!(
        "[Extract] Could not transcode {}, sending original bytes as {}",
        path.display(),
        fallback_mime
    );
    Ok(FileContent::Image {
        data,
        mime_type: fallback_mime.to_string(),
    })
}

/// Every sheet of a workbook as labelled, pipe-joined rows.
fn extract_workbook<R>(path: &Path) -> Result<FileContent, ExtractError>
where
    R: calamine::Reader<std::io::BufReader<std::fs::File>>,
    R::Error: std::fmt::Display,
{
    let mut workbook: R = calamine::open_workbook::<R, _>(path)
        .map_err(|err| ExtractError::Spreadsheet(err.to_string()))?;

    let mut all_text = String::new();
    let sheet_names = workbook.sheet_names();

    for sheet_name in &sheet_names {
        if let Ok(range) = workbook.worksheet_range(sheet_name) {
            all_text.push_str(&format!("\n=== Sheet: {} ===\n", sheet_name));

            for row in range.rows() {
                let row_text: Vec<String> = row
                    .iter()
                    .map(|cell| cell.to_string())
                    .filter(|cell| !cell.is_empty())
                    .collect();

                if !row_text.is_empty() {
                    all_text.push_str(&row_text.join(" | "));
                    all_text.push('\n');
                }
            }
        }
    }

    tracing::debug!(
        "[Extract] Workbook {}: {} sheet(s), {} chars",
        path.display(),
        sheet_names.len(),
        all_text.len()
    );
    Ok(FileContent::Text(all_text))
}

/// Paragraph and table text of a Word document.
fn extract_docx(path: &Path) -> Result<FileContent, ExtractError> {
    let bytes = read_bytes(path)?;
    let doc =
        docx_rs::read_docx(&bytes).map_err(|err| ExtractError::Document(err.to_string()))?;

    let mut all_text = String::new();
    for child in doc.document.children {
        collect_docx_text(&child, &mut all_text);
    }

    Ok(FileContent::Text(all_text))
}

fn collect_docx_text(element: &docx_rs::DocumentChild, output: &mut String) {
    match element {
        docx_rs::DocumentChild::Paragraph(paragraph) => {
            collect_paragraph_text(paragraph, output);
            output.push('\n');
        }
        docx_rs::DocumentChild::Table(table) => {
            for row in &table.rows {
                let docx_rs::TableChild::TableRow(table_row) = row;
                for cell in &table_row.cells {
                    let docx_rs::TableRowChild::TableCell(table_cell) = cell;
                    for content in &table_cell.children {
                        if let docx_rs::TableCellContent::Paragraph(paragraph) = content {
                            collect_paragraph_text(paragraph, output);
                            output.push_str(" | ");
                        }
                    }
                }
                output.push('\n');
            }
        }
        _ => {}
    }
}

fn collect_paragraph_text(paragraph: &docx_rs::Paragraph, output: &mut String) {
    for child in &paragraph.children {
        match child {
            docx_rs::ParagraphChild::Run(run) => collect_run_text(run, output),
            docx_rs::ParagraphChild::Hyperlink(link) => {
                for nested in &link.children {
                    if let docx_rs::ParagraphChild::Run(run) = nested {
                        collect_run_text(run, output);
                    }
                }
            }
            _ => {}
        }
    }
}

fn collect_run_text(run: &docx_rs::Run, output: &mut String) {
    for child in &run.children {
        if let docx_rs::RunChild::Text(text) = child {
            output.push_str(&text.text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_known_text_extension() {
        let mut file = NamedTempFile::with_suffix(".md").unwrap();
        writeln!(file, "# Quarterly report").unwrap();

        let content = extract(file.path()).unwrap();
        assert_eq!(
            content,
            FileContent::Text("# Quarterly report\n".to_string())
        );
    }

    #[test]
    fn test_known_text_extension_rejects_invalid_utf8() {
        let mut file = NamedTempFile::with_suffix(".txt").unwrap();
        file.write_all(&[0xff, 0xfe, 0x00]).unwrap();

        let err = extract(file.path()).unwrap_err();
        assert!(matches!(err, ExtractError::NotUtf8 { .. }));
    }

    #[test]
    fn test_unknown_extension_with_utf8_content() {
        let mut file = NamedTempFile::with_suffix(".notes").unwrap();
        write!(file, "meeting notes").unwrap();

        let content = extract(file.path()).unwrap();
        assert_eq!(content, FileContent::Text("meeting notes".to_string()));
    }

    #[test]
    fn test_unknown_extension_with_binary_content() {
        let mut file = NamedTempFile::with_suffix(".bin").unwrap();
        let bytes = [0x00u8, 0xff, 0x13, 0x37];
        file.write_all(&bytes).unwrap();

        let content = extract(file.path()).unwrap();
        match content {
            FileContent::Image { data, mime_type } => {
                assert_eq!(data, bytes);
                assert_eq!(mime_type, OCTET_STREAM);
            }
            other => panic!("expected binary payload, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_unknown_file_is_binary() {
        let file = NamedTempFile::with_suffix(".dat").unwrap();

        let content = extract(file.path()).unwrap();
        assert_eq!(
            content,
            FileContent::Image {
                data: Vec::new(),
                mime_type: OCTET_STREAM.to_string(),
            }
        );
    }

    #[test]
    fn test_raster_passthrough_keeps_bytes_and_mime() {
        let mut file = NamedTempFile::with_suffix(".png").unwrap();
        // Content is deliberately not a real PNG; passthrough must not decode
        let bytes = b"\x89PNG fake".to_vec();
        file.write_all(&bytes).unwrap();

        let content = extract(file.path()).unwrap();
        assert_eq!(
            content,
            FileContent::Image {
                data: bytes,
                mime_type: "image/png".to_string(),
            }
        );
    }

    #[test]
    fn test_jpeg_mime_lookup() {
        let mut file = NamedTempFile::with_suffix(".jpg").unwrap();
        file.write_all(b"not a real jpeg").unwrap();

        match extract(file.path()).unwrap() {
            FileContent::Image { mime_type, .. } => assert_eq!(mime_type, "image/jpeg"),
            other => panic!("expected image payload, got {:?}", other),
        }
    }

    #[test]
    fn test_bmp_is_transcoded_to_png() {
        let mut bmp = Vec::new();
        image::DynamicImage::ImageRgb8(image::RgbImage::new(2, 2))
            .write_to(&mut Cursor::new(&mut bmp), image::ImageFormat::Bmp)
            .unwrap();

        let mut file = NamedTempFile::with_suffix(".bmp").unwrap();
        file.write_all(&bmp).unwrap();

        match extract(file.path()).unwrap() {
            FileContent::Image { data, mime_type } => {
                assert_eq!(mime_type, "image/png");
                assert!(data.starts_with(&[0x89, 0x50, 0x4E, 0x47]));
            }
            other => panic!("expected image payload, got {:?}", other),
        }
    }

    #[test]
    fn test_undecodable_heic_falls_back_to_original_bytes() {
        let mut file = NamedTempFile::with_suffix(".heic").unwrap();
        let bytes = b"not decodable".to_vec();
        file.write_all(&bytes).unwrap();

        match extract(file.path()).unwrap() {
            FileContent::Image { data, mime_type } => {
                assert_eq!(data, bytes);
                assert_eq!(mime_type, "image/heic");
            }
            other => panic!("expected image payload, got {:?}", other),
        }
    }

    #[test]
    fn test_corrupt_pdf_is_an_error_not_a_panic() {
        let mut file = NamedTempFile::with_suffix(".pdf").unwrap();
        file.write_all(b"%PDF-1.7 garbage").unwrap();

        let err = extract(file.path()).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn test_corrupt_xlsx_is_a_spreadsheet_error() {
        let mut file = NamedTempFile::with_suffix(".xlsx").unwrap();
        file.write_all(b"not a zip archive").unwrap();

        let err = extract(file.path()).unwrap_err();
        assert!(matches!(err, ExtractError::Spreadsheet(_)));
    }

    #[test]
    fn test_docx_roundtrip_extracts_paragraph_text() {
        let file = NamedTempFile::with_suffix(".docx").unwrap();
        docx_rs::Docx::new()
            .add_paragraph(
                docx_rs::Paragraph::new()
                    .add_run(docx_rs::Run::new().add_text("Invoice for Acme Corp")),
            )
            .build()
            .pack(std::fs::File::create(file.path()).unwrap())
            .unwrap();

        match extract(file.path()).unwrap() {
            FileContent::Text(text) => assert!(text.contains("Invoice for Acme Corp")),
            other => panic!("expected text payload, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_reports_io_error() {
        let err = extract(Path::new("/nonexistent/nowhere.txt")).unwrap_err();
        assert!(matches!(err, ExtractError::Io { .. }));
    }
}
