use anyhow::{Context, Result};
use log::{debug, warn};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Text,
    Pdf,
    Docx,
}

impl DocumentKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "txt" | "text" | "md" => Some(DocumentKind::Text),
            "pdf" => Some(DocumentKind::Pdf),
            "docx" => Some(DocumentKind::Docx),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

/// Best-effort text extraction. Anything unreadable comes back as an empty string.
pub fn extract_text(bytes: &[u8], kind: DocumentKind) -> String {
    let result = match kind {
        DocumentKind::Text => Ok(String::from_utf8_lossy(bytes).into_owned()),
        DocumentKind::Pdf => extract_pdf(bytes),
        DocumentKind::Docx => extract_docx(bytes),
    };

    match result {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            debug!("{:?} document contained no text", kind);
            String::new()
        }
        Err(e) => {
            warn!("could not extract text from {:?} document: {:#}", kind, e);
            String::new()
        }
    }
}

/// Reads a file and extracts its text, picking the format from the extension.
pub fn extract_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read document: {}", path.display()))?;

    match DocumentKind::from_path(path) {
        Some(kind) => Ok(extract_text(&bytes, kind)),
        None => {
            warn!("unsupported document type: {}", path.display());
            Ok(String::new())
        }
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    let doc = lopdf::Document::load_mem(bytes).context("Failed to parse PDF")?;

    let mut text = String::new();
    for (page_num, _) in doc.get_pages() {
        if let Ok(page_text) = doc.extract_text(&[page_num]) {
            text.push_str(&page_text);
            text.push('\n');
        }
    }
    Ok(text)
}

fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).context("Failed to open DOCX")?;
    read_document_xml(&mut archive)
}

fn read_document_xml<R: Read + Seek>(archive: &mut zip::ZipArchive<R>) -> Result<String> {
    let mut document_xml = archive
        .by_name("word/document.xml")
        .context("DOCX has no word/document.xml")?;

    let mut xml = String::new();
    document_xml
        .read_to_string(&mut xml)
        .context("Failed to read word/document.xml")?;

    parse_docx_xml(&xml)
}

fn parse_docx_xml(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);

    let mut text = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event().context("Malformed DOCX XML")? {
            Event::Start(ref e) if e.local_name().as_ref() == b"t" => in_text = true,
            Event::End(ref e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => text.push('\n'),
                _ => {}
            },
            Event::Empty(ref e) if e.local_name().as_ref() == b"p" => text.push('\n'),
            Event::Text(e) if in_text => {
                if let Ok(chunk) = e.decode() {
                    text.push_str(&chunk);
                }
            }
            Event::GeneralRef(e) if in_text => {
                if let Ok(Some(ch)) = e.resolve_char_ref() {
                    text.push(ch);
                } else if let Ok(name) = e.decode() {
                    if let Some(value) = quick_xml::escape::resolve_predefined_entity(&name) {
                        text.push_str(value);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(text)
}

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

fn document_xml(text: &str) -> String {
    let mut body = String::new();
    for line in text.lines() {
        if line.is_empty() {
            body.push_str("<w:p/>");
        } else {
            body.push_str(&format!(
                r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
                quick_xml::escape::escape(line)
            ));
        }
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    )
}

/// Creates the directory `path` will be written into, if any.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display())),
        _ => Ok(()),
    }
}

/// Writes `text` as a minimal DOCX, one paragraph per line.
pub fn write_docx(path: &Path, text: &str) -> Result<()> {
    ensure_parent_dir(path)?;
    let file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default();

    let parts = [
        ("[Content_Types].xml", CONTENT_TYPES_XML.to_string()),
        ("_rels/.rels", ROOT_RELS_XML.to_string()),
        ("word/document.xml", document_xml(text)),
    ];

    for (name, content) in parts {
        zip.start_file(name, options)
            .with_context(|| format!("Failed to add {} to DOCX", name))?;
        zip.write_all(content.as_bytes())?;
    }

    zip.finish().context("Failed to finish DOCX archive")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Document, Object, Stream};
    use tempfile::tempdir;

    fn minimal_pdf(content: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.new_object_id();
        let resources_id = doc.new_object_id();
        let content_id = doc.new_object_id();
        let page_id = doc.new_object_id();

        doc.objects.insert(
            font_id,
            Object::Dictionary(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Courier",
            }),
        );
        doc.objects.insert(
            resources_id,
            Object::Dictionary(dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            }),
        );
        let stream = format!("BT /F1 12 Tf 50 700 Td ({}) Tj ET", content);
        doc.objects.insert(
            content_id,
            Object::Stream(Stream::new(dictionary! {}, stream.into_bytes())),
        );
        doc.objects.insert(
            page_id,
            Object::Dictionary(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => resources_id,
                "Contents" => content_id,
            }),
        );
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(DocumentKind::from_extension("TXT"), Some(DocumentKind::Text));
        assert_eq!(DocumentKind::from_extension("pdf"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_extension("docx"), Some(DocumentKind::Docx));
        assert_eq!(DocumentKind::from_extension("doc"), None);
        assert_eq!(DocumentKind::from_path(Path::new("resume")), None);
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(
            extract_text(b"Rust engineer\nBerlin", DocumentKind::Text),
            "Rust engineer\nBerlin"
        );
    }

    #[test]
    fn test_pdf_text() {
        let text = extract_text(&minimal_pdf("Agile Project Manager"), DocumentKind::Pdf);
        assert!(text.contains("Agile Project Manager"), "got {:?}", text);
    }

    #[test]
    fn test_malformed_input_is_empty() {
        assert_eq!(extract_text(b"not a pdf", DocumentKind::Pdf), "");
        assert_eq!(extract_text(b"not a zip", DocumentKind::Docx), "");
        assert_eq!(extract_text(b"   \n", DocumentKind::Text), "");
    }

    #[test]
    fn test_docx_write_then_extract() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rewritten_resume.docx");
        let text = "Jane Doe\n\nSkills: Rust & Go <fast>\nExperience";

        write_docx(&path, text).unwrap();
        let extracted = extract_file(&path).unwrap();

        let lines: Vec<&str> = extracted.lines().collect();
        assert_eq!(lines, vec!["Jane Doe", "", "Skills: Rust & Go <fast>", "Experience"]);
    }

    #[test]
    fn test_write_docx_creates_output_dir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out/drafts/rewritten_resume.docx");

        write_docx(&path, "Jane Doe\nRust").unwrap();

        assert!(path.exists());
        assert_eq!(extract_file(&path).unwrap().lines().next(), Some("Jane Doe"));
    }

    #[test]
    fn test_docx_entities_and_char_refs() {
        let xml = r#"<w:document xmlns:w="x"><w:body><w:p><w:r><w:t>R&amp;D &#8211; caf&#xE9;</w:t></w:r></w:p></w:body></w:document>"#;
        assert_eq!(parse_docx_xml(xml).unwrap(), "R&D \u{2013} caf\u{e9}\n");
    }

    #[test]
    fn test_document_xml_one_paragraph_per_line() {
        let xml = document_xml("one\ntwo\nthree");
        assert_eq!(xml.matches("<w:p>").count(), 3);
        assert!(document_xml("a & b").contains("a &amp; b"));
    }

    #[test]
    fn test_extract_file_unsupported_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("resume.rtf");
        std::fs::write(&path, "{\\rtf1 hello}").unwrap();
        assert_eq!(extract_file(&path).unwrap(), "");
    }

    #[test]
    fn test_extract_file_missing_is_error() {
        assert!(extract_file(Path::new("/nonexistent/resume.txt")).is_err());
    }
}
