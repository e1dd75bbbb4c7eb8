//! services/api/src/adapters/resume_parser.rs
//!
//! Plain-text extraction from uploaded resumes. PDF goes through `pdf-extract`;
//! DOCX is a zip archive whose `word/document.xml` holds the runs of text.

use quick_xml::events::Event;
use quick_xml::Reader;
use roadmap_core::ports::PortError;
use std::io::{Cursor, Read};
use zip::ZipArchive;

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const DOCX_BODY: &str = "word/document.xml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeFormat {
    Pdf,
    Docx,
}

impl ResumeFormat {
    /// Maps an upload's content type to a supported format. Parameters such as
    /// `; charset=...` are ignored.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        if essence.eq_ignore_ascii_case(PDF_MIME) {
            Some(Self::Pdf)
        } else if essence.eq_ignore_ascii_case(DOCX_MIME) {
            Some(Self::Docx)
        } else {
            None
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResumeParseError {
    #[error("Failed to extract text from PDF: {0}")]
    Pdf(String),
    #[error("Failed to extract text from DOCX: {0}")]
    Docx(String),
}

impl From<ResumeParseError> for PortError {
    fn from(e: ResumeParseError) -> Self {
        PortError::Validation(e.to_string())
    }
}

/// Extracts the raw text of a resume. CPU bound; call it off the async runtime.
pub fn extract_text(format: ResumeFormat, bytes: &[u8]) -> Result<String, ResumeParseError> {
    let text = match format {
        ResumeFormat::Pdf => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ResumeParseError::Pdf(e.to_string()))?,
        ResumeFormat::Docx => docx_text(bytes)?,
    };
    Ok(text.trim().to_string())
}

fn docx_error(e: impl std::fmt::Display) -> ResumeParseError {
    ResumeParseError::Docx(e.to_string())
}

fn docx_text(bytes: &[u8]) -> Result<String, ResumeParseError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(docx_error)?;
    let mut xml = String::new();
    archive
        .by_name(DOCX_BODY)
        .map_err(docx_error)?
        .read_to_string(&mut xml)
        .map_err(docx_error)?;

    let mut reader = Reader::from_str(&xml);
    let mut text = String::new();
    let mut in_run_text = false;
    loop {
        match reader.read_event().map_err(docx_error)? {
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_run_text = true,
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_run_text = false,
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" => text.push('\t'),
                b"w:br" | b"w:cr" => text.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_run_text => text.push_str(&t.unescape().map_err(docx_error)?),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(text)
}
