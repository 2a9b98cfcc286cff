//! Source documents and the page units they are split into.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Media types the pipeline knows how to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Pdf,
    Png,
    Jpeg,
    Gif,
    Webp,
    Tiff,
    Csv,
    PlainText,
}

impl MediaType {
    /// MIME string sent to the model backend.
    pub fn mime(&self) -> &'static str {
        match self {
            MediaType::Pdf => "application/pdf",
            MediaType::Png => "image/png",
            MediaType::Jpeg => "image/jpeg",
            MediaType::Gif => "image/gif",
            MediaType::Webp => "image/webp",
            MediaType::Tiff => "image/tiff",
            MediaType::Csv => "text/csv",
            MediaType::PlainText => "text/plain",
        }
    }

    /// Parse a MIME string (parameters such as `; charset=utf-8` are ignored).
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "application/pdf" => Some(MediaType::Pdf),
            "image/png" => Some(MediaType::Png),
            "image/jpeg" | "image/jpg" => Some(MediaType::Jpeg),
            "image/gif" => Some(MediaType::Gif),
            "image/webp" => Some(MediaType::Webp),
            "image/tiff" => Some(MediaType::Tiff),
            "text/csv" => Some(MediaType::Csv),
            "text/plain" => Some(MediaType::PlainText),
            _ => None,
        }
    }

    /// Guess from a file name's extension.
    pub fn from_extension(name: &str) -> Option<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())?
            .to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(MediaType::Pdf),
            "png" => Some(MediaType::Png),
            "jpg" | "jpeg" => Some(MediaType::Jpeg),
            "gif" => Some(MediaType::Gif),
            "webp" => Some(MediaType::Webp),
            "tif" | "tiff" => Some(MediaType::Tiff),
            "csv" => Some(MediaType::Csv),
            "txt" | "text" => Some(MediaType::PlainText),
            _ => None,
        }
    }

    /// Sniff well-known magic bytes.
    pub fn from_magic(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
            Some(MediaType::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(MediaType::Jpeg)
        } else if bytes.starts_with(b"GIF8") {
            Some(MediaType::Gif)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(MediaType::Webp)
        } else if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
            Some(MediaType::Tiff)
        } else if has_pdf_header(bytes) {
            Some(MediaType::Pdf)
        } else {
            None
        }
    }

    /// Detect the media type of a named document.
    ///
    /// Magic bytes win over the extension. A `.pdf` name without a PDF
    /// header is still a PDF and is left for the splitter to reject. A
    /// `.csv` extension refines otherwise-unrecognised text; anything else
    /// is plain text.
    pub fn detect(name: &str, bytes: &[u8]) -> Self {
        if let Some(m) = Self::from_magic(bytes) {
            return m;
        }
        match Self::from_extension(name) {
            Some(MediaType::Pdf) => MediaType::Pdf,
            Some(MediaType::Csv) => MediaType::Csv,
            _ => MediaType::PlainText,
        }
    }

    /// Whether the content is textual and can be sent inline as a text part.
    pub fn is_text(&self) -> bool {
        matches!(self, MediaType::Csv | MediaType::PlainText)
    }
}

/// pdfium accepts a `%PDF` header anywhere in the first kilobyte.
const PDF_HEADER_WINDOW: usize = 1024;

fn has_pdf_header(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(PDF_HEADER_WINDOW)];
    window.windows(4).any(|w| w == b"%PDF")
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// An uploaded document before it is split.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// File name or URL the bytes came from; used in logs and errors.
    pub name: String,
    pub bytes: Vec<u8>,
    pub media_type: MediaType,
}

impl SourceDocument {
    /// Build a document, detecting its media type from name and content.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let media_type = MediaType::detect(&name, &bytes);
        Self {
            name,
            bytes,
            media_type,
        }
    }

    /// Build a document with an explicitly declared media type.
    pub fn with_media_type(name: impl Into<String>, bytes: Vec<u8>, media_type: MediaType) -> Self {
        Self {
            name: name.into(),
            bytes,
            media_type,
        }
    }
}

/// One page of a source document: the unit of parallel extraction work.
#[derive(Debug, Clone)]
pub struct PageUnit {
    /// 0-based page index; order preserving.
    pub index: usize,
    pub content: Vec<u8>,
    pub media_type: MediaType,
}

impl PageUnit {
    pub fn new(index: usize, content: Vec<u8>, media_type: MediaType) -> Self {
        Self {
            index,
            content,
            media_type,
        }
    }

    /// 1-indexed page number for logs and results.
    pub fn page_num(&self) -> usize {
        self.index + 1
    }
}
