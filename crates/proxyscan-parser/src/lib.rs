//! proxyscan Parser - Filing text normalization
//!
//! Turns the primary document of a filing into plain text that the
//! classifiers can scan:
//! - HTML documents: visible text only, one line per block element
//! - Plain-text documents: whitespace collapsed, blank-line runs squeezed
//!
//! Both kinds go through [`normalize`], a pure function over
//! [`RawDocument`]. The resulting [`NormalizedText`] remembers roughly
//! where each of its lines came from in the source, so snippets can be
//! traced back for manual review.

pub mod html;
pub mod text;

use std::path::Path;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during document parsing
#[derive(Error, Debug)]
pub enum ParserError {
    /// File format is not supported
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// IO error while reading the file
    #[error("IO error reading file: {path}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Encoding error
    #[error("Text encoding error: {0}")]
    EncodingError(String),

    /// Nothing readable left after normalization
    #[error("Document contains no text")]
    EmptyDocument,
}

pub type Result<T> = std::result::Result<T, ParserError>;

// ============================================================================
// File Types
// ============================================================================

/// Supported file types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Html,
    PlainText,
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "html" | "htm" => Self::Html,
            "txt" => Self::PlainText,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from path
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }

    /// Detect file type from path, then look inside `.txt` files
    ///
    /// EDGAR submission text files frequently wrap an HTML document.
    pub fn detect(path: &Path, bytes: &[u8]) -> Self {
        match Self::from_path(path) {
            Self::PlainText if text::looks_like_html(bytes) => Self::Html,
            other => other,
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Html => write!(f, "html"),
            Self::PlainText => write!(f, "text"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

// ============================================================================
// Documents
// ============================================================================

/// Decoded filing content, tagged with its kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawDocument {
    Html(String),
    PlainText(String),
}

impl RawDocument {
    /// Decode raw bytes as the given kind
    pub fn decode(file_type: FileType, bytes: &[u8]) -> Result<Self> {
        let content = text::decode_text(bytes)?;
        match file_type {
            FileType::Html => Ok(Self::Html(content)),
            FileType::PlainText => Ok(Self::PlainText(content)),
            FileType::Unknown => Err(ParserError::UnsupportedFormat(file_type.to_string())),
        }
    }

    /// The decoded source text
    pub fn source(&self) -> &str {
        match self {
            Self::Html(s) | Self::PlainText(s) => s,
        }
    }

    pub fn file_type(&self) -> FileType {
        match self {
            Self::Html(_) => FileType::Html,
            Self::PlainText(_) => FileType::PlainText,
        }
    }
}

/// Where a normalized line starts, in normalized and source coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineOrigin {
    /// Byte offset of the line in the normalized text
    pub offset: usize,

    /// Approximate byte offset of the line's first word in the decoded source
    pub source_offset: Option<usize>,
}

/// Normalized filing text plus its line origin map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedText {
    text: String,
    lines: Vec<LineOrigin>,
}

impl NormalizedText {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn lines(&self) -> &[LineOrigin] {
        &self.lines
    }

    /// Map a normalized byte offset back to the decoded source
    ///
    /// Resolution is per line: the result is where the containing line
    /// starts in the source, or `None` when that could not be located.
    pub fn source_offset(&self, offset: usize) -> Option<usize> {
        let idx = self.lines.partition_point(|line| line.offset <= offset);
        idx.checked_sub(1)
            .and_then(|i| self.lines.get(i))
            .and_then(|line| line.source_offset)
    }
}

/// Incremental builder shared by the HTML and plain-text normalizers
#[derive(Debug, Default)]
pub(crate) struct NormalizedTextBuilder {
    text: String,
    lines: Vec<LineOrigin>,
}

impl NormalizedTextBuilder {
    /// Append a non-empty, already collapsed line
    pub(crate) fn push_line(&mut self, line: &str, source_offset: Option<usize>) {
        if line.is_empty() {
            return;
        }
        if !self.text.is_empty() {
            self.text.push('\n');
        }
        self.lines.push(LineOrigin {
            offset: self.text.len(),
            source_offset,
        });
        self.text.push_str(line);
    }

    /// Separate paragraphs with one blank line
    pub(crate) fn push_blank(&mut self) {
        if !self.text.is_empty() && !self.text.ends_with("\n\n") {
            self.text.push('\n');
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub(crate) fn finish(mut self) -> NormalizedText {
        while self.text.ends_with('\n') {
            self.text.pop();
        }
        NormalizedText {
            text: self.text,
            lines: self.lines,
        }
    }
}

// ============================================================================
// Entry Points
// ============================================================================

/// Normalize a decoded document
pub fn normalize(doc: &RawDocument) -> NormalizedText {
    match doc {
        RawDocument::Html(source) => html::extract_visible_text(source),
        RawDocument::PlainText(source) => text::normalize_plain_text(source),
    }
}

/// Detect, decode and normalize a document held in memory
pub fn parse_document(file_name: &str, bytes: &[u8]) -> Result<NormalizedText> {
    let file_type = FileType::detect(Path::new(file_name), bytes);
    if file_type == FileType::Unknown {
        return Err(ParserError::UnsupportedFormat(
            Path::new(file_name)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("none")
                .to_string(),
        ));
    }

    let doc = RawDocument::decode(file_type, bytes)?;
    let normalized = normalize(&doc);
    if normalized.is_empty() {
        return Err(ParserError::EmptyDocument);
    }

    Ok(normalized)
}

/// Read and normalize a document from disk
pub fn parse_file(path: &Path) -> Result<NormalizedText> {
    let bytes = std::fs::read(path).map_err(|e| ParserError::IoError {
        path: path.display().to_string(),
        source: e,
    })?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    parse_document(file_name, &bytes)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_file_type_detection() {
        assert_eq!(FileType::from_extension("htm"), FileType::Html);
        assert_eq!(FileType::from_extension("HTML"), FileType::Html);
        assert_eq!(FileType::from_extension("txt"), FileType::PlainText);
        assert_eq!(FileType::from_extension("pdf"), FileType::Unknown);
    }

    #[test]
    fn test_txt_wrapping_html_is_sniffed() {
        let path = Path::new("full-submission.txt");
        let wrapped = b"<SEC-DOCUMENT>\n<DOCUMENT>\n<TEXT>\n<html><body><p>Proxy</p></body></html>";
        assert_eq!(FileType::detect(path, wrapped), FileType::Html);
        assert_eq!(FileType::detect(path, b"Plain proxy text"), FileType::PlainText);
    }

    #[test]
    fn test_parse_document_html() {
        let html = b"<html><head><title>DEF 14A</title></head><body>\
            <p>Notice of Annual Meeting</p><p>The meeting will be held virtually.</p>\
            </body></html>";

        let normalized = parse_document("proxy.htm", html).unwrap();
        assert_eq!(
            normalized.as_str(),
            "Notice of Annual Meeting\nThe meeting will be held virtually."
        );
    }

    #[test]
    fn test_parse_document_empty_is_error() {
        assert!(matches!(
            parse_document("proxy.htm", b""),
            Err(ParserError::EmptyDocument)
        ));
        assert!(matches!(
            parse_document("proxy.htm", b"<html><body><script>x()</script></body></html>"),
            Err(ParserError::EmptyDocument)
        ));
    }

    #[test]
    fn test_parse_document_binary_is_error() {
        let bytes = [0x25, 0x50, 0x44, 0x46, 0x00, 0x01, 0x02, 0x03];
        assert!(matches!(
            parse_document("proxy.txt", &bytes),
            Err(ParserError::EncodingError(_))
        ));
    }

    #[test]
    fn test_parse_document_unsupported() {
        assert!(matches!(
            parse_document("proxy.pdf", b"%PDF-1.7"),
            Err(ParserError::UnsupportedFormat(ext)) if ext == "pdf"
        ));
    }

    #[test]
    fn test_source_offset_plain_text() {
        let source = "  Proxy Statement\n\n\n   Annual   Meeting  ";
        let normalized = normalize(&RawDocument::PlainText(source.to_string()));

        assert_eq!(normalized.as_str(), "Proxy Statement\n\nAnnual Meeting");
        let annual = normalized.as_str().find("Annual").unwrap();
        let origin = normalized.source_offset(annual + 3).unwrap();
        assert_eq!(&source[origin..origin + 6], "Annual");
        assert_eq!(normalized.source_offset(0), Some(2));
    }

    #[test]
    fn test_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxy.txt");
        std::fs::write(&path, "Annual meeting\n\n\n\nheld in person").unwrap();

        let normalized = parse_file(&path).unwrap();
        assert_eq!(normalized.as_str(), "Annual meeting\n\nheld in person");

        assert!(matches!(
            parse_file(&dir.path().join("missing.txt")),
            Err(ParserError::IoError { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_normalization_is_deterministic(source in "[ a-zA-Z0-9.,\n\t]{0,400}") {
            let doc = RawDocument::PlainText(source.clone());
            prop_assert_eq!(normalize(&doc), normalize(&doc));

            let html = RawDocument::Html(format!("<p>{}</p><div>{}</div>", source, source));
            prop_assert_eq!(normalize(&html), normalize(&html));
        }

        #[test]
        fn prop_plain_text_normalization_is_a_fixpoint(source in "[ a-zA-Z0-9.,\n\t\r]{0,400}") {
            let once = normalize(&RawDocument::PlainText(source));
            let twice = normalize(&RawDocument::PlainText(once.as_str().to_string()));
            prop_assert_eq!(once.as_str(), twice.as_str());
        }

        #[test]
        fn prop_lines_have_no_redundant_whitespace(source in "[ a-z\n\t]{0,300}") {
            let normalized = normalize(&RawDocument::PlainText(source));
            for line in normalized.as_str().split('\n') {
                prop_assert_eq!(line.trim(), line);
                prop_assert!(!line.contains("  "));
                prop_assert!(!line.contains('\t'));
            }
            prop_assert!(!normalized.as_str().contains("\n\n\n"));
        }
    }
}
