//! Byte decoding and plain-text normalization

use crate::{NormalizedText, NormalizedTextBuilder, ParserError, Result};

/// How far into a `.txt` file to look for an HTML marker
const HTML_SNIFF_LEN: usize = 1000;

/// Windows-1252 code points for bytes 0x80..=0x9F; undefined slots fall back to Latin-1.
const CP1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}', '\u{017D}', '\u{008F}',
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}',
];

/// True when the head of a text file carries an `<html` or `<body` tag
pub fn looks_like_html(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(HTML_SNIFF_LEN)];
    let head = String::from_utf8_lossy(head).to_lowercase();
    head.contains("<html") || head.contains("<body")
}

/// Decode filing bytes to text
///
/// UTF-8 first (a leading BOM is dropped), then a Windows-1252 reading.
/// Content that looks binary is rejected instead of being decoded into noise.
pub fn decode_text(bytes: &[u8]) -> Result<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    if looks_binary(bytes) {
        return Err(ParserError::EncodingError(
            "content appears to be binary".to_string(),
        ));
    }

    match std::str::from_utf8(bytes) {
        Ok(s) => Ok(s.to_string()),
        Err(_) => Ok(bytes.iter().map(|&b| decode_cp1252(b)).collect()),
    }
}

fn decode_cp1252(byte: u8) -> char {
    match byte {
        0x80..=0x9F => CP1252_HIGH[(byte - 0x80) as usize],
        _ => byte as char,
    }
}

fn looks_binary(bytes: &[u8]) -> bool {
    if bytes.contains(&0) {
        return true;
    }
    let control = bytes
        .iter()
        .filter(|&&b| b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0C))
        .count();
    control * 10 > bytes.len()
}

/// Collapse every whitespace run (NBSP included) to one space and trim
pub fn collapse_whitespace(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize plain text: per-line whitespace collapse, at most one blank line between paragraphs
pub fn normalize_plain_text(source: &str) -> NormalizedText {
    let mut builder = NormalizedTextBuilder::default();
    let mut offset = 0;
    let mut pending_blank = false;

    for raw_line in source.split_inclusive('\n') {
        let line_start = offset;
        offset += raw_line.len();

        let collapsed = collapse_whitespace(raw_line);
        if collapsed.is_empty() {
            pending_blank = true;
            continue;
        }

        if pending_blank && !builder.is_empty() {
            builder.push_blank();
        }
        pending_blank = false;

        let lead = raw_line.len() - raw_line.trim_start().len();
        builder.push_line(&collapsed, Some(line_start + lead));
    }

    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_strips_bom() {
        let decoded = decode_text(b"\xEF\xBB\xBFProxy").unwrap();
        assert_eq!(decoded, "Proxy");
    }

    #[test]
    fn test_decode_windows_1252_fallback() {
        // "Company\x92s meeting" with a curly apostrophe, and a Latin-1 e-acute
        let decoded = decode_text(b"Company\x92s meeting at Caf\xe9").unwrap();
        assert_eq!(decoded, "Company\u{2019}s meeting at Caf\u{e9}");
    }

    #[test]
    fn test_decode_rejects_binary() {
        assert!(decode_text(&[0x01, 0x02, 0x03, 0x04, b'a']).is_err());
        assert!(decode_text(b"abc\0def").is_err());
        assert!(decode_text(b"line one\r\n\tline two\x0c").is_ok());
    }

    #[test]
    fn test_collapse_whitespace_handles_nbsp() {
        assert_eq!(
            collapse_whitespace("  Cupertino,\u{a0}\u{a0}California \t "),
            "Cupertino, California"
        );
    }

    #[test]
    fn test_normalize_plain_text_squeezes_blank_runs() {
        let normalized = normalize_plain_text("\n\nNOTICE\r\n\r\n\r\n  of   annual\tmeeting\n\n");
        assert_eq!(normalized.as_str(), "NOTICE\n\nof annual meeting");
        assert_eq!(normalized.lines().len(), 2);
    }

    #[test]
    fn test_looks_like_html() {
        assert!(looks_like_html(b"<DOCUMENT>\n<TEXT>\n<HTML>"));
        assert!(looks_like_html(b"<body>"));
        assert!(!looks_like_html(b"UNITED STATES SECURITIES AND EXCHANGE COMMISSION"));

        let mut late = vec![b' '; HTML_SNIFF_LEN + 10];
        late.extend_from_slice(b"<html>");
        assert!(!looks_like_html(&late));
    }
}
