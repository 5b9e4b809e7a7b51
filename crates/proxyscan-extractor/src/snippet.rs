//! Char-boundary-safe excerpting

use proxyscan_core::Snippet;

/// Largest char boundary at or below `idx`
pub fn floor_char_boundary(text: &str, idx: usize) -> usize {
    let mut idx = idx.min(text.len());
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Smallest char boundary at or above `idx`
pub fn ceil_char_boundary(text: &str, idx: usize) -> usize {
    let mut idx = idx.min(text.len());
    while !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

/// Excerpt `text[start..end]` with `context` bytes either side, at most `max_len` bytes
///
/// When the widened excerpt is too long it is re-centred on the match; a
/// match longer than `max_len` is cut from its start.
pub fn around(text: &str, start: usize, end: usize, context: usize, max_len: usize) -> Snippet {
    let start = floor_char_boundary(text, start);
    let end = ceil_char_boundary(text, end.max(start));

    let mut lo = floor_char_boundary(text, start.saturating_sub(context));
    let mut hi = ceil_char_boundary(text, end.saturating_add(context));

    if hi - lo > max_len {
        let matched = end - start;
        if matched >= max_len {
            lo = start;
        } else {
            let lead = (max_len - matched) / 2;
            lo = ceil_char_boundary(text, start.saturating_sub(lead));
        }
        hi = floor_char_boundary(text, lo + max_len);
    }

    slice(text, lo, hi)
}

/// Whitespace-trimmed excerpt of `text[start..end]`, offsets adjusted to match
pub fn slice(text: &str, start: usize, end: usize) -> Snippet {
    let start = floor_char_boundary(text, start);
    let end = floor_char_boundary(text, end).max(start);

    let raw = &text[start..end];
    let trimmed_start = start + (raw.len() - raw.trim_start().len());
    let trimmed_end = start + raw.trim_end().len();

    if trimmed_start >= trimmed_end {
        return Snippet {
            text: String::new(),
            start,
            end: start,
        };
    }

    Snippet {
        text: text[trimmed_start..trimmed_end].to_string(),
        start: trimmed_start,
        end: trimmed_end,
    }
}
