//! Shared utility functions used across the codebase.

/// Largest char boundary at or below `max_bytes`.
pub fn safe_truncate_index(s: &str, max_bytes: usize) -> usize {
    if s.len() <= max_bytes {
        return s.len();
    }
    // Find the last valid char boundary at or before max_bytes
    s.char_indices()
        .take_while(|(i, _)| *i < max_bytes)
        .last()
        .map(|(i, c)| {
            let end = i + c.len_utf8();
            if end > max_bytes {
                i
            } else {
                end
            }
        })
        .unwrap_or(0)
}

/// Cut `s` to at most `max_bytes` (UTF-8 safe), appending `marker` when cut.
pub fn truncate_with_marker(s: &str, max_bytes: usize, marker: &str) -> String {
    let end = safe_truncate_index(s, max_bytes);
    if end == s.len() {
        s.to_string()
    } else {
        format!("{}{}", &s[..end], marker)
    }
}

/// Cut `s` to at most `max_chars` characters, no marker.
pub fn preview(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
