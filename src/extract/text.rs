//! Text cleanup for scraped values.

/// Characters that show up in product pages but carry no meaning:
/// C0/C1 controls, zero-width and direction marks, and the BOM.
fn is_invisible(c: char) -> bool {
    matches!(c,
        '\u{0000}'..='\u{001F}'
        | '\u{007F}'..='\u{009F}'
        | '\u{200B}'..='\u{200F}'
        | '\u{FEFF}')
}

/// Strip invisible characters from `s`.
pub fn remove_invisible(s: &str) -> String {
    s.chars().filter(|c| !is_invisible(*c)).collect()
}

/// Truncate to at most `max` characters (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
