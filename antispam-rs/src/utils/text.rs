/// True when `s` is non-empty and made of a single repeated character
pub fn same_char(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => chars.all(|c| c == first),
        None => false,
    }
}

/// Keyword lengths are measured in bytes
pub fn byte_len_below(s: &str, min_len: usize) -> bool {
    s.len() < min_len
}
