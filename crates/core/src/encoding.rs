//! Percent-encoding for URL components.

/// Percent-encode `s` for use inside a URL path segment or query value.
///
/// Only RFC 3986 unreserved bytes pass through; everything else, including
/// each byte of a multi-byte character, becomes `%XX` in upper-case hex.
pub fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}
