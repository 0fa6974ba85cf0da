//! Percent-escaping for the token's signature field
//!
//! Operates on the Base64 text of the signature after encoding, mapping the
//! reserved subset `+ space / ? % # & =` to `%XX` triples so the value can
//! sit inside an ampersand-delimited credential string. This is not the
//! codec's `EscapedNewline` layout: that one escapes encoding artifacts
//! while encoding, and the two escape sets differ.

/// Escape the reserved characters of `signature`, passing every other
/// character through unmodified.
pub fn escape_signature(signature: &str) -> String {
    let mut out = String::with_capacity(signature.len());
    for ch in signature.chars() {
        match ch {
            '+' => out.push_str("%2B"),
            ' ' => out.push_str("%20"),
            '/' => out.push_str("%2F"),
            '?' => out.push_str("%3F"),
            '%' => out.push_str("%25"),
            '#' => out.push_str("%23"),
            '&' => out.push_str("%26"),
            '=' => out.push_str("%3D"),
            _ => out.push(ch),
        }
    }
    out
}
