//! Syntax validation: a pure regex check over the trimmed address.

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$")
        .expect("email regex is valid")
});

/// The local-part/domain split of a syntactically valid address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAddress {
    pub normalized: String,
    pub local_part: String,
    pub domain: String,
}

/// Trim the input and validate it against the spec's address regex.
///
/// Returns `None` for anything that doesn't match: no `@`, empty local-part
/// or domain, a domain with no dot, or a TLD shorter than two letters.
pub fn validate(address: &str) -> Option<ParsedAddress> {
    let normalized = address.trim().to_string();
    if !EMAIL_RE.is_match(&normalized) {
        return None;
    }
    let at = normalized.rfind('@')?;
    let local_part = normalized[..at].to_string();
    let domain = normalized[at + 1..].to_string();
    Some(ParsedAddress {
        normalized,
        local_part,
        domain,
    })
}
