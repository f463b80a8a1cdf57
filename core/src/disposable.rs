//! Disposable-domain registry: a compile-time-loaded set, never fetched
//! per request. Unions the spec's curated list with the `mailchecker` crate's
//! bundled list so the registry stays current without a network call.

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// The curated list named explicitly in the spec. Extend this array to add
/// domains the shipped `mailchecker` data doesn't yet cover.
const CURATED_DISPOSABLE_DOMAINS: &[&str] = &[
    "mailinator.com",
    "guerrillamail.com",
    "yopmail.com",
    "10minutemail.com",
    "sharklasers.com",
    "tempmail.com",
    "throwawaymail.com",
];

static CURATED: Lazy<HashSet<&'static str>> =
    Lazy::new(|| CURATED_DISPOSABLE_DOMAINS.iter().copied().collect());

/// True if `domain` (any case) is a known disposable/temporary-email
/// provider.
pub fn is_disposable(domain: &str) -> bool {
    let lower = domain.to_lowercase();
    if CURATED.contains(lower.as_str()) {
        return true;
    }
    // mailchecker::is_valid flags disposable (and a few other obviously bad)
    // domains as invalid; a syntactically fine local-part keeps this a pure
    // disposable-domain check rather than re-running our own syntax rules.
    !mailchecker::is_valid(&format!("probe@{lower}"))
}
