//! Provider classification: map MX exchange hostnames to a human label.
//!
//! The table is an ordered list of (pattern, label) pairs scanned linearly —
//! do not reorder it. Order encodes precedence (e.g. Google's own MX hosts
//! would also match a more generic rule if one existed above it).

const PROVIDER_TABLE: &[(&str, &str)] = &[
    ("google", "Google Workspace"),
    ("gmail", "Google Workspace"),
    ("outlook", "Microsoft Office 365"),
    ("microsoft", "Microsoft Office 365"),
    ("hotmail", "Microsoft Office 365"),
    ("pp.hosted", "Proofpoint (Enterprise)"),
    ("proofpoint", "Proofpoint (Enterprise)"),
    ("mimecast", "Mimecast (Enterprise)"),
    ("yandex", "Yandex"),
    ("zoho", "Zoho Mail"),
    ("yahoo", "Yahoo/AOL"),
    ("icloud", "Apple iCloud"),
    ("apple", "Apple iCloud"),
    ("proton", "ProtonMail"),
    ("fastmail", "FastMail"),
    ("gmx", "GMX Mail"),
    ("mail.ru", "Mail.ru"),
    ("mailru", "Mail.ru"),
    ("mailgun", "Mailgun"),
    ("sendgrid", "SendGrid"),
    ("rackspace", "Rackspace Email"),
    ("1and1", "IONOS (1&1)"),
    ("ionos", "IONOS (1&1)"),
    ("godaddy", "GoDaddy"),
];

const CUSTOM_PROVIDER: &str = "Custom/Private Server";
const UNKNOWN_PROVIDER: &str = "Unknown";

/// Classify a domain's mail provider from its MX exchange hostnames.
///
/// `exchanges` need not be sorted; every hostname is concatenated (lowercase)
/// into one haystack before the first matching pattern wins. An empty slice
/// classifies as `Unknown`.
pub fn classify<S: AsRef<str>>(exchanges: &[S]) -> &'static str {
    if exchanges.is_empty() {
        return UNKNOWN_PROVIDER;
    }

    let haystack = exchanges
        .iter()
        .map(|s| s.as_ref().to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    for (pattern, label) in PROVIDER_TABLE {
        if haystack.contains(pattern) {
            return label;
        }
    }

    CUSTOM_PROVIDER
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_mx_is_unknown() {
        let empty: &[&str] = &[];
        assert_eq!(classify(empty), "Unknown");
    }

    #[test]
    fn google_wins_over_custom() {
        assert_eq!(classify(&["aspmx.l.google.com"]), "Google Workspace");
    }

    #[test]
    fn gmail_matches_too() {
        assert_eq!(classify(&["gmail-smtp-in.l.google.com"]), "Google Workspace");
    }

    #[test]
    fn microsoft_family() {
        assert_eq!(
            classify(&["acme-example-com.mail.protection.outlook.com"]),
            "Microsoft Office 365"
        );
    }

    #[test]
    fn unrecognized_host_is_custom() {
        assert_eq!(classify(&["mx.acme.example"]), "Custom/Private Server");
    }

    #[test]
    fn case_insensitive_matching() {
        assert_eq!(classify(&["ASPMX.L.GOOGLE.COM"]), "Google Workspace");
    }
}
