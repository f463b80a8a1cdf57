//! Catch-all detection: re-probe the same MX with a synthetic address
//! and see if the server accepts anything.

use rand::Rng;

use crate::smtp::SmtpProber;
use crate::verdict::ProbeOutcome;

/// Builds `verify_<8-hex>@<domain>` with a fresh random suffix on every call.
/// 32 bits of entropy (`u32` as 8 hex digits) is enough to make an
/// accidental collision with a real mailbox implausible.
pub fn random_probe_address(domain: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen();
    format!("verify_{suffix:08x}@{domain}")
}

/// Re-probes `mx_host` with a synthetic local-part and reports whether the
/// server accepted it too. Only meaningful (and only called by the
/// orchestrator) when the user probe already came back `valid` — callers
/// MUST run this strictly after, never concurrently with, the user probe
/// against the same MX.
pub async fn detect(prober: &dyn SmtpProber, domain: &str, mx_host: &str) -> bool {
    let probe_address = random_probe_address(domain);
    matches!(prober.probe(&probe_address, mx_host).await, ProbeOutcome::Valid(_))
}
