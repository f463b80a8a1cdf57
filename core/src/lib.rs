// mailverify
// Copyright (C) 2024 mailverify contributors

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! `mailverify-core` runs the staged email-address verification pipeline:
//! syntax validation, MX resolution, provider classification, disposable-
//! domain lookup, an SMTP `RCPT TO` probe, catch-all disambiguation, and
//! score/risk composition — with a pluggable verdict cache and a bounded-
//! parallelism bulk mode on top.
//!
//! The two network seams ([`MxResolver`] and [`SmtpProber`]) are traits so
//! the pipeline can be driven end to end in tests without opening a socket.
//!
//! ```no_run
//! use std::sync::Arc;
//! use mailverify_core::{Verifier, mx::HickoryMxResolver, smtp::TcpSmtpProber, cache::InMemoryVerdictCache};
//!
//! # async fn run() {
//! let verifier = Verifier::new(
//!     Arc::new(HickoryMxResolver::default()),
//!     Arc::new(TcpSmtpProber::default()),
//!     Arc::new(InMemoryVerdictCache::new()),
//! );
//! let verdict = verifier.verify("alice@example.com").await;
//! # }
//! ```

pub mod bulk;
pub mod cache;
pub mod catchall;
pub mod disposable;
pub mod mx;
pub mod provider;
pub mod smtp;
pub mod syntax;
pub mod verdict;

use std::sync::Arc;

use tracing::{debug, warn};

use cache::VerdictCache;
use mx::MxResolver;
use smtp::SmtpProber;
use verdict::{compose, CheckFlags, ComposerInput, ProbeOutcome, Verdict};

const LOG_TARGET: &str = "mailverify";

/// Ties the verification stages together behind one entry point.
///
/// Shared across the HTTP backend, the CLI, and the bulk executor via
/// `Arc<Verifier>` — there is exactly one implementation of the pipeline.
pub struct Verifier {
    mx_resolver: Arc<dyn MxResolver>,
    smtp_prober: Arc<dyn SmtpProber>,
    cache: Arc<dyn VerdictCache>,
}

impl Verifier {
    pub fn new(
        mx_resolver: Arc<dyn MxResolver>,
        smtp_prober: Arc<dyn SmtpProber>,
        cache: Arc<dyn VerdictCache>,
    ) -> Self {
        Verifier {
            mx_resolver,
            smtp_prober,
            cache,
        }
    }

    /// Verifies one address: cache lookup, then on miss the full pipeline,
    /// then a best-effort cache write. Cache failures never fail the
    /// request — they're logged and the live verdict is returned as-is.
    pub async fn verify(&self, email: &str) -> Verdict {
        let email = email.trim();

        match self.cache.get(email).await {
            Ok(Some(cached)) => {
                debug!(target: LOG_TARGET, %email, "cache hit");
                return cached;
            }
            Ok(None) => {
                debug!(target: LOG_TARGET, %email, "cache miss");
            }
            Err(err) => {
                warn!(target: LOG_TARGET, %email, error = %err, "cache read failed, evaluating live");
            }
        }

        let verdict = self.evaluate(email).await;

        if let Err(err) = self.cache.put(email, &verdict).await {
            warn!(target: LOG_TARGET, %email, error = %err, "cache write failed");
        }

        verdict
    }

    async fn evaluate(&self, email: &str) -> Verdict {
        let Some(parsed) = syntax::validate(email) else {
            debug!(target: LOG_TARGET, %email, "syntax check failed");
            return compose(ComposerInput::new(email, "Unknown"));
        };

        let mut checks = CheckFlags {
            syntax: true,
            domain: true,
            mx: false,
            disposable: false,
            smtp_status: ProbeOutcome::default(),
            catch_all: false,
        };

        let mx_set = self.mx_resolver.resolve(&parsed.domain).await;
        checks.mx = mx_set.as_ref().is_some_and(|set| !set.is_empty());
        debug!(target: LOG_TARGET, %email, mx_found = checks.mx, "MX resolution complete");

        if !checks.mx {
            checks.domain = false;
            let mut input = ComposerInput::new(parsed.normalized, "Unknown");
            input.checks = checks;
            return compose(input);
        }
        let mx_set = mx_set.expect("checked non-empty above");

        let provider = provider::classify(&mx_set.exchanges());

        checks.disposable = disposable::is_disposable(&parsed.domain);
        if checks.disposable {
            debug!(target: LOG_TARGET, %email, "domain is disposable");
            let mut input = ComposerInput::new(parsed.normalized, provider);
            input.checks = checks;
            return compose(input);
        }

        let primary = mx_set
            .primary()
            .expect("non-empty MxRecordSet has a primary exchange");

        let probe_outcome = self.smtp_prober.probe(&parsed.normalized, &primary.exchange).await;
        debug!(target: LOG_TARGET, %email, outcome = ?probe_outcome, "SMTP probe complete");
        checks.smtp_status = probe_outcome.clone();

        if probe_outcome.is_valid() {
            checks.catch_all = catchall::detect(
                self.smtp_prober.as_ref(),
                &parsed.domain,
                &primary.exchange,
            )
            .await;
            debug!(target: LOG_TARGET, %email, catch_all = checks.catch_all, "catch-all probe complete");
        }

        let mut input = ComposerInput::new(parsed.normalized, provider);
        input.checks = checks;
        compose(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mx::{MxRecord, MxRecordSet};

    struct FixedMxResolver(Option<MxRecordSet>);

    #[async_trait]
    impl MxResolver for FixedMxResolver {
        async fn resolve(&self, _domain: &str) -> Option<MxRecordSet> {
            self.0.clone()
        }
    }

    struct FixedProber {
        user: ProbeOutcome,
        random: ProbeOutcome,
    }

    #[async_trait]
    impl SmtpProber for FixedProber {
        async fn probe(&self, address: &str, _mx_host: &str) -> ProbeOutcome {
            if address.starts_with("verify_") {
                self.random.clone()
            } else {
                self.user.clone()
            }
        }
    }

    fn acme_mx() -> MxRecordSet {
        MxRecordSet {
            records: vec![MxRecord {
                preference: 10,
                exchange: "mx.acme.example".to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn valid_deliverable_end_to_end() {
        let verifier = Verifier::new(
            Arc::new(FixedMxResolver(Some(acme_mx()))),
            Arc::new(FixedProber {
                user: ProbeOutcome::Valid("250 ok".to_string()),
                random: ProbeOutcome::Invalid("550 user unknown".to_string()),
            }),
            Arc::new(cache::InMemoryVerdictCache::new()),
        );

        let verdict = verifier.verify("alice@acme.example").await;
        assert_eq!(verdict.status, verdict::FinalStatus::Valid);
        assert_eq!(verdict.score, 100);
        assert_eq!(verdict.cached, None);
    }

    #[tokio::test]
    async fn catch_all_end_to_end() {
        let verifier = Verifier::new(
            Arc::new(FixedMxResolver(Some(acme_mx()))),
            Arc::new(FixedProber {
                user: ProbeOutcome::Valid("250 ok".to_string()),
                random: ProbeOutcome::Valid("250 ok".to_string()),
            }),
            Arc::new(cache::InMemoryVerdictCache::new()),
        );

        let verdict = verifier.verify("alice@acme.example").await;
        assert_eq!(verdict.status, verdict::FinalStatus::CatchAll);
        assert_eq!(verdict.score, 80);
    }

    #[tokio::test]
    async fn no_mx_is_invalid() {
        let verifier = Verifier::new(
            Arc::new(FixedMxResolver(None)),
            Arc::new(FixedProber {
                user: ProbeOutcome::default(),
                random: ProbeOutcome::default(),
            }),
            Arc::new(cache::InMemoryVerdictCache::new()),
        );

        let verdict = verifier.verify("user@no-such-domain.invalid").await;
        assert_eq!(verdict.status, verdict::FinalStatus::Invalid);
        assert_eq!(verdict.reason, "Invalid Domain (No MX)");
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let verifier = Verifier::new(
            Arc::new(FixedMxResolver(Some(acme_mx()))),
            Arc::new(FixedProber {
                user: ProbeOutcome::Valid("250 ok".to_string()),
                random: ProbeOutcome::Invalid("550 user unknown".to_string()),
            }),
            Arc::new(cache::InMemoryVerdictCache::new()),
        );

        let first = verifier.verify("alice@acme.example").await;
        let second = verifier.verify("alice@acme.example").await;

        assert_eq!(first.status, second.status);
        assert_eq!(first.score, second.score);
        assert_eq!(first.cached, None);
        assert_eq!(second.cached, Some(true));
    }
}
