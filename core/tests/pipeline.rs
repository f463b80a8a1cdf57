//! End-to-end tests over the public `Verifier` API, scripted against mock
//! `MxResolver`/`SmtpProber` implementations — no real network access.

use std::sync::Arc;

use async_trait::async_trait;
use mailverify_core::bulk::verify_all;
use mailverify_core::cache::InMemoryVerdictCache;
use mailverify_core::mx::{MxRecord, MxRecordSet, MxResolver};
use mailverify_core::smtp::SmtpProber;
use mailverify_core::verdict::{FinalStatus, ProbeOutcome, RiskLevel};
use mailverify_core::Verifier;

struct ScriptedMx {
    domain: &'static str,
    exchange: &'static str,
}

#[async_trait]
impl MxResolver for ScriptedMx {
    async fn resolve(&self, domain: &str) -> Option<MxRecordSet> {
        if domain.eq_ignore_ascii_case(self.domain) {
            Some(MxRecordSet {
                records: vec![MxRecord {
                    preference: 10,
                    exchange: self.exchange.to_string(),
                }],
            })
        } else {
            None
        }
    }
}

struct ScriptedSmtp {
    user_outcome: ProbeOutcome,
    random_outcome: ProbeOutcome,
}

#[async_trait]
impl SmtpProber for ScriptedSmtp {
    async fn probe(&self, address: &str, _mx_host: &str) -> ProbeOutcome {
        if address.starts_with("verify_") {
            self.random_outcome.clone()
        } else {
            self.user_outcome.clone()
        }
    }
}

fn verifier(user_outcome: ProbeOutcome, random_outcome: ProbeOutcome) -> Verifier {
    Verifier::new(
        Arc::new(ScriptedMx {
            domain: "acme.example",
            exchange: "mx.acme.example",
        }),
        Arc::new(ScriptedSmtp {
            user_outcome,
            random_outcome,
        }),
        Arc::new(InMemoryVerdictCache::new()),
    )
}

#[tokio::test]
async fn syntax_error_short_circuits_before_any_network_call() {
    let verifier = verifier(ProbeOutcome::default(), ProbeOutcome::default());
    let verdict = verifier.verify("not-an-email").await;
    assert_eq!(verdict.status, FinalStatus::Invalid);
    assert_eq!(verdict.reason, "Syntax Error");
    assert_eq!(verdict.score, 0);
}

#[tokio::test]
async fn disposable_domain_is_invalid_and_critical() {
    let verifier = verifier(ProbeOutcome::default(), ProbeOutcome::default());
    let verdict = verifier.verify("person@mailinator.com").await;
    assert_eq!(verdict.status, FinalStatus::Invalid);
    assert_eq!(verdict.reason, "Disposable Domain");
    assert_eq!(verdict.risk_level, RiskLevel::Critical);
}

#[tokio::test]
async fn deliverable_address_scores_one_hundred() {
    let verifier = verifier(
        ProbeOutcome::Valid("250 ok".to_string()),
        ProbeOutcome::Invalid("550 user unknown".to_string()),
    );
    let verdict = verifier.verify("alice@acme.example").await;
    assert_eq!(verdict.status, FinalStatus::Valid);
    assert_eq!(verdict.score, 100);
    assert!(!verdict.checks.catch_all);
}

#[tokio::test]
async fn catch_all_domain_overrides_user_probe() {
    let verifier = verifier(
        ProbeOutcome::Valid("250 ok".to_string()),
        ProbeOutcome::Valid("250 ok".to_string()),
    );
    let verdict = verifier.verify("alice@acme.example").await;
    assert_eq!(verdict.status, FinalStatus::CatchAll);
    assert_eq!(verdict.score, 80);
    assert!(verdict.checks.catch_all);
}

#[tokio::test]
async fn blocked_rcpt_yields_blocked_status_at_score_forty() {
    let verifier = verifier(
        ProbeOutcome::UnknownTimeout("connection timed out".to_string()),
        ProbeOutcome::default(),
    );
    let verdict = verifier.verify("user@acme.example").await;
    assert_eq!(verdict.status, FinalStatus::Blocked);
    assert_eq!(verdict.score, 40);
}

#[tokio::test]
async fn bulk_verify_matches_independent_calls_in_order() {
    let verifier = verifier(
        ProbeOutcome::Valid("250 ok".to_string()),
        ProbeOutcome::Invalid("550 user unknown".to_string()),
    );

    let emails = vec![
        "alice@acme.example".to_string(),
        "nope@no-such-domain.invalid".to_string(),
        "person@mailinator.com".to_string(),
    ];

    let results = verify_all(&verifier, &emails).await;
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].status, FinalStatus::Valid);
    assert_eq!(results[1].status, FinalStatus::Invalid);
    assert_eq!(results[1].reason, "Invalid Domain (No MX)");
    assert_eq!(results[2].reason, "Disposable Domain");
}
