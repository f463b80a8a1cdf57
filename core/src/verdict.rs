//! The types returned from a verification, and the pure function that
//! combines check results into a final [`Verdict`].

use serde::{Deserialize, Serialize};

/// Outcome of an SMTP `RCPT TO` probe (or the reason none could be run).
///
/// Carries a free-form, user-facing message alongside the tag. The composer
/// only ever matches on the tag; the message is opaque text surfaced in
/// `Verdict::reason` or logged for debugging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum ProbeOutcome {
    Valid(String),
    Invalid(String),
    Unknown(String),
    UnknownBlock(String),
    UnknownTimeout(String),
    UnknownRefused(String),
    UnknownConnect(String),
    UnknownAuth(String),
    Error(String),
    Skipped(String),
}

impl Default for ProbeOutcome {
    fn default() -> Self {
        ProbeOutcome::Skipped("not probed".to_string())
    }
}

impl ProbeOutcome {
    /// The free-text message carried by whichever variant this is.
    pub fn message(&self) -> &str {
        match self {
            ProbeOutcome::Valid(m)
            | ProbeOutcome::Invalid(m)
            | ProbeOutcome::Unknown(m)
            | ProbeOutcome::UnknownBlock(m)
            | ProbeOutcome::UnknownTimeout(m)
            | ProbeOutcome::UnknownRefused(m)
            | ProbeOutcome::UnknownConnect(m)
            | ProbeOutcome::UnknownAuth(m)
            | ProbeOutcome::Error(m)
            | ProbeOutcome::Skipped(m) => m,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ProbeOutcome::Valid(_))
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, ProbeOutcome::Invalid(_))
    }

    /// True for any of the `unknown*` family, i.e. "we couldn't confirm either way".
    pub fn is_unknown_family(&self) -> bool {
        matches!(
            self,
            ProbeOutcome::Unknown(_)
                | ProbeOutcome::UnknownBlock(_)
                | ProbeOutcome::UnknownTimeout(_)
                | ProbeOutcome::UnknownRefused(_)
                | ProbeOutcome::UnknownConnect(_)
                | ProbeOutcome::UnknownAuth(_)
                | ProbeOutcome::Error(_)
        )
    }

    /// Whether this outcome's tag should push the final status toward
    /// `blocked` rather than staying `unknown`.
    fn refines_to_blocked(&self) -> bool {
        matches!(
            self,
            ProbeOutcome::UnknownTimeout(_)
                | ProbeOutcome::UnknownRefused(_)
                | ProbeOutcome::UnknownConnect(_)
                | ProbeOutcome::UnknownBlock(_)
        )
    }

    fn refines_to_risky(&self) -> bool {
        matches!(self, ProbeOutcome::UnknownAuth(_))
    }
}

/// Per-check results gathered while verifying a single address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckFlags {
    pub syntax: bool,
    pub domain: bool,
    pub mx: bool,
    pub disposable: bool,
    #[serde(default)]
    pub smtp_status: ProbeOutcome,
    #[serde(default)]
    pub catch_all: bool,
}

impl CheckFlags {
    fn fresh() -> Self {
        CheckFlags {
            syntax: false,
            domain: false,
            mx: false,
            disposable: false,
            smtp_status: ProbeOutcome::default(),
            catch_all: false,
        }
    }
}

/// The final deliverability classification for an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinalStatus {
    Valid,
    Invalid,
    CatchAll,
    Risky,
    Blocked,
    Unknown,
}

impl FinalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalStatus::Valid => "valid",
            FinalStatus::Invalid => "invalid",
            FinalStatus::CatchAll => "catch-all",
            FinalStatus::Risky => "risky",
            FinalStatus::Blocked => "blocked",
            FinalStatus::Unknown => "unknown",
        }
    }
}

/// How much this address should be trusted, independent of the raw score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// The final, composed result of verifying one address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub email: String,
    pub status: FinalStatus,
    pub reason: String,
    pub score: u8,
    pub provider: String,
    pub risk_level: RiskLevel,
    pub checks: CheckFlags,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
}

/// Inputs the composer needs beyond the check flags: the address itself and
/// the provider label, both of which are carried through unchanged rather
/// than recomputed.
pub struct ComposerInput {
    pub email: String,
    pub provider: String,
    pub checks: CheckFlags,
}

impl ComposerInput {
    pub fn new(email: impl Into<String>, provider: impl Into<String>) -> Self {
        ComposerInput {
            email: email.into(),
            provider: provider.into(),
            checks: CheckFlags::fresh(),
        }
    }
}

/// Combine check flags into a final (status, reason, risk, score) tuple.
///
/// Total over its inputs: every reachable combination of flags maps to
/// exactly one [`Verdict`].
pub fn compose(input: ComposerInput) -> Verdict {
    let ComposerInput {
        email,
        provider,
        checks,
    } = input;

    if !checks.syntax {
        return Verdict {
            email,
            status: FinalStatus::Invalid,
            reason: "Syntax Error".to_string(),
            score: 0,
            provider,
            risk_level: RiskLevel::High,
            checks,
            cached: None,
        };
    }

    if !checks.mx {
        return Verdict {
            email,
            status: FinalStatus::Invalid,
            reason: "Invalid Domain (No MX)".to_string(),
            score: 10,
            provider,
            risk_level: RiskLevel::High,
            checks,
            cached: None,
        };
    }

    if checks.disposable {
        return Verdict {
            email,
            status: FinalStatus::Invalid,
            reason: "Disposable Domain".to_string(),
            score: 0,
            provider,
            risk_level: RiskLevel::Critical,
            checks,
            cached: None,
        };
    }

    // Provisional status from the user probe.
    let mut status = if checks.smtp_status.is_valid() {
        FinalStatus::Valid
    } else if checks.smtp_status.is_invalid() {
        FinalStatus::Invalid
    } else {
        FinalStatus::Unknown
    };

    // Catch-all overwrites a provisional `valid` only; the catch-all probe
    // itself is run by the caller before this function is invoked, and its
    // result is already folded into `checks.catch_all`.
    if status == FinalStatus::Valid && checks.catch_all {
        status = FinalStatus::CatchAll;
    }

    if status == FinalStatus::Unknown {
        if checks.smtp_status.refines_to_blocked() {
            status = FinalStatus::Blocked;
        } else if checks.smtp_status.refines_to_risky() {
            status = FinalStatus::Risky;
        }
    }

    let risk_level = match status {
        FinalStatus::Valid => RiskLevel::Low,
        FinalStatus::CatchAll => RiskLevel::Medium,
        FinalStatus::Risky => RiskLevel::Medium,
        FinalStatus::Blocked => RiskLevel::High,
        FinalStatus::Unknown => RiskLevel::High,
        FinalStatus::Invalid => RiskLevel::High,
    };

    let reason = match status {
        FinalStatus::Valid => "Deliverable".to_string(),
        FinalStatus::CatchAll => "Catch-all Domain".to_string(),
        FinalStatus::Risky => checks.smtp_status.message().to_string(),
        FinalStatus::Blocked => checks.smtp_status.message().to_string(),
        FinalStatus::Unknown => checks.smtp_status.message().to_string(),
        FinalStatus::Invalid => "Mailbox Rejected".to_string(),
    };

    let score = score_for(&checks, status);

    Verdict {
        email,
        status,
        reason,
        score,
        provider,
        risk_level,
        checks,
        cached: None,
    }
}

/// Turns check flags and a final status into a 0-100 score.
///
/// `blocked` is kept in the same +10 bucket as the generic `unknown` status
/// rather than elevated to `risky`'s +25.
fn score_for(checks: &CheckFlags, status: FinalStatus) -> u8 {
    if checks.disposable || status == FinalStatus::Invalid {
        return 0;
    }

    let mut score: i32 = 0;
    if checks.syntax {
        score += 20;
    }
    if checks.mx {
        score += 30;
    }

    score += match status {
        FinalStatus::Valid => 50,
        FinalStatus::CatchAll => 30,
        FinalStatus::Risky => 25,
        FinalStatus::Blocked | FinalStatus::Unknown => 10,
        FinalStatus::Invalid => 0,
    };

    score.min(100).max(0) as u8
}
