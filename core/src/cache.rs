//! The verdict cache: a TTL-bounded key/value store over address → verdict,
//! persisted to SQLite in production and backed by a plain map in tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

use crate::verdict::Verdict;

/// How long a cached verdict stays valid before a fresh evaluation replaces
/// it.
pub const CACHE_TTL_DAYS: i64 = 30;

/// Reads and writes verdicts keyed by address. Failures on either side MUST
/// NOT fail the request — callers log and fall back to a live evaluation.
#[async_trait]
pub trait VerdictCache: Send + Sync {
    async fn get(&self, email: &str) -> anyhow::Result<Option<Verdict>>;
    async fn put(&self, email: &str, verdict: &Verdict) -> anyhow::Result<()>;
}

/// Creates `verification_cache` and its indexes if they don't already exist.
/// Idempotent; safe to run on every startup.
pub async fn bootstrap_schema(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS verification_cache (
            email       TEXT PRIMARY KEY,
            status      TEXT NOT NULL,
            reason      TEXT NOT NULL,
            score       INTEGER NOT NULL,
            provider    TEXT NOT NULL,
            risk_level  TEXT NOT NULL,
            checks      TEXT NOT NULL,
            verified_at TEXT NOT NULL,
            expires_at  TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_verification_cache_email ON verification_cache(email)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_verification_cache_expires_at ON verification_cache(expires_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// The shipped implementation: one row per address in a local SQLite file.
pub struct SqliteVerdictCache {
    pool: SqlitePool,
}

impl SqliteVerdictCache {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteVerdictCache { pool }
    }
}

#[async_trait]
impl VerdictCache for SqliteVerdictCache {
    async fn get(&self, email: &str) -> anyhow::Result<Option<Verdict>> {
        let now = Utc::now().to_rfc3339();
        let row = sqlx::query(
            "SELECT status, reason, score, provider, risk_level, checks \
             FROM verification_cache WHERE email = ?1 AND expires_at > ?2",
        )
        .bind(email)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let status: String = row.try_get("status")?;
        let reason: String = row.try_get("reason")?;
        let score: i64 = row.try_get("score")?;
        let provider: String = row.try_get("provider")?;
        let risk_level: String = row.try_get("risk_level")?;
        let checks_json: String = row.try_get("checks")?;

        let checks = serde_json::from_str(&checks_json)?;
        let verdict = Verdict {
            email: email.to_string(),
            status: status_from_str(&status)?,
            reason,
            score: score as u8,
            provider,
            risk_level: risk_level_from_str(&risk_level)?,
            checks,
            cached: Some(true),
        };
        Ok(Some(verdict))
    }

    async fn put(&self, email: &str, verdict: &Verdict) -> anyhow::Result<()> {
        let now = Utc::now();
        let expires_at = now + ChronoDuration::days(CACHE_TTL_DAYS);
        let checks_json = serde_json::to_string(&verdict.checks)?;

        sqlx::query(
            r#"
            INSERT INTO verification_cache
                (email, status, reason, score, provider, risk_level, checks, verified_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT (email) DO UPDATE SET
                status = excluded.status,
                reason = excluded.reason,
                score = excluded.score,
                provider = excluded.provider,
                risk_level = excluded.risk_level,
                checks = excluded.checks,
                verified_at = excluded.verified_at,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(email)
        .bind(verdict.status.as_str())
        .bind(&verdict.reason)
        .bind(verdict.score as i64)
        .bind(&verdict.provider)
        .bind(risk_level_as_str(verdict.risk_level))
        .bind(checks_json)
        .bind(now.to_rfc3339())
        .bind(expires_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn status_from_str(s: &str) -> anyhow::Result<crate::verdict::FinalStatus> {
    use crate::verdict::FinalStatus::*;
    Ok(match s {
        "valid" => Valid,
        "invalid" => Invalid,
        "catch-all" => CatchAll,
        "risky" => Risky,
        "blocked" => Blocked,
        "unknown" => Unknown,
        other => anyhow::bail!("unrecognized cached status {other:?}"),
    })
}

fn risk_level_from_str(s: &str) -> anyhow::Result<crate::verdict::RiskLevel> {
    use crate::verdict::RiskLevel::*;
    Ok(match s {
        "Low" => Low,
        "Medium" => Medium,
        "High" => High,
        "Critical" => Critical,
        other => anyhow::bail!("unrecognized cached risk level {other:?}"),
    })
}

fn risk_level_as_str(level: crate::verdict::RiskLevel) -> &'static str {
    use crate::verdict::RiskLevel::*;
    match level {
        Low => "Low",
        Medium => "Medium",
        High => "High",
        Critical => "Critical",
    }
}

/// A plain in-memory cache for tests, avoiding a SQLite file on disk just to
/// exercise the idempotence and bulk-ordering invariants (P7/P8).
#[derive(Default)]
pub struct InMemoryVerdictCache {
    entries: Mutex<HashMap<String, (Verdict, DateTime<Utc>)>>,
}

impl InMemoryVerdictCache {
    pub fn new() -> Self {
        InMemoryVerdictCache::default()
    }
}

#[async_trait]
impl VerdictCache for InMemoryVerdictCache {
    async fn get(&self, email: &str) -> anyhow::Result<Option<Verdict>> {
        let entries = self.entries.lock().unwrap();
        match entries.get(email) {
            Some((verdict, expires_at)) if *expires_at > Utc::now() => {
                let mut verdict = verdict.clone();
                verdict.cached = Some(true);
                Ok(Some(verdict))
            }
            _ => Ok(None),
        }
    }

    async fn put(&self, email: &str, verdict: &Verdict) -> anyhow::Result<()> {
        let expires_at = Utc::now() + ChronoDuration::days(CACHE_TTL_DAYS);
        self.entries
            .lock()
            .unwrap()
            .insert(email.to_string(), (verdict.clone(), expires_at));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::{CheckFlags, ComposerInput};
    use crate::verdict::compose;
    use crate::verdict::ProbeOutcome;

    fn sample_verdict() -> Verdict {
        let mut input = ComposerInput::new("alice@acme.example", "Custom/Private Server");
        input.checks = CheckFlags {
            syntax: true,
            domain: true,
            mx: true,
            disposable: false,
            smtp_status: ProbeOutcome::Valid("250 ok".to_string()),
            catch_all: false,
        };
        compose(input)
    }

    #[tokio::test]
    async fn miss_then_hit_round_trips() {
        let cache = InMemoryVerdictCache::new();
        assert!(cache.get("alice@acme.example").await.unwrap().is_none());

        let verdict = sample_verdict();
        cache.put("alice@acme.example", &verdict).await.unwrap();

        let cached = cache.get("alice@acme.example").await.unwrap().unwrap();
        assert_eq!(cached.status, verdict.status);
        assert_eq!(cached.cached, Some(true));
    }

    #[tokio::test]
    async fn expired_entries_are_not_returned() {
        let cache = InMemoryVerdictCache::new();
        let verdict = sample_verdict();
        cache
            .entries
            .lock()
            .unwrap()
            .insert("alice@acme.example".to_string(), (verdict, Utc::now() - ChronoDuration::days(1)));

        assert!(cache.get("alice@acme.example").await.unwrap().is_none());
    }
}
