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

//! Layered configuration: built-in defaults, an optional `mailverify.toml`
//! in the working directory, and named environment variables (`PORT`,
//! `CACHE_DB_PATH`, `LOG_DIR`, `RATE_LIMIT_PER_MINUTE`, `RATE_LIMIT_PER_HOUR`,
//! `VERIFY_PER_MINUTE`, `BULK_VERIFY_PER_MINUTE`). `RUST_LOG` is read
//! separately, by `tracing`'s own `EnvFilter`, in `logging::init`.

use serde::Deserialize;

/// Per-bucket limits for the token-bucket rate limiter.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub global_per_hour: u32,
    pub global_per_minute: u32,
    pub verify_per_minute: u32,
    pub bulk_verify_per_minute: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub port: u16,
    pub database_path: String,
    #[serde(default)]
    pub log_dir: Option<String>,
    #[serde(default)]
    pub static_dir: String,
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    /// Loads compiled-in defaults, layers an optional `mailverify.toml` in
    /// the working directory, then applies named environment overrides
    /// directly (not a generic `MAILVERIFY__`-prefixed scheme — operators
    /// expect to set `PORT` and friends by their literal names).
    pub fn load() -> anyhow::Result<Self> {
        let builder = config::Config::builder()
            .set_default("port", 5000)?
            .set_default("database_path", "./data/verification_cache.db")?
            .set_default("log_dir", "./logs")?
            .set_default("static_dir", "public")?
            .set_default("rate_limit.global_per_hour", 200)?
            .set_default("rate_limit.global_per_minute", 50)?
            .set_default("rate_limit.verify_per_minute", 30)?
            .set_default("rate_limit.bulk_verify_per_minute", 10)?
            .add_source(config::File::with_name("mailverify").required(false));

        let mut app_config: AppConfig = builder.build()?.try_deserialize()?;

        if let Ok(v) = std::env::var("PORT") {
            app_config.port = parse_env("PORT", &v)?;
        }
        if let Ok(v) = std::env::var("CACHE_DB_PATH") {
            app_config.database_path = v;
        }
        if let Ok(v) = std::env::var("LOG_DIR") {
            app_config.log_dir = Some(v);
        }
        if let Ok(v) = std::env::var("RATE_LIMIT_PER_HOUR") {
            app_config.rate_limit.global_per_hour = parse_env("RATE_LIMIT_PER_HOUR", &v)?;
        }
        if let Ok(v) = std::env::var("RATE_LIMIT_PER_MINUTE") {
            app_config.rate_limit.global_per_minute = parse_env("RATE_LIMIT_PER_MINUTE", &v)?;
        }
        if let Ok(v) = std::env::var("VERIFY_PER_MINUTE") {
            app_config.rate_limit.verify_per_minute = parse_env("VERIFY_PER_MINUTE", &v)?;
        }
        if let Ok(v) = std::env::var("BULK_VERIFY_PER_MINUTE") {
            app_config.rate_limit.bulk_verify_per_minute = parse_env("BULK_VERIFY_PER_MINUTE", &v)?;
        }

        Ok(app_config)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> anyhow::Result<T> {
    raw.parse()
        .map_err(|_| anyhow::anyhow!("{name} must be a valid number, got {raw:?}"))
}
