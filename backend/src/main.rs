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

//! The HTTP backend: boots config and logging, bootstraps the SQLite
//! verdict-cache schema, wires the pipeline behind `warp` routes, and binds
//! `PORT`. The pipeline itself lives entirely in `mailverify-core`; this
//! crate is just the transport and process-startup layer around it.

mod config;
mod logging;
mod rate_limit;
mod routes;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use mailverify_core::cache::{bootstrap_schema, SqliteVerdictCache};
use mailverify_core::mx::{HickoryMxResolver, MemoizingMxResolver};
use mailverify_core::smtp::TcpSmtpProber;
use mailverify_core::Verifier;
use sqlx::sqlite::SqlitePoolOptions;

use rate_limit::RateLimiter;

pub struct AppState {
    verifier: Verifier,
    rate_limiter: RateLimiter,
    static_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_config = config::AppConfig::load()?;
    let _log_guard = logging::init(app_config.log_dir.as_deref())?;

    tracing::info!(port = app_config.port, "starting mailverify backend");

    if let Some(parent) = PathBuf::from(&app_config.database_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let database_url = format!("sqlite://{}?mode=rwc", app_config.database_path);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;
    bootstrap_schema(&pool).await?;

    let mx_resolver = MemoizingMxResolver::new(HickoryMxResolver::new(Duration::from_secs(5)));
    let verifier = Verifier::new(
        Arc::new(mx_resolver),
        Arc::new(TcpSmtpProber::default()),
        Arc::new(SqliteVerdictCache::new(pool)),
    );

    let state = Arc::new(AppState {
        verifier,
        rate_limiter: RateLimiter::new(app_config.rate_limit.clone()),
        static_dir: PathBuf::from(&app_config.static_dir),
    });

    let routes = routes::routes(state);

    tracing::info!("listening on 0.0.0.0:{}", app_config.port);
    warp::serve(routes).run(([0, 0, 0, 0], app_config.port)).await;

    Ok(())
}
