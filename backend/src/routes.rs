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

//! HTTP surface: `POST /verify`, `POST /bulk-verify`, and a static-file
//! fallback.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use mailverify_core::bulk::verify_all;
use mailverify_core::verdict::Verdict;
use serde::{Deserialize, Serialize};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::rate_limit::Endpoint;
use crate::AppState;

#[derive(Debug, Deserialize)]
struct VerifyRequest {
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BulkVerifyRequest {
    #[serde(default)]
    emails: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct BulkVerifyResponse {
    results: Vec<Verdict>,
    count: usize,
}

/// Signals that a client's rate-limit bucket was already drained. Carried
/// as a `warp::reject::Reject` so it flows through the same `recover`
/// machinery as any other rejection.
#[derive(Debug)]
struct RateLimited;
impl warp::reject::Reject for RateLimited {}

pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    // Permissive CORS on the two JSON endpoints, matching a public
    // verification API's typical posture.
    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(["POST"])
        .allow_headers(["content-type"]);

    let verify = warp::path("verify")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::addr::remote())
        .and(warp::body::content_length_limit(64 * 1024))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(handle_verify)
        .with(cors.clone());

    let bulk_verify = warp::path("bulk-verify")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::addr::remote())
        .and(warp::body::content_length_limit(4 * 1024 * 1024))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(handle_bulk_verify)
        .with(cors);

    let static_files = warp::fs::dir(state.static_dir.clone());
    let index = warp::path::end().and(warp::fs::file(state.static_dir.join("index.html")));

    verify
        .or(bulk_verify)
        .or(index)
        .or(static_files)
        .recover(handle_rejection)
}

fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn client_key(addr: Option<SocketAddr>) -> String {
    addr.map(|a| a.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn handle_verify(
    addr: Option<SocketAddr>,
    body: VerifyRequest,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    if !state
        .rate_limiter
        .try_acquire(&client_key(addr), Endpoint::Verify)
    {
        return Err(warp::reject::custom(RateLimited));
    }

    let email = body.email.unwrap_or_default();
    if email.trim().is_empty() {
        return Ok(bad_request("Email is required"));
    }

    let verdict = state.verifier.verify(email.trim()).await;
    tracing::info!(email = %verdict.email, status = verdict.status.as_str(), "verified address");
    Ok(warp::reply::with_status(
        warp::reply::json(&verdict),
        StatusCode::OK,
    ))
}

async fn handle_bulk_verify(
    addr: Option<SocketAddr>,
    body: BulkVerifyRequest,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    if !state
        .rate_limiter
        .try_acquire(&client_key(addr), Endpoint::BulkVerify)
    {
        return Err(warp::reject::custom(RateLimited));
    }

    let emails = body.emails.unwrap_or_default();
    if emails.is_empty() {
        return Ok(bad_request("A non-empty list of emails is required"));
    }

    let results = verify_all(&state.verifier, &emails).await;
    let count = results.len();
    tracing::info!(count, "bulk-verified addresses");
    Ok(warp::reply::with_status(
        warp::reply::json(&BulkVerifyResponse { results, count }),
        StatusCode::OK,
    ))
}

fn bad_request(message: &str) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(
        warp::reply::json(&ErrorResponse {
            error: message.to_string(),
        }),
        StatusCode::BAD_REQUEST,
    )
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    if err.find::<RateLimited>().is_some() {
        return Ok(warp::reply::with_status(
            warp::reply::json(&ErrorResponse {
                error: "Rate limit exceeded".to_string(),
            }),
            StatusCode::TOO_MANY_REQUESTS,
        ));
    }

    if err.is_not_found() {
        return Ok(warp::reply::with_status(
            warp::reply::json(&ErrorResponse {
                error: "Not Found".to_string(),
            }),
            StatusCode::NOT_FOUND,
        ));
    }

    if err.find::<warp::filters::body::BodyDeserializeError>().is_some() {
        return Ok(warp::reply::with_status(
            warp::reply::json(&ErrorResponse {
                error: "Invalid request body".to_string(),
            }),
            StatusCode::BAD_REQUEST,
        ));
    }

    tracing::error!(?err, "unhandled rejection");
    Ok(warp::reply::with_status(
        warp::reply::json(&ErrorResponse {
            error: "Internal Server Error".to_string(),
        }),
        StatusCode::INTERNAL_SERVER_ERROR,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailverify_core::cache::InMemoryVerdictCache;
    use mailverify_core::mx::{MxRecord, MxRecordSet, MxResolver};
    use mailverify_core::smtp::SmtpProber;
    use mailverify_core::verdict::ProbeOutcome;
    use mailverify_core::Verifier;
    use std::path::PathBuf;

    use crate::config::RateLimitConfig;
    use crate::rate_limit::RateLimiter;
    use async_trait::async_trait;

    struct AlwaysMx;
    #[async_trait]
    impl MxResolver for AlwaysMx {
        async fn resolve(&self, domain: &str) -> Option<MxRecordSet> {
            Some(MxRecordSet {
                records: vec![MxRecord {
                    preference: 10,
                    exchange: format!("mx.{domain}"),
                }],
            })
        }
    }

    struct AlwaysValid;
    #[async_trait]
    impl SmtpProber for AlwaysValid {
        async fn probe(&self, address: &str, _mx_host: &str) -> ProbeOutcome {
            if address.starts_with("verify_") {
                ProbeOutcome::Invalid("550 user unknown".to_string())
            } else {
                ProbeOutcome::Valid("250 ok".to_string())
            }
        }
    }

    fn generous_rate_limit() -> RateLimitConfig {
        RateLimitConfig {
            global_per_hour: 1000,
            global_per_minute: 1000,
            verify_per_minute: 1000,
            bulk_verify_per_minute: 1000,
        }
    }

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState {
            verifier: Verifier::new(
                Arc::new(AlwaysMx),
                Arc::new(AlwaysValid),
                Arc::new(InMemoryVerdictCache::new()),
            ),
            rate_limiter: RateLimiter::new(generous_rate_limit()),
            static_dir: PathBuf::from("public"),
        })
    }

    #[tokio::test]
    async fn verify_rejects_empty_email_with_400() {
        let filter = routes(test_state());
        let resp = warp::test::request()
            .method("POST")
            .path("/verify")
            .json(&serde_json::json!({ "email": "  " }))
            .reply(&filter)
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn verify_returns_a_verdict_for_a_deliverable_address() {
        let filter = routes(test_state());
        let resp = warp::test::request()
            .method("POST")
            .path("/verify")
            .json(&serde_json::json!({ "email": "alice@acme.example" }))
            .reply(&filter)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Verdict = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body.status.as_str(), "valid");
    }

    #[tokio::test]
    async fn bulk_verify_rejects_missing_list_with_400() {
        let filter = routes(test_state());
        let resp = warp::test::request()
            .method("POST")
            .path("/bulk-verify")
            .json(&serde_json::json!({}))
            .reply(&filter)
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn bulk_verify_returns_count_and_results_in_order() {
        let filter = routes(test_state());
        let resp = warp::test::request()
            .method("POST")
            .path("/bulk-verify")
            .json(&serde_json::json!({ "emails": ["alice@acme.example", "bob@acme.example"] }))
            .reply(&filter)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: BulkVerifyResponse = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body.count, 2);
        assert_eq!(body.results.len(), 2);
    }

    #[tokio::test]
    async fn exceeding_the_rate_limit_returns_429() {
        let state = Arc::new(AppState {
            verifier: Verifier::new(
                Arc::new(AlwaysMx),
                Arc::new(AlwaysValid),
                Arc::new(InMemoryVerdictCache::new()),
            ),
            rate_limiter: RateLimiter::new(RateLimitConfig {
                global_per_hour: 1000,
                global_per_minute: 1000,
                verify_per_minute: 1,
                bulk_verify_per_minute: 1000,
            }),
            static_dir: PathBuf::from("public"),
        });
        let filter = routes(state);

        let first = warp::test::request()
            .method("POST")
            .path("/verify")
            .json(&serde_json::json!({ "email": "alice@acme.example" }))
            .reply(&filter)
            .await;
        assert_eq!(first.status(), StatusCode::OK);

        let second = warp::test::request()
            .method("POST")
            .path("/verify")
            .json(&serde_json::json!({ "email": "bob@acme.example" }))
            .reply(&filter)
            .await;
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
