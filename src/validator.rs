//! Size/shape checks on payloads, and the cache-freshness probe (spec §4.3).
//!
//! The freshness probe is the one domain-specific concession in an otherwise
//! opaque core: it walks a completed job's `output_data` for `figpack_url`
//! fields and asks each referenced `figpack.json` whether the underlying
//! data is still live. It is isolated behind [`is_result_fresh`] so it can be
//! swapped for a different validator without touching the lifecycle engine.

use serde_json::Value;
use std::time::Duration;

use crate::config::Limits;
use crate::error::{AppError, AppResult};

/// Reject an empty or non-meaningful `job_type`.
pub fn validate_job_type(job_type: &str) -> AppResult<()> {
    if job_type.trim().is_empty() {
        return Err(AppError::Validation("job_type must not be empty".into()));
    }
    Ok(())
}

fn serialized_len(value: &Value) -> usize {
    serde_json::to_vec(value).map(|b| b.len()).unwrap_or(usize::MAX)
}

/// `input_params` must serialize to at most `limits.max_input_params_bytes`.
pub fn validate_input_params(value: &Value, limits: &Limits) -> AppResult<()> {
    let len = serialized_len(value);
    if len > limits.max_input_params_bytes {
        return Err(AppError::Validation(format!(
            "input_params exceeds {} bytes (got {len})",
            limits.max_input_params_bytes
        )));
    }
    Ok(())
}

/// `output_data` must serialize to at most `limits.max_output_data_bytes`.
pub fn validate_output_data(value: &Value, limits: &Limits) -> AppResult<()> {
    let len = serialized_len(value);
    if len > limits.max_output_data_bytes {
        return Err(AppError::Validation(format!(
            "output_data exceeds {} bytes (got {len})",
            limits.max_output_data_bytes
        )));
    }
    Ok(())
}

/// `console_output` must be at most `limits.max_console_output_bytes`.
pub fn validate_console_output(s: &str, limits: &Limits) -> AppResult<()> {
    if s.len() > limits.max_console_output_bytes {
        return Err(AppError::Validation(format!(
            "console_output exceeds {} bytes (got {})",
            limits.max_console_output_bytes,
            s.len()
        )));
    }
    Ok(())
}

/// `error_message` must be at most `limits.max_error_message_bytes`.
pub fn validate_error_message(s: &str, limits: &Limits) -> AppResult<()> {
    if s.len() > limits.max_error_message_bytes {
        return Err(AppError::Validation(format!(
            "error_message exceeds {} bytes (got {})",
            limits.max_error_message_bytes,
            s.len()
        )));
    }
    Ok(())
}

/// Recursively collect every string value keyed `figpack_url` in `value`.
fn collect_figpack_urls(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                if k == "figpack_url" {
                    if let Value::String(s) = v {
                        out.push(s.clone());
                    }
                }
                collect_figpack_urls(v, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_figpack_urls(item, out);
            }
        }
        _ => {}
    }
}

/// `true` iff `doc` (a parsed `figpack.json`) describes data that is still
/// live: not `deleted`, and either pinned or not yet expired.
fn figpack_doc_is_live(doc: &Value, now_millis: i64) -> bool {
    let deleted = doc.get("deleted").and_then(Value::as_bool).unwrap_or(false);
    if deleted {
        return false;
    }
    let pinned = doc.get("pinned").and_then(Value::as_bool).unwrap_or(false);
    if pinned {
        return true;
    }
    match doc.get("expiration").and_then(Value::as_i64) {
        Some(expiration) => expiration > now_millis,
        None => false,
    }
}

/// Probe one `.../index.html` figpack URL. Returns `false` on any fetch
/// error, non-2xx response, JSON parse failure, or URL shape mismatch —
/// per spec §4.3 these are all folded into "invalid", never surfaced as a
/// distinct error.
async fn probe_one(client: &reqwest::Client, index_html_url: &str, now_millis: i64) -> bool {
    let Some(json_url) = index_html_url.strip_suffix("/index.html").map(|base| format!("{base}/figpack.json")) else {
        return false;
    };
    let response = match client.get(&json_url).timeout(Duration::from_secs(5)).send().await {
        Ok(r) => r,
        Err(_) => return false,
    };
    if !response.status().is_success() {
        return false;
    }
    match response.json::<Value>().await {
        Ok(doc) => figpack_doc_is_live(&doc, now_millis),
        Err(_) => false,
    }
}

/// `true` iff every `figpack_url` found in `output_data` is still live. A
/// job with zero such URLs is always fresh. Probes run concurrently since
/// they sit synchronously in the submit/check request path.
pub async fn is_result_fresh(client: &reqwest::Client, output_data: &Value, now_millis: i64) -> bool {
    let mut urls = Vec::new();
    collect_figpack_urls(output_data, &mut urls);
    if urls.is_empty() {
        return true;
    }
    let checks = urls.iter().map(|url| probe_one(client, url, now_millis));
    let results = futures::future::join_all(checks).await;
    results.into_iter().all(|fresh| fresh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_empty_job_type() {
        assert!(validate_job_type("").is_err());
        assert!(validate_job_type("   ").is_err());
        assert!(validate_job_type("render").is_ok());
    }

    #[test]
    fn input_params_boundary() {
        let limits = Limits::default();
        // "x" repeated so the JSON-encoded string stays within one byte per char
        let ok = json!({ "s": "x".repeat(limits.max_input_params_bytes - 16) });
        assert!(validate_input_params(&ok, &limits).is_ok());

        let too_big = json!({ "s": "x".repeat(limits.max_input_params_bytes + 16) });
        assert!(validate_input_params(&too_big, &limits).is_err());
    }

    #[test]
    fn collects_nested_figpack_urls() {
        let value = json!({
            "a": { "figpack_url": "https://x/a/index.html" },
            "list": [ { "figpack_url": "https://x/b/index.html" }, { "other": 1 } ],
        });
        let mut out = Vec::new();
        collect_figpack_urls(&value, &mut out);
        out.sort();
        assert_eq!(out, vec!["https://x/a/index.html", "https://x/b/index.html"]);
    }

    #[test]
    fn no_urls_means_fresh_shape() {
        let mut out = Vec::new();
        collect_figpack_urls(&json!({ "ok": true }), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn figpack_doc_liveness() {
        assert!(!figpack_doc_is_live(&json!({ "deleted": true, "pinned": true }), 1000));
        assert!(figpack_doc_is_live(&json!({ "pinned": true }), 1000));
        assert!(figpack_doc_is_live(&json!({ "expiration": 2000 }), 1000));
        assert!(!figpack_doc_is_live(&json!({ "expiration": 500 }), 1000));
        assert!(!figpack_doc_is_live(&json!({}), 1000));
    }

    /// Serves `body` as JSON for any path, so the probe's derived
    /// `.../figpack.json` URL gets a response without a real figpack host.
    async fn spawn_figpack_stub(body: Value) -> std::net::SocketAddr {
        use axum::{routing::get, Json, Router};
        let body = std::sync::Arc::new(body);
        let app = Router::new().route(
            "/{*path}",
            get(move || {
                let body = body.clone();
                async move { Json((*body).clone()) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        addr
    }

    fn figpack_output(addr: std::net::SocketAddr) -> Value {
        json!({ "fig": { "figpack_url": format!("http://{addr}/a/index.html") } })
    }

    /// Spec §8 scenario 5 / invariant 7: a cached result is fresh iff every
    /// figpack URL it contains is still live.
    #[tokio::test]
    async fn is_result_fresh_true_when_pinned() {
        let addr = spawn_figpack_stub(json!({ "pinned": true })).await;
        let client = reqwest::Client::new();
        assert!(is_result_fresh(&client, &figpack_output(addr), 1000).await);
    }

    #[tokio::test]
    async fn is_result_fresh_false_when_deleted() {
        let addr = spawn_figpack_stub(json!({ "deleted": true })).await;
        let client = reqwest::Client::new();
        assert!(!is_result_fresh(&client, &figpack_output(addr), 1000).await);
    }

    #[tokio::test]
    async fn is_result_fresh_false_when_expired_and_not_pinned() {
        let addr = spawn_figpack_stub(json!({ "expiration": 500 })).await;
        let client = reqwest::Client::new();
        assert!(!is_result_fresh(&client, &figpack_output(addr), 1000).await);
    }

    #[tokio::test]
    async fn is_result_fresh_true_when_expiration_in_future() {
        let addr = spawn_figpack_stub(json!({ "expiration": 5000 })).await;
        let client = reqwest::Client::new();
        assert!(is_result_fresh(&client, &figpack_output(addr), 1000).await);
    }

    #[tokio::test]
    async fn is_result_fresh_true_when_no_urls_present() {
        let client = reqwest::Client::new();
        assert!(is_result_fresh(&client, &json!({ "ok": true }), 1000).await);
    }

    #[tokio::test]
    async fn is_result_fresh_false_on_unreachable_host() {
        let client = reqwest::Client::new();
        let output = json!({ "fig": { "figpack_url": "http://127.0.0.1:1/a/index.html" } });
        assert!(!is_result_fresh(&client, &output, 1000).await);
    }
}
