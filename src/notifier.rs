//! Best-effort outbound "new job" notification (spec §4.6).
//!
//! One-way sink, not a queue: no retry logic, since retries would add
//! latency to the submit path. A failed or unconfigured notifier never
//! fails the submission that triggered it.

use serde::Serialize;

#[derive(Debug, Serialize)]
struct NewJobEvent<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    job_id: &'a str,
    job_hash: &'a str,
    job_type: &'a str,
    timestamp: i64,
}

/// Fire-and-forget POST announcing a freshly-created job. Swallows every
/// failure after logging it; a missing `relay_url` silently no-ops.
pub async fn notify_new_job(
    client: &reqwest::Client,
    relay_url: Option<&str>,
    publish_key: Option<&str>,
    job_id: &str,
    job_hash: &str,
    job_type: &str,
    now_millis: i64,
) {
    let Some(relay_url) = relay_url else {
        return;
    };
    let event = NewJobEvent {
        kind: "new_job",
        job_id,
        job_hash,
        job_type,
        timestamp: now_millis,
    };
    let mut request = client.post(relay_url).json(&event);
    if let Some(key) = publish_key {
        request = request.bearer_auth(key);
    }
    match request.send().await {
        Ok(response) if response.status().is_success() => {
            tracing::debug!(job_id, "new_job notification delivered");
        }
        Ok(response) => {
            tracing::warn!(job_id, status = %response.status(), "new_job notification rejected by relay");
        }
        Err(err) => {
            tracing::warn!(job_id, error = %err, "new_job notification failed to send");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_relay_url_is_a_silent_noop() {
        let client = reqwest::Client::new();
        // Would panic or hang if this tried to make a request.
        notify_new_job(&client, None, None, "job-1", "hash-1", "render", 0).await;
    }
}
