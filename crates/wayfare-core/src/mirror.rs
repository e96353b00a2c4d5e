//! Best-effort mirroring of local records to the travel backend.
//!
//! Callers submit a record and move on. A single worker task pushes jobs in
//! submission order, each bounded by a timeout, and hands any fields the server
//! returns to a completion handler. Failures end in a log line and nothing else.

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::models::{Record, ServerFields};
use crate::util::{compact_text, is_http_url, normalize_text_option};

/// Default bound on a single mirror request.
pub const DEFAULT_MIRROR_TIMEOUT: Duration = Duration::from_secs(5);

const SAVED_PATH: &str = "/api/saved";

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Invalid mirror configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Mirror HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Mirror API error: {0}")]
    Api(String),
    #[error("Mirror request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Mirroring needs a running tokio runtime")]
    NoRuntime,
}

pub type MirrorResult<T> = Result<T, MirrorError>;

/// Body sent to `POST /api/saved`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MirrorPayload {
    pub city: String,
    pub img: String,
    pub kind: String,
    pub price: String,
    pub title: String,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

impl From<&Record> for MirrorPayload {
    fn from(record: &Record) -> Self {
        Self {
            city: record.display_label.clone(),
            img: record.image_ref.clone(),
            kind: record.kind.as_str().to_string(),
            price: record.price_label.clone(),
            title: record.title.clone(),
            user_id: record.owner_id.clone(),
        }
    }
}

/// A remote service that accepts copies of local records.
pub trait RemoteMirror: Send + Sync + 'static {
    /// Push one record. `Ok(Some(fields))` carries whatever authoritative
    /// fields the service returned for it.
    fn push(
        &self,
        payload: MirrorPayload,
    ) -> impl Future<Output = MirrorResult<Option<ServerFields>>> + Send;
}

/// Mirror that posts records to the travel backend over HTTP.
#[derive(Clone, Debug)]
pub struct HttpMirror {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpMirror {
    /// Build a mirror for the backend at `base_url` (e.g. `http://localhost:8083`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> MirrorResult<Self> {
        let base = normalize_base_url(base_url.into())?;
        Ok(Self {
            endpoint: format!("{base}{SAVED_PATH}"),
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl RemoteMirror for HttpMirror {
    async fn push(&self, payload: MirrorPayload) -> MirrorResult<Option<ServerFields>> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(MirrorError::Api(parse_api_error(status, &body)));
        }

        Ok(parse_server_fields(&body))
    }
}

/// Fields from a created-resource response; anything but a JSON object is ignored.
pub fn parse_server_fields(body: &str) -> Option<ServerFields> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(fields)) => Some(fields),
        Ok(_) => None,
        Err(error) => {
            if !body.trim().is_empty() {
                tracing::debug!("Ignoring unparseable mirror response: {}", error);
            }
            None
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

pub(crate) fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

pub(crate) fn normalize_base_url(raw: String) -> MirrorResult<String> {
    let base = normalize_text_option(Some(raw)).ok_or_else(|| {
        MirrorError::InvalidConfiguration("base URL must not be empty".to_string())
    })?;
    if is_http_url(&base) {
        Ok(base.trim_end_matches('/').to_string())
    } else {
        Err(MirrorError::InvalidConfiguration(
            "base URL must include http:// or https://".to_string(),
        ))
    }
}

/// Called with `(collection, record_id, fields)` after a successful push.
pub type CompletionHandler = Box<dyn Fn(&str, &str, ServerFields) + Send + Sync>;

enum Job {
    Push { collection: String, record: Record },
    Flush(oneshot::Sender<()>),
}

/// Submit-and-forget queue in front of a [`RemoteMirror`].
#[derive(Clone, Debug)]
pub struct MirrorQueue {
    sender: mpsc::UnboundedSender<Job>,
}

impl MirrorQueue {
    /// Start the worker on the current tokio runtime.
    pub fn spawn<M: RemoteMirror>(
        mirror: M,
        timeout: Duration,
        on_success: CompletionHandler,
    ) -> MirrorResult<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| MirrorError::NoRuntime)?;
        let (sender, receiver) = mpsc::unbounded_channel();
        runtime.spawn(run_worker(mirror, receiver, timeout, on_success));
        Ok(Self { sender })
    }

    /// Queue `record` for mirroring. Never blocks and never fails the caller.
    pub fn submit(&self, collection: &str, record: Record) {
        let job = Job::Push {
            collection: collection.to_string(),
            record,
        };
        if self.sender.send(job).is_err() {
            tracing::warn!(
                "Mirror worker has stopped; keeping '{}' local only",
                collection
            );
        }
    }

    /// Wait until every job submitted before this call has finished.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.sender.send(Job::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Push { collection, record } => f
                .debug_struct("Push")
                .field("collection", collection)
                .field("id", &record.id)
                .finish(),
            Self::Flush(_) => f.write_str("Flush"),
        }
    }
}

async fn run_worker<M: RemoteMirror>(
    mirror: M,
    mut receiver: mpsc::UnboundedReceiver<Job>,
    timeout: Duration,
    on_success: CompletionHandler,
) {
    while let Some(job) = receiver.recv().await {
        let (collection, record) = match job {
            Job::Push { collection, record } => (collection, record),
            Job::Flush(done) => {
                let _ = done.send(());
                continue;
            }
        };

        let payload = MirrorPayload::from(&record);
        let outcome = match tokio::time::timeout(timeout, mirror.push(payload)).await {
            Ok(result) => result,
            Err(_) => Err(MirrorError::Timeout(timeout)),
        };

        match outcome {
            Ok(Some(fields)) => {
                tracing::debug!("Mirrored '{}' in '{}'", record.id, collection);
                on_success(&collection, &record.id, fields);
            }
            Ok(None) => {
                tracing::debug!(
                    "Mirrored '{}' in '{}' (no fields returned)",
                    record.id,
                    collection
                );
            }
            Err(error) => {
                tracing::warn!(
                    "Remote save of '{}' failed; local copy preserved: {}",
                    record.id,
                    error
                );
            }
        }
    }
    tracing::debug!("Mirror worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CandidateRecord;
    use serde_json::json;

    #[test]
    fn normalize_base_url_rejects_invalid_values() {
        assert!(normalize_base_url(String::new()).is_err());
        assert!(normalize_base_url("localhost:8083".to_string()).is_err());
        assert_eq!(
            normalize_base_url(" http://localhost:8083/ ".to_string()).unwrap(),
            "http://localhost:8083"
        );
    }

    #[test]
    fn http_mirror_targets_saved_endpoint() {
        let mirror = HttpMirror::new("https://api.example.com/", DEFAULT_MIRROR_TIMEOUT).unwrap();
        assert_eq!(mirror.endpoint(), "https://api.example.com/api/saved");
    }

    #[test]
    fn payload_uses_backend_field_names() {
        let record = Record::from_candidate(
            CandidateRecord::new().city("Lisbon").price("$249"),
            "deal-1".to_string(),
            Some("1"),
            chrono::Utc::now(),
        );
        let value = serde_json::to_value(MirrorPayload::from(&record)).unwrap();
        assert_eq!(
            value,
            json!({
                "city": "Lisbon",
                "img": "",
                "kind": "deal",
                "price": "$249",
                "title": "Lisbon",
                "userId": "1"
            })
        );
    }

    #[test]
    fn parse_server_fields_accepts_only_objects() {
        assert!(parse_server_fields(r#"{"id":7}"#).is_some());
        assert!(parse_server_fields("[1,2]").is_none());
        assert!(parse_server_fields("").is_none());
        assert!(parse_server_fields("<html>").is_none());
    }

    #[test]
    fn parse_api_error_prefers_message_field() {
        assert_eq!(
            parse_api_error(StatusCode::BAD_REQUEST, r#"{"message":"bad city"}"#),
            "bad city (400)"
        );
        assert_eq!(
            parse_api_error(StatusCode::INTERNAL_SERVER_ERROR, ""),
            "HTTP 500"
        );
    }

    #[test]
    fn spawn_without_runtime_fails() {
        struct Never;
        impl RemoteMirror for Never {
            async fn push(&self, _payload: MirrorPayload) -> MirrorResult<Option<ServerFields>> {
                Ok(None)
            }
        }

        let result = MirrorQueue::spawn(
            Never,
            DEFAULT_MIRROR_TIMEOUT,
            Box::new(|_: &str, _: &str, _: ServerFields| {}),
        );
        assert!(matches!(result, Err(MirrorError::NoRuntime)));
    }
}
