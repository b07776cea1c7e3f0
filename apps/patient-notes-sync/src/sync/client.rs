//! HTTP client for the group API
//!
//! Remote failures come back as `SyncError::Remote` carrying the status code
//! and the server's message; nothing is retried automatically.

use std::fmt;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use super::types::{
    is_valid_group_id, CreateGroupRequest, CreateGroupResponse, ErrorBody, GroupMeta,
    GroupSnapshot, PushRequest, PushResponse, PASS_HEADER,
};
use crate::config::SyncConfig;

/// Classification of a failed group request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    BadId,
    MissingPass,
    MissingBaseVersion,
    BadPayload,
    GroupExists,
    Forbidden,
    NotFound,
    VersionConflict,
    Internal,
    Other,
}

/// A structured non-success response from the group API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub status: u16,
    pub kind: RemoteErrorKind,
    pub message: String,
    /// Set for `VersionConflict`
    pub current_version: Option<u64>,
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.current_version {
            Some(v) => write!(f, "{} (HTTP {}, current version {})", self.message, self.status, v),
            None => write!(f, "{} (HTTP {})", self.message, self.status),
        }
    }
}

impl RemoteError {
    fn from_body(status: StatusCode, body: Option<ErrorBody>) -> Self {
        let message = body
            .as_ref()
            .map(|b| b.error.clone())
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string());

        let kind = match (status.as_u16(), message.as_str()) {
            (400, "Bad id") => RemoteErrorKind::BadId,
            (400, "Missing pass") => RemoteErrorKind::MissingPass,
            (400, "Missing baseVersion") => RemoteErrorKind::MissingBaseVersion,
            (400, "Bad payload") => RemoteErrorKind::BadPayload,
            (409, "VersionConflict") => RemoteErrorKind::VersionConflict,
            (409, _) => RemoteErrorKind::GroupExists,
            (403, _) => RemoteErrorKind::Forbidden,
            (404, _) => RemoteErrorKind::NotFound,
            (500..=599, _) => RemoteErrorKind::Internal,
            _ => RemoteErrorKind::Other,
        };

        Self {
            status: status.as_u16(),
            kind,
            message,
            current_version: body.and_then(|b| b.current_version),
        }
    }
}

/// Errors from `SyncClient`
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Invalid group id: {0}")]
    InvalidGroupId(String),

    #[error("Group password is required")]
    MissingPass,

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Transport(reqwest::Error),

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("{0}")]
    Remote(RemoteError),
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SyncError::Timeout
        } else {
            SyncError::Transport(e)
        }
    }
}

impl SyncError {
    /// The remote error, if the server answered with one
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            SyncError::Remote(e) => Some(e),
            _ => None,
        }
    }

    /// Current server version when a push lost an optimistic-concurrency race
    pub fn conflict_version(&self) -> Option<u64> {
        self.remote()
            .filter(|e| e.kind == RemoteErrorKind::VersionConflict)
            .and_then(|e| e.current_version)
    }
}

/// Client for one group API endpoint
#[derive(Debug, Clone)]
pub struct SyncClient {
    http: Client,
    base_url: String,
}

impl SyncClient {
    /// Build a client. A configured timeout bounds every request.
    pub fn new(config: &SyncConfig) -> Result<Self, SyncError> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            http: builder.build()?,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn group_url(&self, path: &str, id: &str) -> String {
        format!("{}{}?id={}", self.base_url, path, urlencoding::encode(id))
    }

    fn check_credentials(id: &str, pass: &str) -> Result<(), SyncError> {
        if !is_valid_group_id(id) {
            return Err(SyncError::InvalidGroupId(id.to_string()));
        }
        if pass.is_empty() {
            return Err(SyncError::MissingPass);
        }
        Ok(())
    }

    /// Create a new group; fails with `GroupExists` if the id is taken
    pub async fn create_group(&self, id: &str, pass: &str) -> Result<String, SyncError> {
        Self::check_credentials(id, pass)?;

        let request = self.http.post(format!("{}/group", self.base_url)).json(&CreateGroupRequest {
            id: id.to_string(),
            pass: pass.to_string(),
        });
        let created: CreateGroupResponse = send(request).await?;

        tracing::info!("Created group {}", created.id);
        Ok(created.id)
    }

    /// Fetch the current version and payload of a group
    pub async fn pull(&self, id: &str, pass: &str) -> Result<GroupSnapshot, SyncError> {
        Self::check_credentials(id, pass)?;

        let request = self.http.get(self.group_url("/group", id)).header(PASS_HEADER, pass);
        let snapshot: GroupSnapshot = send(request).await?;

        tracing::debug!("Pulled group {} at version {}", id, snapshot.version);
        Ok(snapshot)
    }

    /// Replace a group's payload and return the new version.
    ///
    /// With `base_version` set, the write only lands if nobody else pushed
    /// since; otherwise the error carries the server's current version.
    pub async fn push(
        &self,
        id: &str,
        pass: &str,
        base_version: Option<u64>,
        payload: Value,
    ) -> Result<u64, SyncError> {
        Self::check_credentials(id, pass)?;

        let request = self
            .http
            .put(self.group_url("/group", id))
            .header(PASS_HEADER, pass)
            .json(&PushRequest {
                version: None,
                base_version,
                payload: Some(payload),
            });

        match send::<PushResponse>(request).await {
            Ok(response) => {
                tracing::info!("Pushed group {} -> version {}", id, response.version);
                Ok(response.version)
            }
            Err(e) => {
                if let Some(current) = e.conflict_version() {
                    tracing::warn!(
                        "Push to group {} rejected: base {:?}, server at {}",
                        id,
                        base_version,
                        current
                    );
                }
                Err(e)
            }
        }
    }

    /// Version and last update time of a group, without downloading its payload
    pub async fn meta(&self, id: &str) -> Result<GroupMeta, SyncError> {
        if !is_valid_group_id(id) {
            return Err(SyncError::InvalidGroupId(id.to_string()));
        }

        send(self.http.get(self.group_url("/group/meta", id))).await
    }
}

async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, SyncError> {
    let response = request.send().await?;
    decode(response).await
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, SyncError> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        let body = serde_json::from_str::<ErrorBody>(&text).ok();
        return Err(SyncError::Remote(RemoteError::from_body(status, body)));
    }

    serde_json::from_str(&text).map_err(|e| SyncError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SyncClient {
        SyncClient::new(&SyncConfig {
            api_url: "http://127.0.0.1:9/".to_string(),
            timeout_secs: Some(1),
        })
        .unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = client();
        assert_eq!(client.base_url(), "http://127.0.0.1:9");
        assert_eq!(
            client.group_url("/group", "ward-7"),
            "http://127.0.0.1:9/group?id=ward-7"
        );
    }

    #[tokio::test]
    async fn test_invalid_credentials_rejected_before_network() {
        let client = client();

        let err = client.pull("x", "pw").await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidGroupId(_)));

        let err = client.push("ward-7", "", None, Value::Null).await.unwrap_err();
        assert!(matches!(err, SyncError::MissingPass));

        let err = client.meta("no spaces").await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidGroupId(_)));
    }

    #[test]
    fn test_remote_error_classification() {
        let conflict = RemoteError::from_body(
            StatusCode::CONFLICT,
            Some(ErrorBody {
                error: "VersionConflict".into(),
                current_version: Some(4),
            }),
        );
        assert_eq!(conflict.kind, RemoteErrorKind::VersionConflict);
        assert_eq!(conflict.current_version, Some(4));
        assert_eq!(
            SyncError::Remote(conflict).conflict_version(),
            Some(4)
        );

        let exists = RemoteError::from_body(
            StatusCode::CONFLICT,
            Some(ErrorBody {
                error: "GroupExists".into(),
                current_version: None,
            }),
        );
        assert_eq!(exists.kind, RemoteErrorKind::GroupExists);

        let opaque = RemoteError::from_body(StatusCode::BAD_GATEWAY, None);
        assert_eq!(opaque.kind, RemoteErrorKind::Internal);
        assert_eq!(opaque.message, "Bad Gateway");
        assert_eq!(opaque.to_string(), "Bad Gateway (HTTP 502)");
    }
}
