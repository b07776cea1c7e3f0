//! Group API wire types
//!
//! Shared by the HTTP handlers and `SyncClient` so both sides agree on the
//! JSON field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Header carrying the group password on `GET`/`PUT /group`
pub const PASS_HEADER: &str = "x-pass";

/// Longest accepted group id
pub const GROUP_ID_MAX_LEN: usize = 40;
/// Shortest accepted group id
pub const GROUP_ID_MIN_LEN: usize = 3;

/// Group ids are 3-40 characters of `[A-Za-z0-9_-]`
pub fn is_valid_group_id(id: &str) -> bool {
    (GROUP_ID_MIN_LEN..=GROUP_ID_MAX_LEN).contains(&id.len())
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// `POST /group` body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateGroupRequest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub pass: String,
}

/// `POST /group` success body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroupResponse {
    pub id: String,
}

/// Current contents of a group, as returned by `GET /group`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSnapshot {
    pub version: u64,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub payload: Value,
}

/// Lightweight polling view, as returned by `GET /group/meta`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMeta {
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// `PUT /group` body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
    /// Accepted for compatibility with older clients; the server assigns versions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    /// Version the writer last saw; a mismatch is rejected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_version: Option<u64>,
    /// `None` only when the member is missing; an explicit `null` is `Some(Null)`
    #[serde(default, deserialize_with = "present")]
    pub payload: Option<Value>,
}

/// `PUT /group` success body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushResponse {
    pub ok: bool,
    pub version: u64,
}

/// Error body of every failed group request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_id_validation() {
        assert!(is_valid_group_id("ward_7-night"));
        assert!(is_valid_group_id("abc"));
        assert!(is_valid_group_id(&"a".repeat(40)));

        assert!(!is_valid_group_id("ab"));
        assert!(!is_valid_group_id(&"a".repeat(41)));
        assert!(!is_valid_group_id("ward 7"));
        assert!(!is_valid_group_id("วอร์ด7"));
        assert!(!is_valid_group_id(""));
    }

    #[test]
    fn test_push_request_distinguishes_missing_and_null_payload() {
        let missing: PushRequest = serde_json::from_str(r#"{"version":1}"#).unwrap();
        assert!(missing.payload.is_none());

        let null: PushRequest = serde_json::from_str(r#"{"payload":null}"#).unwrap();
        assert_eq!(null.payload, Some(Value::Null));

        let full: PushRequest =
            serde_json::from_str(r#"{"version":1,"baseVersion":3,"payload":{"a":1}}"#).unwrap();
        assert_eq!(full.base_version, Some(3));
    }

    #[test]
    fn test_push_request_serialization() {
        let request = PushRequest {
            version: None,
            base_version: Some(2),
            payload: Some(serde_json::json!({"mode": "merge"})),
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("baseVersion"));
        assert!(!json.contains("\"version\""));
    }
}
