//! API models

use std::collections::BTreeMap;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// Per-path metadata of a diff entry, opaque to the caller
pub type FileChanges = BTreeMap<String, serde_json::Value>;

/// Job response shared by the update, diff and version endpoints.
///
/// Each endpoint fills in only its own id field (`updateid`, `diffid` or
/// `imageversionid`); the diff endpoints also fill the change sets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobResponse {
    #[serde(default)]
    pub jobstateid: Option<i64>,

    #[serde(default)]
    pub jobstatename: Option<String>,

    #[serde(default, deserialize_with = "lenient_u8")]
    pub jobprogress: Option<u8>,

    #[serde(default, deserialize_with = "lenient_id")]
    pub updateid: Option<String>,

    #[serde(default, deserialize_with = "lenient_id")]
    pub diffid: Option<String>,

    #[serde(default, deserialize_with = "lenient_id")]
    pub imageversionid: Option<String>,

    #[serde(default)]
    pub success: bool,

    #[serde(default)]
    pub error: bool,

    #[serde(default)]
    pub error_code: Option<i64>,

    #[serde(default)]
    pub error_message: Option<String>,

    #[serde(default, deserialize_with = "lenient_text")]
    pub joberror: Option<String>,

    #[serde(default, deserialize_with = "lenient_changes")]
    pub added: FileChanges,

    #[serde(default, deserialize_with = "lenient_changes")]
    pub modified: FileChanges,

    #[serde(default, deserialize_with = "lenient_changes")]
    pub removed: FileChanges,
}

/// Fleet install status response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallStatusResponse {
    /// Outstanding installs; empty once every machine is up to date
    #[serde(default, deserialize_with = "lenient_list")]
    pub installs: Vec<serde_json::Value>,
}

/// Acknowledgement returned by the diff reject endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RejectDiffResponse {
    #[serde(default)]
    pub success: bool,

    #[serde(default)]
    pub error_message: Option<String>,
}

/// Id that may be a JSON number or string. Empty strings and `null` become `None`.
pub fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) if s.is_empty() => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::custom(format!("invalid id: {}", other))),
    }
}

fn lenient_u8<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => return Ok(None),
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    Ok(value.map(|v| v.clamp(0.0, 100.0) as u8))
}

/// `joberror` is sometimes a string and sometimes a structured object
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) | Some(serde_json::Value::Bool(false)) => Ok(None),
        Some(serde_json::Value::String(s)) if s.is_empty() => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Array(a)) if a.is_empty() => Ok(None),
        Some(serde_json::Value::Object(o)) if o.is_empty() => Ok(None),
        Some(other) => Ok(Some(other.to_string())),
    }
}

/// Empty maps are serialized by the backend as `[]`
fn lenient_changes<'de, D>(deserializer: D) -> Result<FileChanges, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(FileChanges::new()),
        Some(serde_json::Value::Object(map)) => Ok(map.into_iter().collect()),
        Some(serde_json::Value::Array(items)) => Ok(items
            .into_iter()
            .filter_map(|item| match item {
                serde_json::Value::String(path) => Some((path, serde_json::Value::Null)),
                _ => None,
            })
            .collect()),
        Some(other) => Err(de::Error::custom(format!("invalid change set: {}", other))),
    }
}

fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(serde_json::Value::Array(items)) => Ok(items),
        Some(serde_json::Value::Object(map)) => Ok(map.into_iter().map(|(_, v)| v).collect()),
        Some(other) => Err(de::Error::custom(format!("invalid install list: {}", other))),
    }
}
