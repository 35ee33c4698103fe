use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::build_date::BuildDate;
use crate::compare::is_newer;

pub const KEY_FILENAME: &str = "filename";
pub const KEY_FILESIZE: &str = "filesize";
pub const KEY_BUILD_DATE: &str = "build_date";
pub const KEY_MD5: &str = "md5";
pub const KEY_URL: &str = "url";
pub const KEY_DEVELOPER: &str = "developer";
pub const KEY_DEVELOPER_URL: &str = "developer_url";
pub const KEY_CHANGELOG: &str = "changelog";
pub const KEY_DONATE_URL: &str = "donate_url";
pub const KEY_FORUM_URL: &str = "forum_url";
pub const KEY_WEBSITE_URL: &str = "website_url";
pub const KEY_NEWS_URL: &str = "news_url";
pub const KEY_ADDONS: &str = "addons";

const EMPTY_ADDONS: &str = "[]";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("update payload is not a JSON object")]
    NotAnObject,
    #[error("missing required field `{0}`")]
    Missing(&'static str),
    #[error("malformed field `{field}`: {reason}")]
    Malformed {
        field: &'static str,
        reason: &'static str,
    },
}

/// One advertised build.
///
/// Only constructed through [`UpdateRecord::from_json`], so the mandatory
/// fields are always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRecord {
    file_name: String,
    file_size: u64,
    build_date: BuildDate,
    md5: String,
    download_url: String,
    #[serde(default)]
    developer: String,
    #[serde(default)]
    developer_url: String,
    #[serde(default)]
    changelog: String,
    #[serde(default)]
    donate_url: String,
    #[serde(default)]
    forum_url: String,
    #[serde(default)]
    website_url: String,
    #[serde(default)]
    news_url: String,
    #[serde(default = "empty_addons")]
    addons: String,
    #[serde(skip)]
    newer_than_installed: bool,
}

fn empty_addons() -> String {
    EMPTY_ADDONS.to_string()
}

impl UpdateRecord {
    pub fn from_json(value: &Value) -> Result<Self, RecordError> {
        let obj = value.as_object().ok_or(RecordError::NotAnObject)?;

        let addons = match obj.get(KEY_ADDONS) {
            Some(addons @ Value::Array(_)) => addons.to_string(),
            _ => empty_addons(),
        };

        Ok(Self {
            file_name: required_string(obj, KEY_FILENAME)?,
            file_size: required_size(obj, KEY_FILESIZE)?,
            build_date: BuildDate::parse(&required_string(obj, KEY_BUILD_DATE)?),
            md5: required_string(obj, KEY_MD5)?,
            download_url: required_string(obj, KEY_URL)?,
            developer: optional_string(obj, KEY_DEVELOPER),
            developer_url: optional_string(obj, KEY_DEVELOPER_URL),
            changelog: optional_string(obj, KEY_CHANGELOG),
            donate_url: optional_string(obj, KEY_DONATE_URL),
            forum_url: optional_string(obj, KEY_FORUM_URL),
            website_url: optional_string(obj, KEY_WEBSITE_URL),
            news_url: optional_string(obj, KEY_NEWS_URL),
            addons,
            newer_than_installed: false,
        })
    }

    /// Copy of this record with the newer-than-installed flag recomputed.
    pub fn evaluated(mut self, installed: &BuildDate) -> Self {
        self.newer_than_installed = is_newer(&self, installed);
        self
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn build_date(&self) -> &BuildDate {
        &self.build_date
    }

    pub fn md5(&self) -> &str {
        &self.md5
    }

    pub fn download_url(&self) -> &str {
        &self.download_url
    }

    pub fn developer(&self) -> &str {
        &self.developer
    }

    pub fn developer_url(&self) -> &str {
        &self.developer_url
    }

    pub fn changelog(&self) -> &str {
        &self.changelog
    }

    pub fn donate_url(&self) -> &str {
        &self.donate_url
    }

    pub fn forum_url(&self) -> &str {
        &self.forum_url
    }

    pub fn website_url(&self) -> &str {
        &self.website_url
    }

    pub fn news_url(&self) -> &str {
        &self.news_url
    }

    /// Raw JSON text of the add-on list, `[]` when none were advertised.
    pub fn addons(&self) -> &str {
        &self.addons
    }

    pub fn is_newer_than_installed(&self) -> bool {
        self.newer_than_installed
    }
}

/// Parse a raw update payload. Failures are logged and yield an empty list.
pub fn parse(raw_json: &str) -> Vec<UpdateRecord> {
    match serde_json::from_str::<Value>(raw_json) {
        Ok(value) => parse_value(&value),
        Err(e) => {
            warn!(error = %e, "error in JSON result");
            Vec::new()
        }
    }
}

/// Same as [`parse`] for an already decoded payload.
pub fn parse_value(value: &Value) -> Vec<UpdateRecord> {
    match UpdateRecord::from_json(value) {
        Ok(record) => vec![record],
        Err(e) => {
            warn!(error = %e, "error in JSON result");
            Vec::new()
        }
    }
}

fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn required_string(obj: &Map<String, Value>, key: &'static str) -> Result<String, RecordError> {
    obj.get(key)
        .and_then(coerce_string)
        .ok_or(RecordError::Missing(key))
}

fn optional_string(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key).and_then(coerce_string).unwrap_or_default()
}

fn required_size(obj: &Map<String, Value>, key: &'static str) -> Result<u64, RecordError> {
    match obj.get(key) {
        None | Some(Value::Null) => Err(RecordError::Missing(key)),
        Some(Value::Number(n)) => n.as_u64().ok_or(RecordError::Malformed {
            field: key,
            reason: "expected a non-negative integer",
        }),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| RecordError::Malformed {
            field: key,
            reason: "expected a non-negative integer",
        }),
        Some(_) => Err(RecordError::Malformed {
            field: key,
            reason: "expected a non-negative integer",
        }),
    }
}
