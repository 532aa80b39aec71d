//! Canonical payload validation.
//!
//! `format`, `purpose` and `user` are required scalars; `profile` is an
//! optional scalar; `skills`, `restrictions` and `tags` are optional string
//! lists. Everything else is an unknown key, handled per policy and kept on
//! the payload either way so callers never lose data.

use crate::diag::ValidationFailure;
use crate::model::{CanonicalPayload, PayloadMap, Value};

const REQUIRED_KEYS: [&str; 3] = ["format", "purpose", "user"];
const OPTIONAL_SCALAR_KEYS: [&str; 1] = ["profile"];
const OPTIONAL_LIST_KEYS: [&str; 3] = ["skills", "restrictions", "tags"];

/// What to do with keys outside the canonical schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownKeyPolicy {
    /// Keep silently.
    Allow,
    /// Keep, but attach a warning to the record.
    #[default]
    Warn,
    /// Fail validation.
    Reject,
}

/// Validation and parsing limits, shared across an engine's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadPolicy {
    pub unknown_keys: UnknownKeyPolicy,
    /// Ceiling applied before parsing; larger bodies become parse failures.
    pub max_payload_bytes: usize,
}

impl Default for PayloadPolicy {
    fn default() -> Self {
        PayloadPolicy {
            unknown_keys: UnknownKeyPolicy::default(),
            max_payload_bytes: 64 * 1024,
        }
    }
}

/// Check a parsed map against the canonical schema.
///
/// Returns the canonical payload plus non-fatal warnings (duplicate keys,
/// unknown keys under the warn policy). Missing required keys and wrong
/// value shapes fail with the offending field named.
pub fn validate(
    map: &PayloadMap,
    policy: &PayloadPolicy,
) -> Result<(CanonicalPayload, Vec<String>), ValidationFailure> {
    let mut warnings: Vec<String> = map
        .duplicates
        .iter()
        .map(|key| format!("duplicate key {key:?}, last value kept"))
        .collect();

    for key in REQUIRED_KEYS {
        if map.get(key).is_none() {
            return Err(ValidationFailure {
                field: Some(key.to_string()),
                message: "missing required key".into(),
            });
        }
    }

    let mut payload = CanonicalPayload {
        format: required_scalar(map, "format")?,
        purpose: required_scalar(map, "purpose")?,
        user: required_scalar(map, "user")?,
        ..CanonicalPayload::default()
    };
    payload.profile = optional_scalar(map, "profile")?;
    payload.skills = optional_list(map, "skills")?;
    payload.restrictions = optional_list(map, "restrictions")?;
    payload.tags = optional_list(map, "tags")?;

    for (key, value) in &map.entries {
        if is_canonical(key) {
            continue;
        }
        match policy.unknown_keys {
            UnknownKeyPolicy::Allow => {}
            UnknownKeyPolicy::Warn => warnings.push(format!("unknown key {key:?}")),
            UnknownKeyPolicy::Reject => {
                return Err(ValidationFailure {
                    field: Some(key.clone()),
                    message: "unknown key".into(),
                });
            }
        }
        payload.extra.push((key.clone(), value.clone()));
    }

    Ok((payload, warnings))
}

fn is_canonical(key: &str) -> bool {
    REQUIRED_KEYS.contains(&key)
        || OPTIONAL_SCALAR_KEYS.contains(&key)
        || OPTIONAL_LIST_KEYS.contains(&key)
}

fn required_scalar(map: &PayloadMap, key: &str) -> Result<String, ValidationFailure> {
    match map.get(key).and_then(Value::as_scalar) {
        Some(s) if !s.trim().is_empty() => Ok(s.to_string()),
        Some(_) => Err(ValidationFailure {
            field: Some(key.to_string()),
            message: "value must not be empty".into(),
        }),
        None => Err(ValidationFailure {
            field: Some(key.to_string()),
            message: "value must be a scalar".into(),
        }),
    }
}

fn optional_scalar(map: &PayloadMap, key: &str) -> Result<Option<String>, ValidationFailure> {
    match map.get(key) {
        None => Ok(None),
        Some(value) => match value.as_scalar() {
            Some(s) => Ok(Some(s.to_string())),
            None => Err(ValidationFailure {
                field: Some(key.to_string()),
                message: "value must be a scalar".into(),
            }),
        },
    }
}

fn optional_list(map: &PayloadMap, key: &str) -> Result<Option<Vec<String>>, ValidationFailure> {
    match map.get(key) {
        None => Ok(None),
        Some(value) => match value.as_string_list() {
            Some(items) => Ok(Some(items)),
            None => Err(ValidationFailure {
                field: Some(key.to_string()),
                message: "value must be a list of strings".into(),
            }),
        },
    }
}
