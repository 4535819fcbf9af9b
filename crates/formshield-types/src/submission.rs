//! The [`Submission`] input record.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A scalar value carried by an open-ended submission field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A free-text value.
    Text(String),
    /// A numeric value.
    Number(f64),
    /// A boolean value (e.g. a consent checkbox).
    Bool(bool),
    /// An explicitly empty value.
    Null,
}

impl FieldValue {
    /// Render the value as a string for normalization.
    ///
    /// Returns `None` for [`FieldValue::Null`], which normalization skips.
    pub fn as_text(&self) -> Option<String> {
        match self {
            FieldValue::Text(s) => Some(s.clone()),
            FieldValue::Number(n) => Some(n.to_string()),
            FieldValue::Bool(b) => Some(b.to_string()),
            FieldValue::Null => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

/// One form-style submission to evaluate.
///
/// Every field is optional: the engine scores whatever is present and
/// penalizes what is missing. The record is immutable once received --
/// the pipeline derives normalized views from it but never mutates it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// Sender email address, as submitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Display name, as submitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Free-text message body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// A URL the sender supplied (e.g. a website field).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Client IP address, if the host application captured one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    /// Client user-agent string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Unix millisecond timestamp at which the form was submitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at_ms: Option<u64>,

    /// Unix millisecond timestamp at which the form was rendered.
    ///
    /// Together with [`submitted_at_ms`](Self::submitted_at_ms) this gives
    /// the fill time, a strong bot signal when implausibly short.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendered_at_ms: Option<u64>,

    /// Open-ended extra fields (field name -> scalar value).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub fields: HashMap<String, FieldValue>,
}

impl Submission {
    /// Look up an extra field by name.
    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Form fill time in milliseconds, when both timestamps are present.
    pub fn fill_time_ms(&self) -> Option<i64> {
        match (self.submitted_at_ms, self.rendered_at_ms) {
            (Some(sub), Some(rend)) => Some(sub as i64 - rend as i64),
            _ => None,
        }
    }
}
