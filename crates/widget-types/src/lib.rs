//! Shared types for the widget consumer.
//!
//! This crate defines the request wire format ([`WidgetRequest`],
//! [`RequestKind`], [`Attribute`]), the persisted record ([`Widget`]) and the
//! storage key derivation used by the document store ([`document_key`]).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Prefix prepended to derived document keys when none is configured.
pub const DEFAULT_KEY_PREFIX: &str = "widgets/";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced while parsing a raw request body.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The body is not valid JSON, or a required field is missing or has the
    /// wrong type.
    #[error("malformed request: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The body has no `type` field.
    #[error("request has no type")]
    MissingType,

    /// The `type` field names an operation this consumer does not know.
    #[error("unknown request type: {0}")]
    UnknownType(String),
}

// ---------------------------------------------------------------------------
// Request kind
// ---------------------------------------------------------------------------

/// The mutation a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RequestKind {
    /// Create a widget.
    Create,
    /// Update a widget.
    Update,
    /// Delete a widget.
    Delete,
}

impl RequestKind {
    /// The canonical wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl FromStr for RequestKind {
    type Err = ParseError;

    /// Accepts the short names and the long-form names older producers emit.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" | "WidgetCreateRequest" => Ok(Self::Create),
            "update" | "WidgetUpdateRequest" => Ok(Self::Update),
            "delete" | "WidgetDeleteRequest" => Ok(Self::Delete),
            other => Err(ParseError::UnknownType(other.to_string())),
        }
    }
}

impl TryFrom<String> for RequestKind {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RequestKind> for String {
    fn from(kind: RequestKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A free-form name/value pair attached to a widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name.
    pub name: String,
    /// Attribute value.
    pub value: String,
}

impl Attribute {
    /// Build an attribute from anything string-like.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A parsed widget mutation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetRequest {
    /// Which mutation to apply.
    #[serde(rename = "type")]
    pub kind: RequestKind,
    /// Producer-assigned request identifier.
    pub request_id: String,
    /// Target widget.
    pub widget_id: String,
    /// Widget owner. Part of the document key.
    pub owner: String,
    /// Optional short label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Optional long description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Extra attributes, in the order the producer sent them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub other_attributes: Vec<Attribute>,
}

impl WidgetRequest {
    /// Parse a raw UTF-8 JSON request body.
    ///
    /// A missing or unknown `type` is reported separately from other
    /// structural problems so callers can log the two cases differently.
    pub fn parse(body: &[u8]) -> Result<Self, ParseError> {
        let value: serde_json::Value = serde_json::from_slice(body)?;

        match value.get("type") {
            None | Some(serde_json::Value::Null) => return Err(ParseError::MissingType),
            Some(serde_json::Value::String(kind)) => {
                kind.parse::<RequestKind>()?;
            }
            Some(other) => return Err(ParseError::UnknownType(other.to_string())),
        }

        Ok(serde_json::from_value(value)?)
    }

    /// Derived document key for this request's widget.
    pub fn document_key(&self, prefix: &str) -> String {
        document_key(prefix, &self.owner, &self.widget_id)
    }
}

// ---------------------------------------------------------------------------
// Persisted widget
// ---------------------------------------------------------------------------

/// The stored form of a widget: the request minus `type` and `requestId`,
/// with optional text fields defaulted to empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Widget {
    /// Widget identifier.
    pub widget_id: String,
    /// Owner at the time of the last write.
    pub owner: String,
    /// Label, empty when the request had none.
    #[serde(default)]
    pub label: String,
    /// Description, empty when the request had none.
    #[serde(default)]
    pub description: String,
    /// Extra attributes, order preserved.
    #[serde(default)]
    pub other_attributes: Vec<Attribute>,
}

impl From<&WidgetRequest> for Widget {
    fn from(req: &WidgetRequest) -> Self {
        Self {
            widget_id: req.widget_id.clone(),
            owner: req.owner.clone(),
            label: req.label.clone().unwrap_or_default(),
            description: req.description.clone().unwrap_or_default(),
            other_attributes: req.other_attributes.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Key derivation
// ---------------------------------------------------------------------------

/// Lowercase the owner and replace spaces with hyphens.
pub fn normalize_owner(owner: &str) -> String {
    owner.replace(' ', "-").to_lowercase()
}

/// Document store key: `{prefix}{normalized-owner}-{widget_id}.json`.
///
/// Pure function of its inputs. Update and delete requests must carry the
/// owner used at creation or they address a different key.
pub fn document_key(prefix: &str, owner: &str, widget_id: &str) -> String {
    format!("{prefix}{}-{widget_id}.json", normalize_owner(owner))
}
