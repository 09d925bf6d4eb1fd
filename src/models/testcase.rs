//! Canonical testcase structure stored in `apis.body` and `case_steps.body`.
//!
//! Bodies are persisted as JSON text carrying a `version` number. Decoding is
//! strict: unknown fields, missing required fields or an unsupported version
//! all fail with [`AppError::MalformedBody`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::{AppError, AppResult};
use crate::models::HttpMethod;

/// Current encoding version of the canonical body
pub const BODY_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CanonicalBody {
    pub version: u32,
    pub name: String,
    pub times: u32,
    pub request: CanonicalRequest,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<Variable>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extract: Vec<Extractor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validate: Vec<Validator>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub setup_hooks: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub teardown_hooks: Vec<String>,
    #[serde(default, skip_serializing_if = "Descriptions::is_empty")]
    pub desc: Descriptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CanonicalRequest {
    pub url: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub verify: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub files: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Variable {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Extractor {
    pub name: String,
    pub path: String,
}

/// One assertion: `comparator(actual, expect)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Validator {
    pub comparator: String,
    pub actual: String,
    pub expect: Value,
}

/// Free-text descriptions keyed by the field they annotate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Descriptions {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub header: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub files: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extract: BTreeMap<String, String>,
}

impl Descriptions {
    pub fn is_empty(&self) -> bool {
        self.header.is_empty()
            && self.data.is_empty()
            && self.params.is_empty()
            && self.files.is_empty()
            && self.variables.is_empty()
            && self.extract.is_empty()
    }
}

impl CanonicalBody {
    pub fn new(name: impl Into<String>, url: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            version: BODY_VERSION,
            name: name.into(),
            times: 1,
            request: CanonicalRequest {
                url: url.into(),
                method,
                verify: false,
                headers: BTreeMap::new(),
                params: Map::new(),
                data: Map::new(),
                json: None,
                files: Map::new(),
            },
            variables: Vec::new(),
            extract: Vec::new(),
            validate: Vec::new(),
            setup_hooks: Vec::new(),
            teardown_hooks: Vec::new(),
            desc: Descriptions::default(),
        }
    }

    /// Serialize for storage
    pub fn encode(&self) -> AppResult<String> {
        serde_json::to_string(self)
            .map_err(|e| AppError::Internal(format!("Failed to encode body: {}", e)))
    }

    /// Decode a stored body, failing closed on anything unexpected
    pub fn decode(text: &str) -> AppResult<Self> {
        let body: CanonicalBody =
            serde_json::from_str(text).map_err(|e| AppError::MalformedBody(e.to_string()))?;

        if body.version != BODY_VERSION {
            return Err(AppError::MalformedBody(format!(
                "unsupported body version {}",
                body.version
            )));
        }

        Ok(body)
    }
}

/// Type codes used by tabular editors: the value travels as text and the
/// code says how to read it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ValueType {
    String,
    Integer,
    Float,
    Boolean,
    List,
    Dict,
}

impl TryFrom<u8> for ValueType {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(ValueType::String),
            2 => Ok(ValueType::Integer),
            3 => Ok(ValueType::Float),
            4 => Ok(ValueType::Boolean),
            5 => Ok(ValueType::List),
            6 => Ok(ValueType::Dict),
            other => Err(format!("unknown value type {}", other)),
        }
    }
}

impl From<ValueType> for u8 {
    fn from(kind: ValueType) -> Self {
        match kind {
            ValueType::String => 1,
            ValueType::Integer => 2,
            ValueType::Float => 3,
            ValueType::Boolean => 4,
            ValueType::List => 5,
            ValueType::Dict => 6,
        }
    }
}

impl ValueType {
    /// Read `text` as a value of this type
    pub fn coerce(&self, text: &str) -> Result<Value, String> {
        match self {
            ValueType::String => Ok(Value::String(text.to_string())),
            ValueType::Integer => {
                let trimmed = text.trim();
                trimmed
                    .parse::<i64>()
                    .map(Value::from)
                    .or_else(|_| trimmed.parse::<u64>().map(Value::from))
                    .map_err(|_| format!("`{}` is not an integer", text))
            }
            ValueType::Float => text
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("`{}` is not a float", text)),
            ValueType::Boolean => match text.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(format!("`{}` is not a boolean", text)),
            },
            ValueType::List => match serde_json::from_str::<Value>(text) {
                Ok(value @ Value::Array(_)) => Ok(value),
                _ => Err(format!("`{}` is not a JSON list", text)),
            },
            ValueType::Dict => match serde_json::from_str::<Value>(text) {
                Ok(value @ Value::Object(_)) => Ok(value),
                _ => Err(format!("`{}` is not a JSON object", text)),
            },
        }
    }

    /// Classify a value and render it as editor text. Null renders as an
    /// empty string.
    pub fn render(value: &Value) -> (ValueType, String) {
        match value {
            Value::Null => (ValueType::String, String::new()),
            Value::String(s) => (ValueType::String, s.clone()),
            Value::Bool(b) => (ValueType::Boolean, b.to_string()),
            Value::Number(n) if n.is_f64() => (ValueType::Float, n.to_string()),
            Value::Number(n) => (ValueType::Integer, n.to_string()),
            Value::Array(_) => (ValueType::List, value.to_string()),
            Value::Object(_) => (ValueType::Dict, value.to_string()),
        }
    }
}
