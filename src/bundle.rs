//! Data model for service bundles: specs, plans, and parameter descriptors.
//!
//! A `BundleSpec` is produced by a registry scan and cached in the
//! configuration store; it is treated as immutable once loaded.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Collected parameter values keyed by descriptor name, built fresh per run.
pub type Parameters = serde_json::Map<String, JsonValue>;

/// Description of a bundle image and its deployment plans.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct BundleSpec {
    pub fq_name: String,
    pub image: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub async_bind: bool,
    #[serde(default)]
    pub bindable: bool,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub runtime: i32,
    #[serde(default)]
    pub plans: Vec<Plan>,
}

/// A named deployment variant of a bundle.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub free: bool,
    #[serde(default)]
    pub bindable: bool,
    #[serde(default)]
    pub parameters: Vec<ParameterDescriptor>,
    #[serde(default)]
    pub bind_parameters: Vec<ParameterDescriptor>,
}

/// One configurable value of a plan.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ParameterDescriptor {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub param_type: ParamType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub default: Option<ParamDefault>,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "enum", default)]
    pub enumeration: Vec<String>,
    #[serde(default)]
    pub display_type: Option<String>,
    #[serde(default)]
    pub display_group: Option<String>,
}

impl ParameterDescriptor {
    /// Secret values are prompted for without terminal echo.
    pub fn is_secret(&self) -> bool {
        self.display_type.as_deref() == Some("password")
    }
}

/// Semantic type of a parameter. Unrecognized type names are carried through
/// so coercion can fall back to pass-through while schema construction can
/// reject them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ParamType {
    #[default]
    String,
    Enum,
    Boolean,
    Integer,
    Number,
    Object,
    Array,
    Null,
    Other(String),
}

impl From<String> for ParamType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "string" => ParamType::String,
            "enum" => ParamType::Enum,
            "boolean" | "bool" => ParamType::Boolean,
            "integer" | "int" => ParamType::Integer,
            "number" => ParamType::Number,
            "object" => ParamType::Object,
            "array" => ParamType::Array,
            "null" => ParamType::Null,
            _ => ParamType::Other(value),
        }
    }
}

impl From<ParamType> for String {
    fn from(value: ParamType) -> Self {
        match value {
            ParamType::String => "string".to_string(),
            ParamType::Enum => "enum".to_string(),
            ParamType::Boolean => "boolean".to_string(),
            ParamType::Integer => "integer".to_string(),
            ParamType::Number => "number".to_string(),
            ParamType::Object => "object".to_string(),
            ParamType::Array => "array".to_string(),
            ParamType::Null => "null".to_string(),
            ParamType::Other(name) => name,
        }
    }
}

/// Default value of a parameter descriptor.
///
/// Untagged so that JSON defaults deserialize to the matching variant; the
/// variant order makes whole numbers integers rather than floats.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamDefault {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamDefault {
    /// Render the default to the string form used when the user submits an
    /// empty input. Floats render with no fractional digits.
    pub fn render(&self) -> String {
        match self {
            ParamDefault::Bool(v) => v.to_string(),
            ParamDefault::Int(v) => v.to_string(),
            ParamDefault::Float(v) => format!("{v:.0}"),
            ParamDefault::Text(v) => v.clone(),
        }
    }
}

impl std::fmt::Display for ParamDefault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamDefault::Bool(v) => write!(f, "{v}"),
            ParamDefault::Int(v) => write!(f, "{v}"),
            ParamDefault::Float(v) => write!(f, "{v}"),
            ParamDefault::Text(v) => write!(f, "{v}"),
        }
    }
}
