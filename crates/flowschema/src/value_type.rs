use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of a workflow input variable.
///
/// Serialized as its plain name so snapshots stay readable and unknown type
/// names written by other tools survive a round trip as `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VariableType {
    #[default]
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    Custom(String),
}

impl VariableType {
    pub fn as_str(&self) -> &str {
        match self {
            VariableType::String => "string",
            VariableType::Integer => "integer",
            VariableType::Number => "number",
            VariableType::Boolean => "boolean",
            VariableType::Object => "object",
            VariableType::Array => "array",
            VariableType::Custom(name) => name,
        }
    }
}

impl From<&str> for VariableType {
    fn from(s: &str) -> Self {
        match s.trim() {
            "" | "string" => VariableType::String,
            "integer" => VariableType::Integer,
            "number" => VariableType::Number,
            "boolean" => VariableType::Boolean,
            "object" => VariableType::Object,
            "array" => VariableType::Array,
            other => VariableType::Custom(other.to_string()),
        }
    }
}

impl From<String> for VariableType {
    fn from(s: String) -> Self {
        VariableType::from(s.as_str())
    }
}

impl From<VariableType> for String {
    fn from(t: VariableType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
