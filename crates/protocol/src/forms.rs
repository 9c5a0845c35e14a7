//! Move forms: the moves a viewer may propose in a given state.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MoveForm {
    pub name: String,
    #[serde(default)]
    pub help_text: String,
    #[serde(default)]
    pub fields: Vec<MoveField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MoveField {
    pub name: String,
    #[serde(rename = "Type", default)]
    pub field_type: String,
    /// Name of a chest enum constraining this field's values.
    #[serde(rename = "Enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}
