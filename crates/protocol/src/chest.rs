//! Static component catalog for one game type.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::state::PropertyMap;

/// Reference catalog fetched once per session: deck templates and enums.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Chest {
    #[serde(default)]
    pub decks: BTreeMap<String, Vec<PropertyMap>>,
    #[serde(default)]
    pub enums: BTreeMap<String, Vec<String>>,
}

impl Chest {
    pub fn deck(&self, name: &str) -> Option<&[PropertyMap]> {
        self.decks.get(name).map(Vec::as_slice)
    }

    pub fn enum_values(&self, name: &str) -> Option<&[String]> {
        self.enums.get(name).map(Vec::as_slice)
    }
}
