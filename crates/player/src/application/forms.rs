//! Move forms with enum fields resolved against the chest.

use serde::Serialize;
use serde_json::Value;

use boardsync_protocol::{Chest, MoveField, MoveForm};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResolvedForm {
    pub name: String,
    pub help_text: String,
    pub fields: Vec<ResolvedField>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResolvedField {
    pub name: String,
    #[serde(rename = "Type")]
    pub field_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    /// Legal values, for fields constrained by a chest enum.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

pub fn resolve_forms(forms: &[MoveForm], chest: &Chest) -> Vec<ResolvedForm> {
    forms
        .iter()
        .map(|form| ResolvedForm {
            name: form.name.clone(),
            help_text: form.help_text.clone(),
            fields: form
                .fields
                .iter()
                .map(|field| resolve_field(&form.name, field, chest))
                .collect(),
        })
        .collect()
}

fn resolve_field(form_name: &str, field: &MoveField, chest: &Chest) -> ResolvedField {
    let enum_values = field.enum_name.as_deref().map(|enum_name| {
        chest
            .enum_values(enum_name)
            .map(<[String]>::to_vec)
            .unwrap_or_else(|| {
                tracing::warn!(
                    form = form_name,
                    field = %field.name,
                    enum_name,
                    "Move field references an enum missing from the chest"
                );
                Vec::new()
            })
    });

    ResolvedField {
        name: field.name.clone(),
        field_type: field.field_type.clone(),
        default_value: field.default_value.clone(),
        enum_values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::testing::fixtures::{chest, move_form};
    use serde_json::json;

    #[test]
    fn enum_fields_receive_legal_values() {
        let forms = resolve_forms(&[move_form()], &chest());

        assert_eq!(forms.len(), 1);
        let form = &forms[0];
        assert_eq!(form.name, "Reveal Card");
        assert_eq!(form.fields[0].enum_values, None);
        assert_eq!(form.fields[0].default_value, Some(json!(0)));
        assert_eq!(
            form.fields[1].enum_values,
            Some(vec!["Red".to_string(), "Blue".to_string()])
        );
    }

    #[test]
    fn unknown_enum_resolves_to_no_values() {
        let mut form = move_form();
        form.fields[1].enum_name = Some("Shape".to_string());

        let forms = resolve_forms(&[form], &chest());
        assert_eq!(forms[0].fields[1].enum_values, Some(Vec::new()));
    }
}
