//! JSON schema of the portable form definition document.

use serde_json::Value;

use crate::spec::definition::FormDefinition;

/// Schema for `{ "form": Form, "fields": [Field] }`.
pub fn definition_schema() -> Value {
    let schema = schemars::schema_for!(FormDefinition);
    serde_json::to_value(&schema).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_describes_form_and_fields() {
        let schema = definition_schema();
        assert_eq!(schema["title"], "FormDefinition");
        let properties = schema["properties"].as_object().expect("properties");
        assert!(properties.contains_key("form"));
        assert!(properties.contains_key("fields"));
    }
}
