//! Derives a JSON Schema from a plan's parameter descriptors and validates
//! the assembled parameter set against it as the final gate before execution.

use serde_json::{Map as JsonMap, Value as JsonValue, json};
use thiserror::Error;

use crate::bundle::{ParamType, Parameters, Plan};

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unknown parameter type [{type_name}] for parameter [{param}]")]
    UnknownType { param: String, type_name: String },
    #[error("schema construction failed: {0}")]
    Build(String),
    #[error("parameters failed schema validation: {0}")]
    Validation(String),
}

/// Build an object schema with one property per parameter descriptor.
/// Required descriptors become required properties.
pub fn plan_schema(plan: &Plan) -> Result<JsonValue, SchemaError> {
    let mut properties = JsonMap::new();
    let mut required = Vec::new();

    for param in &plan.parameters {
        let mut property = match &param.param_type {
            ParamType::String => json!({"type": "string"}),
            ParamType::Enum => json!({"type": "string", "enum": param.enumeration}),
            ParamType::Boolean => json!({"type": "boolean"}),
            ParamType::Integer => json!({"type": "integer"}),
            ParamType::Number => json!({"type": "number"}),
            ParamType::Object => json!({"type": "object"}),
            ParamType::Array => json!({"type": "array"}),
            ParamType::Null => json!({"type": "null"}),
            ParamType::Other(name) => {
                return Err(SchemaError::UnknownType {
                    param: param.name.clone(),
                    type_name: name.clone(),
                });
            }
        };
        if !param.title.is_empty() {
            property["title"] = JsonValue::String(param.title.clone());
        }
        if !param.description.is_empty() {
            property["description"] = JsonValue::String(param.description.clone());
        }
        properties.insert(param.name.clone(), property);
        if param.required {
            required.push(JsonValue::String(param.name.clone()));
        }
    }

    Ok(json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "properties": properties,
        "required": required,
    }))
}

/// Validate a collected parameter set against a plan-derived schema.
pub fn validate(schema: &JsonValue, params: &Parameters) -> Result<(), SchemaError> {
    let validator =
        jsonschema::validator_for(schema).map_err(|err| SchemaError::Build(err.to_string()))?;
    let instance = JsonValue::Object(params.clone());
    validator
        .validate(&instance)
        .map_err(|err| SchemaError::Validation(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::ParameterDescriptor;

    fn plan_with(params: Vec<ParameterDescriptor>) -> Plan {
        Plan {
            name: "default".to_string(),
            parameters: params,
            ..Plan::default()
        }
    }

    fn descriptor(name: &str, ty: &str, required: bool) -> ParameterDescriptor {
        ParameterDescriptor {
            name: name.to_string(),
            param_type: ParamType::from(ty.to_string()),
            required,
            ..ParameterDescriptor::default()
        }
    }

    #[test]
    fn descriptor_types_map_to_schema_types() {
        let plan = plan_with(vec![
            descriptor("a", "string", false),
            descriptor("b", "int", false),
            descriptor("c", "number", false),
            descriptor("d", "bool", false),
        ]);
        let schema = plan_schema(&plan).unwrap();
        assert_eq!(schema["properties"]["a"]["type"], "string");
        assert_eq!(schema["properties"]["b"]["type"], "integer");
        assert_eq!(schema["properties"]["c"]["type"], "number");
        assert_eq!(schema["properties"]["d"]["type"], "boolean");
    }

    #[test]
    fn enum_descriptor_becomes_string_with_enumeration() {
        let mut param = descriptor("level", "enum", true);
        param.enumeration = vec!["low".to_string(), "high".to_string()];
        let schema = plan_schema(&plan_with(vec![param])).unwrap();
        assert_eq!(schema["properties"]["level"]["type"], "string");
        assert_eq!(schema["properties"]["level"]["enum"][1], "high");
        assert_eq!(schema["required"][0], "level");
    }

    #[test]
    fn unknown_type_is_a_construction_error() {
        let plan = plan_with(vec![descriptor("x", "tuple", false)]);
        match plan_schema(&plan) {
            Err(SchemaError::UnknownType { param, type_name }) => {
                assert_eq!(param, "x");
                assert_eq!(type_name, "tuple");
            }
            other => panic!("expected UnknownType, got {other:?}"),
        }
    }

    #[test]
    fn missing_required_parameter_fails_validation() {
        let plan = plan_with(vec![descriptor("needed", "string", true)]);
        let schema = plan_schema(&plan).unwrap();
        let empty = Parameters::new();
        assert!(matches!(
            validate(&schema, &empty),
            Err(SchemaError::Validation(_))
        ));

        let mut filled = Parameters::new();
        filled.insert("needed".to_string(), JsonValue::String("v".to_string()));
        validate(&schema, &filled).unwrap();
    }

    #[test]
    fn wrong_value_type_fails_validation() {
        let plan = plan_with(vec![descriptor("count", "integer", true)]);
        let schema = plan_schema(&plan).unwrap();
        let mut params = Parameters::new();
        params.insert("count".to_string(), JsonValue::String("42".to_string()));
        assert!(validate(&schema, &params).is_err());
    }
}
