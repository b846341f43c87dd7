//! Input/output schemas and the API description document of a deployment.
//!
//! Everything here is derived once from a workflow snapshot at deploy time
//! and regenerated on redeploy.

use creditflow_types::workflow::{FieldType, NodeKind, Workflow};
use serde_json::{Map, Value, json};

/// JSON Schema for invocation input, built from the start node's form fields.
///
/// A workflow that declares no fields accepts any object.
pub fn input_schema(workflow: &Workflow) -> Value {
    let fields: Vec<_> = workflow
        .nodes
        .iter()
        .filter_map(|n| match &n.kind {
            NodeKind::Start(config) => Some(config.form_fields.iter()),
            _ => None,
        })
        .flatten()
        .collect();

    if fields.is_empty() {
        return json!({
            "type": "object",
            "properties": {},
            "additionalProperties": true,
        });
    }

    let mut properties = Map::new();
    let mut required = Vec::new();
    for field in fields {
        properties.insert(
            field.name.clone(),
            property(field.field_type, &field.description),
        );
        if field.required {
            required.push(Value::String(field.name.clone()));
        }
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// JSON Schema of an invocation result, including end-node output fields.
pub fn output_schema(workflow: &Workflow) -> Value {
    let mut outputs = Map::new();
    for node in &workflow.nodes {
        if let NodeKind::End(config) = &node.kind {
            for field in &config.output_fields {
                outputs.insert(
                    field.name.clone(),
                    property(field.field_type, &field.description),
                );
            }
        }
    }

    json!({
        "type": "object",
        "properties": {
            "application_id": { "type": "string", "format": "uuid" },
            "status": {
                "type": "string",
                "enum": ["completed", "rejected", "error"],
            },
            "score": { "type": "number" },
            "result": {
                "type": "object",
                "properties": {
                    "outcome": { "type": "string", "enum": ["approved", "rejected"] },
                    "end_node": { "type": "string" },
                    "outputs": { "type": "object", "properties": outputs },
                },
            },
        },
    })
}

/// OpenAPI 3.0.0 description of a published workflow endpoint.
pub fn api_document(
    workflow: &Workflow,
    api_name: &str,
    api_path: &str,
    input_schema: &Value,
    output_schema: &Value,
) -> Value {
    let description = if workflow.description.trim().is_empty() {
        "Auto-generated API from workflow".to_string()
    } else {
        workflow.description.clone()
    };
    let error_response = |description: &str| {
        json!({
            "description": description,
            "content": {
                "application/json": {
                    "schema": {
                        "type": "object",
                        "properties": { "error": { "type": "string" } },
                    },
                },
            },
        })
    };

    json!({
        "openapi": "3.0.0",
        "info": {
            "title": format!("{} API", workflow.name),
            "description": description,
            "version": workflow.version,
        },
        "paths": {
            api_path: {
                "post": {
                    "summary": format!("Execute {}", workflow.name),
                    "description": format!(
                        "Execute the {} workflow with provided input data",
                        workflow.name
                    ),
                    "operationId": format!("execute_{}", api_name.replace('-', "_")),
                    "tags": ["Workflow Execution"],
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": input_schema,
                                "example": example(input_schema),
                            },
                        },
                    },
                    "responses": {
                        "200": {
                            "description": "Workflow executed",
                            "content": {
                                "application/json": {
                                    "schema": output_schema,
                                },
                            },
                        },
                        "400": error_response("Invalid input"),
                        "500": error_response("Execution failed"),
                    },
                },
                "get": {
                    "summary": format!("Get {} API information", workflow.name),
                    "operationId": format!("info_{}", api_name.replace('-', "_")),
                    "tags": ["Workflow Execution"],
                    "responses": {
                        "200": {
                            "description": "API document",
                        },
                    },
                },
            },
        },
    })
}

/// Check `input` against a stored input schema.
///
/// Returns every problem found; an empty vector means the input is valid.
/// Null counts as missing for required fields and is otherwise accepted.
pub fn validate_input(schema: &Value, input: &Map<String, Value>) -> Vec<String> {
    let mut problems = Vec::new();

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if input.get(name).is_none_or(Value::is_null) {
                problems.push(format!("missing required field '{name}'"));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (name, property) in properties {
            let Some(value) = input.get(name).filter(|v| !v.is_null()) else {
                continue;
            };
            let Some(field_type) = property
                .get("type")
                .cloned()
                .and_then(|t| serde_json::from_value::<FieldType>(t).ok())
            else {
                continue;
            };
            if !field_type.accepts(value) {
                problems.push(format!(
                    "field '{name}' must be {}",
                    field_type.as_schema_type()
                ));
            }
        }
    }

    problems
}

fn property(field_type: FieldType, description: &str) -> Value {
    let mut property = Map::new();
    property.insert(
        "type".to_string(),
        Value::String(field_type.as_schema_type().to_string()),
    );
    if !description.is_empty() {
        property.insert(
            "description".to_string(),
            Value::String(description.to_string()),
        );
    }
    Value::Object(property)
}

/// Example request body: one placeholder per declared property.
fn example(schema: &Value) -> Value {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return json!({});
    };
    let example: Map<String, Value> = properties
        .iter()
        .map(|(name, property)| {
            let value = match property.get("type").and_then(Value::as_str) {
                Some("integer") => json!(100),
                Some("number") => json!(100.0),
                Some("boolean") => json!(true),
                Some("array") => json!([]),
                Some("object") => json!({}),
                _ => json!("example_value"),
            };
            (name.clone(), value)
        })
        .collect();
    Value::Object(example)
}
