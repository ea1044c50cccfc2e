//! Normalization shim for legacy loose-typed document shapes.
//!
//! Older documents write validation rules as bare strings (`"required"`),
//! secrets as `"env:API_KEY"` strings, and input/output declarations as
//! plain names. This pass rewrites those shapes into the canonical tagged
//! maps before deserialization, so the typed model never has to know the
//! loose forms existed.

use serde_json::{json, Value};

use crate::errors::ParseError;

/// Rewrites loose shapes inside a `pipeline` value into canonical forms.
///
/// Canonical documents pass through unchanged.
pub fn normalize_pipeline(pipeline: &mut Value) -> Result<(), ParseError> {
    let Some(nodes) = pipeline.get_mut("nodes").and_then(Value::as_array_mut) else {
        return Ok(());
    };

    for node in nodes {
        let node_id = node
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or("<unnamed>")
            .to_string();

        for io_field in ["inputs", "outputs"] {
            if let Some(decls) = node.get_mut(io_field).and_then(Value::as_array_mut) {
                for decl in decls.iter_mut() {
                    normalize_io_declaration(decl, &node_id, io_field)?;
                }
            }
        }

        if let Some(secrets) = node.get_mut("secrets").and_then(Value::as_array_mut) {
            for secret in secrets.iter_mut() {
                normalize_secret(secret, &node_id)?;
            }
        }

        for component_field in ["executor", "subgraph"] {
            if let Some(component) = node.get_mut(component_field) {
                normalize_component_ref(component);
            }
        }
    }

    Ok(())
}

/// `"field"` becomes `{"name": "field"}`; rules inside are normalized.
fn normalize_io_declaration(
    decl: &mut Value,
    node_id: &str,
    io_field: &str,
) -> Result<(), ParseError> {
    if let Value::String(name) = decl {
        *decl = json!({ "name": name });
        return Ok(());
    }

    if let Some(rules) = decl.get_mut("rules").and_then(Value::as_array_mut) {
        for rule in rules.iter_mut() {
            normalize_rule(rule, node_id, io_field)?;
        }
    }
    Ok(())
}

/// `"required"` becomes `{"rule": "required"}`; legacy `type` keys are
/// renamed to `rule`.
fn normalize_rule(rule: &mut Value, node_id: &str, io_field: &str) -> Result<(), ParseError> {
    match rule {
        Value::String(name) => {
            let canonical = match name.as_str() {
                "required" | "non_empty" => name.clone(),
                other => {
                    return Err(ParseError::Normalize {
                        field: format!("nodes[{node_id}].{io_field}.rules"),
                        detail: format!(
                            "bare rule '{other}' is not one of: required, non_empty"
                        ),
                    })
                }
            };
            *rule = json!({ "rule": canonical });
            Ok(())
        }
        Value::Object(map) => {
            if !map.contains_key("rule") {
                if let Some(tag) = map.remove("type") {
                    map.insert("rule".to_string(), tag);
                } else {
                    return Err(ParseError::Normalize {
                        field: format!("nodes[{node_id}].{io_field}.rules"),
                        detail: "rule object has neither 'rule' nor legacy 'type' tag"
                            .to_string(),
                    });
                }
            }
            Ok(())
        }
        other => Err(ParseError::Normalize {
            field: format!("nodes[{node_id}].{io_field}.rules"),
            detail: format!("expected string or object, got {other}"),
        }),
    }
}

/// `"env:API_KEY"` and `"vault:path#key"` become tagged maps; legacy
/// `type` keys are renamed to `source`.
fn normalize_secret(secret: &mut Value, node_id: &str) -> Result<(), ParseError> {
    match secret {
        Value::String(spec) => {
            let canonical = if let Some(var) = spec.strip_prefix("env:") {
                json!({ "source": "env", "var": var })
            } else if let Some(rest) = spec.strip_prefix("vault:") {
                let (path, key) = rest.split_once('#').ok_or_else(|| ParseError::Normalize {
                    field: format!("nodes[{node_id}].secrets"),
                    detail: format!("vault secret '{spec}' needs the form vault:path#key"),
                })?;
                json!({ "source": "vault", "path": path, "key": key })
            } else {
                return Err(ParseError::Normalize {
                    field: format!("nodes[{node_id}].secrets"),
                    detail: format!("secret '{spec}' has no recognized prefix (env:, vault:)"),
                });
            };
            *secret = canonical;
            Ok(())
        }
        Value::Object(map) => {
            if !map.contains_key("source") {
                if let Some(tag) = map.remove("type") {
                    map.insert("source".to_string(), tag);
                } else {
                    return Err(ParseError::Normalize {
                        field: format!("nodes[{node_id}].secrets"),
                        detail: "secret object has neither 'source' nor legacy 'type' tag"
                            .to_string(),
                    });
                }
            }
            Ok(())
        }
        other => Err(ParseError::Normalize {
            field: format!("nodes[{node_id}].secrets"),
            detail: format!("expected string or object, got {other}"),
        }),
    }
}

/// `executor: "lambda"` becomes `{"name": "lambda"}`; `"lambda@1.2.0"`
/// splits into name and version.
fn normalize_component_ref(component: &mut Value) {
    if let Value::String(spec) = component {
        let canonical = match spec.split_once('@') {
            Some((name, version)) => json!({ "name": name, "version": version }),
            None => json!({ "name": spec }),
        };
        *component = canonical;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bare_rule_string() {
        let mut pipeline = json!({
            "nodes": [{
                "id": "a",
                "inputs": [{ "name": "x", "rules": ["required", "non_empty"] }]
            }]
        });
        normalize_pipeline(&mut pipeline).unwrap();

        assert_eq!(
            pipeline["nodes"][0]["inputs"][0]["rules"],
            json!([{ "rule": "required" }, { "rule": "non_empty" }])
        );
    }

    #[test]
    fn test_unknown_bare_rule_rejected() {
        let mut pipeline = json!({
            "nodes": [{ "id": "a", "inputs": [{ "name": "x", "rules": ["shiny"] }] }]
        });
        assert!(normalize_pipeline(&mut pipeline).is_err());
    }

    #[test]
    fn test_legacy_type_tag_renamed() {
        let mut pipeline = json!({
            "nodes": [{
                "id": "a",
                "inputs": [{ "name": "x", "rules": [{ "type": "pattern", "pattern": "^a" }] }]
            }]
        });
        normalize_pipeline(&mut pipeline).unwrap();

        assert_eq!(
            pipeline["nodes"][0]["inputs"][0]["rules"][0],
            json!({ "rule": "pattern", "pattern": "^a" })
        );
    }

    #[test]
    fn test_env_secret_shorthand() {
        let mut pipeline = json!({
            "nodes": [{ "id": "a", "secrets": ["env:API_KEY"] }]
        });
        normalize_pipeline(&mut pipeline).unwrap();

        assert_eq!(
            pipeline["nodes"][0]["secrets"][0],
            json!({ "source": "env", "var": "API_KEY" })
        );
    }

    #[test]
    fn test_vault_secret_shorthand() {
        let mut pipeline = json!({
            "nodes": [{ "id": "a", "secrets": ["vault:prod/db#password"] }]
        });
        normalize_pipeline(&mut pipeline).unwrap();

        assert_eq!(
            pipeline["nodes"][0]["secrets"][0],
            json!({ "source": "vault", "path": "prod/db", "key": "password" })
        );
    }

    #[test]
    fn test_vault_secret_without_key_rejected() {
        let mut pipeline = json!({
            "nodes": [{ "id": "a", "secrets": ["vault:prod/db"] }]
        });
        assert!(normalize_pipeline(&mut pipeline).is_err());
    }

    #[test]
    fn test_component_shorthand_with_version() {
        let mut pipeline = json!({
            "nodes": [{ "id": "a", "executor": "lambda@1.2.0", "subgraph": "standard" }]
        });
        normalize_pipeline(&mut pipeline).unwrap();

        assert_eq!(
            pipeline["nodes"][0]["executor"],
            json!({ "name": "lambda", "version": "1.2.0" })
        );
        assert_eq!(pipeline["nodes"][0]["subgraph"], json!({ "name": "standard" }));
    }

    #[test]
    fn test_bare_io_name() {
        let mut pipeline = json!({
            "nodes": [{ "id": "a", "outputs": ["result"] }]
        });
        normalize_pipeline(&mut pipeline).unwrap();

        assert_eq!(pipeline["nodes"][0]["outputs"][0], json!({ "name": "result" }));
    }

    #[test]
    fn test_canonical_document_untouched() {
        let canonical = json!({
            "nodes": [{
                "id": "a",
                "executor": { "name": "lambda", "version": "1.2.0" },
                "inputs": [{ "name": "x", "rules": [{ "rule": "required" }] }],
                "secrets": [{ "source": "env", "var": "KEY" }]
            }]
        });
        let mut normalized = canonical.clone();
        normalize_pipeline(&mut normalized).unwrap();
        assert_eq!(normalized, canonical);
    }
}
