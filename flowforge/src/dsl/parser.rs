//! Import and export of pipeline documents.
//!
//! The DSL has two equivalent serializations, JSON and YAML. Import accepts
//! either; JSON is tried first as a fast path (every JSON document is also
//! valid YAML). `export_document(import_document(text))` is semantically
//! lossless: re-importing the export yields an equal graph.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::model::PipelineGraph;
use super::normalize::normalize_pipeline;
use crate::errors::ParseError;

/// The two wire formats of the DSL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// JSON, pretty-printed on export.
    Json,
    /// YAML.
    Yaml,
}

/// The document root: a single `pipeline` object.
#[derive(Debug, Serialize, Deserialize)]
struct PipelineDocument {
    pipeline: Value,
}

/// Parses a JSON or YAML pipeline document into a graph.
pub fn import_document(text: &str) -> Result<PipelineGraph, ParseError> {
    let root: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(json_err) => serde_yaml::from_str(text).map_err(|yaml_err| {
            ParseError::Syntax(format!("json: {json_err}; yaml: {yaml_err}"))
        })?,
    };

    let Value::Object(mut map) = root else {
        return Err(ParseError::MissingPipeline);
    };
    let mut pipeline = map
        .remove("pipeline")
        .ok_or(ParseError::MissingPipeline)?;

    normalize_pipeline(&mut pipeline)?;

    serde_json::from_value(pipeline).map_err(|e| ParseError::Shape(e.to_string()))
}

/// Serializes a graph back into a pipeline document.
pub fn export_document(
    graph: &PipelineGraph,
    format: DocumentFormat,
) -> Result<String, ParseError> {
    let pipeline =
        serde_json::to_value(graph).map_err(|e| ParseError::Shape(e.to_string()))?;
    let document = PipelineDocument { pipeline };

    match format {
        DocumentFormat::Json => serde_json::to_string_pretty(&document)
            .map_err(|e| ParseError::Shape(e.to_string())),
        DocumentFormat::Yaml => {
            serde_yaml::to_string(&document).map_err(|e| ParseError::Shape(e.to_string()))
        }
    }
}
