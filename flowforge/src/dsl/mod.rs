//! The declarative pipeline DSL: model, parser, normalization shim,
//! structural validator, and edge condition expressions.

pub mod condition;
pub mod model;
pub mod normalize;
mod parser;
mod validator;

pub use condition::{CompareOp, Condition, ConditionParseError};
pub use model::{
    ComponentRef, ConfigMap, ExecutionMode, ExecutionSettings, IoDeclaration, PipelineEdge,
    PipelineGraph, PipelineNode, ResourceRequirements, SecretRef, ValidationRule,
};
pub use parser::{export_document, import_document, DocumentFormat};
pub use validator::validate;
