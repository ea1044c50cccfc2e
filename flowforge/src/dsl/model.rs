//! Declarative pipeline model.
//!
//! These types are the canonical, fully-typed form of the DSL document.
//! Loose legacy shapes (bare-string rules, `env:VAR` secrets) are converted
//! into the tagged variants here by [`crate::dsl::normalize`] at the parse
//! boundary; nothing past the parser ever sees an untyped shape.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::runtime::retry::RetryPolicy;
use crate::version::{SemanticVersion, VersionConstraint};

/// A free-form JSON configuration map.
pub type ConfigMap = serde_json::Map<String, serde_json::Value>;

/// How the engine schedules ready nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One frontier member at a time, ascending node id.
    Sequential,
    /// All frontier members concurrently, bounded by the concurrency limit.
    #[default]
    Parallel,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Parallel => write!(f, "parallel"),
        }
    }
}

/// Pipeline-level execution configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSettings {
    /// Scheduling mode.
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Maximum concurrently running nodes in parallel mode.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Whether successors of a failed node still run.
    #[serde(default)]
    pub continue_on_error: bool,
}

fn default_concurrency() -> usize {
    4
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            concurrency: default_concurrency(),
            continue_on_error: false,
        }
    }
}

/// A reference to a versioned component (subgraph template or executor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRef {
    /// The registered component name.
    pub name: String,
    /// The version constraint to resolve against the registry.
    #[serde(default)]
    pub version: VersionConstraint,
}

impl ComponentRef {
    /// Creates a reference with the default (latest-compatible) constraint.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: VersionConstraint::default(),
        }
    }

    /// Sets the version constraint.
    #[must_use]
    pub fn with_version(mut self, version: VersionConstraint) -> Self {
        self.version = version;
        self
    }
}

/// The default lifecycle template when a node declares none.
fn default_subgraph() -> ComponentRef {
    ComponentRef::new("standard")
}

/// A declared validation rule, one variant per rule kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ValidationRule {
    /// The value must be present.
    Required,
    /// The value, when present, must be a non-empty string, array, or object.
    NonEmpty,
    /// The value must be a string matching the regex.
    Pattern {
        /// The regex the value must match.
        pattern: String,
    },
    /// The value must be a number within the (optional) bounds, inclusive.
    Range {
        /// Inclusive lower bound.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        /// Inclusive upper bound.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    /// The value must equal one of the listed values.
    OneOf {
        /// The accepted values.
        values: Vec<serde_json::Value>,
    },
}

/// A secret reference, one variant per source kind.
///
/// Secret values are resolved immediately before executor invocation and
/// are never written to records, checkpoints, or events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum SecretRef {
    /// Read from a process environment variable.
    Env {
        /// The environment variable name.
        var: String,
    },
    /// Read from a vault path.
    Vault {
        /// The vault path.
        path: String,
        /// The key within the path.
        key: String,
    },
    /// A literal value, for tests and local runs only.
    Inline {
        /// The literal secret value.
        value: String,
    },
}

impl SecretRef {
    /// The name a resolved secret is exposed under to the executor.
    #[must_use]
    pub fn binding_name(&self) -> String {
        match self {
            Self::Env { var } => var.clone(),
            Self::Vault { path, key } => format!("{path}#{key}"),
            Self::Inline { .. } => "inline".to_string(),
        }
    }
}

/// A declared input or output of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IoDeclaration {
    /// The field name in the node's input/output map.
    pub name: String,
    /// Optional JSON type schema (`{"type": "string"}` style).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
    /// Validation rules applied to the field.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<ValidationRule>,
}

impl IoDeclaration {
    /// Creates a declaration with no schema or rules.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            rules: Vec::new(),
        }
    }

    /// Sets the type schema.
    #[must_use]
    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Adds a validation rule.
    #[must_use]
    pub fn with_rule(mut self, rule: ValidationRule) -> Self {
        self.rules.push(rule);
        self
    }
}

/// Resource requirements forwarded to the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceRequirements {
    /// CPU allocation in millicores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_millis: Option<u64>,
    /// Memory allocation in megabytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u64>,
    /// Wall-clock timeout for one invocation, milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// A single declared pipeline processing step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineNode {
    /// Unique id within the graph.
    pub id: String,
    /// The node's type tag (e.g. "transform", "load").
    #[serde(rename = "type")]
    pub node_type: String,
    /// The platform adapter reference.
    pub executor: ComponentRef,
    /// The lifecycle template reference.
    #[serde(default = "default_subgraph")]
    pub subgraph: ComponentRef,
    /// Declared inputs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<IoDeclaration>,
    /// Declared outputs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<IoDeclaration>,
    /// Retry policy for executor failures.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Resource requirements.
    #[serde(default, skip_serializing_if = "ResourceRequirements::is_empty")]
    pub resources: ResourceRequirements,
    /// Secret references.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<SecretRef>,
    /// Free-form node configuration, overlaid on the pipeline defaults.
    #[serde(default, skip_serializing_if = "ConfigMap::is_empty")]
    pub config: ConfigMap,
}

impl ResourceRequirements {
    fn is_empty(&self) -> bool {
        self.cpu_millis.is_none() && self.memory_mb.is_none() && self.timeout_ms.is_none()
    }
}

impl PipelineNode {
    /// Creates a node with the given id, type, and executor.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        node_type: impl Into<String>,
        executor: ComponentRef,
    ) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            executor,
            subgraph: default_subgraph(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            retry: RetryPolicy::default(),
            resources: ResourceRequirements::default(),
            secrets: Vec::new(),
            config: ConfigMap::new(),
        }
    }

    /// Sets the subgraph reference.
    #[must_use]
    pub fn with_subgraph(mut self, subgraph: ComponentRef) -> Self {
        self.subgraph = subgraph;
        self
    }

    /// Adds an input declaration.
    #[must_use]
    pub fn with_input(mut self, input: IoDeclaration) -> Self {
        self.inputs.push(input);
        self
    }

    /// Adds an output declaration.
    #[must_use]
    pub fn with_output(mut self, output: IoDeclaration) -> Self {
        self.outputs.push(output);
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Adds a config entry.
    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    /// Adds a secret reference.
    #[must_use]
    pub fn with_secret(mut self, secret: SecretRef) -> Self {
        self.secrets.push(secret);
        self
    }
}

/// A directed dependency between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineEdge {
    /// The upstream node id.
    pub source: String,
    /// The downstream node id.
    pub target: String,
    /// Optional boolean expression over the source node's outputs; when it
    /// evaluates false the target is skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl PipelineEdge {
    /// Creates an unconditional edge.
    #[must_use]
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            condition: None,
        }
    }

    /// Sets the edge condition expression.
    #[must_use]
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }
}

fn default_version() -> SemanticVersion {
    SemanticVersion::new(0, 1, 0)
}

fn default_platform() -> String {
    "local".to_string()
}

/// The declarative pipeline graph, the root of the DSL document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineGraph {
    /// The pipeline id (the document's `name`).
    #[serde(rename = "name", alias = "id")]
    pub id: String,
    /// The declared pipeline version.
    #[serde(default = "default_version")]
    pub version: SemanticVersion,
    /// The target platform, the first component of the executor lookup key.
    #[serde(default = "default_platform")]
    pub platform: String,
    /// Pipeline-level config defaults, overridden field-by-field per node.
    #[serde(default, skip_serializing_if = "ConfigMap::is_empty")]
    pub defaults: ConfigMap,
    /// Execution configuration.
    #[serde(flatten)]
    pub settings: ExecutionSettings,
    /// Declared nodes, declaration order preserved. An empty list parses;
    /// the validator rejects it as `EmptyGraph`.
    #[serde(default)]
    pub nodes: Vec<PipelineNode>,
    /// Declared edges.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<PipelineEdge>,
}

impl PipelineGraph {
    /// Creates an empty graph with default settings.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: default_version(),
            platform: default_platform(),
            defaults: ConfigMap::new(),
            settings: ExecutionSettings::default(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Adds a node.
    #[must_use]
    pub fn with_node(mut self, node: PipelineNode) -> Self {
        self.nodes.push(node);
        self
    }

    /// Adds an edge.
    #[must_use]
    pub fn with_edge(mut self, edge: PipelineEdge) -> Self {
        self.edges.push(edge);
        self
    }

    /// Sets the execution settings.
    #[must_use]
    pub fn with_settings(mut self, settings: ExecutionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the target platform.
    #[must_use]
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    /// Sets a pipeline-level config default.
    #[must_use]
    pub fn with_default(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.defaults.insert(key.into(), value);
        self
    }

    /// Looks up a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&PipelineNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
