//! Workflow domain types for creditflow.
//!
//! A workflow is a directed graph of typed nodes connected by edges. The
//! JSON shape matches what the visual designer produces: nodes carry
//! `node_id`, `node_type`, `label`, `position` and a type-specific `config`
//! object; edges use `source`/`target` plus optional handles and conditions.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// A credit-decision workflow.
///
/// Mutable only while `status` is `Draft`. Activation freezes the current
/// version into an immutable snapshot that applications and deployments pin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Semantic version string (e.g. "1.0.0").
    pub version: String,
    pub status: WorkflowStatus,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Look up a node by id.
    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }

    /// All nodes of type `start`.
    pub fn start_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.node_type() == NodeType::Start)
    }

    /// Outgoing edges of a node, in declaration order.
    pub fn outgoing<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == node_id)
    }
}

/// Workflow lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    Draft,
    Active,
    Archived,
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowStatus::Draft => write!(f, "draft"),
            WorkflowStatus::Active => write!(f, "active"),
            WorkflowStatus::Archived => write!(f, "archived"),
        }
    }
}

impl FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(WorkflowStatus::Draft),
            "active" => Ok(WorkflowStatus::Active),
            "archived" => Ok(WorkflowStatus::Archived),
            other => Err(format!("invalid workflow status: '{other}'")),
        }
    }
}

/// Payload for creating a workflow. New workflows always start as drafts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorkflowRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

/// Partial update of a draft workflow. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateWorkflowRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<Node>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edges: Option<Vec<Edge>>,
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// A node in the workflow graph.
///
/// Serialized flat (`node_type` next to `config`); deserialization parses
/// `config` into the variant that matches `node_type`, so a node can never
/// carry a config of the wrong kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNode", into = "RawNode")]
pub struct Node {
    /// Unique within a workflow.
    pub node_id: String,
    pub label: String,
    /// Display-only canvas coordinates.
    pub position: Position,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(node_id: impl Into<String>, label: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            node_id: node_id.into(),
            label: label.into(),
            position: Position::default(),
            kind,
        }
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }
}

/// Canvas coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

/// The closed set of node types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Start,
    End,
    Decision,
    Score,
    Api,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeType::Start => "start",
            NodeType::End => "end",
            NodeType::Decision => "decision",
            NodeType::Score => "score",
            NodeType::Api => "api",
        };
        f.write_str(s)
    }
}

impl FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(NodeType::Start),
            "end" => Ok(NodeType::End),
            "decision" => Ok(NodeType::Decision),
            "score" => Ok(NodeType::Score),
            "api" => Ok(NodeType::Api),
            other => Err(format!("invalid node type: '{other}'")),
        }
    }
}

/// Type-specific node behavior and configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Start(StartConfig),
    End(EndConfig),
    Decision(DecisionConfig),
    Score(ScoreConfig),
    Api(ApiConfig),
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Start(_) => NodeType::Start,
            NodeKind::End(_) => NodeType::End,
            NodeKind::Decision(_) => NodeType::Decision,
            NodeKind::Score(_) => NodeType::Score,
            NodeKind::Api(_) => NodeType::Api,
        }
    }
}

/// Start node: declares the input fields an application must supply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartConfig {
    #[serde(default)]
    pub form_fields: Vec<FormField>,
}

/// A declared input field on the start node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

/// JSON type of a declared field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl FieldType {
    /// JSON Schema `type` keyword for this field.
    pub fn as_schema_type(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Object => "object",
            FieldType::Array => "array",
        }
    }

    /// Whether a JSON value conforms to this type.
    pub fn accepts(&self, value: &serde_json::Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            FieldType::Boolean => value.is_boolean(),
            FieldType::Object => value.is_object(),
            FieldType::Array => value.is_array(),
        }
    }
}

/// End node: the outcome decides the application's terminal status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndConfig {
    #[serde(default)]
    pub outcome: Outcome,
    #[serde(default)]
    pub output_fields: Vec<OutputField>,
}

/// Final decision carried by an end node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    #[default]
    Approved,
    Rejected,
}

/// A field an end node promises in the invocation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputField {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub description: String,
}

/// Decision node. Routing is driven by outgoing edge conditions; the optional
/// node-level condition selects edges whose `sourceHandle` is `true`/`false`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// Score node: runs a scorecard against the application data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreConfig {
    pub scorecard_id: Uuid,
    /// Characteristic name -> application field. Unmapped characteristics
    /// read the field with the same name.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub field_mapping: HashMap<String, String>,
}

/// API node: performs an outbound HTTP call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_method")]
    pub method: String,
    pub url: String,
    /// Request field -> application field.
    #[serde(default)]
    pub field_mapping: HashMap<String, String>,
    /// Key under `results` where the response body lands (defaults to node id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_key: Option<String>,
    /// What to do when the call fails. Required: there is no implicit default.
    pub on_failure: FailurePolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn default_api_method() -> String {
    "POST".to_string()
}

/// Per-node reaction to an outbound call failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Move the application into `error`.
    Halt,
    /// Log the failure and follow the node's default edge.
    Continue,
}

/// Wire shape of a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawNode {
    node_id: String,
    node_type: NodeType,
    #[serde(default)]
    label: String,
    #[serde(default)]
    position: Position,
    #[serde(default)]
    config: serde_json::Value,
}

impl TryFrom<RawNode> for Node {
    type Error = String;

    fn try_from(raw: RawNode) -> Result<Self, Self::Error> {
        let config = match raw.config {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            other => other,
        };
        let invalid = |e: serde_json::Error| {
            format!("invalid {} config for node '{}': {e}", raw.node_type, raw.node_id)
        };
        let kind = match raw.node_type {
            NodeType::Start => NodeKind::Start(serde_json::from_value(config).map_err(invalid)?),
            NodeType::End => NodeKind::End(serde_json::from_value(config).map_err(invalid)?),
            NodeType::Decision => {
                NodeKind::Decision(serde_json::from_value(config).map_err(invalid)?)
            }
            NodeType::Score => NodeKind::Score(serde_json::from_value(config).map_err(invalid)?),
            NodeType::Api => NodeKind::Api(serde_json::from_value(config).map_err(invalid)?),
        };
        Ok(Node {
            node_id: raw.node_id,
            label: raw.label,
            position: raw.position,
            kind,
        })
    }
}

impl From<Node> for RawNode {
    fn from(node: Node) -> Self {
        let node_type = node.node_type();
        let config = match &node.kind {
            NodeKind::Start(c) => serde_json::to_value(c),
            NodeKind::End(c) => serde_json::to_value(c),
            NodeKind::Decision(c) => serde_json::to_value(c),
            NodeKind::Score(c) => serde_json::to_value(c),
            NodeKind::Api(c) => serde_json::to_value(c),
        }
        .unwrap_or_default();
        RawNode {
            node_id: node.node_id,
            node_type,
            label: node.label,
            position: node.position,
            config,
        }
    }
}

// ---------------------------------------------------------------------------
// Edges
// ---------------------------------------------------------------------------

/// A directed edge between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "sourceHandle", default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(rename = "targetHandle", default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Expression deciding whether this edge is taken out of a decision node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl Edge {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
            label: None,
            condition: None,
        }
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_source_handle(mut self, handle: impl Into<String>) -> Self {
        self.source_handle = Some(handle.into());
        self
    }

    /// The trimmed condition, if one is set and non-empty.
    pub fn condition(&self) -> Option<&str> {
        self.condition
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// `Some(true/false)` when the source handle names a boolean branch.
    pub fn boolean_handle(&self) -> Option<bool> {
        match self.source_handle.as_deref().map(str::trim) {
            Some(h) if h.eq_ignore_ascii_case("true") || h.eq_ignore_ascii_case("yes") => {
                Some(true)
            }
            Some(h) if h.eq_ignore_ascii_case("false") || h.eq_ignore_ascii_case("no") => {
                Some(false)
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Structural findings produced by graph validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ValidationIssue {
    #[error("workflow has no start node")]
    MissingStartNode,

    #[error("workflow has {count} start nodes, expected exactly one")]
    DuplicateStartNode { count: usize },

    #[error("start node '{node_id}' has no outgoing edge")]
    StartWithoutOutgoing { node_id: String },

    #[error("workflow has no end node")]
    NoEndNode,

    #[error("node '{node_id}' is isolated (no incoming or outgoing edge)")]
    IsolatedNode { node_id: String },

    #[error("node '{node_id}' is not reachable from the start node")]
    UnreachableNode { node_id: String },

    #[error("node id '{node_id}' is used more than once")]
    DuplicateNodeId { node_id: String },

    #[error("edge '{edge_id}' references unknown node '{node_id}'")]
    DanglingEdge { edge_id: String, node_id: String },

    #[error("edge '{edge_id}' duplicates an existing {source_id} -> {target_id} edge")]
    DuplicateEdge {
        edge_id: String,
        source_id: String,
        target_id: String,
    },

    #[error("decision node '{node_id}' has {count} distinct outgoing edges, expected at least two")]
    DecisionTooFewBranches { node_id: String, count: usize },

    #[error("decision node '{node_id}' has {count} unconditioned outgoing edges, at most one default is allowed")]
    DecisionMultipleDefaults { node_id: String, count: usize },

    #[error("workflow contains a cycle through node '{node_id}'")]
    CyclicWorkflow { node_id: String },

    #[error("end node '{node_id}' has outgoing edges")]
    EndWithOutgoing { node_id: String },

    #[error("{node_type} node '{node_id}' has {count} outgoing edges; only the default one is followed")]
    MultipleOutgoing {
        node_id: String,
        node_type: NodeType,
        count: usize,
    },
}

/// Result of validating a workflow graph. Errors block activation and
/// execution; warnings do not.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Human-readable summary of all errors, joined by `; `.
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}
