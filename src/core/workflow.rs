//! Workflow definitions: the JSON-shaped wire model for nodes, connections,
//! and output bindings.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::core::FlowValue;
use crate::core::descriptor::ParameterSpec;
use crate::core::error::FlowError;

/// One step in a workflow DAG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Invokes a registered function descriptor.
    Function,
    /// Recursively runs a nested workflow definition.
    Module,
}

/// Presentation data for UI layout; the engine ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// One node of a workflow: a function call or a nested workflow call.
///
/// `input_mapping` seeds the node's ports before connections are applied: a
/// string value naming a declared workflow input pulls that input, anything
/// else is taken as a literal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowNode {
    pub id: String,
    pub kind: NodeKind,
    /// A function descriptor id or a nested workflow id, depending on `kind`.
    pub target: String,
    #[serde(default)]
    pub input_mapping: HashMap<String, FlowValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl WorkflowNode {
    pub fn function(id: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Function, target)
    }

    pub fn module(id: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Module, target)
    }

    fn new(id: impl Into<String>, kind: NodeKind, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            target: target.into(),
            input_mapping: HashMap::new(),
            position: None,
        }
    }

    /// Maps a port from a workflow input name or a literal value.
    pub fn map_input(mut self, port: impl Into<String>, source: FlowValue) -> Self {
        self.input_mapping.insert(port.into(), source);
        self
    }
}

/// Explicit data edge between two nodes' ports, layered on top of
/// input-mapping. Connection-resolved values overwrite mapped values on the
/// same target port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowConnection {
    pub id: String,
    pub source_node_id: String,
    pub source_port: String,
    pub target_node_id: String,
    pub target_port: String,
}

impl WorkflowConnection {
    pub fn new(
        id: impl Into<String>,
        source_node_id: impl Into<String>,
        source_port: impl Into<String>,
        target_node_id: impl Into<String>,
        target_port: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source_node_id: source_node_id.into(),
            source_port: source_port.into(),
            target_node_id: target_node_id.into(),
            target_port: target_port.into(),
        }
    }
}

/// Binds a declared workflow output to the node (and optionally the port of
/// its object-shaped output) that produces it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputBinding {
    pub name: String,
    pub node_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
}

impl OutputBinding {
    pub fn new(name: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node_id: node_id.into(),
            port: None,
        }
    }

    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }
}

/// A complete workflow: nodes, connections, declared inputs and outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub nodes: Vec<WorkflowNode>,
    #[serde(default)]
    pub connections: Vec<WorkflowConnection>,
    #[serde(default)]
    pub inputs: Vec<ParameterSpec>,
    #[serde(default)]
    pub outputs: Vec<ParameterSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_bindings: Vec<OutputBinding>,
}

impl WorkflowDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            nodes: Vec::new(),
            connections: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            output_bindings: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn node(mut self, node: WorkflowNode) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn connection(mut self, connection: WorkflowConnection) -> Self {
        self.connections.push(connection);
        self
    }

    pub fn input(mut self, spec: ParameterSpec) -> Self {
        self.inputs.push(spec);
        self
    }

    pub fn output(mut self, spec: ParameterSpec) -> Self {
        self.outputs.push(spec);
        self
    }

    pub fn bind_output(mut self, binding: OutputBinding) -> Self {
        self.output_bindings.push(binding);
        self
    }

    /// Structural checks performed at registration, before any run: node ids
    /// must be unique within the workflow and output bindings must name known
    /// nodes. Connection endpoints are checked again by the graph builder.
    pub fn validate_structure(&self) -> Result<(), FlowError> {
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(FlowError::InvalidWorkflow(format!(
                    "duplicate node id '{}' in workflow '{}'",
                    node.id, self.id
                )));
            }
        }

        for binding in &self.output_bindings {
            if !seen.contains(binding.node_id.as_str()) {
                return Err(FlowError::InvalidWorkflow(format!(
                    "output binding '{}' names unknown node '{}'",
                    binding.name, binding.node_id
                )));
            }
        }

        Ok(())
    }

    /// Whether `name` is a declared workflow input.
    pub fn declares_input(&self, name: &str) -> bool {
        self.inputs.iter().any(|spec| spec.name == name)
    }
}
