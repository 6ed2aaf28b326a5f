//! Workflow scheduling: walks the topological order, resolves each node's
//! inputs from workflow inputs and upstream outputs, and assembles the
//! declared outputs.
//!
//! A run is synchronous and single-threaded: nodes execute strictly in the
//! computed order on the calling thread, so every node sees all of its
//! upstream outputs without further coordination. Independent branches are
//! not parallelized.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::core::FlowValue;
use crate::core::error::FlowError;
use crate::core::graph::execution_order;
use crate::core::invoker::Invoker;
use crate::core::registry::DescriptorStore;
use crate::core::workflow::{NodeKind, WorkflowDefinition, WorkflowNode};

/// Per-run state: an immutable snapshot of the workflow inputs and the
/// outputs produced so far, keyed by node id. Created at run start, discarded
/// after output assembly; never shared across runs or threads.
struct ExecutionContext {
    run_id: Uuid,
    inputs: HashMap<String, FlowValue>,
    node_outputs: HashMap<String, FlowValue>,
}

impl ExecutionContext {
    fn new(inputs: HashMap<String, FlowValue>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            inputs,
            node_outputs: HashMap::new(),
        }
    }

    fn input(&self, name: &str) -> Option<&FlowValue> {
        self.inputs.get(name)
    }

    fn node_output(&self, node_id: &str) -> Option<&FlowValue> {
        self.node_outputs.get(node_id)
    }

    fn set_node_output(&mut self, node_id: String, output: FlowValue) {
        self.node_outputs.insert(node_id, output);
    }
}

/// Registers workflow definitions and executes them through the invoker.
pub struct Scheduler {
    store: Arc<DescriptorStore>,
    invoker: Arc<Invoker>,
    workflows: DashMap<String, Arc<WorkflowDefinition>>,
}

impl Scheduler {
    pub fn new(store: Arc<DescriptorStore>, invoker: Arc<Invoker>) -> Self {
        Self {
            store,
            invoker,
            workflows: DashMap::new(),
        }
    }

    /// Validates structure and stores the definition; last write wins.
    pub fn register(&self, workflow: WorkflowDefinition) -> Result<(), FlowError> {
        workflow.validate_structure()?;
        let id = workflow.id.clone();
        if self.workflows.insert(id.clone(), Arc::new(workflow)).is_some() {
            log::warn!("Workflow '{}' was already registered, replacing it.", id);
        } else {
            log::info!("Registered workflow '{}'", id);
        }
        Ok(())
    }

    pub fn lookup(&self, id: &str) -> Option<Arc<WorkflowDefinition>> {
        self.workflows.get(id).map(|entry| Arc::clone(&entry))
    }

    /// Runs a registered workflow to completion on the calling thread.
    pub fn run(
        &self,
        workflow_id: &str,
        inputs: HashMap<String, FlowValue>,
    ) -> Result<HashMap<String, FlowValue>, FlowError> {
        let workflow = self
            .lookup(workflow_id)
            .ok_or_else(|| FlowError::WorkflowNotFound(workflow_id.to_string()))?;

        validate_workflow_inputs(&workflow, &inputs)?;
        let order = execution_order(&workflow)?;

        let mut context = ExecutionContext::new(inputs);
        log::info!("Workflow '{}' run {} started", workflow_id, context.run_id);

        let nodes: HashMap<&str, &WorkflowNode> = workflow
            .nodes
            .iter()
            .map(|node| (node.id.as_str(), node))
            .collect();

        for node_id in &order {
            let node = nodes
                .get(node_id.as_str())
                .expect("execution order only contains declared nodes");
            let node_inputs = resolve_node_inputs(node, &workflow, &context);
            let output = self.execute_node(node, node_inputs)?;
            log::debug!(
                "Node '{}' in run {} produced {}",
                node.id,
                context.run_id,
                output
            );
            context.set_node_output(node.id.clone(), output);
        }

        let outputs = assemble_outputs(&workflow, &order, &context);
        log::info!("Workflow '{}' run {} finished", workflow_id, context.run_id);
        Ok(outputs)
    }

    fn execute_node(
        &self,
        node: &WorkflowNode,
        inputs: HashMap<String, FlowValue>,
    ) -> Result<FlowValue, FlowError> {
        let result = match node.kind {
            NodeKind::Function => self
                .store
                .lookup(&node.target)
                .ok_or_else(|| FlowError::FunctionNotFound(node.target.clone()))
                .and_then(|descriptor| self.invoker.invoke_sync(&descriptor, &inputs)),
            // A nested workflow runs with the node's resolved inputs as its
            // own workflow inputs; its output map becomes one opaque value.
            NodeKind::Module => self
                .run(&node.target, inputs)
                .map(|outputs| FlowValue::Object(outputs.into_iter().collect())),
        };

        result.map_err(|source| FlowError::NodeExecution {
            node_id: node.id.clone(),
            target: node.target.clone(),
            source: Box::new(source),
        })
    }
}

fn validate_workflow_inputs(
    workflow: &WorkflowDefinition,
    inputs: &HashMap<String, FlowValue>,
) -> Result<(), FlowError> {
    for spec in &workflow.inputs {
        if spec.required && !inputs.contains_key(&spec.name) {
            return Err(FlowError::MissingRequiredParameter(spec.name.clone()));
        }
    }
    Ok(())
}

/// Resolves one node's input ports.
///
/// Input-mapping is applied first: a string naming a declared workflow input
/// pulls that input (ports whose input was not supplied stay unset), anything
/// else is a literal. Connections targeting the node are applied second and
/// overwrite the same port, so connection-resolved values take precedence.
fn resolve_node_inputs(
    node: &WorkflowNode,
    workflow: &WorkflowDefinition,
    context: &ExecutionContext,
) -> HashMap<String, FlowValue> {
    let mut inputs = HashMap::new();

    for (port, source) in &node.input_mapping {
        match source.as_str() {
            Some(name) if workflow.declares_input(name) => {
                if let Some(value) = context.input(name) {
                    inputs.insert(port.clone(), value.clone());
                }
            }
            _ => {
                inputs.insert(port.clone(), source.clone());
            }
        }
    }

    for connection in &workflow.connections {
        if connection.target_node_id != node.id {
            continue;
        }
        if let Some(output) = context.node_output(&connection.source_node_id) {
            inputs.insert(
                connection.target_port.clone(),
                select_port(output, &connection.source_port),
            );
        }
    }

    inputs
}

/// An object-shaped output with a matching key yields that key; everything
/// else flows whole.
fn select_port(output: &FlowValue, port: &str) -> FlowValue {
    match output.as_object().and_then(|map| map.get(port)) {
        Some(value) => value.clone(),
        None => output.clone(),
    }
}

/// Populates each declared output from its binding; declared outputs without
/// a binding fall back to the last executed node's output.
fn assemble_outputs(
    workflow: &WorkflowDefinition,
    order: &[String],
    context: &ExecutionContext,
) -> HashMap<String, FlowValue> {
    let mut outputs = HashMap::new();
    let last_output = order
        .last()
        .and_then(|node_id| context.node_output(node_id));

    for spec in &workflow.outputs {
        let binding = workflow
            .output_bindings
            .iter()
            .find(|binding| binding.name == spec.name);

        let value = match binding {
            Some(binding) => context.node_output(&binding.node_id).map(|output| {
                match &binding.port {
                    Some(port) => select_port(output, port),
                    None => output.clone(),
                }
            }),
            None => last_output.cloned(),
        };

        match value {
            Some(value) => {
                outputs.insert(spec.name.clone(), value);
            }
            None => log::warn!(
                "Declared output '{}' of workflow '{}' has no produced value.",
                spec.name,
                workflow.id
            ),
        }
    }

    outputs
}
