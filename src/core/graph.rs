//! Execution ordering: Kahn topological sort with cycle detection.

use std::collections::{HashMap, VecDeque};

use crate::core::error::FlowError;
use crate::core::workflow::WorkflowDefinition;

/// Computes the node execution order for a workflow.
///
/// Builds an adjacency structure and in-degree count from the connections,
/// then repeatedly emits zero-in-degree nodes (seeded in declaration order so
/// ties are deterministic). If any node is left with non-zero in-degree the
/// workflow is cyclic; the whole build fails and no partial order is returned.
pub fn execution_order(workflow: &WorkflowDefinition) -> Result<Vec<String>, FlowError> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::with_capacity(workflow.nodes.len());
    let mut in_degree: HashMap<&str, usize> = HashMap::with_capacity(workflow.nodes.len());

    for node in &workflow.nodes {
        adjacency.insert(node.id.as_str(), Vec::new());
        in_degree.insert(node.id.as_str(), 0);
    }

    for connection in &workflow.connections {
        let source = connection.source_node_id.as_str();
        let target = connection.target_node_id.as_str();

        let successors = adjacency.get_mut(source).ok_or_else(|| {
            FlowError::InvalidWorkflow(format!(
                "connection '{}' names unknown source node '{}'",
                connection.id, source
            ))
        })?;
        successors.push(target);

        let degree = in_degree.get_mut(target).ok_or_else(|| {
            FlowError::InvalidWorkflow(format!(
                "connection '{}' names unknown target node '{}'",
                connection.id, target
            ))
        })?;
        *degree += 1;
    }

    let mut queue: VecDeque<&str> = workflow
        .nodes
        .iter()
        .map(|node| node.id.as_str())
        .filter(|id| in_degree[id] == 0)
        .collect();

    let mut order = Vec::with_capacity(workflow.nodes.len());
    while let Some(id) = queue.pop_front() {
        order.push(id.to_string());
        for successor in &adjacency[id] {
            let degree = in_degree
                .get_mut(successor)
                .expect("successor came from the node set");
            *degree -= 1;
            if *degree == 0 {
                queue.push_back(successor);
            }
        }
    }

    if order.len() != workflow.nodes.len() {
        let mut remaining: Vec<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree > 0)
            .map(|(id, _)| *id)
            .collect();
        remaining.sort_unstable();
        return Err(FlowError::CyclicWorkflow(remaining.join(", ")));
    }

    Ok(order)
}
