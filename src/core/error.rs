use std::fmt;

use thiserror::Error;

/// Boxed cause raised by a bound callable.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A single validation failure collected while checking an argument set.
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    /// A required parameter was absent from the argument set.
    MissingRequired { parameter: String },
    /// A present value failed one declared constraint.
    Constraint { parameter: String, message: String },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::MissingRequired { parameter } => {
                write!(f, "missing required parameter '{}'", parameter)
            }
            Violation::Constraint { parameter, message } => {
                write!(f, "parameter '{}': {}", parameter, message)
            }
        }
    }
}

/// Everything that can go wrong while registering, invoking, or orchestrating.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("function not found: {0}")]
    FunctionNotFound(String),

    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("missing required workflow input: {0}")]
    MissingRequiredParameter(String),

    /// Aggregate of every violation found in one argument set.
    #[error("argument validation failed: {}", format_violations(.0))]
    ConstraintViolation(Vec<Violation>),

    #[error("cannot coerce {value} to {target}")]
    TypeCoercion { value: String, target: String },

    #[error("workflow contains a cyclic dependency among nodes: {0}")]
    CyclicWorkflow(String),

    #[error("invalid workflow definition: {0}")]
    InvalidWorkflow(String),

    /// A workflow node failed; carries the failing node and its target.
    #[error("node '{node_id}' (target '{target}') failed")]
    NodeExecution {
        node_id: String,
        target: String,
        #[source]
        source: Box<FlowError>,
    },

    /// The bound callable itself raised an error.
    #[error("function '{id}' failed")]
    ExecutionFailed {
        id: String,
        #[source]
        source: BoxError,
    },

    #[error("invocation of '{id}' timed out after {timeout_millis} ms")]
    Timeout { id: String, timeout_millis: u64 },

    #[error("function does not support async execution: {0}")]
    UnsupportedAsync(String),

    #[error("engine is shut down")]
    Terminated,
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl FlowError {
    /// Convenience for callables that fail with a plain message.
    pub fn execution(id: impl Into<String>, message: impl Into<String>) -> Self {
        FlowError::ExecutionFailed {
            id: id.into(),
            source: message.into().into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_violation_lists_every_entry() {
        let err = FlowError::ConstraintViolation(vec![
            Violation::MissingRequired {
                parameter: "a".to_string(),
            },
            Violation::Constraint {
                parameter: "b".to_string(),
                message: "value is below the minimum of 1".to_string(),
            },
        ]);
        let rendered = err.to_string();
        assert!(rendered.contains("missing required parameter 'a'"));
        assert!(rendered.contains("parameter 'b'"));
    }

    #[test]
    fn test_node_execution_preserves_cause() {
        let err = FlowError::NodeExecution {
            node_id: "square".to_string(),
            target: "math.pow".to_string(),
            source: Box::new(FlowError::FunctionNotFound("math.pow".to_string())),
        };
        let source = std::error::Error::source(&err).expect("cause should be chained");
        assert!(source.to_string().contains("math.pow"));
    }
}
