//! # Flowstone
//!
//! A callable-unit registry, a validating/coercing invocation engine, and a
//! DAG workflow orchestrator that composes registered callables into
//! multi-step executions with explicit data wiring between steps.
//!
//! ## Features
//!
//! - **Explicit Registration**: No reflection or scanning; a discovery
//!   collaborator hands the engine already-bound descriptors
//! - **Validation & Coercion**: Aggregate constraint checking and recursive,
//!   schema-driven coercion of raw arguments into declared types
//! - **Sync & Async Invocation**: Bounded-pool async execution with
//!   per-descriptor timeouts and best-effort cancellation
//! - **TTL Caching**: Opt-in result caching per descriptor, keyed by a stable
//!   hash of the positional argument list
//! - **DAG Workflows**: Topologically-ordered execution with cycle rejection,
//!   port-level data wiring, and nested workflow composition
//!
//! ## Quick Start
//!
//! ```rust
//! use flowstone::prelude::*;
//! use serde_json::json;
//! use std::collections::HashMap;
//!
//! let engine = FlowEngine::new();
//!
//! engine.register_function(
//!     FunctionDescriptor::new("math.add", |args| {
//!         Ok(json!(args[0].as_f64().unwrap_or(0.0) + args[1].as_f64().unwrap_or(0.0)))
//!     })
//!     .input(ParameterSpec::required("a", ValueType::Float))
//!     .input(ParameterSpec::required("b", ValueType::Float)),
//! );
//!
//! let sum = engine
//!     .execute_function(
//!         "math.add",
//!         HashMap::from([("a".to_string(), json!(2)), ("b".to_string(), json!(3))]),
//!     )
//!     .unwrap();
//! assert_eq!(sum, json!(5.0));
//! ```
//!
//! ## Module Organization
//!
//! - [`core::descriptor`]: Descriptors, parameter specs, types, constraints
//! - [`core::registry`]: The descriptor store
//! - [`core::coerce`]: Validation and type coercion
//! - [`core::invoker`]: The layered invocation engine
//! - [`core::workflow`] / [`core::graph`] / [`core::scheduler`]: Workflow
//!   definitions, ordering, and execution
//! - [`core::engine`]: The [`FlowEngine`] facade
//! - [`prelude`]: Commonly used types (import with `use flowstone::prelude::*`)

// ============================================================================
// Core Module
// ============================================================================

pub mod core;

// ============================================================================
// Public Re-exports - Granular Imports
// ============================================================================

pub use core::FlowValue;
pub use core::cache::InvocationCache;
pub use core::coerce::{bind_positional, coerce, validate};
pub use core::descriptor::{
    BoundCallable, CallableResult, CompositeSchema, Constraint, FieldSpec, FunctionDescriptor,
    ParameterSpec, ValueType,
};
pub use core::engine::{EngineConfig, FlowEngine};
pub use core::error::{BoxError, FlowError, Violation};
pub use core::graph::execution_order;
pub use core::invoker::{CallLayer, Invoker};
pub use core::registry::DescriptorStore;
pub use core::workflow::{
    NodeKind, OutputBinding, Position, WorkflowConnection, WorkflowDefinition, WorkflowNode,
};

// ============================================================================
// Prelude Module - Convenient Bulk Imports
// ============================================================================

/// The main prelude: imports everything you need to register and run
/// functions and workflows.
///
/// # Example
/// ```rust
/// use flowstone::prelude::*;
/// ```
pub mod prelude {
    pub use super::{
        CompositeSchema,
        Constraint,
        EngineConfig,
        // Engine
        FlowEngine,
        FlowError,
        FlowValue,
        // Descriptors
        FunctionDescriptor,
        NodeKind,
        OutputBinding,
        ParameterSpec,
        ValueType,
        Violation,
        WorkflowConnection,
        // Workflows
        WorkflowDefinition,
        WorkflowNode,
    };
}

// ============================================================================
// Re-export commonly used external types for convenience
// ============================================================================

pub use serde_json::Value as JsonValue;
pub use std::collections::HashMap;

// ============================================================================
// Library Metadata
// ============================================================================

/// The version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of this crate.
pub const NAME: &str = env!("CARGO_PKG_NAME");
