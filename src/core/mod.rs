pub mod cache;
pub mod coerce;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod graph;
pub mod invoker;
pub mod registry;
pub mod scheduler;
pub mod workflow;

/// The Alias for serde_json::Value since it is the single data currency.
pub type FlowValue = serde_json::Value;
