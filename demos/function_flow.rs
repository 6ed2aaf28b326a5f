//! A complete example showing how to register functions and orchestrate them
//! with Flowstone.
//!
//! This example demonstrates:
//! - Registering function descriptors with typed, constrained parameters
//! - Direct invocation with validation and coercion
//! - Opt-in result caching and async execution with a timeout
//! - Building a workflow DAG with input mapping and connections
//! - Nesting one workflow inside another as a module node

use flowstone::prelude::*;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;

// ============================================================================
// Step 1: Register Functions
// ============================================================================

fn register_math(engine: &FlowEngine) {
    engine.register_function(
        FunctionDescriptor::new("math.pow", |args| {
            let base = args[0].as_f64().ok_or("base must be a number")?;
            let exponent = args[1].as_f64().ok_or("exponent must be a number")?;
            Ok(json!(base.powf(exponent)))
        })
        .describe("Raises base to the given exponent")
        .input(ParameterSpec::required("base", ValueType::Float))
        .input(ParameterSpec::required("exponent", ValueType::Float))
        .output(ParameterSpec::new("result", ValueType::Float)),
    );

    engine.register_function(
        FunctionDescriptor::new("math.multiply", |args| {
            let a = args[0].as_f64().ok_or("a must be a number")?;
            let b = args[1].as_f64().ok_or("b must be a number")?;
            Ok(json!(a * b))
        })
        .describe("Multiplies two numbers")
        .input(ParameterSpec::required("a", ValueType::Float))
        .input(ParameterSpec::required("b", ValueType::Float))
        .output(ParameterSpec::new("result", ValueType::Float)),
    );

    engine.register_function(
        FunctionDescriptor::new("string.repeat", |args| {
            let text = args[0].as_str().ok_or("text must be a string")?;
            let times = args[1].as_i64().ok_or("times must be an integer")? as usize;
            Ok(json!(text.repeat(times)))
        })
        .describe("Repeats a string a bounded number of times")
        .input(
            ParameterSpec::required("text", ValueType::String)
                .with_constraint(Constraint::MinSize(1)),
        )
        .input(
            ParameterSpec::required("times", ValueType::Integer)
                .with_constraint(Constraint::Min(1.0))
                .with_constraint(Constraint::Max(10.0)),
        ),
    );

    engine.register_function(
        FunctionDescriptor::new("lookup.rate", |args| {
            // stands in for a remote lookup worth caching
            std::thread::sleep(Duration::from_millis(50));
            let currency = args[0].as_str().unwrap_or("");
            Ok(json!(currency.len() as f64 * 0.37))
        })
        .describe("A slow lookup with a cached result")
        .input(ParameterSpec::required("currency", ValueType::String))
        .cacheable(Duration::from_secs(60))
        .asynchronous(Duration::from_secs(2)),
    );
}

// ============================================================================
// Step 2: Build Workflows
// ============================================================================

/// x -> x^2, exposed as a reusable module.
fn square_workflow() -> WorkflowDefinition {
    WorkflowDefinition::new("geometry.square")
        .named("Square a number")
        .input(ParameterSpec::required("x", ValueType::Float))
        .output(ParameterSpec::new("squared", ValueType::Float))
        .node(
            WorkflowNode::function("sq", "math.pow")
                .map_input("base", json!("x"))
                .map_input("exponent", json!(2.0)),
        )
        .bind_output(OutputBinding::new("squared", "sq"))
}

/// radius -> pi * radius^2, reusing the square workflow as a nested module.
fn area_workflow() -> WorkflowDefinition {
    WorkflowDefinition::new("geometry.area")
        .named("Circle area")
        .input(ParameterSpec::required("radius", ValueType::Float))
        .output(ParameterSpec::new("area", ValueType::Float))
        .node(WorkflowNode::module("squared", "geometry.square").map_input("x", json!("radius")))
        .node(WorkflowNode::function("area", "math.multiply").map_input("a", json!(std::f64::consts::PI)))
        .connection(WorkflowConnection::new("c1", "squared", "squared", "area", "b"))
        .bind_output(OutputBinding::new("area", "area"))
}

// ============================================================================
// Main: Register and Execute
// ============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() {
    println!("=== Flowstone Function Flow Example ===\n");

    let engine = FlowEngine::new();
    register_math(&engine);
    println!("Registered {} functions", engine.functions().len());

    // --- Example 1: Direct invocation with coercion ---
    println!("\n--- Example 1: Direct invocation ---");
    // "2" and "10" arrive as strings and are coerced to floats
    let result = engine
        .execute_function(
            "math.pow",
            HashMap::from([
                ("base".to_string(), json!("2")),
                ("exponent".to_string(), json!("10")),
            ]),
        )
        .unwrap();
    println!("math.pow(\"2\", \"10\") = {}", result);

    // --- Example 2: Validation failures are aggregated ---
    println!("\n--- Example 2: Validation ---");
    let err = engine
        .execute_function(
            "string.repeat",
            HashMap::from([
                ("text".to_string(), json!("")),
                ("times".to_string(), json!(99)),
            ]),
        )
        .unwrap_err();
    println!("string.repeat rejected: {}", err);

    // --- Example 3: Cached async lookup ---
    println!("\n--- Example 3: Cached async lookup ---");
    let args = HashMap::from([("currency".to_string(), json!("EUR"))]);
    let first = engine
        .execute_function_async("lookup.rate", args.clone())
        .await
        .unwrap();
    let second = engine
        .execute_function_async("lookup.rate", args)
        .await
        .unwrap();
    println!("lookup.rate(EUR) = {} (cached repeat: {})", first, second);

    // --- Example 4: A nested workflow DAG ---
    println!("\n--- Example 4: Workflows ---");
    engine.register_workflow(square_workflow()).unwrap();
    engine.register_workflow(area_workflow()).unwrap();

    let outputs = engine
        .execute_workflow(
            "geometry.area",
            HashMap::from([("radius".to_string(), json!(2.0))]),
        )
        .unwrap();
    println!("Circle area for radius 2:");
    for (name, value) in &outputs {
        println!("  {}: {}", name, value);
    }

    engine.shutdown();
    println!("\n=== Flow completed successfully! ===");
}
