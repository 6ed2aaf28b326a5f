//! End-to-end tests driving the engine the way a caller would: register
//! functions and workflows, then execute them by id.

use flowstone::prelude::*;
use futures::future::join_all;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// An engine loaded with the math fixtures the workflow tests build on.
fn math_engine() -> (FlowEngine, Arc<AtomicUsize>) {
    let engine = FlowEngine::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    engine.register_function(
        FunctionDescriptor::new("math.pow", move |args| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(json!(
                args[0]
                    .as_f64()
                    .unwrap_or(0.0)
                    .powf(args[1].as_f64().unwrap_or(0.0))
            ))
        })
        .input(ParameterSpec::required("base", ValueType::Float))
        .input(ParameterSpec::required("exponent", ValueType::Float)),
    );

    let counter = Arc::clone(&calls);
    engine.register_function(
        FunctionDescriptor::new("math.multiply", move |args| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(json!(
                args[0].as_f64().unwrap_or(0.0) * args[1].as_f64().unwrap_or(0.0)
            ))
        })
        .input(ParameterSpec::required("a", ValueType::Float))
        .input(ParameterSpec::required("b", ValueType::Float)),
    );

    (engine, calls)
}

fn args(pairs: &[(&str, FlowValue)]) -> HashMap<String, FlowValue> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn test_area_workflow_from_wire_json() {
    let (engine, _) = math_engine();

    // the workflow arrives in its JSON wire shape, as a UI or store would send it
    let workflow: WorkflowDefinition = serde_json::from_value(json!({
        "id": "geometry.area",
        "name": "Circle area",
        "nodes": [
            {
                "id": "square",
                "kind": "function",
                "target": "math.pow",
                "inputMapping": { "base": "radius", "exponent": 2.0 }
            },
            {
                "id": "area",
                "kind": "function",
                "target": "math.multiply",
                "inputMapping": { "a": 3.14159 }
            }
        ],
        "connections": [
            {
                "id": "c1",
                "sourceNodeId": "square",
                "sourcePort": "result",
                "targetNodeId": "area",
                "targetPort": "b"
            }
        ],
        "inputs": [ { "name": "radius", "type": "float", "required": true } ],
        "outputs": [ { "name": "area", "type": "float" } ],
        "outputBindings": [ { "name": "area", "nodeId": "area" } ]
    }))
    .expect("wire shape should parse");

    engine.register_workflow(workflow).unwrap();
    let outputs = engine
        .execute_workflow("geometry.area", args(&[("radius", json!(2))]))
        .unwrap();

    let area = outputs["area"].as_f64().unwrap();
    assert!((area - 12.566).abs() < 1e-3);
}

#[test]
fn test_cyclic_workflow_rejected_and_nothing_executes() {
    let (engine, calls) = math_engine();
    let cyclic = WorkflowDefinition::new("cyclic")
        .node(WorkflowNode::function("a", "math.multiply"))
        .node(WorkflowNode::function("b", "math.multiply"))
        .connection(WorkflowConnection::new("e1", "a", "result", "b", "a"))
        .connection(WorkflowConnection::new("e2", "b", "result", "a", "a"));
    engine.register_workflow(cyclic).unwrap();

    let err = engine.execute_workflow("cyclic", HashMap::new()).unwrap_err();
    assert!(matches!(err, FlowError::CyclicWorkflow(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_nested_module_workflow_end_to_end() {
    let (engine, _) = math_engine();

    let inner = WorkflowDefinition::new("inner.square")
        .input(ParameterSpec::required("x", ValueType::Float))
        .output(ParameterSpec::new("squared", ValueType::Float))
        .node(
            WorkflowNode::function("sq", "math.pow")
                .map_input("base", json!("x"))
                .map_input("exponent", json!(2.0)),
        )
        .bind_output(OutputBinding::new("squared", "sq"));
    engine.register_workflow(inner).unwrap();

    // scale the nested result: nested output object -> port "squared" -> multiply
    let outer = WorkflowDefinition::new("outer.scaled")
        .input(ParameterSpec::required("x", ValueType::Float))
        .output(ParameterSpec::new("scaled", ValueType::Float))
        .node(WorkflowNode::module("nested", "inner.square").map_input("x", json!("x")))
        .node(WorkflowNode::function("scale", "math.multiply").map_input("a", json!(10.0)))
        .connection(WorkflowConnection::new("c1", "nested", "squared", "scale", "b"))
        .bind_output(OutputBinding::new("scaled", "scale"));
    engine.register_workflow(outer).unwrap();

    let outputs = engine
        .execute_workflow("outer.scaled", args(&[("x", json!(3))]))
        .unwrap();
    assert_eq!(outputs["scaled"], json!(90.0));
}

#[test]
fn test_validation_failure_surfaces_before_any_invocation() {
    let (engine, calls) = math_engine();
    let err = engine
        .execute_function("math.pow", args(&[("base", json!(2))]))
        .unwrap_err();
    match err {
        FlowError::ConstraintViolation(violations) => {
            assert_eq!(
                violations,
                vec![Violation::MissingRequired {
                    parameter: "exponent".to_string()
                }]
            );
        }
        other => panic!("expected ConstraintViolation, got {:?}", other),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_cacheable_function_invokes_once_then_expires() {
    let engine = FlowEngine::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    engine.register_function(
        FunctionDescriptor::new("lookup.rate", move |args| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(json!(args[0].as_str().unwrap_or("").len() as f64 * 1.5))
        })
        .input(ParameterSpec::required("currency", ValueType::String))
        .cacheable(Duration::from_millis(100)),
    );

    let call = || {
        engine
            .execute_function("lookup.rate", args(&[("currency", json!("EUR"))]))
            .unwrap()
    };

    let first = call();
    let second = call();
    assert_eq!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    std::thread::sleep(Duration::from_millis(150));
    call();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_async_execution_respects_the_async_flag() {
    let (engine, calls) = math_engine();
    // math.pow is not marked async
    let err = engine
        .execute_function_async("math.pow", args(&[("base", json!(2)), ("exponent", json!(3))]))
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::UnsupportedAsync(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_async_fan_out_through_the_bounded_pool() {
    let engine = FlowEngine::with_config(EngineConfig { worker_limit: 2 });
    engine.register_function(
        FunctionDescriptor::new("work.slow_double", |args| {
            std::thread::sleep(Duration::from_millis(20));
            Ok(json!(args[0].as_f64().unwrap_or(0.0) * 2.0))
        })
        .input(ParameterSpec::required("n", ValueType::Float))
        .asynchronous(Duration::from_secs(5)),
    );

    let futures: Vec<_> = (0..6)
        .map(|n| {
            let engine = engine.clone();
            async move {
                engine
                    .execute_function_async("work.slow_double", args(&[("n", json!(n))]))
                    .await
            }
        })
        .collect();

    let results = join_all(futures).await;
    for (n, result) in results.into_iter().enumerate() {
        assert_eq!(result.unwrap(), json!(n as f64 * 2.0));
    }
}

#[tokio::test]
async fn test_async_timeout_on_a_stuck_callable() {
    let engine = FlowEngine::new();
    engine.register_function(
        FunctionDescriptor::new("work.stuck", |_| {
            std::thread::sleep(Duration::from_millis(500));
            Ok(json!("too late"))
        })
        .asynchronous(Duration::from_millis(40)),
    );

    let err = engine
        .execute_function_async("work.stuck", HashMap::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Timeout { .. }));
}

#[tokio::test]
async fn test_execute_workflow_async_relocates_the_run() {
    let (engine, _) = math_engine();
    let workflow = WorkflowDefinition::new("async.area")
        .input(ParameterSpec::required("radius", ValueType::Float))
        .output(ParameterSpec::new("area", ValueType::Float))
        .node(
            WorkflowNode::function("square", "math.pow")
                .map_input("base", json!("radius"))
                .map_input("exponent", json!(2.0)),
        )
        .node(WorkflowNode::function("area", "math.multiply").map_input("a", json!(3.14159)))
        .connection(WorkflowConnection::new("c1", "square", "result", "area", "b"))
        .bind_output(OutputBinding::new("area", "area"));
    engine.register_workflow(workflow).unwrap();

    let outputs = engine
        .execute_workflow_async("async.area", args(&[("radius", json!(2))]))
        .await
        .unwrap();
    assert!((outputs["area"].as_f64().unwrap() - 12.566).abs() < 1e-3);
}

#[test]
fn test_composite_arguments_reach_the_callable_constructed() {
    let engine = FlowEngine::new();
    let address = CompositeSchema::new("Address")
        .field("street", ValueType::String)
        .field_with_default("country", ValueType::String, json!("US"));

    engine.register_function(
        FunctionDescriptor::new("person.describe", |args| {
            let person = args[0].as_object().ok_or("expected an object")?;
            let name = person["name"].as_str().unwrap_or("unknown");
            let country = person["address"]["country"].as_str().unwrap_or("unknown");
            Ok(json!(format!("{} ({})", name, country)))
        })
        .input(ParameterSpec::required(
            "person",
            ValueType::Composite(
                CompositeSchema::new("Person")
                    .field("name", ValueType::String)
                    .field("age", ValueType::Integer)
                    .field("address", ValueType::Composite(address)),
            ),
        )),
    );

    let result = engine
        .execute_function(
            "person.describe",
            args(&[(
                "person",
                json!({ "name": "Ada", "address": { "street": "1 Main St" }, "extra": true }),
            )]),
        )
        .unwrap();
    assert_eq!(result, json!("Ada (US)"));
}

#[test]
fn test_descriptor_constraints_are_aggregated_across_parameters() {
    let engine = FlowEngine::new();
    engine.register_function(
        FunctionDescriptor::new("user.create", |args| Ok(args[0].clone()))
            .input(
                ParameterSpec::required("email", ValueType::String)
                    .with_constraint(Constraint::Email),
            )
            .input(
                ParameterSpec::required("age", ValueType::Integer)
                    .with_constraint(Constraint::Min(0.0))
                    .with_constraint(Constraint::Max(150.0)),
            ),
    );

    let err = engine
        .execute_function(
            "user.create",
            args(&[("email", json!("nope")), ("age", json!(-3))]),
        )
        .unwrap_err();
    match err {
        FlowError::ConstraintViolation(violations) => assert_eq!(violations.len(), 2),
        other => panic!("expected ConstraintViolation, got {:?}", other),
    }
}

#[test]
fn test_registry_snapshot_and_replacement() {
    let (engine, _) = math_engine();
    assert_eq!(engine.functions().len(), 2);

    let replaced = engine.register_function(
        FunctionDescriptor::new("math.pow", |_| Ok(json!(0.0)))
            .input(ParameterSpec::required("base", ValueType::Float))
            .input(ParameterSpec::required("exponent", ValueType::Float)),
    );
    assert_eq!(engine.functions().len(), 2);
    let found = engine.lookup_function("math.pow").unwrap();
    assert!(Arc::ptr_eq(&replaced, &found));
}
