//! Integration tests for capability-probing domain logic
//!
//! Components here look like real domain services: several operations on one
//! object, optional validation and self-description. They are registered the
//! way a bootstrap would register them and reached through the registry.

mod common;

use procdispatch::adapter::{
    Component, HandleTarget, Handler, MetadataProvider, Validator, EXECUTION_FAILURE,
};
use procdispatch::document::Document;
use procdispatch::registry::{ComponentRegistry, ProcessKind, ProcessMetadata};
use serde_json::json;
use std::sync::Arc;

/// Exposes `add` and `divide` as operation-named entry points, no `handle`.
struct Calculator {
    add: Add,
    divide: Divide,
}

struct Add;
struct Divide;

fn operands(input: &Document) -> anyhow::Result<(f64, f64)> {
    let a = input["a"]
        .as_f64()
        .ok_or_else(|| anyhow::anyhow!("missing operand 'a'"))?;
    let b = input["b"]
        .as_f64()
        .ok_or_else(|| anyhow::anyhow!("missing operand 'b'"))?;
    Ok((a, b))
}

impl Handler for Add {
    fn handle(&self, input: Document) -> anyhow::Result<Document> {
        let (a, b) = operands(&input)?;
        Ok(json!(a + b))
    }
}

impl Handler for Divide {
    fn handle(&self, input: Document) -> anyhow::Result<Document> {
        let (a, b) = operands(&input)?;
        if b == 0.0 {
            anyhow::bail!("division by zero");
        }
        Ok(json!(a / b))
    }
}

impl Validator for Calculator {
    fn validate(&self, input: &Document) -> bool {
        input.get("a").is_some() && input.get("b").is_some()
    }
}

impl MetadataProvider for Calculator {
    fn metadata(&self) -> Document {
        json!({ "version": "3.0.0", "operations": ["add", "divide"] })
    }
}

impl Component for Calculator {
    fn operation(&self, name: &str) -> Option<&dyn Handler> {
        match name {
            "add" => Some(&self.add),
            "divide" => Some(&self.divide),
            _ => None,
        }
    }

    fn as_validator(&self) -> Option<&dyn Validator> {
        Some(self)
    }

    fn as_metadata_provider(&self) -> Option<&dyn MetadataProvider> {
        Some(self)
    }
}

fn calculator() -> Arc<dyn Component> {
    Arc::new(Calculator {
        add: Add,
        divide: Divide,
    })
}

fn registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    for op in ["add", "divide", "modulo"] {
        registry
            .register(
                &format!("calc.{op}"),
                calculator(),
                ProcessKind::DomainLogic,
                Some(ProcessMetadata::default().with_operation_name(op)),
            )
            .unwrap();
    }
    registry
}

#[test]
fn test_one_component_serves_several_operations() {
    let registry = registry();

    let add = registry.resolve("calc.add").unwrap();
    assert_eq!(add.name(), "add");
    assert_eq!(
        add.handle(json!({"a": 2, "b": 3})).unwrap(),
        json!({"result": 5.0})
    );

    let divide = registry.resolve("calc.divide").unwrap();
    assert_eq!(
        divide.handle(json!({"a": 9, "b": 3})).unwrap(),
        json!({"result": 3.0})
    );
}

#[test]
fn test_domain_error_becomes_document() {
    let registry = registry();
    let divide = registry.resolve("calc.divide").unwrap();

    let out = divide.handle(json!({"a": 1, "b": 0})).unwrap();
    assert_eq!(
        out,
        json!({
            "error": EXECUTION_FAILURE,
            "operation": "divide",
            "message": "division by zero"
        })
    );

    let out = divide.handle(json!({"a": 1})).unwrap();
    assert_eq!(out["message"], json!("missing operand 'b'"));
}

#[test]
fn test_unknown_operation_answers_with_introspection() {
    let registry = registry();
    let modulo = registry.resolve("calc.modulo").unwrap();
    let out = modulo.handle(json!({"a": 1, "b": 2})).unwrap();
    assert_eq!(out["operationName"], json!("modulo"));
    assert_eq!(out["adapter"], json!(true));
    assert!(out.get("error").is_none());
}

#[test]
fn test_validation_is_data() {
    let registry = registry();
    let add = registry.resolve("calc.add").unwrap();
    assert!(add.validate(&json!({"a": 1, "b": 2})));
    assert!(!add.validate(&json!({"a": 1})));
}

#[test]
fn test_component_metadata_wins_on_collision() {
    let registry = registry();
    let meta = registry.resolve("calc.add").unwrap().metadata();
    assert_eq!(meta["version"], json!("3.0.0"));
    assert_eq!(meta["operationName"], json!("add"));
    assert_eq!(meta["description"], json!(""));
    assert_eq!(meta["adapter"], json!(true));
    assert_eq!(meta["operations"], json!(["add", "divide"]));
}

#[test]
fn test_business_registration_requires_entry_point() {
    let mut registry = ComponentRegistry::new();
    let err = registry
        .register(
            "calc.modulo",
            calculator(),
            ProcessKind::BusinessProcess,
            Some(ProcessMetadata::default().with_operation_name("modulo")),
        )
        .unwrap_err();
    assert!(err.to_string().contains("calc.modulo"));

    // Through the operation entry point it registers fine, and errors propagate.
    registry
        .register(
            "calc.divide",
            calculator(),
            ProcessKind::BusinessProcess,
            Some(ProcessMetadata::default().with_operation_name("divide")),
        )
        .unwrap();
    let divide = registry.resolve("calc.divide").unwrap();
    let err = divide.handle(json!({"a": 1, "b": 0})).unwrap_err();
    assert_eq!(err.to_string(), "division by zero");
}

#[test]
fn test_probe_is_reported() {
    use procdispatch::adapter::DomainLogicAdapter;
    let adapter = DomainLogicAdapter::new(
        "calc.add",
        ProcessMetadata::default().with_operation_name("add"),
        calculator(),
    );
    assert_eq!(adapter.target(), HandleTarget::Operation);
    let adapter = DomainLogicAdapter::new("calc.nothing", ProcessMetadata::default(), calculator());
    assert_eq!(adapter.target(), HandleTarget::Introspection);
}
