use super::capability::Component;
use crate::document::{self, Document};
use crate::registry::ProcessMetadata;
use serde_json::{Map, Value};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Message placed in the `error` field of every converted failure.
pub const EXECUTION_FAILURE: &str = "Failed to execute domain logic";

/// Uniform call contract shared by every registered process.
///
/// Both dispatchers talk to registered logic only through this trait.
pub trait Process: Send + Sync {
    /// Canonical operation name.
    fn name(&self) -> &str;

    /// Run the process. `Err` is an execution failure the caller must handle.
    fn handle(&self, input: Document) -> anyhow::Result<Document>;

    fn validate(&self, input: &Document) -> bool;

    fn metadata(&self) -> Document;
}

/// Which entry point `handle` resolved to at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleTarget {
    /// The component's generic `handle` capability.
    Handle,
    /// An operation-named entry point matching the canonical name.
    Operation,
    /// Neither exists; calls return an introspection document.
    Introspection,
}

impl HandleTarget {
    /// Resolution order: `handle` first, then the operation-named entry point.
    pub(crate) fn probe(component: &dyn Component, operation: &str) -> Self {
        if component.as_handler().is_some() {
            HandleTarget::Handle
        } else if component.operation(operation).is_some() {
            HandleTarget::Operation
        } else {
            HandleTarget::Introspection
        }
    }

    /// Invoke the resolved entry point. `Ok(None)` means there is nothing to call.
    pub(crate) fn invoke(
        self,
        component: &dyn Component,
        operation: &str,
        input: Document,
    ) -> anyhow::Result<Option<Document>> {
        match self {
            HandleTarget::Handle => {
                let handler = component
                    .as_handler()
                    .ok_or_else(|| anyhow::anyhow!("handle capability of '{operation}' is gone"))?;
                handler.handle(input).map(Some)
            }
            HandleTarget::Operation => {
                let handler = component.operation(operation).ok_or_else(|| {
                    anyhow::anyhow!("operation '{operation}' is no longer exposed")
                })?;
                handler.handle(input).map(Some)
            }
            HandleTarget::Introspection => Ok(None),
        }
    }
}

/// Baseline descriptor shared by both process kinds.
pub(crate) fn baseline_metadata(operation: &str, meta: &ProcessMetadata, adapter: bool) -> Map<String, Value> {
    let mut map = Map::with_capacity(4);
    map.insert("operationName".to_string(), Value::String(operation.to_string()));
    map.insert("version".to_string(), Value::String(meta.version().to_string()));
    map.insert(
        "description".to_string(),
        Value::String(meta.description().to_string()),
    );
    if adapter {
        map.insert("adapter".to_string(), Value::Bool(true));
    }
    map
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// Wraps an arbitrary [`Component`] in the canonical process contract.
///
/// Capabilities are probed once in [`DomainLogicAdapter::new`]. Afterwards:
///
/// - `handle` calls the cached entry point, normalizes its result, and turns
///   any error or panic into an error document. It never fails.
/// - `validate` delegates to the component's validator, or accepts everything.
/// - `metadata` returns the baseline descriptor with the component's own
///   metadata merged on top. **The component's values override the baseline's
///   on key collision.**
pub struct DomainLogicAdapter {
    operation: String,
    meta: ProcessMetadata,
    component: Arc<dyn Component>,
    target: HandleTarget,
    has_validator: bool,
    has_metadata: bool,
}

impl DomainLogicAdapter {
    /// Probe `component` and build the adapter.
    ///
    /// The canonical operation name is `meta.operation_name` if set, else
    /// `registered_name`.
    #[must_use]
    pub fn new(registered_name: &str, meta: ProcessMetadata, component: Arc<dyn Component>) -> Self {
        let operation = meta
            .operation_name
            .clone()
            .unwrap_or_else(|| registered_name.to_string());
        let target = HandleTarget::probe(component.as_ref(), &operation);
        let has_validator = component.as_validator().is_some();
        let has_metadata = component.as_metadata_provider().is_some();

        debug!(
            operation = %operation,
            target = ?target,
            has_validator,
            has_metadata,
            "Domain logic capabilities probed"
        );

        Self {
            operation,
            meta,
            component,
            target,
            has_validator,
            has_metadata,
        }
    }

    /// Entry point chosen for `handle`.
    #[must_use]
    pub fn target(&self) -> HandleTarget {
        self.target
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.operation
    }

    /// The wrapped component.
    #[must_use]
    pub fn component(&self) -> &Arc<dyn Component> {
        &self.component
    }

    /// Run the wrapped logic. Never fails: errors come back as data.
    #[must_use]
    pub fn handle(&self, input: Document) -> Document {
        let start = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.target
                .invoke(self.component.as_ref(), &self.operation, input)
        }));

        match outcome {
            Ok(Ok(Some(value))) => {
                info!(
                    operation = %self.operation,
                    target = ?self.target,
                    elapsed_us = start.elapsed().as_micros() as u64,
                    "Domain logic executed"
                );
                document::normalize_result(value)
            }
            Ok(Ok(None)) => {
                debug!(operation = %self.operation, "No entry point, returning introspection");
                self.introspection()
            }
            Ok(Err(err)) => {
                error!(
                    operation = %self.operation,
                    error = %err,
                    "Domain logic failed"
                );
                self.failure(err.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(
                    operation = %self.operation,
                    panic_message = %message,
                    "Domain logic panicked"
                );
                self.failure(message)
            }
        }
    }

    /// Delegate to the component's validator; permissive when it has none.
    #[must_use]
    pub fn validate(&self, input: &Document) -> bool {
        if !self.has_validator {
            return true;
        }
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.component
                .as_validator()
                .map_or(true, |v| v.validate(input))
        }));
        outcome.unwrap_or_else(|panic| {
            warn!(
                operation = %self.operation,
                panic_message = %panic_message(panic.as_ref()),
                "Validator panicked, treating input as invalid"
            );
            false
        })
    }

    /// Baseline descriptor merged with the component's metadata (component wins).
    #[must_use]
    pub fn metadata(&self) -> Document {
        let baseline = baseline_metadata(&self.operation, &self.meta, true);
        if !self.has_metadata {
            return Value::Object(baseline);
        }
        let extra = catch_unwind(AssertUnwindSafe(|| {
            self.component
                .as_metadata_provider()
                .map(|p| p.metadata())
        }));
        match extra {
            Ok(Some(extra)) => document::merge_shallow(baseline, extra),
            Ok(None) => Value::Object(baseline),
            Err(panic) => {
                warn!(
                    operation = %self.operation,
                    panic_message = %panic_message(panic.as_ref()),
                    "Metadata provider panicked, using baseline"
                );
                Value::Object(baseline)
            }
        }
    }

    fn introspection(&self) -> Document {
        let mut doc = baseline_metadata(&self.operation, &self.meta, true);
        doc.insert(
            "message".to_string(),
            Value::String("no handle or operation entry point exposed".to_string()),
        );
        Value::Object(doc)
    }

    fn failure(&self, message: String) -> Document {
        serde_json::json!({
            "error": EXECUTION_FAILURE,
            "operation": self.operation,
            "message": message,
        })
    }
}

impl Process for DomainLogicAdapter {
    fn name(&self) -> &str {
        DomainLogicAdapter::name(self)
    }

    fn handle(&self, input: Document) -> anyhow::Result<Document> {
        Ok(DomainLogicAdapter::handle(self, input))
    }

    fn validate(&self, input: &Document) -> bool {
        DomainLogicAdapter::validate(self, input)
    }

    fn metadata(&self) -> Document {
        DomainLogicAdapter::metadata(self)
    }
}

impl std::fmt::Debug for DomainLogicAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainLogicAdapter")
            .field("operation", &self.operation)
            .field("target", &self.target)
            .field("has_validator", &self.has_validator)
            .field("has_metadata", &self.has_metadata)
            .finish_non_exhaustive()
    }
}
