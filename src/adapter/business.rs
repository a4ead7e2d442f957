use super::capability::Component;
use super::core::{baseline_metadata, HandleTarget, Process};
use crate::document::{self, Document};
use crate::registry::ProcessMetadata;
use serde_json::Value;
use std::sync::Arc;

/// A business process invoked directly through its component.
///
/// Unlike [`super::DomainLogicAdapter`], nothing is caught here: handler errors
/// and panics travel up to whoever called `handle`.
pub struct BusinessProcess {
    operation: String,
    meta: ProcessMetadata,
    component: Arc<dyn Component>,
    target: HandleTarget,
}

impl BusinessProcess {
    /// Returns `None` when the component has neither a `handle` nor an
    /// operation-named entry point.
    #[must_use]
    pub fn new(registered_name: &str, meta: ProcessMetadata, component: Arc<dyn Component>) -> Option<Self> {
        let operation = meta
            .operation_name
            .clone()
            .unwrap_or_else(|| registered_name.to_string());
        match HandleTarget::probe(component.as_ref(), &operation) {
            HandleTarget::Introspection => None,
            target => Some(Self {
                operation,
                meta,
                component,
                target,
            }),
        }
    }

    #[must_use]
    pub fn target(&self) -> HandleTarget {
        self.target
    }
}

impl Process for BusinessProcess {
    fn name(&self) -> &str {
        &self.operation
    }

    fn handle(&self, input: Document) -> anyhow::Result<Document> {
        let out = self
            .target
            .invoke(self.component.as_ref(), &self.operation, input)?;
        Ok(out.unwrap_or(Value::Null))
    }

    fn validate(&self, input: &Document) -> bool {
        self.component
            .as_validator()
            .map_or(true, |v| v.validate(input))
    }

    fn metadata(&self) -> Document {
        let baseline = baseline_metadata(&self.operation, &self.meta, false);
        match self.component.as_metadata_provider() {
            Some(provider) => document::merge_shallow(baseline, provider.metadata()),
            None => Value::Object(baseline),
        }
    }
}

impl std::fmt::Debug for BusinessProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusinessProcess")
            .field("operation", &self.operation)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}
