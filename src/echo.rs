use crate::adapter::{Component, Handler, MetadataProvider};
use crate::document::Document;
use serde_json::json;

/// Identity process: returns its input unchanged.
///
/// Useful for smoke-testing routing and broker wiring before real processes
/// exist; the CLI's `dispatch` command binds every configured process name to it.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoProcess;

impl Handler for EchoProcess {
    fn handle(&self, input: Document) -> anyhow::Result<Document> {
        Ok(input)
    }
}

impl MetadataProvider for EchoProcess {
    fn metadata(&self) -> Document {
        json!({ "description": "Returns its input unchanged" })
    }
}

impl Component for EchoProcess {
    fn as_handler(&self) -> Option<&dyn Handler> {
        Some(self)
    }

    fn as_metadata_provider(&self) -> Option<&dyn MetadataProvider> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{DomainLogicAdapter, Process};
    use crate::registry::ProcessMetadata;
    use std::sync::Arc;

    #[test]
    fn test_echo_is_identity() {
        let input = json!({"a": [1, 2, {"b": null}]});
        assert_eq!(EchoProcess.handle(input.clone()).unwrap(), input);
    }

    #[test]
    fn test_echo_through_adapter() {
        let adapter =
            DomainLogicAdapter::new("echo", ProcessMetadata::default(), Arc::new(EchoProcess));
        assert_eq!(
            Process::handle(&adapter, json!({"x": 1})).unwrap(),
            json!({"x": 1})
        );
        assert_eq!(
            adapter.metadata()["description"],
            json!("Returns its input unchanged")
        );
    }
}
