use crate::document::Document;

/// Capability: accept an input document and produce an output document.
///
/// Errors returned here are execution failures. Whether they propagate or are
/// turned into data depends on how the owning process was registered.
pub trait Handler: Send + Sync {
    fn handle(&self, input: Document) -> anyhow::Result<Document>;
}

/// Capability: decide whether an input is acceptable.
///
/// A `false` answer is ordinary data for the caller to act on.
pub trait Validator: Send + Sync {
    fn validate(&self, input: &Document) -> bool;
}

/// Capability: describe the component.
///
/// The returned document is merged over the baseline descriptor, so keys
/// returned here replace the baseline's.
pub trait MetadataProvider: Send + Sync {
    fn metadata(&self) -> Document;
}

/// A registrable unit of request-handling logic.
///
/// Every capability is optional. The adapter probes them once, when the
/// component is registered, and caches which ones were present.
///
/// ```rust
/// use procdispatch::adapter::{Component, Handler};
/// use procdispatch::document::Document;
///
/// struct Greeter;
///
/// impl Handler for Greeter {
///     fn handle(&self, input: Document) -> anyhow::Result<Document> {
///         Ok(serde_json::json!({ "hello": input["name"] }))
///     }
/// }
///
/// impl Component for Greeter {
///     fn as_handler(&self) -> Option<&dyn Handler> {
///         Some(self)
///     }
/// }
/// ```
pub trait Component: Send + Sync + 'static {
    /// The generic `handle` entry point, if the component has one.
    fn as_handler(&self) -> Option<&dyn Handler> {
        None
    }

    /// An entry point named after an operation.
    ///
    /// Consulted with the process's canonical operation name when
    /// [`Component::as_handler`] returns `None`.
    fn operation(&self, _name: &str) -> Option<&dyn Handler> {
        None
    }

    fn as_validator(&self) -> Option<&dyn Validator> {
        None
    }

    fn as_metadata_provider(&self) -> Option<&dyn MetadataProvider> {
        None
    }
}

/// Closure-backed [`Handler`] that is also a [`Component`].
pub struct HandlerFn<F>(F);

impl<F> Handler for HandlerFn<F>
where
    F: Fn(Document) -> anyhow::Result<Document> + Send + Sync,
{
    fn handle(&self, input: Document) -> anyhow::Result<Document> {
        (self.0)(input)
    }
}

impl<F> Component for HandlerFn<F>
where
    F: Fn(Document) -> anyhow::Result<Document> + Send + Sync + 'static,
{
    fn as_handler(&self) -> Option<&dyn Handler> {
        Some(self)
    }
}

/// Wrap a closure as a handler component.
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: Fn(Document) -> anyhow::Result<Document> + Send + Sync + 'static,
{
    HandlerFn(f)
}
