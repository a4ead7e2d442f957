use crate::document::{self, Document};
use crate::ids::RequestId;
use crate::registry::ComponentRegistry;
use crate::routing::RoutingTable;
use http::StatusCode;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Outcome of a REST dispatch that did not fail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestResponse {
    #[serde(serialize_with = "serialize_status")]
    pub status: StatusCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Document>,
}

fn serialize_status<S: serde::Serializer>(status: &StatusCode, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u16(status.as_u16())
}

impl RestResponse {
    /// 200 with a body.
    #[must_use]
    pub fn ok(body: Document) -> Self {
        Self {
            status: StatusCode::OK,
            body: Some(body),
        }
    }

    /// 200 with no body.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            status: StatusCode::OK,
            body: None,
        }
    }

    /// 404: no rule matched, or the matched process is not registered.
    #[must_use]
    pub fn not_found(method: &str, path: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: Some(serde_json::json!({
                "error": "Not Found",
                "method": method,
                "path": path,
            })),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The process ran and failed. The transport decides how to report it.
    #[error("process '{process_name}' failed: {source}")]
    Execution {
        process_name: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Synchronous REST dispatch: route, look up, invoke on the calling thread.
#[derive(Clone)]
pub struct RestDispatcher {
    routes: Arc<RoutingTable>,
    registry: Arc<ComponentRegistry>,
}

impl RestDispatcher {
    #[must_use]
    pub fn new(routes: Arc<RoutingTable>, registry: Arc<ComponentRegistry>) -> Self {
        Self { routes, registry }
    }

    #[must_use]
    pub fn routes(&self) -> &RoutingTable {
        &self.routes
    }

    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Dispatch one REST call.
    ///
    /// A missing body reaches the process as `{}`. A `null` result becomes a
    /// 200 with no body.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Execution`] when the process returns an error. Panics
    /// are not caught here either; both go to the transport layer.
    pub fn handle(
        &self,
        path: &str,
        method: &str,
        body: Option<Document>,
    ) -> Result<RestResponse, DispatchError> {
        let request_id = RequestId::new();

        let Some(process_name) = self.routes.match_rest(path, method) else {
            info!(
                request_id = %request_id,
                method = %method,
                path = %path,
                "No route for request"
            );
            return Ok(RestResponse::not_found(method, path));
        };

        debug!(
            request_id = %request_id,
            process_name = %process_name,
            available_processes = self.registry.len(),
            "Process lookup"
        );

        let Some(process) = self.registry.resolve(process_name) else {
            warn!(
                request_id = %request_id,
                process_name = %process_name,
                available_processes = ?self.registry.names(),
                "Route matched but no process is registered"
            );
            return Ok(RestResponse::not_found(method, path));
        };

        info!(
            request_id = %request_id,
            process_name = %process_name,
            method = %method,
            path = %path,
            "Request dispatched to process"
        );

        let start = Instant::now();
        let input = body.unwrap_or_else(document::empty);
        match process.handle(input) {
            Ok(output) => {
                info!(
                    request_id = %request_id,
                    process_name = %process_name,
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Process response received"
                );
                if output.is_null() {
                    Ok(RestResponse::empty())
                } else {
                    Ok(RestResponse::ok(output))
                }
            }
            Err(source) => {
                error!(
                    request_id = %request_id,
                    process_name = %process_name,
                    latency_ms = start.elapsed().as_millis() as u64,
                    error = %source,
                    "Process failed"
                );
                Err(DispatchError::Execution {
                    process_name: process_name.to_string(),
                    source,
                })
            }
        }
    }
}

impl std::fmt::Debug for RestDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestDispatcher")
            .field("rules", &self.routes.rules().len())
            .field("processes", &self.registry.len())
            .finish()
    }
}
