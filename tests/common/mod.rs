#![allow(dead_code)]

pub mod temp_files {
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Write `content` to a temp file ending in `.{ext}`. Removed on drop.
    pub fn create_temp_config(content: &str, ext: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("procdispatch_test_")
            .suffix(&format!(".{ext}"))
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    pub fn create_temp_yaml(content: &str) -> NamedTempFile {
        create_temp_config(content, "yaml")
    }

    pub fn create_temp_json(content: &str) -> NamedTempFile {
        create_temp_config(content, "json")
    }
}

pub mod fixtures {
    use procdispatch::adapter::{handler_fn, Component};
    use procdispatch::registry::{ComponentRegistry, ProcessKind};
    use procdispatch::routing::RoutingTable;
    use std::sync::Arc;

    pub const ROUTING_YAML: &str = r#"
- processName: echo
  triggers:
    - type: rest
      path: /api/echo
      method: POST
    - type: queue
      queueName: echo.requests
- processName: orders
  triggers:
    - type: rest
      path: "/api/orders/[0-9]+"
      method: GET
    - type: queue
      queueName: orders.requests
      replyQueueName: orders.replies
"#;

    pub fn routes() -> Arc<RoutingTable> {
        Arc::new(RoutingTable::from_yaml_str(ROUTING_YAML).unwrap())
    }

    pub fn registry_with(entries: Vec<(&str, Arc<dyn Component>, ProcessKind)>) -> Arc<ComponentRegistry> {
        let mut registry = ComponentRegistry::new();
        for (name, component, kind) in entries {
            registry.register(name, component, kind, None).unwrap();
        }
        Arc::new(registry)
    }

    pub fn component<C: Component>(c: C) -> Arc<dyn Component> {
        Arc::new(c)
    }

    pub fn identity() -> Arc<dyn Component> {
        Arc::new(handler_fn(Ok))
    }

    pub fn failing(message: &'static str) -> Arc<dyn Component> {
        Arc::new(handler_fn(move |_| Err(anyhow::anyhow!(message))))
    }
}

pub mod wait {
    use std::time::{Duration, Instant};

    /// Poll `cond` until it holds or `timeout` elapses. Returns the last result.
    pub fn until<F: FnMut() -> bool>(timeout: Duration, mut cond: F) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if cond() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}
