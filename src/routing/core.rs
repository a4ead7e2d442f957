use super::rule::{RoutingRule, Trigger};
use http::Method;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("rule for '{process}' has invalid path pattern '{pattern}': {source}")]
    InvalidPattern {
        process: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("rule for '{process}' has invalid method '{method}'")]
    InvalidMethod { process: String, method: String },
    #[error("routing rule #{index} has an empty processName")]
    EmptyProcessName { index: usize },
    #[error("failed to read routing config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML routing config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid JSON routing config: {0}")]
    Json(#[from] serde_json::Error),
}

/// A compiled REST trigger.
#[derive(Debug, Clone)]
struct RestRoute {
    process_name: Arc<str>,
    method: Method,
    /// `^(?:<pattern>)$` so only full matches count.
    regex: Regex,
    pattern: String,
}

/// Result of resolving a queue name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueRoute<'a> {
    pub process_name: &'a str,
    /// Static reply destination declared by the matching trigger.
    pub reply_queue: Option<&'a str>,
}

/// Ordered routing rules, compiled for matching.
///
/// Rules are consulted in declaration order and the first match wins.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    rules: Vec<RoutingRule>,
    rest: Vec<RestRoute>,
    queues: BTreeSet<String>,
}

impl RoutingTable {
    /// Compile `rules`.
    ///
    /// # Errors
    ///
    /// Fails on an empty process name, an unparsable method, or a path pattern
    /// that is not a valid regex.
    pub fn new(rules: Vec<RoutingRule>) -> Result<Self, RoutingError> {
        let mut rest = Vec::new();
        let mut queues = BTreeSet::new();

        for (index, rule) in rules.iter().enumerate() {
            if rule.process_name.trim().is_empty() {
                return Err(RoutingError::EmptyProcessName { index });
            }
            let process_name: Arc<str> = Arc::from(rule.process_name.as_str());

            for trigger in &rule.triggers {
                match trigger {
                    Trigger::Rest { path, method } => {
                        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                            .map_err(|_| RoutingError::InvalidMethod {
                                process: rule.process_name.clone(),
                                method: method.clone(),
                            })?;
                        let regex = Regex::new(&format!("^(?:{path})$")).map_err(|source| {
                            RoutingError::InvalidPattern {
                                process: rule.process_name.clone(),
                                pattern: path.clone(),
                                source,
                            }
                        })?;
                        rest.push(RestRoute {
                            process_name: Arc::clone(&process_name),
                            method,
                            regex,
                            pattern: path.clone(),
                        });
                    }
                    Trigger::Queue { queue_name, .. } => {
                        queues.insert(queue_name.clone());
                    }
                }
            }
        }

        let summary: Vec<String> = rest
            .iter()
            .take(10)
            .map(|r| format!("{} {} -> {}", r.method, r.pattern, r.process_name))
            .collect();
        info!(
            rules_count = rules.len(),
            rest_routes = rest.len(),
            listen_queues = ?queues,
            routes_summary = ?summary,
            "Routing table loaded"
        );

        Ok(Self {
            rules,
            rest,
            queues,
        })
    }

    /// Parse and compile a YAML rule list.
    ///
    /// # Errors
    ///
    /// Parse errors and anything [`RoutingTable::new`] rejects.
    pub fn from_yaml_str(content: &str) -> Result<Self, RoutingError> {
        let rules: Vec<RoutingRule> = serde_yaml::from_str(content)?;
        Self::new(rules)
    }

    /// Parse and compile a JSON rule list.
    ///
    /// # Errors
    ///
    /// Parse errors and anything [`RoutingTable::new`] rejects.
    pub fn from_json_str(content: &str) -> Result<Self, RoutingError> {
        let rules: Vec<RoutingRule> = serde_json::from_str(content)?;
        Self::new(rules)
    }

    /// Process for a REST request, if any rule matches.
    ///
    /// The path must match a trigger's pattern in full; the method comparison
    /// ignores case.
    #[must_use]
    pub fn match_rest(&self, path: &str, method: &str) -> Option<&str> {
        let found = self
            .rest
            .iter()
            .find(|r| r.method.as_str().eq_ignore_ascii_case(method) && r.regex.is_match(path));

        match found {
            Some(route) => {
                debug!(
                    method = %method,
                    path = %path,
                    process_name = %route.process_name,
                    route_pattern = %route.pattern,
                    "Route matched"
                );
                Some(&*route.process_name)
            }
            None => {
                warn!(method = %method, path = %path, "No route matched");
                None
            }
        }
    }

    /// Every queue named by a queue trigger, across all rules.
    #[must_use]
    pub fn listen_queues(&self) -> &BTreeSet<String> {
        &self.queues
    }

    /// Process for a message delivered to `queue_name`.
    #[must_use]
    pub fn match_queue(&self, queue_name: &str) -> Option<&str> {
        self.match_queue_route(queue_name).map(|r| r.process_name)
    }

    /// Process and static reply queue for `queue_name`, from the first
    /// matching queue trigger.
    #[must_use]
    pub fn match_queue_route(&self, queue_name: &str) -> Option<QueueRoute<'_>> {
        for rule in &self.rules {
            for trigger in &rule.triggers {
                if let Trigger::Queue {
                    queue_name: q,
                    reply_queue_name,
                } = trigger
                {
                    if q == queue_name {
                        return Some(QueueRoute {
                            process_name: &rule.process_name,
                            reply_queue: reply_queue_name.as_deref(),
                        });
                    }
                }
            }
        }
        None
    }

    /// Static reply queue declared for `queue_name`.
    #[must_use]
    pub fn reply_queue_for(&self, queue_name: &str) -> Option<&str> {
        self.match_queue_route(queue_name).and_then(|r| r.reply_queue)
    }

    /// Rules in declaration order.
    #[must_use]
    pub fn rules(&self) -> &[RoutingRule] {
        &self.rules
    }

    /// One line per trigger, for diagnostics.
    #[must_use]
    pub fn route_summaries(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for rule in &self.rules {
            for trigger in &rule.triggers {
                let line = match trigger {
                    Trigger::Rest { path, method } => format!(
                        "[rest]  {} {} -> {}",
                        method.to_ascii_uppercase(),
                        path,
                        rule.process_name
                    ),
                    Trigger::Queue {
                        queue_name,
                        reply_queue_name: Some(reply),
                    } => format!("[queue] {queue_name} -> {} (reply: {reply})", rule.process_name),
                    Trigger::Queue { queue_name, .. } => {
                        format!("[queue] {queue_name} -> {}", rule.process_name)
                    }
                };
                lines.push(line);
            }
        }
        lines
    }

    /// Print all routes to stdout.
    pub fn dump_routes(&self) {
        println!(
            "[routes] rules={} rest={} queues={}",
            self.rules.len(),
            self.rest.len(),
            self.queues.len()
        );
        for line in self.route_summaries() {
            println!("{line}");
        }
    }
}

/// Load routing rules from a file; `.yaml`/`.yml` are read as YAML, anything
/// else as JSON.
///
/// # Errors
///
/// I/O, parse, and compilation errors.
pub fn load_routing_config(path: impl AsRef<Path>) -> Result<RoutingTable, RoutingError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| RoutingError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
    if is_yaml {
        RoutingTable::from_yaml_str(&content)
    } else {
        RoutingTable::from_json_str(&content)
    }
}
