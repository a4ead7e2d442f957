use crate::adapter::{BusinessProcess, Component, DomainLogicAdapter, Process};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

const DEFAULT_VERSION: &str = "1.0.0";

/// Catalog a process is registered under.
///
/// Both kinds share one invocation contract; they differ in how failures are
/// reported (see [`crate::adapter`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessKind {
    BusinessProcess,
    DomainLogic,
}

impl fmt::Display for ProcessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessKind::BusinessProcess => f.write_str("business_process"),
            ProcessKind::DomainLogic => f.write_str("domain_logic"),
        }
    }
}

/// Optional descriptive data supplied with a registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessMetadata {
    /// Canonical operation name; defaults to the registered name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ProcessMetadata {
    #[must_use]
    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declared version, or `"1.0.0"`.
    #[must_use]
    pub fn version(&self) -> &str {
        self.version.as_deref().unwrap_or(DEFAULT_VERSION)
    }

    /// Declared description, or the empty string.
    #[must_use]
    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }
}

/// What to do when a name is registered twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Replace the earlier entry; the last registration wins.
    #[default]
    Overwrite,
    /// Fail the second registration with [`RegistryError::Duplicate`].
    Reject,
}

impl DuplicatePolicy {
    /// Parse `overwrite` / `reject` (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Some(Self::Overwrite),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("process '{name}' is already registered as {existing}")]
    Duplicate { name: String, existing: ProcessKind },
    #[error("business process '{name}' exposes no handle or operation entry point")]
    NotInvocable { name: String },
}

/// One tuple produced by component discovery.
pub struct Registration {
    pub name: String,
    pub instance: Arc<dyn Component>,
    pub kind: ProcessKind,
    pub metadata: Option<ProcessMetadata>,
}

impl Registration {
    pub fn new(name: impl Into<String>, instance: Arc<dyn Component>, kind: ProcessKind) -> Self {
        Self {
            name: name.into(),
            instance,
            kind,
            metadata: None,
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: ProcessMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// An entry in the registry. Immutable once created.
#[derive(Clone)]
pub struct ProcessDescriptor {
    pub name: String,
    pub kind: ProcessKind,
    pub metadata: ProcessMetadata,
    /// The component as it was registered.
    pub component: Arc<dyn Component>,
    /// The component behind the uniform contract.
    pub process: Arc<dyn Process>,
}

impl fmt::Debug for ProcessDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Name → process map.
///
/// Populated by `&mut self` calls during startup, then shared behind an `Arc`
/// for lock-free concurrent reads.
#[derive(Default)]
pub struct ComponentRegistry {
    entries: HashMap<String, ProcessDescriptor>,
    policy: DuplicatePolicy,
}

impl ComponentRegistry {
    /// Empty registry with [`DuplicatePolicy::Overwrite`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_policy(policy: DuplicatePolicy) -> Self {
        Self {
            entries: HashMap::new(),
            policy,
        }
    }

    #[must_use]
    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Register `instance` under `name`.
    ///
    /// Domain logic is wrapped in a [`DomainLogicAdapter`]; business processes
    /// must expose an entry point. Returns the replaced descriptor, if any.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Duplicate`] under [`DuplicatePolicy::Reject`], and
    /// [`RegistryError::NotInvocable`] for a business process with nothing to call.
    pub fn register(
        &mut self,
        name: &str,
        instance: Arc<dyn Component>,
        kind: ProcessKind,
        metadata: Option<ProcessMetadata>,
    ) -> Result<Option<ProcessDescriptor>, RegistryError> {
        if self.policy == DuplicatePolicy::Reject {
            if let Some(existing) = self.entries.get(name) {
                return Err(RegistryError::Duplicate {
                    name: name.to_string(),
                    existing: existing.kind,
                });
            }
        }

        let metadata = metadata.unwrap_or_default();
        let process: Arc<dyn Process> = match kind {
            ProcessKind::DomainLogic => Arc::new(DomainLogicAdapter::new(
                name,
                metadata.clone(),
                Arc::clone(&instance),
            )),
            ProcessKind::BusinessProcess => {
                let bp = BusinessProcess::new(name, metadata.clone(), Arc::clone(&instance))
                    .ok_or_else(|| RegistryError::NotInvocable {
                        name: name.to_string(),
                    })?;
                Arc::new(bp)
            }
        };

        let descriptor = ProcessDescriptor {
            name: name.to_string(),
            kind,
            metadata,
            component: instance,
            process,
        };

        let replaced = self.entries.insert(name.to_string(), descriptor);
        if let Some(old) = &replaced {
            warn!(
                process_name = %name,
                previous_kind = %old.kind,
                kind = %kind,
                "Replaced existing process registration"
            );
        } else {
            info!(
                process_name = %name,
                kind = %kind,
                total_processes = self.entries.len(),
                "Process registered"
            );
        }
        Ok(replaced)
    }

    /// Register every discovered tuple in order.
    ///
    /// # Errors
    ///
    /// Stops at the first failing registration.
    pub fn register_all<I>(&mut self, registrations: I) -> Result<(), RegistryError>
    where
        I: IntoIterator<Item = Registration>,
    {
        for reg in registrations {
            self.register(&reg.name, reg.instance, reg.kind, reg.metadata)?;
        }
        Ok(())
    }

    /// Process registered under `name` with the given `kind`.
    #[must_use]
    pub fn lookup(&self, name: &str, kind: ProcessKind) -> Option<Arc<dyn Process>> {
        let found = self
            .entries
            .get(name)
            .filter(|d| d.kind == kind)
            .map(|d| Arc::clone(&d.process));
        debug!(
            process_name = %name,
            kind = %kind,
            found = found.is_some(),
            "Process lookup"
        );
        found
    }

    /// Process registered under `name`, whatever its kind.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Process>> {
        self.entries.get(name).map(|d| Arc::clone(&d.process))
    }

    #[must_use]
    pub fn descriptor(&self, name: &str) -> Option<&ProcessDescriptor> {
        self.entries.get(name)
    }

    /// Descriptors of one kind, sorted by name.
    #[must_use]
    pub fn descriptors_of(&self, kind: ProcessKind) -> Vec<&ProcessDescriptor> {
        let mut out: Vec<_> = self.entries.values().filter(|d| d.kind == kind).collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("names", &self.names())
            .field("policy", &self.policy)
            .finish()
    }
}
