//! Flow engine driver abstraction
//!
//! The orchestrator talks to the external flow engine only through
//! [`FlowDriver`]. The production implementation is
//! [`crate::nifi::NifiDriver`]; tests use
//! [`crate::orchestration::memory::InMemoryFlowDriver`].

use crate::orchestration::arguments::ArgumentSet;
use crate::orchestration::error::OrchestrationError;
use crate::orchestration::template::TemplateKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Name fragment identifying the processor that owns the poll schedule
pub const POLLING_PROCESSOR_MARKER: &str = "Polling";

/// Reference to a deployed flow instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceHandle {
    /// Engine-assigned identifier
    pub id: String,
    /// Instance name, see [`crate::orchestration::naming::flow_name`]
    pub name: String,
}

/// Result of applying a poll schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// The polling processor now runs at the requested period
    Applied,
    /// The template has no processor carrying the marker
    NotApplicable,
}

/// Lifecycle operations on the external flow engine
///
/// Instances are addressed by name only. Implementations hold no lock over
/// the engine; callers serialize operations per name.
#[async_trait]
pub trait FlowDriver: Send + Sync {
    /// Obtain or renew the engine access token
    async fn authenticate(&self) -> Result<(), OrchestrationError>;

    /// Deploy a template as a new running instance
    ///
    /// Fails with [`OrchestrationError::DuplicateInstance`] when the name is
    /// taken and [`OrchestrationError::UpstreamDependencyMissing`] when the
    /// template is not uploaded.
    async fn instantiate(
        &self,
        name: &str,
        template: TemplateKind,
        arguments: &ArgumentSet,
    ) -> Result<InstanceHandle, OrchestrationError>;

    /// Replace the arguments of a running instance and restart it
    ///
    /// Never creates: a missing name is
    /// [`OrchestrationError::InstanceNotFound`].
    async fn reconcile(
        &self,
        name: &str,
        arguments: &ArgumentSet,
    ) -> Result<InstanceHandle, OrchestrationError>;

    /// Stop and remove an instance
    async fn deactivate(&self, name: &str) -> Result<(), OrchestrationError>;

    /// Set the run period of the processor whose name contains `marker`
    async fn set_schedule(
        &self,
        handle: &InstanceHandle,
        marker: &str,
        interval_ms: u64,
    ) -> Result<ScheduleOutcome, OrchestrationError>;

    /// Names of every instance under the root group
    async fn instance_names(&self) -> Result<Vec<String>, OrchestrationError>;
}
