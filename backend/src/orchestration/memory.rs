//! In-process flow engine
//!
//! [`InMemoryFlowDriver`] keeps flow instances in a map and follows the same
//! state machine and error contract as the NiFi driver. It backs the engine
//! and HTTP tests.

use crate::orchestration::arguments::ArgumentSet;
use crate::orchestration::driver::{FlowDriver, InstanceHandle, ScheduleOutcome};
use crate::orchestration::error::OrchestrationError;
use crate::orchestration::template::TemplateKind;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Observable state of one in-memory flow instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSnapshot {
    /// Engine-assigned identifier
    pub id: String,
    /// Instance name
    pub name: String,
    /// Template it was deployed from
    pub template: TemplateKind,
    /// Bound parameter context
    pub parameters: ArgumentSet,
    /// Poll period of the polling processor, if one exists
    pub schedule_ms: Option<u64>,
    /// Whether the instance is scheduled to run
    pub running: bool,
    /// Whether its controller services are enabled
    pub services_enabled: bool,
}

/// A call received by the driver, recorded in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    /// `authenticate()`
    Authenticate,
    /// `instantiate(name, ..)`
    Instantiate(String),
    /// `reconcile(name, ..)`
    Reconcile(String),
    /// `deactivate(name)`
    Deactivate(String),
    /// `set_schedule(handle, .., interval_ms)`
    SetSchedule(String, u64),
    /// `instance_names()`
    InstanceNames,
}

#[derive(Debug, Default)]
struct EngineState {
    authenticated: bool,
    unreachable_attempts: u32,
    next_id: u64,
    instances: BTreeMap<String, InstanceSnapshot>,
    calls: Vec<DriverCall>,
}

/// Flow driver backed by an in-process map
#[derive(Debug)]
pub struct InMemoryFlowDriver {
    state: Mutex<EngineState>,
    missing_templates: HashSet<TemplateKind>,
    polling_processor: bool,
}

impl Default for InMemoryFlowDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryFlowDriver {
    /// Empty engine with every template available
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EngineState::default()),
            missing_templates: HashSet::new(),
            polling_processor: true,
        }
    }

    /// Fail the first `attempts` authentications as unreachable
    pub fn with_unreachable_attempts(self, attempts: u32) -> Self {
        self.lock().unreachable_attempts = attempts;
        self
    }

    /// Pretend the given template was never uploaded
    pub fn without_template(mut self, template: TemplateKind) -> Self {
        self.missing_templates.insert(template);
        self
    }

    /// Deploy templates that have no polling processor
    pub fn without_polling_processor(mut self) -> Self {
        self.polling_processor = false;
        self
    }

    /// Seed an instance that was deployed outside this driver
    pub fn with_existing_instance(self, name: &str, template: TemplateKind) -> Self {
        {
            let mut state = self.lock();
            let id = Self::allocate_id(&mut state);
            state.instances.insert(
                name.to_string(),
                InstanceSnapshot {
                    id,
                    name: name.to_string(),
                    template,
                    parameters: ArgumentSet::new(),
                    schedule_ms: None,
                    running: true,
                    services_enabled: true,
                },
            );
        }
        self
    }

    /// Drop the current token, as if it had expired
    pub fn expire_token(&self) {
        self.lock().authenticated = false;
    }

    /// Snapshot of an instance by name
    pub fn instance(&self, name: &str) -> Option<InstanceSnapshot> {
        self.lock().instances.get(name).cloned()
    }

    /// Number of deployed instances
    pub fn instance_count(&self) -> usize {
        self.lock().instances.len()
    }

    /// Calls received so far, oldest first
    pub fn calls(&self) -> Vec<DriverCall> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn allocate_id(state: &mut EngineState) -> String {
        state.next_id += 1;
        format!("pg-{:04}", state.next_id)
    }

    /// Record a call and reject it when no token is held
    fn begin(&self, call: DriverCall) -> Result<MutexGuard<'_, EngineState>, OrchestrationError> {
        let mut state = self.lock();
        state.calls.push(call);
        if !state.authenticated {
            return Err(OrchestrationError::EngineRejected(
                "401 Unauthorized: no valid access token".to_string(),
            ));
        }
        Ok(state)
    }

    fn apply_schedule(&self, snapshot: &mut InstanceSnapshot, interval_ms: u64) -> ScheduleOutcome {
        if self.polling_processor {
            snapshot.schedule_ms = Some(interval_ms);
            ScheduleOutcome::Applied
        } else {
            warn!(flow = %snapshot.name, "No polling processor found, schedule not applied");
            ScheduleOutcome::NotApplicable
        }
    }

    fn interval_of(arguments: &ArgumentSet) -> Result<u64, OrchestrationError> {
        arguments.interval_ms().ok_or_else(|| {
            OrchestrationError::InvalidConfiguration("arguments carry no valid interval".to_string())
        })
    }
}

#[async_trait]
impl FlowDriver for InMemoryFlowDriver {
    async fn authenticate(&self) -> Result<(), OrchestrationError> {
        let mut state = self.lock();
        state.calls.push(DriverCall::Authenticate);
        if state.unreachable_attempts > 0 {
            state.unreachable_attempts -= 1;
            return Err(OrchestrationError::EngineUnreachable(
                "connection refused".to_string(),
            ));
        }
        state.authenticated = true;
        Ok(())
    }

    async fn instantiate(
        &self,
        name: &str,
        template: TemplateKind,
        arguments: &ArgumentSet,
    ) -> Result<InstanceHandle, OrchestrationError> {
        let mut state = self.begin(DriverCall::Instantiate(name.to_string()))?;
        if state.instances.contains_key(name) {
            return Err(OrchestrationError::DuplicateInstance(name.to_string()));
        }
        if self.missing_templates.contains(&template) {
            return Err(OrchestrationError::UpstreamDependencyMissing(format!(
                "template {} is not available",
                template
            )));
        }
        let interval = Self::interval_of(arguments)?;

        let id = Self::allocate_id(&mut state);
        let mut snapshot = InstanceSnapshot {
            id: id.clone(),
            name: name.to_string(),
            template,
            parameters: arguments.clone(),
            schedule_ms: None,
            running: false,
            services_enabled: true,
        };
        self.apply_schedule(&mut snapshot, interval);
        snapshot.running = true;
        state.instances.insert(name.to_string(), snapshot);

        debug!(flow = %name, instance_id = %id, "Instance deployed");
        Ok(InstanceHandle {
            id,
            name: name.to_string(),
        })
    }

    async fn reconcile(
        &self,
        name: &str,
        arguments: &ArgumentSet,
    ) -> Result<InstanceHandle, OrchestrationError> {
        let mut state = self.begin(DriverCall::Reconcile(name.to_string()))?;
        let interval = Self::interval_of(arguments)?;
        let snapshot = state
            .instances
            .get_mut(name)
            .ok_or_else(|| OrchestrationError::InstanceNotFound(name.to_string()))?;

        snapshot.running = false;
        snapshot.services_enabled = false;
        snapshot.parameters = arguments.clone();
        snapshot.services_enabled = true;
        self.apply_schedule(snapshot, interval);
        snapshot.running = true;

        Ok(InstanceHandle {
            id: snapshot.id.clone(),
            name: name.to_string(),
        })
    }

    async fn deactivate(&self, name: &str) -> Result<(), OrchestrationError> {
        let mut state = self.begin(DriverCall::Deactivate(name.to_string()))?;
        state
            .instances
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| OrchestrationError::InstanceNotFound(name.to_string()))
    }

    async fn set_schedule(
        &self,
        handle: &InstanceHandle,
        _marker: &str,
        interval_ms: u64,
    ) -> Result<ScheduleOutcome, OrchestrationError> {
        let mut state =
            self.begin(DriverCall::SetSchedule(handle.name.clone(), interval_ms))?;
        let snapshot = state
            .instances
            .get_mut(&handle.name)
            .ok_or_else(|| OrchestrationError::InstanceNotFound(handle.name.clone()))?;
        Ok(self.apply_schedule(snapshot, interval_ms))
    }

    async fn instance_names(&self) -> Result<Vec<String>, OrchestrationError> {
        let state = self.begin(DriverCall::InstanceNames)?;
        Ok(state.instances.keys().cloned().collect())
    }
}
