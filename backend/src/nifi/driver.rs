//! NiFi flow driver
//!
//! Implements [`FlowDriver`] on top of the NiFi REST API. A flow instance is
//! a process group under the root group, named after its record, with its
//! own parameter context and a deployed template inside.

use crate::config::NifiConfig;
use crate::nifi::client::NifiClient;
use crate::nifi::types::{
    ControllerServiceComponent, ControllerServiceEntity, ControllerServicesEntity,
    InstantiateTemplateRequest, Parameter, ParameterContextComponent, ParameterContextEntity,
    ParameterContextReference, ParameterEntity, Position, ProcessGroupComponent,
    ProcessGroupEntity, ProcessGroupFlowEntity, ProcessorComponent, ProcessorConfig,
    ProcessorEntity, ProcessorsEntity, RunStatusRequest, ScheduleComponentsRequest,
    TemplatesEntity,
};
use crate::orchestration::arguments::{ArgumentSet, CERTIFICATE_CREDENTIAL};
use crate::orchestration::driver::{
    FlowDriver, InstanceHandle, ScheduleOutcome, POLLING_PROCESSOR_MARKER,
};
use crate::orchestration::error::OrchestrationError;
use crate::orchestration::template::TemplateKind;
use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Value NiFi returns in place of a sensitive property
const MASKED_VALUE: &str = "********";

/// Canvas extent new groups are scattered over
const CANVAS_EXTENT: f64 = 4000.0;

/// Where a template is placed inside its process group
const TEMPLATE_ORIGIN: (f64, f64) = (-250.0, 200.0);

const ENABLED: &str = "ENABLED";
const DISABLED: &str = "DISABLED";
const RUNNING: &str = "RUNNING";
const STOPPED: &str = "STOPPED";

/// [`FlowDriver`] backed by a NiFi instance
pub struct NifiDriver {
    client: NifiClient,
    poll_interval: Duration,
    poll_attempts: u32,
}

impl NifiDriver {
    /// Create a driver from configuration; no request is sent yet
    pub fn new(config: &NifiConfig) -> Result<Self, OrchestrationError> {
        Ok(Self {
            client: NifiClient::new(config)?,
            poll_interval: config.state_poll_interval,
            poll_attempts: config.state_poll_attempts.max(1),
        })
    }

    async fn root_flow(&self) -> Result<ProcessGroupFlowEntity, OrchestrationError> {
        self.client.get("/flow/process-groups/root").await
    }

    async fn find_group(&self, name: &str) -> Result<Option<ProcessGroupEntity>, OrchestrationError> {
        let root = self.root_flow().await?;
        Ok(root
            .process_group_flow
            .flow
            .process_groups
            .into_iter()
            .find(|group| group.component.name.as_deref() == Some(name)))
    }

    async fn require_group(&self, name: &str) -> Result<ProcessGroupEntity, OrchestrationError> {
        self.find_group(name)
            .await?
            .ok_or_else(|| OrchestrationError::InstanceNotFound(name.to_string()))
    }

    /// Current revision and context binding of a group
    async fn refresh_group(&self, group_id: &str) -> Result<ProcessGroupEntity, OrchestrationError> {
        self.client.get(&format!("/process-groups/{}", group_id)).await
    }

    async fn find_template(&self, template: TemplateKind) -> Result<String, OrchestrationError> {
        let templates: TemplatesEntity = self.client.get("/flow/templates").await?;
        templates
            .templates
            .into_iter()
            .find(|entry| entry.template.name == template.template_name())
            .map(|entry| entry.id)
            .ok_or_else(|| {
                OrchestrationError::UpstreamDependencyMissing(format!(
                    "template {} is not uploaded to NiFi",
                    template
                ))
            })
    }

    async fn create_group(
        &self,
        root_id: &str,
        name: &str,
    ) -> Result<ProcessGroupEntity, OrchestrationError> {
        let request = ProcessGroupEntity {
            id: String::new(),
            revision: self.client.initial_revision(),
            component: ProcessGroupComponent {
                name: Some(name.to_string()),
                position: Some(random_position()),
                ..Default::default()
            },
        };
        self.client
            .post(&format!("/process-groups/{}/process-groups", root_id), &request)
            .await
    }

    async fn create_context(
        &self,
        name: &str,
        arguments: &ArgumentSet,
    ) -> Result<ParameterContextEntity, OrchestrationError> {
        let parameters = arguments
            .iter()
            .map(|(key, value)| ParameterEntity {
                parameter: Parameter {
                    name: key.to_string(),
                    sensitive: ArgumentSet::is_confidential(key),
                    value: Some(value.to_string()),
                },
            })
            .collect();
        let request = ParameterContextEntity {
            id: String::new(),
            revision: self.client.initial_revision(),
            component: ParameterContextComponent {
                name: name.to_string(),
                parameters,
            },
        };
        self.client.post("/parameter-contexts", &request).await
    }

    async fn delete_context(&self, context_id: &str) -> Result<(), OrchestrationError> {
        let path = format!("/parameter-contexts/{}", context_id);
        let context: ParameterContextEntity = self.client.get(&path).await?;
        self.client.delete(&path, &context.revision).await
    }

    /// Bind a context to a group, or unbind with `None`
    async fn bind_context(
        &self,
        group_id: &str,
        context_id: Option<&str>,
    ) -> Result<(), OrchestrationError> {
        let current = self.refresh_group(group_id).await?;
        let request = ProcessGroupEntity {
            id: group_id.to_string(),
            revision: self.client.revision(&current.revision),
            component: ProcessGroupComponent {
                id: Some(group_id.to_string()),
                parameter_context: Some(ParameterContextReference {
                    id: context_id.map(str::to_string),
                }),
                ..Default::default()
            },
        };
        let _: Value = self
            .client
            .put(&format!("/process-groups/{}", group_id), &request)
            .await?;
        Ok(())
    }

    async fn deploy_template(
        &self,
        group_id: &str,
        template_id: &str,
    ) -> Result<(), OrchestrationError> {
        let request = InstantiateTemplateRequest {
            template_id: template_id.to_string(),
            origin_x: TEMPLATE_ORIGIN.0,
            origin_y: TEMPLATE_ORIGIN.1,
        };
        let _: Value = self
            .client
            .post(&format!("/process-groups/{}/template-instance", group_id), &request)
            .await?;
        Ok(())
    }

    async fn controller_services(
        &self,
        group_id: &str,
    ) -> Result<Vec<ControllerServiceEntity>, OrchestrationError> {
        let services: ControllerServicesEntity = self
            .client
            .get(&format!(
                "/flow/process-groups/{}/controller-services?includeAncestorGroups=false&includeDescendantGroups=true",
                group_id
            ))
            .await?;
        Ok(services.controller_services)
    }

    /// Move every controller service of a group to `target` and wait for it
    async fn set_services_state(&self, group_id: &str, target: &str) -> Result<(), OrchestrationError> {
        for service in self.controller_services(group_id).await? {
            if service.component.state == target {
                continue;
            }
            debug!(service = %service.component.name, state = %target, "Changing controller service state");
            let request = RunStatusRequest {
                revision: self.client.revision(&service.revision),
                state: target.to_string(),
            };
            let _: Value = self
                .client
                .put(&format!("/controller-services/{}/run-status", service.id), &request)
                .await?;
        }

        self.poll_until(&format!("controller services {}", target), || async move {
            Ok(self
                .controller_services(group_id)
                .await?
                .iter()
                .all(|service| service.component.state == target))
        })
        .await
    }

    /// Put confidential parameter references back into masked service properties
    ///
    /// A masked property is bound to the confidential argument whose key
    /// matches its normalized name, falling back to the keystore credential
    /// for password properties.
    async fn reinject_confidential(
        &self,
        group_id: &str,
        arguments: &ArgumentSet,
    ) -> Result<(), OrchestrationError> {
        for service in self.controller_services(group_id).await? {
            let properties: BTreeMap<String, Option<String>> = service
                .component
                .properties
                .iter()
                .filter(|(_, value)| value.as_deref() == Some(MASKED_VALUE))
                .filter_map(|(property, _)| {
                    confidential_key_for(property, arguments)
                        .map(|key| (property.clone(), Some(format!("#{{{}}}", key))))
                })
                .collect();
            if properties.is_empty() {
                continue;
            }

            debug!(
                service = %service.component.name,
                properties = properties.len(),
                "Re-injecting confidential parameter references"
            );
            let request = ControllerServiceEntity {
                id: service.id.clone(),
                revision: self.client.revision(&service.revision),
                parent_group_id: None,
                component: ControllerServiceComponent {
                    id: service.id.clone(),
                    properties,
                    ..Default::default()
                },
            };
            let _: Value = self
                .client
                .put(&format!("/controller-services/{}", service.id), &request)
                .await?;
        }
        Ok(())
    }

    async fn processors(&self, group_id: &str) -> Result<Vec<ProcessorEntity>, OrchestrationError> {
        let processors: ProcessorsEntity = self
            .client
            .get(&format!(
                "/process-groups/{}/processors?includeDescendantGroups=true",
                group_id
            ))
            .await?;
        Ok(processors.processors)
    }

    /// Start or stop every component of a group and wait for it
    async fn schedule_group(&self, group_id: &str, state: &str) -> Result<(), OrchestrationError> {
        let request = ScheduleComponentsRequest {
            id: group_id.to_string(),
            state: state.to_string(),
        };
        let _: Value = self
            .client
            .put(&format!("/flow/process-groups/{}", group_id), &request)
            .await?;

        self.poll_until(&format!("processors {}", state), || async move {
            let processors = self.processors(group_id).await?;
            Ok(match state {
                RUNNING => processors
                    .iter()
                    .filter(|p| p.component.state != DISABLED)
                    .all(|p| p.component.state == RUNNING),
                _ => processors.iter().all(|p| p.component.state != RUNNING),
            })
        })
        .await
    }

    async fn delete_group(&self, group_id: &str) -> Result<(), OrchestrationError> {
        let current = self.refresh_group(group_id).await?;
        self.client
            .delete(&format!("/process-groups/{}", group_id), &current.revision)
            .await
    }

    /// Populate, configure and start a freshly created group
    async fn deploy_into(
        &self,
        handle: &InstanceHandle,
        template_id: &str,
        arguments: &ArgumentSet,
    ) -> Result<(), OrchestrationError> {
        let context = self.create_context(&handle.name, arguments).await?;
        self.bind_context(&handle.id, Some(&context.id)).await?;
        self.deploy_template(&handle.id, template_id).await?;
        self.set_services_state(&handle.id, ENABLED).await?;
        if let Some(interval) = arguments.interval_ms() {
            self.set_schedule(handle, POLLING_PROCESSOR_MARKER, interval)
                .await?;
        }
        self.schedule_group(&handle.id, RUNNING).await
    }

    /// Stop, disable and delete a group along with its context
    async fn teardown(&self, group_id: &str) -> Result<(), OrchestrationError> {
        self.schedule_group(group_id, STOPPED).await?;
        self.set_services_state(group_id, DISABLED).await?;
        let context_id = self
            .refresh_group(group_id)
            .await?
            .component
            .parameter_context
            .and_then(|reference| reference.id);
        self.delete_group(group_id).await?;
        if let Some(context_id) = context_id {
            self.delete_context(&context_id).await?;
        }
        Ok(())
    }

    async fn poll_until<F, Fut>(&self, what: &str, mut check: F) -> Result<(), OrchestrationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, OrchestrationError>>,
    {
        for _ in 0..self.poll_attempts {
            if check().await? {
                return Ok(());
            }
            tokio::time::sleep(self.poll_interval).await;
        }
        Err(OrchestrationError::EngineRejected(format!(
            "timed out waiting for {}",
            what
        )))
    }
}

#[async_trait]
impl FlowDriver for NifiDriver {
    async fn authenticate(&self) -> Result<(), OrchestrationError> {
        self.client.login().await
    }

    async fn instantiate(
        &self,
        name: &str,
        template: TemplateKind,
        arguments: &ArgumentSet,
    ) -> Result<InstanceHandle, OrchestrationError> {
        if self.find_group(name).await?.is_some() {
            return Err(OrchestrationError::DuplicateInstance(name.to_string()));
        }
        let template_id = self.find_template(template).await?;
        let root_id = self.root_flow().await?.process_group_flow.id;

        let group = self.create_group(&root_id, name).await?;
        let handle = InstanceHandle {
            id: group.id,
            name: name.to_string(),
        };
        info!(flow = %name, instance_id = %handle.id, template = %template, "Process group created");

        if let Err(e) = self.deploy_into(&handle, &template_id, arguments).await {
            warn!(flow = %name, error = %e, "Deployment failed, removing partial instance");
            if let Err(cleanup) = self.teardown(&handle.id).await {
                warn!(flow = %name, error = %cleanup, "Cleanup of partial instance failed");
            }
            return Err(e);
        }
        Ok(handle)
    }

    async fn reconcile(
        &self,
        name: &str,
        arguments: &ArgumentSet,
    ) -> Result<InstanceHandle, OrchestrationError> {
        let group = self.require_group(name).await?;
        let handle = InstanceHandle {
            id: group.id,
            name: name.to_string(),
        };

        self.schedule_group(&handle.id, STOPPED).await?;
        self.set_services_state(&handle.id, DISABLED).await?;

        // Parameter contexts cannot be edited in place: unbind, drop, recreate
        let old_context = self
            .refresh_group(&handle.id)
            .await?
            .component
            .parameter_context
            .and_then(|reference| reference.id);
        if let Some(context_id) = old_context {
            self.bind_context(&handle.id, None).await?;
            self.delete_context(&context_id).await?;
        }
        let context = self.create_context(name, arguments).await?;
        self.bind_context(&handle.id, Some(&context.id)).await?;

        self.reinject_confidential(&handle.id, arguments).await?;
        self.set_services_state(&handle.id, ENABLED).await?;
        if let Some(interval) = arguments.interval_ms() {
            self.set_schedule(&handle, POLLING_PROCESSOR_MARKER, interval)
                .await?;
        }
        self.schedule_group(&handle.id, RUNNING).await?;

        info!(flow = %name, instance_id = %handle.id, "Flow reconciled");
        Ok(handle)
    }

    async fn deactivate(&self, name: &str) -> Result<(), OrchestrationError> {
        let group = self.require_group(name).await?;
        self.teardown(&group.id).await?;
        info!(flow = %name, instance_id = %group.id, "Flow removed");
        Ok(())
    }

    async fn set_schedule(
        &self,
        handle: &InstanceHandle,
        marker: &str,
        interval_ms: u64,
    ) -> Result<ScheduleOutcome, OrchestrationError> {
        let processor = self
            .processors(&handle.id)
            .await?
            .into_iter()
            .find(|processor| processor.component.name.contains(marker));

        let Some(processor) = processor else {
            warn!(
                flow = %handle.name,
                marker = %marker,
                "No polling processor found, schedule not applied"
            );
            return Ok(ScheduleOutcome::NotApplicable);
        };

        debug!(
            flow = %handle.name,
            processor = %processor.component.name,
            interval_ms,
            "Setting polling interval"
        );
        let request = ProcessorEntity {
            id: processor.id.clone(),
            revision: self.client.revision(&processor.revision),
            component: ProcessorComponent {
                id: processor.id.clone(),
                config: Some(ProcessorConfig {
                    scheduling_period: Some(format!("{}ms", interval_ms)),
                }),
                ..Default::default()
            },
        };
        let _: Value = self
            .client
            .put(&format!("/processors/{}", processor.id), &request)
            .await?;
        Ok(ScheduleOutcome::Applied)
    }

    async fn instance_names(&self) -> Result<Vec<String>, OrchestrationError> {
        let root = self.root_flow().await?;
        Ok(root
            .process_group_flow
            .flow
            .process_groups
            .into_iter()
            .filter_map(|group| group.component.name)
            .collect())
    }
}

fn random_position() -> Position {
    let mut rng = rand::thread_rng();
    Position {
        x: rng.gen_range(0.0..CANVAS_EXTENT),
        y: rng.gen_range(0.0..CANVAS_EXTENT),
    }
}

/// `"Keystore Password"` -> `keystore_password`
fn normalize_property(property: &str) -> String {
    property
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn confidential_key_for(property: &str, arguments: &ArgumentSet) -> Option<String> {
    let normalized = normalize_property(property);
    if ArgumentSet::is_confidential(&normalized) && arguments.get(&normalized).is_some() {
        return Some(normalized);
    }
    if normalized.contains("password") && arguments.get(CERTIFICATE_CREDENTIAL).is_some() {
        return Some(CERTIFICATE_CREDENTIAL.to_string());
    }
    None
}
