//! Orchestration engine
//!
//! Maps configuration records onto flow lifecycle calls: derive the flow
//! name, build the template arguments, then drive the engine. Driver errors
//! are passed through unchanged.

use crate::config::SourcesConfig;
use crate::orchestration::arguments::{build_arguments, ArgumentSet};
use crate::orchestration::driver::{FlowDriver, InstanceHandle};
use crate::orchestration::error::OrchestrationError;
use crate::orchestration::naming::{flow_name, is_legacy_name};
use crate::orchestration::record::ConfigRecord;
use crate::orchestration::template::TemplateKind;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Drives flow instances for configuration records
#[derive(Clone)]
pub struct Orchestrator {
    driver: Arc<dyn FlowDriver>,
    sources: SourcesConfig,
}

impl Orchestrator {
    /// Create an orchestrator over a driver
    pub fn new(driver: Arc<dyn FlowDriver>, sources: SourcesConfig) -> Self {
        Self { driver, sources }
    }

    /// Underlying driver
    pub fn driver(&self) -> &Arc<dyn FlowDriver> {
        &self.driver
    }

    /// Arguments the flow of `record` would be deployed with
    ///
    /// The record's own site wins over the deployment-wide one.
    pub fn arguments_for(
        &self,
        record: &ConfigRecord,
        id: &str,
    ) -> Result<ArgumentSet, OrchestrationError> {
        let site = record.site().or(self.sources.site_id.as_deref());
        build_arguments(record, id, site, &self.sources)
    }

    /// Deploy and start the flow of a new record
    pub async fn activate(
        &self,
        record: &ConfigRecord,
        id: &str,
    ) -> Result<InstanceHandle, OrchestrationError> {
        let name = flow_name(record, id);
        let template = TemplateKind::for_record(record);
        // Arguments first: a bad record must not touch the engine
        let arguments = self.arguments_for(record, id)?;

        self.driver.authenticate().await?;
        info!(flow = %name, record_id = %id, template = %template, "Activating flow");
        debug!(flow = %name, arguments = ?arguments, "Flow arguments");

        let handle = self
            .driver
            .instantiate(&name, template, &arguments)
            .await
            .map_err(|e| {
                error!(flow = %name, error = %e, "Activation failed");
                e
            })?;
        info!(flow = %name, instance_id = %handle.id, "Flow running");
        Ok(handle)
    }

    /// Push the current state of a record into its running flow
    pub async fn reconcile(
        &self,
        record: &ConfigRecord,
        id: &str,
    ) -> Result<InstanceHandle, OrchestrationError> {
        let name = flow_name(record, id);
        let arguments = self.arguments_for(record, id)?;

        self.driver.authenticate().await?;
        info!(flow = %name, record_id = %id, "Reconciling flow");
        debug!(flow = %name, arguments = ?arguments, "Flow arguments");

        self.driver.reconcile(&name, &arguments).await.map_err(|e| {
            error!(flow = %name, error = %e, "Reconcile failed");
            e
        })
    }

    /// Stop and remove the flow of a record
    pub async fn deactivate(
        &self,
        record: &ConfigRecord,
        id: &str,
    ) -> Result<(), OrchestrationError> {
        let name = flow_name(record, id);

        self.driver.authenticate().await?;
        info!(flow = %name, record_id = %id, "Deactivating flow");

        self.driver.deactivate(&name).await.map_err(|e| {
            warn!(flow = %name, error = %e, "Deactivate failed");
            e
        })
    }

    /// Whether moving a record from `current` to `next` needs a new flow
    /// instance instead of a reconcile
    ///
    /// The instance name and its template are fixed once deployed.
    pub fn requires_redeploy(current: &ConfigRecord, next: &ConfigRecord, id: &str) -> bool {
        flow_name(current, id) != flow_name(next, id)
            || TemplateKind::for_record(current) != TemplateKind::for_record(next)
    }

    /// Replace the flow of `current` with a new one deployed for `next`
    ///
    /// When the new flow cannot be deployed, the previous one is deployed
    /// again and the deployment error is returned.
    pub async fn redeploy(
        &self,
        current: &ConfigRecord,
        next: &ConfigRecord,
        id: &str,
    ) -> Result<InstanceHandle, OrchestrationError> {
        self.arguments_for(next, id)?;
        let previous = flow_name(current, id);
        info!(
            from = %previous,
            to = %flow_name(next, id),
            record_id = %id,
            "Redeploying flow"
        );

        let existed = match self.deactivate(current, id).await {
            Ok(()) => true,
            Err(OrchestrationError::InstanceNotFound(_)) => {
                warn!(flow = %previous, "Previous flow already absent");
                false
            }
            Err(e) => return Err(e),
        };

        match self.activate(next, id).await {
            Ok(handle) => Ok(handle),
            Err(e) => {
                if existed {
                    match self.activate(current, id).await {
                        Ok(_) => warn!(flow = %previous, "Previous flow restored"),
                        Err(restore) => {
                            error!(flow = %previous, error = %restore, "Failed to restore previous flow")
                        }
                    }
                }
                Err(e)
            }
        }
    }

    /// Renew the engine access token
    pub async fn renew_credentials(&self) -> Result<(), OrchestrationError> {
        self.driver.authenticate().await?;
        debug!("Flow engine token renewed");
        Ok(())
    }

    /// Block until the engine accepts a login
    ///
    /// Only transient failures are retried, `delay` apart; the last error
    /// is returned once `max_attempts` logins have failed.
    pub async fn wait_for_engine(
        &self,
        delay: Duration,
        max_attempts: u32,
    ) -> Result<(), OrchestrationError> {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.driver.authenticate().await {
                Ok(()) => {
                    info!(attempt, "Flow engine login succeeded");
                    return Ok(());
                }
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    warn!(
                        attempt,
                        max_attempts,
                        error = %e,
                        "Flow engine not ready, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(attempt, error = %e, "Flow engine login failed");
                    return Err(e);
                }
            }
        }
    }

    /// Report flow instances still named with the content-hash scheme
    ///
    /// Returns the offending names; nothing is removed.
    pub async fn audit_legacy_instances(&self) -> Result<Vec<String>, OrchestrationError> {
        self.driver.authenticate().await?;
        let legacy: Vec<String> = self
            .driver
            .instance_names()
            .await?
            .into_iter()
            .filter(|name| is_legacy_name(name))
            .collect();

        for name in &legacy {
            warn!(
                flow = %name,
                "Flow instance uses the legacy content-hash name and is no longer managed; remove it manually"
            );
        }
        if legacy.is_empty() {
            debug!("No legacy flow instances found");
        }
        Ok(legacy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::memory::{DriverCall, InMemoryFlowDriver};
    use crate::orchestration::record::MetricConfig;
    use std::collections::BTreeMap;

    fn sources() -> SourcesConfig {
        SourcesConfig {
            site_id: Some("site1".to_string()),
            prometheus_uri: Some("http://prometheus:9090/api/v1/query".to_string()),
            kafka_endpoint: Some("kafka:9092".to_string()),
            ..Default::default()
        }
    }

    fn record(operation: Option<&str>) -> ConfigRecord {
        ConfigRecord::Metric(MetricConfig {
            site: None,
            name: "up".to_string(),
            labels: BTreeMap::from([("instance".to_string(), "node:9100".to_string())]),
            operation: operation.map(str::to_string),
            interval: 10000,
            description: String::new(),
        })
    }

    #[tokio::test]
    async fn test_activate_uses_flow_name_and_site() {
        let driver = Arc::new(InMemoryFlowDriver::new());
        let orchestrator = Orchestrator::new(driver.clone(), sources());

        let handle = orchestrator.activate(&record(None), "abc123").await.unwrap();
        assert_eq!(handle.name, "up:abc123");

        let snapshot = driver.instance("up:abc123").unwrap();
        assert_eq!(snapshot.template, TemplateKind::MetricSource);
        assert_eq!(
            snapshot.parameters.get("sink_topic"),
            Some("site1-up-node_9100-abc123")
        );
    }

    #[tokio::test]
    async fn test_invalid_operation_never_reaches_driver() {
        let driver = Arc::new(InMemoryFlowDriver::new());
        let orchestrator = Orchestrator::new(driver.clone(), sources());

        let result = orchestrator
            .activate(&record(Some("rate 1m extra")), "abc123")
            .await;
        assert!(matches!(
            result,
            Err(OrchestrationError::InvalidConfiguration(_))
        ));
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    async fn test_wait_for_engine_retries_transient_failures() {
        let driver = Arc::new(InMemoryFlowDriver::new().with_unreachable_attempts(2));
        let orchestrator = Orchestrator::new(driver.clone(), sources());

        orchestrator
            .wait_for_engine(Duration::from_millis(1), 5)
            .await
            .unwrap();
        assert_eq!(driver.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_wait_for_engine_gives_up_at_ceiling() {
        let driver = Arc::new(InMemoryFlowDriver::new().with_unreachable_attempts(10));
        let orchestrator = Orchestrator::new(driver.clone(), sources());

        let result = orchestrator.wait_for_engine(Duration::from_millis(1), 3).await;
        assert!(matches!(result, Err(OrchestrationError::EngineUnreachable(_))));
        assert_eq!(
            driver.calls(),
            vec![DriverCall::Authenticate; 3]
        );
    }

    #[test]
    fn test_requires_redeploy_on_name_change_only() {
        let current = record(None);
        assert!(!Orchestrator::requires_redeploy(&current, &record(Some("rate 1m")), "id"));

        let mut renamed = current.clone();
        if let ConfigRecord::Metric(metric) = &mut renamed {
            metric.name = "node_load1".to_string();
        }
        assert!(Orchestrator::requires_redeploy(&current, &renamed, "id"));
    }

    #[tokio::test]
    async fn test_renew_credentials_restores_token() {
        let driver = Arc::new(InMemoryFlowDriver::new());
        let orchestrator = Orchestrator::new(driver.clone(), sources());
        orchestrator.activate(&record(None), "abc123").await.unwrap();

        driver.expire_token();
        orchestrator.renew_credentials().await.unwrap();
        assert!(driver.instance_names().await.is_ok());
    }

    #[tokio::test]
    async fn test_audit_reports_without_deleting() {
        let driver = Arc::new(
            InMemoryFlowDriver::new()
                .with_existing_instance("up:0123456789abcdef0123456789abcdef", TemplateKind::MetricSource)
                .with_existing_instance("up:abc123", TemplateKind::MetricSource),
        );
        let orchestrator = Orchestrator::new(driver.clone(), sources());

        let legacy = orchestrator.audit_legacy_instances().await.unwrap();
        assert_eq!(legacy, vec!["up:0123456789abcdef0123456789abcdef".to_string()]);
        assert_eq!(driver.instance_count(), 2);
    }
}
