//! Integration tests for the flow lifecycle
//!
//! These tests drive the orchestrator against the in-memory flow engine:
//! 1. Activate / reconcile / deactivate state machine
//! 2. Error taxonomy for missing and duplicate instances
//! 3. Argument building failures that must not reach the engine

use std::collections::BTreeMap;
use std::sync::Arc;
use telemetry_orchestrator::config::{Secret, SourcesConfig};
use telemetry_orchestrator::orchestration::memory::DriverCall;
use telemetry_orchestrator::orchestration::{
    flow_name, ConfigRecord, InMemoryFlowDriver, LocationConfig, LocationMode, MetricConfig,
    OrchestrationError, Orchestrator, TemplateKind,
};

fn sources() -> SourcesConfig {
    SourcesConfig {
        site_id: Some("site1".to_string()),
        prometheus_uri: Some("http://prometheus:9090/api/v1/query".to_string()),
        kafka_endpoint: Some("kafka:9092".to_string()),
        ndac_get_uri: Some("http://ndac/ues".to_string()),
        ndac_post_uri: Some("http://ndac/location".to_string()),
        ndac_password: Some(Secret::new("ndac-secret")),
        keystore_password: None,
    }
}

fn metric(labels: &[(&str, &str)], operation: Option<&str>, interval: u64) -> ConfigRecord {
    ConfigRecord::Metric(MetricConfig {
        site: None,
        name: "up".to_string(),
        labels: labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
        operation: operation.map(str::to_string),
        interval,
        description: "UP metric".to_string(),
    })
}

fn setup() -> (Arc<InMemoryFlowDriver>, Orchestrator) {
    let driver = Arc::new(InMemoryFlowDriver::new());
    let orchestrator = Orchestrator::new(driver.clone(), sources());
    (driver, orchestrator)
}

/// Scenario: `up` with an instance label, identifier `abc123`
#[tokio::test]
async fn test_activate_scenario() {
    let (driver, orchestrator) = setup();
    let record = metric(&[("instance", "node:9100")], None, 10000);

    let handle = orchestrator.activate(&record, "abc123").await.unwrap();
    assert_eq!(handle.name, "up:abc123");
    assert_eq!(flow_name(&record, "abc123"), handle.name);

    let instance = driver.instance("up:abc123").unwrap();
    assert!(instance.running);
    assert!(instance.services_enabled);
    assert_eq!(instance.schedule_ms, Some(10000));
    assert_eq!(
        instance.parameters.get("prometheus_request"),
        Some("http://prometheus:9090/api/v1/query?query=up{instance='node:9100'}")
    );
    assert_eq!(
        instance.parameters.get("sink_topic"),
        Some("site1-up-node_9100-abc123")
    );
}

#[tokio::test]
async fn test_activate_then_deactivate_leaves_nothing() {
    let (driver, orchestrator) = setup();
    let record = metric(&[], None, 10000);

    orchestrator.activate(&record, "id-1").await.unwrap();
    orchestrator.deactivate(&record, "id-1").await.unwrap();
    assert_eq!(driver.instance_count(), 0);

    match orchestrator.deactivate(&record, "id-1").await {
        Err(OrchestrationError::InstanceNotFound(name)) => assert_eq!(name, "up:id-1"),
        other => panic!("expected InstanceNotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_activate_twice_is_duplicate() {
    let (driver, orchestrator) = setup();
    let record = metric(&[], None, 10000);

    orchestrator.activate(&record, "id-1").await.unwrap();
    assert!(matches!(
        orchestrator.activate(&record, "id-1").await,
        Err(OrchestrationError::DuplicateInstance(_))
    ));
    assert_eq!(driver.instance_count(), 1);
}

#[tokio::test]
async fn test_same_metric_distinct_ids_coexist() {
    let (driver, orchestrator) = setup();
    let record = metric(&[("job", "node")], None, 10000);

    orchestrator.activate(&record, "id-1").await.unwrap();
    orchestrator.activate(&record, "id-2").await.unwrap();
    assert_eq!(driver.instance_count(), 2);
}

#[tokio::test]
async fn test_reconcile_updates_running_instance() {
    let (driver, orchestrator) = setup();
    let original = metric(&[], None, 10000);
    let handle = orchestrator.activate(&original, "id-1").await.unwrap();

    let updated = metric(&[("job", "node")], Some("rate 1m"), 5000);
    let reconciled = orchestrator.reconcile(&updated, "id-1").await.unwrap();
    assert_eq!(reconciled, handle);

    let instance = driver.instance("up:id-1").unwrap();
    assert!(instance.running);
    assert_eq!(instance.schedule_ms, Some(5000));
    assert_eq!(
        instance.parameters.get("prometheus_request"),
        Some("http://prometheus:9090/api/v1/query?query=rate(up{job='node'}[1m])")
    );
    assert_eq!(instance.parameters.get("sink_topic"), Some("site1-rate-up-id-1"));
}

#[tokio::test]
async fn test_reconcile_unchanged_is_idempotent() {
    let (driver, orchestrator) = setup();
    let record = metric(&[("job", "node")], None, 10000);
    orchestrator.activate(&record, "id-1").await.unwrap();
    let before = driver.instance("up:id-1").unwrap();

    orchestrator.reconcile(&record, "id-1").await.unwrap();
    orchestrator.reconcile(&record, "id-1").await.unwrap();

    assert_eq!(driver.instance("up:id-1").unwrap(), before);
    assert_eq!(driver.instance_count(), 1);
}

#[tokio::test]
async fn test_reconcile_missing_never_creates() {
    let (driver, orchestrator) = setup();
    let record = metric(&[], None, 10000);

    assert!(matches!(
        orchestrator.reconcile(&record, "ghost").await,
        Err(OrchestrationError::InstanceNotFound(_))
    ));
    assert_eq!(driver.instance_count(), 0);
}

#[tokio::test]
async fn test_invalid_operation_fails_before_driver() {
    let (driver, orchestrator) = setup();
    let record = metric(&[], Some("rate 1m extra"), 10000);

    assert!(matches!(
        orchestrator.activate(&record, "id-1").await,
        Err(OrchestrationError::InvalidConfiguration(_))
    ));
    assert!(matches!(
        orchestrator.reconcile(&record, "id-1").await,
        Err(OrchestrationError::InvalidConfiguration(_))
    ));
    assert!(driver.calls().is_empty());
}

#[tokio::test]
async fn test_every_operation_authenticates_first() {
    let (driver, orchestrator) = setup();
    let record = metric(&[], None, 10000);

    orchestrator.activate(&record, "id-1").await.unwrap();
    driver.expire_token();
    orchestrator.reconcile(&record, "id-1").await.unwrap();
    driver.expire_token();
    orchestrator.deactivate(&record, "id-1").await.unwrap();

    assert_eq!(
        driver.calls(),
        vec![
            DriverCall::Authenticate,
            DriverCall::Instantiate("up:id-1".to_string()),
            DriverCall::Authenticate,
            DriverCall::Reconcile("up:id-1".to_string()),
            DriverCall::Authenticate,
            DriverCall::Deactivate("up:id-1".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_location_modes_pick_templates() {
    let (driver, orchestrator) = setup();
    let full = ConfigRecord::Location(LocationConfig {
        site: None,
        mode: LocationMode::Full,
        interval: 15000,
        description: String::new(),
    });
    let simple = ConfigRecord::Location(LocationConfig {
        site: None,
        mode: LocationMode::Simple,
        interval: 15000,
        description: String::new(),
    });

    orchestrator.activate(&full, "loc-1").await.unwrap();
    orchestrator.activate(&simple, "loc-2").await.unwrap();

    let full_instance = driver.instance("location:loc-1").unwrap();
    assert_eq!(full_instance.template, TemplateKind::LocationSource);
    assert_eq!(full_instance.parameters.get("topic_icc_ids"), Some("icc-ids-loc-1"));
    assert_eq!(full_instance.parameters.get("request_password"), Some("ndac-secret"));

    let simple_instance = driver.instance("location:loc-2").unwrap();
    assert_eq!(simple_instance.template, TemplateKind::SimpleLocationSource);
    assert!(simple_instance.parameters.get("topic_icc_ids").is_none());
    assert_eq!(
        simple_instance.parameters.get("topic_icc_info"),
        Some("icc-info-loc-2")
    );
}

#[tokio::test]
async fn test_missing_template_is_upstream_dependency() {
    let driver = Arc::new(InMemoryFlowDriver::new().without_template(TemplateKind::MetricSource));
    let orchestrator = Orchestrator::new(driver.clone(), sources());

    assert!(matches!(
        orchestrator.activate(&metric(&[], None, 10000), "id-1").await,
        Err(OrchestrationError::UpstreamDependencyMissing(_))
    ));
    assert_eq!(driver.instance_count(), 0);
}

#[tokio::test]
async fn test_missing_endpoint_is_invalid_configuration() {
    let mut sources = sources();
    sources.ndac_get_uri = None;
    let driver = Arc::new(InMemoryFlowDriver::new());
    let orchestrator = Orchestrator::new(driver.clone(), sources);
    let record = ConfigRecord::Location(LocationConfig {
        site: None,
        mode: LocationMode::Full,
        interval: 15000,
        description: String::new(),
    });

    assert!(matches!(
        orchestrator.activate(&record, "loc-1").await,
        Err(OrchestrationError::InvalidConfiguration(_))
    ));
    assert!(driver.calls().is_empty());
}

#[tokio::test]
async fn test_schedule_not_applicable_still_runs() {
    let driver = Arc::new(InMemoryFlowDriver::new().without_polling_processor());
    let orchestrator = Orchestrator::new(driver.clone(), sources());

    orchestrator
        .activate(&metric(&[], None, 10000), "id-1")
        .await
        .unwrap();
    let instance = driver.instance("up:id-1").unwrap();
    assert!(instance.running);
    assert_eq!(instance.schedule_ms, None);
}

fn location(mode: LocationMode) -> ConfigRecord {
    ConfigRecord::Location(LocationConfig {
        site: None,
        mode,
        interval: 15000,
        description: String::new(),
    })
}

#[tokio::test]
async fn test_redeploy_replaces_instance_under_new_template() {
    let (driver, orchestrator) = setup();
    let full = location(LocationMode::Full);
    let simple = location(LocationMode::Simple);
    assert!(Orchestrator::requires_redeploy(&full, &simple, "loc-1"));

    orchestrator.activate(&full, "loc-1").await.unwrap();
    let handle = orchestrator.redeploy(&full, &simple, "loc-1").await.unwrap();
    assert_eq!(handle.name, "location:loc-1");

    let instance = driver.instance("location:loc-1").unwrap();
    assert_eq!(instance.template, TemplateKind::SimpleLocationSource);
    assert!(instance.parameters.get("topic_icc_ids").is_none());
    assert_eq!(driver.instance_count(), 1);
}

#[tokio::test]
async fn test_redeploy_restores_previous_flow_on_failure() {
    let driver =
        Arc::new(InMemoryFlowDriver::new().without_template(TemplateKind::SimpleLocationSource));
    let orchestrator = Orchestrator::new(driver.clone(), sources());
    let full = location(LocationMode::Full);

    orchestrator.activate(&full, "loc-1").await.unwrap();
    let result = orchestrator
        .redeploy(&full, &location(LocationMode::Simple), "loc-1")
        .await;
    assert!(matches!(
        result,
        Err(OrchestrationError::UpstreamDependencyMissing(_))
    ));

    let instance = driver.instance("location:loc-1").unwrap();
    assert_eq!(instance.template, TemplateKind::LocationSource);
    assert_eq!(instance.parameters.get("topic_icc_ids"), Some("icc-ids-loc-1"));
    assert!(instance.running);
}

#[tokio::test]
async fn test_redeploy_without_previous_flow_does_not_resurrect_it() {
    let driver = Arc::new(
        InMemoryFlowDriver::new()
            .with_existing_instance("node_load1:id-1", TemplateKind::MetricSource),
    );
    let orchestrator = Orchestrator::new(driver.clone(), sources());
    let current = metric(&[], None, 10000);
    let mut renamed = current.clone();
    if let ConfigRecord::Metric(m) = &mut renamed {
        m.name = "node_load1".to_string();
    }

    let result = orchestrator.redeploy(&current, &renamed, "id-1").await;
    assert!(matches!(result, Err(OrchestrationError::DuplicateInstance(_))));
    assert!(driver.instance("up:id-1").is_none());
    assert_eq!(driver.instance_count(), 1);
}
