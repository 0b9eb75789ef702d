//! Flow argument building
//!
//! Turns a configuration record into the flat parameter set a template
//! expects. Building is pure: no I/O, and the only failure is
//! [`OrchestrationError::InvalidConfiguration`].

use crate::config::SourcesConfig;
use crate::orchestration::error::OrchestrationError;
use crate::orchestration::record::{
    ConfigRecord, LocationConfig, LocationMode, MetricConfig, Operation,
};
use std::collections::BTreeMap;
use std::fmt;

/// Poll period in milliseconds
pub const INTERVAL: &str = "interval";
/// Full Prometheus request URL
pub const PROMETHEUS_REQUEST: &str = "prometheus_request";
/// Kafka bootstrap endpoint
pub const SINK_BROKER_URL: &str = "sink_broker_url";
/// Destination topic of a metric flow
pub const SINK_TOPIC: &str = "sink_topic";
/// NDAC identifiers endpoint
pub const NDAC_GET_URL: &str = "ndac_get_url";
/// NDAC location details endpoint
pub const NDAC_POST_URL: &str = "ndac_post_url";
/// Destination topic for raw UE identifiers
pub const TOPIC_ICC_IDS: &str = "topic_icc_ids";
/// Destination topic for enriched UE information
pub const TOPIC_ICC_INFO: &str = "topic_icc_info";
/// Credential sent with source requests
pub const REQUEST_CREDENTIAL: &str = "request_password";
/// Credential unlocking the TLS keystore
pub const CERTIFICATE_CREDENTIAL: &str = "keystore_password";

/// Keys whose values are bound as sensitive parameters
pub const CONFIDENTIAL_KEYS: [&str; 2] = [REQUEST_CREDENTIAL, CERTIFICATE_CREDENTIAL];

/// Named arguments for one flow instance
///
/// Keys iterate in sorted order so two sets built from the same record
/// compare and serialize identically.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ArgumentSet(BTreeMap<String, String>);

impl ArgumentSet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an argument
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Look up an argument
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Iterate arguments in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of arguments
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no argument is set
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Poll period, when the set carries a valid one
    pub fn interval_ms(&self) -> Option<u64> {
        self.get(INTERVAL).and_then(|v| v.parse().ok())
    }

    /// Whether a key must be bound as a sensitive parameter
    pub fn is_confidential(key: &str) -> bool {
        CONFIDENTIAL_KEYS.contains(&key)
    }
}

impl fmt::Debug for ArgumentSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.iter().map(|(k, v)| {
                let shown = if Self::is_confidential(k) { "****" } else { v.as_str() };
                (k, shown)
            }))
            .finish()
    }
}

/// Build the arguments for a record
///
/// `site` is the tenant segment used in topic names; callers pass the
/// record's own site, falling back to the deployment-wide one.
pub fn build_arguments(
    record: &ConfigRecord,
    id: &str,
    site: Option<&str>,
    sources: &SourcesConfig,
) -> Result<ArgumentSet, OrchestrationError> {
    record.validate()?;
    match record {
        ConfigRecord::Metric(metric) => build_metric_arguments(metric, id, site, sources),
        ConfigRecord::Location(location) => build_location_arguments(location, id, sources),
    }
}

fn required<'a>(value: &'a Option<String>, what: &str) -> Result<&'a str, OrchestrationError> {
    value.as_deref().ok_or_else(|| {
        OrchestrationError::InvalidConfiguration(format!("{} is not configured", what))
    })
}

fn build_metric_arguments(
    metric: &MetricConfig,
    id: &str,
    site: Option<&str>,
    sources: &SourcesConfig,
) -> Result<ArgumentSet, OrchestrationError> {
    let prometheus = required(&sources.prometheus_uri, "PROMETHEUS_URI")?;
    let broker = required(&sources.kafka_endpoint, "KAFKA_ENDPOINT")?;
    let operation = metric.operation.as_deref().map(Operation::parse).transpose()?;

    let query = render_query(&metric.name, &metric.labels, operation.as_ref());

    let mut args = ArgumentSet::new();
    args.insert(INTERVAL, metric.interval.to_string());
    args.insert(PROMETHEUS_REQUEST, format!("{}?query={}", prometheus, query));
    args.insert(SINK_BROKER_URL, broker);
    args.insert(
        SINK_TOPIC,
        metric_topic(site, operation.as_ref(), metric, id),
    );
    if let Some(keystore) = &sources.keystore_password {
        args.insert(CERTIFICATE_CREDENTIAL, keystore.expose());
    }
    Ok(args)
}

fn build_location_arguments(
    location: &LocationConfig,
    id: &str,
    sources: &SourcesConfig,
) -> Result<ArgumentSet, OrchestrationError> {
    let get_url = required(&sources.ndac_get_uri, "NDAC_URI_GET")?;
    let post_url = required(&sources.ndac_post_uri, "NDAC_URI_POST")?;
    let broker = required(&sources.kafka_endpoint, "KAFKA_ENDPOINT")?;

    let mut args = ArgumentSet::new();
    args.insert(INTERVAL, location.interval.to_string());
    args.insert(NDAC_GET_URL, get_url);
    args.insert(NDAC_POST_URL, post_url);
    args.insert(SINK_BROKER_URL, broker);
    if location.mode == LocationMode::Full {
        args.insert(TOPIC_ICC_IDS, format!("icc-ids-{}", id));
    }
    args.insert(TOPIC_ICC_INFO, format!("icc-info-{}", id));
    if let Some(password) = &sources.ndac_password {
        args.insert(REQUEST_CREDENTIAL, password.expose());
    }
    if let Some(keystore) = &sources.keystore_password {
        args.insert(CERTIFICATE_CREDENTIAL, keystore.expose());
    }
    Ok(args)
}

/// Render a PromQL instant query
///
/// `metric{a='x',b=~'y.*'}` with labels sorted by key; wrapped as
/// `fn(selector[window])` when an operation is given.
pub fn render_query(
    name: &str,
    labels: &BTreeMap<String, String>,
    operation: Option<&Operation<'_>>,
) -> String {
    let selector = if labels.is_empty() {
        name.to_string()
    } else {
        format!("{}{{{}}}", name, render_labels(labels))
    };
    match operation {
        Some(op) => format!("{}({}[{}])", op.function, selector, op.window),
        None => selector,
    }
}

fn render_labels(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(label, value)| match value.strip_prefix('~') {
            Some(pattern) => format!("{}=~{}", label, quote_label_value(pattern)),
            None => format!("{}={}", label, quote_label_value(value)),
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Single-quoted PromQL string literal; `'` and `\` are backslash-escaped
fn quote_label_value(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        if c == '\'' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('\'');
    quoted
}

/// `<site>-[<function>-]<name>[-<instance>]-<id>`
fn metric_topic(
    site: Option<&str>,
    operation: Option<&Operation<'_>>,
    metric: &MetricConfig,
    id: &str,
) -> String {
    let instance = metric
        .labels
        .get("instance")
        .filter(|value| !value.starts_with('~'));

    let segments: Vec<&str> = site
        .into_iter()
        .chain(operation.map(|op| op.function))
        .chain(std::iter::once(metric.name.as_str()))
        .chain(instance.map(String::as_str))
        .chain(std::iter::once(id))
        .collect();

    segments
        .iter()
        .map(|segment| topic_segment(segment))
        .collect::<Vec<_>>()
        .join("-")
}

/// Kafka topic names accept `[a-zA-Z0-9._-]` only
fn topic_segment(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Secret;

    fn sources() -> SourcesConfig {
        SourcesConfig {
            site_id: Some("site1".to_string()),
            prometheus_uri: Some("http://prometheus:9090/api/v1/query".to_string()),
            kafka_endpoint: Some("kafka:9092".to_string()),
            ndac_get_uri: Some("http://ndac/ues".to_string()),
            ndac_post_uri: Some("http://ndac/location".to_string()),
            ndac_password: None,
            keystore_password: None,
        }
    }

    fn metric(labels: &[(&str, &str)], operation: Option<&str>) -> MetricConfig {
        MetricConfig {
            site: None,
            name: "up".to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            operation: operation.map(str::to_string),
            interval: 10000,
            description: String::new(),
        }
    }

    fn query_of(args: &ArgumentSet) -> &str {
        let request = args.get(PROMETHEUS_REQUEST).unwrap();
        request.split_once("?query=").unwrap().1
    }

    #[test]
    fn test_query_without_labels_or_operation() {
        let record = ConfigRecord::Metric(metric(&[], None));
        let args = build_arguments(&record, "abc123", Some("site1"), &sources()).unwrap();
        assert_eq!(
            args.get(PROMETHEUS_REQUEST),
            Some("http://prometheus:9090/api/v1/query?query=up")
        );
    }

    #[test]
    fn test_rate_without_labels() {
        let record = ConfigRecord::Metric(metric(&[], Some("rate 1m")));
        let args = build_arguments(&record, "abc123", None, &sources()).unwrap();
        assert_eq!(query_of(&args), "rate(up[1m])");
    }

    #[test]
    fn test_rate_with_label() {
        let record = ConfigRecord::Metric(metric(&[("job", "x")], Some("rate 1m")));
        let args = build_arguments(&record, "abc123", None, &sources()).unwrap();
        assert_eq!(query_of(&args), "rate(up{job='x'}[1m])");
    }

    #[test]
    fn test_many_labels_are_sorted() {
        let record = ConfigRecord::Metric(metric(
            &[("job", "node"), ("instance", "node:9100"), ("env", "prod")],
            None,
        ));
        let args = build_arguments(&record, "abc123", None, &sources()).unwrap();
        assert_eq!(
            query_of(&args),
            "up{env='prod',instance='node:9100',job='node'}"
        );
    }

    #[test]
    fn test_label_order_does_not_change_query() {
        let a = ConfigRecord::Metric(metric(&[("job", "node"), ("instance", "a")], None));
        let b = ConfigRecord::Metric(metric(&[("instance", "a"), ("job", "node")], None));
        let args_a = build_arguments(&a, "id", None, &sources()).unwrap();
        let args_b = build_arguments(&b, "id", None, &sources()).unwrap();
        assert_eq!(args_a.get(PROMETHEUS_REQUEST), args_b.get(PROMETHEUS_REQUEST));
        assert_eq!(args_a, args_b);
    }

    #[test]
    fn test_wildcard_label_uses_regex_match() {
        let record = ConfigRecord::Metric(metric(&[("instance", "~node.*")], None));
        let args = build_arguments(&record, "abc123", None, &sources()).unwrap();
        let query = query_of(&args);
        assert_eq!(query, "up{instance=~'node.*'}");
        assert!(!query.contains("'~"));
    }

    #[test]
    fn test_label_values_are_escaped() {
        let labels = BTreeMap::from([
            ("instance".to_string(), "~node\\d+".to_string()),
            ("owner".to_string(), "o'brien".to_string()),
        ]);
        assert_eq!(
            render_query("up", &labels, None),
            r"up{instance=~'node\\d+',owner='o\'brien'}"
        );
    }

    #[test]
    fn test_topic_with_site_operation_and_instance() {
        let record = ConfigRecord::Metric(metric(&[("instance", "node:9100")], Some("rate 1m")));
        let args = build_arguments(&record, "abc123", Some("site1"), &sources()).unwrap();
        assert_eq!(args.get(SINK_TOPIC), Some("site1-rate-up-node_9100-abc123"));
    }

    #[test]
    fn test_topic_skips_wildcard_instance_and_missing_site() {
        let record = ConfigRecord::Metric(metric(&[("instance", "~node.*")], None));
        let args = build_arguments(&record, "abc123", None, &sources()).unwrap();
        assert_eq!(args.get(SINK_TOPIC), Some("up-abc123"));
    }

    #[test]
    fn test_metric_arguments_complete() {
        let record = ConfigRecord::Metric(metric(&[], None));
        let args = build_arguments(&record, "abc123", Some("site1"), &sources()).unwrap();
        assert_eq!(args.get(INTERVAL), Some("10000"));
        assert_eq!(args.interval_ms(), Some(10000));
        assert_eq!(args.get(SINK_BROKER_URL), Some("kafka:9092"));
        assert_eq!(args.len(), 4);
    }

    #[test]
    fn test_three_token_operation_rejected() {
        let record = ConfigRecord::Metric(metric(&[], Some("rate 1m extra")));
        match build_arguments(&record, "abc123", None, &sources()) {
            Err(OrchestrationError::InvalidConfiguration(msg)) => assert!(msg.contains("two tokens")),
            other => panic!("expected InvalidConfiguration, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_prometheus_endpoint() {
        let mut sources = sources();
        sources.prometheus_uri = None;
        let record = ConfigRecord::Metric(metric(&[], None));
        assert!(matches!(
            build_arguments(&record, "abc123", None, &sources),
            Err(OrchestrationError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_location_full_arguments() {
        let record = ConfigRecord::Location(LocationConfig {
            site: None,
            mode: LocationMode::Full,
            interval: 15000,
            description: String::new(),
        });
        let args = build_arguments(&record, "abc123", None, &sources()).unwrap();
        assert_eq!(args.get(NDAC_GET_URL), Some("http://ndac/ues"));
        assert_eq!(args.get(NDAC_POST_URL), Some("http://ndac/location"));
        assert_eq!(args.get(TOPIC_ICC_IDS), Some("icc-ids-abc123"));
        assert_eq!(args.get(TOPIC_ICC_INFO), Some("icc-info-abc123"));
        assert_eq!(args.get(INTERVAL), Some("15000"));
    }

    #[test]
    fn test_location_simple_has_single_topic() {
        let record = ConfigRecord::Location(LocationConfig {
            site: None,
            mode: LocationMode::Simple,
            interval: 15000,
            description: String::new(),
        });
        let args = build_arguments(&record, "abc123", None, &sources()).unwrap();
        assert!(args.get(TOPIC_ICC_IDS).is_none());
        assert_eq!(args.get(TOPIC_ICC_INFO), Some("icc-info-abc123"));
    }

    #[test]
    fn test_location_requires_ndac_endpoints() {
        let mut sources = sources();
        sources.ndac_post_uri = None;
        let record = ConfigRecord::Location(LocationConfig {
            site: None,
            mode: LocationMode::Full,
            interval: 15000,
            description: String::new(),
        });
        match build_arguments(&record, "abc123", None, &sources) {
            Err(OrchestrationError::InvalidConfiguration(msg)) => {
                assert!(msg.contains("NDAC_URI_POST"))
            }
            other => panic!("expected InvalidConfiguration, got {:?}", other),
        }
    }

    #[test]
    fn test_credentials_are_redacted_in_debug() {
        let mut sources = sources();
        sources.ndac_password = Some(Secret::new("ndac-secret"));
        sources.keystore_password = Some(Secret::new("ks-secret"));
        let record = ConfigRecord::Location(LocationConfig {
            site: None,
            mode: LocationMode::Full,
            interval: 15000,
            description: String::new(),
        });
        let args = build_arguments(&record, "abc123", None, &sources).unwrap();
        assert_eq!(args.get(REQUEST_CREDENTIAL), Some("ndac-secret"));
        assert_eq!(args.get(CERTIFICATE_CREDENTIAL), Some("ks-secret"));
        let printed = format!("{:?}", args);
        assert!(!printed.contains("ndac-secret"));
        assert!(!printed.contains("ks-secret"));
        assert!(printed.contains("icc-info-abc123"));
    }
}
