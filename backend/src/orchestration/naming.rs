//! Flow instance naming
//!
//! A flow instance is found again by its name alone, so the name must be a
//! pure function of the record kind name and the record identifier.

use crate::orchestration::record::ConfigRecord;

/// Separator between the kind name and the record identifier
pub const NAME_SEPARATOR: char = ':';

/// Length of the hex digest used by the superseded content-hash scheme
const LEGACY_DIGEST_LEN: usize = 32;

/// Flow instance name for a record: `<name>:<identifier>`
///
/// Labels never take part in the name, so editing or reordering them keeps
/// the identity stable.
pub fn flow_name(record: &ConfigRecord, id: &str) -> String {
    format!("{}{}{}", record.name(), NAME_SEPARATOR, id)
}

/// Whether a flow name was produced by the superseded content-hash scheme
/// (`<name>:<32 lowercase hex digits>`)
///
/// Identifiers issued by the store are hyphenated UUIDs, so a current-scheme
/// name never has this shape.
pub fn is_legacy_name(name: &str) -> bool {
    match name.rsplit_once(NAME_SEPARATOR) {
        Some((prefix, suffix)) => {
            !prefix.is_empty()
                && suffix.len() == LEGACY_DIGEST_LEN
                && suffix
                    .chars()
                    .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::record::{LocationConfig, LocationMode, MetricConfig};
    use std::collections::BTreeMap;

    fn metric(labels: &[(&str, &str)]) -> ConfigRecord {
        ConfigRecord::Metric(MetricConfig {
            site: None,
            name: "up".to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            operation: None,
            interval: 10000,
            description: String::new(),
        })
    }

    #[test]
    fn test_flow_name_scenario() {
        let record = metric(&[("instance", "node:9100")]);
        assert_eq!(flow_name(&record, "abc123"), "up:abc123");
    }

    #[test]
    fn test_flow_name_ignores_label_order_and_content() {
        let a = metric(&[("job", "node"), ("instance", "node:9100")]);
        let b = metric(&[("instance", "node:9100"), ("job", "node")]);
        let c = metric(&[]);
        assert_eq!(flow_name(&a, "id-1"), flow_name(&b, "id-1"));
        assert_eq!(flow_name(&a, "id-1"), flow_name(&c, "id-1"));
    }

    #[test]
    fn test_flow_name_distinct_identifiers() {
        let record = metric(&[]);
        assert_ne!(flow_name(&record, "id-1"), flow_name(&record, "id-2"));
    }

    #[test]
    fn test_location_flow_name() {
        let record = ConfigRecord::Location(LocationConfig {
            site: None,
            mode: LocationMode::Full,
            interval: 10000,
            description: String::new(),
        });
        assert_eq!(flow_name(&record, "abc123"), "location:abc123");
    }

    #[test]
    fn test_is_legacy_name() {
        assert!(is_legacy_name("up:0123456789abcdef0123456789abcdef"));
        assert!(is_legacy_name("node_cpu:seconds:0123456789abcdef0123456789abcdef"));
        assert!(!is_legacy_name("up:5f2b7a7e-3c1d-4e8a-9b0c-1d2e3f4a5b6c"));
        assert!(!is_legacy_name("up:abc123"));
        assert!(!is_legacy_name("up:0123456789ABCDEF0123456789ABCDEF"));
        assert!(!is_legacy_name(":0123456789abcdef0123456789abcdef"));
        assert!(!is_legacy_name("exporter-service"));
    }
}
