//! Flow template kinds
//!
//! Static mapping from configuration kind to the NiFi template deployed for it.

use crate::orchestration::error::OrchestrationError;
use crate::orchestration::record::{ConfigRecord, LocationMode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Templates the orchestrator knows how to instantiate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemplateKind {
    /// Prometheus query → Kafka
    MetricSource,
    /// NDAC identifiers + location details → two Kafka topics
    LocationSource,
    /// NDAC location details → one Kafka topic
    SimpleLocationSource,
}

impl TemplateKind {
    /// Every known template kind
    pub const ALL: [TemplateKind; 3] = [
        TemplateKind::MetricSource,
        TemplateKind::LocationSource,
        TemplateKind::SimpleLocationSource,
    ];

    /// Template name as uploaded to NiFi
    pub fn template_name(&self) -> &'static str {
        match self {
            TemplateKind::MetricSource => "MetricSource",
            TemplateKind::LocationSource => "NDACSource",
            TemplateKind::SimpleLocationSource => "NDACSourceSimple",
        }
    }

    /// Template serving a record
    pub fn for_record(record: &ConfigRecord) -> Self {
        match record {
            ConfigRecord::Metric(_) => TemplateKind::MetricSource,
            ConfigRecord::Location(location) => match location.mode {
                LocationMode::Full => TemplateKind::LocationSource,
                LocationMode::Simple => TemplateKind::SimpleLocationSource,
            },
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.template_name())
    }
}

impl FromStr for TemplateKind {
    type Err = OrchestrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TemplateKind::ALL
            .into_iter()
            .find(|kind| kind.template_name() == s)
            .ok_or_else(|| {
                OrchestrationError::InvalidConfiguration(format!("Unknown template kind: {}", s))
            })
    }
}
