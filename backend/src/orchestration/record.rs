//! Configuration records
//!
//! The data-collection intents registered by operators. Records are owned by
//! the store; the orchestrator only reads them.

use crate::orchestration::error::OrchestrationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque record identifier assigned by the store
pub type RecordId = String;

/// Fixed kind name used for location records
pub const LOCATION_KIND: &str = "location";

/// Metric collection intent: poll a Prometheus query and publish it on Kafka
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricConfig {
    /// Site (tenant) the metric belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    /// Source metric name
    #[serde(alias = "metricname")]
    pub name: String,
    /// Label filter; iteration order is always sorted by key
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Optional aggregation, e.g. `"rate 1m"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// Poll period in milliseconds
    pub interval: u64,
    /// Free text
    #[serde(default)]
    pub description: String,
}

/// Which location template variant to deploy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationMode {
    /// Publishes raw identifiers and enriched information on two topics
    #[default]
    Full,
    /// Publishes enriched information on a single topic
    Simple,
}

/// UE location collection intent: poll the NDAC API and publish on Kafka
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Site (tenant) the intent belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    /// Template variant
    #[serde(default)]
    pub mode: LocationMode,
    /// Poll period in milliseconds
    pub interval: u64,
    /// Free text
    #[serde(default)]
    pub description: String,
}

/// Kind discriminator, used by the store to partition records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// [`MetricConfig`] records
    Metric,
    /// [`LocationConfig`] records
    Location,
}

impl RecordKind {
    /// Column value used by the store
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Metric => "metric",
            RecordKind::Location => "location",
        }
    }
}

/// A configuration record of any kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigRecord {
    /// Metric source intent
    Metric(MetricConfig),
    /// Location source intent
    Location(LocationConfig),
}

impl ConfigRecord {
    /// Kind of this record
    pub fn kind(&self) -> RecordKind {
        match self {
            ConfigRecord::Metric(_) => RecordKind::Metric,
            ConfigRecord::Location(_) => RecordKind::Location,
        }
    }

    /// Source name: the metric name, or the fixed location kind
    pub fn name(&self) -> &str {
        match self {
            ConfigRecord::Metric(metric) => &metric.name,
            ConfigRecord::Location(_) => LOCATION_KIND,
        }
    }

    /// Site the record belongs to, if any
    pub fn site(&self) -> Option<&str> {
        match self {
            ConfigRecord::Metric(metric) => metric.site.as_deref(),
            ConfigRecord::Location(location) => location.site.as_deref(),
        }
    }

    /// Fill in the site when the record carries none
    pub fn set_default_site(&mut self, site: Option<&str>) {
        let slot = match self {
            ConfigRecord::Metric(metric) => &mut metric.site,
            ConfigRecord::Location(location) => &mut location.site,
        };
        if slot.is_none() {
            *slot = site.map(str::to_string);
        }
    }

    /// Poll period in milliseconds
    pub fn interval(&self) -> u64 {
        match self {
            ConfigRecord::Metric(metric) => metric.interval,
            ConfigRecord::Location(location) => location.interval,
        }
    }

    /// Check the record invariants: positive interval, non-empty metric name
    /// and a two-token operation
    pub fn validate(&self) -> Result<(), OrchestrationError> {
        if self.interval() == 0 {
            return Err(OrchestrationError::InvalidConfiguration(
                "interval must be a positive number of milliseconds".to_string(),
            ));
        }
        if let ConfigRecord::Metric(metric) = self {
            if metric.name.trim().is_empty() {
                return Err(OrchestrationError::InvalidConfiguration(
                    "metric name cannot be empty".to_string(),
                ));
            }
            if let Some(operation) = &metric.operation {
                Operation::parse(operation)?;
            }
        }
        Ok(())
    }

    /// Apply a partial update, returning the merged record
    ///
    /// Fails when the patch targets a different record kind.
    pub fn patched(&self, patch: &RecordPatch) -> Result<ConfigRecord, OrchestrationError> {
        match (self, patch) {
            (ConfigRecord::Metric(metric), RecordPatch::Metric(p)) => {
                let mut merged = metric.clone();
                if let Some(site) = &p.site {
                    merged.site = Some(site.clone());
                }
                if let Some(name) = &p.name {
                    merged.name = name.clone();
                }
                if let Some(labels) = &p.labels {
                    merged.labels = labels.clone();
                }
                if let Some(operation) = &p.operation {
                    // An empty operation clears the aggregation
                    merged.operation = Some(operation.trim().to_string()).filter(|o| !o.is_empty());
                }
                if let Some(interval) = p.interval {
                    merged.interval = interval;
                }
                if let Some(description) = &p.description {
                    merged.description = description.clone();
                }
                Ok(ConfigRecord::Metric(merged))
            }
            (ConfigRecord::Location(location), RecordPatch::Location(p)) => {
                let mut merged = location.clone();
                if let Some(site) = &p.site {
                    merged.site = Some(site.clone());
                }
                if let Some(mode) = p.mode {
                    merged.mode = mode;
                }
                if let Some(interval) = p.interval {
                    merged.interval = interval;
                }
                if let Some(description) = &p.description {
                    merged.description = description.clone();
                }
                Ok(ConfigRecord::Location(merged))
            }
            _ => Err(OrchestrationError::InvalidConfiguration(format!(
                "cannot apply a {} update to a {} record",
                patch.kind().as_str(),
                self.kind().as_str()
            ))),
        }
    }
}

/// Partial update of a metric record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricPatch {
    /// New site
    pub site: Option<String>,
    /// New metric name
    #[serde(alias = "metricname")]
    pub name: Option<String>,
    /// Replacement label set
    pub labels: Option<BTreeMap<String, String>>,
    /// New operation; empty string clears it
    pub operation: Option<String>,
    /// New poll period
    pub interval: Option<u64>,
    /// New description
    pub description: Option<String>,
}

/// Partial update of a location record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationPatch {
    /// New site
    pub site: Option<String>,
    /// New template variant
    pub mode: Option<LocationMode>,
    /// New poll period
    pub interval: Option<u64>,
    /// New description
    pub description: Option<String>,
}

/// Partial update of any record kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordPatch {
    /// Metric update
    Metric(MetricPatch),
    /// Location update
    Location(LocationPatch),
}

impl RecordPatch {
    /// Kind this patch applies to
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordPatch::Metric(_) => RecordKind::Metric,
            RecordPatch::Location(_) => RecordKind::Location,
        }
    }

    /// True when the patch changes nothing
    pub fn is_empty(&self) -> bool {
        match self {
            RecordPatch::Metric(p) => *p == MetricPatch::default(),
            RecordPatch::Location(p) => *p == LocationPatch::default(),
        }
    }
}

/// Parsed aggregation expression: function and range window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation<'a> {
    /// Aggregation function, e.g. `rate`
    pub function: &'a str,
    /// Range window, e.g. `1m`
    pub window: &'a str,
}

impl<'a> Operation<'a> {
    /// Parse `"<function> <window>"`; any other token count is rejected
    pub fn parse(raw: &'a str) -> Result<Self, OrchestrationError> {
        let tokens: Vec<&str> = raw.split_whitespace().collect();
        match tokens.as_slice() {
            [function, window] => Ok(Self {
                function: *function,
                window: *window,
            }),
            _ => Err(OrchestrationError::InvalidConfiguration(format!(
                "operation '{}' must have exactly two tokens (function and window), found {}",
                raw,
                tokens.len()
            ))),
        }
    }
}
