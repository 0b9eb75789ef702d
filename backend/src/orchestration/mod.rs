//! Flow lifecycle orchestration
//!
//! Turns configuration records into running flow instances on an external
//! flow engine and keeps them in step with the records.

pub mod arguments;
pub mod driver;
pub mod engine;
pub mod error;
pub mod memory;
pub mod naming;
pub mod record;
pub mod template;

pub use arguments::{build_arguments, ArgumentSet};
pub use driver::{FlowDriver, InstanceHandle, ScheduleOutcome, POLLING_PROCESSOR_MARKER};
pub use engine::Orchestrator;
pub use error::OrchestrationError;
pub use memory::InMemoryFlowDriver;
pub use naming::{flow_name, is_legacy_name};
pub use record::{
    ConfigRecord, LocationConfig, LocationMode, LocationPatch, MetricConfig, MetricPatch,
    RecordId, RecordKind, RecordPatch,
};
pub use template::TemplateKind;
