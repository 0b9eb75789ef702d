//! NiFi REST API types
//!
//! Structs that mirror the subset of the NiFi REST API JSON format the
//! driver reads and writes. Unknown fields are ignored; missing optional
//! fields default.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Optimistic-locking revision carried by every mutable component
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    /// Current version
    #[serde(default)]
    pub version: i64,
    /// Client that last modified the component
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

/// Canvas coordinates
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    /// Horizontal offset
    pub x: f64,
    /// Vertical offset
    pub y: f64,
}

/// Reference from a process group to its parameter context
///
/// A reference without an id unbinds the context.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterContextReference {
    /// Context identifier; `null` unbinds
    #[serde(default)]
    pub id: Option<String>,
}

/// `GET /flow/process-groups/{id}`
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ProcessGroupFlowEntity {
    /// Flow of the group
    pub process_group_flow: ProcessGroupFlow,
}

/// Group identity and contents
#[derive(Deserialize, Debug, Clone)]
pub struct ProcessGroupFlow {
    /// Group identifier
    pub id: String,
    /// Direct children
    #[serde(default)]
    pub flow: FlowContents,
}

/// Components directly inside a group
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct FlowContents {
    /// Child process groups
    #[serde(default)]
    pub process_groups: Vec<ProcessGroupEntity>,
}

/// A process group with its revision
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ProcessGroupEntity {
    /// Group identifier
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Revision
    #[serde(default)]
    pub revision: Revision,
    /// Group details
    pub component: ProcessGroupComponent,
}

/// Process group details
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProcessGroupComponent {
    /// Group identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Group name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Canvas position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Bound parameter context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_context: Option<ParameterContextReference>,
}

/// A parameter context with its revision
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ParameterContextEntity {
    /// Context identifier
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Revision
    #[serde(default)]
    pub revision: Revision,
    /// Context details
    pub component: ParameterContextComponent,
}

/// Parameter context details
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ParameterContextComponent {
    /// Context name
    #[serde(default)]
    pub name: String,
    /// Parameters
    #[serde(default)]
    pub parameters: Vec<ParameterEntity>,
}

/// Wrapper around one parameter
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ParameterEntity {
    /// The parameter
    pub parameter: Parameter,
}

/// A named parameter value
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Stored as sensitive (write-only)
    #[serde(default)]
    pub sensitive: bool,
    /// Value; returned masked or absent for sensitive parameters
    #[serde(default)]
    pub value: Option<String>,
}

/// `GET /flow/templates`
#[derive(Deserialize, Debug, Clone, Default)]
pub struct TemplatesEntity {
    /// Uploaded templates
    #[serde(default)]
    pub templates: Vec<TemplateEntity>,
}

/// An uploaded template
#[derive(Deserialize, Debug, Clone)]
pub struct TemplateEntity {
    /// Template identifier
    pub id: String,
    /// Template details
    pub template: TemplateDto,
}

/// Template details
#[derive(Deserialize, Debug, Clone)]
pub struct TemplateDto {
    /// Template name
    pub name: String,
}

/// `POST /process-groups/{id}/template-instance`
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct InstantiateTemplateRequest {
    /// Template to deploy
    pub template_id: String,
    /// Canvas origin x
    pub origin_x: f64,
    /// Canvas origin y
    pub origin_y: f64,
}

/// `GET /flow/process-groups/{id}/controller-services`
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ControllerServicesEntity {
    /// Services in scope
    #[serde(default)]
    pub controller_services: Vec<ControllerServiceEntity>,
}

/// A controller service with its revision
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ControllerServiceEntity {
    /// Service identifier
    pub id: String,
    /// Revision
    #[serde(default)]
    pub revision: Revision,
    /// Group the service lives in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_group_id: Option<String>,
    /// Service details
    pub component: ControllerServiceComponent,
}

/// Controller service details
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ControllerServiceComponent {
    /// Service identifier
    #[serde(default)]
    pub id: String,
    /// Service name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// `ENABLED`, `ENABLING`, `DISABLED` or `DISABLING`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub state: String,
    /// Configured properties; sensitive values come back masked
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Option<String>>,
}

/// `PUT /controller-services/{id}/run-status`
#[derive(Serialize, Debug, Clone)]
pub struct RunStatusRequest {
    /// Current revision
    pub revision: Revision,
    /// Target state
    pub state: String,
}

/// `GET /process-groups/{id}/processors`
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ProcessorsEntity {
    /// Processors in the group
    #[serde(default)]
    pub processors: Vec<ProcessorEntity>,
}

/// A processor with its revision
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ProcessorEntity {
    /// Processor identifier
    pub id: String,
    /// Revision
    #[serde(default)]
    pub revision: Revision,
    /// Processor details
    pub component: ProcessorComponent,
}

/// Processor details
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ProcessorComponent {
    /// Processor identifier
    #[serde(default)]
    pub id: String,
    /// Processor name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// `RUNNING`, `STOPPED` or `DISABLED`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub state: String,
    /// Scheduling configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ProcessorConfig>,
}

/// Processor scheduling configuration
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorConfig {
    /// Run period, e.g. `10000ms`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduling_period: Option<String>,
}

/// `PUT /flow/process-groups/{id}`
#[derive(Serialize, Debug, Clone)]
pub struct ScheduleComponentsRequest {
    /// Group to schedule
    pub id: String,
    /// `RUNNING` or `STOPPED`
    pub state: String,
}
