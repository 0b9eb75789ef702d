//! Telemetry Orchestrator Library
//!
//! Keeps NiFi flows in step with metric and UE location collection records.
//! The main binary is in `src/main.rs`.

pub mod api;
pub mod config;
pub mod error;
pub mod nifi;
pub mod orchestration;
pub mod state;
pub mod store;
