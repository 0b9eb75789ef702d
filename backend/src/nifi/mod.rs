//! Apache NiFi integration
//!
//! REST client, API types and the [`NifiDriver`] flow driver.

pub mod client;
pub mod driver;
pub mod types;

pub use client::NifiClient;
pub use driver::NifiDriver;
