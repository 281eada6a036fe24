//! ServiceNow REST API access.
//!
//! The [`ServiceNowClient`] is the only component that talks to the
//! instance. It is constructed once from the resolved configuration and
//! shared read-only across tool invocations; authentication (basic, OAuth
//! password grant, API key header) is applied per request.

pub mod client;
pub mod error;

pub use client::{ListQuery, ServiceNowClient};
pub use error::{ClientError, ClientResult};
