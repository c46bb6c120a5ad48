//! Management-pack agent library.
//!
//! Lifecycle management for an Elasticsearch/Kibana deployment on a single
//! host: package installation, idempotent configuration materialization,
//! service control through LSB init scripts, status interpretation, and
//! Kibana dashboard loading.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod executor;
pub mod lifecycle;
pub mod materialize;
pub mod platform;
pub mod services;
pub mod status;
pub mod system;
pub mod templates;
