//! # azprov-core
//!
//! Core types and utilities for provisioning infrastructure through Azure Resource Manager.
//!
//! This crate provides the error type, configuration, scoped sessions, the HTTP service
//! client and the long-running operation poller shared by the per-service client crates.
//!
//! ## Modules
//!
//! - [`error`] - Error types and HTTP status code mapping
//! - [`uuid`] - Strongly-typed UUID wrappers for subscriptions and applications
//! - [`types`] - Resource identifiers, resource kinds and service enumeration
//! - [`config`] - Serializable provisioner configuration
//! - [`auth`] - Credential providers and the per-run [`auth::Session`]
//! - [`client`] - HTTP client configuration, poll policy and the shared service client
//! - [`lro`] - Long-running operation handles and completion polling

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod lro;
pub mod types;
pub mod uuid;

// Re-export commonly used types
pub use error::{Error, Result};
