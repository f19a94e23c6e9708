//! Terraform Enterprise/Cloud provider
//!
//! This crate implements the `tfe_team_access` and
//! `tfe_notification_configuration` resources behind the [`ProviderService`]
//! interface a host runtime drives.
//!
//! # Overview
//!
//! - **Access reconciliation**: [`access::reconcile`] decides, for each planned
//!   team access change, whether the user means a fixed access level or a
//!   custom permissions block
//! - **Schema types**: Builders describing the provider and its resources
//! - **Resources**: The [`resources::Resource`] trait and its implementations
//! - **API seam**: The [`client::TfeApi`] trait the resources call
//! - **Error types**: [`ProviderError`] and [`ApiError`]
//! - **Logging**: Integration with `tracing` for structured logging
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use tfe_provider::{ProviderService, TfeProvider};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     tfe_provider::init_logging();
//!     let provider = TfeProvider::new(Arc::new(MyApiClient::new()));
//!     provider.configure(json!({"hostname": "app.terraform.io"})).await?;
//!
//!     let plan = provider
//!         .plan(
//!             "tfe_team_access",
//!             None,
//!             json!({"team_id": "team-x", "workspace_id": "ws-y", "permissions": {"runs": "plan"}}),
//!             json!(null),
//!         )
//!         .await?;
//!     assert_eq!(plan.planned_state["access"], "custom");
//!     Ok(())
//! }
//! ```
//!
//! # Access Modes
//!
//! A team's access to a workspace is either a fixed level (`admin`, `read`,
//! `plan`, `write`), whose permissions the API computes, or `custom`, where
//! the `permissions` block is authoritative. While planning:
//!
//! - Changing `access` to a fixed level marks `permissions` as computed.
//! - Editing `permissions` with `access` unchanged sets `access` to `custom`.
//! - A new grant with only `permissions` gets `access = "custom"`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod access;
pub mod client;
pub mod config;
pub mod diff;
pub mod error;
pub mod logging;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod service;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use access::{reconcile, AccessDiff, AccessLevel, PermissionSet, Reconciliation};
pub use client::TfeApi;
pub use config::{ProviderConfig, ProviderOptions};
pub use error::{ApiError, ProviderError};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::TfeProvider;
pub use schema::ProviderSchema;
pub use service::ProviderService;
pub use types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
