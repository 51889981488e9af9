//! Client-side core for school report-card administration.
//!
//! Two cooperating pieces sit behind the dashboard UI: the
//! [`HierarchyResolver`], which keeps the cascading education-level →
//! grade-level → section → classroom dropdowns consistent, and the
//! [`RemarksWorkflow`], which applies signatures, stamps and remarks to
//! selected term reports in per-education-level batches. Both talk to the
//! school management REST backend through the injected [`BackendClient`]
//! capability; all authoritative state lives server-side.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod resolver;
pub mod workflow;

pub use api::{unwrap_page, BackendClient, RestClient, TokenProvider};
pub use config::Config;
pub use error::{Error, PartitionFailure, Result};
pub use resolver::HierarchyResolver;
pub use workflow::{RemarksWorkflow, MIN_REMARK_CHARS};
