//! `jira-worklog` is a caching Jira REST client for worklog tooling.
//! It talks to Cloud and Server/Data-Center deployments through one facade.

/// Upstream request and response shapes.
pub mod api_types;
/// Two-tier response cache with TTL classes.
pub mod cache;
/// Connection settings and file/environment configuration.
pub mod config;
/// Cloud vs Server URL building and payload handling.
pub mod deployment;
pub mod error;
/// Authenticated HTTP calls with caching and request coalescing.
pub mod executor;
/// The `JiraClient` facade.
pub mod jira;
/// Logging setup.
pub mod logging;
/// Runtime metrics counters.
pub mod metrics;
pub mod models;
/// Multi-page search aggregation and issue suggestions.
pub mod pagination;

pub use config::{AppConfig, ClientConfig};
pub use deployment::DeploymentKind;
pub use error::JiraError;
pub use jira::JiraClient;
pub use models::{CurrentUser, Issue, IssueList, Page, Project, Worklog, WorklogPage};
