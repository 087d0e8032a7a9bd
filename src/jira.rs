//! Public facade over one Jira deployment.
//!
//! Every operation goes through the same pipeline: the deployment adapter
//! builds the request, the executor answers it from the cache or the network,
//! and the response is normalized into [`crate::models`] so callers see the
//! same shapes for Cloud and Server.

use std::path::Path;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;

use crate::api_types::{ApiIssue, ApiUser, ApiWorklog, ApiWorklogPage, WorklogCreateRequest};
use crate::cache::persistent::PersistentCache;
use crate::cache::ResponseCache;
use crate::config::{AppConfig, ClientConfig};
use crate::deployment::{
    adapter_for, build_absolute_url, build_url_with_query, decode, DeploymentAdapter,
};
use crate::error::JiraError;
use crate::executor::RequestExecutor;
use crate::metrics::Metrics;
use crate::models::{CurrentUser, Issue, IssueList, Page, Project, Worklog, WorklogPage};
use crate::pagination::{PaginationLimits, Paginator};

const ISSUE_FIELDS: &str = "summary,project,worklog";

fn issue_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([A-Za-z][A-Za-z0-9_]*-[0-9]+|[0-9]+)$").expect("valid issue key pattern")
    })
}

fn validate_issue_key(key: &str) -> Result<&str, JiraError> {
    let key = key.trim();
    if issue_key_pattern().is_match(key) {
        Ok(key)
    } else {
        Err(JiraError::invalid(format!("invalid issue key '{key}'")))
    }
}

/// `started` as Jira expects it: UTC, millisecond fraction, literal `+0000`.
pub fn format_worklog_started<Tz: TimeZone>(started: &DateTime<Tz>) -> String {
    started
        .with_timezone(&Utc)
        .format("%Y-%m-%dT%H:%M:%S%.3f+0000")
        .to_string()
}

#[derive(Debug)]
pub struct JiraClient {
    config: ClientConfig,
    adapter: Box<dyn DeploymentAdapter>,
    executor: RequestExecutor,
    limits: PaginationLimits,
}

impl JiraClient {
    /// Client with a memory-only cache and default settings.
    pub fn new(config: ClientConfig) -> Result<Self, JiraError> {
        let metrics = Arc::new(Metrics::new());
        let cache = ResponseCache::new(Default::default(), Arc::clone(&metrics));
        Self::with_cache(config, cache, metrics)
    }

    pub fn with_cache(
        config: ClientConfig,
        cache: ResponseCache,
        metrics: Arc<Metrics>,
    ) -> Result<Self, JiraError> {
        let executor = RequestExecutor::new(&config, cache, metrics)?;
        Ok(Self {
            adapter: adapter_for(config.kind()),
            config,
            executor,
            limits: PaginationLimits::default(),
        })
    }

    /// Builds a client from loaded configuration. A persistent cache that
    /// cannot be opened is logged and skipped.
    pub fn from_config(app: &AppConfig) -> Result<Self, JiraError> {
        let config = app.client_config()?;
        let metrics = Arc::new(Metrics::new());
        let mut cache = ResponseCache::new(app.cache_settings(), Arc::clone(&metrics));

        let db_path = app.cache.db_path.trim();
        if !db_path.is_empty() {
            match PersistentCache::new(Path::new(db_path), app.cache.persistent_capacity) {
                Ok(persistent) => {
                    tracing::debug!("persistent cache opened at {}", db_path);
                    cache = cache.with_persistent(Arc::new(persistent));
                }
                Err(err) => {
                    tracing::warn!("persistent cache disabled, failed to open {}: {}", db_path, err);
                }
            }
        }

        Ok(Self::with_cache(config, cache, metrics)?.with_limits(app.pagination_limits()))
    }

    pub fn with_limits(mut self, limits: PaginationLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResponseCache {
        self.executor.cache()
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        self.executor.metrics()
    }

    fn paginator(&self) -> Paginator<'_> {
        Paginator::new(&self.executor, self.adapter.as_ref(), &self.config, self.limits)
    }

    fn issue_url(&self, key: &str) -> Result<String, JiraError> {
        build_url_with_query(
            &self.config,
            &format!("issue/{key}"),
            &[("fields", ISSUE_FIELDS.to_string())],
        )
    }

    fn worklog_url(&self, key: &str) -> String {
        build_absolute_url(&self.config, &format!("issue/{key}/worklog"))
    }

    /// Credential check. Always hits the network.
    pub fn login(&self) -> Result<CurrentUser, JiraError> {
        let body = self
            .executor
            .get_live(&build_absolute_url(&self.config, "myself"))?;
        let user: ApiUser = decode(body, "current user")?;
        Ok(user.into())
    }

    pub fn get_issue(&self, key: &str) -> Result<Issue, JiraError> {
        let key = validate_issue_key(key)?;
        let body = self.executor.get(&self.issue_url(key)?)?;
        let issue: ApiIssue = decode(body, "issue")?;
        Ok(issue.into())
    }

    /// Collects up to `desired` issues (or the configured default) across pages.
    pub fn get_issues(&self, desired: Option<usize>, jql: &str) -> Result<IssueList, JiraError> {
        self.paginator().collect_issues(desired, jql)
    }

    /// One search page. `page_size` defaults to the deployment's maximum.
    pub fn get_issues_page(
        &self,
        jql: &str,
        cursor: Option<&str>,
        page_size: Option<usize>,
    ) -> Result<Page<Issue>, JiraError> {
        let page_size = page_size.unwrap_or_else(|| self.adapter.max_page_size());
        self.paginator().fetch_page(jql, cursor, page_size)
    }

    pub fn get_issue_suggestions(
        &self,
        query: &str,
        project: Option<&str>,
    ) -> Result<IssueList, JiraError> {
        self.paginator().fetch_suggestions(query, project)
    }

    pub fn get_issue_worklog(&self, key: &str) -> Result<WorklogPage, JiraError> {
        let key = validate_issue_key(key)?;
        let body = self.executor.get(&self.worklog_url(key))?;
        let page: ApiWorklogPage = decode(body, "worklog")?;
        Ok(page.into())
    }

    /// Logs `seconds` against `key`, then drops the cached worklog and issue
    /// payloads for that issue from both tiers.
    pub fn update_worklog<Tz: TimeZone>(
        &self,
        key: &str,
        seconds: u64,
        started: &DateTime<Tz>,
        comment: &str,
    ) -> Result<Worklog, JiraError> {
        let key = validate_issue_key(key)?;
        if seconds == 0 {
            return Err(JiraError::invalid("worklog time spent must be positive"));
        }

        let comment = comment.trim();
        let request = WorklogCreateRequest {
            time_spent_seconds: seconds,
            started: format_worklog_started(started),
            comment: (!comment.is_empty())
                .then(|| self.adapter.worklog_comment(comment).into_value()),
        };
        let url = build_url_with_query(
            &self.config,
            &format!("issue/{key}/worklog"),
            &[("notifyUsers", "false".to_string())],
        )?;

        let body = self.executor.post(&url, &request)?;
        tracing::info!("logged {}s on {}", seconds, key);

        self.executor.invalidate_get(&self.worklog_url(key));
        self.executor.invalidate_get(&self.issue_url(key)?);

        let created: ApiWorklog = decode(body, "created worklog")?;
        Ok(created.into())
    }

    pub fn get_projects(&self, offset: u64) -> Result<Page<Project>, JiraError> {
        let url = self.adapter.build_projects_url(&self.config, offset)?;
        let body = self.executor.get(&url)?;
        self.adapter.parse_projects_response(body, offset)
    }
}
