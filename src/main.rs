use std::path::PathBuf;

use jira_worklog::config::{self, AppConfigOverrides};
use jira_worklog::logging;
use jira_worklog::JiraClient;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args_os();
    let _program = args.next();

    let mut app = match args.next() {
        Some(path) => config::load_from(&PathBuf::from(path))?,
        None => config::load()?,
    };
    app.apply_overrides(&AppConfigOverrides::from_env()?)?;
    logging::init(app.logging.debug);

    let client = JiraClient::from_config(&app)?;
    tracing::info!(
        "using jira {} deployment at {} (api v{})",
        client.config().kind(),
        client.config().host(),
        client.config().api_version()
    );

    match client.login() {
        Ok(me) => tracing::info!(
            "jira identity display_name={:?} account_id={:?} name={:?}",
            me.display_name,
            me.account_id,
            me.name
        ),
        Err(err) => tracing::warn!("failed jira identity check: {}", err),
    }

    match client.get_projects(0) {
        Ok(page) => tracing::info!(
            "jira visible projects count={} total={:?} sample={:?}",
            page.items.len(),
            page.total,
            page.items.iter().take(10).map(|p| p.key.as_str()).collect::<Vec<_>>()
        ),
        Err(err) => tracing::warn!("failed visible projects check: {}", err),
    }

    if let Some(jql) = std::env::var("JIRA_WORKLOG_JQL")
        .ok()
        .filter(|v| !v.trim().is_empty())
    {
        match client.get_issues(None, &jql) {
            Ok(list) => tracing::info!(
                "jql matched {} issues sample={:?}",
                list.total,
                list.data.iter().take(10).map(|i| i.key.as_str()).collect::<Vec<_>>()
            ),
            Err(err) => tracing::warn!("failed issue search for '{}': {}", jql, err),
        }
    }

    tracing::info!("metrics {}", client.metrics().snapshot());
    Ok(())
}
