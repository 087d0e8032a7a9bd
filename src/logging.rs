use tracing_subscriber::EnvFilter;

const FILTER_ENV: &str = "JIRA_WORKLOG_LOG";
const DEBUG_ENV: &str = "JIRA_WORKLOG_DEBUG";

pub fn env_debug_requested() -> bool {
    std::env::var(DEBUG_ENV)
        .ok()
        .map(|v| parse_flag(&v))
        .unwrap_or(false)
}

pub(crate) fn parse_flag(raw: &str) -> bool {
    let normalized = raw.trim().to_ascii_lowercase();
    normalized == "1" || normalized == "true" || normalized == "yes"
}

fn default_directive(debug: bool) -> &'static str {
    if debug {
        "jira_worklog=debug,info"
    } else {
        "info"
    }
}

/// Installs the stderr subscriber. `JIRA_WORKLOG_LOG` takes precedence over
/// the debug flag. Safe to call more than once.
pub fn init(debug: bool) {
    let debug = debug || env_debug_requested();
    let filter = EnvFilter::try_from_env(FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
