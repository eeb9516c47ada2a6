use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing::Subscriber;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

const DEFAULT_JSON_LOG_FILE: &str = "delta-stream.logs.jsonl";

static INIT: OnceCell<()> = OnceCell::new();

fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

fn observability_enabled() -> bool {
    std::env::var("DELTA_STREAM_OBSERVABILITY")
        .ok()
        .map(|value| parse_bool_env(&value).unwrap_or(true))
        .unwrap_or(true)
}

fn resolve_env_filter() -> EnvFilter {
    if let Ok(level) = std::env::var("DELTA_STREAM_LOG_LEVEL")
        && let Ok(filter) = EnvFilter::try_new(level)
    {
        return filter;
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Directory and file name for the JSONL log at `path_raw`.
fn json_log_target(path_raw: &str) -> (PathBuf, String) {
    let path = Path::new(path_raw);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_JSON_LOG_FILE)
        .to_string();
    (dir, file_name)
}

fn json_subscriber(
    env_filter: EnvFilter,
    path_raw: &str,
) -> impl Subscriber + Send + Sync + 'static {
    let (dir, file_name) = json_log_target(path_raw);
    let _ = std::fs::create_dir_all(&dir);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_target(true)
        .with_writer(tracing_appender::rolling::never(dir, file_name));
    tracing_subscriber::registry().with(env_filter).with(json_layer)
}

fn console_subscriber(env_filter: EnvFilter) -> impl Subscriber + Send + Sync + 'static {
    let console_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry().with(env_filter).with(console_layer)
}

/// Installs the process-wide tracing subscriber once.
///
/// Environment variables:
/// - `DELTA_STREAM_OBSERVABILITY`: enable/disable flag (default enabled).
/// - `DELTA_STREAM_LOG_LEVEL`: filter override (`info`, `delta_stream=debug`, ...).
/// - `DELTA_STREAM_JSON_LOG_PATH`: if set, logs are written as JSONL to that file.
///   Otherwise logs go to stderr in compact form, keeping stdout for rendered text.
/// - `RUST_LOG`: fallback filter.
pub fn init_observability() {
    INIT.get_or_init(|| {
        if !observability_enabled() {
            return;
        }

        let env_filter = resolve_env_filter();
        let _ = match std::env::var("DELTA_STREAM_JSON_LOG_PATH") {
            Ok(path_raw) => json_subscriber(env_filter, &path_raw).try_init(),
            Err(_) => console_subscriber(env_filter).try_init(),
        };
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_env_accepts_common_spellings() {
        assert_eq!(parse_bool_env(" Yes "), Some(true));
        assert_eq!(parse_bool_env("off"), Some(false));
        assert_eq!(parse_bool_env("maybe"), None);
    }

    #[test]
    fn json_log_target_splits_directory_and_file() {
        assert_eq!(
            json_log_target("logs/run.jsonl"),
            (PathBuf::from("logs"), "run.jsonl".to_string())
        );
        assert_eq!(
            json_log_target("run.jsonl"),
            (PathBuf::from("."), "run.jsonl".to_string())
        );
        assert_eq!(
            json_log_target(""),
            (PathBuf::from("."), DEFAULT_JSON_LOG_FILE.to_string())
        );
    }

    #[test]
    fn json_log_path_receives_one_record_per_event() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("run.jsonl");
        let subscriber = json_subscriber(EnvFilter::new("info"), &path.to_string_lossy());

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(stream_id = "s-1", "stream started");
            tracing::debug!("filtered out");
        });

        let written = std::fs::read_to_string(&path).expect("log file");
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 1);
        let record: serde_json::Value = serde_json::from_str(lines[0]).expect("json line");
        assert_eq!(record["level"], "INFO");
        assert_eq!(record["fields"]["message"], "stream started");
        assert_eq!(record["fields"]["stream_id"], "s-1");
        assert!(record["target"].as_str().is_some_and(|t| t.starts_with("delta_stream")));
    }

    #[test]
    fn init_is_idempotent() {
        init_observability();
        init_observability();
    }
}
