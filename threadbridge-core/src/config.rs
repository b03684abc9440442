// ABOUTME: Configuration parsing from TOML files with environment variable fallbacks
// ABOUTME: Merges ~/.codex/config.toml under the local file, applies defaults and floors
use crate::dispatcher::DispatcherConfig;
use crate::gate::DEFAULT_GATE_CAPACITY;
use crate::utils::MAX_REPLY_CHARS;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use threadbridge_agent::CodexConfig;
use toml::{Table, Value};

const DEFAULT_TIMEOUT_SECS: i64 = 300;
const MIN_TIMEOUT_SECS: i64 = 30;
const DEFAULT_HISTORY_TURNS: i64 = 6;
const DEFAULT_COMMAND: &str = "codex";
const DEFAULT_STATE_FILE: &str = "tmp/slack-bridge-state.json";

#[derive(Clone)]
pub struct Config {
    /// Socket Mode app-level token (xapp-...)
    pub app_token: String,
    /// Bot OAuth token (xoxb-...)
    pub bot_token: String,
    /// Primary channel; used as the allow-list when none is configured
    pub channel_id: Option<String>,
    /// Working directory handed to the assistant (`-C`)
    pub codex_cd: PathBuf,
    pub codex_timeout_secs: u64,
    pub history_turns: usize,
    pub mention_only: bool,
    pub state_path: PathBuf,
    pub codex_command: String,
    pub model: Option<String>,
    pub allowed_channels: Vec<String>,
    pub max_concurrency: usize,
    pub max_reply_chars: usize,
    pub metrics_addr: Option<SocketAddr>,
}

// Custom Debug impl to redact app_token and bot_token
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("app_token", &"[REDACTED]")
            .field("bot_token", &"[REDACTED]")
            .field("channel_id", &self.channel_id)
            .field("codex_cd", &self.codex_cd)
            .field("codex_timeout_secs", &self.codex_timeout_secs)
            .field("history_turns", &self.history_turns)
            .field("mention_only", &self.mention_only)
            .field("state_path", &self.state_path)
            .field("codex_command", &self.codex_command)
            .field("model", &self.model)
            .field("allowed_channels", &self.allowed_channels)
            .field("max_concurrency", &self.max_concurrency)
            .field("max_reply_chars", &self.max_reply_chars)
            .field("metrics_addr", &self.metrics_addr)
            .finish()
    }
}

/// Location of the shared Codex config (~/.codex/config.toml)
pub fn global_config_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(".codex").join("config.toml"))
}

/// Expand tilde (~) to home directory in paths
/// Logs a warning if expansion fails and falls back to the original path
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(base_dirs) = directories::BaseDirs::new() {
            return base_dirs.home_dir().join(stripped);
        }
        tracing::warn!(path = %path, "Failed to expand tilde in path: could not determine home directory");
    } else if path == "~" {
        if let Some(base_dirs) = directories::BaseDirs::new() {
            return base_dirs.home_dir().to_path_buf();
        }
        tracing::warn!("Failed to expand tilde: could not determine home directory");
    }
    PathBuf::from(path)
}

impl Config {
    /// Load `path` merged over the global Codex config, with env fallbacks.
    ///
    /// Missing files count as empty; unparsable files and missing tokens are errors.
    pub fn load(path: &Path) -> Result<Self> {
        let mut merged = Table::new();
        if let Some(global) = global_config_path().filter(|g| !same_config_file(g, path)) {
            merge_tables(&mut merged, read_table(&global)?);
        }
        merge_tables(&mut merged, read_table(path)?);

        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Self::from_table(&merged, base_dir, &|key| std::env::var(key).ok())
    }

    /// Resolve a merged config table. `env` supplies fallback values;
    /// `base_dir` anchors the default snapshot path.
    pub fn from_table(
        table: &Table,
        base_dir: &Path,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let empty = Table::new();
        let slack = section(table, "slack").unwrap_or(&empty);
        let bridge = section(table, "slack_bridge").unwrap_or(&empty);

        let lookup = |t: &Table, keys: &[&str], vars: &[&str]| -> Option<String> {
            keys.iter()
                .find_map(|k| clean_str(t.get(*k)))
                .or_else(|| vars.iter().find_map(|v| clean_env(env(v))))
        };
        // Config value if present (any type), else the env var
        let raw = |key: &str, var: &str| -> Option<Value> {
            bridge
                .get(key)
                .cloned()
                .or_else(|| env(var).map(Value::String))
        };

        let app_token = lookup(
            slack,
            &["app_token", "socket_app_token", "socket_mode_app_token"],
            &["SLACK_APP_TOKEN", "SLACK_SOCKET_APP_TOKEN", "SLACK_SOCKET_MODE_APP_TOKEN"],
        );
        let bot_token = lookup(slack, &["bot_token", "api_token"], &["SLACK_BOT_TOKEN", "SLACK_API_TOKEN"]);
        let channel_id = lookup(slack, &["channel_id", "channel"], &["SLACK_CHANNEL_ID", "SLACK_CHANNEL"]);

        let codex_cd = lookup(bridge, &["codex_cd"], &["CODEX_BRIDGE_CWD"])
            .map(|p| expand_tilde(&p))
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

        let codex_timeout_secs = to_int(raw("codex_timeout_sec", "CODEX_BRIDGE_TIMEOUT_SEC").as_ref())
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .max(MIN_TIMEOUT_SECS) as u64;
        let history_turns = to_int(raw("history_turns", "CODEX_BRIDGE_HISTORY_TURNS").as_ref())
            .unwrap_or(DEFAULT_HISTORY_TURNS)
            .max(1) as usize;
        let mention_only = to_bool(raw("mention_only", "CODEX_BRIDGE_MENTION_ONLY").as_ref()).unwrap_or(true);
        let max_concurrency = to_int(raw("max_concurrency", "CODEX_BRIDGE_MAX_CONCURRENCY").as_ref())
            .unwrap_or(DEFAULT_GATE_CAPACITY as i64)
            .max(1) as usize;
        let max_reply_chars = to_int(bridge.get("max_reply_chars"))
            .filter(|n| *n > 0)
            .map(|n| n as usize)
            .unwrap_or(MAX_REPLY_CHARS);

        let model = lookup(bridge, &["model"], &["CODEX_BRIDGE_MODEL"]);
        let codex_command = lookup(bridge, &["codex_command"], &["CODEX_BRIDGE_COMMAND"])
            .unwrap_or_else(|| DEFAULT_COMMAND.to_string());

        let mut allowed_channels: Vec<String> = match bridge.get("allowed_channels") {
            Some(Value::Array(items)) => items.iter().filter_map(|v| clean_str(Some(v))).collect(),
            _ => env("CODEX_BRIDGE_ALLOWED_CHANNELS")
                .map(|val| {
                    val.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        };
        if allowed_channels.is_empty() {
            if let Some(channel) = &channel_id {
                allowed_channels.push(channel.clone());
            }
        }

        let state_path = lookup(bridge, &["state_path"], &["CODEX_BRIDGE_STATE_PATH"])
            .map(|p| expand_tilde(&p))
            .unwrap_or_else(|| base_dir.join(DEFAULT_STATE_FILE));

        let metrics_addr = match lookup(bridge, &["metrics_addr"], &["CODEX_BRIDGE_METRICS_ADDR"]) {
            Some(addr) => Some(
                addr.parse::<SocketAddr>()
                    .with_context(|| format!("slack_bridge.metrics_addr must be host:port, got: {}", addr))?,
            ),
            None => None,
        };

        let Some(app_token) = app_token else {
            anyhow::bail!("slack.app_token or SLACK_APP_TOKEN is required (Socket Mode xapp-...)");
        };
        let Some(bot_token) = bot_token else {
            anyhow::bail!("slack.bot_token or SLACK_BOT_TOKEN is required (xoxb-...)");
        };

        Ok(Self {
            app_token,
            bot_token,
            channel_id,
            codex_cd,
            codex_timeout_secs,
            history_turns,
            mention_only,
            state_path,
            codex_command,
            model,
            allowed_channels,
            max_concurrency,
            max_reply_chars,
            metrics_addr,
        })
    }

    /// Settings for the assistant runner
    pub fn codex_config(&self) -> CodexConfig {
        CodexConfig {
            command: self.codex_command.clone(),
            working_dir: self.codex_cd.clone(),
            model: self.model.clone(),
            timeout_secs: self.codex_timeout_secs,
            scratch_dir: None,
        }
    }

    /// Dispatcher policy for a bridge running as `bot_user_id`
    pub fn dispatcher_config(&self, bot_user_id: &str) -> DispatcherConfig {
        DispatcherConfig {
            bot_user_id: bot_user_id.to_string(),
            mention_only: self.mention_only,
            allowed_channels: self.allowed_channels.iter().cloned().collect(),
            max_reply_chars: self.max_reply_chars,
        }
    }
}

/// Compare resolved paths; a path that cannot be resolved is compared as given
fn same_config_file(a: &Path, b: &Path) -> bool {
    let resolve = |p: &Path| std::fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf());
    resolve(a) == resolve(b)
}

fn read_table(path: &Path) -> Result<Table> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Table::new()),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };
    tracing::info!(path = %path.display(), "Loading configuration from file");
    content
        .parse::<Table>()
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Deep-merge `overlay` into `base`; nested tables merge, everything else replaces
fn merge_tables(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(existing)), Value::Table(incoming)) => merge_tables(existing, incoming),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn section<'a>(table: &'a Table, name: &str) -> Option<&'a Table> {
    table.get(name).and_then(Value::as_table)
}

fn clean_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn clean_env(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Integers or integer-looking strings; anything else is "unset"
fn to_int(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Integer(n) => Some(*n),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Booleans or the usual on/off spellings; anything else is "unset"
fn to_bool(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Boolean(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn parse(toml_str: &str) -> Table {
        toml_str.parse::<Table>().unwrap()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    const MINIMAL: &str = r#"
        [slack]
        app_token = "xapp-1"
        bot_token = "xoxb-1"
    "#;

    #[test]
    fn test_same_config_file_resolves_paths() {
        let dir = tempfile::tempdir().unwrap();
        let codex = dir.path().join(".codex");
        std::fs::create_dir_all(&codex).unwrap();
        let global = codex.join("config.toml");
        std::fs::write(&global, "[slack]\n").unwrap();
        let other = dir.path().join("config.toml");
        std::fs::write(&other, "[slack]\n").unwrap();

        assert!(same_config_file(&global, &codex.join(".").join("config.toml")));
        assert!(same_config_file(&global, &codex.join("..").join(".codex").join("config.toml")));
        assert!(!same_config_file(&global, &other));
        // Unresolvable paths fall back to a literal comparison
        assert!(same_config_file(Path::new("missing.toml"), Path::new("missing.toml")));
        assert!(!same_config_file(Path::new("missing.toml"), &global));
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_table(&parse(MINIMAL), Path::new("/etc/bridge"), &no_env).unwrap();
        assert_eq!(config.app_token, "xapp-1");
        assert_eq!(config.bot_token, "xoxb-1");
        assert_eq!(config.codex_timeout_secs, 300);
        assert_eq!(config.history_turns, 6);
        assert!(config.mention_only);
        assert_eq!(config.codex_command, "codex");
        assert!(config.model.is_none());
        assert!(config.allowed_channels.is_empty());
        assert_eq!(config.max_concurrency, 2);
        assert_eq!(config.max_reply_chars, 3500);
        assert_eq!(config.state_path, PathBuf::from("/etc/bridge/tmp/slack-bridge-state.json"));
        assert!(config.metrics_addr.is_none());
    }

    #[test]
    fn test_token_aliases() {
        let table = parse(
            r#"
            [slack]
            socket_mode_app_token = "xapp-alias"
            api_token = "xoxb-alias"
            channel = "C777"
        "#,
        );
        let config = Config::from_table(&table, Path::new("."), &no_env).unwrap();
        assert_eq!(config.app_token, "xapp-alias");
        assert_eq!(config.bot_token, "xoxb-alias");
        assert_eq!(config.channel_id.as_deref(), Some("C777"));
        assert_eq!(config.allowed_channels, vec!["C777"]);
    }

    #[test]
    fn test_missing_tokens_are_fatal() {
        let err = Config::from_table(&Table::new(), Path::new("."), &no_env).unwrap_err();
        assert!(err.to_string().contains("app_token"));

        let only_app = parse("[slack]\napp_token = \"xapp\"\n");
        let err = Config::from_table(&only_app, Path::new("."), &no_env).unwrap_err();
        assert!(err.to_string().contains("bot_token"));
    }

    #[test]
    fn test_env_fallbacks() {
        let vars: HashMap<&str, &str> = [
            ("SLACK_SOCKET_APP_TOKEN", "xapp-env"),
            ("SLACK_BOT_TOKEN", "xoxb-env"),
            ("CODEX_BRIDGE_TIMEOUT_SEC", "120"),
            ("CODEX_BRIDGE_HISTORY_TURNS", "3"),
            ("CODEX_BRIDGE_MENTION_ONLY", "off"),
            ("CODEX_BRIDGE_MODEL", "o4-mini"),
            ("CODEX_BRIDGE_COMMAND", "/opt/codex"),
            ("CODEX_BRIDGE_ALLOWED_CHANNELS", "C1, C2,,"),
        ]
        .into_iter()
        .collect();
        let env = |k: &str| vars.get(k).map(|v| v.to_string());

        let config = Config::from_table(&Table::new(), Path::new("."), &env).unwrap();
        assert_eq!(config.app_token, "xapp-env");
        assert_eq!(config.bot_token, "xoxb-env");
        assert_eq!(config.codex_timeout_secs, 120);
        assert_eq!(config.history_turns, 3);
        assert!(!config.mention_only);
        assert_eq!(config.model.as_deref(), Some("o4-mini"));
        assert_eq!(config.codex_command, "/opt/codex");
        assert_eq!(config.allowed_channels, vec!["C1", "C2"]);
    }

    #[test]
    fn test_file_values_win_over_env() {
        let table = parse(
            r#"
            [slack]
            app_token = "xapp-file"
            bot_token = "xoxb-file"
            [slack_bridge]
            history_turns = 2
        "#,
        );
        let env = |k: &str| match k {
            "SLACK_APP_TOKEN" => Some("xapp-env".to_string()),
            "CODEX_BRIDGE_HISTORY_TURNS" => Some("9".to_string()),
            _ => None,
        };
        let config = Config::from_table(&table, Path::new("."), &env).unwrap();
        assert_eq!(config.app_token, "xapp-file");
        assert_eq!(config.history_turns, 2);
    }

    #[test]
    fn test_floors_and_lenient_values() {
        let table = parse(
            r#"
            [slack]
            app_token = "xapp"
            bot_token = "xoxb"
            [slack_bridge]
            codex_timeout_sec = 5
            history_turns = "0"
            mention_only = "maybe"
            max_concurrency = -3
            max_reply_chars = 0
        "#,
        );
        let config = Config::from_table(&table, Path::new("."), &no_env).unwrap();
        assert_eq!(config.codex_timeout_secs, 30);
        assert_eq!(config.history_turns, 1);
        assert!(config.mention_only, "unrecognized bool falls back to default");
        assert_eq!(config.max_concurrency, 1);
        assert_eq!(config.max_reply_chars, 3500);
    }

    #[test]
    fn test_wrong_types_fall_back_to_defaults() {
        let table = parse(
            r#"
            [slack]
            app_token = "xapp"
            bot_token = "xoxb"
            [slack_bridge]
            codex_timeout_sec = [1, 2]
            model = 42
            allowed_channels = ["C1", 7, "  ", "C2"]
        "#,
        );
        let config = Config::from_table(&table, Path::new("."), &no_env).unwrap();
        assert_eq!(config.codex_timeout_secs, 300);
        assert!(config.model.is_none());
        assert_eq!(config.allowed_channels, vec!["C1", "C2"]);
    }

    #[test]
    fn test_invalid_metrics_addr_is_an_error() {
        let table = parse(
            r#"
            [slack]
            app_token = "xapp"
            bot_token = "xoxb"
            [slack_bridge]
            metrics_addr = "not-an-addr"
        "#,
        );
        assert!(Config::from_table(&table, Path::new("."), &no_env).is_err());

        let ok = parse(
            r#"
            [slack]
            app_token = "xapp"
            bot_token = "xoxb"
            [slack_bridge]
            metrics_addr = "127.0.0.1:9464"
        "#,
        );
        let config = Config::from_table(&ok, Path::new("."), &no_env).unwrap();
        assert_eq!(config.metrics_addr.unwrap().port(), 9464);
    }

    #[test]
    fn test_merge_tables_is_deep() {
        let mut base = parse(
            r#"
            model = "global"
            [slack]
            app_token = "xapp-global"
            bot_token = "xoxb-global"
        "#,
        );
        let overlay = parse(
            r#"
            [slack]
            bot_token = "xoxb-local"
        "#,
        );
        merge_tables(&mut base, overlay);
        let slack = section(&base, "slack").unwrap();
        assert_eq!(slack["app_token"].as_str(), Some("xapp-global"));
        assert_eq!(slack["bot_token"].as_str(), Some("xoxb-local"));
        assert_eq!(base["model"].as_str(), Some("global"));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let config = Config::from_table(&parse(MINIMAL), Path::new("."), &no_env).unwrap();
        let debug_str = format!("{:?}", config);
        assert!(!debug_str.contains("xapp-1"), "app_token should be redacted");
        assert!(!debug_str.contains("xoxb-1"), "bot_token should be redacted");
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn test_derived_configs() {
        let table = parse(
            r#"
            [slack]
            app_token = "xapp"
            bot_token = "xoxb"
            [slack_bridge]
            codex_cd = "/srv/work"
            model = "gpt-5"
            allowed_channels = ["C1"]
            mention_only = false
        "#,
        );
        let config = Config::from_table(&table, Path::new("."), &no_env).unwrap();

        let codex = config.codex_config();
        assert_eq!(codex.working_dir, PathBuf::from("/srv/work"));
        assert_eq!(codex.model.as_deref(), Some("gpt-5"));
        assert_eq!(codex.timeout_secs, 300);

        let dispatch = config.dispatcher_config("UBOT");
        assert_eq!(dispatch.bot_user_id, "UBOT");
        assert!(!dispatch.mention_only);
        assert!(dispatch.allowed_channels.contains("C1"));
    }
}
