use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Tool commands are a bare program name or a path, never a shell snippet.
static COMMAND_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_./+~-]+$").unwrap());

/// A single level or a comma separated list of `target=level` directives.
static LOG_FILTER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)([A-Za-z0-9_:-]+=)?(trace|debug|info|warn|error|off)(,([A-Za-z0-9_:-]+=)?(trace|debug|info|warn|error|off))*$")
        .unwrap()
});

#[derive(Debug, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub store: Option<StoreSection>,
    #[serde(default)]
    pub queue: Option<QueueSection>,
    #[serde(default)]
    pub cache: Option<CacheSection>,
    #[serde(default)]
    pub logging: Option<LoggingSection>,
    #[serde(default)]
    pub tools: Option<ToolsSection>,
}

#[derive(Debug, Deserialize)]
pub struct StoreSection {
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QueueSection {
    #[serde(default)]
    pub tick_ms: Option<u64>,
    #[serde(default)]
    pub finished_capacity: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CacheSection {
    #[serde(default)]
    pub ttl_secs: Option<u64>,
    #[serde(default)]
    pub gc_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub json: Option<bool>,
    #[serde(default)]
    pub log_dir: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ToolsSection {
    #[serde(default)]
    pub bench_command: Option<String>,
    #[serde(default)]
    pub compliance_command: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Load a RawConfigFile from a path. The format is inferred from the extension: .toml, .yaml/.yml, .json
pub fn load_raw_from_file<P: AsRef<Path>>(path: P) -> Result<RawConfigFile, ConfigError> {
    let path = path.as_ref();
    let s = fs::read_to_string(path)?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());
    parse_config_str(&s, ext.as_deref())
}

/// Parse configuration from a string with optional format hint
pub fn parse_config_str(s: &str, ext: Option<&str>) -> Result<RawConfigFile, ConfigError> {
    match ext {
        #[cfg(feature = "toml")]
        Some("toml") => toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        #[cfg(feature = "yaml")]
        Some("yaml" | "yml") => {
            serde_yaml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
        }
        #[cfg(feature = "json")]
        Some("json") => serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        _ => parse_config_auto(s),
    }
}

#[inline]
fn parse_config_auto(s: &str) -> Result<RawConfigFile, ConfigError> {
    #[cfg(feature = "yaml")]
    if let Ok(cfg) = serde_yaml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "toml")]
    if let Ok(cfg) = toml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "json")]
    if let Ok(cfg) = serde_json::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(any(feature = "yaml", feature = "toml", feature = "json"))]
    {
        Err(ConfigError::Parse(
            "failed to parse config as any supported format".into(),
        ))
    }

    #[cfg(not(any(feature = "yaml", feature = "toml", feature = "json")))]
    {
        let _ = s;
        Err(ConfigError::Parse("no config format enabled".into()))
    }
}

/// Concrete application configuration with defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    pub store: StoreConfig,
    pub queue: QueueConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreConfig {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueConfig {
    pub tick_ms: u64,
    pub finished_capacity: usize,
}

impl QueueConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub gc_interval_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn gc_interval(&self) -> Duration {
        Duration::from_secs(self.gc_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
    pub log_dir: Option<String>,
}

/// External commands driven by the job runners.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolsConfig {
    pub bench_command: String,
    pub compliance_command: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                path: "testbed.db".to_string(),
            },
            queue: QueueConfig {
                tick_ms: 1000,
                finished_capacity: 1000,
            },
            cache: CacheConfig {
                ttl_secs: 600,
                gc_interval_secs: 60,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
                log_dir: None,
            },
            tools: ToolsConfig {
                bench_command: "testbed-bench".to_string(),
                compliance_command: "testbed-s3tests".to_string(),
            },
        }
    }
}

#[inline]
fn parse_bool(s: &str) -> Result<bool, ()> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "no" | "n" | "off" => Ok(false),
        _ => Err(()),
    }
}

/// Helper macro to apply optional value if present
macro_rules! apply_opt {
    ($target:expr, $source:expr) => {
        if let Some(v) = $source {
            $target = v;
        }
    };
    ($target:expr, $source:expr, wrap) => {
        if let Some(v) = $source {
            $target = Some(v);
        }
    };
}

/// Overlay the values present in `raw` onto `cfg`.
pub fn merge_raw(cfg: &mut Config, raw: RawConfigFile) {
    if let Some(store) = raw.store {
        apply_opt!(cfg.store.path, store.path);
    }
    if let Some(queue) = raw.queue {
        apply_opt!(cfg.queue.tick_ms, queue.tick_ms);
        apply_opt!(cfg.queue.finished_capacity, queue.finished_capacity);
    }
    if let Some(cache) = raw.cache {
        apply_opt!(cfg.cache.ttl_secs, cache.ttl_secs);
        apply_opt!(cfg.cache.gc_interval_secs, cache.gc_interval_secs);
    }
    if let Some(logging) = raw.logging {
        apply_opt!(cfg.logging.level, logging.level);
        apply_opt!(cfg.logging.json, logging.json);
        apply_opt!(cfg.logging.log_dir, logging.log_dir, wrap);
    }
    if let Some(tools) = raw.tools {
        apply_opt!(cfg.tools.bench_command, tools.bench_command);
        apply_opt!(cfg.tools.compliance_command, tools.compliance_command);
    }
}

/// Load concrete `Config` from optional file and environment variables.
/// Environment variables take precedence over file values and defaults.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<Config, ConfigError> {
    let mut cfg = Config::default();

    if let Some(p) = path {
        merge_raw(&mut cfg, load_raw_from_file(p)?);
    }

    apply_env_overrides(&mut cfg)?;

    Ok(cfg)
}

#[inline]
fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Parse(format!("invalid {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

#[inline]
fn env_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    match env::var(key) {
        Ok(v) => parse_bool(&v)
            .map(Some)
            .map_err(|_| ConfigError::Parse(format!("invalid {}", key))),
        Err(_) => Ok(None),
    }
}

#[inline]
fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn apply_env_overrides(cfg: &mut Config) -> Result<(), ConfigError> {
    // Store
    if let Some(v) = env_str("TESTBED_STORE_PATH") {
        cfg.store.path = v;
    }

    // Queue
    if let Some(v) = env_parse::<u64>("TESTBED_QUEUE_TICK_MS")? {
        cfg.queue.tick_ms = v;
    }
    if let Some(v) = env_parse::<usize>("TESTBED_QUEUE_FINISHED_CAPACITY")? {
        cfg.queue.finished_capacity = v;
    }

    // Cache
    if let Some(v) = env_parse::<u64>("TESTBED_CACHE_TTL_SECS")? {
        cfg.cache.ttl_secs = v;
    }
    if let Some(v) = env_parse::<u64>("TESTBED_CACHE_GC_INTERVAL_SECS")? {
        cfg.cache.gc_interval_secs = v;
    }

    // Logging
    if let Some(v) = env_str("TESTBED_LOG_LEVEL") {
        cfg.logging.level = v;
    }
    if let Some(v) = env_bool("TESTBED_LOG_JSON")? {
        cfg.logging.json = v;
    }
    if let Some(v) = env_str("TESTBED_LOG_DIR") {
        cfg.logging.log_dir = Some(v);
    }

    // Tools
    if let Some(v) = env_str("TESTBED_BENCH_COMMAND") {
        cfg.tools.bench_command = v;
    }
    if let Some(v) = env_str("TESTBED_COMPLIANCE_COMMAND") {
        cfg.tools.compliance_command = v;
    }

    Ok(())
}

/// Validate higher-level constraints on the resolved configuration.
pub fn validate_config(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.store.path.trim().is_empty() {
        return Err(ConfigError::Validation("store.path must not be empty".into()));
    }

    if cfg.queue.tick_ms == 0 {
        return Err(ConfigError::Validation("queue.tick_ms must be > 0".into()));
    }
    if cfg.queue.finished_capacity == 0 {
        return Err(ConfigError::Validation(
            "queue.finished_capacity must be > 0".into(),
        ));
    }

    if cfg.cache.ttl_secs == 0 {
        return Err(ConfigError::Validation("cache.ttl_secs must be > 0".into()));
    }
    if cfg.cache.gc_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "cache.gc_interval_secs must be > 0".into(),
        ));
    }

    if !LOG_FILTER_REGEX.is_match(&cfg.logging.level) {
        return Err(ConfigError::Validation(format!(
            "invalid logging.level: {}",
            cfg.logging.level
        )));
    }

    for (field, command) in [
        ("tools.bench_command", &cfg.tools.bench_command),
        ("tools.compliance_command", &cfg.tools.compliance_command),
    ] {
        if !COMMAND_REGEX.is_match(command) {
            return Err(ConfigError::Validation(format!(
                "invalid {}: {:?}",
                field, command
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn parse_toml() {
        let f = NamedTempFile::new().expect("tmpfile");
        std::fs::write(
            f.path(),
            r#"
[store]
path = "/var/lib/testbed/testbed.db"

[queue]
tick_ms = 250
"#,
        )
        .unwrap();
        let raw = load_raw_from_file(f.path()).expect("load");
        assert!(raw.cache.is_none());
        let mut cfg = Config::default();
        merge_raw(&mut cfg, raw);
        assert_eq!(cfg.store.path, "/var/lib/testbed/testbed.db");
        assert_eq!(cfg.queue.tick(), Duration::from_millis(250));
        assert_eq!(cfg.queue.finished_capacity, 1000);
    }

    #[test]
    fn parse_yaml() {
        let f = NamedTempFile::new().expect("tmpfile");
        std::fs::write(
            f.path(),
            r#"
cache:
  ttl_secs: 30
  gc_interval_secs: 5
logging:
  level: debug
  json: true
tools:
  bench_command: /opt/testbed/bin/bench
"#,
        )
        .unwrap();
        let mut cfg = Config::default();
        merge_raw(&mut cfg, load_raw_from_file(f.path()).expect("load"));
        assert_eq!(cfg.cache.ttl(), Duration::from_secs(30));
        assert_eq!(cfg.cache.gc_interval(), Duration::from_secs(5));
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.logging.json);
        assert_eq!(cfg.tools.bench_command, "/opt/testbed/bin/bench");
        assert_eq!(cfg.tools.compliance_command, "testbed-s3tests");
        validate_config(&cfg).expect("valid");
    }

    #[test]
    fn parse_json_by_extension() {
        let raw = parse_config_str(r#"{"queue": {"finished_capacity": 5}}"#, Some("json"))
            .expect("json");
        assert_eq!(raw.queue.unwrap().finished_capacity, Some(5));
        assert!(parse_config_str("queue: [", Some("yaml")).is_err());
    }

    #[test]
    fn env_overrides() {
        let keys = [
            "TESTBED_STORE_PATH",
            "TESTBED_QUEUE_TICK_MS",
            "TESTBED_LOG_JSON",
            "TESTBED_COMPLIANCE_COMMAND",
        ];
        for k in &keys {
            std::env::remove_var(k);
        }

        std::env::set_var("TESTBED_STORE_PATH", "/tmp/override.db");
        std::env::set_var("TESTBED_QUEUE_TICK_MS", "50");
        std::env::set_var("TESTBED_LOG_JSON", "yes");
        std::env::set_var("TESTBED_COMPLIANCE_COMMAND", "s3tests-wrapper");

        let cfg = load_config::<&Path>(None).expect("load config");
        assert_eq!(cfg.store.path, "/tmp/override.db");
        assert_eq!(cfg.queue.tick_ms, 50);
        assert!(cfg.logging.json);
        assert_eq!(cfg.tools.compliance_command, "s3tests-wrapper");

        std::env::set_var("TESTBED_QUEUE_TICK_MS", "soon");
        let err = load_config::<&Path>(None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(ref m) if m.contains("TESTBED_QUEUE_TICK_MS")));

        for k in &keys {
            std::env::remove_var(k);
        }
    }

    #[test]
    fn validation() {
        assert!(validate_config(&Config::default()).is_ok());

        let mut cfg = Config::default();
        cfg.queue.tick_ms = 0;
        assert!(matches!(validate_config(&cfg), Err(ConfigError::Validation(_))));

        let mut cfg = Config::default();
        cfg.cache.ttl_secs = 0;
        assert!(validate_config(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.logging.level = "info,sqlx=warn".into();
        assert!(validate_config(&cfg).is_ok());
        cfg.logging.level = "loud".into();
        assert!(validate_config(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.tools.bench_command = "bench; rm -rf /".into();
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn bool_parsing() {
        assert_eq!(parse_bool("TRUE"), Ok(true));
        assert_eq!(parse_bool(" off "), Ok(false));
        assert!(parse_bool("maybe").is_err());
    }
}
