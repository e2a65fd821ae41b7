//! Configuration for chat sessions and the room harness.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/chronochat/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    session: SessionFileConfig,
    harness: HarnessFileConfig,
}

/// `[session]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SessionFileConfig {
    heartbeat_interval_ms: Option<u64>,
    alive_timeout_ms: Option<u64>,
    staleness_threshold_ms: Option<u64>,
    fetch_lifetime_ms: Option<u64>,
    cache_capacity: Option<usize>,
    sync_broadcast_prefix: Option<String>,
}

/// `[harness]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct HarnessFileConfig {
    hub_prefix: Option<String>,
    chat_room: Option<String>,
    screen_name: Option<String>,
    participants: Option<usize>,
    messages: Option<usize>,
    chat_delay_ms: Option<u64>,
    drain_ms: Option<u64>,
    pump_interval_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Protocol constants of a chat session.
///
/// The defaults are the values every participant in a room is expected to
/// share; overriding them is meant for test environments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Period of the presence heartbeat.
    pub heartbeat_interval: Duration,
    /// Delay after a delivery before checking whether the sender went silent.
    pub alive_timeout: Duration,
    /// Age beyond which a delivered message is ignored.
    pub staleness_threshold: Duration,
    /// Lifetime of the interests expressed to fetch peer messages.
    pub fetch_lifetime: Duration,
    /// Number of own messages kept to answer fetches.
    pub cache_capacity: usize,
    /// Broadcast prefix of the sync group.
    pub sync_broadcast_prefix: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(60),
            alive_timeout: Duration::from_secs(120),
            staleness_threshold: Duration::from_secs(120),
            fetch_lifetime: Duration::from_millis(5000),
            cache_capacity: 100,
            sync_broadcast_prefix: "/ndn/broadcast/ChronoChat-0.3".to_string(),
        }
    }
}

/// Settings for the simulated room run by `chronochat-harness`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Routable hub prefix under which chat prefixes are built.
    pub hub_prefix: String,
    /// Chat room name.
    pub chat_room: String,
    /// Base screen name; participant `i` is `{screen_name}{i}`.
    pub screen_name: String,
    /// Number of simulated participants.
    pub participants: usize,
    /// Messages each participant sends.
    pub messages: usize,
    /// Delay between consecutive chat rounds.
    pub chat_delay: Duration,
    /// How long to keep pumping after the last message.
    pub drain: Duration,
    /// Interval of the event pump.
    pub pump_interval: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            hub_prefix: "/ndn/edu/ucla/remap".to_string(),
            chat_room: "ndnchat".to_string(),
            screen_name: "user".to_string(),
            participants: 3,
            messages: 10,
            chat_delay: Duration::from_millis(200),
            drain: Duration::from_secs(2),
            pump_interval: Duration::from_millis(10),
        }
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Session protocol constants.
    pub session: SessionConfig,
    /// Harness settings.
    pub harness: HarnessConfig,
}

impl Config {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an
    /// error. Otherwise the default path is tried and silently ignored if
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Priority: CLI > file > default.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();
        let s = &file.session;
        let h = &file.harness;

        let session = SessionConfig {
            heartbeat_interval: s
                .heartbeat_interval_ms
                .map_or(defaults.session.heartbeat_interval, Duration::from_millis),
            alive_timeout: s
                .alive_timeout_ms
                .map_or(defaults.session.alive_timeout, Duration::from_millis),
            staleness_threshold: s
                .staleness_threshold_ms
                .map_or(defaults.session.staleness_threshold, Duration::from_millis),
            fetch_lifetime: s
                .fetch_lifetime_ms
                .map_or(defaults.session.fetch_lifetime, Duration::from_millis),
            cache_capacity: s
                .cache_capacity
                .unwrap_or(defaults.session.cache_capacity),
            sync_broadcast_prefix: s
                .sync_broadcast_prefix
                .clone()
                .unwrap_or(defaults.session.sync_broadcast_prefix),
        };

        let harness = HarnessConfig {
            hub_prefix: cli
                .hub_prefix
                .clone()
                .or_else(|| h.hub_prefix.clone())
                .unwrap_or(defaults.harness.hub_prefix),
            chat_room: cli
                .room
                .clone()
                .or_else(|| h.chat_room.clone())
                .unwrap_or(defaults.harness.chat_room),
            screen_name: cli
                .screen_name
                .clone()
                .or_else(|| h.screen_name.clone())
                .unwrap_or(defaults.harness.screen_name),
            participants: cli
                .participants
                .or(h.participants)
                .unwrap_or(defaults.harness.participants),
            messages: cli
                .messages
                .or(h.messages)
                .unwrap_or(defaults.harness.messages),
            chat_delay: cli
                .chat_delay_ms
                .or(h.chat_delay_ms)
                .map_or(defaults.harness.chat_delay, Duration::from_millis),
            drain: h
                .drain_ms
                .map_or(defaults.harness.drain, Duration::from_millis),
            pump_interval: h
                .pump_interval_ms
                .map_or(defaults.harness.pump_interval, Duration::from_millis),
        };

        Self { session, harness }
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Simulated ChronoChat room with delivery statistics")]
pub struct CliArgs {
    /// Hub prefix chat prefixes are built under.
    #[arg(long, env = "CHRONOCHAT_HUB")]
    pub hub_prefix: Option<String>,

    /// Chat room name.
    #[arg(long, env = "CHRONOCHAT_ROOM")]
    pub room: Option<String>,

    /// Base screen name for simulated participants.
    #[arg(long)]
    pub screen_name: Option<String>,

    /// Number of simulated participants.
    #[arg(short = 'n', long)]
    pub participants: Option<usize>,

    /// Messages sent by each participant.
    #[arg(short, long)]
    pub messages: Option<usize>,

    /// Delay between chat rounds in milliseconds.
    #[arg(long)]
    pub chat_delay_ms: Option<u64>,

    /// Path to config file (default: `~/.config/chronochat/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "CHRONOCHAT_LOG")]
    pub log_level: String,

    /// Path to log file (default: stderr).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist. Otherwise the default
/// path is tried and a missing file is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }

    let Some(config_dir) = dirs::config_dir() else {
        return Ok(ConfigFile::default());
    };
    let path = config_dir.join("chronochat").join("config.toml");

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
