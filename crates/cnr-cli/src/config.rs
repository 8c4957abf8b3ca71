//! Panel configuration – reads/writes `~/.cnr/config.toml`.

use cnr_types::PanelError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted operator configuration stored in `~/.cnr/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Robots shown on the panel, in button order.
    #[serde(default = "default_robots")]
    pub robots: Vec<String>,

    /// Robot holding control and view at startup.
    #[serde(default = "default_robot")]
    pub default_robot: String,

    /// HTTP / WebSocket port of the control panel.
    #[serde(default = "default_webui_port")]
    pub webui_port: u16,

    /// rosbridge endpoint the published messages are relayed to.  Empty
    /// disables forwarding.
    #[serde(default = "default_rosbridge_url")]
    pub rosbridge_url: String,

    /// Base URL of the web video server.
    #[serde(default = "default_video_base_url")]
    pub video_base_url: String,

    /// Backend program and fixed arguments; the mode token is appended.
    #[serde(default = "default_backend_command")]
    pub backend_command: Vec<String>,

    /// Teleop frames accepted per second on each browser connection.
    #[serde(default = "default_command_rate")]
    pub command_rate_per_sec: u32,
}

fn default_robots() -> Vec<String> {
    ["Deckard", "Roy", "Pris", "Zhora"].map(String::from).to_vec()
}
fn default_robot() -> String {
    "Deckard".to_string()
}
fn default_webui_port() -> u16 {
    8080
}
fn default_rosbridge_url() -> String {
    "ws://localhost:9090".to_string()
}
fn default_video_base_url() -> String {
    "http://localhost:8081".to_string()
}
fn default_backend_command() -> Vec<String> {
    vec!["sh".to_string(), "scripts/backend.sh".to_string()]
}
fn default_command_rate() -> u32 {
    cnr_cockpit::DEFAULT_COMMAND_RATE
}

impl Default for Config {
    fn default() -> Self {
        Self {
            robots: default_robots(),
            default_robot: default_robot(),
            webui_port: default_webui_port(),
            rosbridge_url: default_rosbridge_url(),
            video_base_url: default_video_base_url(),
            backend_command: default_backend_command(),
            command_rate_per_sec: default_command_rate(),
        }
    }
}

/// Return the path to `~/.cnr/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".cnr").join("config.toml")
}

/// Load the config file as written.  Returns `None` if it does not exist.
/// Environment overrides are not applied; see [`with_env_overrides`].
pub fn load() -> Result<Option<Config>, PanelError> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, PanelError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| PanelError::Config(format!("failed to read {}: {e}", path.display())))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| PanelError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply `CNR_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `CNR_ROSBRIDGE_URL` | `rosbridge_url` |
/// | `CNR_WEBUI_PORT` | `webui_port` |
/// | `CNR_VIDEO_URL` | `video_base_url` |
/// | `CNR_BACKEND_COMMAND` | `backend_command` (split on whitespace) |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("CNR_ROSBRIDGE_URL") {
        cfg.rosbridge_url = v;
    }
    if let Ok(v) = std::env::var("CNR_WEBUI_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.webui_port = port;
    }
    if let Ok(v) = std::env::var("CNR_VIDEO_URL") {
        cfg.video_base_url = v;
    }
    if let Ok(v) = std::env::var("CNR_BACKEND_COMMAND") {
        let command: Vec<String> = v.split_whitespace().map(String::from).collect();
        if !command.is_empty() {
            cfg.backend_command = command;
        }
    }
}

/// The configuration a run uses: `base` (file contents, wizard answers or
/// defaults) with the `CNR_*` overrides on top.
pub fn with_env_overrides(mut base: Config) -> Config {
    apply_env_overrides(&mut base);
    base
}

/// Save the config to disk, creating `~/.cnr/` if necessary.
pub fn save(cfg: &Config) -> Result<(), PanelError> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), PanelError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| PanelError::Config(format!("failed to create config directory: {e}")))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| PanelError::Config(format!("failed to set config directory permissions: {e}")))?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| PanelError::Config(format!("failed to serialize config: {e}")))?;
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(|e| PanelError::Config(format!("failed to write {}: {e}", path.display())))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(|e| PanelError::Config(format!("failed to write {}: {e}", path.display())))?;
    Ok(())
}
