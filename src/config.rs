//! Configuration for contentfaux.
//!
//! Settings are merged from four layers, highest precedence first:
//! environment variables, the project settings file (`contentfaux.yaml`),
//! the `config.contentfaux` block of `package.json` and built-in defaults.

use crate::remote::DEFAULT_API_HOST;
use crate::sync::SyncConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Name of the project settings file.
pub const SETTINGS_FILE: &str = "contentfaux.yaml";

/// Node manifest whose `config.contentfaux` block is also honoured.
pub const PACKAGE_MANIFEST: &str = "package.json";

/// Fixture directory used when nothing else is configured.
pub const DEFAULT_FIXTURE_DIR: &str = "./contentfaux";

/// Listen address for the loopback stub server.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:4010";

pub const ENV_SPACE_ID: &str = "CONTENTFAUX_SPACEID";
pub const ENV_API_KEY: &str = "CONTENTFAUX_APIKEY";
pub const ENV_DIR: &str = "CONTENTFAUX_DIR";
pub const ENV_PREVIEW: &str = "CONTENTFAUX_PREVIEW";
pub const ENV_HOST: &str = "CONTENTFAUX_HOST";
pub const ENV_LISTEN: &str = "CONTENTFAUX_LISTEN";

/// What the controller does when asked to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Start intercepting requests.
    #[default]
    Stub,
    /// Stop intercepting requests.
    Unstub,
    /// Sync fixtures from the live API.
    Setup,
}

/// One configuration layer. Unset fields fall through to the next layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsLayer {
    #[serde(default)]
    pub space_id: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Fixture directory, relative to the project root unless absolute
    #[serde(default)]
    pub fixture_dir: Option<PathBuf>,

    /// Use the preview API instead of the CDN
    #[serde(default)]
    pub preview: Option<bool>,

    #[serde(default)]
    pub api_host: Option<String>,

    /// Loopback stub server address
    #[serde(default)]
    pub listen: Option<SocketAddr>,

    /// Run the configured command as soon as the controller is built
    #[serde(default)]
    pub autorun: Option<bool>,

    #[serde(default)]
    pub command: Option<Command>,
}

impl SettingsLayer {
    /// Load a layer from a YAML settings file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a YAML layer. Blank strings count as unset, except a blank
    /// `fixture_dir`, which is kept so sync can reject it.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let layer: Self = serde_yaml::from_str(yaml)?;
        Ok(Self {
            space_id: non_blank(layer.space_id),
            api_key: non_blank(layer.api_key),
            api_host: non_blank(layer.api_host),
            ..layer
        })
    }

    /// Load `contentfaux.yaml` from `root` if it exists.
    pub fn from_project(root: &Path) -> anyhow::Result<Self> {
        let path = root.join(SETTINGS_FILE);
        if path.exists() {
            Self::from_file(&path).map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))
        } else {
            Ok(Self::default())
        }
    }

    /// Read the `config.contentfaux` block of `package.json` in `root`.
    ///
    /// That block uses the `spaceid`/`apikey`/`directory` keys. A missing
    /// manifest or block yields an empty layer.
    pub fn from_package_manifest(root: &Path) -> anyhow::Result<Self> {
        let path = root.join(PACKAGE_MANIFEST);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        let manifest: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?;
        let Some(block) = manifest.pointer("/config/contentfaux") else {
            return Ok(Self::default());
        };
        let text = |key: &str| {
            block
                .get(key)
                .and_then(serde_json::Value::as_str)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Ok(Self {
            space_id: text("spaceid"),
            api_key: text("apikey"),
            fixture_dir: text("directory").map(PathBuf::from),
            preview: block.get("preview").and_then(serde_json::Value::as_bool),
            ..Self::default()
        })
    }

    /// Build a layer from environment lookups. Empty values count as unset;
    /// unparseable values are rejected.
    pub fn from_env<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let preview = get(ENV_PREVIEW)
            .map(|v| {
                parse_flag(&v)
                    .ok_or_else(|| anyhow::anyhow!("{}: invalid boolean {:?}", ENV_PREVIEW, v))
            })
            .transpose()?;
        let listen = get(ENV_LISTEN)
            .map(|v| {
                v.parse::<SocketAddr>()
                    .map_err(|e| anyhow::anyhow!("{}: {}", ENV_LISTEN, e))
            })
            .transpose()?;

        Ok(Self {
            space_id: get(ENV_SPACE_ID),
            api_key: get(ENV_API_KEY),
            fixture_dir: get(ENV_DIR).map(PathBuf::from),
            preview,
            api_host: get(ENV_HOST),
            listen,
            autorun: None,
            command: None,
        })
    }

    /// Read the process environment.
    pub fn from_process_env() -> anyhow::Result<Self> {
        Self::from_env(|key| std::env::var(key).ok())
    }

    /// Fill unset fields from `lower`.
    #[must_use]
    pub fn or(self, lower: SettingsLayer) -> Self {
        Self {
            space_id: self.space_id.or(lower.space_id),
            api_key: self.api_key.or(lower.api_key),
            fixture_dir: self.fixture_dir.or(lower.fixture_dir),
            preview: self.preview.or(lower.preview),
            api_host: self.api_host.or(lower.api_host),
            listen: self.listen.or(lower.listen),
            autorun: self.autorun.or(lower.autorun),
            command: self.command.or(lower.command),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn is_blank_path(path: &Path) -> bool {
    path.as_os_str().to_string_lossy().trim().is_empty()
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub space_id: String,
    pub api_key: String,
    /// Absolute once resolved against the project root. Left empty when
    /// configured blank.
    pub fixture_dir: PathBuf,
    pub preview: bool,
    pub api_host: String,
    pub listen: SocketAddr,
    pub autorun: bool,
    pub command: Command,
}

impl Default for Settings {
    fn default() -> Self {
        Self::merge(&[], Path::new("."))
    }
}

impl Settings {
    /// Merge `layers` (highest precedence first) over the defaults.
    /// A relative fixture directory is resolved against `root`; a blank one
    /// stays empty instead of collapsing onto `root`.
    pub fn merge(layers: &[SettingsLayer], root: &Path) -> Self {
        let merged = layers
            .iter()
            .cloned()
            .fold(SettingsLayer::default(), SettingsLayer::or);

        let fixture_dir = match merged.fixture_dir {
            Some(dir) if is_blank_path(&dir) => PathBuf::new(),
            Some(dir) if dir.is_absolute() => dir,
            Some(dir) => root.join(dir),
            None => root.join(DEFAULT_FIXTURE_DIR),
        };

        Self {
            space_id: merged.space_id.unwrap_or_default(),
            api_key: merged.api_key.unwrap_or_default(),
            fixture_dir,
            preview: merged.preview.unwrap_or(false),
            api_host: merged
                .api_host
                .unwrap_or_else(|| DEFAULT_API_HOST.to_string()),
            listen: merged.listen.unwrap_or_else(default_listen),
            autorun: merged.autorun.unwrap_or(false),
            command: merged.command.unwrap_or_default(),
        }
    }

    /// Resolve settings for the project at `root`: environment, then
    /// `contentfaux.yaml`, then `package.json`, then defaults.
    pub fn resolve(root: &Path) -> anyhow::Result<Self> {
        Self::resolve_with(root, SettingsLayer::from_process_env()?)
    }

    /// As [`resolve`](Self::resolve), with an explicit environment layer.
    pub fn resolve_with(root: &Path, env: SettingsLayer) -> anyhow::Result<Self> {
        let file = SettingsLayer::from_project(root)?;
        let manifest = SettingsLayer::from_package_manifest(root)?;
        Ok(Self::merge(&[env, file, manifest], root))
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            space_id: self.space_id.clone(),
            api_key: self.api_key.clone(),
            fixture_dir: self.fixture_dir.clone(),
            preview: self.preview,
            api_host: self.api_host.clone(),
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 4010))
}
