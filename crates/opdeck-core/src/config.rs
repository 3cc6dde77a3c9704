//! Centralized configuration for the opdeck console.
//!
//! The registries here (managed services, allowed applications, scripts
//! directory) are built once at startup and shared read-only with the
//! controller. Tunable constants live on unit structs, one per concern.

use crate::error::{ConsoleError, Result};
use crate::process::{LaunchSpec, MatchRule};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "opdeck";
    pub const CONFIG_FILE_NAME: &'static str = "config.json";
    pub const SCRIPTS_DIR_NAME: &'static str = "scripts";
}

/// Health probe timing.
pub struct ProbeConfig;

impl ProbeConfig {
    /// Timeout for the liveness request of a probe.
    pub const LIVENESS_TIMEOUT: Duration = Duration::from_secs(1);
    /// Timeout for the detail request that follows a successful liveness check.
    pub const DETAIL_TIMEOUT: Duration = Duration::from_secs(2);
    pub const OLLAMA_BASE_URL: &'static str = "http://127.0.0.1:11434";
    pub const INVOKEAI_BASE_URL: &'static str = "http://127.0.0.1:9090";
}

/// HTTP health probe attached to a managed service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HealthProbe {
    /// Ollama-style API: banner on `/`, loaded models on `/api/ps`.
    Ollama { base_url: String },
    /// InvokeAI-style API: version endpoint plus the default queue status.
    InvokeAi { base_url: String },
}

/// A logical service managed by the console.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Registry key, e.g. `ollama`.
    pub name: String,
    /// Human readable name used in messages.
    #[serde(default)]
    pub display_name: Option<String>,
    /// How the service is recognised in the process table.
    pub match_rule: MatchRule,
    /// How the service is started.
    pub launch: LaunchSpec,
    /// Optional HTTP probe for richer status.
    #[serde(default)]
    pub probe: Option<HealthProbe>,
}

impl ServiceDescriptor {
    /// The LLM inference server: `ollama serve`.
    pub fn ollama() -> Self {
        Self {
            name: "ollama".to_string(),
            display_name: Some("Ollama".to_string()),
            match_rule: MatchRule::NameAndToken {
                name: "ollama".to_string(),
                token: "serve".to_string(),
            },
            launch: LaunchSpec::new("ollama").with_arg("serve"),
            probe: Some(HealthProbe::Ollama {
                base_url: ProbeConfig::OLLAMA_BASE_URL.to_string(),
            }),
        }
    }

    /// The image-generation server. Its launcher is a Python entry point, so
    /// the identifying name only shows up inside a longer command-line token.
    pub fn invokeai() -> Self {
        Self {
            name: "invokeai".to_string(),
            display_name: Some("InvokeAI".to_string()),
            match_rule: MatchRule::CmdlineSubstring {
                needle: "invokeai-web".to_string(),
            },
            launch: LaunchSpec::new("invokeai-web"),
            probe: Some(HealthProbe::InvokeAi {
                base_url: ProbeConfig::INVOKEAI_BASE_URL.to_string(),
            }),
        }
    }

    /// Name used in user-facing messages.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

/// An entry of the start whitelist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedApplication {
    pub key: String,
    pub executable_path: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl AllowedApplication {
    pub fn new(key: impl Into<String>, executable_path: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            executable_path: executable_path.into(),
            args: Vec::new(),
        }
    }
}

/// Static registries for the console.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub services: Vec<ServiceDescriptor>,
    pub allowed_apps: Vec<AllowedApplication>,
    pub scripts_dir: PathBuf,
    /// Lowercase extensions (with the dot) a runnable script may have.
    pub script_extensions: Vec<String>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            services: vec![ServiceDescriptor::ollama(), ServiceDescriptor::invokeai()],
            allowed_apps: vec![AllowedApplication::new("notepad", "notepad.exe")],
            scripts_dir: default_scripts_dir(),
            script_extensions: [".bat", ".cmd", ".sh", ".ps1"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ConsoleConfig {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).map_err(|e| ConsoleError::io_with_path(e, path))?;
        let config: ConsoleConfig = serde_json::from_str(&content)?;
        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load `path` if given, otherwise the default location if it exists,
    /// otherwise the built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => {
                debug!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Check the registries for entries that could never match or launch.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for service in &self.services {
            if service.name.trim().is_empty() {
                return Err(config_error("service name must not be empty"));
            }
            if !names.insert(service.name.to_lowercase()) {
                return Err(config_error(format!(
                    "duplicate service name: {}",
                    service.name
                )));
            }
            if !service.match_rule.is_well_formed() {
                return Err(config_error(format!(
                    "match rule for {} has an empty pattern",
                    service.name
                )));
            }
            if service.launch.program.trim().is_empty() {
                return Err(config_error(format!(
                    "launch program for {} must not be empty",
                    service.name
                )));
            }
        }

        let mut keys = HashSet::new();
        for app in &self.allowed_apps {
            if app.key.trim().is_empty() || app.executable_path.trim().is_empty() {
                return Err(config_error("allowed application entries need a key and a path"));
            }
            if !keys.insert(app.key.as_str()) {
                return Err(config_error(format!("duplicate application key: {}", app.key)));
            }
        }

        Ok(())
    }

    /// Look up a service by name (case-insensitive).
    pub fn service(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.services
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Look up a whitelisted application by exact key.
    pub fn allowed_app(&self, key: &str) -> Option<&AllowedApplication> {
        self.allowed_apps.iter().find(|a| a.key == key)
    }
}

fn config_error(message: impl Into<String>) -> ConsoleError {
    ConsoleError::Config {
        message: message.into(),
    }
}

/// `<config dir>/opdeck/config.json`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(AppConfig::APP_NAME).join(AppConfig::CONFIG_FILE_NAME))
}

/// `scripts/` next to the running executable, or relative to the cwd.
fn default_scripts_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.join(AppConfig::SCRIPTS_DIR_NAME)))
        .unwrap_or_else(|| PathBuf::from(AppConfig::SCRIPTS_DIR_NAME))
}
