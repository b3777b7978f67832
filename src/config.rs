//! User Configuration Management
//!
//! This module handles loading and saving the per-edition settings document.
//! Settings are stored in the user's XDG config directory as JSON.
//!
//! # Storage Location
//!
//! - Linux: `$XDG_CONFIG_HOME/pydist-suite/config_<edition>.json` or
//!   `~/.config/pydist-suite/config_<edition>.json`
//!
//! # Fallback
//!
//! Every key has an edition-specific default. Keys missing from the document
//! take that default; a document that cannot be parsed yields the defaults
//! unchanged.

use anyhow::Result;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "pydist-suite";

#[cfg(windows)]
const DEFAULT_INTERPRETER: &str = "python";
#[cfg(not(windows))]
const DEFAULT_INTERPRETER: &str = "python3";

/// Which flavour of the suite is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Edition {
    /// Packaging only.
    #[value(name = "std")]
    Standard,
    /// Packaging plus wrapper injection, placeholder scan and repo assets.
    #[value(name = "pro")]
    Pro,
}

impl Edition {
    /// File name of this edition's settings document. The two editions
    /// never share a file.
    pub fn config_file_name(self) -> &'static str {
        match self {
            Edition::Standard => "config_std.json",
            Edition::Pro => "config_pro.json",
        }
    }

    /// Whether the Pro-only steps (wrapper, scan, assets) apply.
    pub fn is_pro(self) -> bool {
        self == Edition::Pro
    }
}

/// Packaging engine reachable through the Python interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    PyInstaller,
    Nuitka,
}

impl Engine {
    pub const ALL: [Engine; 2] = [Engine::PyInstaller, Engine::Nuitka];

    /// Importable module name. PyInstaller is the one engine whose module
    /// name differs in case from its identifier.
    pub fn module(self) -> &'static str {
        match self {
            Engine::PyInstaller => "PyInstaller",
            Engine::Nuitka => "nuitka",
        }
    }

    /// Identifier as stored in the settings document and offered to pip.
    pub fn id(self) -> &'static str {
        match self {
            Engine::PyInstaller => "pyinstaller",
            Engine::Nuitka => "nuitka",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Engine::PyInstaller => "PyInstaller",
            Engine::Nuitka => "Nuitka",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeChoice {
    Light,
    Dark,
}

impl ThemeChoice {
    pub fn toggled(self) -> Self {
        match self {
            ThemeChoice::Light => ThemeChoice::Dark,
            ThemeChoice::Dark => ThemeChoice::Light,
        }
    }
}

/// Program (plus leading arguments) used to reach the packaging engines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpreter {
    pub program: String,
    pub args: Vec<String>,
}

impl Interpreter {
    /// Start a command for this interpreter with its leading arguments
    /// already applied.
    pub fn command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

/// The persisted settings document.
///
/// Only `engine`, `theme`, `integrity_check`, `cve_scan` and the interpreter
/// fields influence a run. The rest are carried so that a round trip through
/// the application never drops a key a user wrote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub engine: Engine,
    pub theme: ThemeChoice,
    pub multi_arch: bool,
    pub version: String,
    pub github_user: String,
    pub last_mode: String,
    pub use_venv: bool,
    pub integrity_check: bool,
    pub stealth_mode: bool,
    pub cve_scan: bool,
    pub interpreter: String,
    pub interpreter_args: Vec<String>,
}

impl Settings {
    /// Defaults for the given edition.
    pub fn defaults(edition: Edition) -> Self {
        let pro = edition.is_pro();
        Self {
            engine: if pro { Engine::Nuitka } else { Engine::PyInstaller },
            theme: ThemeChoice::Light,
            multi_arch: false,
            version: "1.0.2.0".to_string(),
            github_user: "Developer".to_string(),
            last_mode: "window".to_string(),
            use_venv: pro,
            integrity_check: pro,
            stealth_mode: false,
            cve_scan: pro,
            interpreter: DEFAULT_INTERPRETER.to_string(),
            interpreter_args: Vec::new(),
        }
    }

    /// Parse a settings document, filling missing keys from the edition's
    /// defaults. Any parse or type error yields the defaults unchanged.
    pub fn from_json(content: &str, edition: Edition) -> Self {
        let defaults = Self::defaults(edition);
        match Self::merge(content, &defaults) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring malformed settings document: {}", e);
                defaults
            }
        }
    }

    fn merge(content: &str, defaults: &Self) -> Result<Self> {
        let overrides: serde_json::Value = serde_json::from_str(content)?;
        let serde_json::Value::Object(overrides) = overrides else {
            anyhow::bail!("settings document is not a JSON object");
        };

        let mut merged = serde_json::to_value(defaults)?;
        if let serde_json::Value::Object(base) = &mut merged {
            for (key, value) in overrides {
                if base.contains_key(&key) {
                    base.insert(key, value);
                }
            }
        }

        Ok(serde_json::from_value(merged)?)
    }

    /// The interpreter the engines are reached through.
    pub fn interpreter(&self) -> Interpreter {
        Interpreter {
            program: self.interpreter.clone(),
            args: self.interpreter_args.clone(),
        }
    }
}

/// Get the path to an edition's settings file.
///
/// Uses `$XDG_CONFIG_HOME` when set, the platform config directory
/// otherwise. The directory is created if it doesn't exist.
///
/// # Arguments
///
/// * `edition` - Selects `config_std.json` or `config_pro.json`
///
/// # Errors
///
/// Returns an error if:
/// - The config directory cannot be determined
/// - The config directory cannot be created
pub fn get_config_path(edition: Edition) -> Result<PathBuf> {
    let config_dir = if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config)
    } else if let Some(home) = directories::BaseDirs::new() {
        home.config_dir().to_path_buf()
    } else {
        return Err(anyhow::anyhow!("Could not determine config directory"));
    };

    let app_config_dir = config_dir.join(APP_DIR);
    if !app_config_dir.exists() {
        fs::create_dir_all(&app_config_dir)?;
        info!("Created config directory: {:?}", app_config_dir);
    }

    Ok(app_config_dir.join(edition.config_file_name()))
}

/// Load the settings for an edition. Never fails: unreadable or missing
/// documents degrade to the defaults.
pub fn load_settings(edition: Edition) -> Settings {
    match get_config_path(edition) {
        Ok(path) => load_settings_from(&path, edition),
        Err(e) => {
            warn!("Failed to get config path: {}", e);
            Settings::defaults(edition)
        }
    }
}

/// Load settings from an explicit path.
///
/// # Arguments
///
/// * `path` - The settings document to read
/// * `edition` - Supplies the defaults for missing keys and bad documents
///
/// # Returns
///
/// The merged settings. A missing or unreadable file yields the defaults.
pub fn load_settings_from(path: &Path, edition: Edition) -> Settings {
    if !path.exists() {
        info!("No config file found at {:?}", path);
        return Settings::defaults(edition);
    }

    match fs::read_to_string(path) {
        Ok(content) => {
            info!("Loaded config from {:?}", path);
            Settings::from_json(&content, edition)
        }
        Err(e) => {
            warn!("Failed to read config: {}", e);
            Settings::defaults(edition)
        }
    }
}

/// Save the settings for an edition to its config file.
///
/// # Arguments
///
/// * `edition` - Which edition's file to write
/// * `settings` - The settings to save
///
/// # Errors
///
/// Returns an error if the config path cannot be determined or the file
/// cannot be written.
pub fn save_settings(edition: Edition, settings: &Settings) -> Result<()> {
    let path = get_config_path(edition)?;
    save_settings_to(&path, settings)
}

/// Serialize `settings` as pretty JSON to `path`, replacing the file.
///
/// # Errors
///
/// Returns an error if serialization fails or the file cannot be written.
pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<()> {
    let content = serde_json::to_string_pretty(settings)?;
    fs::write(path, content)?;
    info!("Saved config to {:?}", path);
    Ok(())
}
