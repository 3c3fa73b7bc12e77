//! Model endpoint configuration
//!
//! Stores non-secret endpoint settings in ~/.config/redline/config.json.
//! The API key is taken from the command line or the REDLINE_API_KEY
//! environment variable only and is never written to disk.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Volcano Engine (Ark) OpenAI-compatible gateway, the endpoint the tool
/// was first built against. Any /chat/completions-compatible base works.
pub const DEFAULT_BASE_URL: &str = "https://ark.cn-beijing.volces.com/api/v3";

pub const API_KEY_ENV: &str = "REDLINE_API_KEY";

/// Everything a request needs to reach a chat-completion endpoint.
///
/// Passed by value into each call; the resolver never reads ambient state,
/// so there is no process-wide default to misconfigure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub model_name: String,
    /// Endpoint ID of the deployed model (the `model` field of the request).
    #[serde(default)]
    pub model_id: String,
    #[serde(skip)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_name: String::new(),
            model_id: String::new(),
            api_key: String::new(),
            base_url: default_base_url(),
        }
    }
}

impl ModelConfig {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("redline"))
    }

    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.json"))
    }

    /// Load stored settings from disk, or return defaults.
    ///
    /// The loaded value never carries an API key; see [`api_key_from_env`].
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            if let Ok(content) = fs::read_to_string(&path) {
                match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(err) => {
                        preserve_corrupt_config(&path, &content);
                        eprintln!(
                            "  Warning: Config file was corrupted ({}). A backup was saved and defaults were loaded.",
                            err
                        );
                    }
                }
            }
        }
        Self::default()
    }

    /// Save the non-secret settings to disk.
    pub fn save(&self) -> Result<(), String> {
        let dir =
            Self::config_dir().ok_or_else(|| "Could not determine config directory".to_string())?;

        fs::create_dir_all(&dir).map_err(|e| format!("Failed to create config directory: {}", e))?;

        let path = dir.join("config.json");
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        fs::write(&path, content).map_err(|e| format!("Failed to write config: {}", e))?;

        Ok(())
    }

    /// Check whether the endpoint base URL looks usable; returns a warning
    /// message for suspicious but non-fatal cases.
    pub fn check_base_url(&self) -> Result<Option<String>, String> {
        let parsed = url::Url::parse(&self.base_url)
            .map_err(|e| format!("Invalid base URL '{}': {}", self.base_url, e))?;
        if parsed.scheme() != "https" {
            return Ok(Some(format!(
                "base URL '{}' is not https; most chat-completion gateways require it",
                self.base_url
            )));
        }
        Ok(None)
    }

    /// Get the config file location for display
    pub fn config_location() -> String {
        Self::config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "~/.config/redline/config.json".to_string())
    }
}

/// Read the API key from the environment, if set and non-empty.
pub fn api_key_from_env() -> Option<String> {
    match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => Some(key),
        _ => None,
    }
}

/// Interactive prompt to store endpoint settings (never the API key).
pub fn setup_interactive() -> Result<ModelConfig, String> {
    use std::io::{self};

    let mut config = ModelConfig::load();

    println!();
    println!("  ┌─────────────────────────────────────────────────────────┐");
    println!("  │  REDLINE ENDPOINT SETUP                                 │");
    println!("  └─────────────────────────────────────────────────────────┘");
    println!();
    println!("  redline talks to any OpenAI-compatible /chat/completions endpoint.");
    println!("  The API key is NOT stored here; export {} instead.", API_KEY_ENV);
    println!();

    config.model_name = prompt_line("Model name (display only)", &config.model_name)?;
    config.model_id = prompt_line("Model / endpoint ID", &config.model_id)?;
    config.base_url = prompt_line("Base URL", &config.base_url)?;

    if let Some(warning) = config.check_base_url()? {
        println!();
        println!("  Warning: {}", warning);
        println!("     Saving anyway...");
    }

    config.save()?;

    println!();
    println!("  + Settings saved to {}", ModelConfig::config_location());
    println!("  + Provide the key per run: export {}=sk-...", API_KEY_ENV);
    println!();

    io::stdout().flush().map_err(|e| e.to_string())?;
    Ok(config)
}

fn prompt_line(label: &str, current: &str) -> Result<String, String> {
    use std::io::{self, Write};

    if current.is_empty() {
        print!("  {}: ", label);
    } else {
        print!("  {} [{}]: ", label, current);
    }
    io::stdout().flush().map_err(|e| e.to_string())?;

    let mut value = String::new();
    io::stdin().read_line(&mut value).map_err(|e| e.to_string())?;
    let value = value.trim();

    if value.is_empty() {
        Ok(current.to_string())
    } else {
        Ok(value.to_string())
    }
}

fn preserve_corrupt_config(path: &std::path::Path, content: &str) {
    let corrupt_path = path.with_extension("json.corrupt");
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
}
