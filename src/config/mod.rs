use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::llm::LlmProvider;
use crate::prompts::PromptMode;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub general: GeneralConfig,
    pub llm: LlmConfig,
    pub panel: PanelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// trace, debug, info, warn or error
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub gemini: GeminiConfig,
    pub ollama: OllamaConfig,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
}

/// What to do when an edit targets a file that does not exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmCreate {
    /// Ask on the controlling terminal
    Prompt,
    Always,
    Never,
}

impl FromStr for ConfirmCreate {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "prompt" => Ok(ConfirmCreate::Prompt),
            "always" => Ok(ConfirmCreate::Always),
            "never" => Ok(ConfirmCreate::Never),
            _ => Err(anyhow::anyhow!("Unknown confirm_create value: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    pub mode: PromptMode,
    pub confirm_create: ConfirmCreate,
    /// Label shown next to commands handed to the terminal
    pub terminal_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig {
                log_level: "info".to_string(),
            },
            llm: LlmConfig {
                provider: LlmProvider::Gemini,
                gemini: GeminiConfig {
                    api_key: None,
                    model: "gemini-2.5-flash".to_string(),
                },
                ollama: OllamaConfig {
                    base_url: "http://localhost:11434".to_string(),
                    model: "qwen3:8b".to_string(),
                },
                timeout_seconds: 120,
            },
            panel: PanelConfig {
                mode: PromptMode::Workspace,
                confirm_create: ConfirmCreate::Prompt,
                terminal_name: "Workspace".to_string(),
            },
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        // Environment fills in whatever the file leaves out
        config.load_env_vars();
        Ok(config)
    }

    /// Save without secrets.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut safe_config = self.clone();
        safe_config.sanitize_for_save();

        let content = toml::to_string_pretty(&safe_config).context("Failed to serialize config")?;

        // Create directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
        Ok(home.join(".natural-git").join("config.toml"))
    }

    fn load_env_vars(&mut self) {
        if self.llm.gemini.api_key.is_none() {
            self.llm.gemini.api_key = std::env::var("GEMINI_API_KEY").ok();
        }
    }

    // API keys only ever come from the environment
    fn sanitize_for_save(&mut self) {
        self.llm.gemini.api_key = None;
    }

    /// Apply `key=value` overrides from the command line.
    pub fn merge_overrides(&mut self, overrides: Vec<(String, String)>) -> Result<()> {
        for (key, value) in overrides {
            match key.as_str() {
                "log_level" => self.general.log_level = value,
                "provider" => self.llm.provider = value.parse()?,
                // Applies to whichever provider is selected at this point
                "model" => match self.llm.provider {
                    LlmProvider::Gemini => self.llm.gemini.model = value,
                    LlmProvider::Ollama => self.llm.ollama.model = value,
                },
                "ollama_url" => self.llm.ollama.base_url = value,
                "timeout" => {
                    self.llm.timeout_seconds = value
                        .parse()
                        .with_context(|| format!("Invalid timeout: {}", value))?
                }
                "mode" => {
                    self.panel.mode = match value.to_lowercase().as_str() {
                        "workspace" => PromptMode::Workspace,
                        "git" => PromptMode::Git,
                        _ => bail!("Unknown mode: {}", value),
                    }
                }
                "confirm_create" => self.panel.confirm_create = value.parse()?,
                "terminal_name" => self.panel.terminal_name = value,
                _ => bail!("Unknown config key: {}", key),
            }
        }
        Ok(())
    }
}

/// Load the config at `path` (or the default location), writing defaults on first run.
pub fn load_or_create_config(path: Option<&Path>) -> Result<Config> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => Config::default_path()?,
    };

    if config_path.exists() {
        Config::load(&config_path)
    } else {
        // First run: write defaults so there is a file to edit
        let mut config = Config::default();
        config.save(&config_path)?;
        config.load_env_vars();
        Ok(config)
    }
}

pub fn parse_override(s: &str) -> Result<(String, String)> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("Expected key=value, got '{}'", s))?;
    Ok((key.trim().to_string(), value.trim().to_string()))
}
