use blackout_classify::ClassifierConfig;
use blackout_pdf::TextBackend;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    // ============ Classification service ============
    /// API key for the chat completions endpoint
    pub api_key: Option<String>,
    /// API root, e.g. `https://api.openai.com/v1`
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,

    // ============ Pipeline ============
    /// Text extraction: `auto`, `pdfium` or `lopdf`
    pub text_backend: Option<TextBackend>,
    /// Classification calls in flight at once
    pub concurrency: Option<usize>,
    /// Where per-page diagnostics are written, if anywhere
    pub diagnostics_dir: Option<PathBuf>,
    /// Categories used when none are given on the command line
    pub categories: Option<Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config dir unavailable (neither XDG_CONFIG_HOME nor HOME is set)")]
    NoConfigDir,
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("json error in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid value {value:?} for {name}")]
    InvalidEnv { name: &'static str, value: String },
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let base = match std::env::var_os("XDG_CONFIG_HOME") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".config"))
            .ok_or(ConfigError::NoConfigDir)?,
    };
    Ok(base.join("blackout").join("config.json"))
}

/// Reads the config file.
///
/// An explicit path has to exist. Without one, the default location is used
/// if there is a file there, and built-in defaults otherwise.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Ok(path) if path.exists() => path,
            _ => return Ok(AppConfig::default()),
        },
    };

    let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let config = serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
        path: path.clone(),
        source,
    })?;
    log::debug!("[Config] loaded {}", path.display());
    Ok(config)
}

pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let raw = serde_json::to_string_pretty(config).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, raw).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

impl AppConfig {
    /// Overrides fields from `OPENAI_API_KEY`, `OPENAI_BASE_URL`,
    /// `BLACKOUT_MODEL`, `BLACKOUT_CONCURRENCY` and `BLACKOUT_TEXT_BACKEND`.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    pub fn apply_env_from<F>(&mut self, get: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| get(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("OPENAI_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.base_url = Some(url);
        }
        if let Some(model) = get("BLACKOUT_MODEL") {
            self.model = Some(model);
        }
        if let Some(raw) = get("BLACKOUT_CONCURRENCY") {
            let n = raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidEnv {
                    name: "BLACKOUT_CONCURRENCY",
                    value: raw.clone(),
                })?;
            self.concurrency = Some(n);
        }
        if let Some(raw) = get("BLACKOUT_TEXT_BACKEND") {
            let backend = raw.parse::<TextBackend>().map_err(|_| ConfigError::InvalidEnv {
                name: "BLACKOUT_TEXT_BACKEND",
                value: raw.clone(),
            })?;
            self.text_backend = Some(backend);
        }
        Ok(())
    }

    pub fn classifier_config(&self) -> ClassifierConfig {
        let defaults = ClassifierConfig::default();
        ClassifierConfig {
            api_key: self.api_key.clone().unwrap_or_default(),
            base_url: self.base_url.clone().unwrap_or(defaults.base_url),
            model: self.model.clone().unwrap_or(defaults.model),
            timeout_secs: self.timeout_secs.unwrap_or(defaults.timeout_secs),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
        }
    }
}
