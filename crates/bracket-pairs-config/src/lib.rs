use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid bracket pair in {config_path}: {reason}")]
    InvalidBracketPair { config_path: PathBuf, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketPair {
    pub open: String,
    pub close: String,
}

impl BracketPair {
    pub fn new(open: &str, close: &str) -> Self {
        Self {
            open: open.to_string(),
            close: close.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Columns per tab when measuring indentation.
    pub tab_size: u32,
    /// `tracing` filter directive, used when `RUST_LOG` is unset.
    pub log_filter: Option<String>,
    pub brackets: Vec<BracketPair>,
    /// Pairs that get level colors. Unset means every pair except `<>`.
    pub colorized_brackets: Option<Vec<BracketPair>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tab_size: 4,
            log_filter: None,
            brackets: vec![
                BracketPair::new("(", ")"),
                BracketPair::new("[", "]"),
                BracketPair::new("{", "}"),
            ],
            colorized_brackets: None,
        }
    }
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        config
            .validate()
            .map_err(|reason| ConfigError::InvalidBracketPair {
                config_path: config_path.to_path_buf(),
                reason,
            })?;

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/bracket-pairs");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    /// Expands `~` and environment variables in a user supplied path.
    pub fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        match shellexpand::full(&path_str) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(_) => None,
        }
    }

    /// Configured pairs as `(open, close)` literals.
    pub fn bracket_pairs(&self) -> Vec<(String, String)> {
        self.brackets
            .iter()
            .map(|pair| (pair.open.clone(), pair.close.clone()))
            .collect()
    }

    pub fn colorized_pairs(&self) -> Option<Vec<(String, String)>> {
        self.colorized_brackets.as_ref().map(|pairs| {
            pairs
                .iter()
                .map(|pair| (pair.open.clone(), pair.close.clone()))
                .collect()
        })
    }

    fn validate(&self) -> Result<(), String> {
        let all = self
            .brackets
            .iter()
            .chain(self.colorized_brackets.iter().flatten());
        for pair in all {
            if pair.open.is_empty() || pair.close.is_empty() {
                return Err(format!("empty literal in {:?} / {:?}", pair.open, pair.close));
            }
            if pair.open.contains('\n') || pair.close.contains('\n') {
                return Err(format!("line break in {:?} / {:?}", pair.open, pair.close));
            }
        }
        Ok(())
    }
}
