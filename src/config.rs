use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::corpus::LoadError;
use crate::semantic::{MaskerSettings, DEFAULT_MODEL, DEFAULT_TOP_K};

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_KEYWORDS_PATH: &str = "keywords.json";
const DEFAULT_DEMONSTRATIONS_PATH: &str = "demonstrations.json";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";

/// Masking configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaskingConfig {
    /// Minimum cosine similarity for a span to be masked [0.0, 1.0]
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    /// Longest n-gram (in words) considered for masking
    #[serde(default = "default_max_ngram")]
    pub max_ngram: usize,

    /// Category → placeholder literal. Categories not listed use `<category>`.
    #[serde(default = "default_placeholders")]
    pub placeholders: HashMap<String, String>,
}

impl Default for MaskingConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            max_ngram: default_max_ngram(),
            placeholders: default_placeholders(),
        }
    }
}

impl MaskingConfig {
    pub fn settings(&self) -> MaskerSettings {
        MaskerSettings {
            threshold: self.threshold,
            max_ngram: self.max_ngram,
        }
    }
}

fn default_threshold() -> f32 {
    MaskerSettings::default().threshold
}

fn default_max_ngram() -> usize {
    MaskerSettings::default().max_ngram
}

fn default_placeholders() -> HashMap<String, String> {
    HashMap::from([
        ("themes".to_string(), "<theme>".to_string()),
        ("opening_tags".to_string(), "<opening_tag>".to_string()),
    ])
}

/// Retrieval configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of demonstrations returned per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Embedding model name (e.g., "all-mpnet-base-v2")
    #[serde(default = "default_model")]
    pub model: String,

    /// Keyword mapping file, relative to the base path unless absolute
    #[serde(default = "default_keywords_path")]
    pub keywords_path: PathBuf,

    /// Demonstration corpus file, relative to the base path unless absolute
    #[serde(default = "default_demonstrations_path")]
    pub demonstrations_path: PathBuf,

    /// Address the HTTP server binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default)]
    pub masking: MaskingConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            keywords_path: default_keywords_path(),
            demonstrations_path: default_demonstrations_path(),
            listen_addr: default_listen_addr(),
            masking: MaskingConfig::default(),
            retrieval: RetrievalConfig::default(),
            base_path: PathBuf::new(),
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_keywords_path() -> PathBuf {
    PathBuf::from(DEFAULT_KEYWORDS_PATH)
}

fn default_demonstrations_path() -> PathBuf {
    PathBuf::from(DEFAULT_DEMONSTRATIONS_PATH)
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

impl Config {
    pub fn validate(&self) -> Result<(), LoadError> {
        let masking = &self.masking;
        if !(0.0..=1.0).contains(&masking.threshold) {
            return Err(LoadError::InvalidConfig(format!(
                "masking.threshold must be between 0.0 and 1.0, got {}",
                masking.threshold
            )));
        }

        if masking.max_ngram == 0 {
            return Err(LoadError::InvalidConfig(
                "masking.max_ngram must be greater than 0".to_string(),
            ));
        }

        if let Some((category, _)) = masking
            .placeholders
            .iter()
            .find(|(_, placeholder)| placeholder.trim().is_empty())
        {
            return Err(LoadError::InvalidConfig(format!(
                "masking.placeholders.{category} must not be empty"
            )));
        }

        if self.retrieval.top_k == 0 {
            return Err(LoadError::InvalidConfig(
                "retrieval.top_k must be greater than 0".to_string(),
            ));
        }

        if self.model.trim().is_empty() {
            return Err(LoadError::InvalidConfig("model must not be empty".to_string()));
        }

        Ok(())
    }

    /// Load `config.yaml` from `base_path`, writing the defaults first when
    /// it does not exist.
    pub fn load_with(base_path: &Path) -> Result<Self, LoadError> {
        let path = base_path.join(CONFIG_FILE);
        let io_err = |source| LoadError::Io {
            path: path.clone(),
            source,
        };

        // create new if does not exist
        if !path.exists() {
            std::fs::create_dir_all(base_path).map_err(io_err)?;
            let defaults = serde_yml::to_string(&Self::default()).map_err(|e| {
                LoadError::InvalidConfig(format!("failed to serialize defaults: {e}"))
            })?;
            std::fs::write(&path, defaults).map_err(io_err)?;
            log::info!("Wrote default config to {}", path.display());
        }

        let config_str = std::fs::read_to_string(&path).map_err(io_err)?;
        let mut config: Self = serde_yml::from_str(&config_str).map_err(|e| LoadError::Parse {
            path: path.clone(),
            message: e.to_string(),
        })?;

        config.base_path = base_path.to_path_buf();
        config.validate()?;

        Ok(config)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn keywords_file(&self) -> PathBuf {
        self.resolve(&self.keywords_path)
    }

    pub fn demonstrations_file(&self) -> PathBuf {
        self.resolve(&self.demonstrations_path)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_with(dir.path()).unwrap();

        assert!(dir.path().join(CONFIG_FILE).exists());
        assert_eq!(config.model, "all-mpnet-base-v2");
        assert_eq!(config.masking.threshold, 0.65);
        assert_eq!(config.masking.max_ngram, 4);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.masking.placeholders["themes"], "<theme>");
        assert_eq!(config.masking.placeholders["opening_tags"], "<opening_tag>");
        assert_eq!(config.keywords_file(), dir.path().join("keywords.json"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "model: bge-small-en-v1.5\nmasking:\n  threshold: 0.7\ndemonstrations_path: /srv/demos.yaml\n",
        )
        .unwrap();

        let config = Config::load_with(dir.path()).unwrap();
        assert_eq!(config.model, "bge-small-en-v1.5");
        assert_eq!(config.masking.threshold, 0.7);
        assert_eq!(config.masking.max_ngram, 4);
        assert_eq!(config.masking.placeholders.len(), 2);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.demonstrations_file(), PathBuf::from("/srv/demos.yaml"));
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "masking:\n  threshold: 1.5\n").unwrap();

        assert!(matches!(
            Config::load_with(dir.path()),
            Err(LoadError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_zero_top_k_and_ngram() {
        let mut config = Config::default();
        config.retrieval.top_k = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.masking.max_ngram = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_blank_placeholder() {
        let mut config = Config::default();
        config
            .masking
            .placeholders
            .insert("pieces".to_string(), " ".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "masking: [not, a, map]\n").unwrap();

        assert!(matches!(
            Config::load_with(dir.path()),
            Err(LoadError::Parse { .. })
        ));
    }
}
