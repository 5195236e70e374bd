//! Static data sources: the category → keyword mapping and the
//! demonstration corpus.
//!
//! Both are read once at startup from JSON or YAML (chosen by file
//! extension; YAML allows `#` comments in hand-edited corpora). Any
//! failure here is fatal: no partial corpus is ever indexed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A reference record. `text` is what gets matched; every other field is
/// returned to the caller verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demonstration {
    pub text: String,
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("unsupported file format for {0} (expected .json, .yaml or .yml)")]
    UnsupportedFormat(PathBuf),

    #[error("keyword category '{0}' has no phrases")]
    EmptyCategory(String),

    #[error("demonstration #{0} has an empty text")]
    MissingText(usize),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
}

impl Format {
    fn of(path: &Path) -> Result<Self, LoadError> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => Ok(Format::Json),
            Some("yaml") | Some("yml") => Ok(Format::Yaml),
            _ => Err(LoadError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let format = Format::of(path)?;

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let parse_err = |message: String| LoadError::Parse {
        path: path.to_path_buf(),
        message,
    };

    match format {
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_err(e.to_string())),
        Format::Yaml => serde_yml::from_str(&content).map_err(|e| parse_err(e.to_string())),
    }
}

/// Load the category → phrases mapping. Phrases are trimmed; blank phrases
/// are dropped and a category left without phrases is an error.
pub fn load_keywords(path: &Path) -> Result<BTreeMap<String, Vec<String>>, LoadError> {
    let raw: BTreeMap<String, Vec<String>> = read_document(path)?;

    let mut mapping = BTreeMap::new();
    for (category, phrases) in raw {
        let phrases: Vec<String> = phrases
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        if phrases.is_empty() {
            return Err(LoadError::EmptyCategory(category));
        }
        mapping.insert(category, phrases);
    }

    log::info!(
        "Loaded {} keyword categories from {}",
        mapping.len(),
        path.display()
    );

    Ok(mapping)
}

/// Load the demonstration corpus, preserving file order.
pub fn load_demonstrations(path: &Path) -> Result<Vec<Demonstration>, LoadError> {
    let demonstrations: Vec<Demonstration> = read_document(path)?;

    if let Some(position) = demonstrations
        .iter()
        .position(|demo| demo.text.trim().is_empty())
    {
        return Err(LoadError::MissingText(position));
    }

    log::info!(
        "Loaded {} demonstrations from {}",
        demonstrations.len(),
        path.display()
    );

    Ok(demonstrations)
}
