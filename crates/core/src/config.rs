use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::field::{BoundingBox, FieldDefinition, FieldError, FieldKind, FieldMap};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error("Confusion rule #{0} has an empty pattern")]
    EmptyConfusion(usize),
    #[error("Phone prefix must be a single digit, got '{0}'")]
    PhonePrefix(String),
}

/// What to do with a field box that extends past the image edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundsPolicy {
    /// Fail the document.
    #[default]
    Reject,
    /// Crop the part of the box that lies inside the image.
    Clamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionRule {
    pub from: String,
    pub to: String,
}

/// Deployment settings, read from a TOML file. Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub store_path: PathBuf,
    pub detect_orientation: bool,
    pub bounds: BoundsPolicy,
    pub phone_prefix: String,
    pub engine_retries: u32,
    pub language: String,
    /// Also match month abbreviations as the confusion table rewrites them
    /// (`0ct`, `5ep`, `Ju1`). Off by default: those tokens map to `00`.
    pub lenient_months: bool,
    /// Per-field overrides; fields not listed keep the default template position.
    pub fields: BTreeMap<FieldKind, BoundingBox>,
    /// Replaces the built-in confusion table when non-empty.
    pub confusions: Vec<ConfusionRule>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("extracted_data.csv"),
            detect_orientation: false,
            bounds: BoundsPolicy::default(),
            phone_prefix: "8".to_string(),
            engine_retries: 0,
            language: "eng".to_string(),
            lenient_months: false,
            fields: BTreeMap::new(),
            confusions: Vec::new(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(i) = self.confusions.iter().position(|r| r.from.is_empty()) {
            return Err(ConfigError::EmptyConfusion(i + 1));
        }
        self.phone_prefix_digit()?;
        Ok(())
    }

    pub fn phone_prefix_digit(&self) -> Result<char, ConfigError> {
        let mut chars = self.phone_prefix.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_digit() => Ok(c),
            _ => Err(ConfigError::PhonePrefix(self.phone_prefix.clone())),
        }
    }

    /// Default template positions with this config's overrides applied.
    pub fn field_map(&self) -> Result<FieldMap, ConfigError> {
        let defs = FieldMap::default()
            .iter()
            .map(|def| FieldDefinition {
                kind: def.kind,
                bbox: self.fields.get(&def.kind).copied().unwrap_or(def.bbox),
            })
            .collect();
        Ok(FieldMap::new(defs)?)
    }

    /// Confusion table as `(from, to)` pairs, `None` when the built-in table applies.
    pub fn confusion_table(&self) -> Option<Vec<(String, String)>> {
        if self.confusions.is_empty() {
            return None;
        }
        Some(
            self.confusions
                .iter()
                .map(|r| (r.from.clone(), r.to.clone()))
                .collect(),
        )
    }
}
