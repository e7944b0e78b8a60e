//! Configuration loading and store path resolution
//!
//! Each setting is resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing config file is not an error; defaults apply.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::rating::RatingScale;
use crate::{Error, Result};

pub const ENV_CONFIG: &str = "NEPOSYNC_CONFIG";
pub const ENV_SEMANTIC_DB: &str = "NEPOSYNC_SEMANTIC_DB";
pub const ENV_COLLECTION_DB: &str = "NEPOSYNC_COLLECTION_DB";

/// Raw contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TomlConfig {
    pub semantic_db: Option<PathBuf>,
    pub collection_db: Option<PathBuf>,
    pub image_extensions: Option<Vec<String>>,
    pub audio_extensions: Option<Vec<String>>,
    pub xmp_rating_max: Option<u32>,
    pub popm_user: Option<String>,
}

impl TomlConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_file: Option<PathBuf>,
    pub semantic_db: Option<PathBuf>,
    pub collection_db: Option<PathBuf>,
}

/// Fully resolved settings for one run
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub semantic_db: PathBuf,
    pub collection_db: PathBuf,
    /// Lower-case, without leading dot
    pub image_extensions: Vec<String>,
    /// Lower-case, without leading dot
    pub audio_extensions: Vec<String>,
    pub xmp_scale: RatingScale,
    pub popm_user: String,
}

impl Config {
    /// Locate and read the config file, then resolve every setting.
    pub fn load(overrides: &Overrides) -> Result<Self> {
        let toml = match locate_config_file(overrides.config_file.as_deref())? {
            Some(path) => {
                debug!("Using config file {}", path.display());
                TomlConfig::from_file(&path)?
            }
            None => {
                warn!("No config file found, using defaults");
                TomlConfig::default()
            }
        };
        Self::resolve(toml, overrides)
    }

    pub fn resolve(toml: TomlConfig, overrides: &Overrides) -> Result<Self> {
        let semantic_db = resolve_path(
            overrides.semantic_db.as_deref(),
            ENV_SEMANTIC_DB,
            toml.semantic_db.as_deref(),
            default_semantic_db,
        );
        let collection_db = resolve_path(
            overrides.collection_db.as_deref(),
            ENV_COLLECTION_DB,
            toml.collection_db.as_deref(),
            default_collection_db,
        );

        let image_extensions = normalize_extensions(toml.image_extensions, &["jpg", "jpeg"])?;
        let audio_extensions = normalize_extensions(toml.audio_extensions, &["mp3"])?;

        let xmp_max = toml.xmp_rating_max.unwrap_or(10);
        let xmp_scale = RatingScale::new(xmp_max)
            .filter(|s| s.native_max() <= 255)
            .ok_or_else(|| Error::Config(format!("xmp_rating_max must be 1..=255, got {xmp_max}")))?;

        Ok(Config {
            semantic_db,
            collection_db,
            image_extensions,
            audio_extensions,
            xmp_scale,
            popm_user: toml.popm_user.unwrap_or_default(),
        })
    }
}

/// Find the config file to read, if any.
///
/// An explicitly requested file must exist; the well-known locations are
/// optional.
pub fn locate_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::Config(format!("Config file not found: {}", path.display())));
        }
        return Ok(Some(path.to_path_buf()));
    }

    if let Ok(path) = std::env::var(ENV_CONFIG) {
        let path = PathBuf::from(path);
        if !path.exists() {
            return Err(Error::Config(format!(
                "{ENV_CONFIG} points to a missing file: {}",
                path.display()
            )));
        }
        return Ok(Some(path));
    }

    let user_config = dirs::config_dir().map(|d| d.join("neposync").join("config.toml"));
    if let Some(path) = user_config.filter(|p| p.exists()) {
        return Ok(Some(path));
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/neposync/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }
    }

    Ok(None)
}

fn resolve_path(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_value: Option<&Path>,
    default: fn() -> PathBuf,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    if let Some(path) = toml_value {
        return path.to_path_buf();
    }
    default()
}

fn default_semantic_db() -> PathBuf {
    data_dir().join("neposync").join("semantic.db")
}

fn default_collection_db() -> PathBuf {
    data_dir().join("amarok").join("collection.db")
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("./neposync_data"))
}

fn normalize_extensions(configured: Option<Vec<String>>, default: &[&str]) -> Result<Vec<String>> {
    let Some(list) = configured else {
        return Ok(default.iter().map(|s| s.to_string()).collect());
    };
    let list: Vec<String> = list
        .iter()
        .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect();
    if list.is_empty() {
        return Err(Error::Config("extension lists must not be empty".to_string()));
    }
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_are_normalized() {
        let exts = normalize_extensions(Some(vec![".JPG".into(), " jpeg ".into()]), &["x"]).unwrap();
        assert_eq!(exts, vec!["jpg", "jpeg"]);
    }

    #[test]
    fn empty_extension_list_is_rejected() {
        assert!(normalize_extensions(Some(vec!["".into()]), &["x"]).is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(TomlConfig::from_toml("colection_db = \"/tmp/x\"").is_err());
    }
}
