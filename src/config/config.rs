use hashlink::LinkedHashMap;
use saphyr::{LoadableYamlNode, Scalar, Yaml};
use snafu::prelude::*;
use std::{
    borrow::Cow,
    io,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

use crate::ext::BestEffortPathExt;

const CONFIG_FILE_NAME: &str = "tree-sync.yaml";

fn get_config_file_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE_NAME)
}

/// Settings read from `tree-sync.yaml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncConfig {
    /// Producer address for `follow`, e.g. `127.0.0.1:8000`.
    pub endpoint: Option<String>,
    /// Directories the producer should watch.
    pub watch: Vec<String>,
}

impl SyncConfig {
    pub async fn read(root: &Path) -> Result<Self, ConfigError> {
        Self::from_path(get_config_file_path(root)).await
    }

    pub async fn from_path(path: PathBuf) -> Result<Self, ConfigError> {
        debug!("Opening config file: {}", path.best_effort_path_display());
        let bytes = match compio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                info!("No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(error) => {
                return Err(error).context(ReadSnafu {
                    file_path: path.best_effort_path_display(),
                });
            }
        };
        debug!("Successfully read config file: {} bytes", bytes.len());

        let contents = String::from_utf8(bytes).context(EncodingSnafu {
            file_path: path.best_effort_path_display(),
        })?;
        contents.as_str().try_into()
    }

    fn string_entry(top_level: &LinkedHashMap<Yaml, Yaml>, key: &str) -> Option<String> {
        let value = top_level.get(&Yaml::Value(Scalar::String(Cow::Borrowed(key))))?;
        match value.as_str() {
            Some(text) => Some(text.to_string()),
            None => {
                debug!("Ignoring non-string value for '{}'", key);
                None
            }
        }
    }

    fn parse_watch_list(
        top_level: &LinkedHashMap<Yaml, Yaml>,
    ) -> Result<Vec<String>, ConfigError> {
        let Some(watch) = top_level.get(&Yaml::Value(Scalar::String(Cow::Borrowed("watch"))))
        else {
            return Ok(Vec::new());
        };

        let entries = watch
            .as_sequence()
            .ok_or(ConfigError::WatchNotList)?
            .iter()
            .filter_map(|entry| {
                let path = entry.as_str().map(str::to_string);
                if path.is_none() {
                    debug!("Skipping invalid watch entry: {:?}", entry);
                }
                path
            })
            .collect();

        Ok(entries)
    }
}

impl TryFrom<&str> for SyncConfig {
    type Error = ConfigError;

    fn try_from(contents: &str) -> Result<Self, Self::Error> {
        let documents = Yaml::load_from_str(contents).context(ParseSnafu)?;
        let Some(document) = documents.first() else {
            return Ok(Self::default());
        };

        let top_level = document.as_mapping().ok_or(ConfigError::TopLevelNotMap)?;

        Ok(SyncConfig {
            endpoint: Self::string_entry(top_level, "endpoint"),
            watch: Self::parse_watch_list(top_level)?,
        })
    }
}

#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display("Failed to read the config file: {}", file_path))]
    ReadError {
        file_path: String,
        source: std::io::Error,
    },
    #[snafu(display("Config file {} is not valid UTF-8", file_path))]
    EncodingError {
        file_path: String,
        source: std::string::FromUtf8Error,
    },
    #[snafu(display("Failed to parse the config file"))]
    ParseError { source: saphyr::ScanError },
    #[snafu(display("Top level of config should be a map"))]
    TopLevelNotMap,
    #[snafu(display("'watch' section should be a list"))]
    WatchNotList,
}
