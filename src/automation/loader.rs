//! Automation definition loader
//!
//! Load definitions from YAML or JSON files, or a whole directory of them.

use std::path::Path;

use super::definition::Automation;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error in {file}: {error}")]
    Yaml {
        file: String,
        error: serde_yaml::Error,
    },

    #[error("JSON parse error in {file}: {error}")]
    Json {
        file: String,
        error: serde_json::Error,
    },

    #[error("unsupported definition file extension: {0}")]
    UnsupportedExtension(String),
}

pub struct AutomationLoader;

impl AutomationLoader {
    pub fn load_file(path: &Path) -> Result<Automation, LoadError> {
        let content = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        match ext {
            "yaml" | "yml" => {
                serde_yaml::from_str(&content).map_err(|error| LoadError::Yaml {
                    file: path.display().to_string(),
                    error,
                })
            }
            "json" => serde_json::from_str(&content).map_err(|error| LoadError::Json {
                file: path.display().to_string(),
                error,
            }),
            other => Err(LoadError::UnsupportedExtension(other.to_string())),
        }
    }

    /// Load every definition file in a directory, in file-name order.
    pub fn load_directory(dir: &Path) -> Result<Vec<Automation>, LoadError> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && matches!(
                        path.extension().and_then(|e| e.to_str()),
                        Some("yaml") | Some("yml") | Some("json")
                    )
            })
            .collect();
        paths.sort();

        let mut automations = Vec::new();
        for path in paths {
            automations.push(Self::load_file(&path)?);
        }
        Ok(automations)
    }
}
