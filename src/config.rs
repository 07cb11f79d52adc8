use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// On-disk config file: `{ "gitlab": { "token": ..., "url": ... } }`.
/// Overwritten wholesale on every save, never merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub gitlab: GitlabConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitlabConfig {
    pub token: Option<String>,
    pub url: Option<String>,
}

impl GitlabConfig {
    pub fn is_configured(&self) -> bool {
        self.credentials().is_some()
    }

    /// Both fields, but only when both are present and non-empty.
    pub fn credentials(&self) -> Option<(String, String)> {
        match (self.token.as_deref(), self.url.as_deref()) {
            (Some(token), Some(url)) if !token.is_empty() && !url.is_empty() => {
                Some((token.to_string(), url.to_string()))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found")]
    NotFound,
    #[error("config file is empty or invalid: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("config file i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

/// `config.json` beside the executable. The app keeps its config next to the
/// install location rather than in a per-user directory.
pub fn default_path() -> Result<PathBuf, ConfigError> {
    let exe = std::env::current_exe()?;
    let dir = exe.parent().ok_or_else(|| {
        ConfigError::Io(std::io::Error::new(
            ErrorKind::NotFound,
            "executable has no parent directory",
        ))
    })?;
    Ok(dir.join("config.json"))
}

pub fn load(path: &Path) -> Result<ConfigFile, ConfigError> {
    let data = std::fs::read_to_string(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => ConfigError::NotFound,
        _ => ConfigError::Io(err),
    })?;
    Ok(serde_json::from_str(&data)?)
}

pub fn save(path: &Path, config: &ConfigFile) -> Result<(), ConfigError> {
    let data = serde_json::to_string_pretty(config)?;
    std::fs::write(path, data)?;
    Ok(())
}

/// Writes the unconfigured default (both fields null) and returns it.
pub fn write_default(path: &Path) -> Result<ConfigFile, ConfigError> {
    let config = ConfigFile::default();
    save(path, &config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(token: &str, url: &str) -> ConfigFile {
        ConfigFile {
            gitlab: GitlabConfig {
                token: Some(token.to_string()),
                url: Some(url.to_string()),
            },
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let original = config("glpat-abc123", "https://gitlab.example.com");

        save(&path, &original).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded, original);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        assert!(matches!(load(&path), Err(ConfigError::NotFound)));
    }

    #[test]
    fn empty_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "").unwrap();

        assert!(matches!(load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn garbage_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json at all {").unwrap();

        assert!(matches!(load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn empty_object_parses_as_unconfigured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{}").unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded, ConfigFile::default());
        assert!(!loaded.gitlab.is_configured());
    }

    #[test]
    fn default_file_has_null_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let written = write_default(&path).unwrap();
        assert_eq!(written, ConfigFile::default());

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            raw,
            serde_json::json!({ "gitlab": { "token": null, "url": null } })
        );
    }

    #[test]
    fn empty_strings_are_not_configured() {
        let cfg = config("", "https://gitlab.example.com");
        assert!(!cfg.gitlab.is_configured());

        let cfg = config("glpat-abc123", "");
        assert!(!cfg.gitlab.is_configured());

        assert!(!GitlabConfig::default().is_configured());
        assert!(config("glpat-abc123", "https://gitlab.example.com")
            .gitlab
            .is_configured());
    }

    #[test]
    fn credentials_returns_both_values() {
        let cfg = config("glpat-abc123", "https://gitlab.example.com");
        assert_eq!(
            cfg.gitlab.credentials(),
            Some((
                "glpat-abc123".to_string(),
                "https://gitlab.example.com".to_string()
            ))
        );
    }
}
