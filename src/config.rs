//! Settings for the elevation tools.
//!
//! Read from a JSON file when present, then overridden by env vars.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const CONFIG_ENV: &str = "ROOTLS_CONFIG";
pub const POLICY_PROGRAM_ENV: &str = "ROOTLS_POLICY_PROGRAM";
pub const CREDENTIAL_PROGRAM_ENV: &str = "ROOTLS_CREDENTIAL_PROGRAM";
pub const TIMEOUT_ENV: &str = "ROOTLS_TIMEOUT_SECS";
pub const DEFAULT_DIR_ENV: &str = "ROOTLS_DEFAULT_DIR";

/// One elevation tool: which binary, and whether to try it at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MechanismSettings {
    pub program: String,
    pub enabled: bool,
}

impl MechanismSettings {
    fn named(program: &str) -> Self {
        Self {
            program: program.to_string(),
            enabled: true,
        }
    }
}

impl Default for MechanismSettings {
    fn default() -> Self {
        Self::named("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub policy: MechanismSettings,
    pub credential: MechanismSettings,
    pub timeout_secs: Option<u64>,
    pub default_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            policy: MechanismSettings::named("pkexec"),
            credential: MechanismSettings::named("sudo"),
            timeout_secs: None,
            default_dir: PathBuf::from("/root"),
        }
    }
}

impl Settings {
    /// Load from the process environment and the resolved config file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Same as [`Settings::load`], with env lookups going through `env`.
    pub fn load_with<F>(env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = config_path(&env);
        let mut settings = match path {
            Some(ref p) => Self::from_file(p)?,
            None => Self::default(),
        };
        settings.apply_env(&env)?;
        Ok(settings)
    }

    /// Parse a config file. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::ReadFailed(e, path.to_path_buf())),
        };
        // A section written without `program` deserializes it empty.
        let mut settings: Settings =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseFailed(e, path.to_path_buf()))?;
        let defaults = Self::default();
        if settings.policy.program.trim().is_empty() {
            settings.policy.program = defaults.policy.program;
        }
        if settings.credential.program.trim().is_empty() {
            settings.credential.program = defaults.credential.program;
        }
        settings.default_dir = expand_tilde(&settings.default_dir.to_string_lossy());
        Ok(settings)
    }

    fn apply_env<F>(&mut self, env: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(program) = non_blank(env, POLICY_PROGRAM_ENV) {
            self.policy.program = program;
        }
        if let Some(program) = non_blank(env, CREDENTIAL_PROGRAM_ENV) {
            self.credential.program = program;
        }
        if let Some(secs) = non_blank(env, TIMEOUT_ENV) {
            let parsed = secs
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue(TIMEOUT_ENV.to_string(), secs.clone()))?;
            self.timeout_secs = Some(parsed);
        }
        if let Some(dir) = non_blank(env, DEFAULT_DIR_ENV) {
            self.default_dir = expand_tilde(&dir);
        }
        Ok(())
    }
}

/// `$ROOTLS_CONFIG`, else `<config dir>/rootls/config.json`.
pub fn config_path<F>(env: &F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    non_blank(env, CONFIG_ENV)
        .map(|p| expand_tilde(&p))
        .or_else(|| dirs::config_dir().map(|p| p.join("rootls/config.json")))
}

fn non_blank<F>(env: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    env(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn expand_tilde(path: &str) -> PathBuf {
    let expanded = shellexpand::tilde(path);
    PathBuf::from(expanded.as_ref())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {0}", path = .1.display())]
    ReadFailed(#[source] std::io::Error, PathBuf),
    #[error("Failed to parse config {path}: {0}", path = .1.display())]
    ParseFailed(#[source] serde_json::Error, PathBuf),
    #[error("Invalid value for {0}: {1:?}")]
    InvalidValue(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let settings = Settings::load_with(env_of(&[(CONFIG_ENV, path.to_str().unwrap())])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.policy.program, "pkexec");
        assert_eq!(settings.credential.program, "sudo");
    }

    #[test]
    fn file_then_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"policy": {"enabled": false}, "timeoutSecs": 30, "defaultDir": "/srv"}"#,
        )
        .unwrap();

        let settings = Settings::load_with(env_of(&[
            (CONFIG_ENV, path.to_str().unwrap()),
            (CREDENTIAL_PROGRAM_ENV, "/usr/local/bin/doas-sudo"),
            (POLICY_PROGRAM_ENV, "   "),
        ]))
        .unwrap();

        assert!(!settings.policy.enabled);
        assert_eq!(settings.policy.program, "pkexec");
        assert_eq!(settings.credential.program, "/usr/local/bin/doas-sudo");
        assert_eq!(settings.timeout_secs, Some(30));
        assert_eq!(settings.default_dir, PathBuf::from("/srv"));
    }

    #[test]
    fn default_dir_expands_tilde() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let settings = Settings::load_with(env_of(&[
            (CONFIG_ENV, path.to_str().unwrap()),
            (DEFAULT_DIR_ENV, "~/private"),
        ]))
        .unwrap();
        if let Some(home) = dirs::home_dir() {
            assert_eq!(settings.default_dir, home.join("private"));
        }
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let err = Settings::load_with(env_of(&[
            (CONFIG_ENV, path.to_str().unwrap()),
            (TIMEOUT_ENV, "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref k, _) if k == TIMEOUT_ENV));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = Settings::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseFailed(..)));
        assert!(err.to_string().starts_with(&format!("Failed to parse config {}: ", path.display())));
    }
}
