use std::path::{Path, PathBuf};

use inkpost_common::{Error, Result};

use crate::model::AppConfig;

pub const ENV_DATABASE: &str = "INKPOST_DATABASE";
pub const ENV_APP_ENV: &str = "APP_ENV";
pub const ENV_LOG: &str = "INKPOST_LOG";

/// Builds an `AppConfig` from defaults, an optional config file and the
/// process environment (after loading `.env`), in that order of precedence.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    pub fn load(&self) -> Result<AppConfig> {
        match dotenvy::dotenv() {
            Err(e) if !e.not_found() => {
                return Err(Error::Config(format!("failed to read .env: {e}")));
            }
            _ => {}
        }

        let mut config = match &self.file {
            Some(path) => load_file(path)?,
            None => AppConfig::default(),
        };

        apply_overrides(&mut config, |key| std::env::var(key).ok());
        Ok(config)
    }
}

/// Parse a YAML or TOML config file, chosen by extension.
pub fn load_file(path: &Path) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        "yml" | "yaml" => serde_yaml::from_str(&contents)
            .map_err(|e| Error::Config(format!("YAML parse error: {e}"))),
        "toml" => {
            toml::from_str(&contents).map_err(|e| Error::Config(format!("TOML parse error: {e}")))
        }
        other => Err(Error::Config(format!(
            "unsupported config extension: {other}"
        ))),
    }
}

/// Apply environment overrides. Empty values are ignored.
pub fn apply_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(path) = get(ENV_DATABASE) {
        config.database.path = PathBuf::from(path);
    }
    if let Some(env) = get(ENV_APP_ENV) {
        config.app_env = env;
    }
    if let Some(level) = get(ENV_LOG) {
        config.log.level = level;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;
    use crate::model::DEFAULT_DATABASE_PATH;

    fn write_temp(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_point_at_local_data_dir() {
        let config = AppConfig::default();
        assert_eq!(config.database.path, PathBuf::from(DEFAULT_DATABASE_PATH));
        assert_eq!(config.log.level, "info");
        assert!(!config.is_production());
    }

    #[test]
    fn loads_yaml_with_partial_sections() {
        let file = write_temp(
            ".yml",
            "app_env: production\ndatabase:\n  path: /var/lib/inkpost/blog.db\n",
        );
        let config = load_file(file.path()).unwrap();
        assert!(config.is_production());
        assert_eq!(config.database.path, PathBuf::from("/var/lib/inkpost/blog.db"));
        assert!(!config.log.json);
    }

    #[test]
    fn loads_toml() {
        let file = write_temp(
            ".toml",
            "app_env = \"testing\"\n[log]\nlevel = \"debug\"\njson = true\n",
        );
        let config = load_file(file.path()).unwrap();
        assert_eq!(config.app_env, "testing");
        assert_eq!(config.log.level, "debug");
        assert!(config.log.json);
    }

    #[test]
    fn rejects_unknown_extension() {
        let file = write_temp(".ini", "app_env=x");
        let err = load_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("unsupported config extension: ini"));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = load_file(Path::new("/nonexistent/inkpost.yml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn env_overrides_file_values_and_ignores_blanks() {
        let mut config = AppConfig::default();
        let env: HashMap<&str, &str> = [
            (ENV_DATABASE, "/tmp/other.db"),
            (ENV_APP_ENV, "  "),
            (ENV_LOG, "inkpost_db=debug"),
        ]
        .into_iter()
        .collect();

        apply_overrides(&mut config, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.app_env, "development");
        assert_eq!(config.log.level, "inkpost_db=debug");
    }
}
