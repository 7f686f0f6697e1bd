//! Connection settings
//!
//! Loaded from a TOML file (by default `{config_dir}/baas-cli/config.toml`),
//! then overridden by `BAAS_*` environment variables. Every field is optional
//! until [`Config::validate`] turns the merged result into [`Settings`].

use std::path::{Path, PathBuf};

use is_terminal::IsTerminal;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::api::constants::{DEFAULT_PAGE_LIMIT, DEFAULT_THROTTLE_PER_MINUTE};
use crate::api::error::ApiError;

const APP_DIR: &str = "baas-cli";
const CONFIG_FILE: &str = "config.toml";

/// Raw, possibly incomplete configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub host: Option<String>,
    pub scheme: Option<String>,
    pub org: Option<String>,
    pub app: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub page_limit: Option<usize>,
    pub throttle_per_minute: Option<u32>,
}

/// Complete settings needed to build a client
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    pub scheme: String,
    pub host: String,
    pub org: String,
    pub app: String,
    pub client_id: String,
    pub client_secret: String,
    pub page_limit: usize,
    pub throttle_per_minute: u32,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("org", &self.org)
            .field("app", &self.app)
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("page_limit", &self.page_limit)
            .field("throttle_per_minute", &self.throttle_per_minute)
            .finish()
    }
}

impl Config {
    /// `{config_dir}/baas-cli/config.toml`, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load the file at `path` (which must exist), or the default file if it
    /// exists, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ApiError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => {
                    debug!("No config file found, using environment only");
                    Self::default()
                }
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ApiError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ApiError::local_io(path, e))?;
        let config = Self::parse(&contents)
            .map_err(|e| ApiError::Validation(format!("invalid config file '{}': {}", path.display(), e)))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Override fields from `BAAS_*` variables as resolved by `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ApiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = text("BAAS_HOST") {
            self.host = Some(v);
        }
        if let Some(v) = text("BAAS_SCHEME") {
            self.scheme = Some(v);
        }
        if let Some(v) = text("BAAS_ORG") {
            self.org = Some(v);
        }
        if let Some(v) = text("BAAS_APP") {
            self.app = Some(v);
        }
        if let Some(v) = text("BAAS_CLIENT_ID") {
            self.client_id = Some(v);
        }
        if let Some(v) = text("BAAS_CLIENT_SECRET") {
            self.client_secret = Some(v);
        }
        if let Some(v) = text("BAAS_PAGE_LIMIT") {
            self.page_limit = Some(parse_number("BAAS_PAGE_LIMIT", &v)?);
        }
        if let Some(v) = text("BAAS_THROTTLE") {
            self.throttle_per_minute = Some(parse_number("BAAS_THROTTLE", &v)?);
        }
        Ok(())
    }

    /// Ask for a missing client secret when attached to a terminal
    pub fn prompt_missing_secret(&mut self) -> Result<(), ApiError> {
        if self.client_secret.is_some() || !std::io::stdin().is_terminal() {
            return Ok(());
        }
        let secret = rpassword::prompt_password("Client secret: ")
            .map_err(|e| ApiError::local_io("<stdin>", e))?;
        if !secret.is_empty() {
            self.client_secret = Some(secret);
        }
        Ok(())
    }

    /// Fill in defaults and check required fields
    pub fn validate(&self) -> Result<Settings, ApiError> {
        let org = required(&self.org, "org")?;
        let app = required(&self.app, "app")?;
        let client_id = required(&self.client_id, "client_id")?;
        let client_secret = required(&self.client_secret, "client_secret")?;

        let page_limit = self.page_limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        if page_limit == 0 {
            return Err(ApiError::Validation("page_limit must be greater than 0".to_string()));
        }
        let throttle_per_minute = self.throttle_per_minute.unwrap_or(DEFAULT_THROTTLE_PER_MINUTE);
        if throttle_per_minute == 0 {
            return Err(ApiError::Validation(
                "throttle_per_minute must be greater than 0".to_string(),
            ));
        }

        let host = self
            .host
            .clone()
            .unwrap_or_else(|| format!("baas-{}.apigee.net", org));
        let scheme = self.scheme.clone().unwrap_or_else(|| "https".to_string());

        Ok(Settings {
            scheme,
            host,
            org,
            app,
            client_id,
            client_secret,
            page_limit,
            throttle_per_minute,
        })
    }
}

fn required(value: &Option<String>, name: &str) -> Result<String, ApiError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            ApiError::Validation(format!(
                "missing '{}' (set it in the config file or BAAS_{})",
                name,
                name.to_uppercase()
            ))
        })
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ApiError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ApiError::Validation(format!("{} must be a positive number: {}", key, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn complete() -> Config {
        Config {
            org: Some("acme".to_string()),
            app: Some("sandbox".to_string()),
            client_id: Some("id".to_string()),
            client_secret: Some("secret".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let settings = complete().validate().unwrap();
        assert_eq!(settings.host, "baas-acme.apigee.net");
        assert_eq!(settings.scheme, "https");
        assert_eq!(settings.page_limit, 1000);
        assert_eq!(settings.throttle_per_minute, 120);
    }

    #[test]
    fn test_required_fields() {
        let mut config = complete();
        config.client_secret = Some("  ".to_string());
        assert!(matches!(config.validate(), Err(ApiError::Validation(m)) if m.contains("client_secret")));

        assert!(Config::default().validate().is_err());
    }

    #[test]
    fn test_zero_limits_rejected() {
        let mut config = complete();
        config.page_limit = Some(0);
        assert!(config.validate().is_err());

        let mut config = complete();
        config.throttle_per_minute = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_toml() {
        let config = Config::parse(
            r#"
            org = "acme"
            app = "sandbox"
            client_id = "id"
            client_secret = "secret"
            host = "api.example.com"
            page_limit = 250
            throttle_per_minute = 60
            "#,
        )
        .unwrap();

        let settings = config.validate().unwrap();
        assert_eq!(settings.host, "api.example.com");
        assert_eq!(settings.page_limit, 250);
        assert_eq!(settings.throttle_per_minute, 60);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(Config::parse("orgg = \"typo\"").is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("BAAS_ORG", "other"),
            ("BAAS_THROTTLE", "30"),
            ("BAAS_HOST", " "),
        ]);
        let mut config = complete();
        config.host = Some("file.example.com".to_string());
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.org.as_deref(), Some("other"));
        assert_eq!(config.throttle_per_minute, Some(30));
        assert_eq!(config.host.as_deref(), Some("file.example.com"));
    }

    #[test]
    fn test_env_number_must_parse() {
        let mut config = complete();
        let result = config.apply_env(|key| (key == "BAAS_PAGE_LIMIT").then(|| "lots".to_string()));
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "org = \"acme\"\napp = \"sandbox\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.org.as_deref(), Some("acme"));

        let missing = Config::from_file(&dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(ApiError::LocalIo { .. })));
    }

    #[test]
    fn test_settings_debug_hides_secret() {
        let rendered = format!("{:?}", complete().validate().unwrap());
        assert!(!rendered.contains("secret\""));
        assert!(rendered.contains("***"));
    }
}
