//! Layered runtime configuration.
//!
//! # Responsibility
//! - Merge built-in defaults, an optional TOML file and `ROADMAP_*`
//!   environment variables into one typed `AppConfig`.
//!
//! # Invariants
//! - Later layers override earlier ones: defaults < file < environment.
//! - Nested keys use `__` in environment variable names, e.g.
//!   `ROADMAP_SHIBBOLETH__USE_FILTERED_DISCOVERY_SERVICE=true`.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "ROADMAP_";

#[derive(Debug)]
pub struct ConfigError(figment::Error);

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid configuration: {}", self.0)
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub shibboleth: ShibbolethConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: std::env::temp_dir().join("roadmap.sqlite3"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute directory for rolling log files. Logging stays off when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: crate::logging::default_log_level().to_string(),
            dir: None,
        }
    }
}

/// Shibboleth discovery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShibbolethConfig {
    /// Use the in-app discovery page and treat the first submitted
    /// identifier as the organisation's federation entity ID.
    pub use_filtered_discovery_service: bool,
    /// Path of the service provider login handler.
    pub login_url: String,
    /// Path the identity provider redirects back to.
    pub callback_path: String,
}

impl Default for ShibbolethConfig {
    fn default() -> Self {
        Self {
            use_filtered_discovery_service: false,
            login_url: "/Shibboleth.sso/Login".to_string(),
            callback_path: "/users/auth/shibboleth/callback".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

/// Session cookie settings, read by the HTTP front end through
/// `OrgsController::session_cookie`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Cookie name carrying the session id.
    pub key: String,
    pub same_site: SameSite,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            key: "_dmp_roadmap_session".to_string(),
            same_site: SameSite::Lax,
        }
    }
}

impl AppConfig {
    /// Loads configuration from defaults, `file` (when given) and environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::figment(file).extract().map_err(ConfigError)
    }

    fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, SameSite};
    use figment::Jail;

    #[test]
    fn defaults_match_session_store_settings() {
        let config = AppConfig::default();
        assert_eq!(config.session.key, "_dmp_roadmap_session");
        assert_eq!(config.session.same_site, SameSite::Lax);
        assert!(!config.shibboleth.use_filtered_discovery_service);
    }

    #[test]
    fn file_then_environment_override_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "roadmap.toml",
                r#"
                [shibboleth]
                use_filtered_discovery_service = true
                login_url = "/sso/Login"

                [session]
                same_site = "strict"
                "#,
            )?;
            jail.set_env("ROADMAP_SHIBBOLETH__LOGIN_URL", "/env/Login");

            let config = AppConfig::load(Some("roadmap.toml".as_ref()))
                .map_err(|err| err.to_string())?;
            assert!(config.shibboleth.use_filtered_discovery_service);
            assert_eq!(config.shibboleth.login_url, "/env/Login");
            assert_eq!(config.session.same_site, SameSite::Strict);
            assert_eq!(config.session.key, "_dmp_roadmap_session");
            Ok(())
        });
    }
}
