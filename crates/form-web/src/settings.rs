use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use form_service::GeocodingConfig;
use serde::Deserialize;

use crate::auth::MAX_SESSION_TTL_SECS;

pub const DEFAULT_CONFIG_PATH: &str = "form-builder.toml";
pub const ENV_PREFIX: &str = "FORMS";

/// Layered settings: built-in defaults, then the optional TOML file, then
/// `FORMS__SECTION__KEY` environment variables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub web: WebSettings,
    #[serde(default)]
    pub db: DbSettings,
    #[serde(default)]
    pub admin: AdminSettings,
    #[serde(default)]
    pub geocoding: GeocodingConfig,
    #[serde(default)]
    pub export: ExportSettings,
}

impl Settings {
    pub fn load(config_path: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(config_path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Self>()?
            .checked()
    }

    fn checked(self) -> Result<Self, ConfigError> {
        if self.admin.session_ttl_secs > MAX_SESSION_TTL_SECS {
            return Err(ConfigError::Message(format!(
                "admin.session_ttl_secs must be at most {MAX_SESSION_TTL_SECS}, got {}",
                self.admin.session_ttl_secs
            )));
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSettings {
    #[serde(default = "WebSettings::bind_default")]
    pub bind: String,
    /// Absolute origin used when printing public form links.
    #[serde(default = "WebSettings::public_base_url_default")]
    pub public_base_url: String,
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            bind: Self::bind_default(),
            public_base_url: Self::public_base_url_default(),
        }
    }
}

impl WebSettings {
    fn bind_default() -> String {
        "127.0.0.1:8080".into()
    }

    fn public_base_url_default() -> String {
        "http://127.0.0.1:8080".into()
    }

    pub fn form_link(&self, slug: &str) -> String {
        format!("{}/form/{}", self.public_base_url.trim_end_matches('/'), slug)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbSettings {
    /// sqlx SQLite URL, or `memory` for the in-process store.
    #[serde(default = "DbSettings::url_default")]
    pub url: String,
}

impl Default for DbSettings {
    fn default() -> Self {
        Self {
            url: Self::url_default(),
        }
    }
}

impl DbSettings {
    fn url_default() -> String {
        "sqlite://form-builder.db?mode=rwc".into()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminSettings {
    #[serde(default = "AdminSettings::email_default")]
    pub email: String,
    /// Argon2 PHC string. Without it nobody can sign in.
    #[serde(default)]
    pub password_hash: Option<String>,
    #[serde(default = "AdminSettings::session_ttl_default")]
    pub session_ttl_secs: u64,
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            email: Self::email_default(),
            password_hash: None,
            session_ttl_secs: Self::session_ttl_default(),
        }
    }
}

impl AdminSettings {
    fn email_default() -> String {
        "admin@localhost".into()
    }

    fn session_ttl_default() -> u64 {
        8 * 60 * 60
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportSettings {
    #[serde(default = "ExportSettings::directory_default")]
    pub directory: PathBuf,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            directory: Self::directory_default(),
        }
    }
}

impl ExportSettings {
    fn directory_default() -> PathBuf {
        PathBuf::from("exports")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("absent.toml");
        let settings = Settings::load(path.to_str().expect("utf-8 path")).expect("defaults");
        assert_eq!(settings.db.url, "sqlite://form-builder.db?mode=rwc");
        assert_eq!(settings.admin.session_ttl_secs, 28_800);
        assert!(settings.geocoding.enabled);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("forms.toml");
        std::fs::write(
            &path,
            "[db]\nurl = \"memory\"\n\n[geocoding]\nenabled = false\n\n[web]\npublic_base_url = \"https://forms.example.com/\"\n",
        )
        .expect("write config");
        let settings = Settings::load(path.to_str().expect("utf-8 path")).expect("settings");
        assert_eq!(settings.db.url, "memory");
        assert!(!settings.geocoding.enabled);
        assert_eq!(settings.geocoding.language, "ar");
        assert_eq!(
            settings.web.form_link("abc"),
            "https://forms.example.com/form/abc"
        );
    }

    #[test]
    fn oversized_session_ttl_is_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("forms.toml");
        std::fs::write(&path, "[admin]\nsession_ttl_secs = 10000000000000000\n")
            .expect("write config");
        let err = Settings::load(path.to_str().expect("utf-8 path")).expect_err("rejected");
        assert!(err.to_string().contains("session_ttl_secs"));
    }
}
