use crate::common::errors::ConfigError;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment, Profile,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "OA_";
pub const PROFILE_ENV: &str = "OA_PROFILE";
pub const DEFAULT_PROFILE: &str = "development";

/// Client configuration
/// Layered: defaults <- toml file (profile tables) <- OA_* env vars
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Gateway address every API path is appended to
    pub base_url: String,
    pub timeout_secs: u64,
    /// Where a 401 sends the user
    pub login_path: String,
    /// Try one refresh before giving up on a 401
    pub refresh_on_unauthorized: bool,
    /// Refresh ahead of time when the access token is about to expire
    pub proactive_refresh: bool,
    pub refresh_leeway_secs: u64,
    /// Session file, None = platform data dir
    pub storage_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:30010/api".to_string(),
            timeout_secs: 10,
            login_path: "/login".to_string(),
            refresh_on_unauthorized: false,
            proactive_refresh: true,
            refresh_leeway_secs: 5 * 60, // 5 min
            storage_path: None,
        }
    }
}

impl ClientConfig {
    /// Load config for the profile named by `OA_PROFILE`
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let profile = Profile::from_env_or(PROFILE_ENV, DEFAULT_PROFILE);
        Self::load_profile(file, profile)
    }

    pub fn load_profile(file: Option<&Path>, profile: Profile) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(ClientConfig::default()));

        if let Some(path) = file {
            // missing file is fine, figment skips it
            figment = figment.merge(Toml::file(path).nested());
        }

        let config: ClientConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["PROFILE"]).global())
            .select(profile)
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::BaseUrl(self.base_url.clone()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn refresh_leeway(&self) -> Duration {
        Duration::from_secs(self.refresh_leeway_secs)
    }

    /// Starter config file written by `oa-session config init`
    pub fn template() -> Result<String, toml::ser::Error> {
        let mut root = toml::Table::new();
        root.insert(
            "default".to_string(),
            toml::Value::try_from(ClientConfig::default())?,
        );

        let mut production = toml::Table::new();
        production.insert(
            "base_url".to_string(),
            toml::Value::String("https://gateway.example.com/api".to_string()),
        );
        production.insert("proactive_refresh".to_string(), toml::Value::Boolean(true));
        root.insert("production".to_string(), toml::Value::Table(production));

        toml::to_string_pretty(&root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_without_file_or_env() {
        Jail::expect_with(|_jail| {
            let config = ClientConfig::load(None).map_err(|e| e.to_string())?;
            assert_eq!(config, ClientConfig::default());
            Ok(())
        });
    }

    #[test]
    fn profile_table_overrides_default_table() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "oa.toml",
                r#"
                [default]
                timeout_secs = 3

                [production]
                base_url = "https://gw.internal/api"
                "#,
            )?;
            jail.set_env(PROFILE_ENV, "production");

            let config =
                ClientConfig::load(Some(Path::new("oa.toml"))).map_err(|e| e.to_string())?;
            assert_eq!(config.base_url, "https://gw.internal/api");
            assert_eq!(config.timeout_secs, 3);
            Ok(())
        });
    }

    #[test]
    fn env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("oa.toml", "[default]\nlogin_path = \"/signin\"\n")?;
            jail.set_env("OA_LOGIN_PATH", "/auth/login-page");
            jail.set_env("OA_REFRESH_ON_UNAUTHORIZED", "true");

            let config =
                ClientConfig::load(Some(Path::new("oa.toml"))).map_err(|e| e.to_string())?;
            assert_eq!(config.login_path, "/auth/login-page");
            assert!(config.refresh_on_unauthorized);
            Ok(())
        });
    }

    #[test]
    fn rejects_base_url_without_scheme() {
        Jail::expect_with(|jail| {
            jail.set_env("OA_BASE_URL", "localhost:30010");
            let result = ClientConfig::load(None);
            assert!(matches!(result, Err(ConfigError::BaseUrl(_))));
            Ok(())
        });
    }

    #[test]
    fn template_round_trips_through_loader() {
        Jail::expect_with(|jail| {
            let template = ClientConfig::template().map_err(|e| e.to_string())?;
            jail.create_file("oa.toml", &template)?;
            let config =
                ClientConfig::load(Some(Path::new("oa.toml"))).map_err(|e| e.to_string())?;
            assert_eq!(config, ClientConfig::default());
            Ok(())
        });
    }
}
