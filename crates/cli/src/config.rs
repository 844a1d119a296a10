//! Serve configuration.
//!
//! The auth collaborator is external to the engine; this config is its
//! stand-in. Each `[[principals]]` entry binds a bearer token to an
//! authenticated identity and seeds the organization's member directory:
//!
//! ```toml
//! port = 3000
//! summary_model = "claude-opus-5"
//!
//! [[principals]]
//! token = "demo-token-alice"
//! user_id = "user-1"
//! email = "alice@example.com"
//! organization_id = "org-1"
//! role = "admin"
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::Deserialize;

const DEFAULT_PORT: u16 = 3000;

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_role() -> String {
    "user".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrincipalConfig {
    pub token: String,
    pub user_id: String,
    pub email: String,
    pub organization_id: String,
    #[serde(default = "default_role")]
    pub role: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServeConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Model id for the Anthropic summary client; the built-in default is
    /// used when absent.
    #[serde(default)]
    pub summary_model: Option<String>,
    #[serde(default)]
    pub principals: Vec<PrincipalConfig>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "cannot read config: {}", e),
            ConfigError::Parse(e) => write!(f, "cannot parse config: {}", e),
            ConfigError::Invalid(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl ServeConfig {
    pub fn load(path: &Path) -> Result<ServeConfig, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<ServeConfig, ConfigError> {
        let config: ServeConfig = toml::from_str(text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut tokens = HashSet::new();
        let mut user_ids = HashSet::new();
        for principal in &self.principals {
            if principal.token.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "principal '{}' has an empty token",
                    principal.user_id
                )));
            }
            if principal.user_id.trim().is_empty() || principal.organization_id.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "principals need a user_id and an organization_id".to_string(),
                ));
            }
            if !tokens.insert(principal.token.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate token for principal '{}'",
                    principal.user_id
                )));
            }
            if !user_ids.insert(principal.user_id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate user_id '{}'",
                    principal.user_id
                )));
            }
        }
        Ok(())
    }

    pub fn organization_count(&self) -> usize {
        self.principals
            .iter()
            .map(|p| p.organization_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
port = 8080

[[principals]]
token = "alice-token"
user_id = "user-1"
email = "alice@example.com"
organization_id = "org-1"
role = "admin"

[[principals]]
token = "bob-token"
user_id = "user-2"
email = "bob@example.com"
organization_id = "org-1"
"#;

    #[test]
    fn parses_a_full_config() {
        let config = ServeConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.principals.len(), 2);
        assert_eq!(config.principals[0].token, "alice-token");
        assert_eq!(config.principals[1].role, "user"); // defaulted
        assert_eq!(config.organization_count(), 1);
    }

    #[test]
    fn port_defaults_when_absent() {
        let config = ServeConfig::from_toml("").unwrap();
        assert_eq!(config.port, 3000);
        assert!(config.principals.is_empty());
    }

    #[test]
    fn duplicate_tokens_are_rejected() {
        let text = r#"
[[principals]]
token = "same"
user_id = "user-1"
email = "a@example.com"
organization_id = "org-1"

[[principals]]
token = "same"
user_id = "user-2"
email = "b@example.com"
organization_id = "org-1"
"#;
        let err = ServeConfig::from_toml(text).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{err}");
    }
}
