//! Process configuration.
//!
//! All settings are read once at startup from the environment and passed
//! into the webhook explicitly. Nothing reads the environment mid-request.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `WEBHOOK_PORT` | 8443 | TLS admission listener port |
//! | `HEALTH_PORT` | 8080 | Plain HTTP health and metrics port |
//! | `TLS_CERT` | `/ssl_certs/tls.crt` | Serving certificate (PEM) |
//! | `TLS_KEY` | `/ssl_certs/tls.key` | Serving private key (PEM) |
//! | `DEBUG` | unset | `true` enables debug logging |
//! | `VALIDATE_<RULE>` | unset | `false` disables the rule |
//! | `TRUSTED_IMAGE_REGISTRY` | unset | Comma-separated trusted image prefixes |
//! | `TRUSTED_IMAGE_REGISTRIES` | unset | Same, unioned with the above |

use std::collections::BTreeSet;
use std::path::PathBuf;

use thiserror::Error;

pub const WEBHOOK_PORT_ENV: &str = "WEBHOOK_PORT";
pub const HEALTH_PORT_ENV: &str = "HEALTH_PORT";
pub const TLS_CERT_ENV: &str = "TLS_CERT";
pub const TLS_KEY_ENV: &str = "TLS_KEY";
pub const DEBUG_ENV: &str = "DEBUG";
pub const TRUSTED_IMAGE_REGISTRY_ENV: &str = "TRUSTED_IMAGE_REGISTRY";
pub const TRUSTED_IMAGE_REGISTRIES_ENV: &str = "TRUSTED_IMAGE_REGISTRIES";

/// Prefix of the per-rule disable switches
pub const RULE_OVERRIDE_ENV_PREFIX: &str = "VALIDATE_";
/// Value of a per-rule switch that disables the rule
pub const SKIP_VALIDATION_ENV_VALUE: &str = "false";

pub const DEFAULT_WEBHOOK_PORT: u16 = 8443;
pub const DEFAULT_HEALTH_PORT: u16 = 8080;
pub const DEFAULT_TLS_CERT_PATH: &str = "/ssl_certs/tls.crt";
pub const DEFAULT_TLS_KEY_PATH: &str = "/ssl_certs/tls.key";

/// Errors raised while loading configuration
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("error converting {variable} to a port number: [{value}]")]
    InvalidPort { variable: &'static str, value: String },
}

/// Rules disabled process-wide through `VALIDATE_<RULE>=false`.
///
/// Stores the variable names; rule names map onto them through
/// [`crate::webhooks::overrides::env_override_key`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleOverrides {
    disabled: BTreeSet<String>,
}

impl RuleOverrides {
    /// Collect the disable switches from `(name, value)` pairs
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let disabled = vars
            .into_iter()
            .filter(|(key, value)| {
                key.as_ref().starts_with(RULE_OVERRIDE_ENV_PREFIX)
                    && value.as_ref() == SKIP_VALIDATION_ENV_VALUE
            })
            .map(|(key, _)| key.as_ref().to_string())
            .collect();
        Self { disabled }
    }

    /// Whether the given override variable disables its rule
    pub fn is_disabled(&self, variable: &str) -> bool {
        self.disabled.contains(variable)
    }

    /// The override variables currently set to disable a rule
    pub fn disabled_variables(&self) -> impl Iterator<Item = &str> {
        self.disabled.iter().map(String::as_str)
    }
}

/// Settings consumed by individual rules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSettings {
    /// Image reference prefixes considered trusted. Empty disables the check.
    pub trusted_registries: Vec<String>,
}

impl RuleSettings {
    pub fn with_trusted_registries<I, S>(registries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            trusted_registries: registries.into_iter().map(Into::into).collect(),
        }
    }
}

/// Split a comma-separated registry list, dropping blank entries
fn parse_registry_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
}

/// Complete webhook process configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookConfig {
    pub port: u16,
    pub health_port: u16,
    pub tls_cert_path: PathBuf,
    pub tls_key_path: PathBuf,
    pub debug: bool,
    pub overrides: RuleOverrides,
    pub settings: RuleSettings,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_WEBHOOK_PORT,
            health_port: DEFAULT_HEALTH_PORT,
            tls_cert_path: PathBuf::from(DEFAULT_TLS_CERT_PATH),
            tls_key_path: PathBuf::from(DEFAULT_TLS_KEY_PATH),
            debug: false,
            overrides: RuleOverrides::default(),
            settings: RuleSettings::default(),
        }
    }
}

impl WebhookConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Load configuration from `(name, value)` pairs.
    ///
    /// Empty values are treated as unset.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let vars: Vec<(String, String)> = vars
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
            .collect();
        let lookup = |name: &str| {
            vars.iter()
                .rev()
                .find(|(key, value)| key == name && !value.is_empty())
                .map(|(_, value)| value.as_str())
        };

        let mut config = Self::default();

        if let Some(value) = lookup(WEBHOOK_PORT_ENV) {
            config.port = parse_port(WEBHOOK_PORT_ENV, value)?;
        }
        if let Some(value) = lookup(HEALTH_PORT_ENV) {
            config.health_port = parse_port(HEALTH_PORT_ENV, value)?;
        }
        if let Some(value) = lookup(TLS_CERT_ENV) {
            config.tls_cert_path = PathBuf::from(value);
        }
        if let Some(value) = lookup(TLS_KEY_ENV) {
            config.tls_key_path = PathBuf::from(value);
        }
        config.debug = lookup(DEBUG_ENV) == Some("true");

        let registries = [TRUSTED_IMAGE_REGISTRY_ENV, TRUSTED_IMAGE_REGISTRIES_ENV]
            .into_iter()
            .filter_map(lookup)
            .flat_map(parse_registry_list);
        config.settings = RuleSettings::with_trusted_registries(registries);
        config.overrides = RuleOverrides::from_vars(vars.iter().map(|(k, v)| (k, v)));

        Ok(config)
    }
}

fn parse_port(variable: &'static str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidPort {
        variable,
        value: value.to_string(),
    })
}
