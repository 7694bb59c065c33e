//! Layered application configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cs_db::DbConfig;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Prefix of environment overrides, e.g. `COMMON_SENSE__DATABASE__DSN`.
pub const ENV_PREFIX: &str = "COMMON_SENSE__";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub database: DbConfig,
    /// Schema document, YAML or JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<PathBuf>,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_owned(),
            format: LogFormat::Text,
        }
    }
}

impl LoggingConfig {
    /// `-v` info, `-vv` debug, `-vvv` trace; never lowers the configured level.
    ///
    /// A plain configured level is replaced by the more verbose of the two.
    /// Target directives are kept, behind the raised default.
    pub fn raise_level(&mut self, verbose: u8) {
        let wanted = match verbose {
            0 => return,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        };
        let configured = self.level.trim();
        self.level = match configured.parse::<LevelFilter>() {
            Ok(current) => current.max(wanted).to_string().to_ascii_lowercase(),
            Err(_) if configured.is_empty() => wanted.to_string().to_ascii_lowercase(),
            Err(_) => format!("{},{configured}", wanted.to_string().to_ascii_lowercase()),
        };
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Values given on the command line; they win over every other layer.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub database: Option<String>,
    pub schema: Option<PathBuf>,
    pub verbose: u8,
}

impl AppConfig {
    /// Defaults, then the YAML file (if any), then `COMMON_SENSE__*` variables.
    ///
    /// # Errors
    /// Returns an error when a layer cannot be read or does not fit the schema
    /// of the config.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file_exact(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        figment
            .extract()
            .context("failed to load configuration")
    }

    pub fn apply_cli_overrides(&mut self, cli: &CliOverrides) {
        if let Some(database) = &cli.database {
            self.database.dsn = database_dsn(database);
        }
        if let Some(schema) = &cli.schema {
            self.schema = Some(schema.clone());
        }
        self.logging.raise_level(cli.verbose);
    }

    /// # Errors
    /// Returns an error if the config cannot be serialized.
    pub fn to_yaml(&self) -> Result<String> {
        serde_saphyr::to_string(self).context("failed to serialize configuration")
    }
}

/// `sqlite:` URLs pass through; anything else is taken as a database file path.
#[must_use]
pub fn database_dsn(arg: &str) -> String {
    if arg.starts_with("sqlite:") {
        arg.to_owned()
    } else {
        format!("sqlite://{arg}")
    }
}
