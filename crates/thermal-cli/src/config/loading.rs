use crate::cli::ServeArgs;
use crate::config::ServeConfig;
use crate::error::{ConfigError, Result};
use figment::{
    providers::{Env, Format as _, Json, Serialized},
    Figment,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Config file looked up in the served root when `--config` is not given.
pub const CONFIG_FILE_NAME: &str = "thermal.config.json";

/// Values given explicitly on the command line.
///
/// Flags that were not passed are left out so they do not mask the config
/// file or the environment. The root is positional and applied after
/// extraction.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CliOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    watch: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    open: Option<bool>,
}

impl From<&ServeArgs> for CliOverrides {
    fn from(args: &ServeArgs) -> Self {
        Self {
            watch: args.watch.then_some(true),
            port: args.port,
            open: args.open.then_some(true),
        }
    }
}

impl ServeConfig {
    /// Load configuration from multiple sources.
    /// Priority: CLI args > environment variables > config file > defaults
    pub fn load(args: &ServeArgs) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));

        if let Some(path) = Self::config_file(args)? {
            tracing::debug!("Loading config from {}", path.display());
            figment = figment.merge(Json::file(path));
        }

        // THERMAL_WATCH, THERMAL_PORT, THERMAL_OPEN
        figment = figment.merge(Env::prefixed("THERMAL_").only(&["watch", "port", "open"]));

        figment = figment.merge(Serialized::defaults(CliOverrides::from(args)));

        let mut config: Self = figment.extract().map_err(|e| ConfigError::InvalidValue {
            field: "configuration".to_string(),
            value: e.to_string(),
            hint: format!("Check {} syntax and field types", CONFIG_FILE_NAME),
        })?;
        config.root = args.root.clone();

        Ok(config)
    }

    /// Resolve which config file to read, if any.
    ///
    /// An explicit `--config` path must exist; the implicit one in the root
    /// is optional.
    fn config_file(args: &ServeArgs) -> Result<Option<PathBuf>> {
        if let Some(path) = &args.config {
            if !path.is_file() {
                return Err(ConfigError::NotFound(path.clone()).into());
            }
            return Ok(Some(path.clone()));
        }

        let implicit = Path::new(&args.root).join(CONFIG_FILE_NAME);
        Ok(implicit.is_file().then_some(implicit))
    }
}
