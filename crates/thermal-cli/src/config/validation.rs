use crate::config::ServeConfig;
use crate::error::{CliError, ConfigError, Result};

impl ServeConfig {
    /// Validate configuration for logical consistency.
    ///
    /// The root directory must already exist and be a directory; the server
    /// itself never re-checks this.
    pub fn validate(&self) -> Result<()> {
        if !self.root.exists() {
            return Err(CliError::FileNotFound(self.root.clone()));
        }
        if !self.root.is_dir() {
            return Err(CliError::NotADirectory(self.root.clone()));
        }

        if self.port == 0 {
            return Err(invalid("port", self.port, "Port must be between 1 and 65535"));
        }

        if self.default_document.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "defaultDocument".to_string(),
                hint: "Name the file served for '/', e.g. \"index.html\"".to_string(),
            }
            .into());
        }

        if self.cache_capacity == 0 {
            return Err(invalid(
                "cacheCapacity",
                self.cache_capacity,
                "The cache must hold at least one file",
            ));
        }

        if self.min_poll_interval_ms == 0 {
            return Err(invalid(
                "minPollIntervalMs",
                self.min_poll_interval_ms,
                "A zero floor would let the scanner spin; use at least 1",
            ));
        }

        for (field, value) in [
            ("pollIntervalMs", self.poll_interval_ms),
            ("activePollIntervalMs", self.active_poll_interval_ms),
            ("idlePollIntervalMs", self.idle_poll_interval_ms),
        ] {
            if value < self.min_poll_interval_ms {
                return Err(invalid(
                    field,
                    value,
                    &format!(
                        "Must be at least minPollIntervalMs ({})",
                        self.min_poll_interval_ms
                    ),
                ));
            }
        }

        if self.sweep_interval_secs == 0 {
            return Err(invalid(
                "sweepIntervalSecs",
                self.sweep_interval_secs,
                "Sweep interval must be at least one second",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, value: impl ToString, hint: &str) -> CliError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        hint: hint.to_string(),
    }
    .into()
}
