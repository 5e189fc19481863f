use super::types::AnalyticsConfig;
use crate::error::Result;
use config::{Config, Environment, File};
use std::path::PathBuf;
use tracing::debug;

/// Configuration loader with builder pattern
///
/// 優先順位: デフォルト値 → 設定ファイル → 環境変数（`VITALIQ__ANOMALY__CONTAMINATION` 形式）
pub struct ConfigLoader {
    config_file: Option<PathBuf>,
    load_env: bool,
    env_prefix: String,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            config_file: None,
            load_env: false,
            env_prefix: "VITALIQ".to_string(),
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from_file(mut self, path: Option<impl Into<PathBuf>>) -> Self {
        self.config_file = path.map(Into::into);
        self
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Override the environment variable prefix
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Build and validate the final configuration
    pub fn build(self) -> Result<AnalyticsConfig> {
        let mut builder =
            Config::builder().add_source(Config::try_from(&AnalyticsConfig::default())?);

        if let Some(path) = &self.config_file {
            debug!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(File::from(path.clone()).required(true));
        } else {
            builder = builder
                .add_source(File::with_name("vitaliq").required(false))
                .add_source(File::with_name("config/vitaliq").required(false));
        }

        if self.load_env {
            builder = builder.add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config: AnalyticsConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_without_sources() {
        let config = ConfigLoader::new()
            .load_from_file(Some("does/not/exist/anywhere.toml"))
            .build();
        assert!(config.is_err());

        let config = ConfigLoader::new().build().unwrap();
        assert_eq!(config, AnalyticsConfig::default());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
[anomaly]
contamination = 0.1
max_anomalies = 20

[anomaly.thresholds]
sleep_hours = 3.0

[correlation]
cross_correlation_max_lag = 10
"#
        )
        .unwrap();

        let config = ConfigLoader::new()
            .load_from_file(Some(file.path()))
            .build()
            .unwrap();

        assert_eq!(config.anomaly.contamination, 0.1);
        assert_eq!(config.anomaly.max_anomalies, 20);
        assert_eq!(
            config
                .anomaly
                .threshold_for(crate::analytics::features::Metric::SleepHours),
            3.0
        );
        assert_eq!(config.correlation.cross_correlation_max_lag, 10);
        assert_eq!(config.correlation.granger_max_lag, 7);
    }

    #[test]
    fn test_invalid_file_values_are_rejected() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "[anomaly]\ncontamination = 1.5").unwrap();

        let err = ConfigLoader::new()
            .load_from_file(Some(file.path()))
            .build()
            .unwrap_err();
        assert!(err.is_configuration_error());
    }
}
