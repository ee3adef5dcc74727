//! Configuration management for the credit scoring API

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default listening port when `PORT` is unset
pub const DEFAULT_PORT: u16 = 8501;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub data: DataConfig,
    pub models: ModelsConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// Port to bind (overridden by the `PORT` environment variable)
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Static artifacts loaded once at startup
#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    /// Artifact directory. Empty means the executable's directory; relative
    /// paths are resolved under the executable's directory.
    #[serde(default)]
    pub dir: String,
    /// Classifier artifact (`.onnx` or tree-ensemble `.json`)
    pub model_file: String,
    /// Feature table CSV, one row per client
    pub features_file: String,
    /// Personal attributes CSV, one row per client
    pub personal_info_file: String,
    /// Standard scaler applied before prediction and attribution
    #[serde(default)]
    pub scaler_file: Option<String>,
    /// Tree-ensemble JSON used for attribution values
    #[serde(default)]
    pub explainer_file: Option<String>,
    /// Client identifier column shared by both tables
    pub id_column: String,
    /// Label column excluded from model input
    pub target_column: String,
}

impl DataConfig {
    /// Resolve the artifact directory against the running executable's location
    pub fn resolve_dir(&self) -> Result<PathBuf> {
        let dir = Path::new(&self.dir);
        if dir.is_absolute() {
            return Ok(dir.to_path_buf());
        }

        let exe = std::env::current_exe().context("Failed to locate the running executable")?;
        let base = exe
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(if self.dir.is_empty() {
            base
        } else {
            base.join(dir)
        })
    }

    /// Path of an artifact file inside `dir`; absolute file names are kept as-is
    pub fn artifact_path(dir: &Path, file: &str) -> PathBuf {
        let file = Path::new(file);
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            dir.join(file)
        }
    }
}

/// Model runtime configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Number of threads for ONNX inference (default: 1)
    pub onnx_threads: usize,
}

/// Metrics reporting configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Seconds between logged summaries, 0 disables the reporter
    pub report_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from `SCORING_CONFIG` or `config/config.toml`,
    /// then environment overrides
    pub fn load() -> Result<Self> {
        let path = std::env::var("SCORING_CONFIG").unwrap_or_else(|_| "config/config.toml".into());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path; a missing file falls back to defaults
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let port = match std::env::var("PORT") {
            Ok(raw) => Some(
                raw.trim()
                    .parse::<u16>()
                    .with_context(|| format!("Invalid PORT value: {raw:?}"))?,
            ),
            Err(_) => None,
        };

        let config = Self::defaults()?
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix("SCORING")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.port", port.map(i64::from))?
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", i64::from(DEFAULT_PORT))?
            .set_default("data.dir", "")?
            .set_default("data.model_file", "saved_model.onnx")?
            .set_default("data.features_file", "df300.csv")?
            .set_default("data.personal_info_file", "personal_info.csv")?
            .set_default("data.id_column", "SK_ID_CURR")?
            .set_default("data.target_column", "TARGET")?
            .set_default("models.onnx_threads", 1_i64)?
            .set_default("metrics.report_interval_secs", 60_i64)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?;
        Ok(builder)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: DEFAULT_PORT,
            },
            data: DataConfig {
                dir: String::new(),
                model_file: "saved_model.onnx".to_string(),
                features_file: "df300.csv".to_string(),
                personal_info_file: "personal_info.csv".to_string(),
                scaler_file: None,
                explainer_file: None,
                id_column: "SK_ID_CURR".to_string(),
                target_column: "TARGET".to_string(),
            },
            models: ModelsConfig { onnx_threads: 1 },
            metrics: MetricsConfig {
                report_interval_secs: 60,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind_address(), "0.0.0.0:8501");
        assert_eq!(config.data.id_column, "SK_ID_CURR");
        assert_eq!(config.data.target_column, "TARGET");
        assert!(config.data.scaler_file.is_none());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[data]
dir = "/srv/scoring"
model_file = "model.json"
explainer_file = "model.json"

[logging]
format = "json"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(config.data.dir, "/srv/scoring");
        assert_eq!(config.data.model_file, "model.json");
        assert_eq!(config.data.explainer_file.as_deref(), Some("model.json"));
        assert_eq!(config.data.features_file, "df300.csv");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_artifact_path() {
        let dir = Path::new("/srv/scoring");
        assert_eq!(
            DataConfig::artifact_path(dir, "df300.csv"),
            PathBuf::from("/srv/scoring/df300.csv")
        );
        assert_eq!(
            DataConfig::artifact_path(dir, "/tmp/model.onnx"),
            PathBuf::from("/tmp/model.onnx")
        );
    }

    #[test]
    fn test_absolute_dir_is_kept() {
        let mut data = AppConfig::default().data;
        data.dir = "/srv/scoring".to_string();
        assert_eq!(data.resolve_dir().unwrap(), PathBuf::from("/srv/scoring"));
    }
}
