use std::env;
use std::path::PathBuf;

pub const DEFAULT_DB_PATH: &str = "placement.db";
pub const DEFAULT_MODEL_PATH: &str = "placement_model.json";

/// Locations and logging settings, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub model_path: PathBuf,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub log_level: String,
    /// Colored log lines; off unless `PLACEMENT_LOG_COLOR` is truthy.
    pub ansi: bool,
}

impl AppConfig {
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Self {
            db_path: non_empty("PLACEMENT_DB_PATH")
                .unwrap_or_else(|| DEFAULT_DB_PATH.to_string())
                .into(),
            model_path: non_empty("PLACEMENT_MODEL_PATH")
                .unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string())
                .into(),
            telemetry: TelemetryConfig {
                log_level: non_empty("PLACEMENT_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
                ansi: non_empty("PLACEMENT_LOG_COLOR")
                    .map(|value| matches!(value.trim(), "1" | "true" | "yes" | "on"))
                    .unwrap_or(false),
            },
        }
    }

    /// Command-line flags win over the environment.
    pub fn with_overrides(mut self, db: Option<PathBuf>, model: Option<PathBuf>) -> Self {
        if let Some(db) = db {
            self.db_path = db;
        }
        if let Some(model) = model {
            self.model_path = model;
        }
        self
    }
}
