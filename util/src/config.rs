//! Global application configuration manager.
//!
//! `AppConfig` is a lazily initialized, globally accessible singleton containing
//! runtime configuration values loaded from environment variables. It provides
//! thread-safe access and mutation for testing or overrides in runtime environments.

use std::collections::HashMap;
use std::env;
use std::sync::{OnceLock, RwLock};

/// A named campus landmark usable as a preset attendance location.
#[derive(Debug, Clone, serde::Deserialize, PartialEq)]
pub struct PresetLocation {
    pub lat: f64,
    pub lng: f64,
}

/// Represents the complete application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub log_to_stdout: bool,
    pub database_path: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_duration_minutes: u64,
    pub face_encoder_host: String,
    pub face_encoder_port: u16,
    pub face_match_tolerance: f32,
    pub face_quality_threshold: f32,
    pub preset_locations: HashMap<String, PresetLocation>,
}

/// Lazily-initialized, thread-safe singleton instance of `AppConfig`.
static CONFIG_INSTANCE: OnceLock<RwLock<AppConfig>> = OnceLock::new();

impl AppConfig {
    /// Loads the configuration from `.env` and environment variables.
    ///
    /// This method is used internally to populate the singleton. It panics
    /// if required variables are missing or improperly formatted.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        // PRESET_LOCATIONS is a JSON map of landmark name -> { lat, lng }.
        let preset_locations = env::var("PRESET_LOCATIONS")
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();

        Self {
            env: env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            project_name: env::var("PROJECT_NAME").unwrap_or_else(|_| "rollcall".into()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "api=info".into()),
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "api.log".into()),
            log_to_stdout: env::var("LOG_TO_STDOUT").unwrap_or_else(|_| "false".into()) == "true",
            database_path: env::var("DATABASE_PATH").expect("DATABASE_PATH is required"),
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".into())
                .parse()
                .unwrap(),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET is required"),
            jwt_duration_minutes: env::var("JWT_DURATION_MINUTES")
                .unwrap_or("60".into())
                .parse()
                .unwrap(),
            face_encoder_host: env::var("FACE_ENCODER_HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            face_encoder_port: env::var("FACE_ENCODER_PORT")
                .unwrap_or_else(|_| "3002".into())
                .parse()
                .unwrap(),
            face_match_tolerance: env::var("FACE_MATCH_TOLERANCE")
                .unwrap_or("0.6".into())
                .parse()
                .unwrap(),
            face_quality_threshold: env::var("FACE_QUALITY_THRESHOLD")
                .unwrap_or("0.4".into())
                .parse()
                .unwrap(),
            preset_locations,
        }
    }

    /// Returns a shared reference to the global configuration.
    ///
    /// # Panics
    /// Panics if the lock cannot be acquired.
    pub fn global() -> std::sync::RwLockReadGuard<'static, AppConfig> {
        CONFIG_INSTANCE
            .get_or_init(|| RwLock::new(AppConfig::from_env()))
            .read()
            .expect("Failed to acquire AppConfig read lock")
    }

    /// Resets the configuration by reloading from environment variables.
    ///
    /// Useful in tests to clear overrides.
    pub fn reset() {
        if let Some(lock) = CONFIG_INSTANCE.get() {
            let mut guard = lock.write().unwrap();
            *guard = AppConfig::from_env();
        }
    }

    /// Generic internal setter for any field in the config.
    ///
    /// Used by public per-field setter methods.
    fn set_field<F>(setter: F)
    where
        F: FnOnce(&mut AppConfig),
    {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        let mut guard = lock
            .write()
            .expect("Failed to acquire AppConfig write lock");
        setter(&mut guard);
    }

    // --- Per-field setters below ---

    /// Override `env` value.
    pub fn set_env(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.env = value.into());
    }

    pub fn set_project_name(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.project_name = value.into());
    }

    pub fn set_log_level(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.log_level = value.into());
    }

    pub fn set_log_file(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.log_file = value.into());
    }

    pub fn set_log_to_stdout(value: bool) {
        AppConfig::set_field(|cfg| cfg.log_to_stdout = value);
    }

    pub fn set_database_path(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.database_path = value.into());
    }

    pub fn set_host(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.host = value.into());
    }

    pub fn set_port(value: u16) {
        AppConfig::set_field(|cfg| cfg.port = value);
    }

    pub fn set_jwt_secret(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.jwt_secret = value.into());
    }

    pub fn set_jwt_duration_minutes(value: u64) {
        AppConfig::set_field(|cfg| cfg.jwt_duration_minutes = value);
    }

    pub fn set_face_encoder_host(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.face_encoder_host = value.into());
    }

    pub fn set_face_encoder_port(value: u16) {
        AppConfig::set_field(|cfg| cfg.face_encoder_port = value);
    }

    pub fn set_face_match_tolerance(value: f32) {
        AppConfig::set_field(|cfg| cfg.face_match_tolerance = value);
    }

    pub fn set_face_quality_threshold(value: f32) {
        AppConfig::set_field(|cfg| cfg.face_quality_threshold = value);
    }

    pub fn set_preset_locations(value: HashMap<String, PresetLocation>) {
        AppConfig::set_field(|cfg| cfg.preset_locations = value);
    }
}

// --- Module-level accessors used throughout the workspace ---

pub fn env() -> String {
    AppConfig::global().env.clone()
}

pub fn project_name() -> String {
    AppConfig::global().project_name.clone()
}

pub fn log_level() -> String {
    AppConfig::global().log_level.clone()
}

pub fn log_file() -> String {
    AppConfig::global().log_file.clone()
}

pub fn log_to_stdout() -> bool {
    AppConfig::global().log_to_stdout
}

pub fn database_path() -> String {
    AppConfig::global().database_path.clone()
}

pub fn host() -> String {
    AppConfig::global().host.clone()
}

pub fn port() -> u16 {
    AppConfig::global().port
}

pub fn jwt_secret() -> String {
    AppConfig::global().jwt_secret.clone()
}

pub fn jwt_duration_minutes() -> u64 {
    AppConfig::global().jwt_duration_minutes
}

pub fn face_encoder_host() -> String {
    AppConfig::global().face_encoder_host.clone()
}

pub fn face_encoder_port() -> u16 {
    AppConfig::global().face_encoder_port
}

pub fn face_match_tolerance() -> f32 {
    AppConfig::global().face_match_tolerance
}

pub fn face_quality_threshold() -> f32 {
    AppConfig::global().face_quality_threshold
}

pub fn preset_locations() -> HashMap<String, PresetLocation> {
    AppConfig::global().preset_locations.clone()
}
