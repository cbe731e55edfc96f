//! Application configuration.
//!
//! Loads settings from environment variables (with `.env` support) into a
//! single struct that is passed into every component that needs it.

use std::env;
use std::time::Duration;

use secrecy::SecretString;
use tracing::Level;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_LIVE_MODEL: &str = "models/gemini-2.0-flash-exp";
pub const DEFAULT_STT_ENDPOINT: &str = "https://www.google.com/speech-api/v2/recognize";

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: Option<SecretString>,
    pub gemini_model: String,
    pub gemini_live_model: String,
    pub scout_endpoint: String,
    pub golem_endpoint: String,
    pub marker_endpoint: String,
    pub output_dir: String,
    pub voice_language: String,
    pub voice_timeout: Duration,
    pub voice_phrase_timeout: Duration,
    /// Speech-to-text endpoint. Credentials, if the service needs them, go
    /// into the URL itself.
    pub stt_endpoint: String,
    pub log_level: Level,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    MissingVar(String),
    #[error("invalid value {value:?} for {var}: expected a number of seconds")]
    InvalidSeconds { var: String, value: String },
    #[error("invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// * `GEMINI_API_KEY`: API key for the generative endpoints. Only
    ///   required for commands that reach the LLM or the live voice mode.
    /// * `GEMINI_MODEL`: (Optional) Model for text generation.
    /// * `GEMINI_LIVE_MODEL`: (Optional) Model for the live voice session.
    /// * `SCOUT_GRPC_HOST` / `GOLEM_GRPC_HOST` / `MARKER_GRPC_HOST`:
    ///   (Optional) Service endpoints, defaulting to localhost ports
    ///   50051-50053.
    /// * `OUTPUT_DIR`: (Optional) Where generated artifacts land.
    /// * `VOICE_LANGUAGE`, `VOICE_TIMEOUT`, `VOICE_PHRASE_TIMEOUT`,
    ///   `STT_ENDPOINT`: (Optional) Speech recognition settings.
    /// * `RUST_LOG`: (Optional) Logging level, defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env for local development; ignored if not present.
        dotenvy::dotenv().ok();

        let gemini_api_key = env::var("GEMINI_API_KEY").ok().map(SecretString::from);
        let gemini_model =
            env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string());
        let gemini_live_model =
            env::var("GEMINI_LIVE_MODEL").unwrap_or_else(|_| DEFAULT_LIVE_MODEL.to_string());

        let scout_endpoint =
            env::var("SCOUT_GRPC_HOST").unwrap_or_else(|_| "http://localhost:50051".to_string());
        let golem_endpoint =
            env::var("GOLEM_GRPC_HOST").unwrap_or_else(|_| "http://localhost:50052".to_string());
        let marker_endpoint =
            env::var("MARKER_GRPC_HOST").unwrap_or_else(|_| "http://localhost:50053".to_string());

        let output_dir = env::var("OUTPUT_DIR").unwrap_or_else(|_| "output".to_string());

        let voice_language = env::var("VOICE_LANGUAGE").unwrap_or_else(|_| "en-US".to_string());
        let voice_timeout = seconds_var("VOICE_TIMEOUT", 5)?;
        let voice_phrase_timeout = seconds_var("VOICE_PHRASE_TIMEOUT", 3)?;
        let stt_endpoint =
            env::var("STT_ENDPOINT").unwrap_or_else(|_| DEFAULT_STT_ENDPOINT.to_string());

        let log_level_str = env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            gemini_api_key,
            gemini_model,
            gemini_live_model,
            scout_endpoint,
            golem_endpoint,
            marker_endpoint,
            output_dir,
            voice_language,
            voice_timeout,
            voice_phrase_timeout,
            stt_endpoint,
            log_level,
        })
    }

    /// The API key, or the error every LLM-dependent path reports.
    pub fn require_api_key(&self) -> Result<&SecretString, ConfigError> {
        self.gemini_api_key
            .as_ref()
            .ok_or_else(|| ConfigError::MissingVar("GEMINI_API_KEY".to_string()))
    }
}

fn seconds_var(var: &str, default: u64) -> Result<Duration, ConfigError> {
    match env::var(var) {
        Ok(value) => {
            let secs = value.parse::<u64>().map_err(|_| ConfigError::InvalidSeconds {
                var: var.to_string(),
                value,
            })?;
            Ok(Duration::from_secs(secs))
        }
        Err(_) => Ok(Duration::from_secs(default)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The process environment is shared; tests that touch the variables
    // read by from_env serialize on this lock.
    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    fn clear_env() {
        for var in [
            "GEMINI_API_KEY",
            "GEMINI_MODEL",
            "GEMINI_LIVE_MODEL",
            "SCOUT_GRPC_HOST",
            "GOLEM_GRPC_HOST",
            "MARKER_GRPC_HOST",
            "OUTPUT_DIR",
            "VOICE_LANGUAGE",
            "VOICE_TIMEOUT",
            "VOICE_PHRASE_TIMEOUT",
            "STT_ENDPOINT",
        ] {
            env::remove_var(var);
        }
        env::set_var("RUST_LOG", "INFO");
    }

    #[test]
    fn seconds_var_defaults_when_unset() {
        env::remove_var("SYNAPSE_TEST_SECONDS_UNSET");
        let parsed = seconds_var("SYNAPSE_TEST_SECONDS_UNSET", 5).unwrap();
        assert_eq!(parsed, Duration::from_secs(5));
    }

    #[test]
    fn seconds_var_parses_numeric_values() {
        env::set_var("SYNAPSE_TEST_SECONDS_OK", "9");
        let parsed = seconds_var("SYNAPSE_TEST_SECONDS_OK", 5).unwrap();
        assert_eq!(parsed, Duration::from_secs(9));
        env::remove_var("SYNAPSE_TEST_SECONDS_OK");
    }

    #[test]
    fn seconds_var_rejects_non_numeric_values() {
        env::set_var("SYNAPSE_TEST_SECONDS_BAD", "soon");
        let err = seconds_var("SYNAPSE_TEST_SECONDS_BAD", 5).unwrap_err();
        match err {
            ConfigError::InvalidSeconds { var, value } => {
                assert_eq!(var, "SYNAPSE_TEST_SECONDS_BAD");
                assert_eq!(value, "soon");
            }
            other => panic!("unexpected error: {other}"),
        }
        env::remove_var("SYNAPSE_TEST_SECONDS_BAD");
    }

    #[test]
    fn from_env_fills_documented_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        let config = Config::from_env().unwrap();
        assert_eq!(config.gemini_model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.gemini_live_model, DEFAULT_LIVE_MODEL);
        assert_eq!(config.scout_endpoint, "http://localhost:50051");
        assert_eq!(config.golem_endpoint, "http://localhost:50052");
        assert_eq!(config.marker_endpoint, "http://localhost:50053");
        assert_eq!(config.output_dir, "output");
        assert_eq!(config.voice_language, "en-US");
        assert_eq!(config.voice_timeout, Duration::from_secs(5));
        assert_eq!(config.voice_phrase_timeout, Duration::from_secs(3));
        assert_eq!(config.stt_endpoint, DEFAULT_STT_ENDPOINT);
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn from_env_reads_overrides() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("GEMINI_MODEL", "gemini-exp-1206");
        env::set_var("SCOUT_GRPC_HOST", "http://scout:6000");
        env::set_var("VOICE_TIMEOUT", "11");

        let config = Config::from_env().unwrap();
        assert_eq!(config.gemini_model, "gemini-exp-1206");
        assert_eq!(config.scout_endpoint, "http://scout:6000");
        assert_eq!(config.voice_timeout, Duration::from_secs(11));

        env::remove_var("GEMINI_MODEL");
        env::remove_var("SCOUT_GRPC_HOST");
        env::remove_var("VOICE_TIMEOUT");
    }

    #[test]
    fn invalid_log_level_is_a_config_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("RUST_LOG", "purple");

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLogLevel(ref level) if level == "purple"));

        env::set_var("RUST_LOG", "INFO");
    }

    #[test]
    fn missing_api_key_is_reported_by_name() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        let config = Config::from_env().unwrap();
        let err = config.require_api_key().unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref var) if var == "GEMINI_API_KEY"));
    }
}
