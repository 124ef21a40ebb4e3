//! Application-level configuration loading: listen port, TLS material, CORS origins, and relay limits.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/relay.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "ARCADE_RELAY_CONFIG_PATH";

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_TLS_KEY_PATH: &str = "./privkey.pem";
const DEFAULT_TLS_CERT_PATH: &str = "./fullchain.pem";
const DEFAULT_ALLOWED_ORIGINS: [&str; 3] = [
    "https://vibe.andrewos.com",
    "http://localhost:5173",
    "https://www.andrewos.com",
];
const DEFAULT_GAME_OVER_RESET_MS: u64 = 5_000;
const DEFAULT_MAX_CHAT_LEN: usize = 500;
const DEFAULT_TLS_HANDSHAKE_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// TCP port the server listens on.
    pub port: u16,
    /// PEM private key used for TLS.
    pub tls_key_path: PathBuf,
    /// PEM certificate chain used for TLS.
    pub tls_cert_path: PathBuf,
    /// Origins allowed by the CORS layer.
    pub allowed_origins: Vec<String>,
    /// Delay between a game over and the return to the title screen.
    pub game_over_reset: Duration,
    /// Longest accepted chat line, in characters.
    pub max_chat_len: usize,
    /// Upper bound on a single TLS handshake.
    pub tls_handshake_timeout: Duration,
}

impl AppConfig {
    /// Load the configuration from disk and the process environment.
    pub fn load() -> Self {
        let mut config = Self::load_file();
        config.apply_env(|key| env::var(key).ok());
        config
    }

    fn load_file() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        port = app_config.port,
                        origins = app_config.allowed_origins.len(),
                        "loaded relay config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Apply `PORT`, `SSL_KEY_PATH`, `SSL_CERT_PATH`, and `ALLOWED_ORIGINS` on top of the file values.
    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("PORT") {
            match value.parse::<u16>() {
                Ok(port) => self.port = port,
                Err(err) => warn!(value = %value, error = %err, "ignoring invalid PORT"),
            }
        }
        if let Some(path) = lookup("SSL_KEY_PATH").filter(|value| !value.is_empty()) {
            self.tls_key_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("SSL_CERT_PATH").filter(|value| !value.is_empty()) {
            self.tls_cert_path = PathBuf::from(path);
        }
        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            let origins = split_origins(&origins);
            if !origins.is_empty() {
                self.allowed_origins = origins;
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    port: u16,
    tls_key_path: String,
    tls_cert_path: String,
    allowed_origins: Vec<String>,
    game_over_reset_ms: u64,
    max_chat_len: usize,
    tls_handshake_timeout_ms: u64,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            tls_key_path: DEFAULT_TLS_KEY_PATH.into(),
            tls_cert_path: DEFAULT_TLS_CERT_PATH.into(),
            allowed_origins: DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect(),
            game_over_reset_ms: DEFAULT_GAME_OVER_RESET_MS,
            max_chat_len: DEFAULT_MAX_CHAT_LEN,
            tls_handshake_timeout_ms: DEFAULT_TLS_HANDSHAKE_TIMEOUT_MS,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            port: value.port,
            tls_key_path: PathBuf::from(value.tls_key_path),
            tls_cert_path: PathBuf::from(value.tls_cert_path),
            allowed_origins: value.allowed_origins,
            game_over_reset: Duration::from_millis(value.game_over_reset_ms),
            max_chat_len: value.max_chat_len,
            tls_handshake_timeout: Duration::from_millis(value.tls_handshake_timeout_ms),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn split_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect()
}
