//! Env-driven configuration for the service and library.
//!
//! Values are read from the process environment at startup; `dotenv` is loaded
//! on demand by the binaries. Defaults are provided for local development, the
//! datastore falls back to the in-memory store when `DATASTORE_URL` is unset.
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

pub const DEFAULT_GENERATION_API_URL: &str = "https://api.kie.ai";
pub const DEFAULT_GENERATION_MODEL: &str = "nano-banana-pro";
pub const DEFAULT_FILE_UPLOAD_URL: &str = "https://kieai.redpandaai.co";
pub const DEFAULT_STORAGE_BUCKET: &str = "generations";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3_000;
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 60;

const SECRET_VARS: &[&str] = &[
    "DATASTORE_SERVICE_KEY",
    "GENERATION_API_KEY",
    "PAYMENT_ACCESS_TOKEN",
];

const PLAIN_VARS: &[&str] = &[
    "DATASTORE_URL",
    "GENERATION_API_URL",
    "GENERATION_MODEL",
    "FILE_UPLOAD_URL",
    "STORAGE_BUCKET",
    "POLL_INTERVAL_MS",
    "POLL_MAX_ATTEMPTS",
    "GENERATION_RESOLUTION",
    "GENERATION_OUTPUT_FORMAT",
    "API_HOST",
    "API_PORT",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub datastore_url: Option<String>,
    pub datastore_service_key: String,
    pub generation_api_url: String,
    pub generation_api_key: String,
    pub generation_model: String,
    pub file_upload_url: String,
    pub storage_bucket: String,
    pub payment_access_token: Option<String>,
    pub poll: PollSettings,
    pub resolution: String,
    pub output_format: String,
    pub api_host: String,
    pub api_port: String,
}

/// Bounds for the job status loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        PollSettings {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
        }
    }
}

impl Config {
    pub fn dotenv_load() {
        dotenv::dotenv().ok();
    }

    pub fn new() -> Result<Self, env::VarError> {
        let interval_ms = parse_or("POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS);
        let max_attempts = parse_or("POLL_MAX_ATTEMPTS", DEFAULT_POLL_MAX_ATTEMPTS);
        Ok(Config {
            datastore_url: env::var("DATASTORE_URL").ok().filter(|v| !v.trim().is_empty()),
            datastore_service_key: env::var("DATASTORE_SERVICE_KEY").unwrap_or_default(),
            generation_api_url: env::var("GENERATION_API_URL")
                .unwrap_or_else(|_| DEFAULT_GENERATION_API_URL.to_string()),
            generation_api_key: env::var("GENERATION_API_KEY").unwrap_or_default(),
            generation_model: env::var("GENERATION_MODEL")
                .unwrap_or_else(|_| DEFAULT_GENERATION_MODEL.to_string()),
            file_upload_url: env::var("FILE_UPLOAD_URL")
                .unwrap_or_else(|_| DEFAULT_FILE_UPLOAD_URL.to_string()),
            storage_bucket: env::var("STORAGE_BUCKET")
                .unwrap_or_else(|_| DEFAULT_STORAGE_BUCKET.to_string()),
            payment_access_token: env::var("PAYMENT_ACCESS_TOKEN").ok(),
            poll: PollSettings {
                interval: Duration::from_millis(interval_ms),
                max_attempts: max_attempts.max(1),
            },
            resolution: env::var("GENERATION_RESOLUTION").unwrap_or_else(|_| "2K".to_string()),
            output_format: env::var("GENERATION_OUTPUT_FORMAT")
                .unwrap_or_else(|_| "png".to_string()),
            api_host: env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            api_port: env::var("API_PORT").unwrap_or_else(|_| "8189".to_string()),
        })
    }

    /// Log which variables are set. Secrets are only reported as present.
    pub fn print_env_vars() {
        for name in PLAIN_VARS {
            let value = env::var(name).unwrap_or_else(|_| "<unset>".to_string());
            tracing::info!("{}: {}", name, value);
        }
        for name in SECRET_VARS {
            let state = if env::var(name).is_ok() { "<set>" } else { "<unset>" };
            tracing::info!("{}: {}", name, state);
        }
    }

    /// Resolve the listen address, falling back to 127.0.0.1:8189 on bad input.
    pub fn socket_address(&self) -> SocketAddr {
        let ip: IpAddr = self.api_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid API_HOST '{}', falling back to 127.0.0.1", self.api_host);
            IpAddr::from([127, 0, 0, 1])
        });
        let port: u16 = self.api_port.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid API_PORT '{}', falling back to 8189", self.api_port);
            8189
        });
        SocketAddr::new(ip, port)
    }
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid {} '{}', using default", name, raw);
            default
        }),
        Err(_) => default,
    }
}
