use rpcgate_core::config::{CommandSettings, RuntimePaths};
use rpcgate_core::signature::SharedSecret;

/// Default host identity endpoint (EC2 instance metadata).
pub const DEFAULT_IDENTITY_URL: &str = "http://169.254.169.254/latest/meta-data/local-hostname";

/// Where the shared signing secret comes from.
#[derive(Debug, Clone)]
pub enum SecretSource {
    /// Provided directly (`RPC_SHARED_SECRET`).
    Static(SharedSecret),
    /// Fetched once at startup from a host identity endpoint.
    IdentityUrl(String),
}

/// Gateway configuration loaded from environment variables.
///
/// All fields have defaults suitable for a single-host deployment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `300`). Synchronous calls
    /// that run longer are cut off and their child process is killed.
    pub request_timeout_secs: u64,
    /// Largest accepted request body, uploads included (default: 100 MiB).
    pub max_body_bytes: usize,
    /// Workspace root, queue directory and worker pid file.
    pub paths: RuntimePaths,
    /// Settings for command-backed methods.
    pub commands: CommandSettings,
    /// Origin of the shared signing secret.
    pub secret: SecretSource,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                                   |
    /// |------------------------|-------------------------------------------|
    /// | `HOST`                 | `0.0.0.0`                                 |
    /// | `PORT`                 | `3000`                                    |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`                   |
    /// | `REQUEST_TIMEOUT_SECS` | `300`                                     |
    /// | `MAX_BODY_BYTES`       | `104857600`                               |
    /// | `RPC_SHARED_SECRET`    | unset: fetched from `RPC_IDENTITY_URL`    |
    /// | `RPC_IDENTITY_URL`     | [`DEFAULT_IDENTITY_URL`]                  |
    ///
    /// Paths and command settings are documented on
    /// [`RuntimePaths::from_env`] and [`CommandSettings::from_env`].
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let max_body_bytes: usize = std::env::var("MAX_BODY_BYTES")
            .unwrap_or_else(|_| "104857600".into())
            .parse()
            .expect("MAX_BODY_BYTES must be a valid usize");

        let secret = match std::env::var("RPC_SHARED_SECRET") {
            Ok(value) if !value.is_empty() => SecretSource::Static(SharedSecret::new(value)),
            _ => SecretSource::IdentityUrl(
                std::env::var("RPC_IDENTITY_URL").unwrap_or_else(|_| DEFAULT_IDENTITY_URL.into()),
            ),
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            max_body_bytes,
            paths: RuntimePaths::from_env(),
            commands: CommandSettings::from_env(),
            secret,
        }
    }
}
