//! Environment configuration.
//!
//! Read once at startup; missing or malformed required values abort startup.
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        match std::env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    // Origin this server is reachable at, e.g. `https://idp.example.com`.
    pub public_origin: String,

    pub auth_issuer: String,
    pub auth_audience: String,
    pub access_jwt_public_key_pem: String,
    pub access_token_leeway_seconds: u64,
    pub access_token_types: Vec<String>,

    pub allow_origin_in_return_url: bool,
    pub login_url: String,
    pub consent_url: String,
    pub return_url_parameter: String,

    pub dpop_iat_leeway_seconds: i64,
    pub dpop_max_age_seconds: i64,
    pub dpop_require_nonce: bool,
    pub replay_cache_capacity: usize,

    pub par_ttl: Duration,
    pub par_sweep_interval: Duration,
    // How long the login/consent pages may take before the callback.
    pub message_ttl: Duration,
    pub store_timeout: Duration,

    pub valkey_url: Option<String>,
    pub database_url: Option<String>,
    pub user_directory_path: Option<String>,
    pub clients_path: Option<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Connection strings may embed credentials
        f.debug_struct("Config")
            .field("addr", &self.addr)
            .field("app_env", &self.app_env)
            .field("public_origin", &self.public_origin)
            .field("auth_issuer", &self.auth_issuer)
            .field("auth_audience", &self.auth_audience)
            .field("access_token_types", &self.access_token_types)
            .field("dpop_iat_leeway_seconds", &self.dpop_iat_leeway_seconds)
            .field("dpop_max_age_seconds", &self.dpop_max_age_seconds)
            .field("par_ttl", &self.par_ttl)
            .field("message_ttl", &self.message_ttl)
            .field("valkey", &self.valkey_url.is_some())
            .field("database", &self.database_url.is_some())
            .finish_non_exhaustive()
    }
}

fn optional_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match optional_var(key) {
        Some(v) => v.parse::<T>().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

fn bool_or(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match optional_var(key).map(|v| v.to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid(key)),
        },
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = parsed_or("PORT", 3000)?;
        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::from_env();

        let public_origin = optional_var("PUBLIC_ORIGIN")
            .unwrap_or_else(|| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&public_origin).map_err(|_| ConfigError::Invalid("PUBLIC_ORIGIN"))?;

        let auth_issuer =
            optional_var("AUTH_ISSUER").ok_or(ConfigError::Missing("AUTH_ISSUER"))?;
        let auth_audience =
            optional_var("AUTH_AUDIENCE").ok_or(ConfigError::Missing("AUTH_AUDIENCE"))?;
        let access_jwt_public_key_pem = optional_var("ACCESS_JWT_PUBLIC_KEY_PEM")
            .ok_or(ConfigError::Missing("ACCESS_JWT_PUBLIC_KEY_PEM"))?
            .replace("\\n", "\n");
        let access_token_leeway_seconds = parsed_or("ACCESS_TOKEN_LEEWAY_SECONDS", 60)?;
        let access_token_types = optional_var("ACCESS_TOKEN_TYPES")
            .unwrap_or_else(|| "at+jwt,JWT".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let allow_origin_in_return_url = bool_or("ALLOW_ORIGIN_IN_RETURN_URL", false)?;
        let login_url = optional_var("LOGIN_URL").unwrap_or_else(|| "/account/login".to_string());
        let consent_url = optional_var("CONSENT_URL").unwrap_or_else(|| "/consent".to_string());
        let return_url_parameter =
            optional_var("RETURN_URL_PARAMETER").unwrap_or_else(|| "returnUrl".to_string());

        let dpop_iat_leeway_seconds: i64 = parsed_or("DPOP_IAT_LEEWAY_SECONDS", 5)?;
        let dpop_max_age_seconds: i64 = parsed_or("DPOP_MAX_AGE_SECONDS", 60)?;
        if dpop_iat_leeway_seconds < 0 {
            return Err(ConfigError::Invalid("DPOP_IAT_LEEWAY_SECONDS"));
        }
        if dpop_max_age_seconds <= 0 {
            return Err(ConfigError::Invalid("DPOP_MAX_AGE_SECONDS"));
        }
        let dpop_require_nonce = bool_or("DPOP_REQUIRE_NONCE", false)?;
        let replay_cache_capacity: usize = parsed_or("REPLAY_CACHE_CAPACITY", 100_000)?;

        let par_ttl_seconds: u64 = parsed_or("PAR_TTL_SECONDS", 60)?;
        if par_ttl_seconds == 0 {
            return Err(ConfigError::Invalid("PAR_TTL_SECONDS"));
        }
        let par_sweep_interval_seconds: u64 = parsed_or("PAR_SWEEP_INTERVAL_SECONDS", 60)?;
        if par_sweep_interval_seconds == 0 {
            return Err(ConfigError::Invalid("PAR_SWEEP_INTERVAL_SECONDS"));
        }
        let message_ttl_seconds: u64 = parsed_or("AUTHORIZATION_MESSAGE_TTL_SECONDS", 600)?;
        if message_ttl_seconds == 0 {
            return Err(ConfigError::Invalid("AUTHORIZATION_MESSAGE_TTL_SECONDS"));
        }
        let store_timeout_ms: u64 = parsed_or("STORE_TIMEOUT_MS", 2_000)?;

        Ok(Self {
            addr,
            app_env,
            public_origin,
            auth_issuer,
            auth_audience,
            access_jwt_public_key_pem,
            access_token_leeway_seconds,
            access_token_types,
            allow_origin_in_return_url,
            login_url,
            consent_url,
            return_url_parameter,
            dpop_iat_leeway_seconds,
            dpop_max_age_seconds,
            dpop_require_nonce,
            replay_cache_capacity,
            par_ttl: Duration::from_secs(par_ttl_seconds),
            par_sweep_interval: Duration::from_secs(par_sweep_interval_seconds),
            message_ttl: Duration::from_secs(message_ttl_seconds),
            store_timeout: Duration::from_millis(store_timeout_ms),
            valkey_url: optional_var("VALKEY_URL"),
            database_url: optional_var("DATABASE_URL"),
            user_directory_path: optional_var("USER_DIRECTORY_PATH"),
            clients_path: optional_var("CLIENTS_PATH"),
        })
    }
}
