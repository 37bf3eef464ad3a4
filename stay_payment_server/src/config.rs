use std::env;

use log::*;
use rand::{distributions::Alphanumeric, Rng};
use spg_common::{parse_boolean_flag, Secret};

const DEFAULT_SPG_HOST: &str = "127.0.0.1";
const DEFAULT_SPG_PORT: u16 = 8360;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    /// When true, error responses include the internal error message. Never enable in production.
    pub expose_error_detail: bool,
    /// Card processor API configuration.
    pub gateway: GatewayConfig,
    /// Mail API configuration.
    pub mail: MailConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SPG_HOST.to_string(),
            port: DEFAULT_SPG_PORT,
            database_url: String::default(),
            auth: AuthConfig::default(),
            expose_error_detail: false,
            gateway: GatewayConfig::default(),
            mail: MailConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SPG_HOST").ok().unwrap_or_else(|| DEFAULT_SPG_HOST.into());
        let port = env::var("SPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for SPG_PORT. {e} Using the default, {DEFAULT_SPG_PORT}, instead."
                    );
                    DEFAULT_SPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SPG_PORT);
        let database_url = env::var("SPG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ SPG_DATABASE_URL is not set. Please set it to the URL for the SPG database.");
            String::default()
        });
        let expose_error_detail = parse_boolean_flag(env::var("SPG_EXPOSE_ERROR_DETAIL").ok(), false);
        if expose_error_detail {
            warn!("🪛️ SPG_EXPOSE_ERROR_DETAIL is enabled. Internal error detail will leak into responses.");
        }
        Self {
            host,
            port,
            database_url,
            auth: AuthConfig::from_env_or_default(),
            expose_error_detail,
            gateway: GatewayConfig::from_env_or_default(),
            mail: MailConfig::from_env_or_default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HS256 secret shared with the token issuing service.
    pub jwt_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        // A random secret means every token is rejected until the operator configures a real one.
        let secret: String = rand::thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect();
        Self { jwt_secret: Secret::new(secret) }
    }
}

impl AuthConfig {
    pub fn from_env_or_default() -> Self {
        match env::var("SPG_JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => Self { jwt_secret: Secret::new(secret) },
            _ => {
                warn!(
                    "🪛️ SPG_JWT_SECRET is not set. A random secret has been generated, so all access tokens will be \
                     rejected by this instance."
                );
                Self::default()
            },
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct GatewayConfig {
    /// Base url of the card processor API, e.g. "https://api.stripe.com".
    pub api_url: String,
    pub api_key: Secret<String>,
}

impl GatewayConfig {
    pub fn from_env_or_default() -> Self {
        let api_url = env::var("SPG_GATEWAY_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ SPG_GATEWAY_URL is not set. Card charges will fail until it is configured.");
            String::default()
        });
        let api_key = Secret::new(env::var("SPG_GATEWAY_API_KEY").ok().unwrap_or_else(|| {
            warn!("🪛️ SPG_GATEWAY_API_KEY is not set. Card charges will fail until it is configured.");
            String::default()
        }));
        Self { api_url, api_key }
    }
}

#[derive(Clone, Debug)]
pub struct MailConfig {
    /// Base url of the transactional mail API.
    pub api_url: String,
    pub api_key: Secret<String>,
    /// The address payment receipts are sent from.
    pub sender: String,
    /// The back-office address that receives a copy of every payment notification.
    pub admin_email: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            api_url: String::default(),
            api_key: Secret::default(),
            sender: "no-reply@stay.example".to_string(),
            admin_email: "bookings@stay.example".to_string(),
        }
    }
}

impl MailConfig {
    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        let api_url = env::var("SPG_MAIL_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ SPG_MAIL_URL is not set. Email notifications will be dropped.");
            String::default()
        });
        let api_key = Secret::new(env::var("SPG_MAIL_API_KEY").ok().unwrap_or_default());
        let sender = env::var("SPG_MAIL_SENDER").ok().unwrap_or(defaults.sender);
        let admin_email = env::var("SPG_ADMIN_EMAIL").ok().unwrap_or_else(|| {
            info!("🪛️ SPG_ADMIN_EMAIL is not set. Using the default, {}.", defaults.admin_email);
            defaults.admin_email.clone()
        });
        Self { api_url, api_key, sender, admin_email }
    }
}
