use std::{env, net::IpAddr, time::Duration};

use gateway_tools::GatewayConfig;
use log::*;
use storefront_common::{
    helpers::{parse_boolean_flag, split_list},
    Secret,
};

const DEFAULT_SF_HOST: &str = "127.0.0.1";
const DEFAULT_SF_PORT: u16 = 8460;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/storefront.db";
const DEFAULT_SIGNATURE_HEADER: &str = "x-gateway-signature";
const DEFAULT_POLL_MIN_DELAY: Duration = Duration::from_millis(2_000);
const DEFAULT_POLL_MAX_DELAY: Duration = Duration::from_secs(60);
const DEFAULT_POLL_MAX_ATTEMPTS: usize = 20;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address.
    pub use_forwarded: bool,
    /// If true, `PATCH /payments/{store}/update-order-status/{reference}` marks orders paid on the caller's word.
    /// **DANGER**
    pub enable_payment_fallback: bool,
    /// The callback url handed to the gateway when the client does not supply one.
    pub callback_url: Option<String>,
    pub gateway: GatewayConfig,
    pub webhook: WebhookConfig,
    pub polling: PollConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SF_HOST.to_string(),
            port: DEFAULT_SF_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            enable_payment_fallback: false,
            callback_url: None,
            gateway: GatewayConfig::default(),
            webhook: WebhookConfig::default(),
            polling: PollConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SF_HOST").ok().unwrap_or_else(|| DEFAULT_SF_HOST.into());
        let port = env::var("SF_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!("🪛️ {s} is not a valid port for SF_PORT. {e} Using the default, {DEFAULT_SF_PORT}, instead.");
                    DEFAULT_SF_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SF_PORT);
        let database_url = env::var("SF_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ SF_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("SF_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("SF_USE_FORWARDED").ok(), false);
        let enable_payment_fallback = parse_boolean_flag(env::var("SF_ENABLE_PAYMENT_FALLBACK").ok(), false);
        if enable_payment_fallback {
            warn!(
                "🚨️🚨️🚨️ The manual payment fallback endpoint is enabled. Anyone who can reach it can mark orders as \
                 paid. Do not run like this in production unless the endpoint is protected by other means. 🚨️🚨️🚨️"
            );
        }
        let callback_url = env::var("SF_CALLBACK_URL").ok().filter(|s| !s.trim().is_empty());
        let gateway = GatewayConfig::new_from_env_or_default();
        Self {
            host,
            port,
            database_url,
            use_x_forwarded_for,
            use_forwarded,
            enable_payment_fallback,
            callback_url,
            gateway,
            webhook: WebhookConfig::from_env_or_defaults(),
            polling: PollConfig::from_env_or_defaults(),
        }
    }
}

//-------------------------------------------------  WebhookConfig  ----------------------------------------------------
#[derive(Clone, Debug)]
pub struct WebhookConfig {
    pub hmac_secret: Secret<String>,
    pub hmac_header: String,
    pub hmac_checks: bool,
    /// If supplied, webhook calls are only accepted from these addresses.
    /// To explicitly disable the whitelist, set this to "false", "none", or "0".
    pub whitelist: Option<Vec<IpAddr>>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            hmac_secret: Secret::default(),
            hmac_header: DEFAULT_SIGNATURE_HEADER.to_string(),
            hmac_checks: true,
            whitelist: None,
        }
    }
}

impl WebhookConfig {
    pub fn from_env_or_defaults() -> Self {
        let hmac_secret = env::var("SF_GATEWAY_WEBHOOK_SECRET").ok().unwrap_or_else(|| {
            error!("🪛️ SF_GATEWAY_WEBHOOK_SECRET is not set. Webhook signatures cannot be checked without it.");
            String::default()
        });
        let hmac_header = env::var("SF_GATEWAY_SIGNATURE_HEADER")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SIGNATURE_HEADER.to_string());
        let hmac_checks = parse_boolean_flag(env::var("SF_GATEWAY_HMAC_CHECKS").ok(), true);
        if !hmac_checks {
            warn!("🚨️ Webhook HMAC checks are disabled. Anyone can post payment notifications to the server.");
        }
        let whitelist = env::var("SF_GATEWAY_IP_WHITELIST").ok().and_then(|s| parse_whitelist(&s));
        match &whitelist {
            Some(whitelist) if whitelist.is_empty() => {
                warn!(
                    "🚨️ The webhook IP whitelist was configured, but is empty. The server will run, but won't accept any \
                     webhook calls."
                );
            },
            None => {
                info!("🪛️ No webhook IP whitelist is set. Only HMAC validation will be used.");
            },
            Some(v) => {
                let addrs = v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
                info!("🪛️ Webhook IP whitelist: {addrs}");
            },
        }
        Self { hmac_secret: Secret::new(hmac_secret), hmac_header, hmac_checks, whitelist }
    }
}

/// Parses a comma-separated list of IP addresses. "none", "false" and "0" disable the whitelist. Invalid entries are
/// skipped.
pub fn parse_whitelist(s: &str) -> Option<Vec<IpAddr>> {
    if ["none", "false", "0"].contains(&s.trim().to_lowercase().as_str()) {
        info!(
            "🪛️ Webhook IP whitelist is disabled. If this is not what you want, set SF_GATEWAY_IP_WHITELIST to a \
             comma-separated list of IP addresses to enable it."
        );
        return None;
    }
    let ip_addrs = split_list(s)
        .into_iter()
        .filter_map(|s| {
            s.parse()
                .map_err(|e| {
                    warn!("🪛️ Ignoring invalid IP address ({s}) in SF_GATEWAY_IP_WHITELIST: {e}");
                })
                .ok()
        })
        .collect::<Vec<IpAddr>>();
    Some(ip_addrs)
}

//-------------------------------------------------   PollConfig   -----------------------------------------------------
/// Backoff settings for server-driven payment polling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollConfig {
    pub enabled: bool,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_delay: DEFAULT_POLL_MIN_DELAY,
            max_delay: DEFAULT_POLL_MAX_DELAY,
            max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
        }
    }
}

impl PollConfig {
    pub fn from_env_or_defaults() -> Self {
        let enabled = parse_boolean_flag(env::var("SF_BACKGROUND_POLLING").ok(), true);
        let min_delay =
            env_number("SF_POLL_MIN_DELAY_MS", DEFAULT_POLL_MIN_DELAY.as_millis() as u64).map(Duration::from_millis);
        let max_delay = env_number("SF_POLL_MAX_DELAY_SECS", DEFAULT_POLL_MAX_DELAY.as_secs()).map(Duration::from_secs);
        let max_attempts = env_number("SF_POLL_MAX_ATTEMPTS", DEFAULT_POLL_MAX_ATTEMPTS as u64).map(|n| n as usize);
        let config = Self {
            enabled,
            min_delay: min_delay.unwrap_or(DEFAULT_POLL_MIN_DELAY),
            max_delay: max_delay.unwrap_or(DEFAULT_POLL_MAX_DELAY),
            max_attempts: max_attempts.unwrap_or(DEFAULT_POLL_MAX_ATTEMPTS),
        };
        if config.enabled {
            info!(
                "🪛️ Background polling: first check after {}ms, at most {}s apart, {} attempts",
                config.min_delay.as_millis(),
                config.max_delay.as_secs(),
                config.max_attempts
            );
        } else {
            info!("🪛️ Background polling is disabled. Payments settle through webhooks and client polls only.");
        }
        config
    }
}

fn env_number(name: &str, default: u64) -> Option<u64> {
    env::var(name)
        .map_err(|_| info!("🪛️ {name} is not set. Using the default value of {default}."))
        .and_then(|s| s.parse::<u64>().map_err(|e| warn!("🪛️ Invalid configuration value for {name}. {e}")))
        .ok()
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
    pub enable_payment_fallback: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            use_x_forwarded_for: config.use_x_forwarded_for,
            use_forwarded: config.use_forwarded,
            enable_payment_fallback: config.enable_payment_fallback,
        }
    }
}
