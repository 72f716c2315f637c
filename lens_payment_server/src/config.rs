//! Server configuration.
//!
//! Everything is read from `LPG_*` environment variables by [`ServerConfig::from_env_or_default`]. Missing values
//! fall back to a default, and the fallback is logged. Run the server with any argument to see the full list.
use std::{env, net::IpAddr};

use lens_payment_engine::{
    exchange_rates::{ExchangeRateConfig, DEFAULT_EXCHANGE_RATE_API_URL},
    gateway::GatewayConfig,
    sqlite::db::db_url,
};
use log::*;
use lpg_common::helpers::parse_boolean_flag;

const DEFAULT_LPG_HOST: &str = "127.0.0.1";
const DEFAULT_LPG_PORT: u16 = 8360;
const DEFAULT_LPG_BASE_URL: &str = "http://localhost:8360";
/// The gateway's staging checkout. Production deployments must override this.
const DEFAULT_ECPAY_API_URL: &str = "https://payment-stage.ecpay.com.tw/Cashier/AioCheckOut/V5";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The public URL of the site. Redirects and the notification URL sent to the gateway are built from it.
    pub base_url: String,
    pub gateway: GatewayConfig,
    pub exchange_rates: ExchangeRateConfig,
    /// If supplied, requests against the notification webhook are checked against this list of addresses.
    /// To explicitly disable the whitelist, set `LPG_ECPAY_IP_WHITELIST` to "false", "none", or "0".
    pub ecpay_whitelist: Option<Vec<IpAddr>>,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_LPG_HOST.to_string(),
            port: DEFAULT_LPG_PORT,
            database_url: String::default(),
            base_url: DEFAULT_LPG_BASE_URL.to_string(),
            gateway: GatewayConfig::default(),
            exchange_rates: ExchangeRateConfig::new("", DEFAULT_EXCHANGE_RATE_API_URL),
            ecpay_whitelist: None,
            use_x_forwarded_for: false,
            use_forwarded: false,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("LPG_HOST").ok().unwrap_or_else(|| DEFAULT_LPG_HOST.into());
        let port = env::var("LPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for LPG_PORT. {e} Using the default, {DEFAULT_LPG_PORT}, instead."
                    );
                    DEFAULT_LPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_LPG_PORT);
        let database_url = db_url();
        let base_url = env::var("LPG_BASE_URL").ok().unwrap_or_else(|| {
            warn!(
                "🪛️ LPG_BASE_URL is not set. Using {DEFAULT_LPG_BASE_URL}. The gateway will not be able to reach the \
                 notification URL."
            );
            DEFAULT_LPG_BASE_URL.to_string()
        });
        let gateway = gateway_config_from_env();
        let exchange_rates = exchange_rate_config_from_env();
        let ecpay_whitelist = parse_ip_whitelist(env::var("LPG_ECPAY_IP_WHITELIST").ok());
        log_whitelist(&ecpay_whitelist);
        let use_x_forwarded_for = parse_boolean_flag(env::var("LPG_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("LPG_USE_FORWARDED").ok(), false);
        Self {
            host,
            port,
            database_url,
            base_url,
            gateway,
            exchange_rates,
            ecpay_whitelist,
            use_x_forwarded_for,
            use_forwarded,
        }
    }
}

fn gateway_config_from_env() -> GatewayConfig {
    let required = |name: &str| {
        env::var(name).ok().unwrap_or_else(|| {
            error!("🪛️ {name} is not set. Payment forms and notifications cannot be signed without it.");
            String::default()
        })
    };
    let merchant_id = required("LPG_ECPAY_MERCHANT_ID");
    let hash_key = required("LPG_ECPAY_HASH_KEY");
    let hash_iv = required("LPG_ECPAY_HASH_IV");
    let api_url = env::var("LPG_ECPAY_API_URL").ok().unwrap_or_else(|| {
        warn!("🪛️ LPG_ECPAY_API_URL is not set. Using the staging checkout, {DEFAULT_ECPAY_API_URL}");
        DEFAULT_ECPAY_API_URL.to_string()
    });
    GatewayConfig::new(&merchant_id, &hash_key, &hash_iv, &api_url)
}

fn exchange_rate_config_from_env() -> ExchangeRateConfig {
    let api_key = env::var("LPG_EXCHANGE_RATE_API_KEY").ok().unwrap_or_else(|| {
        warn!("🪛️ LPG_EXCHANGE_RATE_API_KEY is not set. USD prices will be converted at the fallback rate.");
        String::default()
    });
    let api_url = env::var("LPG_EXCHANGE_RATE_API_URL").ok().unwrap_or_else(|| {
        info!("🪛️ LPG_EXCHANGE_RATE_API_URL is not set. Using {DEFAULT_EXCHANGE_RATE_API_URL}");
        DEFAULT_EXCHANGE_RATE_API_URL.to_string()
    });
    ExchangeRateConfig::new(&api_key, &api_url)
}

/// Parses a comma-separated list of addresses. "none", "false" and "0" disable the whitelist. Invalid entries are
/// skipped.
pub fn parse_ip_whitelist(value: Option<String>) -> Option<Vec<IpAddr>> {
    let value = value?;
    if ["none", "false", "0", ""].contains(&value.trim().to_lowercase().as_str()) {
        return None;
    }
    let ip_addrs = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            s.parse::<IpAddr>()
                .map_err(|e| warn!("🪛️ Ignoring invalid IP address ({s}) in LPG_ECPAY_IP_WHITELIST: {e}"))
                .ok()
        })
        .collect::<Vec<IpAddr>>();
    Some(ip_addrs)
}

fn log_whitelist(whitelist: &Option<Vec<IpAddr>>) {
    match whitelist {
        Some(whitelist) if whitelist.is_empty() => {
            warn!(
                "🚨️ The ECPay IP whitelist was configured, but is empty. The server will run, but won't accept any \
                 payment notifications."
            );
        },
        None => {
            info!("🪛️ No ECPay IP whitelist is set. Only checksum validation will be used.");
        },
        Some(v) => {
            let addrs = v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
            info!("🪛️ ECPay IP whitelist: {addrs}");
        },
    }
}
