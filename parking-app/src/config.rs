//! Configuration loading from environment.

use std::env;

use parking_hex::inbound::rate_limit::DEFAULT_REQUESTS_PER_MINUTE;
use parking_hex::service::DEFAULT_SERVICE_FEE_BPS;
use parking_stripe::DEFAULT_API_BASE;

/// Application configuration.
#[derive(Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub stripe_secret_key: Option<String>,
    pub stripe_api_base: String,
    /// Seeds the runtime `STRIPE_ENABLED` flag when set; otherwise the stored
    /// value is left alone.
    pub stripe_enabled: Option<bool>,
    pub service_fee_bps: u32,
    pub rate_limit_per_minute: u32,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()?;

        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let stripe_secret_key = lookup("STRIPE_SECRET_KEY").filter(|k| !k.trim().is_empty());
        let stripe_api_base =
            lookup("STRIPE_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let stripe_enabled = match lookup("STRIPE_ENABLED") {
            Some(raw) => Some(parse_bool(&raw).ok_or_else(|| {
                anyhow::anyhow!("STRIPE_ENABLED must be true or false, got {:?}", raw)
            })?),
            None => None,
        };
        if stripe_enabled == Some(true) && stripe_secret_key.is_none() {
            anyhow::bail!("STRIPE_SECRET_KEY is required when STRIPE_ENABLED is true");
        }

        let service_fee_bps = match lookup("SERVICE_FEE_BPS") {
            Some(raw) => raw.parse()?,
            None => DEFAULT_SERVICE_FEE_BPS,
        };
        if service_fee_bps > 10_000 {
            anyhow::bail!("SERVICE_FEE_BPS must be at most 10000, got {}", service_fee_bps);
        }

        let rate_limit_per_minute = match lookup("RATE_LIMIT_PER_MINUTE") {
            Some(raw) => raw.parse()?,
            None => DEFAULT_REQUESTS_PER_MINUTE,
        };

        Ok(Self {
            port,
            database_url,
            stripe_secret_key,
            stripe_api_base,
            stripe_enabled,
            service_fee_bps,
            rate_limit_per_minute,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("DATABASE_URL", "sqlite::memory:")]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.service_fee_bps, 1000);
        assert_eq!(config.rate_limit_per_minute, 100);
        assert_eq!(config.stripe_api_base, "https://api.stripe.com");
        assert!(config.stripe_enabled.is_none());
    }

    #[test]
    fn test_database_url_required() {
        assert!(load(&[]).is_err());
    }

    #[test]
    fn test_stripe_enabled_needs_key() {
        let err = load(&[("DATABASE_URL", "x"), ("STRIPE_ENABLED", "true")]).unwrap_err();
        assert!(err.to_string().contains("STRIPE_SECRET_KEY"));

        let config = load(&[
            ("DATABASE_URL", "x"),
            ("STRIPE_ENABLED", "true"),
            ("STRIPE_SECRET_KEY", "sk_test_1"),
        ])
        .unwrap();
        assert_eq!(config.stripe_enabled, Some(true));
    }

    #[test]
    fn test_fee_upper_bound() {
        assert!(load(&[("DATABASE_URL", "x"), ("SERVICE_FEE_BPS", "10001")]).is_err());
        let config = load(&[("DATABASE_URL", "x"), ("SERVICE_FEE_BPS", "250")]).unwrap();
        assert_eq!(config.service_fee_bps, 250);
    }
}
