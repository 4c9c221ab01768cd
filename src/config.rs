use dotenvy::dotenv;
use rust_decimal::Decimal;
use std::{env, str::FromStr};

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub session_hours: i64,
    pub cookie_secure: bool,
    pub pricing: PricingConfig,
}

/// Rates used to quote a cart and to price an order at creation time.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingConfig {
    pub tax_rate: Decimal,
    pub standard_shipping: Decimal,
    pub express_shipping: Decimal,
    pub free_shipping_threshold: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(8, 2),
            standard_shipping: Decimal::new(599, 2),
            express_shipping: Decimal::new(1499, 2),
            free_shipping_threshold: Decimal::new(5000, 2),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests don't have to touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AppError::Config(format!("{} must be set", key)))
        };

        let defaults = PricingConfig::default();
        let pricing = PricingConfig {
            tax_rate: parse_or(&lookup, "TAX_RATE", defaults.tax_rate)?,
            standard_shipping: parse_or(&lookup, "STANDARD_SHIPPING", defaults.standard_shipping)?,
            express_shipping: parse_or(&lookup, "EXPRESS_SHIPPING", defaults.express_shipping)?,
            free_shipping_threshold: parse_or(
                &lookup,
                "FREE_SHIPPING_THRESHOLD",
                defaults.free_shipping_threshold,
            )?,
        };

        if pricing.tax_rate < Decimal::ZERO || pricing.tax_rate >= Decimal::ONE {
            return Err(AppError::Config("TAX_RATE must be between 0 and 1".to_string()));
        }

        let session_hours: i64 = parse_or(&lookup, "SESSION_HOURS", 24)?;
        if session_hours <= 0 {
            return Err(AppError::Config("SESSION_HOURS must be positive".to_string()));
        }

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 3000)?,
            database_url: required("DATABASE_URL")?,
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            jwt_secret: required("JWT_SECRET")?,
            session_hours,
            cookie_secure: parse_or(&lookup, "COOKIE_SECURE", false)?,
            pricing,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| AppError::Config(format!("Invalid {}: {}", key, e))),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn applies_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/shop"),
            ("JWT_SECRET", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
        assert_eq!(config.session_hours, 24);
        assert!(!config.cookie_secure);
        assert_eq!(config.pricing, PricingConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/shop"),
            ("JWT_SECRET", "secret"),
            ("PORT", "8080"),
            ("TAX_RATE", "0.10"),
            ("FREE_SHIPPING_THRESHOLD", "75"),
            ("COOKIE_SECURE", "true"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.pricing.tax_rate, Decimal::new(10, 2));
        assert_eq!(config.pricing.free_shipping_threshold, Decimal::new(75, 0));
        assert!(config.cookie_secure);
    }

    #[test]
    fn missing_secret_is_an_error() {
        let err = AppConfig::from_lookup(lookup_from(&[(
            "DATABASE_URL",
            "postgres://localhost/shop",
        )]))
        .unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn rejects_bad_numbers() {
        let result = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/shop"),
            ("JWT_SECRET", "secret"),
            ("PORT", "not-a-port"),
        ]));
        assert!(result.is_err());

        let result = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/shop"),
            ("JWT_SECRET", "secret"),
            ("TAX_RATE", "1.5"),
        ]));
        assert!(result.is_err());
    }
}
